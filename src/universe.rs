//! Candidate universe construction.

use log::{debug, info, warn};
use rustc_hash::FxHashSet;

use crate::config::{SelectionConfig, UniverseConfig};
use crate::error::Result;
use crate::query::{SortKey, ValuationQuery};
use crate::services::{MarketData, as_market_error};
use crate::types::SecurityId;

/// List every tradable security of the configured kind.
///
/// Repeated identifiers are dropped, keeping the first occurrence.
///
/// With `pool_size` set, the listing is pre-ranked ascending by the
/// selection field and truncated, reproducing a capped fundamentals pool.
pub fn build_universe(
    market: &dyn MarketData,
    universe: &UniverseConfig,
    selection: &SelectionConfig,
) -> Result<Vec<SecurityId>> {
    let listed = as_market_error(market.all_securities(universe.kind))?;
    let listed_count = listed.len();
    let listing = dedup_first(listed);
    if listing.len() < listed_count {
        warn!(
            "listing repeated {} identifiers; kept first occurrences",
            listed_count - listing.len()
        );
    }
    debug!("listed {} {:?} securities", listing.len(), universe.kind);

    let Some(pool_size) = universe.pool_size else {
        return Ok(listing);
    };

    let query = ValuationQuery::codes(&listing)
        .order_by(SortKey::asc(selection.rank_by))
        .limit(pool_size);
    let pool = as_market_error(market.valuations(&query))?.ids();
    info!(
        "universe capped to {} of {} securities by {:?}",
        pool.len(),
        listing.len(),
        selection.rank_by
    );
    Ok(pool)
}

fn dedup_first(ids: Vec<SecurityId>) -> Vec<SecurityId> {
    let mut seen = FxHashSet::default();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMarket;
    use crate::query::{SessionQuery, ValuationTable};
    use crate::services::ServiceResult;
    use crate::types::{SecurityInfo, SecurityKind, Session};
    use rustc_hash::FxHashMap;

    /// Reports every listed id twice, as a merged feed might.
    struct DoubledListing(InMemoryMarket);

    impl MarketData for DoubledListing {
        fn all_securities(&self, kind: SecurityKind) -> ServiceResult<Vec<SecurityId>> {
            let once = self.0.all_securities(kind)?;
            Ok(once.iter().chain(&once).cloned().collect())
        }

        fn valuations(&self, query: &ValuationQuery) -> ServiceResult<ValuationTable> {
            self.0.valuations(query)
        }

        fn security_info(&self, id: &SecurityId) -> ServiceResult<Option<SecurityInfo>> {
            self.0.security_info(id)
        }

        fn latest_sessions(
            &self,
            query: &SessionQuery,
        ) -> ServiceResult<FxHashMap<SecurityId, Session>> {
            self.0.latest_sessions(query)
        }
    }

    fn market() -> InMemoryMarket {
        InMemoryMarket::builder()
            .with_valuation("A", 30.0, 60.0)
            .with_valuation("B", 10.0, 90.0)
            .with_valuation("C", 20.0, 30.0)
            .build()
    }

    #[test]
    fn uncapped_returns_full_listing() {
        let ids = build_universe(&market(), &UniverseConfig::default(), &Default::default())
            .unwrap();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn capped_pool_keeps_smallest() {
        let universe = UniverseConfig {
            pool_size: Some(2),
            ..Default::default()
        };
        let ids = build_universe(&market(), &universe, &SelectionConfig::default()).unwrap();
        assert_eq!(ids, vec![SecurityId::from("B"), SecurityId::from("C")]);
    }

    #[test]
    fn capped_pool_ranks_by_configured_field() {
        let universe = UniverseConfig {
            pool_size: Some(1),
            ..Default::default()
        };
        let selection = SelectionConfig {
            rank_by: crate::query::ValuationField::MarketCap,
            ..Default::default()
        };
        let ids = build_universe(&market(), &universe, &selection).unwrap();
        assert_eq!(ids, vec![SecurityId::from("C")]);
    }

    #[test]
    fn repeated_listing_keeps_first_occurrence() {
        let ids = build_universe(
            &DoubledListing(market()),
            &UniverseConfig::default(),
            &Default::default(),
        )
        .unwrap();
        assert_eq!(
            ids,
            vec![SecurityId::from("A"), SecurityId::from("B"), SecurityId::from("C")]
        );
    }
}
