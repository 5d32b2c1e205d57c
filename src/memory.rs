//! In-memory market data and a paper broker.
//!
//! Use these in tests and offline runs to drive the strategy without a
//! vendor connection.
//!
//! ```
//! use chrono::NaiveDate;
//! use smallcap_rotation::memory::{InMemoryMarket, PaperBroker};
//! use smallcap_rotation::types::Session;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let market = InMemoryMarket::builder()
//!     .with_security("600000.XSHG", "Pudong Bank", NaiveDate::from_ymd_opt(1999, 11, 10).unwrap())
//!     .with_valuation("600000.XSHG", 2_000.0, 2_100.0)
//!     .with_session("600000.XSHG", Session { date: day, close: 7.1, high_limit: 7.8, paused: false })
//!     .build();
//! let broker = PaperBroker::builder().with_cash(1_000_000.0).build();
//! # let _ = (market, broker);
//! ```

use std::path::Path;

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::error::{Error, Result, ServiceError};
use crate::query::{SessionQuery, ValuationQuery, ValuationRow, ValuationTable};
use crate::rebalance::OrderInstruction;
use crate::services::{Broker, MarketData, ServiceResult};
use crate::types::{Holding, PortfolioSnapshot, SecurityId, SecurityInfo, SecurityKind, Session};

/// Static market data keyed by security.
///
/// The listing is every id mentioned by `with_security` or `with_valuation`,
/// in first-mention order. All listed ids are reported as [`SecurityKind::Stock`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarket {
    listing: Vec<SecurityId>,
    info: FxHashMap<SecurityId, SecurityInfo>,
    valuations: Vec<ValuationRow>,
    sessions: FxHashMap<SecurityId, Vec<Session>>,
}

/// Builder for `InMemoryMarket`.
#[derive(Debug, Default)]
pub struct InMemoryMarketBuilder {
    market: InMemoryMarket,
}

impl InMemoryMarketBuilder {
    fn list(&mut self, id: &SecurityId) {
        if !self.market.listing.contains(id) {
            self.market.listing.push(id.clone());
        }
    }

    pub fn with_security(
        mut self,
        id: impl Into<SecurityId>,
        display_name: &str,
        start_date: NaiveDate,
    ) -> Self {
        let id = id.into();
        self.list(&id);
        self.market.info.insert(
            id,
            SecurityInfo {
                display_name: display_name.into(),
                start_date,
            },
        );
        self
    }

    pub fn with_valuation(
        mut self,
        id: impl Into<SecurityId>,
        circulating_market_cap: f64,
        market_cap: f64,
    ) -> Self {
        let id = id.into();
        self.list(&id);
        self.market.valuations.retain(|r| r.id != id);
        self.market.valuations.push(ValuationRow {
            id,
            circulating_market_cap,
            market_cap,
        });
        self
    }

    pub fn with_session(mut self, id: impl Into<SecurityId>, session: Session) -> Self {
        self.market
            .sessions
            .entry(id.into())
            .or_default()
            .push(session);
        self
    }

    pub fn build(mut self) -> InMemoryMarket {
        for sessions in self.market.sessions.values_mut() {
            sessions.sort_by_key(|s| s.date);
        }
        self.market
    }
}

/// JSON fixture layout accepted by [`InMemoryMarket::from_json`].
#[derive(Debug, Deserialize)]
struct MarketFixture {
    #[serde(default)]
    securities: Vec<FixtureSecurity>,
}

#[derive(Debug, Deserialize)]
struct FixtureSecurity {
    id: SecurityId,
    display_name: String,
    start_date: NaiveDate,
    circulating_market_cap: Option<f64>,
    market_cap: Option<f64>,
    #[serde(default)]
    sessions: Vec<Session>,
}

impl InMemoryMarket {
    pub fn builder() -> InMemoryMarketBuilder {
        InMemoryMarketBuilder::default()
    }

    /// Parse a fixture of the form
    /// `{"securities": [{"id", "display_name", "start_date",
    /// "circulating_market_cap", "market_cap", "sessions": [...]}]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: MarketFixture = serde_json::from_str(json)?;
        let mut builder = Self::builder();
        for sec in fixture.securities {
            builder = builder.with_security(sec.id.clone(), &sec.display_name, sec.start_date);
            if let Some(circ) = sec.circulating_market_cap {
                let cap = sec.market_cap.unwrap_or(circ);
                builder = builder.with_valuation(sec.id.clone(), circ, cap);
            }
            for session in sec.sessions {
                builder = builder.with_session(sec.id.clone(), session);
            }
        }
        Ok(builder.build())
    }

    /// Load a JSON fixture from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::FixtureRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Trading sessions known for any security, sorted and deduplicated.
    pub fn calendar(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self
            .sessions
            .values()
            .flat_map(|s| s.iter().map(|s| s.date))
            .collect();
        days.sort_unstable();
        days.dedup();
        days
    }
}

impl MarketData for InMemoryMarket {
    fn all_securities(&self, kind: SecurityKind) -> ServiceResult<Vec<SecurityId>> {
        match kind {
            SecurityKind::Stock => Ok(self.listing.clone()),
            _ => Ok(Vec::new()),
        }
    }

    fn valuations(&self, query: &ValuationQuery) -> ServiceResult<ValuationTable> {
        Ok(query.apply(self.valuations.iter().cloned()))
    }

    fn security_info(&self, id: &SecurityId) -> ServiceResult<Option<SecurityInfo>> {
        Ok(self.info.get(id).cloned())
    }

    fn latest_sessions(
        &self,
        query: &SessionQuery,
    ) -> ServiceResult<FxHashMap<SecurityId, Session>> {
        let mut out = FxHashMap::default();
        for id in &query.ids {
            let latest = self.sessions.get(id).and_then(|sessions| {
                sessions
                    .iter()
                    .rev()
                    .find(|s| s.date >= query.start && s.date <= query.end)
            });
            if let Some(session) = latest {
                out.insert(id.clone(), session.clone());
            }
        }
        Ok(out)
    }
}

/// A broker that fills every instruction instantly at the requested value.
///
/// Cash absorbs the difference, so `total_value` is unchanged by a fill.
#[derive(Debug, Clone, Default)]
pub struct PaperBroker {
    holdings: Vec<Holding>,
    cash: f64,
    rejected: FxHashSet<SecurityId>,
    instructions: Vec<OrderInstruction>,
}

/// Builder for `PaperBroker`.
#[derive(Debug, Default)]
pub struct PaperBrokerBuilder {
    broker: PaperBroker,
}

impl PaperBrokerBuilder {
    pub fn with_cash(mut self, cash: f64) -> Self {
        self.broker.cash = cash;
        self
    }

    pub fn with_holding(mut self, id: impl Into<SecurityId>, quantity: i64, value: f64) -> Self {
        self.broker.holdings.push(Holding {
            id: id.into(),
            quantity,
            value,
        });
        self
    }

    /// Reject every instruction for `id`.
    pub fn reject(mut self, id: impl Into<SecurityId>) -> Self {
        self.broker.rejected.insert(id.into());
        self
    }

    pub fn build(self) -> PaperBroker {
        self.broker
    }
}

impl PaperBroker {
    pub fn builder() -> PaperBrokerBuilder {
        PaperBrokerBuilder::default()
    }

    /// Accepted instructions, in submission order.
    pub fn instructions(&self) -> &[OrderInstruction] {
        &self.instructions
    }

    pub fn clear_instructions(&mut self) {
        self.instructions.clear();
    }

    /// Scale every holding's value by `factor(id)`, e.g. to mark to market
    /// between rebalances in a backtest.
    pub fn mark(&mut self, mut factor: impl FnMut(&SecurityId) -> f64) {
        for h in &mut self.holdings {
            h.value *= factor(&h.id);
        }
    }

    fn check(&self, id: &SecurityId) -> ServiceResult<()> {
        if self.rejected.contains(id) {
            return Err(ServiceError::Rejected(format!("paper: {id} rejected")));
        }
        Ok(())
    }

    fn set_value(&mut self, id: &SecurityId, value: f64) {
        let current = self.holdings.iter().position(|h| &h.id == id);
        let old = current.map_or(0.0, |i| self.holdings[i].value);
        self.cash -= value - old;
        match current {
            Some(i) if value == 0.0 => {
                self.holdings.remove(i);
            }
            Some(i) => self.holdings[i].value = value,
            None if value != 0.0 => self.holdings.push(Holding {
                id: id.clone(),
                quantity: 0,
                value,
            }),
            None => {}
        }
    }
}

impl Broker for PaperBroker {
    fn portfolio(&self) -> ServiceResult<PortfolioSnapshot> {
        let invested: f64 = self.holdings.iter().map(|h| h.value).sum();
        Ok(PortfolioSnapshot {
            holdings: self.holdings.clone(),
            cash: self.cash,
            total_value: self.cash + invested,
        })
    }

    fn close_position(&mut self, id: &SecurityId) -> ServiceResult<()> {
        self.check(id)?;
        self.set_value(id, 0.0);
        self.instructions
            .push(OrderInstruction::Liquidate { id: id.clone() });
        Ok(())
    }

    fn order_target_value(&mut self, id: &SecurityId, value: f64) -> ServiceResult<()> {
        self.check(id)?;
        self.set_value(id, value);
        self.instructions.push(OrderInstruction::TargetValue {
            id: id.clone(),
            value,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(d: NaiveDate, close: f64) -> Session {
        Session {
            date: d,
            close,
            high_limit: close * 1.1,
            paused: false,
        }
    }

    #[test]
    fn listing_in_first_mention_order() {
        let market = InMemoryMarket::builder()
            .with_valuation("B", 1.0, 1.0)
            .with_security("A", "Alpha", date(2020, 1, 1))
            .with_security("B", "Beta", date(2020, 1, 1))
            .build();
        let listing = market.all_securities(SecurityKind::Stock).unwrap();
        assert_eq!(listing, vec![SecurityId::from("B"), SecurityId::from("A")]);
        assert!(market.all_securities(SecurityKind::Fund).unwrap().is_empty());
    }

    #[test]
    fn latest_session_within_window() {
        let market = InMemoryMarket::builder()
            .with_session("A", session(date(2024, 2, 29), 10.0))
            .with_session("A", session(date(2024, 2, 27), 9.0))
            .with_session("A", session(date(2024, 3, 4), 11.0))
            .build();
        let query = SessionQuery {
            ids: vec!["A".into(), "B".into()],
            start: date(2024, 2, 27),
            end: date(2024, 3, 1),
        };
        let sessions = market.latest_sessions(&query).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[&SecurityId::from("A")].close, 10.0);
    }

    #[test]
    fn calendar_is_sorted_union() {
        let market = InMemoryMarket::builder()
            .with_session("A", session(date(2024, 3, 4), 1.0))
            .with_session("B", session(date(2024, 3, 1), 1.0))
            .with_session("A", session(date(2024, 3, 1), 1.0))
            .build();
        assert_eq!(market.calendar(), vec![date(2024, 3, 1), date(2024, 3, 4)]);
    }

    #[test]
    fn fixture_parsing() {
        let json = r#"{
            "securities": [
                {
                    "id": "000001.XSHE",
                    "display_name": "Ping An Bank",
                    "start_date": "1991-04-03",
                    "circulating_market_cap": 2100.5,
                    "market_cap": 2150.0,
                    "sessions": [
                        { "date": "2024-03-01", "close": 10.2, "high_limit": 11.2 }
                    ]
                },
                {
                    "id": "N830799.BJ",
                    "display_name": "Beijing Co",
                    "start_date": "2021-11-15"
                }
            ]
        }"#;
        let market = InMemoryMarket::from_json(json).unwrap();
        let id = SecurityId::from("000001.XSHE");
        assert_eq!(
            market.security_info(&id).unwrap().unwrap().display_name,
            "Ping An Bank"
        );
        let table = market.valuations(&ValuationQuery::codes(&[id.clone()])).unwrap();
        assert_eq!(table.rows[0].market_cap, 2150.0);
        let listing = market.all_securities(SecurityKind::Stock).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(market.calendar(), vec![date(2024, 3, 1)]);
    }

    #[test]
    fn load_fixture_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.json");
        std::fs::write(
            &path,
            r#"{"securities": [{"id": "600000.XSHG", "display_name": "Pudong Bank",
                "start_date": "1999-11-10", "circulating_market_cap": 2000.0}]}"#,
        )
        .unwrap();
        let market = InMemoryMarket::load(&path).unwrap();
        let table = market.valuations(&ValuationQuery::default()).unwrap();
        assert_eq!(table.rows[0].market_cap, 2000.0);
    }

    #[test]
    fn load_missing_fixture() {
        let err = InMemoryMarket::load(Path::new("/nonexistent/market.json")).unwrap_err();
        assert!(matches!(err, Error::FixtureRead { .. }));
    }

    #[test]
    fn bad_fixture_is_parse_error() {
        assert!(matches!(
            InMemoryMarket::from_json("{\"securities\": 3}"),
            Err(Error::FixtureParse(_))
        ));
    }

    #[test]
    fn paper_fills_keep_total_value() {
        let mut broker = PaperBroker::builder()
            .with_cash(6_000.0)
            .with_holding("A", 100, 4_000.0)
            .build();

        broker.close_position(&"A".into()).unwrap();
        broker.order_target_value(&"B".into(), 2_500.0).unwrap();

        let snap = broker.portfolio().unwrap();
        assert_eq!(snap.total_value, 10_000.0);
        assert_eq!(snap.cash, 7_500.0);
        assert!(snap.holding(&"A".into()).is_none());
        assert_eq!(snap.holding(&"B".into()).unwrap().value, 2_500.0);
        assert_eq!(broker.instructions().len(), 2);
    }

    #[test]
    fn rejected_instruction_is_not_recorded() {
        let mut broker = PaperBroker::builder().with_cash(1_000.0).reject("X").build();
        assert!(broker.order_target_value(&"X".into(), 500.0).is_err());
        assert!(broker.instructions().is_empty());
        assert_eq!(broker.portfolio().unwrap().cash, 1_000.0);
    }

    #[test]
    fn mark_scales_holdings() {
        let mut broker = PaperBroker::builder()
            .with_holding("A", 10, 1_000.0)
            .build();
        broker.mark(|_| 1.5);
        assert_eq!(broker.portfolio().unwrap().total_value, 1_500.0);
    }
}
