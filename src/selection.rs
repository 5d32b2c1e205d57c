//! Ranking & selection: the N smallest by a valuation field.

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::config::SelectionConfig;
use crate::error::Result;
use crate::query::{ValuationField, ValuationQuery, ValuationRow};
use crate::services::{MarketData, as_market_error};
use crate::types::SecurityId;

/// Rank `rows` ascending by `field` and keep the first `n`.
///
/// Ties keep the order of `candidates`; rows for ids not in `candidates`
/// and rows with a NaN value are ignored.
pub fn rank_smallest(
    candidates: &[SecurityId],
    rows: &[ValuationRow],
    field: ValuationField,
    n: usize,
) -> Vec<SecurityId> {
    let mut ranked = rank_ascending(candidates, rows, field);
    ranked.truncate(n);
    ranked
}

fn rank_ascending(
    candidates: &[SecurityId],
    rows: &[ValuationRow],
    field: ValuationField,
) -> Vec<SecurityId> {
    let values: FxHashMap<&SecurityId, f64> = rows
        .iter()
        .filter(|r| !r.get(field).is_nan())
        .map(|r| (&r.id, r.get(field)))
        .collect();

    let mut ranked: Vec<(&SecurityId, f64)> = candidates
        .iter()
        .filter_map(|id| values.get(id).map(|&v| (id, v)))
        .collect();
    // sort_by is stable: equal values stay in candidate order.
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.into_iter().map(|(id, _)| id.clone()).collect()
}

/// Fetch valuations for `eligible` and select the `top_n` smallest.
pub fn select_smallest(
    market: &dyn MarketData,
    eligible: &[SecurityId],
    config: &SelectionConfig,
) -> Result<Vec<SecurityId>> {
    if eligible.is_empty() {
        return Ok(Vec::new());
    }

    let table = as_market_error(market.valuations(&ValuationQuery::codes(eligible)))?;
    let mut selected = rank_ascending(eligible, &table.rows, config.rank_by);

    if selected.len() < eligible.len() {
        warn!(
            "{} eligible securities have no {:?} value and were skipped",
            eligible.len() - selected.len(),
            config.rank_by
        );
    }
    selected.truncate(config.top_n);
    info!(
        "selected {} of {} eligible by ascending {:?}",
        selected.len(),
        eligible.len(),
        config.rank_by
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, circ: f64) -> ValuationRow {
        ValuationRow {
            id: id.into(),
            circulating_market_cap: circ,
            market_cap: circ * 2.0,
        }
    }

    fn ids(names: &[&str]) -> Vec<SecurityId> {
        names.iter().map(|&n| SecurityId::from(n)).collect()
    }

    #[test]
    fn ascending_and_truncated() {
        let rows = vec![row("A", 5.0), row("B", 1.0), row("C", 3.0)];
        let out = rank_smallest(
            &ids(&["A", "B", "C"]),
            &rows,
            ValuationField::CirculatingMarketCap,
            2,
        );
        assert_eq!(out, ids(&["B", "C"]));
    }

    #[test]
    fn ties_keep_candidate_order() {
        // Service returns rows in a different order than the candidates.
        let rows = vec![row("C", 1.0), row("A", 1.0), row("B", 1.0)];
        let out = rank_smallest(
            &ids(&["B", "A", "C"]),
            &rows,
            ValuationField::CirculatingMarketCap,
            10,
        );
        assert_eq!(out, ids(&["B", "A", "C"]));
    }

    #[test]
    fn fewer_than_n_returns_all() {
        let rows = vec![row("A", 2.0), row("B", 1.0)];
        let out = rank_smallest(&ids(&["A", "B"]), &rows, ValuationField::MarketCap, 100);
        assert_eq!(out, ids(&["B", "A"]));
    }

    #[test]
    fn missing_and_nan_values_are_skipped() {
        let rows = vec![row("A", f64::NAN), row("B", 1.0)];
        let out = rank_smallest(
            &ids(&["A", "B", "C"]),
            &rows,
            ValuationField::CirculatingMarketCap,
            10,
        );
        assert_eq!(out, ids(&["B"]));
    }

    #[test]
    fn rows_outside_candidates_are_ignored() {
        let rows = vec![row("Z", 0.1), row("A", 1.0)];
        let out = rank_smallest(&ids(&["A"]), &rows, ValuationField::CirculatingMarketCap, 10);
        assert_eq!(out, ids(&["A"]));
    }
}
