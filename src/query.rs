//! Typed query parameters and result containers for the data service.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::types::SecurityId;

/// Numeric valuation fields a query can sort on or rank by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationField {
    /// Free-float (circulating) market capitalization.
    #[default]
    CirculatingMarketCap,
    /// Total market capitalization.
    MarketCap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: ValuationField,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: ValuationField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }
}

/// Row-level predicate on a valuation query.
#[derive(Clone, Debug, PartialEq)]
pub enum ValuationFilter {
    /// Restrict to the given identifiers.
    CodeIn(Vec<SecurityId>),
    /// Keep rows whose `field` is strictly below the bound.
    Below(ValuationField, f64),
    /// Keep rows whose `field` is strictly above the bound.
    Above(ValuationField, f64),
}

/// Fundamentals query: all filters are ANDed, then sorted, then truncated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValuationQuery {
    pub filters: Vec<ValuationFilter>,
    pub order_by: Option<SortKey>,
    pub limit: Option<usize>,
}

impl ValuationQuery {
    pub fn codes(ids: &[SecurityId]) -> Self {
        Self {
            filters: vec![ValuationFilter::CodeIn(ids.to_vec())],
            ..Default::default()
        }
    }

    pub fn order_by(mut self, key: SortKey) -> Self {
        self.order_by = Some(key);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn within_bound(filter: &ValuationFilter, row: &ValuationRow) -> bool {
        match filter {
            ValuationFilter::CodeIn(_) => true,
            ValuationFilter::Below(field, bound) => row.get(*field) < *bound,
            ValuationFilter::Above(field, bound) => row.get(*field) > *bound,
        }
    }

    /// Apply the whole query to an in-memory row set.
    ///
    /// Sorting is stable, so rows with equal keys keep their input order.
    pub fn apply(&self, rows: impl IntoIterator<Item = ValuationRow>) -> ValuationTable {
        let code_sets: Vec<FxHashSet<&SecurityId>> = self
            .filters
            .iter()
            .filter_map(|f| match f {
                ValuationFilter::CodeIn(ids) => Some(ids.iter().collect()),
                _ => None,
            })
            .collect();

        let mut out: Vec<ValuationRow> = rows
            .into_iter()
            .filter(|row| code_sets.iter().all(|set| set.contains(&row.id)))
            .filter(|row| self.filters.iter().all(|f| Self::within_bound(f, row)))
            .collect();

        if let Some(key) = self.order_by {
            out.sort_by(|a, b| {
                let ord = a.get(key.field).total_cmp(&b.get(key.field));
                match key.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        ValuationTable { rows: out }
    }
}

/// One valuation record, keyed by security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValuationRow {
    pub id: SecurityId,
    pub circulating_market_cap: f64,
    pub market_cap: f64,
}

impl ValuationRow {
    pub fn get(&self, field: ValuationField) -> f64 {
        match field {
            ValuationField::CirculatingMarketCap => self.circulating_market_cap,
            ValuationField::MarketCap => self.market_cap,
        }
    }
}

/// Result of a valuation query, in service order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValuationTable {
    pub rows: Vec<ValuationRow>,
}

impl ValuationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> Vec<SecurityId> {
        self.rows.iter().map(|r| r.id.clone()).collect()
    }
}

/// Batched price/session lookup over a closed date range.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionQuery {
    pub ids: Vec<SecurityId>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, circ: f64, cap: f64) -> ValuationRow {
        ValuationRow {
            id: id.into(),
            circulating_market_cap: circ,
            market_cap: cap,
        }
    }

    fn rows() -> Vec<ValuationRow> {
        vec![
            row("A", 30.0, 90.0),
            row("B", 10.0, 80.0),
            row("C", 20.0, 70.0),
            row("D", 10.0, 60.0),
        ]
    }

    #[test]
    fn code_filter_restricts_rows() {
        let q = ValuationQuery::codes(&["A".into(), "C".into()]);
        let t = q.apply(rows());
        assert_eq!(t.ids(), vec![SecurityId::from("A"), SecurityId::from("C")]);
    }

    #[test]
    fn sort_ascending_is_stable() {
        let q = ValuationQuery::default()
            .order_by(SortKey::asc(ValuationField::CirculatingMarketCap));
        let t = q.apply(rows());
        // B and D tie at 10.0; B comes first in the input.
        let ids: Vec<_> = t.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "D", "C", "A"]);
    }

    #[test]
    fn sort_descending_and_limit() {
        let q = ValuationQuery::default()
            .order_by(SortKey {
                field: ValuationField::MarketCap,
                order: SortOrder::Desc,
            })
            .limit(2);
        let t = q.apply(rows());
        let ids: Vec<_> = t.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn bound_filters() {
        let q = ValuationQuery {
            filters: vec![
                ValuationFilter::Above(ValuationField::CirculatingMarketCap, 10.0),
                ValuationFilter::Below(ValuationField::MarketCap, 85.0),
            ],
            ..Default::default()
        };
        let t = q.apply(rows());
        assert_eq!(t.ids(), vec![SecurityId::from("C")]);
    }
}
