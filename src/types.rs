//! Core types: SecurityId, SecurityInfo, Session, Holding, PortfolioSnapshot

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a tradable instrument, e.g. `"000001.XSHE"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityId(String);

impl SecurityId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the identifier starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SecurityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecurityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SecurityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Instrument class requested from the universe listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityKind {
    #[default]
    Stock,
    Fund,
    Index,
}

/// Static metadata for one security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub display_name: String,
    pub start_date: NaiveDate,
}

impl SecurityInfo {
    /// Whole calendar days between listing and `date` (negative if not yet listed).
    pub fn days_listed(&self, date: NaiveDate) -> i64 {
        (date - self.start_date).num_days()
    }
}

/// One daily trading session for a security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub date: NaiveDate,
    pub close: f64,
    /// Upside price limit for the session.
    pub high_limit: f64,
    #[serde(default)]
    pub paused: bool,
}

impl Session {
    /// Both the close and the upside limit are finite numbers.
    pub fn has_valid_prices(&self) -> bool {
        self.close.is_finite() && self.high_limit.is_finite()
    }

    /// Close at or above the upside limit.
    pub fn is_limit_up(&self) -> bool {
        self.close >= self.high_limit
    }
}

/// An externally held position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: SecurityId,
    pub quantity: i64,
    /// Current monetary value of the position.
    pub value: f64,
}

/// Read-only view of the portfolio taken at the start of a rebalance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub holdings: Vec<Holding>,
    pub cash: f64,
    pub total_value: f64,
}

impl PortfolioSnapshot {
    pub fn holding(&self, id: &SecurityId) -> Option<&Holding> {
        self.holdings.iter().find(|h| &h.id == id)
    }

    /// Current weight of `id` in the portfolio; 0.0 when not held or the
    /// portfolio has no value.
    pub fn weight_of(&self, id: &SecurityId) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.holding(id).map_or(0.0, |h| h.value / self.total_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn security_id_display_and_prefix() {
        let id = SecurityId::from("N830799.BJ");
        assert_eq!(format!("{id}"), "N830799.BJ");
        assert!(id.has_prefix("N"));
        assert!(!id.has_prefix("6"));
    }

    #[test]
    fn security_id_serde_transparent() {
        let id = SecurityId::new("600000.XSHG");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"600000.XSHG\"");
    }

    #[test]
    fn days_listed() {
        let info = SecurityInfo {
            display_name: "Ping An".into(),
            start_date: date(2024, 1, 1),
        };
        assert_eq!(info.days_listed(date(2024, 1, 21)), 20);
        assert_eq!(info.days_listed(date(2023, 12, 31)), -1);
    }

    #[test]
    fn limit_up_at_or_above() {
        let mut s = Session {
            date: date(2024, 3, 1),
            close: 11.0,
            high_limit: 11.0,
            paused: false,
        };
        assert!(s.is_limit_up());
        s.close = 10.99;
        assert!(!s.is_limit_up());
    }

    #[test]
    fn non_finite_prices_are_invalid() {
        let mut s = Session {
            date: date(2024, 3, 1),
            close: 10.0,
            high_limit: 11.0,
            paused: false,
        };
        assert!(s.has_valid_prices());
        s.high_limit = f64::NAN;
        assert!(!s.has_valid_prices());
        s.high_limit = 11.0;
        s.close = f64::INFINITY;
        assert!(!s.has_valid_prices());
    }

    #[test]
    fn weight_of_held_and_unheld() {
        let snap = PortfolioSnapshot {
            holdings: vec![Holding {
                id: "A".into(),
                quantity: 100,
                value: 2_500.0,
            }],
            cash: 7_500.0,
            total_value: 10_000.0,
        };
        assert_eq!(snap.weight_of(&"A".into()), 0.25);
        assert_eq!(snap.weight_of(&"B".into()), 0.0);
    }
}
