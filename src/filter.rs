//! Eligibility filter.
//!
//! A security survives only if every exclusion rule passes:
//!
//! | Rule | Excluded when |
//! |------|---------------|
//! | special treatment | display name starts with a configured prefix (`ST`, `*ST`) |
//! | new listing | listed fewer than `min_listing_days` calendar days ago |
//! | exchange segment | identifier starts with a reserved prefix |
//! | suspended | latest session in the lookback window is paused, or no session exists |
//! | bad price | latest close or upside limit is not a finite number |
//! | limit-up | latest close is at or above the session's upside limit |
//!
//! Missing metadata or session data makes a security ineligible; it is never
//! an error.

use std::fmt;

use chrono::{Days, NaiveDate};
use log::{debug, info};
use serde::Serialize;

use crate::config::FilterConfig;
use crate::error::Result;
use crate::query::SessionQuery;
use crate::services::{MarketData, as_market_error};
use crate::types::{SecurityId, SecurityInfo, Session};

/// Why a security was excluded. Only the first failing rule is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    SpecialTreatment,
    NewListing,
    ReservedSegment,
    NoMetadata,
    Suspended,
    NoSession,
    BadPrice,
    LimitUp,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Exclusion::SpecialTreatment => "special treatment",
            Exclusion::NewListing => "new listing",
            Exclusion::ReservedSegment => "reserved segment",
            Exclusion::NoMetadata => "no metadata",
            Exclusion::Suspended => "suspended",
            Exclusion::NoSession => "no session",
            Exclusion::BadPrice => "bad price",
            Exclusion::LimitUp => "limit up",
        };
        f.write_str(s)
    }
}

/// Outcome of one filter pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    pub eligible: Vec<SecurityId>,
    pub excluded: Vec<(SecurityId, Exclusion)>,
}

impl FilterReport {
    pub fn count(&self, reason: Exclusion) -> usize {
        self.excluded.iter().filter(|(_, r)| *r == reason).count()
    }

    pub fn reason_for(&self, id: &SecurityId) -> Option<Exclusion> {
        self.excluded
            .iter()
            .find(|(excluded, _)| excluded == id)
            .map(|(_, r)| *r)
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} eligible, {} excluded",
            self.eligible.len(),
            self.excluded.len()
        )?;
        const ALL: [Exclusion; 8] = [
            Exclusion::SpecialTreatment,
            Exclusion::NewListing,
            Exclusion::ReservedSegment,
            Exclusion::NoMetadata,
            Exclusion::Suspended,
            Exclusion::NoSession,
            Exclusion::BadPrice,
            Exclusion::LimitUp,
        ];
        for reason in ALL {
            let n = self.count(reason);
            if n > 0 {
                write!(f, ", {reason}: {n}")?;
            }
        }
        Ok(())
    }
}

/// Per-security rules that need only static metadata.
pub fn check_static(
    id: &SecurityId,
    info: Option<&SecurityInfo>,
    date: NaiveDate,
    config: &FilterConfig,
) -> Option<Exclusion> {
    let Some(info) = info else {
        return Some(Exclusion::NoMetadata);
    };
    if config
        .special_treatment_prefixes
        .iter()
        .any(|p| info.display_name.starts_with(p.as_str()))
    {
        return Some(Exclusion::SpecialTreatment);
    }
    if info.days_listed(date) < config.min_listing_days {
        return Some(Exclusion::NewListing);
    }
    if config.excluded_prefixes.iter().any(|p| id.has_prefix(p)) {
        return Some(Exclusion::ReservedSegment);
    }
    None
}

/// Rules on the latest trading session.
pub fn check_session(session: Option<&Session>, config: &FilterConfig) -> Option<Exclusion> {
    let Some(session) = session else {
        return Some(Exclusion::NoSession);
    };
    if session.paused {
        return Some(Exclusion::Suspended);
    }
    if !session.has_valid_prices() {
        return Some(Exclusion::BadPrice);
    }
    if config.exclude_limit_up && session.is_limit_up() {
        return Some(Exclusion::LimitUp);
    }
    None
}

/// Run every exclusion rule over `candidates` as of `date`.
///
/// The eligible list keeps the candidates' input order.
pub fn filter_eligible(
    market: &dyn MarketData,
    candidates: &[SecurityId],
    date: NaiveDate,
    config: &FilterConfig,
) -> Result<FilterReport> {
    let mut report = FilterReport::default();
    let mut survivors = Vec::with_capacity(candidates.len());

    for id in candidates {
        let info = as_market_error(market.security_info(id))?;
        match check_static(id, info.as_ref(), date, config) {
            Some(reason) => report.excluded.push((id.clone(), reason)),
            None => survivors.push(id.clone()),
        }
    }

    if !survivors.is_empty() {
        let lookback = u64::try_from(config.session_lookback_days).unwrap_or(0);
        let start = date.checked_sub_days(Days::new(lookback)).unwrap_or(date);
        let query = SessionQuery {
            ids: survivors.clone(),
            start,
            end: date,
        };
        let sessions = as_market_error(market.latest_sessions(&query))?;

        for id in survivors {
            match check_session(sessions.get(&id), config) {
                Some(reason) => report.excluded.push((id, reason)),
                None => report.eligible.push(id),
            }
        }
    }

    for (id, reason) in &report.excluded {
        debug!("excluded {id}: {reason}");
    }
    info!("eligibility filter on {date}: {report}");
    Ok(report)
}
