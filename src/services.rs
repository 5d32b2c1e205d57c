//! Service seams: market data and broker.
//!
//! The strategy never talks to a vendor API directly. Hosts implement these
//! traits over their own data feed and execution venue; [`crate::memory`]
//! provides in-memory versions for tests and offline runs.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result, ServiceError};
use crate::query::{SessionQuery, ValuationQuery, ValuationTable};
use crate::types::{PortfolioSnapshot, SecurityId, SecurityInfo, SecurityKind, Session};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Lift a market-data failure into the strategy error.
pub fn as_market_error<T>(result: ServiceResult<T>) -> Result<T> {
    result.map_err(Error::MarketData)
}

/// Read-only market and fundamentals data.
pub trait MarketData {
    /// All tradable identifiers of `kind` as of now.
    fn all_securities(&self, kind: SecurityKind) -> ServiceResult<Vec<SecurityId>>;

    /// Valuation rows matching `query`, sorted and truncated as requested.
    fn valuations(&self, query: &ValuationQuery) -> ServiceResult<ValuationTable>;

    /// Display name and listing date, `None` when the service has no record.
    fn security_info(&self, id: &SecurityId) -> ServiceResult<Option<SecurityInfo>>;

    /// Latest session within `[query.start, query.end]` for each requested id.
    ///
    /// Identifiers with no session in the window are absent from the map.
    fn latest_sessions(
        &self,
        query: &SessionQuery,
    ) -> ServiceResult<FxHashMap<SecurityId, Session>>;
}

/// Portfolio state plus value-targeted order instructions.
///
/// Orders are fire-and-forget: implementations own fill tracking.
pub trait Broker {
    fn portfolio(&self) -> ServiceResult<PortfolioSnapshot>;

    /// Set the holding of `id` to zero.
    fn close_position(&mut self, id: &SecurityId) -> ServiceResult<()>;

    /// Adjust the holding of `id` to monetary value `value`.
    fn order_target_value(&mut self, id: &SecurityId, value: f64) -> ServiceResult<()>;
}
