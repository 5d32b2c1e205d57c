//! Error types for the strategy.

use std::path::PathBuf;

use crate::types::SecurityId;

/// Failures reported by an external market-data or broker service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unknown security: {0}")]
    UnknownSecurity(String),

    #[error("{0}")]
    Other(String),
}

/// All errors that can abort a rebalance run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read market fixture {path}: {source}")]
    FixtureRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse market fixture: {0}")]
    FixtureParse(#[from] serde_json::Error),

    #[error("no eligible securities selected; refusing to rebalance")]
    EmptySelection,

    #[error("portfolio total value {0} is not a usable rebalance base")]
    InvalidPortfolioValue(f64),

    #[error("market data error: {0}")]
    MarketData(#[source] ServiceError),

    #[error("portfolio service error: {0}")]
    Portfolio(#[source] ServiceError),

    #[error("order for {id} failed: {source}")]
    Order {
        id: SecurityId,
        source: ServiceError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Error::EmptySelection.to_string(),
            "no eligible securities selected; refusing to rebalance"
        );
        let err = Error::Order {
            id: "000001.XSHE".into(),
            source: ServiceError::Rejected("lot size".into()),
        };
        assert_eq!(
            err.to_string(),
            "order for 000001.XSHE failed: request rejected: lot size"
        );
    }

    #[test]
    fn service_error_is_source() {
        let err = Error::MarketData(ServiceError::Connection("timeout".into()));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "connection error: timeout");
    }
}
