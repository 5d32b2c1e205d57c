//! # smallcap-rotation
//!
//! A monthly equal-weight rotation strategy into the smallest eligible stocks
//! of a universe.
//!
//! ## Pipeline
//!
//! 1. **Universe**: every listed stock, optionally pre-capped by valuation
//! 2. **Eligibility**: drop special-treatment names, new listings, reserved
//!    segments, suspended names and names locked at the upside limit
//! 3. **Selection**: rank ascending by circulating market cap, keep the top N
//! 4. **Rebalance**: close holdings that fell out, target `1/N` of total value
//!    in each selected name
//!
//! Market data and execution are host services behind the [`MarketData`] and
//! [`Broker`] traits. [`memory`] has in-memory versions for tests.
//!
//! ## Quick Start
//!
//! ```
//! use chrono::NaiveDate;
//! use smallcap_rotation::memory::{InMemoryMarket, PaperBroker};
//! use smallcap_rotation::types::Session;
//! use smallcap_rotation::{SmallCapStrategy, StrategyConfig, StrategyContext};
//!
//! let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let listed = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
//! let session = |close: f64| Session { date: today, close, high_limit: close * 1.1, paused: false };
//!
//! let market = InMemoryMarket::builder()
//!     .with_security("000001.XSHE", "Alpha", listed)
//!     .with_security("000002.XSHE", "Beta", listed)
//!     .with_valuation("000001.XSHE", 12.0, 15.0)
//!     .with_valuation("000002.XSHE", 8.0, 9.0)
//!     .with_session("000001.XSHE", session(10.0))
//!     .with_session("000002.XSHE", session(5.0))
//!     .build();
//! let mut broker = PaperBroker::builder().with_cash(10_000.0).build();
//!
//! let strategy = SmallCapStrategy::new(StrategyConfig::default()).unwrap();
//! let mut ctx = StrategyContext::new(today, &market, &mut broker);
//! let report = strategy.rebalance(&mut ctx).unwrap();
//!
//! assert_eq!(report.selected.len(), 2);
//! assert_eq!(report.plan.target_values().next().unwrap().1, 5_000.0);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod memory;
pub mod query;
pub mod rebalance;
pub mod schedule;
pub mod selection;
pub mod services;
pub mod strategy;
pub mod types;
pub mod universe;

pub use config::StrategyConfig;
pub use context::StrategyContext;
pub use error::{Error, Result, ServiceError};
pub use rebalance::{OrderInstruction, RebalancePlan};
pub use schedule::MonthlySchedule;
pub use services::{Broker, MarketData};
pub use strategy::{RebalanceReport, SmallCapStrategy};
pub use types::{PortfolioSnapshot, SecurityId};
