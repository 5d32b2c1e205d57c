//! Per-invocation context handed to every pipeline stage.

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::services::{Broker, MarketData};
use crate::types::PortfolioSnapshot;

/// Everything one rebalance call needs: the evaluation date and the service
/// handles. Borrowing the broker mutably keeps one rebalance in flight per
/// broker.
pub struct StrategyContext<'a> {
    current_date: NaiveDate,
    market: &'a dyn MarketData,
    broker: &'a mut dyn Broker,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        current_date: NaiveDate,
        market: &'a dyn MarketData,
        broker: &'a mut dyn Broker,
    ) -> Self {
        Self {
            current_date,
            market,
            broker,
        }
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn market(&self) -> &dyn MarketData {
        self.market
    }

    pub fn broker_mut(&mut self) -> &mut dyn Broker {
        &mut *self.broker
    }

    /// Fresh portfolio snapshot from the broker.
    pub fn portfolio(&self) -> Result<PortfolioSnapshot> {
        self.broker.portfolio().map_err(Error::Portfolio)
    }
}
