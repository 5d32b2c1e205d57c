//! Strategy entry point: universe → filter → select → rebalance.

use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

use crate::config::StrategyConfig;
use crate::context::StrategyContext;
use crate::error::{Error, Result};
use crate::filter::{self, FilterReport};
use crate::rebalance::{self, RebalancePlan};
use crate::schedule::MonthlySchedule;
use crate::selection;
use crate::types::SecurityId;
use crate::universe;

/// Summary of one rebalance invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RebalanceReport {
    pub date: NaiveDate,
    pub universe_size: usize,
    pub filter: FilterReport,
    pub selected: Vec<SecurityId>,
    pub plan: RebalancePlan,
    /// Instructions accepted by the broker; zero for a plan-only run.
    pub submitted: usize,
}

/// Output of the selection stages.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub universe_size: usize,
    pub filter: FilterReport,
    pub selected: Vec<SecurityId>,
}

/// Monthly equal-weight rotation into the smallest eligible names.
#[derive(Debug, Clone)]
pub struct SmallCapStrategy {
    config: StrategyConfig,
    schedule: MonthlySchedule,
}

impl SmallCapStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        let schedule = MonthlySchedule::new(config.schedule.monthday)?;
        Ok(Self { config, schedule })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn schedule(&self) -> MonthlySchedule {
        self.schedule
    }

    /// One-time startup log of the run settings.
    pub fn initialize(&self) {
        info!(
            "benchmark {}, real prices {}, rebalance on trading day {} of each month, top {} by {:?}",
            self.config.schedule.benchmark,
            self.config.schedule.use_real_price,
            self.schedule.monthday(),
            self.config.selection.top_n,
            self.config.selection.rank_by,
        );
    }

    /// Run the selection stages only.
    pub fn select(&self, ctx: &StrategyContext<'_>) -> Result<Selection> {
        let market = ctx.market();
        let candidates =
            universe::build_universe(market, &self.config.universe, &self.config.selection)?;
        let filter =
            filter::filter_eligible(market, &candidates, ctx.current_date(), &self.config.filter)?;
        let selected =
            selection::select_smallest(market, &filter.eligible, &self.config.selection)?;
        Ok(Selection {
            universe_size: candidates.len(),
            filter,
            selected,
        })
    }

    /// Compute the full report without sending orders.
    pub fn plan(&self, ctx: &StrategyContext<'_>) -> Result<RebalanceReport> {
        let Selection {
            universe_size,
            filter,
            selected,
        } = self.select(ctx)?;
        if selected.is_empty() {
            warn!(
                "{}: nothing selected from {} candidates ({filter})",
                ctx.current_date(),
                universe_size
            );
            return Err(Error::EmptySelection);
        }
        let portfolio = ctx.portfolio()?;
        let plan = rebalance::plan_rebalance(&selected, &portfolio, &self.config.rebalance)?;
        Ok(RebalanceReport {
            date: ctx.current_date(),
            universe_size,
            filter,
            selected,
            plan,
            submitted: 0,
        })
    }

    /// Scheduler callback: plan, then submit every instruction.
    pub fn rebalance(&self, ctx: &mut StrategyContext<'_>) -> Result<RebalanceReport> {
        let mut report = self.plan(ctx)?;
        report.submitted = rebalance::execute_plan(&report.plan, ctx.broker_mut())?;
        info!(
            "{}: rebalanced into {} names, {:.2} total value",
            report.date,
            report.selected.len(),
            report.plan.total_value
        );
        Ok(report)
    }
}
