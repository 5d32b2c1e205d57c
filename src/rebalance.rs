//! Rebalance planning and order submission.
//!
//! Equal-weight policy: every selected security targets `1 / |selected|` of
//! the portfolio's total value. Holdings outside the selection are closed.
//! Planning is pure; only [`execute_plan`] touches the broker.

use std::fmt;

use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::RebalanceConfig;
use crate::error::{Error, Result};
use crate::services::Broker;
use crate::types::{PortfolioSnapshot, SecurityId};

/// One instruction for the execution service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderInstruction {
    /// Set the holding to zero.
    Liquidate { id: SecurityId },
    /// Adjust the holding to `value`.
    TargetValue { id: SecurityId, value: f64 },
}

impl OrderInstruction {
    pub fn id(&self) -> &SecurityId {
        match self {
            OrderInstruction::Liquidate { id } | OrderInstruction::TargetValue { id, .. } => id,
        }
    }
}

impl fmt::Display for OrderInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderInstruction::Liquidate { id } => write!(f, "CLOSE {id}"),
            OrderInstruction::TargetValue { id, value } => write!(f, "TARGET {id} {value:.2}"),
        }
    }
}

/// Computed rebalance: weights plus the ordered instruction list.
#[derive(Debug, Clone, Serialize)]
pub struct RebalancePlan {
    pub total_value: f64,
    pub targets: Vec<(SecurityId, f64)>,
    /// Liquidations first, then target-value orders in selection order.
    pub instructions: Vec<OrderInstruction>,
}

impl RebalancePlan {
    pub fn liquidations(&self) -> impl Iterator<Item = &SecurityId> {
        self.instructions.iter().filter_map(|o| match o {
            OrderInstruction::Liquidate { id } => Some(id),
            _ => None,
        })
    }

    pub fn target_values(&self) -> impl Iterator<Item = (&SecurityId, f64)> {
        self.instructions.iter().filter_map(|o| match o {
            OrderInstruction::TargetValue { id, value } => Some((id, *value)),
            _ => None,
        })
    }

    pub fn weight_sum(&self) -> f64 {
        self.targets.iter().map(|(_, w)| w).sum()
    }
}

/// Equal target weights for `selected`.
///
/// An empty selection is an error: there is no weight to divide.
pub fn equal_weights(selected: &[SecurityId]) -> Result<Vec<(SecurityId, f64)>> {
    if selected.is_empty() {
        return Err(Error::EmptySelection);
    }
    let weight = 1.0 / selected.len() as f64;
    Ok(selected.iter().map(|id| (id.clone(), weight)).collect())
}

/// Compute the instructions that move `portfolio` to equal weights over
/// `selected`.
///
/// Every held security outside `selected` gets exactly one liquidation.
/// Every selected security gets one target-value order, unless
/// `min_weight_drift` is positive and its current weight is already within
/// that distance of the target.
pub fn plan_rebalance(
    selected: &[SecurityId],
    portfolio: &PortfolioSnapshot,
    config: &RebalanceConfig,
) -> Result<RebalancePlan> {
    let targets = equal_weights(selected)?;

    let total_value = portfolio.total_value;
    if !total_value.is_finite() || total_value < 0.0 {
        return Err(Error::InvalidPortfolioValue(total_value));
    }

    let selected_set: FxHashSet<&SecurityId> = selected.iter().collect();
    let mut instructions = Vec::with_capacity(portfolio.holdings.len() + targets.len());

    // 1. Close holdings no longer selected
    let mut closed: FxHashSet<&SecurityId> = FxHashSet::default();
    for holding in &portfolio.holdings {
        if selected_set.contains(&holding.id) || !closed.insert(&holding.id) {
            continue;
        }
        instructions.push(OrderInstruction::Liquidate {
            id: holding.id.clone(),
        });
    }

    // 2. Resize each target
    for (id, weight) in &targets {
        if config.min_weight_drift > 0.0 {
            let drift = (portfolio.weight_of(id) - weight).abs();
            if drift < config.min_weight_drift {
                debug!("{id} within drift ({drift:.6}), skipping");
                continue;
            }
        }
        instructions.push(OrderInstruction::TargetValue {
            id: id.clone(),
            value: total_value * weight,
        });
    }

    Ok(RebalancePlan {
        total_value,
        targets,
        instructions,
    })
}

/// Submit every instruction in order. The first failure aborts the run;
/// instructions already sent stay sent.
pub fn execute_plan(plan: &RebalancePlan, broker: &mut dyn Broker) -> Result<usize> {
    for (i, order) in plan.instructions.iter().enumerate() {
        debug!("[{}/{}] {order}", i + 1, plan.instructions.len());
        let sent = match order {
            OrderInstruction::Liquidate { id } => broker.close_position(id),
            OrderInstruction::TargetValue { id, value } => broker.order_target_value(id, *value),
        };
        sent.map_err(|source| Error::Order {
            id: order.id().clone(),
            source,
        })?;
    }
    info!(
        "submitted {} instructions ({} closes)",
        plan.instructions.len(),
        plan.liquidations().count()
    );
    Ok(plan.instructions.len())
}
