//! Multi-bin traversal planner
//!
//! Fills an order too large for the active bin by walking adjacent bins in
//! price order: estimate how many bins are needed, discover candidates with
//! liquidity of the asset being bought, sort them best price first, then feed
//! each one the unfilled remainder through [`swap_in_bin`].

use crate::constants::{
    DISCOVERY_FACTOR, ESTIMATE_SAMPLE_BINS, FEE_SCALE_BPS, HUGE_TRADE, LARGE_TRADE_SAFETY_FACTOR,
    MAX_BIN_ID, MAX_ESTIMATED_BINS, MIN_BINS_CHECKED, MIN_BIN_ID, SINGLE_BIN_UTILIZATION_BPS,
    VERY_LARGE_TRADE,
};
use crate::error::{DlmmError, Result};
use crate::fees::FeeSchedule;
use crate::math::{mul_div_saturating, Rounding};
use crate::price::Grid;
use crate::state::{Bin, PoolState};
use crate::swap::{swap_in_bin, SwapDirection, SwapInput, SwapStep};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Read access the planner needs to a pool.
pub trait BinBook {
    /// Current active bin.
    fn active_bin_id(&self) -> i32;
    /// Bin reserves; never-funded bins read as empty.
    fn bin(&self, bin_id: i32) -> Bin;
    /// Price of `bin_id`.
    fn price(&self, bin_id: i32) -> Result<u128>;
    /// Fee schedule charged on the input of `direction`.
    fn fees(&self, direction: SwapDirection) -> FeeSchedule;
}

/// A [`PoolState`] paired with its price grid.
#[derive(Clone, Copy, Debug)]
pub struct PoolView<'a> {
    /// Pool being read
    pub state: &'a PoolState,
    /// Its price ladder
    pub grid: Grid<'a>,
}

impl BinBook for PoolView<'_> {
    fn active_bin_id(&self) -> i32 { self.state.pool.active_bin_id }
    fn bin(&self, bin_id: i32) -> Bin { self.state.bin(bin_id) }
    fn price(&self, bin_id: i32) -> Result<u128> { self.grid.price_of_bin(bin_id) }
    fn fees(&self, direction: SwapDirection) -> FeeSchedule { *self.state.pool.fees(direction.input_asset()) }
}

/// Estimation and discovery knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Active-bin utilisation below which one bin is assumed, bps
    pub single_bin_utilization_bps: u128,
    /// Neighbours sampled for average liquidity
    pub sample_bins: i32,
    /// Orders above this get the safety factor
    pub very_large_trade: u128,
    /// Orders above this go straight to the cap
    pub huge_trade: u128,
    /// Multiplier for very large orders
    pub safety_factor: u32,
    /// Cap on the estimate
    pub max_estimated_bins: u32,
    /// Candidates scanned per estimated bin
    pub discovery_factor: u32,
    /// Floor on candidates scanned
    pub min_bins_checked: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            single_bin_utilization_bps: SINGLE_BIN_UTILIZATION_BPS,
            sample_bins: ESTIMATE_SAMPLE_BINS,
            very_large_trade: VERY_LARGE_TRADE,
            huge_trade: HUGE_TRADE,
            safety_factor: LARGE_TRADE_SAFETY_FACTOR,
            max_estimated_bins: MAX_ESTIMATED_BINS,
            discovery_factor: DISCOVERY_FACTOR,
            min_bins_checked: MIN_BINS_CHECKED,
        }
    }
}

/// A bin found during discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Bin id
    pub bin_id: i32,
    /// Bin price
    pub price: u128,
    /// Reserves at discovery time
    pub bin: Bin,
}

/// One executed leg of a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// Bin traded against
    pub bin_id: i32,
    /// Its price
    pub price: u128,
    /// Calculator result
    pub step: SwapStep,
    /// Protocol share of `step.fee_charged`
    pub protocol_fee: u128,
}

/// Full traversal result; nothing has been applied yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPlan {
    /// Direction
    pub direction: SwapDirection,
    /// Active bin when planning started
    pub active_bin_id: i32,
    /// Legs in execution order
    pub steps: Vec<PlannedStep>,
    /// Input consumed across all legs
    pub total_input: u128,
    /// Output produced across all legs
    pub total_output: u128,
    /// Fees withheld across all legs
    pub total_fees: u128,
    /// Protocol share of `total_fees`
    pub total_protocol_fees: u128,
    /// Requested input left unfilled
    pub unfilled: u128,
    /// Bin-count estimate used to size discovery
    pub estimated_bins: u32,
    /// Candidate bins scanned
    pub bins_checked: u32,
}

impl SwapPlan {
    /// Last bin traded against, if any.
    pub fn last_bin_id(&self) -> Option<i32> { self.steps.last().map(|s| s.bin_id) }
}

fn in_range(bin_id: i32) -> bool { (MIN_BIN_ID..=MAX_BIN_ID).contains(&bin_id) }

/// How many bins an order of `amount` is expected to need.
pub fn estimate_bin_count(book: &impl BinBook, direction: SwapDirection, amount: u128, cfg: &PlannerConfig) -> u32 {
    if amount > cfg.huge_trade {
        return cfg.max_estimated_bins;
    }
    let active_id = book.active_bin_id();
    let active = book.bin(active_id);
    let smaller = active.reserve_x.min(active.reserve_y);
    let single_bin_cap = mul_div_saturating(smaller, cfg.single_bin_utilization_bps, FEE_SCALE_BPS, Rounding::Floor);
    if amount <= single_bin_cap {
        return 1;
    }

    let mut sum = 0u128;
    let mut sampled = 0u128;
    for k in 1..=cfg.sample_bins {
        let id = active_id + k * direction.step();
        if !in_range(id) {
            break;
        }
        let b = book.bin(id);
        if b.reserve_x > 0 || b.reserve_y > 0 {
            sum = sum.saturating_add(b.reserve_x.min(b.reserve_y));
            sampled += 1;
        }
    }
    let avg = if sampled == 0 { 0 } else { sum / sampled };
    if avg == 0 {
        return cfg.max_estimated_bins;
    }
    let mut estimate = u32::try_from(amount / avg).unwrap_or(u32::MAX).saturating_add(1);
    if amount > cfg.very_large_trade {
        estimate = estimate.saturating_mul(cfg.safety_factor);
    }
    estimate.min(cfg.max_estimated_bins)
}

/// Bins holding the asset being bought, best price first.
///
/// Scans at most `max(estimate * discovery_factor, min_bins_checked)` bins
/// starting at the active bin and stepping in the trade direction. Returns
/// the candidates and the number of bins scanned.
pub fn discover_bins(
    book: &impl BinBook,
    direction: SwapDirection,
    estimate: u32,
    cfg: &PlannerConfig,
) -> Result<(Vec<Candidate>, u32)> {
    let limit = estimate.saturating_mul(cfg.discovery_factor).max(cfg.min_bins_checked);
    let wanted = direction.output_asset();
    let mut found = Vec::new();
    let mut checked = 0u32;
    let mut id = book.active_bin_id();
    while checked < limit && in_range(id) {
        checked += 1;
        let bin = book.bin(id);
        if bin.reserve(wanted) > 0 {
            found.push(Candidate { bin_id: id, price: book.price(id)?, bin });
        }
        id += direction.step();
    }
    match direction {
        SwapDirection::XForY => found.sort_by(|a, b| b.price.cmp(&a.price)),
        SwapDirection::YForX => found.sort_by(|a, b| a.price.cmp(&b.price)),
    }
    Ok((found, checked))
}

/// Plans a swap of `amount` across as many bins as needed.
///
/// Partial fills are not errors; the unfilled remainder is reported in
/// [`SwapPlan::unfilled`]. Reaching a bin more than `max_unfavorable_bins`
/// away from the active bin fails the whole plan.
pub fn plan_swap(
    book: &impl BinBook,
    direction: SwapDirection,
    amount: u128,
    max_unfavorable_bins: Option<u32>,
    cfg: &PlannerConfig,
) -> Result<SwapPlan> {
    if amount == 0 {
        return Err(DlmmError::InvalidAmount);
    }
    let active_bin_id = book.active_bin_id();
    let fees = book.fees(direction);
    let estimated_bins = estimate_bin_count(book, direction, amount, cfg);
    let (candidates, bins_checked) = discover_bins(book, direction, estimated_bins, cfg)?;

    let mut plan = SwapPlan {
        direction,
        active_bin_id,
        steps: Vec::with_capacity(candidates.len()),
        total_input: 0,
        total_output: 0,
        total_fees: 0,
        total_protocol_fees: 0,
        unfilled: amount,
        estimated_bins,
        bins_checked,
    };

    for c in candidates {
        if plan.unfilled == 0 {
            break;
        }
        let step = swap_in_bin(&SwapInput {
            reserve_x: c.bin.reserve_x,
            reserve_y: c.bin.reserve_y,
            bin_price: c.price,
            remaining_input: plan.unfilled,
            fee_rate_bps: fees.total_bps(),
            direction,
        });
        if step.effective_input == 0 {
            continue;
        }
        // Remaining input buys nothing here or in any worse-priced bin.
        if step.output == 0 {
            break;
        }
        let distance = c.bin_id.abs_diff(active_bin_id);
        if let Some(max) = max_unfavorable_bins {
            if distance > max {
                return Err(DlmmError::BinSlippage { bin_id: c.bin_id, distance, max });
            }
        }
        let protocol_fee = fees.protocol_share(step.fee_charged);
        debug!(
            bin_id = c.bin_id,
            price = c.price,
            input = step.effective_input,
            output = step.output,
            fee = step.fee_charged,
            "planned bin step"
        );
        plan.unfilled -= step.effective_input;
        plan.total_input += step.effective_input;
        plan.total_output += step.output;
        plan.total_fees += step.fee_charged;
        plan.total_protocol_fees += protocol_fee;
        plan.steps.push(PlannedStep { bin_id: c.bin_id, price: c.price, step, protocol_fee });
    }
    Ok(plan)
}
