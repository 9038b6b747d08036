//! Core entry points
//!
//! [`Dlmm`] owns the store, the price model and the planner settings. Every
//! mutating call runs in one store transaction: it either applies completely
//! or not at all.

use crate::error::{Asset, DlmmError, Result};
use crate::fees::ProtocolFees;
use crate::liquidity::{
    self, AddLiquidity, Deposit, MoveLiquidity, Relocation, WithdrawLiquidity, Withdrawal,
};
use crate::planner::{plan_swap, PlannedStep, PlannerConfig, PoolView, SwapPlan};
use crate::price::{self, validate_bin_id, PriceModel};
use crate::state::{Bin, Pool, PoolConfig, PoolId, PoolState};
use crate::store::{State, Store};
use crate::swap::{swap_in_bin, SwapDirection, SwapInput};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Result of a swap, single- or multi-bin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    /// Direction
    pub direction: SwapDirection,
    /// Input taken from the caller
    pub amount_in: u128,
    /// Output paid to the caller
    pub amount_out: u128,
    /// Total fee withheld
    pub fees: u128,
    /// Protocol share of `fees`
    pub protocol_fees: u128,
    /// Requested input that was not filled
    pub unfilled: u128,
    /// Per-bin trace
    pub steps: Vec<PlannedStep>,
    /// Active bin before the swap
    pub active_bin_before: i32,
    /// Active bin after the swap
    pub active_bin_after: i32,
}

/// Multi-bin swap request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSwap {
    /// Direction
    pub direction: SwapDirection,
    /// Input offered
    pub amount: u128,
    /// Smallest acceptable total output
    pub min_received: u128,
    /// Furthest a traversed bin may sit from the active bin
    pub max_unfavorable_bins: Option<u32>,
}

/// The DLMM engine.
#[derive(Clone, Debug, Default)]
pub struct Dlmm {
    store: Store,
    prices: PriceModel,
    planner: PlannerConfig,
    next_pool_id: PoolId,
}

fn output_floor_error(asset: Asset) -> DlmmError {
    match asset {
        Asset::X => DlmmError::MinimumXAmount,
        Asset::Y => DlmmError::MinimumYAmount,
    }
}

fn view<'a>(state: &'a State, prices: &'a PriceModel, pool_id: PoolId) -> Result<PoolView<'a>> {
    let ps = state.pool(pool_id)?;
    let grid = prices.grid(ps.pool.initial_price, ps.pool.bin_step)?;
    Ok(PoolView { state: ps, grid })
}

/// Moves tokens for an executed plan and applies every step to the bins.
fn settle(state: &mut State, pool_id: PoolId, caller: &str, plan: &SwapPlan) -> Result<SwapOutcome> {
    let direction = plan.direction;
    let (in_asset, out_asset) = (direction.input_asset(), direction.output_asset());
    let ps = state.pools.get_mut(&pool_id).ok_or(DlmmError::NoPoolData(pool_id))?;
    let in_token = ps.pool.token(in_asset).to_string();
    let out_token = ps.pool.token(out_asset).to_string();
    state.balances.debit(caller, &in_token, plan.total_input)?;
    state.balances.credit(caller, &out_token, plan.total_output)?;

    for s in &plan.steps {
        let bin = ps.bin_mut(s.bin_id);
        let retained = s.step.effective_input - s.protocol_fee;
        let r_in = bin.reserve_mut(in_asset);
        *r_in = r_in.checked_add(retained).ok_or(DlmmError::MathOverflow)?;
        let r_out = bin.reserve_mut(out_asset);
        *r_out = r_out.checked_sub(s.step.output).ok_or(DlmmError::MathOverflow)?;
        ps.protocol_fees.accrue(in_asset, s.protocol_fee)?;
    }

    let before = ps.pool.active_bin_id;
    if let Some(last) = plan.last_bin_id() {
        ps.pool.active_bin_id = last;
        if ps.bin(last).reserve(out_asset) == 0 {
            ps.pool.shift_active_bin(direction.step());
        }
    }
    Ok(SwapOutcome {
        direction,
        amount_in: plan.total_input,
        amount_out: plan.total_output,
        fees: plan.total_fees,
        protocol_fees: plan.total_protocol_fees,
        unfilled: plan.unfilled,
        steps: plan.steps.clone(),
        active_bin_before: before,
        active_bin_after: ps.pool.active_bin_id,
    })
}

/// Single-bin swap at `bin_id`, which must be the active bin.
pub(crate) fn swap_active_bin(
    state: &mut State,
    prices: &PriceModel,
    pool_id: PoolId,
    caller: &str,
    direction: SwapDirection,
    bin_id: i32,
    amount: u128,
) -> Result<SwapOutcome> {
    if amount == 0 {
        return Err(DlmmError::InvalidAmount);
    }
    let bin_id = validate_bin_id(bin_id as i64)?;
    let v = view(state, prices, pool_id)?;
    let active_bin_id = v.state.pool.active_bin_id;
    if bin_id != active_bin_id {
        return Err(DlmmError::NotActiveBin { bin_id, active_bin_id });
    }
    let price = v.grid.price_of_bin(bin_id)?;
    let fees = *v.state.pool.fees(direction.input_asset());
    let bin = v.state.bin(bin_id);
    if bin.reserve(direction.output_asset()) == 0 {
        return Err(DlmmError::NoLiquidity);
    }
    let step = swap_in_bin(&SwapInput {
        reserve_x: bin.reserve_x,
        reserve_y: bin.reserve_y,
        bin_price: price,
        remaining_input: amount,
        fee_rate_bps: fees.total_bps(),
        direction,
    });
    if step.output == 0 {
        return Err(output_floor_error(direction.output_asset()));
    }
    let protocol_fee = fees.protocol_share(step.fee_charged);
    let plan = SwapPlan {
        direction,
        active_bin_id,
        steps: vec![PlannedStep { bin_id, price, step, protocol_fee }],
        total_input: step.effective_input,
        total_output: step.output,
        total_fees: step.fee_charged,
        total_protocol_fees: protocol_fee,
        unfilled: amount - step.effective_input,
        estimated_bins: 1,
        bins_checked: 1,
    };
    settle(state, pool_id, caller, &plan)
}

/// Multi-bin swap starting at the active bin.
pub(crate) fn swap_across_bins(
    state: &mut State,
    prices: &PriceModel,
    planner: &PlannerConfig,
    pool_id: PoolId,
    caller: &str,
    req: &MultiSwap,
) -> Result<SwapOutcome> {
    let v = view(state, prices, pool_id)?;
    let plan = plan_swap(&v, req.direction, req.amount, req.max_unfavorable_bins, planner)?;
    if plan.steps.is_empty() {
        return Err(DlmmError::NoLiquidity);
    }
    if plan.total_output < req.min_received.max(1) {
        return Err(output_floor_error(req.direction.output_asset()));
    }
    settle(state, pool_id, caller, &plan)
}

pub(crate) fn add_to_pool(
    state: &mut State,
    prices: &PriceModel,
    pool_id: PoolId,
    caller: &str,
    req: &AddLiquidity,
) -> Result<Deposit> {
    let ps = state.pools.get_mut(&pool_id).ok_or(DlmmError::NoPoolData(pool_id))?;
    let grid = prices.grid(ps.pool.initial_price, ps.pool.bin_step)?;
    let d = liquidity::add_liquidity(ps, &grid, caller, req)?;
    state.balances.debit(caller, &ps.pool.x_token, d.x_amount)?;
    state.balances.debit(caller, &ps.pool.y_token, d.y_amount)?;
    Ok(d)
}

pub(crate) fn withdraw_from_pool(
    state: &mut State,
    pool_id: PoolId,
    caller: &str,
    req: &WithdrawLiquidity,
) -> Result<Withdrawal> {
    let ps = state.pools.get_mut(&pool_id).ok_or(DlmmError::NoPoolData(pool_id))?;
    let w = liquidity::withdraw_liquidity(ps, caller, req)?;
    state.balances.credit(caller, &ps.pool.x_token, w.x_amount)?;
    state.balances.credit(caller, &ps.pool.y_token, w.y_amount)?;
    Ok(w)
}

pub(crate) fn move_in_pool(
    state: &mut State,
    prices: &PriceModel,
    pool_id: PoolId,
    caller: &str,
    req: &MoveLiquidity,
) -> Result<Relocation> {
    let ps = state.pool_mut(pool_id)?;
    let grid = prices.grid(ps.pool.initial_price, ps.pool.bin_step)?;
    liquidity::move_liquidity(ps, &grid, caller, req)
}

impl Dlmm {
    /// Engine with the given price model and planner settings.
    pub fn new(prices: PriceModel, planner: PlannerConfig) -> Self {
        Self { store: Store::new(), prices, planner, next_pool_id: 1 }
    }

    /// Price model in use.
    pub fn prices(&self) -> &PriceModel { &self.prices }

    /// Planner settings in use.
    pub fn planner(&self) -> &PlannerConfig { &self.planner }

    /// Committed state, for snapshots.
    pub fn state(&self) -> &State { self.store.state() }

    pub(crate) fn store_mut(&mut self) -> (&mut Store, &PriceModel, &PlannerConfig) {
        (&mut self.store, &self.prices, &self.planner)
    }

    /// Registers a pool. Its bin step must have a factor table.
    pub fn create_pool(&mut self, cfg: &PoolConfig) -> Result<PoolId> {
        if !self.prices.is_registered(cfg.bin_step) {
            return Err(DlmmError::InvalidBinStep(cfg.bin_step));
        }
        let pool_id = self.next_pool_id.max(1);
        let pool = Pool::from_config(pool_id, cfg)?;
        self.store.atomic(|s| {
            s.pools.insert(pool_id, PoolState::new(pool));
            Ok(())
        })?;
        self.next_pool_id = pool_id + 1;
        info!(pool_id, bin_step = cfg.bin_step, initial_price = cfg.initial_price, "pool created");
        Ok(pool_id)
    }

    /// Credits `amount` of `token` to `owner`.
    pub fn fund(&mut self, owner: &str, token: &str, amount: u128) -> Result<()> {
        self.store.atomic(|s| s.balances.credit(owner, token, amount))
    }

    /// `swap-x-for-y` at the active bin.
    pub fn swap_x_for_y(&mut self, pool_id: PoolId, caller: &str, bin_id: i32, x_amount: u128) -> Result<SwapOutcome> {
        self.swap(pool_id, caller, SwapDirection::XForY, bin_id, x_amount)
    }

    /// `swap-y-for-x` at the active bin.
    pub fn swap_y_for_x(&mut self, pool_id: PoolId, caller: &str, bin_id: i32, y_amount: u128) -> Result<SwapOutcome> {
        self.swap(pool_id, caller, SwapDirection::YForX, bin_id, y_amount)
    }

    /// Single-bin swap in either direction.
    pub fn swap(&mut self, pool_id: PoolId, caller: &str, direction: SwapDirection, bin_id: i32, amount: u128) -> Result<SwapOutcome> {
        let prices = &self.prices;
        let out = self
            .store
            .atomic(|s| swap_active_bin(s, prices, pool_id, caller, direction, bin_id, amount))?;
        debug!(pool_id, ?direction, amount_in = out.amount_in, amount_out = out.amount_out, "swap");
        Ok(out)
    }

    /// Swap that walks as many bins as needed.
    pub fn swap_multi(&mut self, pool_id: PoolId, caller: &str, req: &MultiSwap) -> Result<SwapOutcome> {
        let (prices, planner) = (&self.prices, &self.planner);
        let out = self.store.atomic(|s| swap_across_bins(s, prices, planner, pool_id, caller, req))?;
        debug!(pool_id, direction = ?req.direction, bins = out.steps.len(), amount_out = out.amount_out, "multi-bin swap");
        Ok(out)
    }

    /// Read-only multi-bin quote.
    pub fn quote_swap(
        &self,
        pool_id: PoolId,
        direction: SwapDirection,
        amount: u128,
        max_unfavorable_bins: Option<u32>,
    ) -> Result<SwapPlan> {
        plan_swap(&view(self.store.state(), &self.prices, pool_id)?, direction, amount, max_unfavorable_bins, &self.planner)
    }

    /// `add-liquidity`; returns the minted shares and fees.
    pub fn add_liquidity(&mut self, pool_id: PoolId, caller: &str, req: &AddLiquidity) -> Result<Deposit> {
        let prices = &self.prices;
        self.store.atomic(|s| add_to_pool(s, prices, pool_id, caller, req))
    }

    /// `withdraw-liquidity`.
    pub fn withdraw_liquidity(&mut self, pool_id: PoolId, caller: &str, req: &WithdrawLiquidity) -> Result<Withdrawal> {
        self.store.atomic(|s| withdraw_from_pool(s, pool_id, caller, req))
    }

    /// `move-liquidity`.
    pub fn move_liquidity(&mut self, pool_id: PoolId, caller: &str, req: &MoveLiquidity) -> Result<Relocation> {
        let prices = &self.prices;
        self.store.atomic(|s| move_in_pool(s, prices, pool_id, caller, req))
    }

    /// Pays the accumulated protocol fees to the pool's fee address and
    /// zeroes the accumulator.
    pub fn claim_protocol_fees(&mut self, pool_id: PoolId) -> Result<ProtocolFees> {
        let claimed = self.store.atomic(|s| {
            let ps = s.pools.get_mut(&pool_id).ok_or(DlmmError::NoPoolData(pool_id))?;
            let (x, y) = ps.protocol_fees.take();
            s.balances.credit(&ps.pool.fee_address, &ps.pool.x_token, x)?;
            s.balances.credit(&ps.pool.fee_address, &ps.pool.y_token, y)?;
            Ok(ProtocolFees { x_fee: x, y_fee: y })
        })?;
        info!(pool_id, x = claimed.x_fee, y = claimed.y_fee, "protocol fees claimed");
        Ok(claimed)
    }

    /// Manager sets the variable component of both fee schedules.
    pub fn set_variable_fees(&mut self, pool_id: PoolId, caller: &str, x_variable_bps: u128, y_variable_bps: u128, now: u64) -> Result<()> {
        self.store.atomic(|s| {
            let pool = &mut s.pool_mut(pool_id)?.pool;
            pool.variable_fees.authorize_update(caller, now)?;
            pool.x_fees = pool.x_fees.with_variable(x_variable_bps)?;
            pool.y_fees = pool.y_fees.with_variable(y_variable_bps)?;
            pool.variable_fees.last_update = Some(now);
            Ok(())
        })
    }

    /// Anyone may zero the variable fees, at most once per cooldown window.
    pub fn reset_variable_fees(&mut self, pool_id: PoolId, now: u64) -> Result<()> {
        self.store.atomic(|s| {
            let pool = &mut s.pool_mut(pool_id)?.pool;
            pool.variable_fees.check_cooldown(now)?;
            pool.x_fees.variable_fee_bps = 0;
            pool.y_fees.variable_fee_bps = 0;
            pool.variable_fees.last_update = Some(now);
            Ok(())
        })
    }

    /// Admin replaces the variable-fee manager unless frozen.
    pub fn set_variable_fees_manager(&mut self, pool_id: PoolId, caller: &str, manager: &str) -> Result<()> {
        self.store.atomic(|s| {
            let pool = &mut s.pool_mut(pool_id)?.pool;
            if caller != pool.admin {
                return Err(DlmmError::NotAuthorized);
            }
            pool.variable_fees.set_manager(manager)
        })
    }

    /// Admin permanently fixes the variable-fee manager.
    pub fn freeze_variable_fees_manager(&mut self, pool_id: PoolId, caller: &str) -> Result<()> {
        self.store.atomic(|s| {
            let pool = &mut s.pool_mut(pool_id)?.pool;
            if caller != pool.admin {
                return Err(DlmmError::NotAuthorized);
            }
            if pool.variable_fees.manager_frozen {
                return Err(DlmmError::VariableFeesManagerFrozen);
            }
            pool.variable_fees.manager_frozen = true;
            Ok(())
        })
    }

    /// Admin changes the variable-fee cooldown.
    pub fn set_variable_fees_cooldown(&mut self, pool_id: PoolId, caller: &str, cooldown: u64) -> Result<()> {
        self.store.atomic(|s| {
            let pool = &mut s.pool_mut(pool_id)?.pool;
            if caller != pool.admin {
                return Err(DlmmError::NotAuthorized);
            }
            pool.variable_fees.cooldown = cooldown;
            Ok(())
        })
    }

    /// `get-bin-price`.
    pub fn get_bin_price(&self, initial_price: u128, bin_step: u16, bin_id: i32) -> Result<u128> {
        self.prices.bin_price(initial_price, bin_step, bin_id)
    }

    /// `get-bin-balances`.
    pub fn get_bin_balances(&self, pool_id: PoolId, bin_id: i32) -> Result<Bin> {
        let bin_id = validate_bin_id(bin_id as i64)?;
        Ok(self.store.state().pool(pool_id)?.bin(bin_id))
    }

    /// `get-pool`.
    pub fn get_pool(&self, pool_id: PoolId) -> Result<Pool> {
        Ok(self.store.state().pool(pool_id)?.pool.clone())
    }

    /// `get-unclaimed-protocol-fees`.
    pub fn get_unclaimed_protocol_fees(&self, pool_id: PoolId) -> Result<ProtocolFees> {
        Ok(self.store.state().pool(pool_id)?.protocol_fees)
    }

    /// Shares `owner` holds in `bin_id`.
    pub fn get_position(&self, pool_id: PoolId, owner: &str, bin_id: i32) -> Result<u128> {
        Ok(self.store.state().pool(pool_id)?.position(owner, bin_id))
    }

    /// Token balance of `owner`.
    pub fn get_user_balance(&self, owner: &str, token: &str) -> u128 { self.store.state().balances.get(owner, token) }

    /// `get-signed-bin-id`.
    pub fn get_signed_bin_id(&self, unsigned: u32) -> Result<i32> { price::to_signed_bin_id(unsigned) }

    /// `get-unsigned-bin-id`.
    pub fn get_unsigned_bin_id(&self, bin_id: i32) -> Result<u32> { price::to_unsigned_bin_id(bin_id) }
}
