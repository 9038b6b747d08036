//! Liquidity accounting: share minting, burning and moving per bin
//!
//! These functions mutate one [`PoolState`] only; moving tokens between the
//! caller and the pool is the engine's job. Callers run them inside a store
//! transaction so a failure part-way leaves nothing behind.

use crate::constants::{FEE_SCALE_BPS, PRICE_SCALE_BPS};
use crate::error::{Asset, DlmmError, Result};
use crate::math::{isqrt, mul_div, mul_div_u256, value_in_y, Rounding};
use crate::price::{validate_bin_id, Grid};
use crate::state::{Composition, PoolState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Deposit request for one bin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidity {
    /// Target bin
    pub bin_id: i32,
    /// X supplied, fee included
    pub x_amount: u128,
    /// Y supplied, fee included
    pub y_amount: u128,
    /// Fewest shares the caller accepts
    pub min_shares: u128,
    /// Largest X liquidity fee the caller accepts
    pub max_x_fee: u128,
    /// Largest Y liquidity fee the caller accepts
    pub max_y_fee: u128,
}

/// Outcome of a deposit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Shares minted to the caller
    pub shares: u128,
    /// X taken from the caller
    pub x_amount: u128,
    /// Y taken from the caller
    pub y_amount: u128,
    /// X retained as liquidity fee
    pub x_fee: u128,
    /// Y retained as liquidity fee
    pub y_fee: u128,
}

/// Withdrawal request for one bin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawLiquidity {
    /// Source bin
    pub bin_id: i32,
    /// Shares to burn
    pub shares: u128,
    /// Minimum X paid out
    pub min_x: u128,
    /// Minimum Y paid out
    pub min_y: u128,
}

/// Outcome of a withdrawal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Shares burned
    pub shares: u128,
    /// X paid out
    pub x_amount: u128,
    /// Y paid out
    pub y_amount: u128,
}

/// Request to move shares from one bin to another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLiquidity {
    /// Source bin
    pub from_bin_id: i32,
    /// Destination bin
    pub to_bin_id: i32,
    /// Shares burned in the source
    pub shares: u128,
    /// Fewest shares minted in the destination
    pub min_shares: u128,
    /// Largest X liquidity fee in the destination
    pub max_x_fee: u128,
    /// Largest Y liquidity fee in the destination
    pub max_y_fee: u128,
}

/// Outcome of a move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// Source side
    pub withdrawn: Withdrawal,
    /// Destination side
    pub deposited: Deposit,
}

/// Liquidity fee on `amount` at `rate_bps`, floored.
fn liquidity_fee(amount: u128, rate_bps: u128) -> Result<u128> {
    mul_div(amount, rate_bps.min(FEE_SCALE_BPS), FEE_SCALE_BPS, Rounding::Floor)
}

/// Mints shares for a deposit into `req.bin_id` and credits `owner`.
///
/// Bins below the active bin take Y only, bins above take X only, the active
/// bin takes both. Active-bin deposits pay the provider + variable fee rate of
/// each asset; the fee stays in the bin for existing providers.
pub fn add_liquidity(state: &mut PoolState, grid: &Grid<'_>, owner: &str, req: &AddLiquidity) -> Result<Deposit> {
    let bin_id = validate_bin_id(req.bin_id as i64)?;
    let active = state.pool.active_bin_id;
    Composition::of(bin_id, active).check(bin_id, req.x_amount, req.y_amount)?;
    let price = grid.price_of_bin(bin_id)?;

    let (x_fee, y_fee) = if bin_id == active {
        (
            liquidity_fee(req.x_amount, state.pool.fees(Asset::X).liquidity_fee_bps())?,
            liquidity_fee(req.y_amount, state.pool.fees(Asset::Y).liquidity_fee_bps())?,
        )
    } else {
        (0, 0)
    };
    if x_fee > req.max_x_fee {
        return Err(DlmmError::MaximumXLiquidityFee { fee: x_fee, max: req.max_x_fee });
    }
    if y_fee > req.max_y_fee {
        return Err(DlmmError::MaximumYLiquidityFee { fee: y_fee, max: req.max_y_fee });
    }

    let bin = state.bin(bin_id);
    let added_value = value_in_y(req.x_amount - x_fee, req.y_amount - y_fee, price, PRICE_SCALE_BPS);
    let bin_value = value_in_y(bin.reserve_x, bin.reserve_y, price, PRICE_SCALE_BPS);
    let shares = if bin.total_shares == 0 || bin_value.is_zero() {
        isqrt(added_value)
    } else {
        mul_div_u256(added_value, bin.total_shares, bin_value)?
    };
    let floor = req.min_shares.max(1);
    if shares < floor {
        return Err(DlmmError::MinimumLpAmount { minted: shares, min: floor });
    }

    let position = state.position(owner, bin_id).checked_add(shares).ok_or(DlmmError::MathOverflow)?;
    let b = state.bin_mut(bin_id);
    b.reserve_x = b.reserve_x.checked_add(req.x_amount).ok_or(DlmmError::MathOverflow)?;
    b.reserve_y = b.reserve_y.checked_add(req.y_amount).ok_or(DlmmError::MathOverflow)?;
    b.total_shares = b.total_shares.checked_add(shares).ok_or(DlmmError::MathOverflow)?;
    state.set_position(owner, bin_id, position);

    debug!(bin_id, shares, x = req.x_amount, y = req.y_amount, x_fee, y_fee, "liquidity added");
    Ok(Deposit { shares, x_amount: req.x_amount, y_amount: req.y_amount, x_fee, y_fee })
}

/// Payout for burning `req.shares` of `owner` in `req.bin_id`, without
/// touching state.
///
/// An empty bin is refused with [`DlmmError::NoBinShares`] before any
/// division is attempted.
pub fn quote_withdrawal(state: &PoolState, owner: &str, req: &WithdrawLiquidity) -> Result<Withdrawal> {
    let bin_id = validate_bin_id(req.bin_id as i64)?;
    let bin = state.bin(bin_id);
    if bin.total_shares == 0 {
        return Err(DlmmError::NoBinShares(bin_id));
    }
    if req.shares == 0 {
        return Err(DlmmError::InvalidAmount);
    }
    let held = state.position(owner, bin_id);
    if held < req.shares {
        return Err(DlmmError::InsufficientBalance { available: held, required: req.shares });
    }

    let x_amount = mul_div(bin.reserve_x, req.shares, bin.total_shares, Rounding::Floor)?;
    let y_amount = mul_div(bin.reserve_y, req.shares, bin.total_shares, Rounding::Floor)?;
    // Dust in one asset may floor to zero; the burn must still pay out something.
    if x_amount == 0 && y_amount == 0 {
        return Err(DlmmError::InvalidAmount);
    }
    if x_amount < req.min_x {
        return Err(DlmmError::MinimumXAmount);
    }
    if y_amount < req.min_y {
        return Err(DlmmError::MinimumYAmount);
    }
    Ok(Withdrawal { shares: req.shares, x_amount, y_amount })
}

/// Burns `req.shares` of `owner` in `req.bin_id` and pays out the pro-rata
/// reserves, floored.
pub fn withdraw_liquidity(state: &mut PoolState, owner: &str, req: &WithdrawLiquidity) -> Result<Withdrawal> {
    let w = quote_withdrawal(state, owner, req)?;
    let held = state.position(owner, req.bin_id);
    let b = state.bin_mut(req.bin_id);
    b.reserve_x -= w.x_amount;
    b.reserve_y -= w.y_amount;
    b.total_shares -= w.shares;
    state.set_position(owner, req.bin_id, held - w.shares);

    debug!(bin_id = req.bin_id, shares = w.shares, x = w.x_amount, y = w.y_amount, "liquidity withdrawn");
    Ok(w)
}

/// Withdraws from one bin and deposits the proceeds into another.
///
/// The destination must accept exactly what the source yields: Y-only
/// proceeds can only go below the active bin, X-only proceeds above it, and
/// only mixed proceeds into the active bin itself.
pub fn move_liquidity(state: &mut PoolState, grid: &Grid<'_>, owner: &str, req: &MoveLiquidity) -> Result<Relocation> {
    let from = validate_bin_id(req.from_bin_id as i64)?;
    let to = validate_bin_id(req.to_bin_id as i64)?;
    if from == to {
        return Err(DlmmError::MatchingBinId(from));
    }
    let source = WithdrawLiquidity { bin_id: from, shares: req.shares, min_x: 0, min_y: 0 };
    let quoted = quote_withdrawal(state, owner, &source)?;
    let (x, y) = (quoted.x_amount, quoted.y_amount);
    let compatible = match Composition::of(to, state.pool.active_bin_id) {
        Composition::YOnly => x == 0 && y > 0,
        Composition::XOnly => y == 0 && x > 0,
        Composition::Both => x > 0 && y > 0,
    };
    if !compatible {
        return Err(DlmmError::IncompatibleMove { from, to });
    }
    let withdrawn = withdraw_liquidity(state, owner, &source)?;
    let deposited = add_liquidity(
        state,
        grid,
        owner,
        &AddLiquidity {
            bin_id: to,
            x_amount: x,
            y_amount: y,
            min_shares: req.min_shares,
            max_x_fee: req.max_x_fee,
            max_y_fee: req.max_y_fee,
        },
    )?;
    Ok(Relocation { withdrawn, deposited })
}
