//! Batch and router variants
//!
//! Each batch folds its items through the single-item operation inside one
//! store transaction; the first failure aborts the whole batch.

use crate::engine::{
    add_to_pool, move_in_pool, swap_across_bins, withdraw_from_pool, Dlmm, MultiSwap, SwapOutcome,
};
use crate::error::{Asset, DlmmError, Result};
use crate::liquidity::{AddLiquidity, Deposit, MoveLiquidity, Relocation, WithdrawLiquidity, Withdrawal};
use crate::state::PoolId;
use crate::swap::SwapDirection;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One leg of a routed swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    /// Pool to trade on
    pub pool_id: PoolId,
    /// Token the caller believes is the pool's X
    pub x_token: String,
    /// Token the caller believes is the pool's Y
    pub y_token: String,
    /// Direction
    pub direction: SwapDirection,
    /// Input offered
    pub amount: u128,
    /// Smallest acceptable output for this leg
    pub min_received: u128,
}

/// Summary of a routed batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSwap {
    /// Per-leg outcomes, in order
    pub legs: Vec<SwapOutcome>,
    /// Number of bins traded across all legs
    pub bins_traversed: usize,
}

impl Dlmm {
    /// Executes every leg or none. `max_unfavorable_bins` applies to each leg.
    pub fn swap_batch(&mut self, caller: &str, legs: &[SwapLeg], max_unfavorable_bins: Option<u32>) -> Result<BatchSwap> {
        if legs.is_empty() {
            return Err(DlmmError::InvalidAmount);
        }
        let (store, prices, planner) = self.store_mut();
        let batch = store.atomic(|s| {
            legs.iter().try_fold(BatchSwap::default(), |mut acc, leg| {
                let pool = &s.pool(leg.pool_id)?.pool;
                if pool.x_token != leg.x_token {
                    return Err(DlmmError::WrongToken(Asset::X));
                }
                if pool.y_token != leg.y_token {
                    return Err(DlmmError::WrongToken(Asset::Y));
                }
                let req = MultiSwap {
                    direction: leg.direction,
                    amount: leg.amount,
                    min_received: leg.min_received,
                    max_unfavorable_bins,
                };
                let out = swap_across_bins(s, prices, planner, leg.pool_id, caller, &req)?;
                acc.bins_traversed += out.steps.len();
                acc.legs.push(out);
                Ok(acc)
            })
        })?;
        debug!(legs = batch.legs.len(), bins = batch.bins_traversed, "batch swap");
        Ok(batch)
    }

    /// Adds to several bins of one pool atomically.
    pub fn add_liquidity_multi(&mut self, pool_id: PoolId, caller: &str, positions: &[AddLiquidity]) -> Result<Vec<Deposit>> {
        if positions.is_empty() {
            return Err(DlmmError::InvalidAmount);
        }
        let (store, prices, _) = self.store_mut();
        store.atomic(|s| {
            positions.iter().try_fold(Vec::with_capacity(positions.len()), |mut acc, p| {
                acc.push(add_to_pool(s, prices, pool_id, caller, p)?);
                Ok(acc)
            })
        })
    }

    /// Withdraws from several bins of one pool atomically.
    pub fn withdraw_liquidity_multi(&mut self, pool_id: PoolId, caller: &str, positions: &[WithdrawLiquidity]) -> Result<Vec<Withdrawal>> {
        if positions.is_empty() {
            return Err(DlmmError::InvalidAmount);
        }
        let (store, _, _) = self.store_mut();
        store.atomic(|s| {
            positions.iter().try_fold(Vec::with_capacity(positions.len()), |mut acc, p| {
                acc.push(withdraw_from_pool(s, pool_id, caller, p)?);
                Ok(acc)
            })
        })
    }

    /// Moves several positions of one pool atomically.
    pub fn move_liquidity_multi(&mut self, pool_id: PoolId, caller: &str, moves: &[MoveLiquidity]) -> Result<Vec<Relocation>> {
        if moves.is_empty() {
            return Err(DlmmError::InvalidAmount);
        }
        let (store, prices, _) = self.store_mut();
        store.atomic(|s| {
            moves.iter().try_fold(Vec::with_capacity(moves.len()), |mut acc, m| {
                acc.push(move_in_pool(s, prices, pool_id, caller, m)?);
                Ok(acc)
            })
        })
    }
}
