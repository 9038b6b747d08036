//! Single-bin swap calculator
//!
//! Pure function of one bin's reserves, its price, the fee rate and the
//! remaining input. Rounding always favours the pool: the capacity bound is
//! ceiled, the fee and the output are floored.

use crate::constants::{FEE_SCALE_BPS, PRICE_SCALE_BPS};
use crate::error::Asset;
use crate::math::{mul_div_saturating, Rounding};
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Sell X, receive Y; walks toward lower bin ids
    XForY,
    /// Sell Y, receive X; walks toward higher bin ids
    YForX,
}

impl SwapDirection {
    /// Asset the caller pays.
    pub fn input_asset(self) -> Asset {
        match self {
            SwapDirection::XForY => Asset::X,
            SwapDirection::YForX => Asset::Y,
        }
    }

    /// Asset the caller receives.
    pub fn output_asset(self) -> Asset {
        match self {
            SwapDirection::XForY => Asset::Y,
            SwapDirection::YForX => Asset::X,
        }
    }

    /// Bin-id step taken when the current bin runs dry.
    pub fn step(self) -> i32 {
        match self {
            SwapDirection::XForY => -1,
            SwapDirection::YForX => 1,
        }
    }
}

/// Inputs of one bin-level swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapInput {
    /// Bin's X reserve
    pub reserve_x: u128,
    /// Bin's Y reserve
    pub reserve_y: u128,
    /// Bin price (Y per X), 8 implied decimals
    pub bin_price: u128,
    /// Unfilled input offered to this bin
    pub remaining_input: u128,
    /// Total fee rate applied to the input, bps
    pub fee_rate_bps: u128,
    /// Direction
    pub direction: SwapDirection,
}

/// Result of one bin-level swap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStep {
    /// Gross input actually taken, fee included
    pub effective_input: u128,
    /// Output paid by the bin
    pub output: u128,
    /// Fee withheld from the effective input
    pub fee_charged: u128,
}

/// Largest gross input (fee included) the bin can absorb.
pub fn max_input(input: &SwapInput) -> u128 {
    let (counter_reserve, num, den) = match input.direction {
        SwapDirection::XForY => (input.reserve_y, PRICE_SCALE_BPS, input.bin_price),
        SwapDirection::YForX => (input.reserve_x, input.bin_price, PRICE_SCALE_BPS),
    };
    if den == 0 {
        return 0;
    }
    let pre_fee = mul_div_saturating(counter_reserve, num, den, Rounding::Ceil);
    if input.fee_rate_bps == 0 {
        pre_fee
    } else if input.fee_rate_bps >= FEE_SCALE_BPS {
        // Every unit is fee; never take more than the bin could have filled.
        pre_fee
    } else {
        mul_div_saturating(pre_fee, FEE_SCALE_BPS, FEE_SCALE_BPS - input.fee_rate_bps, Rounding::Floor)
    }
}

/// Swaps against a single bin.
///
/// Oversized requests are silently capped at the bin's capacity. A zero
/// price or an empty counter-reserve yields an all-zero step.
pub fn swap_in_bin(input: &SwapInput) -> SwapStep {
    let counter_reserve = match input.direction {
        SwapDirection::XForY => input.reserve_y,
        SwapDirection::YForX => input.reserve_x,
    };
    if input.bin_price == 0 || counter_reserve == 0 {
        return SwapStep::default();
    }
    let fee_rate = input.fee_rate_bps.min(FEE_SCALE_BPS);
    let effective_input = input.remaining_input.min(max_input(input));
    let fee_charged = mul_div_saturating(effective_input, fee_rate, FEE_SCALE_BPS, Rounding::Floor);
    let net_input = effective_input - fee_charged;
    let raw_output = match input.direction {
        SwapDirection::XForY => mul_div_saturating(net_input, input.bin_price, PRICE_SCALE_BPS, Rounding::Floor),
        SwapDirection::YForX => mul_div_saturating(net_input, PRICE_SCALE_BPS, input.bin_price, Rounding::Floor),
    };
    SwapStep { effective_input, output: raw_output.min(counter_reserve), fee_charged }
}
