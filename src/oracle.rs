//! Reference re-derivation of swap outputs
//!
//! Two independent recomputations of the bin-level swap: one in integer
//! arithmetic that must agree with production exactly, and one in `f64`
//! that stands for the continuous answer. Production output above the
//! floored float reference means the pool paid out more than it received
//! value for; that is reported as an exploit.

use crate::engine::SwapOutcome;
use crate::state::PoolState;
use crate::swap::{SwapDirection, SwapInput, SwapStep};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::error;

const PRICE_SCALE: f64 = 100_000_000.0;
const FEE_SCALE: u128 = 10_000;

/// Relative tolerance absorbing `f64` rounding in the reference itself.
pub const FLOAT_SLACK: f64 = 4.0 * f64::EPSILON;

/// What the oracle concluded about one bin step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Finding {
    /// Output within bounds and identical to the integer reference
    Ok,
    /// Output differs from the integer reference but does not overpay
    IntegerMismatch {
        /// Integer reference output
        expected: u128,
        /// Production output
        actual: u128,
    },
    /// Output exceeds the floored float reference
    Exploit {
        /// Production output
        actual: u128,
        /// Float reference
        reference: f64,
    },
}

impl Finding {
    /// Severity-critical findings.
    pub fn is_exploit(&self) -> bool { matches!(self, Finding::Exploit { .. }) }
}

/// Oracle verdict for one bin step
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepCheck {
    /// Bin traded against
    pub bin_id: i32,
    /// Integer reference step
    pub integer: SwapStep,
    /// Float reference output
    pub float_reference: f64,
    /// Production output
    pub actual_output: u128,
    /// `float_reference - actual_output`; non-negative when the pool kept the dust
    pub slack: f64,
    /// Verdict
    pub finding: Finding,
}

/// Oracle verdict for a whole swap
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeCheck {
    /// Per-bin checks, in execution order
    pub steps: Vec<StepCheck>,
    /// Sum of the float references
    pub float_reference: f64,
    /// Total production output
    pub actual_output: u128,
}

impl OutcomeCheck {
    /// First exploit finding, if any.
    pub fn exploit(&self) -> Option<&StepCheck> { self.steps.iter().find(|s| s.finding.is_exploit()) }

    /// Steps whose integer reference disagreed.
    pub fn mismatches(&self) -> impl Iterator<Item = &StepCheck> {
        self.steps.iter().filter(|s| matches!(s.finding, Finding::IntegerMismatch { .. }))
    }
}

fn clamp_u128(v: U256) -> u128 {
    if v > U256::from(u128::MAX) { u128::MAX } else { v.low_u128() }
}

/// Integer reference of one bin step.
pub fn integer_reference(input: &SwapInput) -> SwapStep {
    let price = U256::from(input.bin_price);
    let scale = U256::from(100_000_000u128);
    let (counter, num, den) = match input.direction {
        SwapDirection::XForY => (input.reserve_y, scale, price),
        SwapDirection::YForX => (input.reserve_x, price, scale),
    };
    if price.is_zero() || counter == 0 {
        return SwapStep::default();
    }

    let rate = input.fee_rate_bps.min(FEE_SCALE);
    let pre_fee = clamp_u128((U256::from(counter) * num + den - U256::one()) / den);
    let capacity = if rate == 0 || rate == FEE_SCALE {
        pre_fee
    } else {
        clamp_u128(U256::from(pre_fee) * U256::from(FEE_SCALE) / U256::from(FEE_SCALE - rate))
    };
    let effective_input = input.remaining_input.min(capacity);
    let fee_charged = clamp_u128(U256::from(effective_input) * U256::from(rate) / U256::from(FEE_SCALE));
    let net = U256::from(effective_input - fee_charged);
    // Output converts with the inverse of the capacity ratio.
    let output = clamp_u128(net * den / num).min(counter);
    SwapStep { effective_input, output, fee_charged }
}

/// Float reference output for spending `effective_input` in one bin.
///
/// The fee is the floored integer fee: the input side of the trade is what
/// production actually withheld, only the price conversion is continuous.
pub fn float_reference(input: &SwapInput, effective_input: u128) -> f64 {
    let counter = match input.direction {
        SwapDirection::XForY => input.reserve_y,
        SwapDirection::YForX => input.reserve_x,
    };
    if input.bin_price == 0 || counter == 0 {
        return 0.0;
    }
    let rate = input.fee_rate_bps.min(FEE_SCALE);
    let fee = clamp_u128(U256::from(effective_input) * U256::from(rate) / U256::from(FEE_SCALE));
    let net = (effective_input - fee) as f64;
    let price = input.bin_price as f64;
    let out = match input.direction {
        SwapDirection::XForY => net * price / PRICE_SCALE,
        SwapDirection::YForX => net * PRICE_SCALE / price,
    };
    out.min(counter as f64)
}

/// Largest output the float reference allows.
pub fn float_bound(reference: f64) -> f64 { (reference + reference * FLOAT_SLACK).floor() }

/// Checks one production step against both references.
///
/// Both references are evaluated at the step's actual effective input, not
/// the originally requested amount.
pub fn check_step(bin_id: i32, input: &SwapInput, actual: &SwapStep) -> StepCheck {
    let replay = SwapInput { remaining_input: actual.effective_input, ..*input };
    let integer = integer_reference(&replay);
    let reference = float_reference(input, actual.effective_input);
    let finding = if actual.output as f64 > float_bound(reference) {
        error!(bin_id, actual = actual.output, reference, "output exceeds float reference");
        Finding::Exploit { actual: actual.output, reference }
    } else if integer != *actual {
        Finding::IntegerMismatch { expected: integer.output, actual: actual.output }
    } else {
        Finding::Ok
    };
    StepCheck {
        bin_id,
        integer,
        float_reference: reference,
        actual_output: actual.output,
        slack: reference - actual.output as f64,
        finding,
    }
}

/// Checks every bin step of an executed swap against the pool as it was
/// before the swap.
pub fn check_outcome(before: &PoolState, outcome: &SwapOutcome) -> OutcomeCheck {
    let fee_rate_bps = before.pool.fees(outcome.direction.input_asset()).total_bps();
    let mut check = OutcomeCheck { actual_output: outcome.amount_out, ..Default::default() };
    for s in &outcome.steps {
        let bin = before.bin(s.bin_id);
        let input = SwapInput {
            reserve_x: bin.reserve_x,
            reserve_y: bin.reserve_y,
            bin_price: s.price,
            remaining_input: s.step.effective_input,
            fee_rate_bps,
            direction: outcome.direction,
        };
        let c = check_step(s.bin_id, &input, &s.step);
        check.float_reference += c.float_reference;
        check.steps.push(c);
    }
    check
}
