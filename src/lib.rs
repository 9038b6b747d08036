#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]
//! Library entry for the DLMM engine.
//!
//! A discretized liquidity market maker: price space is split into bins,
//! each with its own reserves and share supply. The crate carries the
//! production rules (pricing, swaps, traversal, liquidity, fees) and an
//! independent oracle that replays them in integer and float arithmetic
//! under a seeded fuzz harness.
//!
//! # Modules
//! - [`price`], [`swap`], [`planner`]: pricing and trade execution
//! - [`liquidity`], [`fees`]: share accounting and fee accrual
//! - [`state`], [`store`]: records and the transactional store
//! - [`engine`], [`router`]: public entry points and batch variants
//! - [`oracle`], [`invariants`], [`fuzz`]: correctness checking
//! - [`report`], [`plot`]: run output

/// Scales, bin range and planner defaults
pub mod constants;

/// Typed errors with stable numeric codes
pub mod error;

/// 256-bit mul-div with explicit rounding
pub mod math;

/// Bin price ladder and bin-id codec
pub mod price;

/// Single-bin swap calculator
pub mod swap;

/// Fee schedules, protocol-fee accrual, variable-fee governance
pub mod fees;

/// Bin, pool and position records
pub mod state;

/// Transactional store
pub mod store;

/// Multi-bin traversal planner
pub mod planner;

/// Share minting, burning and moving
pub mod liquidity;

/// Core entry points
pub mod engine;

/// Batch and routed variants
pub mod router;

/// Integer and float reference calculators
pub mod oracle;

/// Before/after conservation checks
pub mod invariants;

/// Seeded randomized harness
pub mod fuzz;

/// CSV and JSON run reports
pub mod report;

/// SVG charts
pub mod plot;

pub use engine::{Dlmm, MultiSwap, SwapOutcome};
pub use error::{Asset, DlmmError};
pub use swap::SwapDirection;
