//! Fixed-point scales, bin range and traversal defaults

/// Fee denominator: 1 bps = 1 / 10_000.
pub const FEE_SCALE_BPS: u128 = 10_000;

/// Price denominator: prices carry 8 implied decimals.
pub const PRICE_SCALE_BPS: u128 = 100_000_000;

/// Lowest signed bin id.
pub const MIN_BIN_ID: i32 = -500;

/// Highest signed bin id.
pub const MAX_BIN_ID: i32 = 500;

/// Unsigned offset of bin 0 in the wire encoding.
pub const CENTER_BIN_ID: u32 = 500;

/// Number of addressable bins, and entries in every factor table.
pub const NUM_OF_BINS: usize = 1001;

/// Bin steps (bps) registered by [`crate::price::PriceModel::default`].
pub const DEFAULT_BIN_STEPS: [u16; 10] = [1, 5, 10, 20, 25, 50, 100, 150, 200, 250];

/// Share of the active bin's smaller reserve an order may use and still be
/// estimated as a single-bin trade (bps).
pub const SINGLE_BIN_UTILIZATION_BPS: u128 = 8_000;

/// Neighbouring bins sampled when estimating liquidity per bin.
pub const ESTIMATE_SAMPLE_BINS: i32 = 10;

/// Orders above this get the safety multiplier applied to the estimate.
pub const VERY_LARGE_TRADE: u128 = 10_000_000;

/// Orders above this skip estimation and use [`MAX_ESTIMATED_BINS`].
pub const HUGE_TRADE: u128 = 100_000_000;

/// Safety multiplier for very large orders.
pub const LARGE_TRADE_SAFETY_FACTOR: u32 = 3;

/// Upper bound on the bin-count estimate.
pub const MAX_ESTIMATED_BINS: u32 = 1_000;

/// Candidate bins scanned per estimated bin.
pub const DISCOVERY_FACTOR: u32 = 5;

/// Floor on candidate bins scanned during discovery.
pub const MIN_BINS_CHECKED: u32 = 500;
