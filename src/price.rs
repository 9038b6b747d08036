//! Bin price ladder: factor tables per bin step and the bin-id wire codec

use crate::constants::{
    CENTER_BIN_ID, DEFAULT_BIN_STEPS, FEE_SCALE_BPS, MAX_BIN_ID, MIN_BIN_ID, NUM_OF_BINS,
    PRICE_SCALE_BPS,
};
use crate::error::{DlmmError, Result};
use crate::math::{mul_div, Rounding};
use std::collections::BTreeMap;

/// Precomputed growth factors `q^d` for `d = 0..=1000`, fixed-point with
/// [`PRICE_SCALE_BPS`], where `q = 1 + bin_step / 10_000`.
#[derive(Clone, Debug)]
pub struct PriceFactorTable {
    factors: Vec<u128>,
}

impl PriceFactorTable {
    /// Builds the table for `bin_step` bps.
    ///
    /// Each entry is the previous one scaled by `q` and floored, so the
    /// table is strictly increasing for any nonzero step.
    pub fn new(bin_step: u16) -> Result<Self> {
        if bin_step == 0 {
            return Err(DlmmError::InvalidBinStep(bin_step));
        }
        let growth = FEE_SCALE_BPS + bin_step as u128;
        let mut factors = Vec::with_capacity(NUM_OF_BINS);
        let mut f = PRICE_SCALE_BPS;
        factors.push(f);
        for _ in 1..NUM_OF_BINS {
            f = mul_div(f, growth, FEE_SCALE_BPS, Rounding::Floor)
                .map_err(|_| DlmmError::InvalidBinStep(bin_step))?;
            factors.push(f);
        }
        Ok(Self { factors })
    }

    /// Factor at `distance` bins from the center.
    pub fn factor(&self, distance: usize) -> Option<u128> { self.factors.get(distance).copied() }
}

/// Registry of factor tables, one per registered bin step.
#[derive(Clone, Debug)]
pub struct PriceModel {
    tables: BTreeMap<u16, PriceFactorTable>,
}

impl Default for PriceModel {
    fn default() -> Self {
        let mut model = Self::empty();
        for step in DEFAULT_BIN_STEPS {
            // Default steps are small enough that table construction cannot fail.
            if let Ok(table) = PriceFactorTable::new(step) {
                model.tables.insert(step, table);
            }
        }
        model
    }
}

impl PriceModel {
    /// A registry with no bin steps.
    pub fn empty() -> Self { Self { tables: BTreeMap::new() } }

    /// Registers `bin_step`, building its table if needed.
    pub fn register(&mut self, bin_step: u16) -> Result<()> {
        if !self.tables.contains_key(&bin_step) {
            self.tables.insert(bin_step, PriceFactorTable::new(bin_step)?);
        }
        Ok(())
    }

    /// Whether `bin_step` has a table.
    pub fn is_registered(&self, bin_step: u16) -> bool { self.tables.contains_key(&bin_step) }

    /// Registered bin steps in ascending order.
    pub fn bin_steps(&self) -> impl Iterator<Item = u16> + '_ { self.tables.keys().copied() }

    /// Price grid for one pool.
    pub fn grid(&self, initial_price: u128, bin_step: u16) -> Result<Grid<'_>> {
        let table = self.tables.get(&bin_step).ok_or(DlmmError::InvalidBinStep(bin_step))?;
        Ok(Grid { initial_price, table })
    }

    /// `price(initial_price, bin_step, bin_id)`.
    pub fn bin_price(&self, initial_price: u128, bin_step: u16, bin_id: i32) -> Result<u128> {
        self.grid(initial_price, bin_step)?.price_of_bin(bin_id)
    }
}

/// A pool's price ladder: initial price plus its bin step's table.
#[derive(Clone, Copy, Debug)]
pub struct Grid<'a> {
    /// Price of bin 0, 8 implied decimals
    pub initial_price: u128,
    table: &'a PriceFactorTable,
}

impl Grid<'_> {
    /// `P_i = P_0 * q^i`; divides by the factor for negative `i`.
    pub fn price_of_bin(&self, bin_id: i32) -> Result<u128> {
        validate_bin_id(bin_id as i64)?;
        let factor = self
            .table
            .factor(bin_id.unsigned_abs() as usize)
            .ok_or(DlmmError::InvalidBinId(bin_id as i64))?;
        if bin_id >= 0 {
            mul_div(self.initial_price, factor, PRICE_SCALE_BPS, Rounding::Floor)
        } else {
            mul_div(self.initial_price, PRICE_SCALE_BPS, factor, Rounding::Floor)
        }
    }
}

/// Checks `bin_id` lies in `[MIN_BIN_ID, MAX_BIN_ID]`.
pub fn validate_bin_id(bin_id: i64) -> Result<i32> {
    if bin_id < MIN_BIN_ID as i64 || bin_id > MAX_BIN_ID as i64 {
        return Err(DlmmError::InvalidBinId(bin_id));
    }
    Ok(bin_id as i32)
}

/// Wire encoding: signed id shifted by `+500`.
pub fn to_unsigned_bin_id(bin_id: i32) -> Result<u32> {
    let id = validate_bin_id(bin_id as i64)?;
    Ok((id + CENTER_BIN_ID as i32) as u32)
}

/// Inverse of [`to_unsigned_bin_id`].
pub fn to_signed_bin_id(unsigned: u32) -> Result<i32> {
    validate_bin_id(unsigned as i64 - CENTER_BIN_ID as i64)
}
