//! Persistent records: bins, pools, positions

use crate::constants::{MAX_BIN_ID, MIN_BIN_ID};
use crate::error::{Asset, DlmmError, Result};
use crate::fees::{FeeSchedule, ProtocolFees, VariableFeeControl};
use crate::price::validate_bin_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account identifier. Wallet semantics are out of scope; any string will do.
pub type Account = String;

/// Pool identifier.
pub type PoolId = u64;

/// One price level.
///
/// Bins are created on first deposit and persist at zero afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    /// X held by the bin
    pub reserve_x: u128,
    /// Y held by the bin
    pub reserve_y: u128,
    /// LP shares outstanding
    pub total_shares: u128,
}

impl Bin {
    /// Reserve of `asset`.
    pub fn reserve(&self, asset: Asset) -> u128 {
        match asset {
            Asset::X => self.reserve_x,
            Asset::Y => self.reserve_y,
        }
    }

    /// Mutable reserve of `asset`.
    pub fn reserve_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::X => &mut self.reserve_x,
            Asset::Y => &mut self.reserve_y,
        }
    }

    /// No reserves and no shares.
    pub fn is_empty(&self) -> bool {
        self.reserve_x == 0 && self.reserve_y == 0 && self.total_shares == 0
    }
}

/// Which assets a bin accepts, given its position relative to the active bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Composition {
    /// Below the active bin
    YOnly,
    /// The active bin
    Both,
    /// Above the active bin
    XOnly,
}

impl Composition {
    /// Composition of `bin_id` for a pool whose active bin is `active_bin_id`.
    pub fn of(bin_id: i32, active_bin_id: i32) -> Self {
        use std::cmp::Ordering::*;
        match bin_id.cmp(&active_bin_id) {
            Less => Composition::YOnly,
            Equal => Composition::Both,
            Greater => Composition::XOnly,
        }
    }

    /// Checks that `(x, y)` is an admissible deposit.
    pub fn check(self, bin_id: i32, x: u128, y: u128) -> Result<()> {
        match self {
            Composition::YOnly if x > 0 => Err(DlmmError::WrongComposition { bin_id, asset: Asset::X }),
            Composition::XOnly if y > 0 => Err(DlmmError::WrongComposition { bin_id, asset: Asset::Y }),
            Composition::YOnly if y == 0 => Err(DlmmError::InvalidAmount),
            Composition::XOnly if x == 0 => Err(DlmmError::InvalidAmount),
            Composition::Both if x == 0 || y == 0 => Err(DlmmError::InvalidAmount),
            _ => Ok(()),
        }
    }
}

/// Pool parameters, as supplied at creation.
///
/// Creation itself (admin lists, bin-step registration, status toggles) is
/// handled elsewhere; this is only what the engine needs to price and fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Identifier of asset X
    pub x_token: String,
    /// Identifier of asset Y
    pub y_token: String,
    /// Bin step, bps
    pub bin_step: u16,
    /// Price of bin 0, 8 implied decimals
    pub initial_price: u128,
    /// Active bin at creation
    pub active_bin_id: i32,
    /// Fees charged when X is the input
    pub x_fees: FeeSchedule,
    /// Fees charged when Y is the input
    pub y_fees: FeeSchedule,
    /// Variable-fee manager
    pub variable_fees_manager: Account,
    /// Minimum time between variable-fee changes
    pub variable_fees_cooldown: u64,
    /// Receiver of claimed protocol fees
    pub fee_address: Account,
    /// Pool admin
    pub admin: Account,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let fees = FeeSchedule { protocol_fee_bps: 10, provider_fee_bps: 20, variable_fee_bps: 0 };
        Self {
            x_token: "token-x".into(),
            y_token: "token-y".into(),
            bin_step: 25,
            initial_price: 5_000_000_000,
            active_bin_id: 0,
            x_fees: fees,
            y_fees: fees,
            variable_fees_manager: "manager".into(),
            variable_fees_cooldown: 144,
            fee_address: "fee-collector".into(),
            admin: "admin".into(),
        }
    }
}

impl PoolConfig {
    /// Checks everything that does not need the price model.
    pub fn validate(&self) -> Result<()> {
        if self.initial_price == 0 {
            return Err(DlmmError::InvalidAmount);
        }
        validate_bin_id(self.active_bin_id as i64)?;
        self.x_fees.validate()?;
        self.y_fees.validate()
    }
}

/// Live pool record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Identifier
    pub pool_id: PoolId,
    /// Identifier of asset X
    pub x_token: String,
    /// Identifier of asset Y
    pub y_token: String,
    /// Current active bin, always in `[MIN_BIN_ID, MAX_BIN_ID]`
    pub active_bin_id: i32,
    /// Bin step, bps
    pub bin_step: u16,
    /// Price of bin 0
    pub initial_price: u128,
    /// Fees when X is the input
    pub x_fees: FeeSchedule,
    /// Fees when Y is the input
    pub y_fees: FeeSchedule,
    /// Variable-fee governance
    pub variable_fees: VariableFeeControl,
    /// Receiver of claimed protocol fees
    pub fee_address: Account,
    /// Pool admin
    pub admin: Account,
}

impl Pool {
    /// Builds the live record from a validated config.
    pub fn from_config(pool_id: PoolId, cfg: &PoolConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            pool_id,
            x_token: cfg.x_token.clone(),
            y_token: cfg.y_token.clone(),
            active_bin_id: cfg.active_bin_id,
            bin_step: cfg.bin_step,
            initial_price: cfg.initial_price,
            x_fees: cfg.x_fees,
            y_fees: cfg.y_fees,
            variable_fees: VariableFeeControl {
                manager: cfg.variable_fees_manager.clone(),
                manager_frozen: false,
                cooldown: cfg.variable_fees_cooldown,
                last_update: None,
            },
            fee_address: cfg.fee_address.clone(),
            admin: cfg.admin.clone(),
        })
    }

    /// Fee schedule applied when `asset` is the input.
    pub fn fees(&self, asset: Asset) -> &FeeSchedule {
        match asset {
            Asset::X => &self.x_fees,
            Asset::Y => &self.y_fees,
        }
    }

    /// Token identifier of `asset`.
    pub fn token(&self, asset: Asset) -> &str {
        match asset {
            Asset::X => &self.x_token,
            Asset::Y => &self.y_token,
        }
    }

    /// Moves the active bin by `step`, staying inside the bin range.
    pub fn shift_active_bin(&mut self, step: i32) {
        self.active_bin_id = (self.active_bin_id + step).clamp(MIN_BIN_ID, MAX_BIN_ID);
    }
}

/// Everything persisted for one pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolState {
    /// Pool record
    pub pool: Pool,
    /// Bins that have ever held liquidity
    pub bins: BTreeMap<i32, Bin>,
    /// `(owner, bin) -> shares`
    pub positions: BTreeMap<(Account, i32), u128>,
    /// Unclaimed protocol fees
    pub protocol_fees: ProtocolFees,
}

impl PoolState {
    /// Fresh state with no bins.
    pub fn new(pool: Pool) -> Self {
        Self { pool, bins: BTreeMap::new(), positions: BTreeMap::new(), protocol_fees: ProtocolFees::default() }
    }

    /// Bin `bin_id`, or an empty one if it was never funded.
    pub fn bin(&self, bin_id: i32) -> Bin { self.bins.get(&bin_id).copied().unwrap_or_default() }

    /// Mutable bin, created on first access.
    pub fn bin_mut(&mut self, bin_id: i32) -> &mut Bin { self.bins.entry(bin_id).or_default() }

    /// Shares `owner` holds in `bin_id`.
    pub fn position(&self, owner: &str, bin_id: i32) -> u128 {
        self.positions.get(&(owner.to_string(), bin_id)).copied().unwrap_or(0)
    }

    /// Sets a position; a zero balance removes the entry.
    pub fn set_position(&mut self, owner: &str, bin_id: i32, shares: u128) {
        let key = (owner.to_string(), bin_id);
        if shares == 0 {
            self.positions.remove(&key);
        } else {
            self.positions.insert(key, shares);
        }
    }
}
