//! Typed failures for every engine operation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which pool asset an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    /// Asset X, held by bins above the active bin
    X,
    /// Asset Y, held by bins below the active bin
    Y,
}

/// Every way an engine operation can be refused.
///
/// All of these abort the enclosing operation with no state change. The
/// numeric [`code`](DlmmError::code) is only meant for reports and other
/// serialization boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlmmError {
    /// Caller lacks the role the operation needs
    #[error("caller is not authorized")]
    NotAuthorized,
    /// Zero amount, empty batch, or a burn that pays nothing
    #[error("invalid amount")]
    InvalidAmount,
    /// Token does not match the pool's asset
    #[error("token does not match the pool's configured {0:?} asset")]
    WrongToken(Asset),
    /// Swap targeted a bin other than the active one
    #[error("bin {bin_id} is not the active bin {active_bin_id}")]
    NotActiveBin {
        /// Bin the caller named
        bin_id: i32,
        /// Pool's active bin
        active_bin_id: i32,
    },
    /// Bin id outside the supported range
    #[error("bin id {0} is outside [-500, 500]")]
    InvalidBinId(i64),
    /// Bin step with no factor table
    #[error("bin step {0} has no registered factor table")]
    InvalidBinStep(u16),
    /// Withdrawal paid less X than requested
    #[error("minimum X amount not met")]
    MinimumXAmount,
    /// Withdrawal or swap paid less Y than requested
    #[error("minimum Y amount not met")]
    MinimumYAmount,
    /// X liquidity fee above the caller's cap
    #[error("X liquidity fee {fee} exceeds the allowed {max}")]
    MaximumXLiquidityFee {
        /// Fee the deposit would pay
        fee: u128,
        /// Caller's cap
        max: u128,
    },
    /// Y liquidity fee above the caller's cap
    #[error("Y liquidity fee {fee} exceeds the allowed {max}")]
    MaximumYLiquidityFee {
        /// Fee the deposit would pay
        fee: u128,
        /// Caller's cap
        max: u128,
    },
    /// Deposit minted fewer shares than requested
    #[error("minted {minted} shares, below the minimum {min}")]
    MinimumLpAmount {
        /// Shares the deposit would mint
        minted: u128,
        /// Fewest shares accepted
        min: u128,
    },
    /// Withdrawal from a bin nobody holds
    #[error("bin {0} has no shares")]
    NoBinShares(i32),
    /// Move with identical source and destination
    #[error("source and destination bin are both {0}")]
    MatchingBinId(i32),
    /// Move proceeds do not fit the destination's composition
    #[error("liquidity from bin {from} cannot fund the composition of bin {to}")]
    IncompatibleMove {
        /// Source bin
        from: i32,
        /// Destination bin
        to: i32,
    },
    /// Deposit of an asset the bin does not accept
    #[error("{asset:?} supplied to bin {bin_id} which does not accept it")]
    WrongComposition {
        /// Target bin
        bin_id: i32,
        /// Asset it refuses
        asset: Asset,
    },
    /// Fee schedule above 100%
    #[error("fee schedule totals {0} bps, above 10000")]
    InvalidFee(u128),
    /// Variable fee update before the cooldown elapsed
    #[error("variable fees cooldown active until {ready_at}")]
    VariableFeesCooldown {
        /// Earliest time of the next update
        ready_at: u64,
    },
    /// Variable fees manager can no longer be changed
    #[error("variable fees manager is frozen")]
    VariableFeesManagerFrozen,
    /// Traversal went further from the active bin than allowed
    #[error("traversal reached bin {bin_id}, {distance} bins from active (max {max})")]
    BinSlippage {
        /// Bin the traversal reached
        bin_id: i32,
        /// Its distance from the active bin
        distance: u32,
        /// Allowed distance
        max: u32,
    },
    /// Unknown pool id
    #[error("no pool data for pool {0}")]
    NoPoolData(u64),
    /// Nothing in range to trade against
    #[error("no liquidity to trade against")]
    NoLiquidity,
    /// Balance or position smaller than the amount needed
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        /// Amount held
        available: u128,
        /// Amount needed
        required: u128,
    },
    /// Checked arithmetic overflowed
    #[error("arithmetic overflow")]
    MathOverflow,
}

impl DlmmError {
    /// Stable numeric code, kept for compatibility at report boundaries.
    pub fn code(&self) -> u32 {
        match self {
            DlmmError::NotAuthorized => 1001,
            DlmmError::InvalidAmount => 1002,
            DlmmError::WrongToken(_) => 1003,
            DlmmError::NotActiveBin { .. } => 1004,
            DlmmError::InvalidBinId(_) => 1005,
            DlmmError::InvalidBinStep(_) => 1006,
            DlmmError::MinimumXAmount => 1007,
            DlmmError::MinimumYAmount => 1008,
            DlmmError::MaximumXLiquidityFee { .. } => 1011,
            DlmmError::MaximumYLiquidityFee { .. } => 1012,
            DlmmError::MinimumLpAmount { .. } => 1013,
            DlmmError::NoBinShares(_) => 1014,
            DlmmError::MatchingBinId(_) => 1015,
            DlmmError::IncompatibleMove { .. } => 1016,
            DlmmError::WrongComposition { .. } => 1017,
            DlmmError::InvalidFee(_) => 1018,
            DlmmError::VariableFeesCooldown { .. } => 1019,
            DlmmError::VariableFeesManagerFrozen => 1020,
            DlmmError::BinSlippage { .. } => 1021,
            DlmmError::NoPoolData(_) => 1022,
            DlmmError::NoLiquidity => 1023,
            DlmmError::InsufficientBalance { .. } => 1024,
            DlmmError::MathOverflow => 1025,
        }
    }
}

/// Wire form of a [`DlmmError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Numeric code
    pub code: u32,
    /// Display message
    pub message: String,
}

impl From<&DlmmError> for ErrorRecord {
    fn from(e: &DlmmError) -> Self {
        ErrorRecord { code: e.code(), message: e.to_string() }
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = DlmmError> = std::result::Result<T, E>;
