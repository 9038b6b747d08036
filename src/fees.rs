//! Fee schedules, protocol-fee accrual and variable-fee governance

use crate::constants::FEE_SCALE_BPS;
use crate::error::{Asset, DlmmError, Result};
use crate::math::{mul_div, Rounding};
use serde::{Deserialize, Serialize};

/// Per-asset fee triplet, all in bps of the input amount.
///
/// The three components sum to the swap fee rate charged when this asset is
/// the input. Provider + variable is also the liquidity fee rate for
/// deposits into the active bin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Share routed to the protocol accumulator
    pub protocol_fee_bps: u128,
    /// Share retained by the bin for liquidity providers
    pub provider_fee_bps: u128,
    /// Manager-controlled surcharge, also retained by the bin
    pub variable_fee_bps: u128,
}

impl FeeSchedule {
    /// Total swap fee rate.
    pub fn total_bps(&self) -> u128 {
        self.protocol_fee_bps + self.provider_fee_bps + self.variable_fee_bps
    }

    /// Fee rate charged on active-bin deposits.
    pub fn liquidity_fee_bps(&self) -> u128 { self.provider_fee_bps + self.variable_fee_bps }

    /// Rejects schedules totalling more than 100%.
    pub fn validate(&self) -> Result<()> {
        let total = self
            .protocol_fee_bps
            .checked_add(self.provider_fee_bps)
            .and_then(|t| t.checked_add(self.variable_fee_bps))
            .ok_or(DlmmError::InvalidFee(u128::MAX))?;
        if total > FEE_SCALE_BPS {
            return Err(DlmmError::InvalidFee(total));
        }
        Ok(())
    }

    /// Protocol portion of `fee_charged`: `fee * protocol / total`, floored.
    pub fn protocol_share(&self, fee_charged: u128) -> u128 {
        let total = self.total_bps();
        if total == 0 || fee_charged == 0 {
            return 0;
        }
        // protocol <= total, so the quotient never exceeds fee_charged
        mul_div(fee_charged, self.protocol_fee_bps, total, Rounding::Floor).unwrap_or(0)
    }

    /// Returns a copy with a new variable component, validated.
    pub fn with_variable(&self, variable_fee_bps: u128) -> Result<Self> {
        let next = FeeSchedule { variable_fee_bps, ..*self };
        next.validate()?;
        Ok(next)
    }
}

/// Protocol fees owed by a pool, per asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFees {
    /// Unclaimed X
    pub x_fee: u128,
    /// Unclaimed Y
    pub y_fee: u128,
}

impl ProtocolFees {
    /// Adds `amount` to the accumulator for `asset`.
    pub fn accrue(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let slot = match asset {
            Asset::X => &mut self.x_fee,
            Asset::Y => &mut self.y_fee,
        };
        *slot = slot.checked_add(amount).ok_or(DlmmError::MathOverflow)?;
        Ok(())
    }

    /// Takes the whole balance, leaving both counters at zero.
    pub fn take(&mut self) -> (u128, u128) {
        let out = (self.x_fee, self.y_fee);
        *self = ProtocolFees::default();
        out
    }

    /// Unclaimed amount of `asset`.
    pub fn get(&self, asset: Asset) -> u128 {
        match asset {
            Asset::X => self.x_fee,
            Asset::Y => self.y_fee,
        }
    }
}

/// Who may change variable fees, and when.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableFeeControl {
    /// Account allowed to set variable fees
    pub manager: String,
    /// Once set, `manager` can never change again
    pub manager_frozen: bool,
    /// Minimum time between two variable-fee changes
    pub cooldown: u64,
    /// Time of the last change, if any
    pub last_update: Option<u64>,
}

impl VariableFeeControl {
    /// Earliest time the next change is allowed.
    pub fn ready_at(&self) -> u64 {
        self.last_update.map_or(0, |t| t.saturating_add(self.cooldown))
    }

    /// Fails while the cooldown window since the last change is open.
    pub fn check_cooldown(&self, now: u64) -> Result<()> {
        let ready_at = self.ready_at();
        if self.last_update.is_some() && now < ready_at {
            return Err(DlmmError::VariableFeesCooldown { ready_at });
        }
        Ok(())
    }

    /// Manager-only, cooldown-gated.
    pub fn authorize_update(&self, caller: &str, now: u64) -> Result<()> {
        if caller != self.manager {
            return Err(DlmmError::NotAuthorized);
        }
        self.check_cooldown(now)
    }

    /// Replaces the manager unless frozen.
    pub fn set_manager(&mut self, manager: &str) -> Result<()> {
        if self.manager_frozen {
            return Err(DlmmError::VariableFeesManagerFrozen);
        }
        self.manager = manager.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sched(p: u128, l: u128, v: u128) -> FeeSchedule {
        FeeSchedule { protocol_fee_bps: p, provider_fee_bps: l, variable_fee_bps: v }
    }

    #[test]
    fn schedule_cap() {
        assert!(sched(1_000, 9_000, 0).validate().is_ok());
        assert_eq!(sched(1_000, 9_000, 1).validate(), Err(DlmmError::InvalidFee(10_001)));
        assert!(sched(u128::MAX, 1, 0).validate().is_err());
        assert!(sched(10, 20, 0).with_variable(9_971).is_err());
    }

    #[test]
    fn protocol_share_is_proportional_and_floored() {
        let s = sched(10, 20, 10);
        assert_eq!(s.protocol_share(40), 10);
        assert_eq!(s.protocol_share(3), 0);
        assert_eq!(sched(0, 0, 0).protocol_share(100), 0);
    }

    #[test]
    fn take_zeroes_the_accumulator() {
        let mut f = ProtocolFees::default();
        f.accrue(Asset::X, 5).unwrap();
        f.accrue(Asset::Y, 7).unwrap();
        assert_eq!(f.take(), (5, 7));
        assert_eq!(f, ProtocolFees::default());
    }

    #[test]
    fn cooldown_and_freeze() {
        let mut c = VariableFeeControl { manager: "m".into(), cooldown: 10, ..Default::default() };
        assert!(c.authorize_update("m", 0).is_ok());
        assert_eq!(c.authorize_update("x", 0), Err(DlmmError::NotAuthorized));
        c.last_update = Some(5);
        assert_eq!(c.authorize_update("m", 14), Err(DlmmError::VariableFeesCooldown { ready_at: 15 }));
        assert!(c.authorize_update("m", 15).is_ok());
        c.manager_frozen = true;
        assert_eq!(c.set_manager("n"), Err(DlmmError::VariableFeesManagerFrozen));
    }
}
