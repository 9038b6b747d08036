//! Before/after conservation checks for every operation type
//!
//! A [`Snapshot`] is a plain read of one pool and one caller's balances.
//! Each `check_*` compares two snapshots against the operation's reported
//! result and returns every rule that failed; an empty list means the
//! operation conserved value.

use crate::constants::{MAX_BIN_ID, MIN_BIN_ID};
use crate::engine::SwapOutcome;
use crate::error::{Asset, Result};
use crate::fees::ProtocolFees;
use crate::liquidity::{AddLiquidity, Deposit, Relocation, Withdrawal, WithdrawLiquidity};
use crate::state::{Account, PoolId, PoolState};
use crate::store::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Pool and caller state at one instant.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Copy of the pool
    pub pool: PoolState,
    /// Caller
    pub owner: Account,
    /// Caller's X balance
    pub x_balance: u128,
    /// Caller's Y balance
    pub y_balance: u128,
}

impl Snapshot {
    /// Reads pool `pool_id` and `owner`'s token balances.
    pub fn capture(state: &State, pool_id: PoolId, owner: &str) -> Result<Self> {
        let pool = state.pool(pool_id)?.clone();
        let x_balance = state.balances.get(owner, &pool.pool.x_token);
        let y_balance = state.balances.get(owner, &pool.pool.y_token);
        Ok(Self { pool, owner: owner.to_string(), x_balance, y_balance })
    }

    fn balance(&self, asset: Asset) -> u128 {
        match asset {
            Asset::X => self.x_balance,
            Asset::Y => self.y_balance,
        }
    }

    fn position(&self, bin_id: i32) -> u128 { self.pool.position(&self.owner, bin_id) }
}

/// A failed conservation rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Operation checked
    pub op: String,
    /// Rule that failed
    pub rule: String,
    /// Observed values
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.op, self.rule, self.detail)
    }
}

struct Checker {
    op: &'static str,
    found: Vec<Violation>,
}

impl Checker {
    fn new(op: &'static str) -> Self { Self { op, found: Vec::new() } }

    fn expect(&mut self, ok: bool, rule: &str, detail: impl FnOnce() -> String) {
        if !ok {
            let v = Violation { op: self.op.to_string(), rule: rule.to_string(), detail: detail() };
            warn!(op = self.op, rule, detail = %v.detail, "invariant violated");
            self.found.push(v);
        }
    }

    /// `after == before + by`.
    fn grows(&mut self, rule: &str, before: u128, after: u128, by: u128) {
        self.expect(before.checked_add(by) == Some(after), rule, || format!("before={before} after={after} expected +{by}"));
    }

    /// `after == before - by`.
    fn shrinks(&mut self, rule: &str, before: u128, after: u128, by: u128) {
        self.expect(before.checked_sub(by) == Some(after), rule, || format!("before={before} after={after} expected -{by}"));
    }

    fn backing(&mut self, after: &PoolState) {
        for (id, b) in &after.bins {
            let empty = b.reserve_x == 0 && b.reserve_y == 0;
            self.expect((b.total_shares == 0) == empty, "shares exist iff reserves exist", || {
                format!("bin={id} x={} y={} shares={}", b.reserve_x, b.reserve_y, b.total_shares)
            });
        }
        let active = after.pool.active_bin_id;
        self.expect(
            (MIN_BIN_ID..=MAX_BIN_ID).contains(&active),
            "active bin in range",
            || format!("active={active}"),
        );
    }

    fn finish(self) -> Vec<Violation> { self.found }
}

/// Rules of a swap.
pub fn check_swap(before: &Snapshot, after: &Snapshot, outcome: &SwapOutcome) -> Vec<Violation> {
    let mut c = Checker::new("swap");
    let (ain, aout) = (outcome.direction.input_asset(), outcome.direction.output_asset());
    for s in &outcome.steps {
        let (b0, b1) = (before.pool.bin(s.bin_id), after.pool.bin(s.bin_id));
        c.expect(b0.total_shares == b1.total_shares, "bin shares unchanged", || {
            format!("bin={} before={} after={}", s.bin_id, b0.total_shares, b1.total_shares)
        });
        let retained = s.step.effective_input - s.protocol_fee;
        c.grows("input reserve grows by input minus protocol fee", b0.reserve(ain), b1.reserve(ain), retained);
        c.shrinks("output reserve shrinks by output", b0.reserve(aout), b1.reserve(aout), s.step.output);
        c.expect(b1.reserve(aout) < b0.reserve(aout), "output reserve strictly decreases", || {
            format!("bin={} before={} after={}", s.bin_id, b0.reserve(aout), b1.reserve(aout))
        });
        if retained > 0 {
            c.expect(b1.reserve(ain) > b0.reserve(ain), "input reserve strictly increases", || {
                format!("bin={} before={} after={}", s.bin_id, b0.reserve(ain), b1.reserve(ain))
            });
        }
    }
    c.shrinks("caller pays exactly the effective input", before.balance(ain), after.balance(ain), outcome.amount_in);
    c.grows("caller receives exactly the output", before.balance(aout), after.balance(aout), outcome.amount_out);
    let (f0, f1) = (before.pool.protocol_fees.get(ain), after.pool.protocol_fees.get(ain));
    c.expect(f1 >= f0, "protocol fees non-decreasing", || format!("before={f0} after={f1}"));
    c.grows("protocol fees grow by protocol share", f0, f1, outcome.protocol_fees);
    c.backing(&after.pool);
    c.finish()
}

/// Rules of a deposit.
pub fn check_add(before: &Snapshot, after: &Snapshot, req: &AddLiquidity, dep: &Deposit) -> Vec<Violation> {
    let mut c = Checker::new("add");
    let id = req.bin_id;
    let (b0, b1) = (before.pool.bin(id), after.pool.bin(id));
    c.expect(dep.shares > 0, "minted shares positive", || format!("minted={}", dep.shares));
    c.expect(dep.shares >= req.min_shares, "minted shares meet floor", || {
        format!("minted={} min={}", dep.shares, req.min_shares)
    });
    c.expect(b1.total_shares > b0.total_shares, "bin shares strictly increase", || {
        format!("before={} after={}", b0.total_shares, b1.total_shares)
    });
    c.grows("bin shares grow by minted", b0.total_shares, b1.total_shares, dep.shares);
    for asset in [Asset::X, Asset::Y] {
        let supplied = match asset {
            Asset::X => dep.x_amount,
            Asset::Y => dep.y_amount,
        };
        if supplied > 0 {
            c.expect(b1.reserve(asset) > b0.reserve(asset), "supplied reserve strictly increases", || {
                format!("{asset:?} before={} after={}", b0.reserve(asset), b1.reserve(asset))
            });
        }
        c.grows("reserve grows by amount supplied", b0.reserve(asset), b1.reserve(asset), supplied);
        c.shrinks("caller pays amount supplied", before.balance(asset), after.balance(asset), supplied);
    }
    c.expect(after.position(id) > before.position(id), "caller shares strictly increase", || {
        format!("before={} after={}", before.position(id), after.position(id))
    });
    c.backing(&after.pool);
    c.finish()
}

/// Rules of a withdrawal.
pub fn check_withdraw(before: &Snapshot, after: &Snapshot, req: &WithdrawLiquidity, w: &Withdrawal) -> Vec<Violation> {
    let mut c = Checker::new("withdraw");
    let id = req.bin_id;
    let (b0, b1) = (before.pool.bin(id), after.pool.bin(id));
    c.expect(w.shares > 0, "burned shares positive", || format!("burned={}", w.shares));
    c.expect(b1.total_shares < b0.total_shares, "bin shares strictly decrease", || {
        format!("before={} after={}", b0.total_shares, b1.total_shares)
    });
    c.expect(w.x_amount > 0 || w.y_amount > 0, "some reserve decreases", || {
        format!("x_paid={} y_paid={}", w.x_amount, w.y_amount)
    });
    for (asset, paid, min) in [(Asset::X, w.x_amount, req.min_x), (Asset::Y, w.y_amount, req.min_y)] {
        c.shrinks("bin reserve shrinks by payout", b0.reserve(asset), b1.reserve(asset), paid);
        c.grows("caller receives payout", before.balance(asset), after.balance(asset), paid);
        c.expect(paid >= min, "payout meets minimum", || format!("{asset:?} paid={paid} min={min}"));
    }
    c.expect(after.position(id) < before.position(id), "caller shares strictly decrease", || {
        format!("before={} after={}", before.position(id), after.position(id))
    });
    c.backing(&after.pool);
    c.finish()
}

/// Rules of a move between two bins.
pub fn check_move(before: &Snapshot, after: &Snapshot, from: i32, to: i32, r: &Relocation) -> Vec<Violation> {
    let mut c = Checker::new("move");
    let (s0, s1) = (before.pool.bin(from), after.pool.bin(from));
    let (d0, d1) = (before.pool.bin(to), after.pool.bin(to));
    c.expect(s1.total_shares < s0.total_shares, "source shares strictly decrease", || {
        format!("before={} after={}", s0.total_shares, s1.total_shares)
    });
    c.expect(d1.total_shares > d0.total_shares, "destination shares strictly increase", || {
        format!("before={} after={}", d0.total_shares, d1.total_shares)
    });
    c.shrinks("source X leaves", s0.reserve_x, s1.reserve_x, r.withdrawn.x_amount);
    c.shrinks("source Y leaves", s0.reserve_y, s1.reserve_y, r.withdrawn.y_amount);
    c.grows("destination X arrives", d0.reserve_x, d1.reserve_x, r.deposited.x_amount);
    c.grows("destination Y arrives", d0.reserve_y, d1.reserve_y, r.deposited.y_amount);
    c.expect(after.position(from) < before.position(from), "caller source shares decrease", || {
        format!("before={} after={}", before.position(from), after.position(from))
    });
    c.expect(after.position(to) > before.position(to), "caller destination shares increase", || {
        format!("before={} after={}", before.position(to), after.position(to))
    });
    c.expect(
        before.x_balance == after.x_balance && before.y_balance == after.y_balance,
        "caller balances untouched",
        || format!("x {}->{} y {}->{}", before.x_balance, after.x_balance, before.y_balance, after.y_balance),
    );
    c.backing(&after.pool);
    c.finish()
}

/// Rules of a protocol-fee claim: everything owed is paid and the
/// accumulator starts over.
pub fn check_claim(before: &Snapshot, after: &Snapshot, claimed: &ProtocolFees) -> Vec<Violation> {
    let mut c = Checker::new("claim");
    c.expect(*claimed == before.pool.protocol_fees, "claim pays the whole accumulator", || {
        format!("owed={:?} paid={claimed:?}", before.pool.protocol_fees)
    });
    c.expect(after.pool.protocol_fees == ProtocolFees::default(), "accumulator zeroed", || {
        format!("left={:?}", after.pool.protocol_fees)
    });
    c.expect(before.pool.bins == after.pool.bins, "bins untouched", String::new);
    c.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Dlmm;
    use crate::liquidity::AddLiquidity;
    use crate::state::PoolConfig;

    #[test]
    fn honest_add_and_withdraw_pass() {
        let mut dlmm = Dlmm::default();
        let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
        dlmm.fund("lp", "token-y", 1_000_000).unwrap();

        let req = AddLiquidity { bin_id: -4, y_amount: 1_000_000, ..Default::default() };
        let before = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        let dep = dlmm.add_liquidity(pool_id, "lp", &req).unwrap();
        let after = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        assert!(check_add(&before, &after, &req, &dep).is_empty());

        let wreq = WithdrawLiquidity { bin_id: -4, shares: dep.shares / 3, ..Default::default() };
        let w = dlmm.withdraw_liquidity(pool_id, "lp", &wreq).unwrap();
        let last = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        assert!(check_withdraw(&after, &last, &wreq, &w).is_empty());
    }

    #[test]
    fn withdrawal_leaving_dust_behind_passes() {
        let mut dlmm = Dlmm::default();
        let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
        dlmm.fund("lp", "token-x", 1).unwrap();
        dlmm.fund("lp", "token-y", 1_000_000_000).unwrap();
        let req = AddLiquidity { bin_id: 0, x_amount: 1, y_amount: 1_000_000_000, max_x_fee: u128::MAX, max_y_fee: u128::MAX, ..Default::default() };
        let dep = dlmm.add_liquidity(pool_id, "lp", &req).unwrap();

        let wreq = WithdrawLiquidity { bin_id: 0, shares: dep.shares / 2, ..Default::default() };
        let before = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        let mut w = dlmm.withdraw_liquidity(pool_id, "lp", &wreq).unwrap();
        let after = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        assert_eq!(w.x_amount, 0);
        assert!(check_withdraw(&before, &after, &wreq, &w).is_empty());

        w.y_amount = 0;
        let rules: Vec<_> = check_withdraw(&before, &after, &wreq, &w).into_iter().map(|v| v.rule).collect();
        assert!(rules.iter().any(|r| r == "some reserve decreases"));
    }

    #[test]
    fn forged_result_is_caught() {
        let mut dlmm = Dlmm::default();
        let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
        dlmm.fund("lp", "token-x", 500).unwrap();
        let req = AddLiquidity { bin_id: 2, x_amount: 500, ..Default::default() };
        let before = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        let mut dep = dlmm.add_liquidity(pool_id, "lp", &req).unwrap();
        let after = Snapshot::capture(dlmm.state(), pool_id, "lp").unwrap();
        dep.shares += 1;
        let v = check_add(&before, &after, &req, &dep);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].rule, "bin shares grow by minted");
    }
}
