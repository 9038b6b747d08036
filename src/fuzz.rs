//! Seeded randomized transaction harness
//!
//! Drives one pool through a long sequence of random swaps and liquidity
//! operations, snapshotting before and after each one. Rejections are
//! expected and tallied by error code; conservation failures and oracle
//! exploits are collected for the report. The same seed always replays the
//! same sequence.

use crate::constants::{MAX_BIN_ID, MIN_BIN_ID};
use crate::engine::{Dlmm, MultiSwap, SwapOutcome};
use crate::error::{DlmmError, Result};
use crate::fees::ProtocolFees;
use crate::invariants::{self, Snapshot, Violation};
use crate::liquidity::{AddLiquidity, Deposit, MoveLiquidity, Relocation, WithdrawLiquidity, Withdrawal};
use crate::oracle::{self, Finding, StepCheck};
use crate::planner::PlannerConfig;
use crate::price::PriceModel;
use crate::state::{Composition, PoolConfig, PoolId};
use crate::swap::SwapDirection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info};

/// Harness settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// PRNG seed
    pub seed: u64,
    /// Transactions to attempt
    pub iterations: u64,
    /// Trading accounts
    pub users: u32,
    /// Stop at the first exploit finding
    pub halt_on_exploit: bool,
    /// Bins seeded on each side of the active bin
    pub seed_bins: i32,
    /// X placed in each seeded bin above the active bin
    pub seed_x: u128,
    /// Y placed in each seeded bin below the active bin
    pub seed_y: u128,
    /// Starting balance of each account in each token
    pub user_funds: u128,
    /// Slippage bound passed to multi-bin swaps
    pub max_unfavorable_bins: Option<u32>,
    /// Pool under test
    pub pool: PoolConfig,
    /// Traversal settings
    pub planner: PlannerConfig,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            iterations: 1_000,
            users: 4,
            halt_on_exploit: true,
            seed_bins: 20,
            seed_x: 100_000_000_000,
            seed_y: 5_000_000_000_000,
            user_funds: 1_000_000_000_000_000_000_000,
            max_unfavorable_bins: None,
            pool: PoolConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

/// Kind of generated transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Single-bin X for Y
    SwapXForY,
    /// Single-bin Y for X
    SwapYForX,
    /// Multi-bin X for Y
    MultiSwapXForY,
    /// Multi-bin Y for X
    MultiSwapYForX,
    /// Deposit
    AddLiquidity,
    /// Withdrawal
    WithdrawLiquidity,
    /// Move between bins
    MoveLiquidity,
    /// Protocol-fee claim
    ClaimFees,
}

impl OpKind {
    /// Snake-case name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::SwapXForY => "swap_x_for_y",
            OpKind::SwapYForX => "swap_y_for_x",
            OpKind::MultiSwapXForY => "multi_swap_x_for_y",
            OpKind::MultiSwapYForX => "multi_swap_y_for_x",
            OpKind::AddLiquidity => "add_liquidity",
            OpKind::WithdrawLiquidity => "withdraw_liquidity",
            OpKind::MoveLiquidity => "move_liquidity",
            OpKind::ClaimFees => "claim_fees",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// How a transaction was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Executed and every check passed
    Ok,
    /// Refused by the engine with a typed error
    Rejected,
    /// Executed but broke a conservation rule
    InvariantViolation,
    /// Paid out more than the float reference allows
    Exploit,
}

/// One line of the transaction log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Position in the run
    pub index: u64,
    /// Operation
    pub op: OpKind,
    /// Caller
    pub user: String,
    /// Bin addressed, if any
    pub bin_id: Option<i32>,
    /// Amount or shares offered
    pub amount: u128,
    /// Output, payout or shares minted
    pub amount_out: u128,
    /// Classification
    pub status: TxStatus,
    /// Error code when rejected
    pub error_code: Option<u32>,
    /// Float reference minus actual output, for swaps
    pub slack: Option<f64>,
    /// Active bin after the transaction
    pub active_bin_id: i32,
    /// Error message or first violated rule
    pub detail: String,
}

/// Tallies for one operation kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpStats {
    /// Attempts
    pub attempted: u64,
    /// Clean executions
    pub ok: u64,
    /// Typed rejections
    pub rejected: u64,
    /// Executions with violated invariants
    pub violations: u64,
    /// Exploit findings
    pub exploits: u64,
}

/// Outcome of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FuzzReport {
    /// Seed used
    pub seed: u64,
    /// Transactions actually attempted
    pub executed: u64,
    /// Whether the run stopped early on an exploit
    pub halted: bool,
    /// Per-operation tallies
    pub ops: BTreeMap<OpKind, OpStats>,
    /// Rejections per error code
    pub rejections: BTreeMap<u32, u64>,
    /// Every violated rule
    pub violations: Vec<Violation>,
    /// Every exploit finding
    pub exploits: Vec<StepCheck>,
    /// Bin steps whose integer reference disagreed with production
    pub integer_mismatches: u64,
    /// Smallest per-swap slack seen
    pub min_slack: Option<f64>,
    /// Largest per-swap slack seen
    pub max_slack: Option<f64>,
    /// Active bin at the end of the run
    pub final_active_bin: i32,
    /// Transaction log
    #[serde(skip)]
    pub records: Vec<TxRecord>,
}

impl FuzzReport {
    /// No violations and no exploits.
    pub fn is_clean(&self) -> bool { self.violations.is_empty() && self.exploits.is_empty() }

    fn tally(&mut self, rec: &TxRecord) {
        let stats = self.ops.entry(rec.op).or_default();
        stats.attempted += 1;
        match rec.status {
            TxStatus::Ok => stats.ok += 1,
            TxStatus::Rejected => stats.rejected += 1,
            TxStatus::InvariantViolation => stats.violations += 1,
            TxStatus::Exploit => stats.exploits += 1,
        }
        if let Some(code) = rec.error_code {
            *self.rejections.entry(code).or_default() += 1;
        }
        if let Some(s) = rec.slack {
            self.min_slack = Some(self.min_slack.map_or(s, |m| m.min(s)));
            self.max_slack = Some(self.max_slack.map_or(s, |m| m.max(s)));
        }
    }
}

enum Executed {
    Swap(SwapOutcome),
    Add(AddLiquidity, Deposit),
    Withdraw(WithdrawLiquidity, Withdrawal),
    Move(MoveLiquidity, Relocation),
    Claim(ProtocolFees),
}

struct Planned {
    op: OpKind,
    user: String,
    bin_id: Option<i32>,
    amount: u128,
}

/// Harness state for one run.
pub struct Harness {
    cfg: FuzzConfig,
    rng: StdRng,
    dlmm: Dlmm,
    pool_id: PoolId,
    users: Vec<String>,
}

impl Harness {
    /// Creates the pool, funds every account and seeds liquidity around the
    /// active bin.
    pub fn new(cfg: FuzzConfig) -> Result<Self> {
        let mut dlmm = Dlmm::new(PriceModel::default(), cfg.planner);
        let pool_id = dlmm.create_pool(&cfg.pool)?;
        let users: Vec<String> = (0..cfg.users.max(1)).map(|i| format!("user-{i}")).collect();
        for u in &users {
            dlmm.fund(u, &cfg.pool.x_token, cfg.user_funds)?;
            dlmm.fund(u, &cfg.pool.y_token, cfg.user_funds)?;
        }

        let active = cfg.pool.active_bin_id;
        let seeder = &users[0];
        for offset in -cfg.seed_bins..=cfg.seed_bins {
            let bin_id = active + offset;
            if !(MIN_BIN_ID..=MAX_BIN_ID).contains(&bin_id) {
                continue;
            }
            let (x_amount, y_amount) = match Composition::of(bin_id, active) {
                Composition::YOnly => (0, cfg.seed_y),
                Composition::XOnly => (cfg.seed_x, 0),
                Composition::Both => (cfg.seed_x, cfg.seed_y),
            };
            let req = AddLiquidity { bin_id, x_amount, y_amount, max_x_fee: u128::MAX, max_y_fee: u128::MAX, ..Default::default() };
            dlmm.add_liquidity(pool_id, seeder, &req)?;
        }
        info!(pool_id, seed = cfg.seed, bins = 2 * cfg.seed_bins + 1, users = users.len(), "fuzz pool seeded");

        let rng = StdRng::seed_from_u64(cfg.seed);
        Ok(Self { cfg, rng, dlmm, pool_id, users })
    }

    /// Engine under test.
    pub fn engine(&self) -> &Dlmm { &self.dlmm }

    /// Pool under test.
    pub fn pool_id(&self) -> PoolId { self.pool_id }

    /// Runs every iteration, or until the first exploit when configured to halt.
    pub fn run(&mut self) -> Result<FuzzReport> {
        let mut report = FuzzReport { seed: self.cfg.seed, ..Default::default() };
        for index in 0..self.cfg.iterations {
            let rec = self.step(index, &mut report)?;
            report.tally(&rec);
            report.executed += 1;
            let exploit = rec.status == TxStatus::Exploit;
            report.records.push(rec);
            if exploit && self.cfg.halt_on_exploit {
                error!(index, "halting on exploit");
                report.halted = true;
                break;
            }
        }
        report.final_active_bin = self.dlmm.state().pool(self.pool_id)?.pool.active_bin_id;
        info!(
            executed = report.executed,
            violations = report.violations.len(),
            exploits = report.exploits.len(),
            rejected = report.rejections.values().sum::<u64>(),
            "fuzz run finished"
        );
        Ok(report)
    }

    fn active_bin(&self) -> Result<i32> { Ok(self.dlmm.state().pool(self.pool_id)?.pool.active_bin_id) }

    /// 1, near-`u128::MAX`, zero, or something in between.
    fn amount(&mut self) -> u128 {
        match self.rng.gen_range(0..100u32) {
            0..=4 => 1,
            5..=7 => u128::MAX - self.rng.gen_range(0..1_000u128),
            8..=9 => 0,
            10..=59 => self.rng.gen_range(1..=1_000_000_000u128),
            60..=89 => self.rng.gen_range(1..=1_000_000_000_000u128),
            _ => self.rng.gen_range(1..=self.cfg.user_funds.max(1)),
        }
    }

    /// Near the active bin, at either boundary, or just outside the range.
    fn bin_id(&mut self, active: i32) -> i32 {
        match self.rng.gen_range(0..100u32) {
            0..=2 => MIN_BIN_ID,
            3..=5 => MAX_BIN_ID,
            6 => MIN_BIN_ID - 1,
            7 => MAX_BIN_ID + 1,
            _ => active + self.rng.gen_range(-30..=30),
        }
    }

    fn pick_position(&mut self, user: &str) -> Result<Option<(i32, u128)>> {
        let held: Vec<(i32, u128)> = self
            .dlmm
            .state()
            .pool(self.pool_id)?
            .positions
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|((_, bin), shares)| (*bin, *shares))
            .collect();
        if held.is_empty() {
            return Ok(None);
        }
        Ok(Some(held[self.rng.gen_range(0..held.len())]))
    }

    fn shares_of(&mut self, held: u128) -> u128 {
        match self.rng.gen_range(0..10u32) {
            0..=2 => held,
            3..=5 => held / 2,
            6 => held.saturating_add(1),
            _ => self.rng.gen_range(1..=held.max(1)),
        }
    }

    fn execute(&mut self, plan: &mut Planned) -> Result<Result<Executed>> {
        let active = self.active_bin()?;
        let pool_id = self.pool_id;
        let user = plan.user.clone();
        let res = match plan.op {
            OpKind::SwapXForY | OpKind::SwapYForX => {
                let direction = if plan.op == OpKind::SwapXForY { SwapDirection::XForY } else { SwapDirection::YForX };
                let bin_id = if self.rng.gen_bool(0.85) { active } else { self.bin_id(active) };
                plan.bin_id = Some(bin_id);
                self.dlmm.swap(pool_id, &user, direction, bin_id, plan.amount).map(Executed::Swap)
            }
            OpKind::MultiSwapXForY | OpKind::MultiSwapYForX => {
                let direction = if plan.op == OpKind::MultiSwapXForY { SwapDirection::XForY } else { SwapDirection::YForX };
                let min_received = if self.rng.gen_bool(0.05) { u128::MAX } else { 0 };
                let req = MultiSwap { direction, amount: plan.amount, min_received, max_unfavorable_bins: self.cfg.max_unfavorable_bins };
                plan.bin_id = Some(active);
                self.dlmm.swap_multi(pool_id, &user, &req).map(Executed::Swap)
            }
            OpKind::AddLiquidity => {
                let bin_id = self.bin_id(active);
                let other = self.amount();
                let (mut x_amount, mut y_amount) = match Composition::of(bin_id, active) {
                    Composition::YOnly => (0, plan.amount),
                    Composition::XOnly => (plan.amount, 0),
                    Composition::Both => (plan.amount, other),
                };
                // Occasionally offer the wrong asset as well.
                if self.rng.gen_bool(0.1) {
                    x_amount = x_amount.max(other);
                    y_amount = y_amount.max(other);
                }
                let capped = self.rng.gen_bool(0.1);
                let req = AddLiquidity {
                    bin_id,
                    x_amount,
                    y_amount,
                    min_shares: if self.rng.gen_bool(0.05) { u128::MAX } else { 0 },
                    max_x_fee: if capped { 0 } else { u128::MAX },
                    max_y_fee: if capped { 0 } else { u128::MAX },
                };
                plan.bin_id = Some(bin_id);
                self.dlmm.add_liquidity(pool_id, &user, &req).map(|d| Executed::Add(req, d))
            }
            OpKind::WithdrawLiquidity => {
                let (bin_id, shares) = match self.pick_position(&user)? {
                    Some((bin, held)) if self.rng.gen_bool(0.85) => (bin, self.shares_of(held)),
                    _ => (self.bin_id(active), plan.amount),
                };
                let req = WithdrawLiquidity { bin_id, shares, min_x: 0, min_y: 0 };
                plan.bin_id = Some(bin_id);
                plan.amount = shares;
                self.dlmm.withdraw_liquidity(pool_id, &user, &req).map(|w| Executed::Withdraw(req, w))
            }
            OpKind::MoveLiquidity => {
                let (from_bin_id, shares) = match self.pick_position(&user)? {
                    Some((bin, held)) => (bin, self.shares_of(held)),
                    None => (self.bin_id(active), plan.amount),
                };
                let req = MoveLiquidity {
                    from_bin_id,
                    to_bin_id: self.bin_id(active),
                    shares,
                    min_shares: 0,
                    max_x_fee: u128::MAX,
                    max_y_fee: u128::MAX,
                };
                plan.bin_id = Some(from_bin_id);
                plan.amount = shares;
                self.dlmm.move_liquidity(pool_id, &user, &req).map(|r| Executed::Move(req, r))
            }
            OpKind::ClaimFees => self.dlmm.claim_protocol_fees(pool_id).map(Executed::Claim),
        };
        Ok(res)
    }

    fn next_op(&mut self) -> OpKind {
        match self.rng.gen_range(0..100u32) {
            0..=19 => OpKind::SwapXForY,
            20..=39 => OpKind::SwapYForX,
            40..=49 => OpKind::MultiSwapXForY,
            50..=59 => OpKind::MultiSwapYForX,
            60..=74 => OpKind::AddLiquidity,
            75..=89 => OpKind::WithdrawLiquidity,
            90..=97 => OpKind::MoveLiquidity,
            _ => OpKind::ClaimFees,
        }
    }

    fn step(&mut self, index: u64, report: &mut FuzzReport) -> Result<TxRecord> {
        let op = self.next_op();
        let user = self.users[self.rng.gen_range(0..self.users.len())].clone();
        let amount = self.amount();
        let mut plan = Planned { op, user, bin_id: None, amount };

        let before = Snapshot::capture(self.dlmm.state(), self.pool_id, &plan.user)?;
        let executed = self.execute(&mut plan)?;
        let after = Snapshot::capture(self.dlmm.state(), self.pool_id, &plan.user)?;

        let mut rec = TxRecord {
            index,
            op,
            user: plan.user.clone(),
            bin_id: plan.bin_id,
            amount: plan.amount,
            amount_out: 0,
            status: TxStatus::Ok,
            error_code: None,
            slack: None,
            active_bin_id: after.pool.pool.active_bin_id,
            detail: String::new(),
        };

        let (violations, exploit) = match executed {
            Err(e) => {
                rec.status = TxStatus::Rejected;
                rec.error_code = Some(e.code());
                rec.detail = e.to_string();
                (rejected_left_no_trace(&before, &after, &e), None)
            }
            Ok(Executed::Swap(out)) => {
                rec.amount_out = out.amount_out;
                let check = oracle::check_outcome(&before.pool, &out);
                rec.slack = Some(check.float_reference - out.amount_out as f64);
                report.integer_mismatches += check.mismatches().count() as u64;
                (invariants::check_swap(&before, &after, &out), check.exploit().copied())
            }
            Ok(Executed::Add(req, d)) => {
                rec.amount_out = d.shares;
                (invariants::check_add(&before, &after, &req, &d), None)
            }
            Ok(Executed::Withdraw(req, w)) => {
                rec.amount_out = w.x_amount.saturating_add(w.y_amount);
                (invariants::check_withdraw(&before, &after, &req, &w), None)
            }
            Ok(Executed::Move(req, r)) => {
                rec.amount_out = r.deposited.shares;
                (invariants::check_move(&before, &after, req.from_bin_id, req.to_bin_id, &r), None)
            }
            Ok(Executed::Claim(fees)) => {
                rec.amount_out = fees.x_fee.saturating_add(fees.y_fee);
                (invariants::check_claim(&before, &after, &fees), None)
            }
        };

        if let Some(found) = exploit {
            rec.status = TxStatus::Exploit;
            if let Finding::Exploit { actual, reference } = found.finding {
                rec.detail = format!("bin {} paid {actual} against reference {reference}", found.bin_id);
            }
            report.exploits.push(found);
        } else if let Some(v) = violations.first() {
            rec.status = TxStatus::InvariantViolation;
            rec.detail = v.to_string();
        }
        report.violations.extend(violations);
        debug!(index, op = %op, status = ?rec.status, amount = rec.amount, out = rec.amount_out, "fuzz tx");
        Ok(rec)
    }
}

fn rejected_left_no_trace(before: &Snapshot, after: &Snapshot, e: &DlmmError) -> Vec<Violation> {
    let untouched = before.pool == after.pool && before.x_balance == after.x_balance && before.y_balance == after.y_balance;
    if untouched {
        return Vec::new();
    }
    vec![Violation {
        op: "rejected".into(),
        rule: "rejected operation leaves no trace".into(),
        detail: format!("error {} changed state", e.code()),
    }]
}

/// Runs a full harness for `cfg`.
pub fn run(cfg: &FuzzConfig) -> Result<FuzzReport> { Harness::new(cfg.clone())?.run() }
