use dlmm_engine::engine::{Dlmm, MultiSwap};
use dlmm_engine::error::{Asset, DlmmError};
use dlmm_engine::liquidity::{AddLiquidity, MoveLiquidity, WithdrawLiquidity};
use dlmm_engine::router::SwapLeg;
use dlmm_engine::state::{PoolConfig, PoolId};
use dlmm_engine::swap::{swap_in_bin, SwapDirection, SwapInput};

const X: &str = "token-x";
const Y: &str = "token-y";

fn x_for_y(reserve_y: u128, bin_price: u128, input: u128, fee: u128) -> dlmm_engine::swap::SwapStep {
    swap_in_bin(&SwapInput {
        reserve_x: 0,
        reserve_y,
        bin_price,
        remaining_input: input,
        fee_rate_bps: fee,
        direction: SwapDirection::XForY,
    })
}

fn any_fee() -> (u128, u128) { (u128::MAX, u128::MAX) }

/// Pool at price 50 with both assets in the active bin and Y in bins -1..=-3.
fn seeded() -> (Dlmm, PoolId) {
    let mut dlmm = Dlmm::default();
    let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
    dlmm.fund("lp", X, 1_000_000_000_000).unwrap();
    dlmm.fund("lp", Y, 1_000_000_000_000).unwrap();
    let (max_x_fee, max_y_fee) = any_fee();
    dlmm.add_liquidity(pool_id, "lp", &AddLiquidity { bin_id: 0, x_amount: 1, y_amount: 1_000_000_000, max_x_fee, max_y_fee, ..Default::default() })
        .unwrap();
    for bin_id in -3..=-1 {
        dlmm.add_liquidity(pool_id, "lp", &AddLiquidity { bin_id, y_amount: 1_000_000_000, ..Default::default() }).unwrap();
    }
    dlmm.fund("trader", X, 1_000_000_000_000).unwrap();
    (dlmm, pool_id)
}

#[test]
fn scenario_fee_reduces_output() {
    let s = x_for_y(50_000_000_000, 5_000_000_000, 100_000_000, 4_000);
    assert_eq!(s.fee_charged, 40_000_000);
    assert_eq!(s.output, 3_000_000_000);
}

#[test]
fn scenario_zero_fee() {
    let s = x_for_y(50_000_000_000, 5_000_000_000, 100_000_000, 0);
    assert_eq!(s.fee_charged, 0);
    assert_eq!(s.output, 5_000_000_000);
}

#[test]
fn scenario_capacity_cap() {
    let s = x_for_y(1_000_000_000, 5_000_000_000, 10_000_000_000, 0);
    assert!(s.effective_input < 10_000_000_000);
    assert_eq!(s.output, 1_000_000_000);
}

#[test]
fn scenario_full_fee() {
    for reserve in [1, 1_000, 50_000_000_000] {
        let s = x_for_y(reserve, 5_000_000_000, 100_000_000, 10_000);
        assert_eq!(s.fee_charged, s.effective_input);
        assert_eq!(s.output, 0);
    }
}

#[test]
fn scenario_wrong_composition_below_active() {
    let mut dlmm = Dlmm::default();
    let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
    dlmm.fund("lp", X, 10).unwrap();
    dlmm.fund("lp", Y, 10).unwrap();
    let err = dlmm
        .add_liquidity(pool_id, "lp", &AddLiquidity { bin_id: -1, x_amount: 5, y_amount: 5, ..Default::default() })
        .unwrap_err();
    assert_eq!(err, DlmmError::WrongComposition { bin_id: -1, asset: Asset::X });
    assert_eq!(dlmm.get_bin_balances(pool_id, -1).unwrap().total_shares, 0);
    assert_eq!(dlmm.get_user_balance("lp", X), 10);
}

#[test]
fn single_bin_swap_moves_exact_amounts() {
    let (mut dlmm, pool_id) = seeded();
    let before = dlmm.get_bin_balances(pool_id, 0).unwrap();
    let out = dlmm.swap_x_for_y(pool_id, "trader", 0, 1_000_000).unwrap();
    // 30 bps total, 10 of it protocol
    assert_eq!(out.fees, 3_000);
    assert_eq!(out.protocol_fees, 1_000);
    assert_eq!(out.amount_out, 997_000 * 50);
    let after = dlmm.get_bin_balances(pool_id, 0).unwrap();
    assert_eq!(after.reserve_x, before.reserve_x + 1_000_000 - 1_000);
    assert_eq!(after.reserve_y, before.reserve_y - out.amount_out);
    assert_eq!(after.total_shares, before.total_shares);
    assert_eq!(dlmm.get_user_balance("trader", X), 1_000_000_000_000 - 1_000_000);
    assert_eq!(dlmm.get_user_balance("trader", Y), out.amount_out);
    assert_eq!(dlmm.get_unclaimed_protocol_fees(pool_id).unwrap().x_fee, 1_000);
}

#[test]
fn swap_must_target_active_bin() {
    let (mut dlmm, pool_id) = seeded();
    assert_eq!(
        dlmm.swap_x_for_y(pool_id, "trader", -1, 1_000).unwrap_err(),
        DlmmError::NotActiveBin { bin_id: -1, active_bin_id: 0 }
    );
    assert_eq!(dlmm.swap_x_for_y(pool_id, "trader", 0, 0).unwrap_err(), DlmmError::InvalidAmount);
    assert_eq!(dlmm.swap_x_for_y(pool_id, "trader", 501, 1).unwrap_err(), DlmmError::InvalidBinId(501));
}

#[test]
fn draining_the_active_bin_shifts_it() {
    let (mut dlmm, pool_id) = seeded();
    let out = dlmm.swap_x_for_y(pool_id, "trader", 0, 1_000_000_000_000).unwrap();
    assert_eq!(out.amount_out, 1_000_000_000);
    assert!(out.unfilled > 0);
    assert_eq!(out.amount_in + out.unfilled, 1_000_000_000_000);
    assert_eq!(dlmm.get_user_balance("trader", X), 1_000_000_000_000 - out.amount_in);
    assert_eq!(dlmm.get_pool(pool_id).unwrap().active_bin_id, -1);
    assert_eq!(dlmm.swap_y_for_x(pool_id, "trader", -1, 1).unwrap_err(), DlmmError::NoLiquidity);
}

#[test]
fn multi_bin_swap_walks_down_and_leaves_active_past_last_bin() {
    let (mut dlmm, pool_id) = seeded();
    let req = MultiSwap { direction: SwapDirection::XForY, amount: 100_000_000, min_received: 0, max_unfavorable_bins: None };
    let quote = dlmm.quote_swap(pool_id, req.direction, req.amount, None).unwrap();
    let out = dlmm.swap_multi(pool_id, "trader", &req).unwrap();
    let bins: Vec<i32> = out.steps.iter().map(|s| s.bin_id).collect();
    assert_eq!(bins, vec![0, -1, -2, -3]);
    assert_eq!(out.amount_out, 4_000_000_000);
    assert_eq!(quote.total_output, out.amount_out);
    assert_eq!(out.active_bin_before, 0);
    assert_eq!(out.active_bin_after, -4);
    for id in -3..=0 {
        assert_eq!(dlmm.get_bin_balances(pool_id, id).unwrap().reserve_y, 0);
    }
}

#[test]
fn slippage_and_min_received_abort_without_trace() {
    let (mut dlmm, pool_id) = seeded();
    let req = MultiSwap { direction: SwapDirection::XForY, amount: 100_000_000, min_received: 0, max_unfavorable_bins: Some(1) };
    assert_eq!(
        dlmm.swap_multi(pool_id, "trader", &req).unwrap_err(),
        DlmmError::BinSlippage { bin_id: -2, distance: 2, max: 1 }
    );
    let req = MultiSwap { max_unfavorable_bins: None, min_received: 4_000_000_001, ..req };
    assert_eq!(dlmm.swap_multi(pool_id, "trader", &req).unwrap_err(), DlmmError::MinimumYAmount);
    assert_eq!(dlmm.get_user_balance("trader", X), 1_000_000_000_000);
    assert_eq!(dlmm.get_pool(pool_id).unwrap().active_bin_id, 0);
}

#[test]
fn liquidity_lifecycle() {
    let mut dlmm = Dlmm::default();
    let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
    dlmm.fund("a", Y, 2_000_000_000).unwrap();
    assert_eq!(
        dlmm.withdraw_liquidity(pool_id, "a", &WithdrawLiquidity { bin_id: -2, shares: 1, ..Default::default() }).unwrap_err(),
        DlmmError::NoBinShares(-2)
    );

    let d = dlmm.add_liquidity(pool_id, "a", &AddLiquidity { bin_id: -2, y_amount: 1_000_000_000, ..Default::default() }).unwrap();
    assert_eq!(dlmm.get_position(pool_id, "a", -2).unwrap(), d.shares);
    assert_eq!(
        dlmm.add_liquidity(pool_id, "a", &AddLiquidity { bin_id: -2, y_amount: 1, min_shares: d.shares, ..Default::default() })
            .unwrap_err(),
        DlmmError::MinimumLpAmount { minted: 0, min: d.shares }
    );
    assert_eq!(
        dlmm.withdraw_liquidity(pool_id, "a", &WithdrawLiquidity { bin_id: -2, shares: d.shares + 1, ..Default::default() })
            .unwrap_err(),
        DlmmError::InsufficientBalance { available: d.shares, required: d.shares + 1 }
    );
    assert_eq!(
        dlmm.withdraw_liquidity(pool_id, "a", &WithdrawLiquidity { bin_id: -2, shares: d.shares, min_y: 1_000_000_001, ..Default::default() })
            .unwrap_err(),
        DlmmError::MinimumYAmount
    );

    let mv = MoveLiquidity { from_bin_id: -2, to_bin_id: -2, shares: d.shares, ..Default::default() };
    assert_eq!(dlmm.move_liquidity(pool_id, "a", &mv).unwrap_err(), DlmmError::MatchingBinId(-2));
    let r = dlmm.move_liquidity(pool_id, "a", &MoveLiquidity { to_bin_id: -7, ..mv }).unwrap();
    assert_eq!(r.withdrawn.y_amount, 1_000_000_000);
    assert_eq!(dlmm.get_position(pool_id, "a", -2).unwrap(), 0);
    assert_eq!(dlmm.get_position(pool_id, "a", -7).unwrap(), r.deposited.shares);

    let w = dlmm
        .withdraw_liquidity(pool_id, "a", &WithdrawLiquidity { bin_id: -7, shares: r.deposited.shares, ..Default::default() })
        .unwrap();
    assert_eq!(w.y_amount, 1_000_000_000);
    assert_eq!(dlmm.get_user_balance("a", Y), 2_000_000_000);
    assert!(dlmm.get_bin_balances(pool_id, -7).unwrap().is_empty());
}

#[test]
fn providers_exit_after_a_swap_leaves_dust() {
    let mut dlmm = Dlmm::default();
    let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
    let (max_x_fee, max_y_fee) = any_fee();
    let mut shares = Vec::new();
    for lp in ["a", "b"] {
        dlmm.fund(lp, X, 1).unwrap();
        dlmm.fund(lp, Y, 1_000_000_000).unwrap();
        let req = AddLiquidity { bin_id: 0, x_amount: 1, y_amount: 1_000_000_000, max_x_fee, max_y_fee, ..Default::default() };
        shares.push(dlmm.add_liquidity(pool_id, lp, &req).unwrap().shares);
    }
    dlmm.fund("trader", Y, 60).unwrap();
    let out = dlmm.swap_y_for_x(pool_id, "trader", 0, 60).unwrap();
    assert_eq!(out.amount_out, 1);
    let bin = dlmm.get_bin_balances(pool_id, 0).unwrap();
    assert_eq!((bin.reserve_x, bin.reserve_y), (1, 2_000_000_060));

    // Neither holder alone owns the single X unit left.
    let a = dlmm.withdraw_liquidity(pool_id, "a", &WithdrawLiquidity { bin_id: 0, shares: shares[0], ..Default::default() }).unwrap();
    assert_eq!(a.x_amount, 0);
    assert!(a.y_amount > 0);
    let b = dlmm.withdraw_liquidity(pool_id, "b", &WithdrawLiquidity { bin_id: 0, shares: shares[1], ..Default::default() }).unwrap();
    assert_eq!(b.x_amount, 1);
    assert_eq!(a.y_amount + b.y_amount, 2_000_000_060);
    assert_eq!(dlmm.get_user_balance("a", Y) + dlmm.get_user_balance("b", Y), 2_000_000_060);
    assert!(dlmm.get_bin_balances(pool_id, 0).unwrap().is_empty());
}

#[test]
fn claim_pays_fee_address_and_resets() {
    let (mut dlmm, pool_id) = seeded();
    dlmm.swap_x_for_y(pool_id, "trader", 0, 1_000_000).unwrap();
    let claimed = dlmm.claim_protocol_fees(pool_id).unwrap();
    assert_eq!(claimed.x_fee, 1_000);
    assert_eq!(dlmm.get_user_balance("fee-collector", X), 1_000);
    assert_eq!(dlmm.get_unclaimed_protocol_fees(pool_id).unwrap().x_fee, 0);
    let again = dlmm.claim_protocol_fees(pool_id).unwrap();
    assert_eq!((again.x_fee, again.y_fee), (0, 0));
    assert_eq!(dlmm.get_user_balance("fee-collector", X), 1_000);
}

#[test]
fn variable_fee_governance() {
    let mut dlmm = Dlmm::default();
    let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();

    assert_eq!(dlmm.set_variable_fees(pool_id, "mallory", 5, 5, 0).unwrap_err(), DlmmError::NotAuthorized);
    dlmm.set_variable_fees(pool_id, "manager", 5, 7, 0).unwrap();
    let pool = dlmm.get_pool(pool_id).unwrap();
    assert_eq!((pool.x_fees.variable_fee_bps, pool.y_fees.variable_fee_bps), (5, 7));

    assert_eq!(
        dlmm.set_variable_fees(pool_id, "manager", 1, 1, 10).unwrap_err(),
        DlmmError::VariableFeesCooldown { ready_at: 144 }
    );
    assert_eq!(dlmm.set_variable_fees(pool_id, "manager", 9_971, 0, 144).unwrap_err(), DlmmError::InvalidFee(10_001));
    assert_eq!(dlmm.reset_variable_fees(pool_id, 143).unwrap_err(), DlmmError::VariableFeesCooldown { ready_at: 144 });
    dlmm.reset_variable_fees(pool_id, 144).unwrap();
    assert_eq!(dlmm.get_pool(pool_id).unwrap().x_fees.variable_fee_bps, 0);

    assert_eq!(dlmm.set_variable_fees_cooldown(pool_id, "manager", 1).unwrap_err(), DlmmError::NotAuthorized);
    dlmm.set_variable_fees_cooldown(pool_id, "admin", 1).unwrap();
    dlmm.set_variable_fees(pool_id, "manager", 1, 1, 145).unwrap();

    dlmm.set_variable_fees_manager(pool_id, "admin", "new-manager").unwrap();
    assert_eq!(dlmm.set_variable_fees(pool_id, "manager", 1, 1, 200).unwrap_err(), DlmmError::NotAuthorized);
    assert_eq!(dlmm.freeze_variable_fees_manager(pool_id, "manager").unwrap_err(), DlmmError::NotAuthorized);
    dlmm.freeze_variable_fees_manager(pool_id, "admin").unwrap();
    assert_eq!(
        dlmm.set_variable_fees_manager(pool_id, "admin", "other").unwrap_err(),
        DlmmError::VariableFeesManagerFrozen
    );
    assert_eq!(dlmm.freeze_variable_fees_manager(pool_id, "admin").unwrap_err(), DlmmError::VariableFeesManagerFrozen);
    assert_eq!(dlmm.get_pool(pool_id).unwrap().variable_fees.manager, "new-manager");
}

#[test]
fn router_batches_are_all_or_nothing() {
    let (mut dlmm, pool_id) = seeded();
    let leg = SwapLeg {
        pool_id,
        x_token: X.into(),
        y_token: Y.into(),
        direction: SwapDirection::XForY,
        amount: 1_000_000,
        min_received: 0,
    };
    let wrong = SwapLeg { y_token: "token-z".into(), ..leg.clone() };
    assert_eq!(
        dlmm.swap_batch("trader", &[leg.clone(), wrong], None).unwrap_err(),
        DlmmError::WrongToken(Asset::Y)
    );
    let missing = SwapLeg { pool_id: 99, ..leg.clone() };
    assert_eq!(dlmm.swap_batch("trader", &[leg.clone(), missing], None).unwrap_err(), DlmmError::NoPoolData(99));
    assert_eq!(dlmm.get_user_balance("trader", X), 1_000_000_000_000);

    let batch = dlmm.swap_batch("trader", &[leg.clone(), leg], None).unwrap();
    assert_eq!(batch.legs.len(), 2);
    assert_eq!(dlmm.get_user_balance("trader", X), 1_000_000_000_000 - 2_000_000);

    dlmm.fund("b", Y, 300).unwrap();
    let adds = [
        AddLiquidity { bin_id: -10, y_amount: 100, ..Default::default() },
        AddLiquidity { bin_id: -11, y_amount: 100, ..Default::default() },
        AddLiquidity { bin_id: 10, y_amount: 100, ..Default::default() },
    ];
    assert_eq!(
        dlmm.add_liquidity_multi(pool_id, "b", &adds).unwrap_err(),
        DlmmError::WrongComposition { bin_id: 10, asset: Asset::Y }
    );
    assert_eq!(dlmm.get_position(pool_id, "b", -10).unwrap(), 0);
    let deps = dlmm.add_liquidity_multi(pool_id, "b", &adds[..2]).unwrap();
    assert_eq!(deps.len(), 2);

    let wds: Vec<WithdrawLiquidity> = deps
        .iter()
        .zip([-10, -11])
        .map(|(d, bin_id)| WithdrawLiquidity { bin_id, shares: d.shares, ..Default::default() })
        .collect();
    dlmm.withdraw_liquidity_multi(pool_id, "b", &wds).unwrap();
    assert_eq!(dlmm.get_user_balance("b", Y), 300);
    assert_eq!(dlmm.swap_batch("trader", &[], None).unwrap_err(), DlmmError::InvalidAmount);
}

#[test]
fn bin_id_codec_and_prices() {
    let dlmm = Dlmm::default();
    assert_eq!(dlmm.get_unsigned_bin_id(-500).unwrap(), 0);
    assert_eq!(dlmm.get_signed_bin_id(500).unwrap(), 0);
    assert_eq!(dlmm.get_bin_price(100_000_000, 25, 1).unwrap(), 100_250_000);
    assert!(dlmm.get_bin_price(100_000_000, 25, -501).is_err());
}
