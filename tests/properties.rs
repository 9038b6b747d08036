use approx::assert_relative_eq;
use dlmm_engine::constants::{MAX_BIN_ID, MIN_BIN_ID};
use dlmm_engine::engine::Dlmm;
use dlmm_engine::error::DlmmError;
use dlmm_engine::fuzz::{self, FuzzConfig};
use dlmm_engine::liquidity::{AddLiquidity, WithdrawLiquidity};
use dlmm_engine::oracle::{check_step, float_bound, float_reference, Finding};
use dlmm_engine::price::PriceModel;
use dlmm_engine::state::{PoolConfig, PoolId};
use dlmm_engine::swap::{max_input, swap_in_bin, SwapDirection, SwapInput};
use proptest::prelude::*;

fn direction() -> impl Strategy<Value = SwapDirection> {
    prop_oneof![Just(SwapDirection::XForY), Just(SwapDirection::YForX)]
}

fn pool_with_y(bin_id: i32, y: u128) -> (Dlmm, PoolId, u128) {
    let mut dlmm = Dlmm::default();
    let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
    dlmm.fund("lp", "token-y", y).unwrap();
    let d = dlmm.add_liquidity(pool_id, "lp", &AddLiquidity { bin_id, y_amount: y, ..Default::default() }).unwrap();
    (dlmm, pool_id, d.shares)
}

proptest! {
    #[test]
    fn integer_output_never_beats_float_reference(
        reserve_x in 1u128..1_000_000_000_000_000_000_000_000,
        reserve_y in 1u128..1_000_000_000_000_000_000_000_000,
        bin_price in 1u128..100_000_000_000_000,
        remaining_input in 1u128..1_000_000_000_000_000_000_000_000,
        fee_rate_bps in 0u128..=10_000,
        direction in direction(),
    ) {
        let input = SwapInput { reserve_x, reserve_y, bin_price, remaining_input, fee_rate_bps, direction };
        let step = swap_in_bin(&input);
        let counter = match direction {
            SwapDirection::XForY => reserve_y,
            SwapDirection::YForX => reserve_x,
        };
        prop_assert!(step.effective_input <= remaining_input);
        prop_assert!(step.fee_charged <= step.effective_input);
        prop_assert!(step.output <= counter);
        let reference = float_reference(&input, step.effective_input);
        prop_assert!(step.output as f64 <= float_bound(reference), "{} > {}", step.output, reference);
        prop_assert_eq!(check_step(0, &input, &step).finding, Finding::Ok);
    }

    #[test]
    fn prices_increase_across_the_whole_range(
        initial_price in 1_000_000_000u128..1_000_000_000_000,
        step_ix in 0usize..10,
    ) {
        let model = PriceModel::default();
        let bin_step = model.bin_steps().nth(step_ix).unwrap();
        let grid = model.grid(initial_price, bin_step).unwrap();
        let mut prev = 0u128;
        for id in MIN_BIN_ID..=MAX_BIN_ID {
            let p = grid.price_of_bin(id).unwrap();
            prop_assert!(p > prev);
            prev = p;
        }
        prop_assert_eq!(grid.price_of_bin(0).unwrap(), initial_price);
    }

    #[test]
    fn withdrawing_from_an_unfunded_bin_never_divides(
        bin_id in MIN_BIN_ID..=MAX_BIN_ID,
        shares in 1u128..=u128::MAX,
    ) {
        let mut dlmm = Dlmm::default();
        let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
        let req = WithdrawLiquidity { bin_id, shares, ..Default::default() };
        prop_assert_eq!(dlmm.withdraw_liquidity(pool_id, "anyone", &req).unwrap_err(), DlmmError::NoBinShares(bin_id));
    }

    #[test]
    fn split_withdrawal_matches_single_within_one_unit(
        bin_id in MIN_BIN_ID..0,
        y in 100_000_000u128..100_000_000_000_000_000_000,
        frac in 0.0f64..1.0,
    ) {
        let (dlmm, pool_id, total) = pool_with_y(bin_id, y);
        let half = ((total / 2) as f64 * frac).max(1.0) as u128;
        let half = half.clamp(1, total / 2);

        let mut once = dlmm.clone();
        let w = once
            .withdraw_liquidity(pool_id, "lp", &WithdrawLiquidity { bin_id, shares: 2 * half, ..Default::default() })
            .unwrap();

        let mut twice = dlmm;
        let req = WithdrawLiquidity { bin_id, shares: half, ..Default::default() };
        let a = twice.withdraw_liquidity(pool_id, "lp", &req).unwrap();
        let b = twice.withdraw_liquidity(pool_id, "lp", &req).unwrap();

        let split = a.y_amount + b.y_amount;
        prop_assert!(split.abs_diff(w.y_amount) <= 1, "split {} vs single {}", split, w.y_amount);
        prop_assert!(split <= y && w.y_amount <= y);
        prop_assert_eq!(twice.get_position(pool_id, "lp", bin_id).unwrap(), total - 2 * half);
    }

    #[test]
    fn split_withdrawal_from_two_asset_bin_with_dust(
        x in 1u128..=1_000,
        y in 10_000_000_000u128..100_000_000_000_000_000_000,
        other_x in 1u128..=1_000,
        other_y in 10_000_000_000u128..100_000_000_000_000_000_000,
        frac in 0.0f64..1.0,
    ) {
        let mut dlmm = Dlmm::default();
        let pool_id = dlmm.create_pool(&PoolConfig::default()).unwrap();
        for (lp, x, y) in [("lp", x, y), ("other", other_x, other_y)] {
            dlmm.fund(lp, "token-x", x).unwrap();
            dlmm.fund(lp, "token-y", y).unwrap();
            let req = AddLiquidity { bin_id: 0, x_amount: x, y_amount: y, max_x_fee: u128::MAX, max_y_fee: u128::MAX, ..Default::default() };
            dlmm.add_liquidity(pool_id, lp, &req).unwrap();
        }
        let total = dlmm.get_position(pool_id, "lp", 0).unwrap();
        let half = ((total / 2) as f64 * frac).max(1.0) as u128;
        let half = half.clamp(1, total / 2);
        let bin = dlmm.get_bin_balances(pool_id, 0).unwrap();

        let mut once = dlmm.clone();
        let w = once
            .withdraw_liquidity(pool_id, "lp", &WithdrawLiquidity { bin_id: 0, shares: 2 * half, ..Default::default() })
            .unwrap();

        let mut twice = dlmm;
        let req = WithdrawLiquidity { bin_id: 0, shares: half, ..Default::default() };
        let a = twice.withdraw_liquidity(pool_id, "lp", &req).unwrap();
        let b = twice.withdraw_liquidity(pool_id, "lp", &req).unwrap();

        let (split_x, split_y) = (a.x_amount + b.x_amount, a.y_amount + b.y_amount);
        prop_assert!(split_x.abs_diff(w.x_amount) <= 1, "x split {} vs single {}", split_x, w.x_amount);
        prop_assert!(split_y.abs_diff(w.y_amount) <= 1, "y split {} vs single {}", split_y, w.y_amount);
        prop_assert!(split_x <= bin.reserve_x && split_y <= bin.reserve_y);
        prop_assert_eq!(twice.get_position(pool_id, "lp", 0).unwrap(), total - 2 * half);
    }

    #[test]
    fn capacity_bounded_step_drains_the_bin(
        reserve in 1u128..=1_000_000_000_000_000_000_000_000,
        bin_price in 1u128..100_000_000_000_000,
        fee_rate_bps in 0u128..10_000,
        extra in 0u128..1_000_000,
        direction in direction(),
    ) {
        let (reserve_x, reserve_y) = match direction {
            SwapDirection::XForY => (0, reserve),
            SwapDirection::YForX => (reserve, 0),
        };
        let mut input = SwapInput { reserve_x, reserve_y, bin_price, remaining_input: 0, fee_rate_bps, direction };
        input.remaining_input = max_input(&input) + extra;
        let step = swap_in_bin(&input);
        prop_assert_eq!(step.output, reserve, "left {} behind", reserve - step.output);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn random_sequences_stay_conserved(seed in any::<u64>()) {
        let cfg = FuzzConfig { seed, iterations: 80, ..Default::default() };
        let report = fuzz::run(&cfg).unwrap();
        prop_assert!(report.is_clean(), "violations: {:?}", report.violations);
        prop_assert_eq!(report.executed, 80);
        prop_assert_eq!(report.integer_mismatches, 0);
    }
}

#[test]
fn fuzz_is_clean_at_both_range_boundaries() {
    for active_bin_id in [MIN_BIN_ID, MAX_BIN_ID] {
        let pool = PoolConfig { active_bin_id, ..Default::default() };
        let cfg = FuzzConfig { seed: 3, iterations: 200, pool, ..Default::default() };
        let report = fuzz::run(&cfg).unwrap();
        assert!(report.is_clean(), "active {active_bin_id}: {:?}", report.violations);
        assert!((MIN_BIN_ID..=MAX_BIN_ID).contains(&report.final_active_bin));
    }
}

#[test]
fn float_reference_tracks_exact_trade() {
    let input = SwapInput {
        reserve_x: 0,
        reserve_y: 50_000_000_000,
        bin_price: 5_000_000_000,
        remaining_input: 123_456_789,
        fee_rate_bps: 30,
        direction: SwapDirection::XForY,
    };
    let step = swap_in_bin(&input);
    let reference = float_reference(&input, step.effective_input);
    assert_eq!(step.output, 6_154_320_950);
    assert_relative_eq!(reference, step.output as f64, max_relative = 1e-12);
}
