//! Property tests for the composer, aligner and event study.
//!
//! Uses proptest to verify:
//! 1. Liquidity identity: output dates are the intersection, values the difference
//! 2. Forward fill: a value only changes on a date the series observed
//! 3. Idempotence: identical inputs give identical digests
//! 4. Causality: events never depend on the target or on future driver values

use std::collections::BTreeSet;

use chrono::NaiveDate;
use proptest::prelude::*;

use liqlens_core::align::{align, AlignConfig, Calendar, FillPolicy};
use liqlens_core::backtest::{detect_events, Direction, EventParams, EventStudy};
use liqlens_core::liquidity::{compose, LiquidityInputs, LiquidityUnits};
use liqlens_core::series::TimeSeries;

// ── Strategies (proptest) ────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

/// A series observed on a random subset of the first 60 days.
fn arb_series(name: &'static str) -> impl Strategy<Value = TimeSeries> {
    prop::collection::btree_map(0u64..60, 1.0..1000.0_f64, 1..40).prop_map(move |m| {
        TimeSeries::from_pairs(
            name,
            m.into_iter()
                .map(|(offset, v)| (base_date() + chrono::Days::new(offset), v)),
        )
        .unwrap()
    })
}

fn arb_path(len: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.9, 50.0..150.0_f64), len)
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Up), Just(Direction::Down)]
}

fn days(n: usize) -> Vec<NaiveDate> {
    base_date().iter_days().take(n).collect()
}

// ── 1. Liquidity identity ────────────────────────────────────────────

proptest! {
    #[test]
    fn net_liquidity_is_difference_on_intersection(
        bs in arb_series("walcl"),
        tga in arb_series("tga"),
        rrp in arb_series("rrp"),
    ) {
        let common: BTreeSet<NaiveDate> = bs
            .dates()
            .filter(|d| tga.value_on(*d).is_some() && rrp.value_on(*d).is_some())
            .collect();

        let result = compose(
            &LiquidityInputs {
                balance_sheet: Some(&bs),
                treasury_general_account: Some(&tga),
                reverse_repo: Some(&rrp),
            },
            LiquidityUnits::uniform(),
        );

        if common.is_empty() {
            prop_assert!(result.is_err());
        } else {
            let net = result.unwrap();
            let got: BTreeSet<NaiveDate> = net.dates().collect();
            prop_assert_eq!(&got, &common);
            for p in net.points() {
                let expected = bs.value_on(p.date).unwrap()
                    - tga.value_on(p.date).unwrap()
                    - rrp.value_on(p.date).unwrap();
                prop_assert!((p.value - expected).abs() < 1e-9);
            }
        }
    }
}

// ── 2. Forward fill ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn forward_fill_only_changes_on_observed_dates(
        anchor in arb_series("anchor"),
        other in arb_series("other"),
    ) {
        let panel = align(
            &[anchor, other.clone()],
            &AlignConfig {
                calendar: Calendar::Anchor("anchor".into()),
                fill: FillPolicy::ForwardFill,
            },
        )
        .unwrap();
        let col = panel.column("other").unwrap();
        let dates = panel.dates();

        for i in 0..dates.len() {
            // Every defined slot is the last observation at or before that date
            prop_assert_eq!(col[i], other.value_as_of(dates[i]));
        }
        for i in 1..dates.len() {
            let observed_between = other
                .dates()
                .any(|d| d > dates[i - 1] && d <= dates[i]);
            if !observed_between {
                prop_assert_eq!(col[i], col[i - 1]);
            }
        }
    }
}

// ── 3. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn identical_inputs_identical_digest(
        driver in arb_path(80),
        target in arb_path(80),
        lookback in 1usize..15,
        threshold in 0.0..0.2_f64,
        direction in arb_direction(),
        horizon in 1usize..30,
    ) {
        let dates = days(80);
        let params = EventParams::new(lookback, threshold, direction, horizon);
        let study = EventStudy {
            dates: &dates,
            driver_name: "driver",
            driver: &driver,
            target_name: "target",
            target: &target,
        };
        let a = study.run(&params).unwrap();
        let b = study.run(&params).unwrap();
        prop_assert_eq!(a.digest(), b.digest());
        prop_assert_eq!(
            a.event_count,
            a.resolved_count + a.pending_count + a.unpriced_count
        );
        prop_assert_eq!(a.stats.is_none(), a.resolved_count == 0);
    }
}

// ── 4. Causality ─────────────────────────────────────────────────────

proptest! {
    /// Changing the target never changes which dates are events.
    #[test]
    fn events_ignore_target(
        driver in arb_path(60),
        target_a in arb_path(60),
        target_b in arb_path(60),
        direction in arb_direction(),
    ) {
        let dates = days(60);
        let params = EventParams::new(5, 0.05, direction, 10);
        let run = |target: &[Option<f64>]| {
            EventStudy {
                dates: &dates,
                driver_name: "driver",
                driver: &driver,
                target_name: "target",
                target,
            }
            .run(&params)
            .unwrap()
        };
        let a: Vec<usize> = run(&target_a[..]).events.iter().map(|e| e.index).collect();
        let b: Vec<usize> = run(&target_b[..]).events.iter().map(|e| e.index).collect();
        prop_assert_eq!(a, b);
    }

    /// An event at row t is decided by driver rows up to t only.
    #[test]
    fn events_do_not_look_ahead(
        driver in arb_path(60),
        tail in arb_path(60),
        cut in 10usize..50,
    ) {
        let dates = days(60);
        let params = EventParams::new(5, 0.05, Direction::Down, 10);

        let mut spliced = driver.clone();
        spliced[cut..].copy_from_slice(&tail[cut..]);

        let before = |events: Vec<liqlens_core::backtest::Event>| -> Vec<usize> {
            events.into_iter().map(|e| e.index).filter(|&i| i < cut).collect()
        };
        prop_assert_eq!(
            before(detect_events(&dates, &driver, &params)),
            before(detect_events(&dates, &spliced, &params))
        );
    }
}
