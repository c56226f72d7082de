//! Property tests for indicator and aggregation invariants.
//!
//! Uses proptest to verify:
//! 1. WMA is undefined below its period and matches the weighted formula
//! 2. Hull applies its smoothing pass
//! 3. Alligator state classification is idempotent
//! 4. Confluence score is the exact sum of its inputs

use confluence_core::confluence::{aggregate, Classification, FamilyEvents};
use confluence_core::detectors::{
    AlligatorDetector, AlligatorState, DetectorFamily, Event, EventKind, VolumeReading,
};
use confluence_core::domain::{Candle, System};
use confluence_core::indicators::{
    hull_raw_series, hull_series, wma, wma_series, AlligatorPoint, IndicatorParams, IndicatorSet,
};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_series(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, min..max)
}

fn arb_strength() -> impl Strategy<Value = f64> {
    (0.0..=1.0_f64).prop_map(|s| (s * 10.0).round() / 10.0)
}

fn candles_from(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: 1_704_067_200 + i as i64 * 3600,
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

fn scored_event(family: DetectorFamily, system: System, strength: f64) -> Event {
    Event {
        family,
        kind: EventKind::HullBreak {
            price: 1.0,
            hull: 1.0,
        },
        system,
        description: format!("{family} event"),
        strength,
        timestamp: 0,
    }
}

// ── 1. WMA ───────────────────────────────────────────────────────────

#[test]
fn wma_hand_computed_fixture() {
    let v = wma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
    assert!((v - 4.333333).abs() < 1e-6);
}

proptest! {
    /// Undefined whenever the series is shorter than the period.
    #[test]
    fn wma_undefined_below_period(series in arb_series(0, 20), extra in 1usize..10) {
        let period = series.len() + extra;
        prop_assert_eq!(wma(&series, period), None);
        prop_assert!(wma_series(&series, period).iter().all(|v| v.is_nan()));
    }

    /// Equals sum(value * weight) / sum(weight) over the trailing window.
    #[test]
    fn wma_matches_formula(series in arb_series(1, 60), period in 1usize..30) {
        prop_assume!(series.len() >= period);
        let window = &series[series.len() - period..];
        let num: f64 = window.iter().enumerate().map(|(i, v)| v * (i + 1) as f64).sum();
        let denom = (period * (period + 1) / 2) as f64;
        let got = wma(&series, period).unwrap();
        prop_assert!((got - num / denom).abs() < 1e-9 * got.abs().max(1.0));
    }

    /// WMA stays within the window's min/max.
    #[test]
    fn wma_bounded_by_window(series in arb_series(5, 60), period in 1usize..5) {
        let got = wma(&series, period).unwrap();
        let window = &series[series.len() - period..];
        let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(got >= lo - 1e-9 && got <= hi + 1e-9);
    }
}

// ── 2. Hull smoothing ────────────────────────────────────────────────

proptest! {
    /// For an accelerating increasing series the smoothed Hull differs from
    /// the raw `2*WMA(n/2) - WMA(n)` value once the smoothing pass has data.
    #[test]
    fn hull_differs_from_raw_on_monotonic_series(
        period in 4usize..40,
        growth in 0.01..2.0_f64,
        extra in 2usize..30,
    ) {
        let smoothing = (period as f64).sqrt().round() as usize;
        let len = period + smoothing + extra;
        let series: Vec<f64> = (0..len).map(|i| 100.0 + growth * (i * i) as f64).collect();
        let raw = hull_raw_series(&series, period);
        let smoothed = hull_series(&series, period);
        let last = len - 1;
        prop_assert!(!smoothed[last].is_nan());
        prop_assert!((raw[last] - smoothed[last]).abs() > 1e-9);
    }

    /// Hull never looks ahead: truncating the series leaves earlier values unchanged.
    #[test]
    fn hull_has_no_lookahead(series in arb_series(40, 80), cut in 30usize..40) {
        let full = hull_series(&series, 21);
        let truncated = hull_series(&series[..cut], 21);
        for i in 0..cut {
            let (a, b) = (full[i], truncated[i]);
            prop_assert!((a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-9);
        }
    }
}

// ── 3. Alligator idempotence ─────────────────────────────────────────

proptest! {
    /// Re-classifying the same window twice yields identical state, spread
    /// and direction.
    #[test]
    fn alligator_state_idempotent(closes in arb_series(130, 180)) {
        let candles = candles_from(&closes);
        let set = IndicatorSet::compute(&candles, &IndicatorParams::default());
        let detector = AlligatorDetector::default();
        let first = detector.analyze(&candles, &set).unwrap();
        let second = detector.analyze(&candles, &set).unwrap();
        prop_assert_eq!(first, second);

        let lines = set.alligator.as_ref().unwrap();
        prop_assert_eq!(detector.states(lines), detector.states(lines));
    }

    /// A spread at or below the threshold is sleeping for every line ordering.
    #[test]
    fn narrow_spread_sleeps(base in 1.0..10_000.0_f64, perm in 0usize..6) {
        let lines = [base, base * 0.9995, base * 0.999];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let o = orders[perm];
        let point = AlligatorPoint { jaw: lines[o[0]], teeth: lines[o[1]], lips: lines[o[2]] };
        let state = AlligatorState::classify(Some(point), 0.15);
        prop_assert_eq!(state.trend, None);
        prop_assert!(state.spread_pct <= 0.15);
    }
}

// ── 4. Confluence arithmetic ─────────────────────────────────────────

proptest! {
    /// Score = sum of scored strengths + volume strength + bonus.
    #[test]
    fn score_is_exact_sum(
        hull in prop::collection::vec(arb_strength(), 0..3),
        ichimoku in prop::collection::vec(arb_strength(), 0..4),
        ratio in 0.5..4.0_f64,
    ) {
        let mut events = FamilyEvents::default();
        events.hull = hull.iter().map(|&s| scored_event(DetectorFamily::Hull, System::Bearish, s)).collect();
        events.ichimoku = ichimoku.iter().map(|&s| scored_event(DetectorFamily::Ichimoku, System::Bullish, s)).collect();
        let volume = VolumeReading::from_ratio(0, ratio * 1000.0, 1000.0);

        let result = aggregate(&events, Some(&volume));
        let bonus = if volume.ratio >= 1.5 { 0.3 } else { 0.0 };
        let expected: f64 = hull.iter().sum::<f64>() + ichimoku.iter().sum::<f64>() + volume.strength + bonus;
        prop_assert!((result.score - expected).abs() < 1e-9);
        prop_assert_eq!(result.signal_count, hull.len() + ichimoku.len());
        prop_assert_eq!(result.classification, Classification::from_score(result.score));

        let expected_system = if !hull.is_empty() {
            Some(System::Bearish)
        } else if !ichimoku.is_empty() {
            Some(System::Bullish)
        } else {
            None
        };
        prop_assert_eq!(result.primary_system, expected_system);
    }

    /// The ladder is monotonic in the score.
    #[test]
    fn classification_monotonic(a in 0.0..5.0_f64, b in 0.0..5.0_f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(Classification::from_score(lo) <= Classification::from_score(hi));
    }
}

#[test]
fn ladder_boundaries() {
    assert_eq!(Classification::from_score(3.0), Classification::Perfect);
    assert_eq!(Classification::from_score(2.999), Classification::Excellent);
}
