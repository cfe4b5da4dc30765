//! OEE computation scenarios over hand-built window inputs.

use mes_core::analytics::oee::{
    build_report, compute_oee, compute_reliability, trend, OeeInput, TrendDirection,
};

fn shift_with_one_stop() -> OeeInput {
    // 8h shift, 1h downtime, 6h of recorded production,
    // 950 good units against 1000 planned
    OeeInput {
        planned_time_seconds: 8 * 3600,
        downtime_seconds: 3600,
        production_seconds: 6 * 3600,
        actual_quantity: 950,
        planned_quantity: 1000,
        incident_count: 1,
        resolved_count: 1,
    }
}

#[test]
fn shift_oee_matches_hand_computation() {
    let metrics = compute_oee(&shift_with_one_stop());

    let availability = 7.0 / 8.0;
    let performance = 6.0 / 7.0;
    let quality = 0.95;

    assert!((metrics.availability - availability).abs() < 1e-9);
    assert!((metrics.performance - performance).abs() < 1e-9);
    assert!((metrics.quality - quality).abs() < 1e-9);
    assert!((metrics.oee - availability * performance * quality).abs() < 1e-9);
}

#[test]
fn mtbf_and_mttr_for_shift() {
    let reliability = compute_reliability(&shift_with_one_stop());
    assert_eq!(reliability.mtbf_seconds, 8.0 * 3600.0);
    assert_eq!(reliability.mttr_seconds, 3600.0);
}

#[test]
fn perfect_quality_is_exactly_one() {
    let input = OeeInput {
        actual_quantity: 1000,
        planned_quantity: 1000,
        ..shift_with_one_stop()
    };
    assert_eq!(compute_oee(&input).quality, 1.0);
}

#[test]
fn no_incidents_yields_zero_mtbf_not_panic() {
    let input = OeeInput {
        incident_count: 0,
        resolved_count: 0,
        downtime_seconds: 0,
        ..shift_with_one_stop()
    };
    let reliability = compute_reliability(&input);
    assert_eq!(reliability.mtbf_seconds, 0.0);
    assert_eq!(reliability.mttr_seconds, 0.0);

    let metrics = compute_oee(&input);
    assert_eq!(metrics.availability, 1.0);
}

#[test]
fn report_trend_compares_against_previous_window() {
    let now = chrono::Utc::now();
    let from = now - chrono::Duration::hours(8);

    let good = shift_with_one_stop();
    let poor = OeeInput {
        downtime_seconds: 4 * 3600,
        production_seconds: 2 * 3600,
        actual_quantity: 400,
        ..shift_with_one_stop()
    };

    let improving = build_report(from, now, &good, &poor);
    assert_eq!(improving.trend, TrendDirection::Increasing);

    let declining = build_report(from, now, &poor, &good);
    assert_eq!(declining.trend, TrendDirection::Decreasing);

    let flat = build_report(from, now, &good, &good);
    assert_eq!(flat.trend, TrendDirection::Stable);
}

#[test]
fn trend_dead_band_is_ten_percent() {
    assert_eq!(trend(1.09, 1.0), TrendDirection::Stable);
    assert_eq!(trend(1.11, 1.0), TrendDirection::Increasing);
    assert_eq!(trend(0.91, 1.0), TrendDirection::Stable);
    assert_eq!(trend(0.89, 1.0), TrendDirection::Decreasing);
}

#[test]
fn report_serializes_flat_for_the_api() {
    let now = chrono::Utc::now();
    let report = build_report(
        now - chrono::Duration::hours(8),
        now,
        &shift_with_one_stop(),
        &OeeInput::default(),
    );
    let json = serde_json::to_value(&report).unwrap();

    assert!(json["availability"].is_number());
    assert!(json["oee"].is_number());
    assert!(json["mtbf_seconds"].is_number());
    assert_eq!(json["incident_count"], 1);
    assert_eq!(json["trend"], "increasing");
}
