//! Pure OEE computation.
//!
//! All ratios are clamped to [0, 1] so partial data can never produce
//! nonsensical figures, and every division by zero yields a defined zero
//! rather than an error.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregated window facts, gathered by the query layer
#[derive(Debug, Clone, Default)]
pub struct OeeInput {
    pub planned_time_seconds: i64,
    pub downtime_seconds: i64,
    pub production_seconds: i64,
    pub actual_quantity: i64,
    pub planned_quantity: i64,
    pub incident_count: i64,
    pub resolved_count: i64,
}

/// The three OEE factors and their product, as ratios in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OeeMetrics {
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub oee: f64,
}

/// Incident reliability figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReliabilityMetrics {
    pub mtbf_seconds: f64,
    pub mttr_seconds: f64,
    pub incident_count: i64,
    pub resolved_count: i64,
    pub total_downtime_seconds: i64,
}

/// Period-over-period movement with ±10% dead band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Full report returned by the analytics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct OeeReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: OeeMetrics,
    #[serde(flatten)]
    pub reliability: ReliabilityMetrics,
    pub actual_quantity: i64,
    pub planned_quantity: i64,
    pub trend: TrendDirection,
}

/// Divide with a defined zero for empty denominators
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn clamp_ratio(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Compute the three factors and their product
pub fn compute_oee(input: &OeeInput) -> OeeMetrics {
    let planned = input.planned_time_seconds as f64;
    let downtime = input.downtime_seconds as f64;
    let uptime = (planned - downtime).max(0.0);

    let availability = clamp_ratio(ratio(uptime, planned));
    let performance = clamp_ratio(ratio(input.production_seconds as f64, uptime));
    let quality = clamp_ratio(ratio(
        input.actual_quantity as f64,
        input.planned_quantity as f64,
    ));

    OeeMetrics {
        availability,
        performance,
        quality,
        oee: availability * performance * quality,
    }
}

/// MTBF over the window and MTTR over resolved incidents
pub fn compute_reliability(input: &OeeInput) -> ReliabilityMetrics {
    ReliabilityMetrics {
        mtbf_seconds: ratio(
            input.planned_time_seconds as f64,
            input.incident_count as f64,
        ),
        mttr_seconds: ratio(
            input.downtime_seconds as f64,
            input.resolved_count as f64,
        ),
        incident_count: input.incident_count,
        resolved_count: input.resolved_count,
        total_downtime_seconds: input.downtime_seconds,
    }
}

/// `increasing` above +10%, `decreasing` below -10%, `stable` between
pub fn trend(current: f64, previous: f64) -> TrendDirection {
    if current > previous * 1.1 {
        TrendDirection::Increasing
    } else if current < previous * 0.9 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

pub fn build_report(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    current: &OeeInput,
    previous: &OeeInput,
) -> OeeReport {
    let metrics = compute_oee(current);
    let previous_metrics = compute_oee(previous);

    OeeReport {
        window_start,
        window_end,
        metrics,
        reliability: compute_reliability(current),
        actual_quantity: current.actual_quantity,
        planned_quantity: current.planned_quantity,
        trend: trend(metrics.oee, previous_metrics.oee),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> OeeInput {
        OeeInput {
            planned_time_seconds: 3600,
            downtime_seconds: 600,
            production_seconds: 2700,
            actual_quantity: 90,
            planned_quantity: 100,
            incident_count: 2,
            resolved_count: 1,
        }
    }

    #[test]
    fn test_oee_is_product_of_factors() {
        let metrics = compute_oee(&input());

        let availability = 3000.0 / 3600.0;
        let performance = 2700.0 / 3000.0;
        let quality = 0.9;
        assert!((metrics.availability - availability).abs() < 1e-9);
        assert!((metrics.performance - performance).abs() < 1e-9);
        assert!((metrics.quality - quality).abs() < 1e-9);
        assert!((metrics.oee - availability * performance * quality).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_yields_zeros_not_errors() {
        let metrics = compute_oee(&OeeInput::default());
        assert_eq!(metrics.availability, 0.0);
        assert_eq!(metrics.performance, 0.0);
        assert_eq!(metrics.quality, 0.0);
        assert_eq!(metrics.oee, 0.0);

        let reliability = compute_reliability(&OeeInput::default());
        assert_eq!(reliability.mtbf_seconds, 0.0);
        assert_eq!(reliability.mttr_seconds, 0.0);
    }

    #[test]
    fn test_ratios_clamped_against_partial_data() {
        // More downtime than the window and more produced than planned:
        // partial data must clamp, not explode
        let skewed = OeeInput {
            planned_time_seconds: 3600,
            downtime_seconds: 7200,
            production_seconds: 9999,
            actual_quantity: 150,
            planned_quantity: 100,
            incident_count: 0,
            resolved_count: 0,
        };
        let metrics = compute_oee(&skewed);
        assert_eq!(metrics.availability, 0.0);
        assert_eq!(metrics.performance, 0.0);
        assert_eq!(metrics.quality, 1.0);
        assert_eq!(metrics.oee, 0.0);
    }

    #[test]
    fn test_reliability_divisions() {
        let reliability = compute_reliability(&input());
        assert_eq!(reliability.mtbf_seconds, 1800.0);
        assert_eq!(reliability.mttr_seconds, 600.0);
    }

    #[test]
    fn test_trend_bands() {
        assert_eq!(trend(1.2, 1.0), TrendDirection::Increasing);
        assert_eq!(trend(0.8, 1.0), TrendDirection::Decreasing);
        assert_eq!(trend(1.05, 1.0), TrendDirection::Stable);
        assert_eq!(trend(0.95, 1.0), TrendDirection::Stable);
        // Exactly at the band edges stays stable
        assert_eq!(trend(1.1, 1.0), TrendDirection::Stable);
        assert_eq!(trend(0.9, 1.0), TrendDirection::Stable);
    }

    #[test]
    fn test_trend_from_zero_baseline() {
        assert_eq!(trend(0.5, 0.0), TrendDirection::Increasing);
        assert_eq!(trend(0.0, 0.0), TrendDirection::Stable);
    }
}
