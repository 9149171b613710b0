//! # Time-Series Analysis
//!
//! Property-centric algorithms over the time-stamped samples of Form
//! elements: z-score anomalies, least-squares trends, linear forecasts,
//! summary statistics and cross-element Pearson correlation.
//!
//! A property is analyzed only when it holds at least three samples and
//! every sample coerces to a number. Anything else is skipped for that
//! property alone.

use crate::config::AnalysisConfig;
use crate::primitives::{MIN_SERIES_SAMPLES, STABLE_SLOPE, STRONG_CORRELATION};
use crate::types::{FormElement, FormId, format_timestamp};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Per form element, per property.
pub type PropertyTable<T> = BTreeMap<FormId, BTreeMap<String, T>>;

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Full time-series analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeriesReport {
    pub anomalies: PropertyTable<Vec<Anomaly>>,
    pub trends: PropertyTable<Trend>,
    pub forecasts: PropertyTable<Vec<f64>>,
    pub statistics: PropertyTable<SeriesStatistics>,
    pub correlations: Vec<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub index: usize,
    /// Absent when the element has fewer timestamps than samples.
    pub timestamp: Option<String>,
    pub value: Value,
    pub property: String,
    pub z_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub rate_of_change_percent: f64,
}

/// Population statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStatistics {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    /// `form_id.property`
    pub property1: String,
    pub property2: String,
    pub correlation: f64,
    pub strength: CorrelationStrength,
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Run every time-series analysis over a set of Form elements.
#[must_use]
pub fn analyze_timeseries(
    form_elements: &BTreeMap<FormId, FormElement>,
    config: &AnalysisConfig,
) -> TimeSeriesReport {
    TimeSeriesReport {
        anomalies: detect_anomalies(form_elements, config.anomaly_threshold),
        trends: compute_trends(form_elements),
        forecasts: forecast_values(form_elements, config.forecast_horizon),
        statistics: compute_statistics(form_elements),
        correlations: identify_property_correlations(form_elements, config.correlation_threshold),
    }
}

/// Analyzable properties of one element, in name order.
fn numeric_properties(element: &FormElement) -> Vec<(&str, Vec<f64>)> {
    element
        .properties
        .properties()
        .filter(|(_, samples)| samples.len() >= MIN_SERIES_SAMPLES)
        .filter_map(|(name, _)| match element.properties.numeric_series(name) {
            Some(series) => Some((name, series)),
            None => {
                debug!(form = %element.id, property = name, "skipping non-numeric series");
                None
            }
        })
        .collect()
}

/// Apply `f` to every analyzable property; elements with no results are
/// left out.
fn per_property<T>(
    form_elements: &BTreeMap<FormId, FormElement>,
    mut f: impl FnMut(&FormElement, &str, &[f64]) -> Option<T>,
) -> PropertyTable<T> {
    let mut table = BTreeMap::new();
    for (id, element) in form_elements {
        let row: BTreeMap<String, T> = numeric_properties(element)
            .into_iter()
            .filter_map(|(name, series)| f(element, name, &series).map(|v| (name.to_string(), v)))
            .collect();
        if !row.is_empty() {
            table.insert(id.clone(), row);
        }
    }
    table
}

// =============================================================================
// ANOMALIES
// =============================================================================

/// Samples whose population z-score magnitude exceeds `threshold`.
#[must_use]
pub fn detect_anomalies(
    form_elements: &BTreeMap<FormId, FormElement>,
    threshold: f64,
) -> PropertyTable<Vec<Anomaly>> {
    per_property(form_elements, |element, name, series| {
        let found = anomalies_in(element, name, series, threshold);
        (!found.is_empty()).then_some(found)
    })
}

fn anomalies_in(element: &FormElement, name: &str, series: &[f64], threshold: f64) -> Vec<Anomaly> {
    // Rounding in the mean leaves a constant series with a tiny nonzero std.
    if series.windows(2).all(|w| w[0] == w[1]) {
        return Vec::new();
    }
    let (mean, variance) = mean_variance(series);
    let std = variance.sqrt();
    if std == 0.0 {
        return Vec::new();
    }
    let raw = element.properties.values(name).unwrap_or_default();
    series
        .iter()
        .enumerate()
        .filter_map(|(index, x)| {
            let z_score = (x - mean) / std;
            (z_score.abs() > threshold).then(|| Anomaly {
                index,
                timestamp: element.properties.timestamp_at(index).map(format_timestamp),
                value: raw.get(index).cloned().unwrap_or(Value::Null),
                property: name.to_string(),
                z_score,
            })
        })
        .collect()
}

// =============================================================================
// TRENDS & FORECASTS
// =============================================================================

/// Least-squares trend per property.
#[must_use]
pub fn compute_trends(form_elements: &BTreeMap<FormId, FormElement>) -> PropertyTable<Trend> {
    per_property(form_elements, |_, _, series| fit_trend(series))
}

/// `horizon` future steps on the fitted line per property.
#[must_use]
pub fn forecast_values(
    form_elements: &BTreeMap<FormId, FormElement>,
    horizon: usize,
) -> PropertyTable<Vec<f64>> {
    if horizon == 0 {
        return BTreeMap::new();
    }
    per_property(form_elements, |_, _, series| forecast(series, horizon))
}

/// OLS over `(index, value)`. `None` for fewer than two points.
#[must_use]
pub fn fit_trend(series: &[f64]) -> Option<Trend> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = series.iter().sum::<f64>() / nf;

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in series.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        return None;
    }
    let slope = num / den;

    let direction = if slope.abs() < STABLE_SLOPE {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Some(Trend {
        direction,
        slope,
        intercept: y_mean - slope * x_mean,
        rate_of_change_percent: if y_mean == 0.0 { 0.0 } else { slope / y_mean * 100.0 },
    })
}

/// Extrapolate the fitted line `horizon` steps past the last sample.
#[must_use]
pub fn forecast(series: &[f64], horizon: usize) -> Option<Vec<f64>> {
    if series.len() < MIN_SERIES_SAMPLES {
        return None;
    }
    let trend = fit_trend(series)?;
    let n = series.len();
    Some(
        (n..n + horizon)
            .map(|i| trend.slope * i as f64 + trend.intercept)
            .collect(),
    )
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Summary statistics per property.
#[must_use]
pub fn compute_statistics(
    form_elements: &BTreeMap<FormId, FormElement>,
) -> PropertyTable<SeriesStatistics> {
    per_property(form_elements, |_, _, series| summarize(series))
}

#[must_use]
pub fn summarize(series: &[f64]) -> Option<SeriesStatistics> {
    if series.is_empty() {
        return None;
    }
    let (mean, variance) = mean_variance(series);
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let min = sorted[0];
    let max = sorted[n - 1];
    Some(SeriesStatistics {
        mean,
        median,
        std: variance.sqrt(),
        variance,
        min,
        max,
        range: max - min,
        count: n,
    })
}

fn mean_variance(series: &[f64]) -> (f64, f64) {
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

// =============================================================================
// CORRELATION
// =============================================================================

/// Pearson correlation between every pair of equal-length series across all
/// elements; pairs with `|r| > threshold`, strongest first.
#[must_use]
pub fn identify_property_correlations(
    form_elements: &BTreeMap<FormId, FormElement>,
    threshold: f64,
) -> Vec<Correlation> {
    let series: Vec<(String, Vec<f64>)> = form_elements
        .iter()
        .flat_map(|(id, element)| {
            numeric_properties(element)
                .into_iter()
                .map(move |(name, values)| (format!("{id}.{name}"), values))
        })
        .collect();

    let mut correlations = Vec::new();
    for (i, (label_a, a)) in series.iter().enumerate() {
        for (label_b, b) in &series[i + 1..] {
            if a.len() != b.len() {
                continue;
            }
            let r = pearson(a, b);
            if r.abs() > threshold {
                correlations.push(Correlation {
                    property1: label_a.clone(),
                    property2: label_b.clone(),
                    correlation: r,
                    strength: if r.abs() > STRONG_CORRELATION {
                        CorrelationStrength::Strong
                    } else {
                        CorrelationStrength::Moderate
                    },
                });
            }
        }
    }

    correlations.sort_by(|x, y| y.correlation.abs().total_cmp(&x.correlation.abs()));
    correlations
}

/// Pearson r; 0 when either series has zero variance or lengths differ.
#[must_use]
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 { 0.0 } else { cov / denom }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    fn element(id: &str, series: &[(&str, Vec<Value>)]) -> FormElement {
        let mut element = FormElement::new(id, "sensor");
        for (property, values) in series {
            for (i, v) in values.iter().enumerate() {
                element
                    .properties
                    .add(t0() + Duration::hours(i as i64), property, v.clone());
            }
        }
        element
    }

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| json!(v)).collect()
    }

    fn elements(list: Vec<FormElement>) -> BTreeMap<FormId, FormElement> {
        list.into_iter().map(|e| (e.id.clone(), e)).collect()
    }

    #[test]
    fn constant_series_has_no_anomalies() {
        let forms = elements(vec![element("s", &[("temp", nums(&[7.0; 6]))])]);
        for threshold in [0.0, 0.5, 2.0, 10.0] {
            assert!(detect_anomalies(&forms, threshold).is_empty());
        }
    }

    #[test]
    fn spike_is_flagged_with_timestamp() {
        let mut values = vec![10.0; 9];
        values.push(50.0);
        let forms = elements(vec![element("s", &[("temp", nums(&values))])]);
        let anomalies = detect_anomalies(&forms, 2.0);
        let found = &anomalies[&FormId::from("s")]["temp"];
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 9);
        assert!(close(found[0].z_score, 3.0));
        assert_eq!(found[0].value, json!(50.0));
        assert_eq!(found[0].timestamp.as_deref(), Some("2024-01-01T09:00:00"));
    }

    #[test]
    fn non_numeric_property_is_skipped_alone() {
        let forms = elements(vec![element(
            "s",
            &[
                ("status", vec![json!("ok"), json!("ok"), json!("fault")]),
                ("load", vec![json!("1"), json!(2), json!(true)]),
            ],
        )]);
        let stats = compute_statistics(&forms);
        let row = &stats[&FormId::from("s")];
        assert!(row.contains_key("load"));
        assert!(!row.contains_key("status"));
    }

    #[test]
    fn short_series_are_ignored() {
        let forms = elements(vec![element("s", &[("temp", nums(&[1.0, 2.0]))])]);
        assert!(compute_trends(&forms).is_empty());
        assert!(forecast_values(&forms, 5).is_empty());
    }

    #[test]
    fn trend_and_forecast_follow_the_fitted_line() {
        let forms = elements(vec![element("s", &[("level", nums(&[1.0, 2.0, 3.0, 4.0]))])]);
        let trend = &compute_trends(&forms)[&FormId::from("s")]["level"];
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!(close(trend.slope, 1.0));
        assert!(close(trend.intercept, 1.0));
        assert!(close(trend.rate_of_change_percent, 40.0));

        let forecast = &forecast_values(&forms, 2)[&FormId::from("s")]["level"];
        assert_eq!(forecast.len(), 2);
        assert!(close(forecast[0], 5.0));
        assert!(close(forecast[1], 6.0));
    }

    #[test]
    fn flat_slope_is_stable() {
        let trend = fit_trend(&[5.0, 5.001, 5.0, 5.002]).expect("trend");
        assert_eq!(trend.direction, TrendDirection::Stable);
        let trend = fit_trend(&[0.0, -1.0, -2.0]).expect("trend");
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!(close(trend.rate_of_change_percent, 100.0));
    }

    #[test]
    fn statistics_are_population_based() {
        let stats = summarize(&[4.0, 1.0, 3.0, 2.0]).expect("stats");
        assert!(close(stats.mean, 2.5));
        assert!(close(stats.median, 2.5));
        assert!(close(stats.variance, 1.25));
        assert!(close(stats.range, 3.0));
        assert_eq!(stats.count, 4);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn correlations_pair_equal_length_series_across_elements() {
        let forms = elements(vec![
            element("a", &[("temp", nums(&[1.0, 2.0, 3.0, 4.0]))]),
            element("b", &[("pressure", nums(&[2.0, 4.1, 5.9, 8.0]))]),
            element("c", &[("noise", nums(&[1.0, 3.0, 2.0]))]),
            element("d", &[("flat", nums(&[3.0, 3.0, 3.0, 3.0]))]),
        ]);
        let found = identify_property_correlations(&forms, 0.7);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].property1, "a.temp");
        assert_eq!(found[0].property2, "b.pressure");
        assert_eq!(found[0].strength, CorrelationStrength::Strong);
    }

    #[test]
    fn pearson_handles_degenerate_input() {
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0));
        assert!(close(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0));
        assert!(close(pearson(&[1.0, 2.0], &[1.0]), 0.0));
    }
}
