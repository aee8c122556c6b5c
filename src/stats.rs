// src/stats.rs

/// Incremental weighted mean: folds one new value into a running average
/// without touching historical records. `prior_count` is the number of
/// values already folded in; the result is the average over
/// `prior_count + 1` values, rounded to 2 decimal places.
///
/// This is deliberately not re-derivable by replay: no per-record snapshot
/// of the running count is kept anywhere.
pub fn incremental_average(prior_average: f64, prior_count: i64, new_value: f64) -> f64 {
    let count_after = prior_count + 1;
    round2(((prior_average * prior_count as f64) + new_value) / count_after as f64)
}

/// Round half away from zero to 2 decimal places, matching the
/// `Math.round(x * 100) / 100` the aggregates were defined with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
