//! Sub-score normalization methods used by the ranker's composite step.

#[derive(Debug, Clone, Copy)]
pub enum NormalizationMethod {
    ZScore,
    MinMax,
    Log,
    Robust,
    Clip { min: f64, max: f64 },
    Exponential,
}

impl Default for NormalizationMethod {
    fn default() -> Self {
        NormalizationMethod::ZScore
    }
}

pub fn normalize(values: &[f64], method: NormalizationMethod) -> Vec<f64> {
    match method {
        NormalizationMethod::ZScore => z_score(values),
        NormalizationMethod::MinMax => min_max(values),
        NormalizationMethod::Log => log_transform(values),
        NormalizationMethod::Robust => robust(values),
        NormalizationMethod::Clip { min, max } => clip(values, min, max),
        NormalizationMethod::Exponential => exponential(values),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn z_score(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - m) / stddev).collect()
}

fn min_max(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min) == 0.0 {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

fn log_transform(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v + 1.0).ln()).collect()
}

fn robust(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let len = sorted.len();
    let median = sorted[len / 2];
    let q1 = sorted[len / 4];
    let q3 = sorted[3 * len / 4.max(1)];
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - median) / iqr).collect()
}

fn clip(values: &[f64], min: f64, max: f64) -> Vec<f64> {
    values.iter().map(|v| v.max(min).min(max)).collect()
}

fn exponential(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| 1.0 - (-v).exp()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_score_of_equal_values_is_zero_vector() {
        let result = z_score(&[5.0, 5.0, 5.0]);
        assert!(result.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn z_score_has_approx_zero_mean_and_unit_stddev() {
        let result = z_score(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let m = mean(&result);
        assert!(m.abs() < 1e-9);
    }

    #[test]
    fn min_max_of_equal_values_is_ones_vector() {
        let result = min_max(&[3.0, 3.0, 3.0]);
        assert!(result.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn min_max_scales_into_unit_range() {
        let result = min_max(&[0.0, 5.0, 10.0]);
        assert_eq!(result, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn log_transform_of_zero_is_zero() {
        assert_eq!(log_transform(&[0.0])[0], 0.0);
    }

    #[test]
    fn exponential_is_bounded_below_one() {
        let result = exponential(&[0.0, 1.0, 100.0]);
        assert!(result.iter().all(|v| *v < 1.0 && *v >= 0.0));
    }

    #[test]
    fn clip_bounds_values() {
        let result = clip(&[-5.0, 0.5, 5.0], 0.0, 1.0);
        assert_eq!(result, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(z_score(&[]).is_empty());
        assert!(min_max(&[]).is_empty());
        assert!(robust(&[]).is_empty());
    }
}
