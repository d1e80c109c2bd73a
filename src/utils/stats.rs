//! Small descriptive statistics shared by the analytics passes.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1); needs at least two values.
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// `part / total` as a percentage; zero when there is no total.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn clamp_percentage(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdev_matches_sample_definition() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        let sd = sample_stdev(&values).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
        assert_eq!(sample_stdev(&[1.0]), None);
    }

    #[test]
    fn percentage_handles_empty_total() {
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(round2(33.33333), 33.33);
        assert_eq!(clamp_percentage(104.2), 100.0);
    }
}
