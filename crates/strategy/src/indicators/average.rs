//! Moving averages and dispersion shared by the indicators.

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Population standard deviation of the last `period` values.
///
/// Deviations are taken relative to the first value of the tail, so a run of
/// identical values gives exactly 0 regardless of how the mean rounds.
pub fn std_dev(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    let pivot = tail[0];
    let n = period as f64;
    let mean_offset = tail.iter().map(|v| v - pivot).sum::<f64>() / n;
    let variance = tail
        .iter()
        .map(|v| (v - pivot - mean_offset).powi(2))
        .sum::<f64>()
        / n;
    Some(variance.sqrt())
}

/// Exponential moving average series.
///
/// The first element is the SMA of `values[..period]` (aligned with
/// `values[period - 1]`); each following element applies the smoothing factor
/// `2 / (period + 1)`. The result has `values.len() - period + 1` elements,
/// or is empty when there are fewer than `period` values.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out.push(ema);
    for &value in &values[period..] {
        ema += k * (value - ema);
        out.push(ema);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_the_tail() {
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(sma(&[1.0], 2), None);
        assert_eq!(sma(&[1.0], 0), None);
    }

    #[test]
    fn std_dev_is_population() {
        // mean 5, squared deviations sum to 32 over 8 values
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = std_dev(&values, 8).unwrap();
        assert!((sd - 2.0).abs() < 1e-12, "got {sd}");
    }

    #[test]
    fn std_dev_of_identical_values_is_zero() {
        // the mean of twenty 0.13s rounds to 0.12999999999999995
        assert_eq!(std_dev(&[0.13; 20], 20), Some(0.0));
        assert_eq!(std_dev(&[45_000.37; 34], 20), Some(0.0));
    }

    #[test]
    fn ema_series_seeds_with_sma() {
        let series = ema_series(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(series.len(), 3);
        assert!((series[0] - 2.0).abs() < 1e-12);
        // k = 0.5
        assert!((series[1] - 3.0).abs() < 1e-12);
        assert!((series[2] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn ema_of_constant_is_exact() {
        let series = ema_series(&[100.0; 40], 12);
        assert!(series.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn ema_series_empty_when_short() {
        assert!(ema_series(&[1.0, 2.0], 3).is_empty());
    }
}
