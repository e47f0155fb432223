// clickwatch/src/features/stats.rs
//
// Small numeric helpers shared by the extractor. Inputs named `sorted` must be
// ascending; none of these allocate.

pub fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Middle element, or the average of the two middle elements for even counts.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Population standard deviation (denominator n).
pub fn population_std(vals: &[f64], mean: f64) -> f64 {
    if vals.len() < 2 {
        return 0.0;
    }
    let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vals.len() as f64;
    var.sqrt()
}

/// Linear-interpolated percentile at rank `pct/100 * (n-1)`.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = rank - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}

/// Interquartile range; 0 below four samples.
pub fn iqr(sorted: &[f64]) -> f64 {
    if sorted.len() < 4 {
        return 0.0;
    }
    (percentile(sorted, 75.0) - percentile(sorted, 25.0)).max(0.0)
}

/// Wrap an angle difference into (-180, 180].
pub fn normalize_angle(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    if r > 180.0 {
        r - 360.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[50.0, 50.0, 950.0, 950.0]), 500.0);
        assert_eq!(median(&[1.0, 2.0, 9.0]), 2.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_population_std_uses_n() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&v);
        assert!((m - 5.0).abs() < EPS);
        assert!((population_std(&v, m) - 2.0).abs() < EPS);
        assert_eq!(population_std(&[42.0], 42.0), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [10.0, 20.0, 30.0, 40.0];
        // rank 0.75 → 10 + 0.75 * 10
        assert!((percentile(&v, 25.0) - 17.5).abs() < EPS);
        // rank 2.25 → 30 + 0.25 * 10
        assert!((percentile(&v, 75.0) - 32.5).abs() < EPS);
        assert!((iqr(&v) - 15.0).abs() < EPS);
    }

    #[test]
    fn test_iqr_needs_four_samples() {
        assert_eq!(iqr(&[1.0, 100.0, 1000.0]), 0.0);
        assert!((iqr(&[50.0, 50.0, 950.0, 950.0]) - 900.0).abs() < EPS);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(350.0) - (-10.0)).abs() < EPS);
        assert!((normalize_angle(-350.0) - 10.0).abs() < EPS);
        assert!((normalize_angle(180.0) - 180.0).abs() < EPS);
        assert!((normalize_angle(-180.0) - 180.0).abs() < EPS);
        assert!((normalize_angle(721.0) - 1.0).abs() < EPS);
    }
}
