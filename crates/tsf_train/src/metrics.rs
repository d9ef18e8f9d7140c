//! Error metrics that skip missing values.
//!
//! Pairs where either value is not finite are ignored. An empty selection
//! yields NaN.

fn finite_pairs<'a>(real: &'a [f32], pred: &'a [f32]) -> impl Iterator<Item = (f32, f32)> + 'a {
    real.iter()
        .zip(pred)
        .filter(|(r, p)| r.is_finite() && p.is_finite())
        .map(|(&r, &p)| (r, p))
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, n) = values.fold((0.0f64, 0usize), |(s, n), v| (s + f64::from(v), n + 1));
    if n == 0 {
        f32::NAN
    } else {
        (sum / n as f64) as f32
    }
}

/// Mean squared error.
#[must_use]
pub fn mse(real: &[f32], pred: &[f32]) -> f32 {
    mean(finite_pairs(real, pred).map(|(r, p)| (r - p) * (r - p)))
}

/// Root mean squared error.
#[must_use]
pub fn rmse(real: &[f32], pred: &[f32]) -> f32 {
    mse(real, pred).sqrt()
}

/// Mean absolute error.
#[must_use]
pub fn mae(real: &[f32], pred: &[f32]) -> f32 {
    mean(finite_pairs(real, pred).map(|(r, p)| (r - p).abs()))
}

/// Mean absolute percentage error, in percent.
///
/// Terms that are not finite, such as those with a zero real value, are
/// dropped.
#[must_use]
pub fn mape(real: &[f32], pred: &[f32]) -> f32 {
    mean(
        finite_pairs(real, pred)
            .map(|(r, p)| ((r - p) / r).abs() * 100.0)
            .filter(|v| v.is_finite()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let real = [1.0, 2.0, 4.0];
        let pred = [1.0, 3.0, 2.0];
        assert!((mse(&real, &pred) - 5.0 / 3.0).abs() < 1e-6);
        assert!((rmse(&real, &pred) - (5.0f32 / 3.0).sqrt()).abs() < 1e-6);
        assert!((mae(&real, &pred) - 1.0).abs() < 1e-6);
        assert!((mape(&real, &pred) - 100.0 / 3.0 * (0.5 + 0.5)).abs() < 1e-4);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let real = [1.0, f32::NAN, 2.0];
        let pred = [2.0, 5.0, f32::INFINITY];
        assert_eq!(mse(&real, &pred), 1.0);
        assert_eq!(mae(&real, &pred), 1.0);
    }

    #[test]
    fn test_mape_drops_zero_real() {
        let real = [0.0, 2.0];
        let pred = [1.0, 1.0];
        assert!((mape(&real, &pred) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_is_nan() {
        assert!(mse(&[], &[]).is_nan());
        assert!(mape(&[f32::NAN], &[1.0]).is_nan());
    }
}
