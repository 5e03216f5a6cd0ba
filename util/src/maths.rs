//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Convert an angle in radians to degrees.
pub fn rad_to_deg<T>(value: T) -> T
where
    T: Float
{
    value * T::from(180.0).unwrap() / T::from(std::f64::consts::PI).unwrap()
}

/// Mean of the absolute values of a series.
///
/// If the series is empty `None` is returned.
pub fn mean_abs<T>(series: &[T]) -> Option<T>
where
    T: Float + std::ops::AddAssign
{
    if series.is_empty() {
        return None;
    }

    let mut sum = T::zero();

    for v in series {
        sum += v.abs();
    }

    Some(sum / T::from(series.len()).unwrap())
}

/// Largest absolute value in a series.
///
/// If the series is empty `None` is returned. NaN values propagate.
pub fn max_abs<T>(series: &[T]) -> Option<T>
where
    T: Float
{
    let mut iter = series.iter();
    let mut max = iter.next()?.abs();

    for v in iter {
        if v.is_nan() {
            return Some(*v);
        }
        if v.abs() > max {
            max = v.abs();
        }
    }

    Some(max)
}

/// Element-wise difference `a - b` of two equal length series.
///
/// If the series do not have the same length then `None` is returned.
pub fn diff<T>(a: &[T], b: &[T]) -> Option<Vec<T>>
where
    T: Float
{
    if a.len() != b.len() {
        return None;
    }

    Some(a.iter().zip(b.iter()).map(|(x, y)| *x - *y).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rad_to_deg() {
        assert_abs_diff_eq!(rad_to_deg(std::f64::consts::PI), 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rad_to_deg(-std::f64::consts::FRAC_PI_2), -90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_max_abs() {
        let series = [1.0f64, -3.0, 2.0];

        assert_abs_diff_eq!(mean_abs(&series).unwrap(), 2.0);
        assert_eq!(max_abs(&series), Some(3.0));

        assert_eq!(mean_abs::<f64>(&[]), None);
        assert_eq!(max_abs::<f64>(&[]), None);
        assert!(max_abs(&[1.0, std::f64::NAN]).unwrap().is_nan());
    }

    #[test]
    fn test_diff() {
        assert_eq!(diff(&[3.0, 1.0], &[1.0, 1.0]), Some(vec![2.0, 0.0]));
        assert_eq!(diff(&[3.0], &[1.0, 1.0]), None);
    }
}
