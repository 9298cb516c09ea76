//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value between a minimum and a maximum.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance from a to b
/// accounting for wrapping between 0 and 2pi.
pub fn ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        -c
    } else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Normalise an angle into the range [0, 2pi).
pub fn wrap_to_2pi<T>(angle: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();
    rem_euclid(angle, tau_t)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ang_dist_2pi() {
        const TAU: f64 = std::f64::consts::TAU;

        assert_eq!(ang_dist_2pi(1f64, 2f64), 1f64);
        assert_eq!(ang_dist_2pi(2f64, 1f64), -1f64);
        assert_eq!(ang_dist_2pi(0f64, TAU), 0f64);
        assert_eq!(ang_dist_2pi(TAU, 0f64), 0f64);
        assert_eq!(ang_dist_2pi(1f64, TAU), -1f64);
        assert_eq!(ang_dist_2pi(0f64, TAU - 1f64), -1f64);
        assert_eq!(ang_dist_2pi(TAU - 1f64, 1f64), 2f64);
    }

    #[test]
    fn test_wrap_to_2pi() {
        const TAU: f64 = std::f64::consts::TAU;
        const EPSILON: f64 = 1e-9;

        assert!((wrap_to_2pi(0f64) - 0f64).abs() < EPSILON);
        assert!((wrap_to_2pi(TAU) - 0f64).abs() < EPSILON);
        assert!((wrap_to_2pi(-1f64) - (TAU - 1f64)).abs() < EPSILON);
        assert!((wrap_to_2pi(TAU + 1f64) - 1f64).abs() < EPSILON);
        assert!((wrap_to_2pi(-3.0 * TAU - 1f64) - (TAU - 1f64)).abs() < EPSILON);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&0.5f64, &0f64, &1f64), 0.5);
        assert_eq!(clamp(&-0.5f64, &0f64, &1f64), 0.0);
        assert_eq!(clamp(&1.5f64, &0f64, &1f64), 1.0);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 1f64), (0f64, 10f64), 0.5), 5.0);
        assert_eq!(lin_map((-1f64, 1f64), (0f64, 1f64), 0.0), 0.5);
    }
}
