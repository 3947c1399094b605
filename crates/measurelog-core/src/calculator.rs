//! Pure error-metric math.
//!
//! Both the absolute and the relative error are rounded to two decimals when
//! they are computed, so every consumer (overlay text, log rows, statistics)
//! sees exactly the same numbers.

use crate::models::{ErrorMetrics, Measurement2DErrors};

/// Round half away from zero to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Absolute and relative error of `measured` against `expected`.
///
/// The relative error is reported as 0 when `expected == 0`.
pub fn calculate_error(expected: f64, measured: f64) -> ErrorMetrics {
    let absolute_error = (expected - measured).abs();
    let relative_error = if expected != 0.0 {
        absolute_error / expected * 100.0
    } else {
        0.0
    };
    ErrorMetrics {
        absolute_error: round2(absolute_error),
        relative_error: round2(relative_error),
    }
}

pub fn calculate_2d_error(
    expected_length: f64,
    measured_length: f64,
    expected_width: f64,
    measured_width: f64,
) -> Measurement2DErrors {
    let length = calculate_error(expected_length, measured_length);
    let width = calculate_error(expected_width, measured_width);
    let area = calculate_error(
        expected_length * expected_width,
        measured_length * measured_width,
    );

    // Area stays out of the mean.
    let mean_relative_error = (length.relative_error + width.relative_error) / 2.0;

    Measurement2DErrors {
        length,
        width,
        area,
        mean_relative_error: round2(mean_relative_error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_scalar_error() {
        let errors = calculate_error(50.0, 45.0);
        assert_close(errors.absolute_error, 5.0);
        assert_close(errors.relative_error, 10.0);
    }

    #[test]
    fn test_zero_expected_has_zero_relative_error() {
        let errors = calculate_error(0.0, 5.0);
        assert_close(errors.absolute_error, 5.0);
        assert_eq!(errors.relative_error, 0.0);

        for measured in [-3.0, 0.0, 1e6] {
            assert_eq!(calculate_error(0.0, measured).relative_error, 0.0);
        }
    }

    #[test]
    fn test_relative_error_is_rounded() {
        // 1/3 * 100 = 33.333..
        let errors = calculate_error(3.0, 2.0);
        assert_close(errors.relative_error, 33.33);
        // 2/3 * 100 = 66.666..
        let errors = calculate_error(3.0, 1.0);
        assert_close(errors.relative_error, 66.67);
        assert_close(calculate_error(7.0, 7.123456).absolute_error, 0.12);
    }

    #[test]
    fn test_matches_rounding_formula() {
        let pairs = [(12.5, 11.0), (145.0, 130.0), (80.0, 75.0), (0.3, 0.31), (999.0, 1.0)];
        for (expected, measured) in pairs {
            let errors = calculate_error(expected, measured);
            let abs = (expected - measured).abs();
            assert_close(errors.absolute_error, round2(abs));
            assert_close(errors.relative_error, round2(abs / expected * 100.0));
        }
    }

    #[test]
    fn test_negative_inputs_are_plain_scalars() {
        let errors = calculate_error(-10.0, -12.0);
        assert_close(errors.absolute_error, 2.0);
        // Negative expected gives a negative percentage, no validation applied.
        assert_close(errors.relative_error, -20.0);
    }

    #[test]
    fn test_2d_error_scenario() {
        let errors = calculate_2d_error(50.0, 45.0, 50.0, 48.0);
        assert_close(errors.length.relative_error, 10.0);
        assert_close(errors.width.relative_error, 4.0);
        assert_close(errors.mean_relative_error, 7.0);
        assert_close(errors.area.absolute_error, 340.0);
        assert_close(errors.area.relative_error, 13.6);
    }

    #[test]
    fn test_mean_excludes_area() {
        let errors = calculate_2d_error(145.0, 130.0, 80.0, 75.0);
        let expected_mean = round2((errors.length.relative_error + errors.width.relative_error) / 2.0);
        assert_close(errors.mean_relative_error, expected_mean);

        let with_area = round2(
            (errors.length.relative_error + errors.width.relative_error + errors.area.relative_error)
                / 3.0,
        );
        assert!((errors.mean_relative_error - with_area).abs() > 1.0);
    }

    #[test]
    fn test_mean_uses_rounded_components() {
        // 1/3 -> 33.33, 1/6 -> 16.67; mean of rounded values is 25.0
        let errors = calculate_2d_error(3.0, 2.0, 6.0, 5.0);
        assert_close(errors.length.relative_error, 33.33);
        assert_close(errors.width.relative_error, 16.67);
        assert_close(errors.mean_relative_error, 25.0);
    }

    #[test]
    fn test_deterministic() {
        let a = calculate_2d_error(12.3, 11.9, 4.56, 4.6);
        let b = calculate_2d_error(12.3, 11.9, 4.56, 4.6);
        assert_eq!(a, b);
    }
}
