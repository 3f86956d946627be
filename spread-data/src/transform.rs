use crate::model::{AlignedPoint, DerivedPoint};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// How two aligned close prices are reduced to a single spread value.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpreadMode {
    /// `close_left - close_right`
    #[default]
    #[display("difference")]
    Difference,
    /// `ln(close_left) - ln(close_right)`, both closes must be strictly positive.
    #[display("log_ratio")]
    LogRatio,
    /// `(close_left - close_right) / close_right`, right close must be non-zero.
    #[display("relative")]
    Relative,
}

impl SpreadMode {
    pub const ALL: [SpreadMode; 3] = [
        SpreadMode::Difference,
        SpreadMode::LogRatio,
        SpreadMode::Relative,
    ];

    /// Compute the spread of two closes, or `None` if the pair is outside this mode's domain.
    pub fn spread(&self, left: f64, right: f64) -> Option<f64> {
        if !left.is_finite() || !right.is_finite() {
            return None;
        }

        let value = match self {
            SpreadMode::Difference => left - right,
            SpreadMode::LogRatio => {
                if left <= 0.0 || right <= 0.0 {
                    return None;
                }
                left.ln() - right.ln()
            }
            SpreadMode::Relative => {
                if right == 0.0 {
                    return None;
                }
                (left - right) / right
            }
        };

        value.is_finite().then_some(value)
    }

    pub fn next(&self) -> SpreadMode {
        match self {
            SpreadMode::Difference => SpreadMode::LogRatio,
            SpreadMode::LogRatio => SpreadMode::Relative,
            SpreadMode::Relative => SpreadMode::Difference,
        }
    }
}

/// Derive one spread point per aligned point that is inside `mode`'s domain.
///
/// Ordering is preserved and no output point has a null `y`.
pub fn transform(aligned: &[AlignedPoint], mode: SpreadMode) -> Vec<DerivedPoint> {
    aligned
        .iter()
        .filter_map(|point| {
            mode.spread(point.left.close, point.right.close)
                .map(|y| DerivedPoint::new(point.timestamp, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OhlcBar;

    fn aligned(points: &[(i64, f64, f64)]) -> Vec<AlignedPoint> {
        points
            .iter()
            .map(|&(timestamp, left, right)| AlignedPoint {
                timestamp,
                left: OhlcBar::flat(timestamp, left),
                right: OhlcBar::flat(timestamp, right),
            })
            .collect()
    }

    #[test]
    fn test_spread_mode_spread() {
        struct TestCase {
            mode: SpreadMode,
            left: f64,
            right: f64,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: difference
                mode: SpreadMode::Difference,
                left: 110.0,
                right: 100.0,
                expected: Some(10.0),
            },
            TestCase {
                // TC1: difference allows non-positive prices
                mode: SpreadMode::Difference,
                left: -1.0,
                right: 0.0,
                expected: Some(-1.0),
            },
            TestCase {
                // TC2: log ratio of equal prices is zero
                mode: SpreadMode::LogRatio,
                left: 42.0,
                right: 42.0,
                expected: Some(0.0),
            },
            TestCase {
                // TC3: log ratio excludes zero right close
                mode: SpreadMode::LogRatio,
                left: 42.0,
                right: 0.0,
                expected: None,
            },
            TestCase {
                // TC4: log ratio excludes negative left close
                mode: SpreadMode::LogRatio,
                left: -42.0,
                right: 1.0,
                expected: None,
            },
            TestCase {
                // TC5: relative
                mode: SpreadMode::Relative,
                left: 110.0,
                right: 100.0,
                expected: Some(0.1),
            },
            TestCase {
                // TC6: relative excludes zero denominator
                mode: SpreadMode::Relative,
                left: 110.0,
                right: 0.0,
                expected: None,
            },
            TestCase {
                // TC7: non-numeric closes are excluded in every mode
                mode: SpreadMode::Difference,
                left: f64::NAN,
                right: 1.0,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.mode.spread(test.left, test.right);
            match (actual, test.expected) {
                (Some(actual), Some(expected)) => {
                    assert!((actual - expected).abs() < 1e-12, "TC{} failed", index)
                }
                (None, None) => {}
                (actual, expected) => panic!(
                    "TC{index} failed because actual != expected. \nActual: {actual:?}\nExpected: {expected:?}\n"
                ),
            }
        }
    }

    #[test]
    fn test_transform_difference() {
        let input = aligned(&[(1000, 100.0, 95.0), (2000, 110.0, 100.0)]);

        let actual = transform(&input, SpreadMode::Difference);

        assert_eq!(
            actual,
            vec![DerivedPoint::new(1000, 5.0), DerivedPoint::new(2000, 10.0)]
        );
    }

    #[test]
    fn test_transform_log_ratio_matches_ln_of_ratio() {
        let input = aligned(&[(1000, 100.0, 95.0), (2000, 110.0, 0.0), (3000, 50.0, 200.0)]);

        let actual = transform(&input, SpreadMode::LogRatio);

        assert_eq!(actual.len(), 2);
        assert_eq!(actual[0].x, 1000);
        assert!((actual[0].y.unwrap() - (100.0_f64 / 95.0).ln()).abs() < 1e-12);
        assert_eq!(actual[1].x, 3000);
        assert!((actual[1].y.unwrap() - (0.25_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_empty() {
        assert!(transform(&[], SpreadMode::Relative).is_empty());
    }
}
