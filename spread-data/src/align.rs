//! Timestamp inner-join of two OHLC series.
//!
//! The feed returns bars in ascending time order, which [`align`] relies on for its output
//! ordering. Unordered or duplicated input is tolerated: it is re-sorted (keeping the last bar
//! seen for a duplicated timestamp) before joining, so the output is always strictly ascending.

use crate::model::{AlignedPoint, OhlcBar, TimestampMs};
use fnv::FnvHashMap;
use itertools::Itertools;
use std::borrow::Cow;
use tracing::warn;

/// Join `left` and `right` on timestamp equality.
///
/// Only timestamps present in both series survive, and bars with a non-numeric close on either
/// side are excluded. An empty intersection yields an empty `Vec`, which is a valid "no data"
/// result rather than an error.
pub fn align(left: &[OhlcBar], right: &[OhlcBar]) -> Vec<AlignedPoint> {
    let left = normalise(left, "left");
    let right = normalise(right, "right");

    let lookup = right
        .iter()
        .filter(|bar| bar.has_numeric_close())
        .map(|bar| (bar.timestamp, bar))
        .collect::<FnvHashMap<TimestampMs, &OhlcBar>>();

    left.iter()
        .filter(|bar| bar.has_numeric_close())
        .filter_map(|bar| {
            lookup.get(&bar.timestamp).map(|other| AlignedPoint {
                timestamp: bar.timestamp,
                left: *bar,
                right: **other,
            })
        })
        .collect()
}

/// Check that timestamps are strictly ascending.
pub fn is_strictly_ascending(bars: &[OhlcBar]) -> bool {
    bars.iter()
        .tuple_windows()
        .all(|(prev, next)| prev.timestamp < next.timestamp)
}

fn normalise<'a>(bars: &'a [OhlcBar], side: &'static str) -> Cow<'a, [OhlcBar]> {
    if is_strictly_ascending(bars) {
        return Cow::Borrowed(bars);
    }

    warn!(
        side,
        len = bars.len(),
        "OHLC series not strictly ascending, re-sorting before alignment"
    );

    // Stable sort keeps arrival order within a timestamp, so the last arrival wins the dedup
    let mut sorted = bars.to_vec();
    sorted.sort_by_key(|bar| bar.timestamp);
    let deduped = sorted
        .into_iter()
        .rev()
        .unique_by(|bar| bar.timestamp)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>();

    Cow::Owned(deduped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(points: &[(i64, f64)]) -> Vec<OhlcBar> {
        points
            .iter()
            .map(|&(timestamp, close)| OhlcBar::flat(timestamp, close))
            .collect()
    }

    fn timestamps(aligned: &[AlignedPoint]) -> Vec<i64> {
        aligned.iter().map(|point| point.timestamp).collect()
    }

    #[test]
    fn test_align() {
        struct TestCase {
            left: Vec<OhlcBar>,
            right: Vec<OhlcBar>,
            expected: Vec<i64>,
        }

        let tests = vec![
            TestCase {
                // TC0: identical timestamps
                left: bars(&[(1000, 100.0), (2000, 110.0)]),
                right: bars(&[(1000, 95.0), (2000, 100.0)]),
                expected: vec![1000, 2000],
            },
            TestCase {
                // TC1: partial overlap keeps only the intersection
                left: bars(&[(1000, 1.0), (2000, 1.0), (3000, 1.0), (4000, 1.0)]),
                right: bars(&[(2000, 1.0), (4000, 1.0), (5000, 1.0)]),
                expected: vec![2000, 4000],
            },
            TestCase {
                // TC2: disjoint series yields empty
                left: bars(&[(1000, 1.0)]),
                right: bars(&[(2000, 1.0)]),
                expected: vec![],
            },
            TestCase {
                // TC3: empty input yields empty
                left: vec![],
                right: bars(&[(2000, 1.0)]),
                expected: vec![],
            },
            TestCase {
                // TC4: non-numeric close on either side is excluded
                left: bars(&[(1000, f64::NAN), (2000, 1.0), (3000, 1.0)]),
                right: bars(&[(1000, 1.0), (2000, 1.0), (3000, f64::INFINITY)]),
                expected: vec![2000],
            },
            TestCase {
                // TC5: unordered & duplicated input is sorted and deduplicated
                left: bars(&[(3000, 1.0), (1000, 1.0), (2000, 1.0), (1000, 2.0)]),
                right: bars(&[(2000, 1.0), (1000, 1.0), (3000, 1.0)]),
                expected: vec![1000, 2000, 3000],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = align(&test.left, &test.right);
            assert_eq!(timestamps(&actual), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_align_pairs_matching_bars() {
        let left = bars(&[(1000, 100.0), (2000, 110.0)]);
        let right = bars(&[(2000, 100.0), (1000, 95.0)]);

        let aligned = align(&left, &right);

        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].left.close, 100.0);
        assert_eq!(aligned[0].right.close, 95.0);
        assert_eq!(aligned[1].left.close, 110.0);
        assert_eq!(aligned[1].right.close, 100.0);
    }

    #[test]
    fn test_align_duplicate_keeps_last_arrival() {
        let left = bars(&[(1000, 1.0), (1000, 2.0)]);
        let right = bars(&[(1000, 5.0)]);

        let aligned = align(&left, &right);

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].left.close, 2.0);
    }

    #[test]
    fn test_align_output_is_intersection_for_generated_series() {
        // Deterministic pseudo-random timestamps on a 1s grid
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..50 {
            let left = (0..40)
                .filter(|_| next() % 2 == 0)
                .map(|i| OhlcBar::flat(i * 1000, 1.0 + i as f64))
                .collect::<Vec<_>>();
            let right = (0..40)
                .filter(|_| next() % 3 != 0)
                .map(|i| OhlcBar::flat(i * 1000, 2.0 + i as f64))
                .collect::<Vec<_>>();

            let expected = left
                .iter()
                .map(|bar| bar.timestamp)
                .filter(|timestamp| right.iter().any(|bar| bar.timestamp == *timestamp))
                .collect::<Vec<_>>();

            let actual = timestamps(&align(&left, &right));
            assert_eq!(actual, expected);
            assert!(actual.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
