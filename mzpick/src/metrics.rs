/*! Per-peak quality scores computed from the raw signal.

Every score is rescaled onto `[0, 100]` across the batch of peaks it was computed for,
so values are relative to the current detection run, with 100 the most ideal peak.
*/
use crate::error::PickerError;
use crate::peak_set::PeakSet;
use crate::signal::{linear_regression_slope, peak_widths, rescale};

/// Replace `NaN` with the smallest non-`NaN` value of the batch and clamp
/// infinities to the largest finite magnitude, so an unbounded factor scores worst
fn fill_degenerate(values: &mut [f64]) {
    let fill = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .min_by(f64::total_cmp)
        .unwrap_or(0.0);
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = fill;
        }
        if *v == f64::INFINITY {
            *v = f64::MAX;
        } else if *v == f64::NEG_INFINITY {
            *v = f64::MIN;
        }
    }
}

fn invert_and_rescale(values: &[f64]) -> Vec<f64> {
    let inverted: Vec<f64> = values.iter().map(|v| 1.0 - v.abs()).collect();
    rescale(&inverted, 0.0, 100.0)
}

/// The asymmetry and tailing scores of a batch of peaks
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShapeScores {
    pub asymmetry: Vec<f64>,
    pub tailing: Vec<f64>,
}

/// Compute the asymmetry and tailing factors for the peaks with apex indices `peak_idx`.
///
/// The asymmetry factor is the ratio of the right to the left distance from the apex
/// to the signal at 10% of the peak's height. The tailing factor uses the distances
/// at 5% of the height, `(left + right) / (2 * left)`. Degenerate peaks whose factor
/// is undefined take the smallest factor of the batch, while an infinite factor is
/// clamped to the largest finite value and scores lowest. Both factors are scored
/// as `1 - |factor|` and rescaled onto `[0, 100]`.
pub fn compute_asymmetricity_and_tailing(y: &[f64], peak_idx: &[usize]) -> ShapeScores {
    if peak_idx.is_empty() {
        return ShapeScores::default();
    }
    let widths_5 = peak_widths(y, peak_idx, 0.05);
    let widths_10 = peak_widths(y, peak_idx, 0.1);

    let mut afs: Vec<f64> = peak_idx
        .iter()
        .enumerate()
        .map(|(i, idx)| {
            let apex = *idx as f64;
            let a = (apex - widths_10.left_ips[i]).abs();
            let b = (apex - widths_10.right_ips[i]).abs();
            b / a
        })
        .collect();
    fill_degenerate(&mut afs);

    let mut tfs: Vec<f64> = peak_idx
        .iter()
        .enumerate()
        .map(|(i, idx)| {
            let apex = *idx as f64;
            let a = (apex - widths_5.left_ips[i]).abs();
            let b = (apex - widths_5.right_ips[i]).abs();
            (a + b) / (2.0 * a)
        })
        .collect();
    fill_degenerate(&mut tfs);

    ShapeScores {
        asymmetry: invert_and_rescale(&afs),
        tailing: invert_and_rescale(&tfs),
    }
}

/// Compute a score from the ratio of each peak's left and right slopes.
///
/// The left slope is the regression of `y` on `x` from `idx_left` to the apex, the
/// right slope from the apex to `idx_right`, both inclusive. The ratio is scored as
/// `1 - |left / right|` and rescaled onto `[0, 100]`, so peaks whose flanks mirror
/// each other score highest.
///
/// A peak whose regression window spans fewer than two distinct `x` values, or
/// whose right slope is zero, yields [`PickerError::DegenerateSlope`].
pub fn compute_slopes(x: &[f64], y: &[f64], peaks: &PeakSet) -> Result<Vec<f64>, PickerError> {
    let n = x.len().min(y.len());
    let mut ratios = Vec::with_capacity(peaks.len());
    for peak in peaks {
        if peak.idx_right >= n || peak.idx_left > peak.idx || peak.idx > peak.idx_right {
            return Err(PickerError::IndexOutOfBounds {
                index: peak.idx_right.max(peak.idx),
                length: n,
            });
        }
        let left = peak.idx_left..peak.idx + 1;
        let right = peak.idx..peak.idx_right + 1;
        let left_slope = linear_regression_slope(&x[left.clone()], &y[left]).ok_or(
            PickerError::DegenerateSlope {
                idx: peak.idx,
                side: "left",
            },
        )?;
        let right_slope = match linear_regression_slope(&x[right.clone()], &y[right]) {
            Some(s) if s != 0.0 => s,
            _ => {
                return Err(PickerError::DegenerateSlope {
                    idx: peak.idx,
                    side: "right",
                })
            }
        };
        ratios.push(left_slope / right_slope);
    }
    Ok(invert_and_rescale(&ratios))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peak::Peak;

    fn triangle_signal() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let mut y = vec![0.0; 30];
        // symmetric peak at 5
        for (i, v) in [1.0, 2.0, 3.0, 2.0, 1.0].iter().enumerate() {
            y[3 + i] = *v;
        }
        // skewed peak at 15
        for (i, v) in [1.0, 4.0, 3.0, 2.5, 2.0, 1.5, 1.0, 0.5].iter().enumerate() {
            y[14 + i] = *v;
        }
        (x, y)
    }

    #[test]
    fn test_asymmetry_ranks_symmetric_first() {
        let (_, y) = triangle_signal();
        let scores = compute_asymmetricity_and_tailing(&y, &[5, 15]);
        assert_eq!(scores.asymmetry.len(), 2);
        assert_eq!(scores.asymmetry[0], 100.0);
        assert_eq!(scores.asymmetry[1], 0.0);
        assert!(scores.tailing.iter().all(|s| (0.0..=100.0).contains(s)));
        assert_eq!(scores.tailing[0], 100.0);
    }

    #[test]
    fn test_asymmetry_empty() {
        let scores = compute_asymmetricity_and_tailing(&[1.0, 2.0], &[]);
        assert!(scores.asymmetry.is_empty());
    }

    #[test]
    fn test_fill_degenerate() {
        let mut factors = [f64::INFINITY, f64::NAN, 1.2, 0.9];
        fill_degenerate(&mut factors);
        assert_eq!(factors, [f64::MAX, 0.9, 1.2, 0.9]);

        let scores = invert_and_rescale(&factors);
        assert_eq!(scores[0], 0.0);
        assert_eq!(scores[1], 100.0);
        assert!(scores.iter().all(|s| s.is_finite()));

        let mut factors = [f64::NAN, f64::NAN];
        fill_degenerate(&mut factors);
        assert_eq!(factors, [0.0, 0.0]);
    }

    #[test]
    fn test_asymmetry_zero_prominence() {
        // The peak at 0 has no prominence so both of its factors are undefined
        let y = [5.0, 3.0, 1.0, 0.0, 0.0, 2.0, 4.0, 2.0, 0.0];
        let scores = compute_asymmetricity_and_tailing(&y, &[0, 6]);
        assert!(scores
            .asymmetry
            .iter()
            .chain(scores.tailing.iter())
            .all(|s| s.is_finite() && (0.0..=100.0).contains(s)));
        assert_eq!(scores.asymmetry[0], scores.asymmetry[1]);
        assert_eq!(scores.tailing[0], scores.tailing[1]);
    }

    #[test]
    fn test_slopes() -> Result<(), PickerError> {
        let (x, y) = triangle_signal();
        let peaks = PeakSet::new(vec![
            Peak::new(5.0, 3.0, 5, 3.0, 7.0, 3, 7),
            Peak::new(15.0, 4.0, 15, 14.0, 21.0, 14, 21),
        ]);
        let scores = compute_slopes(&x, &y, &peaks)?;
        assert_eq!(scores, vec![100.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_slopes_degenerate() {
        let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y = [0.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let peaks = PeakSet::new(vec![Peak::new(2.0, 2.0, 2, 0.0, 5.0, 0, 5)]);
        assert!(matches!(
            compute_slopes(&x, &y, &peaks),
            Err(PickerError::DegenerateSlope { side: "right", .. })
        ));

        let peaks = PeakSet::new(vec![Peak::new(2.0, 2.0, 2, 2.0, 5.0, 2, 5)]);
        assert!(matches!(
            compute_slopes(&x, &y, &peaks),
            Err(PickerError::DegenerateSlope { side: "left", .. })
        ));
    }
}
