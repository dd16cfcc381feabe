/*! Low level one dimensional signal primitives shared by the peak detectors and the
peak quality metrics.

All functions operate on plain slices and index positions into them.
*/

use itertools::{Itertools, MinMaxResult};

/// The slack added to merge tolerances to absorb floating point round-off
pub const GROUPING_EPSILON: f64 = 1e-4;

/// The relative error between an observed value `x` and a reference value `y`.
///
/// Multiply by `1e6` to get parts-per-million.
#[inline]
pub fn ppm_error(x: f64, y: f64) -> f64 {
    (x - y) / y
}

/// The index of the first occurrence of the largest value in `values`
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// The local maxima of a signal, including the extent of flat tops
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LocalMaxima {
    /// The midpoint of each maximum, rounded down for even length plateaus
    pub peaks: Vec<usize>,
    pub left_edges: Vec<usize>,
    pub right_edges: Vec<usize>,
}

/// Find every local maximum in `x` by simple comparison of neighboring values.
///
/// A maximum is a sample (or a run of equal samples) strictly greater than
/// the samples on either side. The first and last samples are never maxima.
pub fn local_maxima_1d(x: &[f64]) -> LocalMaxima {
    let mut result = LocalMaxima::default();
    let n = x.len();
    if n < 3 {
        return result;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                result.left_edges.push(i);
                result.right_edges.push(i_ahead - 1);
                result.peaks.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    result
}

/// The prominence of each peak and the bases it is measured against
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Prominences {
    pub prominences: Vec<f64>,
    pub left_bases: Vec<usize>,
    pub right_bases: Vec<usize>,
}

/// Compute how far each peak in `peaks` stands out from the surrounding signal.
///
/// The search for each base extends over the whole signal, stopping only where
/// the signal rises above the peak.
pub fn peak_prominences(x: &[f64], peaks: &[usize]) -> Prominences {
    let mut out = Prominences {
        prominences: Vec::with_capacity(peaks.len()),
        left_bases: Vec::with_capacity(peaks.len()),
        right_bases: Vec::with_capacity(peaks.len()),
    };
    let n = x.len();
    for &peak in peaks {
        let apex = x[peak];

        let mut left_min = apex;
        let mut left_base = peak;
        let mut i = peak as isize;
        while i >= 0 && x[i as usize] <= apex {
            if x[i as usize] < left_min {
                left_min = x[i as usize];
                left_base = i as usize;
            }
            i -= 1;
        }

        let mut right_min = apex;
        let mut right_base = peak;
        let mut i = peak;
        while i < n && x[i] <= apex {
            if x[i] < right_min {
                right_min = x[i];
                right_base = i;
            }
            i += 1;
        }

        let prominence = apex - left_min.max(right_min);
        if prominence == 0.0 {
            tracing::trace!("Peak at {peak} has a prominence of 0");
        }
        out.prominences.push(prominence);
        out.left_bases.push(left_base);
        out.right_bases.push(right_base);
    }
    out
}

/// The width of each peak measured at a relative height, with the interpolated
/// crossing positions in fractional index units
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PeakWidths {
    pub widths: Vec<f64>,
    pub width_heights: Vec<f64>,
    pub left_ips: Vec<f64>,
    pub right_ips: Vec<f64>,
}

/// Measure the width of each peak at `rel_height` of its prominence, using
/// precomputed prominence data.
pub fn peak_widths_with(
    x: &[f64],
    peaks: &[usize],
    rel_height: f64,
    prominence_data: &Prominences,
) -> PeakWidths {
    let mut out = PeakWidths {
        widths: Vec::with_capacity(peaks.len()),
        width_heights: Vec::with_capacity(peaks.len()),
        left_ips: Vec::with_capacity(peaks.len()),
        right_ips: Vec::with_capacity(peaks.len()),
    };
    for (p, &peak) in peaks.iter().enumerate() {
        let i_min = prominence_data.left_bases[p];
        let i_max = prominence_data.right_bases[p];
        let height = x[peak] - prominence_data.prominences[p] * rel_height;

        let mut i = peak;
        while i_min < i && height < x[i] {
            i -= 1;
        }
        let mut left_ip = i as f64;
        if x[i] < height {
            left_ip += (height - x[i]) / (x[i + 1] - x[i]);
        }

        let mut i = peak;
        while i < i_max && height < x[i] {
            i += 1;
        }
        let mut right_ip = i as f64;
        if x[i] < height {
            right_ip -= (height - x[i]) / (x[i - 1] - x[i]);
        }

        out.widths.push(right_ip - left_ip);
        out.width_heights.push(height);
        out.left_ips.push(left_ip);
        out.right_ips.push(right_ip);
    }
    out
}

/// Measure the width of each peak at `rel_height` of its prominence.
///
/// A `rel_height` of `0.5` gives the full width at half maximum, `1.0`
/// the width at the lowest contour line.
pub fn peak_widths(x: &[f64], peaks: &[usize], rel_height: f64) -> PeakWidths {
    let prominence_data = peak_prominences(x, peaks);
    peak_widths_with(x, peaks, rel_height, &prominence_data)
}

/// Given `peaks` in ascending order and their `priority`, keep the highest
/// priority peaks such that no two kept peaks are closer than `distance` samples.
pub fn select_by_peak_distance(peaks: &[usize], priority: &[f64], distance: f64) -> Vec<bool> {
    let n = peaks.len();
    let mut keep = vec![true; n];
    let distance = distance.ceil();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| priority[*a].total_cmp(&priority[*b]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j as isize - 1;
        while k >= 0 && ((peaks[j] - peaks[k as usize]) as f64) < distance {
            keep[k as usize] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < n && ((peaks[k] - peaks[j]) as f64) < distance {
            keep[k] = false;
            k += 1;
        }
    }
    keep
}

/// Conditions a local maximum must satisfy to be reported by [`find_peaks`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakConditions {
    /// The minimum apex height
    pub height: Option<f64>,
    /// The minimum number of samples between neighboring peaks
    pub distance: Option<f64>,
    pub prominence: Option<f64>,
    /// The minimum width in samples, measured at `rel_height`
    pub width: Option<f64>,
    pub rel_height: f64,
}

impl Default for PeakConditions {
    fn default() -> Self {
        Self {
            height: None,
            distance: None,
            prominence: None,
            width: None,
            rel_height: 0.5,
        }
    }
}

/// The peaks found by [`find_peaks`] and the properties computed along the way.
/// All vectors are parallel to `peaks`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FoundPeaks {
    pub peaks: Vec<usize>,
    pub peak_heights: Vec<f64>,
    pub prominences: Prominences,
    pub widths: PeakWidths,
}

impl FoundPeaks {
    /// Keep only the peaks whose entry in `mask` is true
    pub fn retain_mask(&mut self, mask: &[bool]) {
        fn apply<T: Copy>(values: &mut Vec<T>, mask: &[bool]) {
            if values.is_empty() {
                return;
            }
            let mut it = mask.iter();
            values.retain(|_| *it.next().unwrap_or(&false));
        }
        apply(&mut self.peaks, mask);
        apply(&mut self.peak_heights, mask);
        apply(&mut self.prominences.prominences, mask);
        apply(&mut self.prominences.left_bases, mask);
        apply(&mut self.prominences.right_bases, mask);
        apply(&mut self.widths.widths, mask);
        apply(&mut self.widths.width_heights, mask);
        apply(&mut self.widths.left_ips, mask);
        apply(&mut self.widths.right_ips, mask);
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// Find local maxima in `x` and filter them by height, distance, prominence and width,
/// in that order.
///
/// Prominences and widths are always computed so that callers can derive peak
/// boundaries from them.
pub fn find_peaks(x: &[f64], conditions: &PeakConditions) -> FoundPeaks {
    let maxima = local_maxima_1d(x);
    let mut found = FoundPeaks {
        peak_heights: maxima.peaks.iter().map(|i| x[*i]).collect(),
        peaks: maxima.peaks,
        ..Default::default()
    };

    if let Some(hmin) = conditions.height {
        let mask: Vec<bool> = found.peak_heights.iter().map(|h| *h >= hmin).collect();
        found.retain_mask(&mask);
    }

    if let Some(distance) = conditions.distance {
        let mask = select_by_peak_distance(&found.peaks, &found.peak_heights, distance);
        found.retain_mask(&mask);
    }

    found.prominences = peak_prominences(x, &found.peaks);
    if let Some(pmin) = conditions.prominence {
        let mask: Vec<bool> = found.prominences.prominences.iter().map(|p| *p >= pmin).collect();
        found.retain_mask(&mask);
    }

    found.widths = peak_widths_with(x, &found.peaks, conditions.rel_height, &found.prominences);
    if let Some(wmin) = conditions.width {
        let mask: Vec<bool> = found.widths.widths.iter().map(|w| *w >= wmin).collect();
        found.retain_mask(&mask);
    }

    tracing::trace!("Found {} peaks in signal of length {}", found.len(), x.len());
    found
}

/// Find peak indices by looking for sign changes in the first derivative of `y`.
///
/// `threshold` is relative to the signal's range unless `threshold_abs` is set,
/// in which case it is an absolute height. Flat tops are resolved to their
/// middle sample. When `min_dist > 1`, smaller peaks within `min_dist` samples of
/// a larger peak are dropped.
pub fn derivative_peak_indices(y: &[f64], threshold: f64, min_dist: usize, threshold_abs: bool) -> Vec<usize> {
    let n = y.len();
    if n < 2 {
        return Vec::new();
    }
    let threshold = if threshold_abs {
        threshold
    } else {
        match y.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::MinMax(lo, hi) => threshold * (hi - lo) + lo,
            MinMaxResult::OneElement(v) => v,
            MinMaxResult::NoElements => return Vec::new(),
        }
    };

    let mut dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
    let zeros: Vec<usize> = dy.iter().positions(|d| *d == 0.0).collect();
    if zeros.len() == dy.len() {
        return Vec::new();
    }

    if !zeros.is_empty() {
        let mut plateaus: Vec<Vec<usize>> = Vec::new();
        for z in zeros {
            match plateaus.last_mut() {
                Some(last) if last.last().is_some_and(|p| *p + 1 == z) => last.push(z),
                _ => plateaus.push(vec![z]),
            }
        }

        let mut plateaus = plateaus.as_slice();
        if let Some((first, rest)) = plateaus.split_first() {
            if first[0] == 0 {
                let fill = dy[first[first.len() - 1] + 1];
                for i in first {
                    dy[*i] = fill;
                }
                plateaus = rest;
            }
        }
        if let Some((last, rest)) = plateaus.split_last() {
            if last[last.len() - 1] == dy.len() - 1 {
                let fill = dy[last[0] - 1];
                for i in last {
                    dy[*i] = fill;
                }
                plateaus = rest;
            }
        }
        for plateau in plateaus {
            let median = median_index(plateau);
            let before = dy[plateau[0] - 1];
            let after = dy[plateau[plateau.len() - 1] + 1];
            for i in plateau {
                dy[*i] = if (*i as f64) < median { before } else { after };
            }
        }
    }

    let mut peaks: Vec<usize> = (0..n)
        .filter(|i| {
            let falling = if *i < dy.len() { dy[*i] < 0.0 } else { false };
            let rising = if *i > 0 { dy[*i - 1] > 0.0 } else { false };
            falling && rising && y[*i] > threshold
        })
        .collect();

    if peaks.len() > 1 && min_dist > 1 {
        let mut highest = peaks.clone();
        highest.sort_by(|a, b| y[*a].total_cmp(&y[*b]));
        highest.reverse();
        let mut removed = vec![true; n];
        for p in peaks.iter() {
            removed[*p] = false;
        }
        for p in highest {
            if !removed[p] {
                let lo = p.saturating_sub(min_dist);
                let hi = (p + min_dist + 1).min(n);
                removed[lo..hi].iter_mut().for_each(|r| *r = true);
                removed[p] = false;
            }
        }
        peaks = (0..n).filter(|i| !removed[*i]).collect();
    }
    peaks
}

fn median_index(values: &[usize]) -> f64 {
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2] as f64
    } else {
        (values[n / 2 - 1] + values[n / 2]) as f64 / 2.0
    }
}

/// The least squares slope of `y` against `x`, or `None` when every `x` is identical
pub fn linear_regression_slope(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let xm = x[..n].iter().sum::<f64>() / n as f64;
    let ym = y[..n].iter().sum::<f64>() / n as f64;
    let (ssxm, ssxym) = x[..n]
        .iter()
        .zip(y[..n].iter())
        .fold((0.0, 0.0), |(sx, sxy), (xi, yi)| {
            let dx = xi - xm;
            (sx + dx * dx, sxy + dx * (yi - ym))
        });
    if ssxm == 0.0 {
        None
    } else {
        Some(ssxym / ssxm)
    }
}

/// Linearly map `values` onto `[new_min, new_max]` using their own minimum and maximum.
///
/// When every value is equal they are all mapped to `new_max`.
pub fn rescale(values: &[f64], new_min: f64, new_max: f64) -> Vec<f64> {
    match values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => Vec::new(),
        MinMaxResult::OneElement(_) => vec![new_max],
        MinMaxResult::MinMax(old_min, old_max) => {
            let span = old_max - old_min;
            if span == 0.0 {
                return vec![new_max; values.len()];
            }
            values
                .iter()
                .map(|v| ((v - old_min) / span) * (new_max - new_min) + new_min)
                .collect()
        }
    }
}

/// Group the positions of a descending-sorted array whose values lie within
/// `tolerance` of the first (largest) member of their group.
///
/// Only groups with at least two members are returned, in reverse order of discovery.
pub fn group_by(array: &[f64], tolerance: f64) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    let n = array.len();
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && array[i] - array[j] <= tolerance + GROUPING_EPSILON {
            j += 1;
        }
        if j - i > 1 {
            groups.push((i..j).collect::<Vec<_>>());
        }
        i = j;
    }
    groups.reverse();
    groups
}
