/*! An ordered, re-indexable collection of [`Peak`]s with tolerance-based search */
use std::fmt::{self, Display};
use std::ops::Index;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PickerError;
use crate::peak::{Peak, PeakAttribute};
use crate::signal::ppm_error;
use crate::sort::attribute_cmp;

/// The width of the sweep window used by [`PeakSet::get_nearest_peak`]
const NEAREST_PEAK_SWEEP_TOLERANCE: f64 = 1.0;

/// The direction a [`PeakSet`] is sorted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub const fn is_reversed(&self) -> bool {
        matches!(self, Self::Descending)
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => f.write_str("ascending"),
            SortOrder::Descending => f.write_str("descending"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ascending" | "asc" => Ok(Self::Ascending),
            "descending" | "desc" => Ok(Self::Descending),
            _ => Err(PickerError::UnknownAttribute(s.to_string())),
        }
    }
}

impl From<bool> for SortOrder {
    fn from(reverse: bool) -> Self {
        if reverse {
            Self::Descending
        } else {
            Self::Ascending
        }
    }
}

/// A sequence of [`Peak`]s, ordered by an attribute (by default `x` ascending),
/// providing search and retrieval of individual peaks or whole intervals of the x axis.
///
/// Every time the set is re-indexed, each peak's `peak_id` is set to its position.
#[derive(Debug, Clone, Default)]
pub struct PeakSet {
    peaks: Vec<Peak>,
    indexed: bool,
    index_key: PeakAttribute,
    index_order: SortOrder,
}

impl PeakSet {
    /// Create a new set, sorted by `x` ascending
    pub fn new(peaks: Vec<Peak>) -> Self {
        let mut inst = Self {
            peaks,
            indexed: false,
            index_key: PeakAttribute::X,
            index_order: SortOrder::Ascending,
        };
        inst.reindex();
        inst
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Peak> {
        self.peaks.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Peak> {
        self.peaks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Peak> {
        self.peaks.get_mut(index)
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    /// Whether the peaks are still in the order of the last re-index
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn index_key(&self) -> PeakAttribute {
        self.index_key
    }

    pub fn index_order(&self) -> SortOrder {
        self.index_order
    }

    /// Append `peaks` to the set, optionally re-indexing afterwards
    pub fn add(&mut self, peaks: impl IntoIterator<Item = Peak>, reindex: bool) {
        self.peaks.extend(peaks);
        self.indexed = false;
        if reindex {
            self.reindex();
        }
    }

    /// Remove the peaks at `indices`, optionally re-indexing afterwards.
    ///
    /// Duplicate indices are ignored. Fails without removing anything if any
    /// index is out of bounds.
    pub fn remove(&mut self, indices: &[usize], reindex: bool) -> Result<(), PickerError> {
        let n = self.peaks.len();
        if let Some(bad) = indices.iter().find(|i| **i >= n) {
            return Err(PickerError::IndexOutOfBounds {
                index: *bad,
                length: n,
            });
        }
        let mut drop = vec![false; n];
        for i in indices {
            drop[*i] = true;
        }
        let mut it = drop.into_iter();
        self.peaks.retain(|_| !it.next().unwrap_or(false));
        self.indexed = false;
        if reindex {
            self.reindex();
        }
        Ok(())
    }

    /// Re-sort the peaks by the active key and order and renumber their `peak_id`
    pub fn reindex(&mut self) {
        self.sort_transient(self.index_key, self.index_order);
    }

    /// Re-sort the peaks by `key` in `order`, making them the active key and order
    pub fn reindex_by(&mut self, key: PeakAttribute, order: SortOrder) {
        self.index_key = key;
        self.index_order = order;
        self.reindex();
    }

    /// Re-sort the peaks by `key` in `order` without changing the active key and order
    pub(crate) fn sort_transient(&mut self, key: PeakAttribute, order: SortOrder) {
        if order.is_reversed() {
            self.peaks
                .sort_by(|a, b| attribute_cmp(&b.get(key), &a.get(key)));
        } else {
            self.peaks
                .sort_by(|a, b| attribute_cmp(&a.get(key), &b.get(key)));
        }
        for (i, peak) in self.peaks.iter_mut().enumerate() {
            peak.peak_id = i;
        }
        self.indexed = key == self.index_key && order == self.index_order;
    }

    fn is_sorted_by_x(&self) -> bool {
        self.indexed && self.index_key == PeakAttribute::X && self.index_order == SortOrder::Ascending
    }

    fn ensure_indexed(&mut self) {
        if !self.indexed {
            self.reindex();
        }
    }

    /// Search for the most intense peak within `tolerance` relative error of `x`.
    ///
    /// A tolerance of `1e-5` corresponds to 10 ppm. Returns `None` when no peak
    /// is close enough.
    pub fn has_peak(&self, x: f64, tolerance: f64) -> Option<&Peak> {
        if self.peaks.is_empty() {
            return None;
        }
        if !self.is_sorted_by_x() {
            return self.sweep_solution(x, 0, self.peaks.len(), tolerance);
        }
        self.binary_search(x, 0, self.peaks.len(), tolerance)
    }

    fn sweep_solution(&self, x: f64, lo: usize, hi: usize, tolerance: f64) -> Option<&Peak> {
        let mut best_index = None;
        let mut best_error = f64::INFINITY;
        let mut best_intensity = 0.0;
        for (i, peak) in self.peaks[lo..hi].iter().enumerate() {
            let abs_error = ppm_error(x, peak.x).abs();
            if abs_error < tolerance && abs_error < best_error * 1.1 && peak.y > best_intensity {
                best_index = Some(lo + i);
                best_error = abs_error;
                best_intensity = peak.y;
            }
        }
        best_index.map(|i| &self.peaks[i])
    }

    fn binary_search(&self, x: f64, mut lo: usize, mut hi: usize, tolerance: f64) -> Option<&Peak> {
        loop {
            if hi - lo < 5 {
                return self.sweep_solution(x, lo, hi, tolerance);
            }
            let mid = (hi + lo) / 2;
            let target = self.peaks[mid].x;
            if ppm_error(x, target).abs() <= tolerance {
                let start = mid.saturating_sub(5).max(lo);
                let end = (mid + 5).min(hi);
                return self.sweep_solution(x, start, end, tolerance);
            } else if target > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }
    }

    /// Find the peak whose `x` is closest to `x`, and the absolute distance to it
    pub fn get_nearest_peak(&self, x: f64) -> Option<(&Peak, f64)> {
        if self.peaks.is_empty() {
            return None;
        }
        let sweep = |lo: usize, hi: usize| {
            let mut best_error = f64::INFINITY;
            let mut best_index = lo;
            for i in lo..hi {
                let err = (self.peaks[i].x - x).abs();
                if err < best_error {
                    best_error = err;
                    best_index = i;
                }
            }
            (&self.peaks[best_index], best_error)
        };
        if !self.is_sorted_by_x() {
            return Some(sweep(0, self.peaks.len()));
        }
        let mut lo = 0;
        let mut hi = self.peaks.len();
        loop {
            if hi - lo < 5 {
                return Some(sweep(lo, hi));
            }
            let mid = (hi + lo) / 2;
            let v = self.peaks[mid].x;
            if (v - x).abs() < NEAREST_PEAK_SWEEP_TOLERANCE {
                return Some(sweep(lo, hi));
            } else if v > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }
    }

    fn get_peak_indices(&self, m1: f64, m2: f64) -> Option<(usize, usize)> {
        let (p1, _) = self.get_nearest_peak(m1)?;
        let (p2, _) = self.get_nearest_peak(m2)?;
        let mut start = p1.peak_id;
        let mut end = p2.peak_id;
        let n = self.len();
        if p1.x < m1 && start + 1 < n {
            start += 1;
        }
        if p2.x > m2 && end > 0 {
            end -= 1;
        }
        if start > end || self.peaks[start].x < m1 || self.peaks[end].x > m2 {
            None
        } else {
            Some((start, end))
        }
    }

    /// A new set holding copies of the peaks whose `x` lies between `m1` and `m2`
    pub fn between(&mut self, m1: f64, m2: f64) -> PeakSet {
        self.ensure_indexed();
        if !self.is_sorted_by_x() {
            let peaks = self
                .peaks
                .iter()
                .filter(|p| m1 <= p.x && p.x <= m2)
                .cloned()
                .collect();
            return PeakSet::new(peaks);
        }
        match self.get_peak_indices(m1, m2) {
            Some((start, end)) => PeakSet::new(self.peaks[start..=end].to_vec()),
            None => PeakSet::default(),
        }
    }

    /// All peaks within `error_tolerance` relative error of `x`
    pub fn all_peaks_for(&mut self, x: f64, error_tolerance: f64) -> &[Peak] {
        self.ensure_indexed();
        let m1 = x - (x * error_tolerance);
        let m2 = x + (x * error_tolerance);
        if !self.is_sorted_by_x() {
            self.reindex_by(PeakAttribute::X, SortOrder::Ascending);
        }
        match self.get_peak_indices(m1, m2) {
            Some((start, end)) => &self.peaks[start..=end],
            None => &[],
        }
    }

    /// A new set holding copies of the peaks at `indices`, sorted by `x` ascending
    pub fn select(&self, indices: &[usize]) -> Result<PeakSet, PickerError> {
        let n = self.len();
        let peaks = indices
            .iter()
            .map(|i| {
                self.peaks
                    .get(*i)
                    .cloned()
                    .ok_or(PickerError::IndexOutOfBounds { index: *i, length: n })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PeakSet::new(peaks))
    }

    /// Whether an equal peak is present in this set
    pub fn contains(&self, peak: &Peak) -> bool {
        self.peaks.iter().any(|p| p == peak)
    }

    /// Add the peaks of `other` that are not already present, then re-index
    pub fn extend_unique(&mut self, other: PeakSet) {
        for peak in other.peaks {
            if !self.contains(&peak) {
                self.peaks.push(peak);
            }
        }
        self.reindex();
    }

    pub fn into_inner(self) -> Vec<Peak> {
        self.peaks
    }
}

impl PartialEq for PeakSet {
    fn eq(&self, other: &Self) -> bool {
        self.peaks == other.peaks
    }
}

impl Display for PeakSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<PeakSet {} Peaks>", self.len())
    }
}

impl Index<usize> for PeakSet {
    type Output = Peak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl FromIterator<Peak> for PeakSet {
    fn from_iter<T: IntoIterator<Item = Peak>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for PeakSet {
    type Item = Peak;
    type IntoIter = std::vec::IntoIter<Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.into_iter()
    }
}

impl<'a> IntoIterator for &'a PeakSet {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_peak(x: f64, y: f64) -> Peak {
        Peak::new(x, y, 0, x - 0.1, x + 0.1, 0, 0)
    }

    fn make_set() -> PeakSet {
        [500.0, 100.0, 300.0, 200.0, 400.0, 100.0005, 600.0, 700.0]
            .iter()
            .enumerate()
            .map(|(i, x)| make_peak(*x, (i + 1) as f64 * 10.0))
            .collect()
    }

    #[test]
    fn test_reindex() {
        let mut peaks = make_set();
        let xs: Vec<f64> = peaks.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![100.0, 100.0005, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0]);
        for (i, p) in peaks.iter().enumerate() {
            assert_eq!(p.peak_id, i);
        }

        peaks.reindex_by(PeakAttribute::Y, SortOrder::Descending);
        let ys: Vec<f64> = peaks.iter().map(|p| p.y).collect();
        assert!(ys.windows(2).all(|w| w[0] >= w[1]));
        let ids: Vec<usize> = peaks.iter().map(|p| p.peak_id).collect();
        peaks.reindex();
        let ids_again: Vec<usize> = peaks.iter().map(|p| p.peak_id).collect();
        assert_eq!(ids, ids_again);
        assert_eq!(peaks[0].x, 700.0);
    }

    #[test]
    fn test_add_remove() -> Result<(), PickerError> {
        let mut peaks = make_set();
        peaks.add([make_peak(50.0, 1.0)], false);
        assert!(!peaks.is_indexed());
        assert_eq!(peaks[peaks.len() - 1].x, 50.0);
        peaks.reindex();
        assert_eq!(peaks[0].x, 50.0);

        peaks.remove(&[0, 1, 1], true)?;
        assert_eq!(peaks.len(), 7);
        assert_eq!(peaks[0].x, 100.0005);
        assert!(peaks.remove(&[20], false).is_err());
        assert_eq!(peaks.len(), 7);
        Ok(())
    }

    #[test]
    fn test_has_peak() {
        let peaks = make_set();
        let hit = peaks.has_peak(300.001, 1e-5).unwrap();
        assert_eq!(hit.x, 300.0);
        assert!(peaks.has_peak(300.01, 1e-5).is_none());

        // Both peaks are in range, the more intense one is preferred
        let hit = peaks.has_peak(100.0003, 1e-5).unwrap();
        assert_eq!(hit.x, 100.0005);

        assert!(PeakSet::default().has_peak(100.0, 1e-5).is_none());
    }

    #[test]
    fn test_has_peak_unsorted() {
        let mut peaks = make_set();
        peaks.reindex_by(PeakAttribute::Y, SortOrder::Ascending);
        let hit = peaks.has_peak(600.0, 1e-5).unwrap();
        assert_eq!(hit.x, 600.0);
    }

    #[test]
    fn test_nearest_and_between() {
        let mut peaks = make_set();
        let (p, err) = peaks.get_nearest_peak(410.0).unwrap();
        assert_eq!(p.x, 400.0);
        assert!((err - 10.0).abs() < 1e-9);

        let sub = peaks.between(150.0, 450.0);
        let xs: Vec<f64> = sub.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![200.0, 300.0, 400.0]);

        let sub = peaks.between(200.0, 400.0);
        assert_eq!(sub.len(), 3);

        let sub = peaks.between(310.0, 320.0);
        assert!(sub.is_empty());

        let found = peaks.all_peaks_for(100.0, 1e-5);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_between_outside_range() {
        let mut peaks: PeakSet = [100.0, 400.0, 700.0]
            .iter()
            .map(|x| make_peak(*x, *x))
            .collect();
        assert!(peaks.between(800.0, 900.0).is_empty());
        assert!(peaks.between(10.0, 20.0).is_empty());
        assert!(peaks.all_peaks_for(50.0, 1e-5).is_empty());
        assert!(peaks.all_peaks_for(750.0, 1e-5).is_empty());

        let sub = peaks.between(650.0, 900.0);
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].x, 700.0);
        assert_eq!(peaks.all_peaks_for(100.0, 1e-5).len(), 1);

        // Unsorted sets answer the same queries by filtering
        peaks.reindex_by(PeakAttribute::Y, SortOrder::Descending);
        assert!(peaks.between(800.0, 900.0).is_empty());
        assert!(peaks.between(10.0, 20.0).is_empty());
    }

    #[test]
    fn test_select_contains_extend() -> Result<(), PickerError> {
        let mut peaks = make_set();
        let sub = peaks.select(&[7, 0])?;
        assert_eq!(sub[0].x, 100.0);
        assert_eq!(sub[1].peak_id, 1);
        assert!(peaks.contains(&sub[1]));
        assert!(peaks.select(&[9]).is_err());

        let other: PeakSet = vec![make_peak(100.0, 1.0), make_peak(800.0, 1.0)]
            .into_iter()
            .collect();
        peaks.extend_unique(other);
        assert_eq!(peaks.len(), 9);
        assert_eq!(peaks[8].x, 800.0);
        assert_eq!(peaks, peaks.clone());
        Ok(())
    }

    #[test]
    fn test_sort_order_parse() -> Result<(), PickerError> {
        assert_eq!("descending".parse::<SortOrder>()?, SortOrder::Descending);
        assert_eq!("Ascending".parse::<SortOrder>()?, SortOrder::Ascending);
        assert!("sideways".parse::<SortOrder>().is_err());
        Ok(())
    }
}
