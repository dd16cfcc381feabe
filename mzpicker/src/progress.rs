use std::iter::Sum;
use std::ops::{Add, AddAssign};


#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub files: usize,
    pub points: usize,
    pub peaks_detected: usize,
    pub peaks_filtered: usize,
    pub peaks_merged: usize,
    pub peaks_written: usize,
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.files += rhs.files;
        self.points += rhs.points;
        self.peaks_detected += rhs.peaks_detected;
        self.peaks_filtered += rhs.peaks_filtered;
        self.peaks_merged += rhs.peaks_merged;
        self.peaks_written += rhs.peaks_written;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ProgressRecord::default(), Add::add)
    }
}
