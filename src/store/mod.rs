//! Song, pattern, instrument and table storage
//!
//! - [`tracker`]: song rows, patterns and instruments of the tracker dialects
//! - [`modtable`]: volume/duty/pan/wave modulation tables
//!
//! Every growable container is a [`BoundedRows`]: an ordered sequence with a
//! fixed maximum length and at least one row.

pub mod modtable;
pub mod tracker;

pub use modtable::{ModTables, TableKind};
pub use tracker::{Instrument, InstrumentLine, Pattern, PatternLine, SongRow, TrackerSong};

use crate::{ChipError, Result};

/// What a [`BoundedRows`] holds, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsKind {
    /// Song order list
    Song,
    /// Instrument program
    Instrument,
    /// Modulation table
    Table,
}

impl RowsKind {
    fn full(self) -> ChipError {
        match self {
            RowsKind::Song => ChipError::SongFull,
            RowsKind::Instrument => ChipError::InstrumentFull,
            RowsKind::Table => ChipError::TableFull,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RowsKind::Song => "Song",
            RowsKind::Instrument => "Instrument",
            RowsKind::Table => "Table",
        }
    }
}

/// Ordered rows with a maximum length and a minimum length of one
///
/// Indices past the end are ignored by edits and read as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedRows<T> {
    rows: Vec<T>,
    capacity: usize,
    kind: RowsKind,
}

impl<T: Clone + Default> BoundedRows<T> {
    /// Create a container holding a single default row
    pub fn new(kind: RowsKind, capacity: usize) -> Self {
        Self::with_first(kind, capacity, T::default())
    }

    /// Create a container holding a single given row
    pub fn with_first(kind: RowsKind, capacity: usize, first: T) -> Self {
        Self {
            rows: vec![first],
            capacity: capacity.max(1),
            kind,
        }
    }

    /// Number of rows
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Never true; kept for API symmetry with slices
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Maximum number of rows
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Row at `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(index)
    }

    /// Mutable row at `index`
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.rows.get_mut(index)
    }

    /// All rows
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.rows
    }

    /// Insert a default row before `at` (clamped to the end).
    pub fn insert(&mut self, at: usize) -> Result<()> {
        self.insert_value(at, T::default())
    }

    /// Insert `value` before `at` (clamped to the end).
    pub fn insert_value(&mut self, at: usize, value: T) -> Result<()> {
        if self.rows.len() >= self.capacity {
            return Err(self.kind.full());
        }
        let at = at.min(self.rows.len());
        self.rows.insert(at, value);
        Ok(())
    }

    /// Append a default row.
    pub fn push(&mut self) -> Result<()> {
        self.push_value(T::default())
    }

    /// Append `value`.
    pub fn push_value(&mut self, value: T) -> Result<()> {
        if self.rows.len() >= self.capacity {
            return Err(self.kind.full());
        }
        self.rows.push(value);
        Ok(())
    }

    /// Delete the row at `at`; the last remaining row cannot be deleted.
    pub fn remove(&mut self, at: usize) -> Result<()> {
        if self.rows.len() <= 1 {
            return Err(ChipError::Empty(self.kind.label()));
        }
        if at < self.rows.len() {
            self.rows.remove(at);
        }
        Ok(())
    }

    /// Exchange two rows; out-of-range indices are ignored.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.rows.len() && b < self.rows.len() {
            self.rows.swap(a, b);
        }
    }

    /// Grow with default rows until `index` exists, up to the capacity.
    ///
    /// Returns the row when it fits.
    pub fn ensure(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.capacity {
            return None;
        }
        if index >= self.rows.len() {
            self.rows.resize(index + 1, T::default());
        }
        self.rows.get_mut(index)
    }

    /// Shrink to `len` rows (at least one).
    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len.max(1));
    }

    /// Reset to a single given row.
    pub fn reset(&mut self, first: T) {
        self.rows.clear();
        self.rows.push(first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_reports_kind() {
        let mut rows: BoundedRows<u8> = BoundedRows::new(RowsKind::Song, 2);
        rows.push().expect("second row fits");
        let err = rows.push().expect_err("third row must not fit");
        assert_eq!(err.to_string(), "Song is full.");

        let mut table: BoundedRows<u8> = BoundedRows::new(RowsKind::Table, 1);
        assert!(matches!(table.insert(0), Err(ChipError::TableFull)));
    }

    #[test]
    fn test_last_row_is_kept() {
        let mut rows: BoundedRows<u8> = BoundedRows::new(RowsKind::Instrument, 8);
        let err = rows.remove(0).expect_err("single row cannot go");
        assert_eq!(err.to_string(), "Instrument cannot be empty.");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_insert_shifts_rows() {
        let mut rows = BoundedRows::with_first(RowsKind::Table, 8, 1u8);
        rows.push_value(3).expect("fits");
        rows.insert_value(1, 2).expect("fits");
        rows.insert_value(99, 4).expect("clamped to end");
        assert_eq!(rows.as_slice(), &[1, 2, 3, 4]);
        rows.remove(0).expect("removable");
        rows.remove(42).expect("out of range is ignored");
        assert_eq!(rows.as_slice(), &[2, 3, 4]);
        rows.swap(0, 2);
        rows.swap(0, 9);
        assert_eq!(rows.as_slice(), &[4, 3, 2]);
    }

    #[test]
    fn test_ensure_grows_within_capacity() {
        let mut rows: BoundedRows<u8> = BoundedRows::new(RowsKind::Song, 4);
        *rows.ensure(2).expect("index 2 fits") = 7;
        assert_eq!(rows.as_slice(), &[0, 0, 7]);
        assert!(rows.ensure(4).is_none());
    }
}
