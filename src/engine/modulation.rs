//! Table-driven parameter modulation
//!
//! A [`TableBinding`] walks one modulation table (volume, duty or pan) at a
//! stretch cadence and holds at the last column.

/// Binding of one channel parameter to a modulation table
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableBinding {
    table: u8,
    stretch: u8,
    counter: u8,
    column: usize,
    fresh: bool,
}

impl TableBinding {
    /// Create an unbound binding
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `table` (1-15) holding each column for `stretch` ticks.
    ///
    /// Column 0 is current immediately; the caller applies its value.
    pub fn bind(&mut self, table: u8, stretch: u8) {
        self.table = table;
        self.stretch = stretch;
        self.counter = 0;
        self.column = 0;
        self.fresh = true;
    }

    /// Drop the binding; the parameter keeps its last value.
    pub fn unbind(&mut self) {
        self.table = 0;
        self.fresh = false;
    }

    /// Bound table index, 0 when unbound
    #[inline]
    pub fn table(&self) -> u8 {
        self.table
    }

    /// Whether a table drives the parameter
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.table != 0
    }

    /// Column currently applied
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Advance one tick over a table of `len` columns.
    ///
    /// Returns the new column when it changes. Each column is held for
    /// `max(stretch, 1)` ticks counting the tick it was applied on; the last
    /// column is held forever.
    pub fn advance(&mut self, len: usize) -> Option<usize> {
        if !self.is_bound() {
            return None;
        }
        if self.fresh {
            self.fresh = false;
            return None;
        }
        self.counter = self.counter.saturating_add(1);
        if self.counter < self.stretch.max(1) {
            return None;
        }
        self.counter = 0;
        if self.column + 1 < len {
            self.column += 1;
            Some(self.column)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretch_two_over_four_columns() {
        let table = [3u8, 6, 9, 12];
        let mut binding = TableBinding::new();
        binding.bind(1, 2);

        // Bind tick applies column 0, then one update per tick
        let mut value = table[binding.column()];
        let mut history = vec![value];
        assert_eq!(binding.advance(table.len()), None);
        for _ in 0..11 {
            if let Some(col) = binding.advance(table.len()) {
                value = table[col];
            }
            history.push(value);
        }
        assert_eq!(history, vec![3, 3, 6, 6, 9, 9, 12, 12, 12, 12, 12, 12]);
    }

    #[test]
    fn test_stretch_zero_behaves_like_one() {
        let mut binding = TableBinding::new();
        binding.bind(2, 0);
        assert_eq!(binding.advance(3), None);
        assert_eq!(binding.advance(3), Some(1));
        assert_eq!(binding.advance(3), Some(2));
        assert_eq!(binding.advance(3), None);
    }

    #[test]
    fn test_unbound_never_moves() {
        let mut binding = TableBinding::new();
        assert_eq!(binding.advance(8), None);
        binding.bind(1, 1);
        binding.unbind();
        assert_eq!(binding.advance(8), None);
        assert!(!binding.is_bound());
    }
}
