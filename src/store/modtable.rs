//! Modulation tables of the band-limited dialect

use super::{BoundedRows, RowsKind};
use crate::{ChipError, Result};
use num_derive::FromPrimitive;

/// Tables per kind (table 0 means "unbound")
pub const TABLE_COUNT: usize = 16;
/// Maximum columns of a volume, duty or pan table
pub const MAX_TABLE_COLUMNS: usize = 256;
/// Fixed length of a wave table
pub const WAVE_LEN: usize = 32;

/// Kind of modulation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum TableKind {
    /// Volume, high nibble of the channel volume
    Volume = 0,
    /// Pulse duty, also the noise register length
    Duty = 1,
    /// Stereo position, 8 is centre
    Pan = 2,
    /// Custom 32-step waveform
    Wave = 3,
}

impl TableKind {
    /// All kinds in display order
    pub const ALL: [TableKind; 4] = [
        TableKind::Volume,
        TableKind::Duty,
        TableKind::Pan,
        TableKind::Wave,
    ];

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Volume => "VOLUME",
            TableKind::Duty => "DUTY",
            TableKind::Pan => "PAN",
            TableKind::Wave => "WAVE",
        }
    }
}

/// Volume, duty, pan and wave tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModTables {
    /// Volume tables
    pub volume: Vec<BoundedRows<u8>>,
    /// Duty tables
    pub duty: Vec<BoundedRows<u8>>,
    /// Pan tables
    pub pan: Vec<BoundedRows<u8>>,
    /// Wave tables, values 0-15 with 8 as the zero line
    pub wave: [[u8; WAVE_LEN]; TABLE_COUNT],
}

impl Default for ModTables {
    fn default() -> Self {
        Self::new()
    }
}

impl ModTables {
    /// Tables in their initial state: one zero column, pan centred, flat waves
    pub fn new() -> Self {
        let column = |first: u8| -> Vec<BoundedRows<u8>> {
            (0..TABLE_COUNT)
                .map(|_| BoundedRows::with_first(RowsKind::Table, MAX_TABLE_COLUMNS, first))
                .collect()
        };
        Self {
            volume: column(0),
            duty: column(0),
            pan: column(8),
            wave: [[8; WAVE_LEN]; TABLE_COUNT],
        }
    }

    fn rows(&self, kind: TableKind) -> Option<&Vec<BoundedRows<u8>>> {
        match kind {
            TableKind::Volume => Some(&self.volume),
            TableKind::Duty => Some(&self.duty),
            TableKind::Pan => Some(&self.pan),
            TableKind::Wave => None,
        }
    }

    fn rows_mut(&mut self, kind: TableKind) -> Option<&mut Vec<BoundedRows<u8>>> {
        match kind {
            TableKind::Volume => Some(&mut self.volume),
            TableKind::Duty => Some(&mut self.duty),
            TableKind::Pan => Some(&mut self.pan),
            TableKind::Wave => None,
        }
    }

    /// Columns of a table; 0 for unknown tables
    pub fn len(&self, kind: TableKind, table: usize) -> usize {
        if table >= TABLE_COUNT {
            return 0;
        }
        match self.rows(kind) {
            Some(rows) => rows[table].len(),
            None => WAVE_LEN,
        }
    }

    /// Value of one column; 0 outside the table
    pub fn value(&self, kind: TableKind, table: usize, column: usize) -> u8 {
        if table >= TABLE_COUNT {
            return 0;
        }
        match self.rows(kind) {
            Some(rows) => rows[table].get(column).copied().unwrap_or(0),
            None => self.wave[table].get(column).copied().unwrap_or(0),
        }
    }

    /// Value at `column`, or the last column past the end
    pub fn value_held(&self, kind: TableKind, table: usize, column: usize) -> u8 {
        let len = self.len(kind, table);
        if len == 0 {
            return 0;
        }
        self.value(kind, table, column.min(len - 1))
    }

    /// Overwrite one column; out-of-range writes are ignored.
    pub fn set_value(&mut self, kind: TableKind, table: usize, column: usize, value: u8) {
        if table >= TABLE_COUNT {
            return;
        }
        match self.rows_mut(kind) {
            Some(rows) => {
                if let Some(slot) = rows[table].get_mut(column) {
                    *slot = value;
                }
            }
            None => {
                if let Some(slot) = self.wave[table].get_mut(column) {
                    *slot = value & 15;
                }
            }
        }
    }

    /// Insert a zero column before `at`.
    pub fn insert_column(&mut self, kind: TableKind, table: usize, at: usize) -> Result<()> {
        let rows = self.editable(kind, table)?;
        rows.insert(at)
    }

    /// Append a zero column.
    pub fn add_column(&mut self, kind: TableKind, table: usize) -> Result<()> {
        let rows = self.editable(kind, table)?;
        rows.push()
    }

    /// Delete a column; a table keeps at least one.
    pub fn delete_column(&mut self, kind: TableKind, table: usize, at: usize) -> Result<()> {
        let rows = self.editable(kind, table)?;
        rows.remove(at)
    }

    fn editable(&mut self, kind: TableKind, table: usize) -> Result<&mut BoundedRows<u8>> {
        if table >= TABLE_COUNT {
            return Err(ChipError::NotSupported("table index out of range"));
        }
        self.rows_mut(kind)
            .map(|rows| &mut rows[table])
            .ok_or(ChipError::FixedSize(TableKind::Wave.name()))
    }
}
