//! Line-oriented text song format
//!
//! ```text
//! musicchip tune
//! version 1
//!
//! songline 00 01 00 02 00 00 00 00 00
//! trackline 01 00 1d 01 76 0a 00 00
//! instrumentline 01 00 76 0f
//! ```
//!
//! Every record is a keyword followed by hex fields, written two digits wide.
//! The two dialects differ in their keywords; the band-limited dialect adds
//! instrument names and the volume/duty/pan/wave tables:
//!
//! | record             | simple           | band-limited      |
//! |--------------------|------------------|-------------------|
//! | song row           | `songline`       | `song`            |
//! | pattern line       | `trackline`      | `pattern`         |
//! | program line       | `instrumentline` | `instrument`      |
//! | instrument name    |                  | `instrumentName`  |
//! | table column       |                  | `volume`, `duty`, `pan`, `wave` |
//!
//! Lines with an unknown keyword are skipped with a warning; a known keyword
//! with malformed fields fails the whole load.

use crate::store::modtable::{ModTables, TableKind, TABLE_COUNT, WAVE_LEN};
use crate::store::tracker::{
    Instrument, InstrumentLine, PatternLine, SongRow, TrackerSong, CHANNELS, PATTERN_COUNT,
    PATTERN_ROWS,
};
use crate::{ChipError, Result};
use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, hex_digit1, space0, space1},
    combinator::{all_consuming, map_res, rest},
    multi::count,
    sequence::{preceded, terminated},
    IResult,
};
use std::fmt::Write;
use tracing::{debug, warn};

/// First line of every song file
pub const MAGIC: &str = "musicchip tune";
/// Format version written
pub const VERSION: u32 = 1;

/// Keyword set of a text song file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDialect {
    /// Simple 4-oscillator engine
    Simple,
    /// Band-limited multi-table engine
    MultiTable,
}

impl TextDialect {
    fn song_keyword(self) -> &'static str {
        match self {
            TextDialect::Simple => "songline",
            TextDialect::MultiTable => "song",
        }
    }

    fn pattern_keyword(self) -> &'static str {
        match self {
            TextDialect::Simple => "trackline",
            TextDialect::MultiTable => "pattern",
        }
    }

    fn instrument_keyword(self) -> &'static str {
        match self {
            TextDialect::Simple => "instrumentline",
            TextDialect::MultiTable => "instrument",
        }
    }

    /// Whether the dialect stores names and modulation tables
    pub fn has_tables(self) -> bool {
        self == TextDialect::MultiTable
    }

    /// Name an instrument gets in an empty song
    pub fn default_instrument_name(self, index: usize) -> String {
        match self {
            TextDialect::Simple => String::new(),
            TextDialect::MultiTable => format!("INSTR {index:02X}"),
        }
    }

    /// Empty song with this dialect's instrument names
    pub fn empty_song(self) -> TrackerSong {
        TrackerSong::new(|index| self.default_instrument_name(index))
    }
}

/// Result of parsing a song file
#[derive(Debug, Clone)]
pub struct TextSong {
    /// Song, patterns and instruments
    pub song: TrackerSong,
    /// Modulation tables; defaults for the simple dialect
    pub tables: ModTables,
}

/// One parsed record
#[derive(Debug, Clone, PartialEq, Eq)]
enum Record<'a> {
    Song { row: u8, cells: Vec<u8> },
    Pattern { pattern: u8, row: u8, fields: Vec<u8> },
    InstrumentName { instrument: u8, name: &'a str },
    Instrument { instrument: u8, row: u8, cmd: u8, param: u8 },
    Table { kind: TableKind, table: u8, column: u8, value: u8 },
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(hex_digit1, |digits: &str| u8::from_str_radix(digits, 16))(input)
}

/// `count` hex bytes, each preceded by blanks
fn hex_fields(n: usize) -> impl FnMut(&str) -> IResult<&str, Vec<u8>> {
    move |input| count(preceded(space1, hex_byte), n)(input)
}

/// Whole remainder of a record: the fields and optional trailing blanks
fn fields_line(input: &str, n: usize) -> IResult<&str, Vec<u8>> {
    all_consuming(terminated(hex_fields(n), space0))(input)
}

fn name_line(input: &str) -> IResult<&str, (u8, &str)> {
    let (input, instrument) = preceded(space1, hex_byte)(input)?;
    let (input, name) = preceded(space0, rest)(input)?;
    Ok((input, (instrument, name.trim_end())))
}

fn keyword(input: &str) -> IResult<&str, &str> {
    alpha1(input)
}

fn table_kind(keyword: &str) -> Option<TableKind> {
    match keyword {
        "volume" => Some(TableKind::Volume),
        "duty" => Some(TableKind::Duty),
        "pan" => Some(TableKind::Pan),
        "wave" => Some(TableKind::Wave),
        _ => None,
    }
}

/// Parse one non-blank line.
///
/// `Ok(None)` is a line to skip; `Err` a known record with bad fields.
fn parse_record(line: &str, dialect: TextDialect) -> std::result::Result<Option<Record<'_>>, String> {
    let Ok((body, word)) = keyword(line) else {
        return Ok(None);
    };
    let malformed = |e: nom::Err<nom::error::Error<&str>>| format!("malformed `{word}` record: {e}");

    if word == dialect.song_keyword() {
        let (_, fields) = fields_line(body, 1 + 2 * CHANNELS).map_err(malformed)?;
        return Ok(Some(Record::Song {
            row: fields[0],
            cells: fields[1..].to_vec(),
        }));
    }
    if word == dialect.pattern_keyword() {
        let (_, fields) = fields_line(body, 8).map_err(malformed)?;
        return Ok(Some(Record::Pattern {
            pattern: fields[0],
            row: fields[1],
            fields: fields[2..].to_vec(),
        }));
    }
    if word == dialect.instrument_keyword() {
        let (_, fields) = fields_line(body, 4).map_err(malformed)?;
        return Ok(Some(Record::Instrument {
            instrument: fields[0],
            row: fields[1],
            cmd: fields[2],
            param: fields[3],
        }));
    }
    if dialect.has_tables() {
        if word == "instrumentName" {
            let (_, (instrument, name)) = name_line(body).map_err(malformed)?;
            return Ok(Some(Record::InstrumentName { instrument, name }));
        }
        if let Some(kind) = table_kind(word) {
            let (_, fields) = fields_line(body, 3).map_err(malformed)?;
            return Ok(Some(Record::Table {
                kind,
                table: fields[0],
                column: fields[1],
                value: fields[2],
            }));
        }
    }
    Ok(None)
}

fn header_version(line: &str) -> Option<&str> {
    let parsed: IResult<&str, &str> =
        preceded(terminated(tag("version"), space1), take_while1(|c: char| !c.is_whitespace()))(line);
    parsed.ok().map(|(_, version)| version)
}

fn apply(record: Record<'_>, song: &mut TrackerSong, tables: &mut ModTables) -> std::result::Result<(), String> {
    match record {
        Record::Song { row, cells } => {
            let slot = song
                .rows
                .ensure(usize::from(row))
                .ok_or_else(|| format!("song row {row:02x} out of range"))?;
            let mut value = SongRow::default();
            for channel in 0..CHANNELS {
                value.pattern[channel] = cells[channel * 2];
                value.transpose[channel] = cells[channel * 2 + 1];
            }
            *slot = value;
        }
        Record::Pattern { pattern, row, fields } => {
            let line = song
                .patterns
                .get_mut(usize::from(pattern))
                .and_then(|p| p.lines.get_mut(usize::from(row)))
                .ok_or_else(|| format!("pattern line {pattern:02x}/{row:02x} out of range"))?;
            *line = PatternLine {
                note: fields[0],
                instrument: fields[1],
                commands: [(fields[2], fields[3]), (fields[4], fields[5])],
            };
        }
        Record::InstrumentName { instrument, name } => {
            song.instrument_mut(instrument).name = name.to_string();
        }
        Record::Instrument {
            instrument,
            row,
            cmd,
            param,
        } => {
            let line = song
                .instrument_mut(instrument)
                .lines
                .ensure(usize::from(row))
                .ok_or_else(|| format!("instrument line {instrument:02x}/{row:02x} out of range"))?;
            *line = InstrumentLine { cmd, param };
        }
        Record::Table {
            kind,
            table,
            column,
            value,
        } => {
            let table = usize::from(table);
            let column = usize::from(column);
            if table >= TABLE_COUNT {
                return Err(format!("{} table {table:02x} out of range", kind.name()));
            }
            match kind {
                TableKind::Volume | TableKind::Duty | TableKind::Pan => {
                    let rows = match kind {
                        TableKind::Volume => &mut tables.volume,
                        TableKind::Duty => &mut tables.duty,
                        _ => &mut tables.pan,
                    };
                    let slot = rows[table]
                        .ensure(column)
                        .ok_or_else(|| format!("{} column {column:02x} out of range", kind.name()))?;
                    *slot = value;
                }
                TableKind::Wave => {
                    if column >= WAVE_LEN {
                        return Err(format!("wave column {column:02x} out of range"));
                    }
                    tables.set_value(TableKind::Wave, table, column, value);
                }
            }
        }
    }
    Ok(())
}

/// Parse a song file.
pub fn parse_song(source: &str, dialect: TextDialect) -> Result<TextSong> {
    let mut song = dialect.empty_song();
    let mut tables = ModTables::new();
    let mut records = 0usize;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end();
        if line.trim().is_empty() || line == MAGIC {
            continue;
        }
        if let Some(version) = header_version(line) {
            if version != VERSION.to_string() {
                warn!(line = line_no, version, "unexpected song format version");
            }
            continue;
        }
        let record = parse_record(line, dialect).map_err(|message| ChipError::Parse {
            line: line_no,
            message,
        })?;
        match record {
            Some(record) => {
                apply(record, &mut song, &mut tables).map_err(|message| ChipError::Parse {
                    line: line_no,
                    message,
                })?;
                records += 1;
            }
            None => warn!(line = line_no, text = line, "skipping unknown song record"),
        }
    }

    debug!(records, rows = song.len(), ?dialect, "text song parsed");
    Ok(TextSong { song, tables })
}

fn instrument_used(instrument: &Instrument, index: usize, dialect: TextDialect) -> bool {
    instrument.lines.len() > 1
        || instrument.line(0) != Some(InstrumentLine::default())
        || (dialect.has_tables() && instrument.name != dialect.default_instrument_name(index))
}

/// Serialize a song; `tables` is written only by the band-limited dialect.
pub fn write_song(song: &TrackerSong, tables: Option<&ModTables>, dialect: TextDialect) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_records(&mut out, song, tables, dialect);
    out
}

fn write_records(
    out: &mut String,
    song: &TrackerSong,
    tables: Option<&ModTables>,
    dialect: TextDialect,
) -> std::fmt::Result {
    writeln!(out, "{MAGIC}")?;
    writeln!(out, "version {VERSION}")?;
    writeln!(out)?;

    for (index, row) in song.rows.as_slice().iter().enumerate() {
        write!(out, "{} {index:02x}", dialect.song_keyword())?;
        for channel in 0..CHANNELS {
            write!(out, " {:02x} {:02x}", row.pattern[channel], row.transpose[channel])?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;

    for pattern in 1..PATTERN_COUNT {
        for row in 0..PATTERN_ROWS {
            let line = song.patterns[pattern].lines[row];
            if line.is_empty() {
                continue;
            }
            let [(c0, p0), (c1, p1)] = line.commands;
            writeln!(
                out,
                "{} {pattern:02x} {row:02x} {:02x} {:02x} {c0:02x} {p0:02x} {c1:02x} {p1:02x}",
                dialect.pattern_keyword(),
                line.note,
                line.instrument,
            )?;
        }
    }
    writeln!(out)?;

    for (index, instrument) in song.instruments.iter().enumerate().skip(1) {
        if !instrument_used(instrument, index, dialect) {
            continue;
        }
        if dialect.has_tables() {
            writeln!(out, "instrumentName {index:02x} {}", instrument.name)?;
        }
        for (row, line) in instrument.lines.as_slice().iter().enumerate() {
            write!(
                out,
                "{} {index:02x} {row:02x} {:02x} {:02x}",
                dialect.instrument_keyword(),
                line.cmd,
                line.param
            )?;
            if dialect.has_tables() {
                write!(out, " ")?;
            }
            writeln!(out)?;
        }
    }

    if let (true, Some(tables)) = (dialect.has_tables(), tables) {
        write_tables(out, tables)?;
    }
    Ok(())
}

fn write_tables(out: &mut String, tables: &ModTables) -> std::fmt::Result {
    let defaults = ModTables::new();
    for kind in [TableKind::Volume, TableKind::Duty, TableKind::Pan] {
        writeln!(out)?;
        let keyword = kind.name().to_ascii_lowercase();
        for table in 1..TABLE_COUNT {
            let len = tables.len(kind, table);
            if len <= 1 && tables.value(kind, table, 0) == defaults.value(kind, table, 0) {
                continue;
            }
            for column in 0..len {
                writeln!(
                    out,
                    "{keyword} {table:02x} {column:02x} {:02x}",
                    tables.value(kind, table, column)
                )?;
            }
        }
    }
    writeln!(out)?;
    for (table, wave) in tables.wave.iter().enumerate().skip(1) {
        if wave == &defaults.wave[table] {
            continue;
        }
        for (column, value) in wave.iter().enumerate() {
            writeln!(out, "wave {table:02x} {column:02x} {value:02x}")?;
        }
    }
    Ok(())
}
