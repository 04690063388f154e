//! Playroutine of the tracker dialects
//!
//! Walks the song order list and the 32-row patterns at a fixed row cadence
//! and reports, per channel, what the current row asks for. The backend turns
//! the returned [`RowHit`]s into instrument triggers and effect commands.

use crate::store::tracker::{TrackerSong, CHANNELS, NOTE_CUT, PATTERN_ROWS};
use tracing::debug;

/// Playback state of a sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Nothing scheduled
    #[default]
    Idle,
    /// Following the song order list
    PlayingSong,
    /// Repeating the patterns of one song row
    PlayingPattern,
}

/// Note column of a row after instrument resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    /// Nothing to trigger
    None,
    /// Silence the channel
    Cut,
    /// Restart `instrument` with the transposed `note`
    Trigger {
        /// Pattern note (+1 encoded) plus the song row transpose
        note: u8,
        /// Explicit or carried-over instrument, never 0
        instrument: u8,
    },
}

/// What one channel's pattern row asks for this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowHit {
    /// Note column
    pub action: NoteAction,
    /// Both effect slots; command 0 is empty
    pub commands: [(u8, u8); 2],
}

#[derive(Debug, Clone, Copy, Default)]
struct Route {
    pattern: u8,
    transpose: u8,
    last_instrument: u8,
}

/// Row/pattern scheduler shared by the simple and band-limited backends
#[derive(Debug, Clone)]
pub struct Sequencer {
    state: PlayState,
    song_pos: usize,
    pattern_row: usize,
    row_wait: u8,
    row_ticks: u8,
    loop_song: bool,
    loop_count: u32,
    routes: [Route; CHANNELS],
}

impl Sequencer {
    /// Idle sequencer; each row lasts `row_ticks + 1` ticks.
    pub fn new(row_ticks: u8, loop_song: bool) -> Self {
        Self {
            state: PlayState::Idle,
            song_pos: 0,
            pattern_row: 0,
            row_wait: 0,
            row_ticks,
            loop_song,
            loop_count: 0,
            routes: [Route::default(); CHANNELS],
        }
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Whether a song or pattern is playing
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state != PlayState::Idle
    }

    /// Song row whose patterns are playing
    pub fn song_row(&self) -> usize {
        self.song_pos.saturating_sub(1)
    }

    /// Pattern row played last
    pub fn pattern_row(&self) -> usize {
        (self.pattern_row + PATTERN_ROWS - 1) % PATTERN_ROWS
    }

    /// How often the song wrapped around since playback started
    #[inline]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Pattern number a channel is routed to
    pub fn channel_pattern(&self, channel: usize) -> u8 {
        self.routes.get(channel).map_or(0, |r| r.pattern)
    }

    /// Return to idle and forget positions and carried instruments.
    pub fn stop(&mut self) {
        *self = Self::new(self.row_ticks, self.loop_song);
    }

    /// Play the song from `row`, starting inside its patterns at `pattern_row`.
    pub fn play_song_from(&mut self, song: &TrackerSong, row: usize, pattern_row: usize) {
        self.stop();
        self.state = PlayState::PlayingSong;
        self.song_pos = row;
        self.pattern_row = pattern_row % PATTERN_ROWS;
        if self.pattern_row != 0 {
            self.load_routes(song, row);
            self.song_pos = row + 1;
        }
        debug!(row, pattern_row, "play song");
    }

    /// Loop the patterns of song row `row`, starting at `pattern_row`.
    pub fn play_pattern_from(&mut self, song: &TrackerSong, row: usize, pattern_row: usize) {
        self.stop();
        self.state = PlayState::PlayingPattern;
        self.load_routes(song, row);
        self.song_pos = row + 1;
        self.pattern_row = pattern_row % PATTERN_ROWS;
        debug!(row, pattern_row, "play pattern");
    }

    fn load_routes(&mut self, song: &TrackerSong, row: usize) {
        let song_row = song.row(row);
        for (ch, route) in self.routes.iter_mut().enumerate() {
            route.pattern = song_row.pattern[ch];
            route.transpose = song_row.transpose[ch];
        }
    }

    /// Run one tick; returns the rows reached this tick per channel.
    pub fn tick(&mut self, song: &TrackerSong) -> [Option<RowHit>; CHANNELS] {
        let mut hits = [None; CHANNELS];
        if self.state == PlayState::Idle {
            return hits;
        }
        if self.row_wait > 0 {
            self.row_wait -= 1;
            return hits;
        }
        self.row_wait = self.row_ticks;

        if self.pattern_row == 0 && self.state == PlayState::PlayingSong {
            if self.song_pos >= song.len() {
                if !self.loop_song {
                    debug!("song finished");
                    self.state = PlayState::Idle;
                    return hits;
                }
                self.song_pos = 0;
                self.loop_count += 1;
                debug!(loops = self.loop_count, "song wrapped");
            }
            self.load_routes(song, self.song_pos);
            self.song_pos += 1;
        }

        for (hit, route) in hits.iter_mut().zip(self.routes.iter_mut()) {
            if route.pattern == 0 {
                continue;
            }
            let line = song.pattern(route.pattern).line(self.pattern_row);
            let action = match line.note {
                0 => NoteAction::None,
                NOTE_CUT => NoteAction::Cut,
                note => {
                    let instrument = if line.instrument != 0 {
                        line.instrument
                    } else {
                        route.last_instrument
                    };
                    if instrument == 0 {
                        NoteAction::None
                    } else {
                        route.last_instrument = instrument;
                        NoteAction::Trigger {
                            note: note.wrapping_add(route.transpose),
                            instrument,
                        }
                    }
                }
            };
            *hit = Some(RowHit {
                action,
                commands: line.commands,
            });
        }
        self.pattern_row = (self.pattern_row + 1) % PATTERN_ROWS;
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tracker::PatternLine;

    fn song_with_notes() -> TrackerSong {
        let mut song = TrackerSong::new(|_| String::new());
        song.rows.get_mut(0).expect("row 0").pattern[0] = 1;
        song.pattern_mut(1).lines[0] = PatternLine {
            note: 49,
            instrument: 2,
            ..PatternLine::default()
        };
        song.pattern_mut(1).lines[1] = PatternLine {
            note: 50,
            instrument: 0,
            commands: [(b'v', 3), (b'f', 1)],
        };
        song.pattern_mut(1).lines[2] = PatternLine {
            note: NOTE_CUT,
            ..PatternLine::default()
        };
        song
    }

    #[test]
    fn test_row_cadence_and_instrument_carry() {
        let song = song_with_notes();
        let mut seq = Sequencer::new(2, false);
        seq.play_song_from(&song, 0, 0);

        let first = seq.tick(&song)[0].expect("row 0 on tick 0");
        assert_eq!(
            first.action,
            NoteAction::Trigger {
                note: 49,
                instrument: 2
            }
        );
        assert!(seq.tick(&song)[0].is_none());
        assert!(seq.tick(&song)[0].is_none());

        let second = seq.tick(&song)[0].expect("row 1 on tick 3");
        assert_eq!(
            second.action,
            NoteAction::Trigger {
                note: 50,
                instrument: 2
            },
            "instrument 0 reuses the last one"
        );
        assert_eq!(second.commands, [(b'v', 3), (b'f', 1)]);

        seq.tick(&song);
        seq.tick(&song);
        assert_eq!(seq.tick(&song)[0].map(|h| h.action), Some(NoteAction::Cut));
        assert_eq!(seq.pattern_row(), 2);
    }

    #[test]
    fn test_song_end_stops_or_loops() {
        let song = song_with_notes();
        let mut seq = Sequencer::new(0, false);
        seq.play_song_from(&song, 0, 0);
        for _ in 0..PATTERN_ROWS {
            seq.tick(&song);
        }
        assert!(seq.is_playing());
        seq.tick(&song);
        assert_eq!(seq.state(), PlayState::Idle);

        let mut looping = Sequencer::new(0, true);
        looping.play_song_from(&song, 0, 0);
        for _ in 0..=PATTERN_ROWS {
            looping.tick(&song);
        }
        assert!(looping.is_playing());
        assert_eq!(looping.loop_count(), 1);
        assert_eq!(looping.song_row(), 0);
    }

    #[test]
    fn test_transpose_and_idle_channels() {
        let mut song = song_with_notes();
        song.rows.get_mut(0).expect("row 0").transpose[0] = 12;
        let mut seq = Sequencer::new(0, false);
        seq.play_song_from(&song, 0, 0);
        let hits = seq.tick(&song);
        assert_eq!(
            hits[0].map(|h| h.action),
            Some(NoteAction::Trigger {
                note: 61,
                instrument: 2
            })
        );
        assert!(hits[1].is_none(), "pattern 0 keeps a channel idle");
    }

    #[test]
    fn test_play_from_mid_pattern() {
        let song = song_with_notes();
        let mut seq = Sequencer::new(0, false);
        seq.play_song_from(&song, 0, 1);
        assert_eq!(seq.channel_pattern(0), 1, "routes load immediately");
        let hit = seq.tick(&song)[0].expect("row 1");
        assert_eq!(hit.commands[0], (b'v', 3));
        // No instrument has been seen yet on this channel
        assert_eq!(hit.action, NoteAction::None);
    }

    #[test]
    fn test_pattern_mode_repeats() {
        let song = song_with_notes();
        let mut seq = Sequencer::new(0, false);
        seq.play_pattern_from(&song, 0, 0);
        for _ in 0..PATTERN_ROWS {
            seq.tick(&song);
        }
        let again = seq.tick(&song)[0].expect("pattern restarts");
        assert!(matches!(again.action, NoteAction::Trigger { note: 49, .. }));
        assert_eq!(seq.state(), PlayState::PlayingPattern);
    }
}
