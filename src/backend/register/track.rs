//! Track-list sequencer of the register-level engine
//!
//! Each voice walks its own track list independently. A track row plays one
//! pattern (once, twice, or as a rest) at a speed of its own, so voices drift
//! apart and meet again when their lists end. The song ends, or restarts,
//! once every voice has finished.

use super::song::{RegisterSong, TrackOption, CHANNELS, TRACK_ROWS};
use crate::engine::PlayState;
use tracing::debug;

/// What a voice does at a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEvent {
    /// Start a note with an instrument
    Trigger {
        /// Note (1-31)
        note: u8,
        /// Instrument (0-7)
        instrument: u8,
    },
    /// Release the current note
    Release,
}

#[derive(Debug, Clone, Copy, Default)]
struct TrackCursor {
    track: usize,
    line: usize,
    last_line: usize,
    counter: u16,
    repeated: bool,
    finished: bool,
}

impl TrackCursor {
    fn start(&mut self, song: &RegisterSong, channel: usize, track: usize, line: usize) {
        *self = Self {
            track,
            line: line % song.pattern_len(),
            last_line: 0,
            counter: 0,
            repeated: false,
            finished: false,
        };
        self.check_end(song, channel);
    }

    fn check_end(&mut self, song: &RegisterSong, channel: usize) {
        self.finished = self.track >= TRACK_ROWS
            || song.tracks[channel][self.track].option == TrackOption::EndLoop;
    }
}

/// Per-voice track cursors
#[derive(Debug, Clone, Default)]
pub struct TrackPlayer {
    state: PlayState,
    cursors: [TrackCursor; CHANNELS],
    loop_count: u32,
}

impl TrackPlayer {
    /// Create an idle player.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current play state
    #[inline]
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Whether a song or pattern plays
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state != PlayState::Idle
    }

    /// Track row of the first voice
    pub fn song_row(&self) -> usize {
        self.cursors[0].track.min(TRACK_ROWS - 1)
    }

    /// Last pattern line played by the first voice
    pub fn pattern_row(&self) -> usize {
        self.cursors[0].last_line
    }

    /// Number of times the song wrapped around
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Stop playback.
    pub fn stop(&mut self) {
        self.state = PlayState::Idle;
    }

    /// Play all track lists from a row.
    pub fn play_song_from(&mut self, song: &RegisterSong, row: usize, pattern_row: usize) {
        self.start(song, row, pattern_row);
        self.state = PlayState::PlayingSong;
        debug!(row, pattern_row, "register song playback started");
    }

    /// Repeat one track row forever.
    pub fn play_pattern_from(&mut self, song: &RegisterSong, row: usize, pattern_row: usize) {
        self.start(song, row, pattern_row);
        self.state = PlayState::PlayingPattern;
        debug!(row, pattern_row, "register pattern playback started");
    }

    fn start(&mut self, song: &RegisterSong, row: usize, pattern_row: usize) {
        self.loop_count = 0;
        for (channel, cursor) in self.cursors.iter_mut().enumerate() {
            cursor.start(song, channel, row, pattern_row);
        }
    }

    /// Advance one tick; returns the event of each voice.
    pub fn tick(&mut self, song: &RegisterSong) -> [Option<TrackEvent>; CHANNELS] {
        let mut events = [None; CHANNELS];
        if !self.is_playing() {
            return events;
        }
        let pattern_len = song.pattern_len();
        let repeat_pattern = self.state == PlayState::PlayingPattern;

        for (channel, cursor) in self.cursors.iter_mut().enumerate() {
            if cursor.finished {
                continue;
            }
            let track = song.tracks[channel][cursor.track];

            if cursor.counter == 0 {
                events[channel] = match track.option {
                    TrackOption::Silence => (cursor.line == 0).then_some(TrackEvent::Release),
                    _ => song
                        .line(usize::from(track.pattern), cursor.line)
                        .map(|line| match line.note {
                            0 => TrackEvent::Release,
                            note => TrackEvent::Trigger {
                                note,
                                instrument: line.instrument,
                            },
                        }),
                };
                cursor.last_line = cursor.line;
                cursor.counter = song.line_ticks(track.speed);
            }

            cursor.counter -= 1;
            if cursor.counter > 0 {
                continue;
            }
            cursor.line += 1;
            if cursor.line < pattern_len {
                continue;
            }
            cursor.line = 0;
            if repeat_pattern {
                continue;
            }
            if track.option == TrackOption::PlayTwice && !cursor.repeated {
                cursor.repeated = true;
            } else {
                cursor.repeated = false;
                cursor.track += 1;
                cursor.check_end(song, channel);
            }
        }

        if self.cursors.iter().all(|c| c.finished) {
            if song.looping {
                self.loop_count += 1;
                debug!(loop_count = self.loop_count, "register song wrapped");
                for (channel, cursor) in self.cursors.iter_mut().enumerate() {
                    cursor.start(song, channel, 0, 0);
                }
            } else {
                debug!("register song finished");
                self.state = PlayState::Idle;
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::register::song::{Track, TrackSpeed};

    fn song_with_ends(end_rows: [usize; CHANNELS]) -> RegisterSong {
        let mut song = RegisterSong::default();
        for (channel, &row) in end_rows.iter().enumerate() {
            song.tracks[channel][row].option = TrackOption::EndLoop;
        }
        song.line_mut(0, 0).expect("in range").note = 5;
        song
    }

    #[test]
    fn test_first_tick_triggers_line_zero() {
        let song = song_with_ends([1, 1, 1]);
        let mut player = TrackPlayer::new();
        player.play_song_from(&song, 0, 0);
        let events = player.tick(&song);
        assert_eq!(
            events[0],
            Some(TrackEvent::Trigger {
                note: 5,
                instrument: 0
            })
        );
        for _ in 1..song.line_ticks(TrackSpeed::Normal) {
            assert_eq!(player.tick(&song), [None; CHANNELS]);
        }
        assert_eq!(player.tick(&song)[0], Some(TrackEvent::Release), "empty line is a note off");
        assert_eq!(player.pattern_row(), 1);
    }

    #[test]
    fn test_song_stops_when_every_voice_ends() {
        let song = song_with_ends([1, 1, 1]);
        let mut player = TrackPlayer::new();
        player.play_song_from(&song, 0, 0);
        let ticks = usize::from(song.line_ticks(TrackSpeed::Normal)) * song.pattern_len();
        for _ in 0..ticks {
            assert!(player.is_playing());
            player.tick(&song);
        }
        assert!(!player.is_playing());
    }

    #[test]
    fn test_looping_song_counts_wraps() {
        let mut song = song_with_ends([1, 1, 1]);
        song.looping = true;
        let mut player = TrackPlayer::new();
        player.play_song_from(&song, 0, 0);
        let ticks = usize::from(song.line_ticks(TrackSpeed::Normal)) * song.pattern_len();
        for _ in 0..ticks {
            player.tick(&song);
        }
        assert!(player.is_playing());
        assert_eq!(player.loop_count(), 1);
        assert_eq!(player.song_row(), 0);
    }

    #[test]
    fn test_play_twice_and_speed() {
        let mut song = song_with_ends([2, 0, 0]);
        song.tracks[0][0] = Track {
            pattern: 0,
            speed: TrackSpeed::Half,
            option: TrackOption::PlayTwice,
        };
        let mut player = TrackPlayer::new();
        player.play_song_from(&song, 0, 0);
        let pattern_ticks = usize::from(song.line_ticks(TrackSpeed::Half)) * song.pattern_len();
        for _ in 0..pattern_ticks {
            player.tick(&song);
        }
        assert_eq!(player.song_row(), 0, "second pass of the same row");
        for _ in 0..pattern_ticks {
            player.tick(&song);
        }
        assert_eq!(player.song_row(), 1);
    }

    #[test]
    fn test_silence_releases_once() {
        let mut song = song_with_ends([1, 0, 0]);
        song.tracks[0][0].option = TrackOption::Silence;
        let mut player = TrackPlayer::new();
        player.play_song_from(&song, 0, 0);
        assert_eq!(player.tick(&song)[0], Some(TrackEvent::Release));
        let line = usize::from(song.line_ticks(TrackSpeed::Normal));
        for _ in 1..line * 3 {
            assert_eq!(player.tick(&song)[0], None);
        }
    }

    #[test]
    fn test_pattern_mode_repeats_row() {
        let song = song_with_ends([1, 1, 1]);
        let mut player = TrackPlayer::new();
        player.play_pattern_from(&song, 0, 0);
        let ticks = usize::from(song.line_ticks(TrackSpeed::Normal)) * song.pattern_len();
        for _ in 0..ticks * 2 {
            player.tick(&song);
        }
        assert!(player.is_playing());
        assert_eq!(player.song_row(), 0);
    }
}
