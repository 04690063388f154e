//! Engine configuration
//!
//! All fields have defaults matching the tracker's hard-wired behaviour, so an
//! empty JSON object (or `EngineConfig::default()`) reproduces the stock engines.

use crate::{ChipError, Result, DEFAULT_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shared echo post-filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Run the echo on the final mix
    pub enabled: bool,
    /// Gain of the mono input fed into the delay line; the line itself decays at half this value
    pub feedback: f32,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feedback: 0.6,
        }
    }
}

/// Settings for the simple 4-oscillator engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleConfig {
    /// Output samples between two playroutine ticks
    pub tick_period_samples: u32,
    /// Row wait counter reload; a pattern row lasts this many ticks plus one
    pub row_ticks: u8,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            tick_period_samples: 496,
            row_ticks: 4,
        }
    }
}

/// Settings for the band-limited multi-table engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTableConfig {
    /// Playroutine rate in Hz
    pub tick_rate_hz: u32,
    /// Row wait counter reload; a pattern row lasts this many ticks plus one
    pub row_ticks: u8,
    /// Wrap to the first song row at the end instead of stopping
    pub loop_song: bool,
}

impl Default for MultiTableConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            row_ticks: 6,
            loop_song: true,
        }
    }
}

/// Settings for the register-level engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Emulated chip clock in Hz (PAL by default)
    pub clock_hz: u32,
    /// Playroutine rate in Hz
    pub tick_rate_hz: u32,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            clock_hz: 985_248,
            tick_rate_hz: 50,
        }
    }
}

/// Offline rendering limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Hard stop for songs that never end
    pub max_seconds: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { max_seconds: 600 }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Echo post-filter
    pub echo: EchoConfig,
    /// Per-channel FIR filtering in the band-limited engine
    pub channel_filters: bool,
    /// Simple engine
    pub simple: SimpleConfig,
    /// Band-limited engine
    pub multitable: MultiTableConfig,
    /// Register-level engine
    pub register: RegisterConfig,
    /// WAV export
    pub export: ExportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            echo: EchoConfig::default(),
            channel_filters: true,
            simple: SimpleConfig::default(),
            multitable: MultiTableConfig::default(),
            register: RegisterConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ChipError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values that would stall or destabilise the engines.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ChipError::Config("sample_rate must be non-zero".into()));
        }
        if self.simple.tick_period_samples == 0 {
            return Err(ChipError::Config(
                "simple.tick_period_samples must be non-zero".into(),
            ));
        }
        if self.simple.row_ticks == 0 || self.multitable.row_ticks == 0 {
            return Err(ChipError::Config("row_ticks must be non-zero".into()));
        }
        if self.multitable.tick_rate_hz == 0 || self.register.tick_rate_hz == 0 {
            return Err(ChipError::Config("tick_rate_hz must be non-zero".into()));
        }
        if self.register.clock_hz < self.sample_rate {
            return Err(ChipError::Config(
                "register.clock_hz must not be below sample_rate".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.echo.feedback) {
            return Err(ChipError::Config(format!(
                "echo.feedback {} outside [0, 1)",
                self.echo.feedback
            )));
        }
        Ok(())
    }
}
