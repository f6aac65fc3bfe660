/// Detector configuration
///
/// Every tunable constant of the pipeline, with the production values the
/// detector was calibrated against. Validated once at startup; any violation
/// is fatal.

use crate::fft::{self, FftError};
use crate::hal::Sample;
use crate::pooling::{self, PoolError};
use crate::spectrogram::NoiseGate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Frame size {capture_len}/{time_bins} is invalid: {source}")]
    FrameSize {
        capture_len: usize,
        time_bins: usize,
        #[source]
        source: FftError,
    },

    #[error("Invalid {stage} pooling block: {source}")]
    Pooling {
        stage: &'static str,
        #[source]
        source: PoolError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Pooling block, rows (time) x cols (frequency)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSize {
    pub rows: usize,
    pub cols: usize,
}

impl BlockSize {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples per capture; also the spectrogram working length
    pub capture_len: usize,

    /// Delay between reads while capturing (microseconds)
    pub inter_sample_delay_us: u64,

    /// Raw level a read must exceed to start a capture
    pub trigger_threshold: Sample,

    /// Spectrogram rows (one FFT frame each)
    pub time_bins: usize,

    /// Spectrogram columns after frequency resize
    pub freq_bins: usize,

    /// First reduction, block average
    pub avg_block: BlockSize,

    /// Second reduction, block peak
    pub peak_block: BlockSize,

    /// Fraction of full scale the capture peak must reach
    pub noise_gate_fraction: f64,

    /// Fraction of full scale above which the capture counts as clipped
    pub clip_fraction: f64,

    /// Spectrogram magnitude floor
    pub floor_threshold: u16,

    /// Light wins while light_error - dark_error is in (-negative_margin, 0]
    pub negative_margin: i64,

    /// Dark wins while light_error - dark_error is in (0, positive_margin)
    pub positive_margin: i64,

    /// Shortest accepted capture, as a fraction of `capture_len`
    pub min_word_fraction: f64,

    /// Dump training captures through the diagnostic channel
    pub diagnostics: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            capture_len: 1024,
            inter_sample_delay_us: 250,
            trigger_threshold: 35000,               // ~1.75V of 3.3V
            time_bins: 64,
            freq_bins: 64,
            avg_block: BlockSize::new(8, 8),
            peak_block: BlockSize::new(4, 4),
            noise_gate_fraction: 0.75,              // 0xBFFF
            clip_fraction: 65520.0 / 65535.0,       // 0xFFF0
            floor_threshold: 50,
            negative_margin: 400,
            positive_margin: 400,
            min_word_fraction: 0.2,
            diagnostics: false,
        }
    }
}

impl DetectorConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        debug!("Loaded config from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_len == 0 || self.time_bins == 0 || self.freq_bins == 0 {
            return Err(ConfigError::Invalid(
                "capture_len, time_bins and freq_bins must be greater than 0".to_string(),
            ));
        }

        fft::check_length("spectrogram frame", self.frame_len()).map_err(|source| {
            ConfigError::FrameSize {
                capture_len: self.capture_len,
                time_bins: self.time_bins,
                source,
            }
        })?;

        pooling::check_blocks(self.time_bins, self.freq_bins, self.avg_block.rows, self.avg_block.cols)
            .map_err(|source| ConfigError::Pooling { stage: "average", source })?;

        pooling::check_blocks(
            self.time_bins / self.avg_block.rows,
            self.freq_bins / self.avg_block.cols,
            self.peak_block.rows,
            self.peak_block.cols,
        )
        .map_err(|source| ConfigError::Pooling { stage: "peak", source })?;

        for (name, value) in [
            ("noise_gate_fraction", self.noise_gate_fraction),
            ("clip_fraction", self.clip_fraction),
            ("min_word_fraction", self.min_word_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        if self.noise_gate_fraction > self.clip_fraction {
            return Err(ConfigError::Invalid(
                "noise_gate_fraction must not exceed clip_fraction".to_string(),
            ));
        }

        if self.negative_margin <= 0 || self.positive_margin <= 0 {
            return Err(ConfigError::Invalid(
                "decision margins must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Samples per FFT frame
    pub fn frame_len(&self) -> usize {
        self.capture_len / self.time_bins.max(1)
    }

    /// Captures shorter than this are discarded
    pub fn min_word_len(&self) -> usize {
        (self.min_word_fraction * self.capture_len as f64) as usize
    }

    pub fn inter_sample_delay(&self) -> Duration {
        Duration::from_micros(self.inter_sample_delay_us)
    }

    pub fn noise_gate(&self) -> NoiseGate {
        NoiseGate::from_fractions(self.noise_gate_fraction, self.clip_fraction)
    }
}
