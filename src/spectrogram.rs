/// Spectrogram builder
///
/// Turns a captured window into a TimeBins x FreqBins grid of log-magnitude
/// values:
///
/// 1. Resample to the working length (nearest position, no interpolation)
/// 2. Normalize to full scale and remove DC; reject quiet or clipped captures
/// 3. Per time bin: Hamming window, FFT, magnitude, centering shift, 20*log10
/// 4. Clamp negative results to zero, raise values below the floor to the floor
/// 5. Resize each frame to FreqBins
///
/// The complex frame and the window coefficients are allocated once and
/// reused for every frame of every capture.

use crate::config::DetectorConfig;
use crate::fft::{self, FftError};
use crate::grid::Grid;
use crate::hal::Sample;
use num_complex::Complex64;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Log-magnitude grid, rows are time bins
pub type Spectrogram = Grid<u16>;

/// Full-scale value of a sample
pub const FULL_SCALE: f64 = u16::MAX as f64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpectrogramError {
    #[error("Invalid spectrogram frame: {0}")]
    Frame(#[from] FftError),

    #[error("Invalid spectrogram shape: {0}")]
    Shape(String),

    #[error("Empty sample window")]
    EmptyWindow,
}

/// Amplitude gate separating speech from silence and saturation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseGate {
    /// The capture peak must reach this level
    pub peak_floor: Sample,

    /// A capture peak above this level counts as clipped
    pub clip_ceiling: Sample,
}

impl NoiseGate {
    pub fn new(peak_floor: Sample, clip_ceiling: Sample) -> Self {
        Self {
            peak_floor,
            clip_ceiling,
        }
    }

    /// Gate levels as fractions of full scale
    pub fn from_fractions(peak_floor: f64, clip_ceiling: f64) -> Self {
        Self {
            peak_floor: (peak_floor * FULL_SCALE).round() as Sample,
            clip_ceiling: (clip_ceiling * FULL_SCALE).round() as Sample,
        }
    }

    /// True when `samples` never reach the gate, clip, or carry no variation
    pub fn is_noise(&self, samples: &[Sample]) -> bool {
        match min_max(samples) {
            Some((min, max)) => self.rejects(min, max),
            None => true,
        }
    }

    /// Normalize to the full unsigned range and remove the mean.
    ///
    /// Returns `None` for a noise capture.
    pub fn normalize(&self, samples: &[Sample]) -> Option<Vec<i32>> {
        let (min, max) = min_max(samples)?;
        if self.rejects(min, max) {
            trace!("Noise gate rejected capture: min={}, max={}", min, max);
            return None;
        }

        let (min, span) = (min as f64, (max - min) as f64);
        let scaled: Vec<f64> = samples
            .iter()
            .map(|&s| (s as f64 - min) / span * FULL_SCALE)
            .collect();
        let mean = scaled.iter().sum::<f64>() / scaled.len() as f64;

        Some(scaled.iter().map(|&v| (v - mean) as i32).collect())
    }

    fn rejects(&self, min: Sample, max: Sample) -> bool {
        max < self.peak_floor || max > self.clip_ceiling || max == min
    }
}

fn min_max(samples: &[Sample]) -> Option<(Sample, Sample)> {
    let first = *samples.first()?;
    Some(
        samples
            .iter()
            .fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s))),
    )
}

/// Hamming window of `n` points
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    let weight = 2.0 * std::f64::consts::PI / (n as f64 - 1.0);
    (0..n)
        .map(|i| 0.54 - 0.46 * (weight * i as f64).cos())
        .collect()
}

/// Resize by nearest position: output `i` takes source `floor(i / n * len)`
pub fn resize_nearest<T: Copy>(source: &[T], n: usize) -> Vec<T> {
    if source.is_empty() {
        return Vec::new();
    }
    let len = source.len();
    (0..n)
        .map(|i| source[nearest_index(i, n, len)])
        .collect()
}

/// `resize_nearest` into an existing buffer; `dest` is left untouched when `source` is empty
pub fn resize_nearest_into<T: Copy>(source: &[T], dest: &mut [T]) {
    if source.is_empty() {
        return;
    }
    let (n, len) = (dest.len(), source.len());
    for (i, slot) in dest.iter_mut().enumerate() {
        *slot = source[nearest_index(i, n, len)];
    }
}

fn nearest_index(i: usize, n: usize, len: usize) -> usize {
    let pos = (i as f64 / n as f64 * len as f64).floor() as usize;
    pos.min(len - 1)
}

/// Log-magnitude of one transformed frame with the zero frequency moved to the middle.
///
/// `levels[k] = max(20*log10(|frame[(k + n/2) % n]|), 0)`, truncated, then
/// raised to `floor`. Returns how many values were negative and the lowest one.
pub fn shifted_log_levels(frame: &[Complex64], levels: &mut [u16], floor: u16) -> (usize, f64) {
    let n = frame.len();
    let mid = n / 2;
    let mut clipped = 0usize;
    let mut lowest = 0.0f64;

    for (k, level) in levels.iter_mut().enumerate().take(n) {
        let db = 20.0 * frame[(k + mid) % n].norm().log10();
        let db = if db < 0.0 {
            clipped += 1;
            lowest = lowest.min(db);
            0.0
        } else {
            db
        };
        *level = (db as u16).max(floor);
    }

    (clipped, lowest)
}

/// Builds spectrograms with preallocated frame buffers
pub struct SpectrogramBuilder {
    time_bins: usize,
    freq_bins: usize,
    working_len: usize,
    floor_threshold: u16,
    gate: NoiseGate,

    /// Hamming coefficients, one per frame point; immutable after construction
    window: Vec<f64>,

    /// FFT scratch, owned here and valid for one frame at a time
    frame: Vec<Complex64>,

    /// Shifted log-magnitudes of the current frame
    levels: Vec<u16>,
}

impl SpectrogramBuilder {
    /// Create a builder; the frame size `working_len / time_bins` must be a power of two
    pub fn new(
        time_bins: usize,
        freq_bins: usize,
        working_len: usize,
        floor_threshold: u16,
        gate: NoiseGate,
    ) -> Result<Self, SpectrogramError> {
        if time_bins == 0 || freq_bins == 0 {
            return Err(SpectrogramError::Shape(format!(
                "{}x{} spectrogram",
                time_bins, freq_bins
            )));
        }

        let frame_len = working_len / time_bins;
        fft::check_length("spectrogram frame", frame_len)?;

        debug!(
            "Spectrogram builder: {}x{} bins, {} working samples, {} points per frame",
            time_bins, freq_bins, working_len, frame_len
        );

        Ok(Self {
            time_bins,
            freq_bins,
            working_len,
            floor_threshold,
            gate,
            window: hamming(frame_len),
            frame: vec![Complex64::new(0.0, 0.0); frame_len],
            levels: vec![0; frame_len],
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self, SpectrogramError> {
        Self::new(
            config.time_bins,
            config.freq_bins,
            config.capture_len,
            config.floor_threshold,
            config.noise_gate(),
        )
    }

    /// Build the spectrogram of `samples`.
    ///
    /// Returns the grid and whether the capture was noise; a noise capture
    /// yields a grid entirely at the floor without running any transform.
    pub fn build(&mut self, samples: &[Sample]) -> Result<(Spectrogram, bool), SpectrogramError> {
        if samples.is_empty() {
            return Err(SpectrogramError::EmptyWindow);
        }

        let resampled = resize_nearest(samples, self.working_len);
        let normalized = match self.gate.normalize(&resampled) {
            Some(normalized) => normalized,
            None => {
                return Ok((
                    Grid::filled(self.time_bins, self.freq_bins, self.floor_threshold),
                    true,
                ))
            }
        };

        let frame_len = self.frame.len();
        let mut spectrogram = Grid::filled(self.time_bins, self.freq_bins, self.floor_threshold);
        let mut clipped = 0usize;
        let mut lowest = 0.0f64;

        for bin in 0..self.time_bins {
            let start = bin * frame_len;
            for (j, slot) in self.frame.iter_mut().enumerate() {
                *slot = match normalized.get(start + j) {
                    Some(&sample) => Complex64::new(self.window[j] * sample as f64, 0.0),
                    None => Complex64::new(0.0, 0.0),
                };
            }

            fft::forward(&mut self.frame)?;

            let (frame_clipped, frame_lowest) =
                shifted_log_levels(&self.frame, &mut self.levels, self.floor_threshold);
            clipped += frame_clipped;
            lowest = lowest.min(frame_lowest);

            resize_nearest_into(&self.levels, spectrogram.row_mut(bin));
        }

        if clipped > 0 {
            warn!(
                "Clipped {} negative log-magnitude values to 0 (lowest {:.2})",
                clipped, lowest
            );
        }

        Ok((spectrogram, false))
    }

    pub fn time_bins(&self) -> usize {
        self.time_bins
    }

    pub fn freq_bins(&self) -> usize {
        self.freq_bins
    }

    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    pub fn gate(&self) -> &NoiseGate {
        &self.gate
    }

    pub fn window(&self) -> &[f64] {
        &self.window
    }
}
