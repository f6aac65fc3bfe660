/// Host-side sample sources
///
/// Stand-ins for the ADC channel: scripted samples, WAV replay and, with the
/// `microphone` feature, a live input device.

#[cfg(feature = "microphone")]
pub mod microphone;
pub mod wav;

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneSource;
pub use wav::WavSource;

use crate::hal::{Sample, SampleSource, SourceError, MID_SCALE};

/// Convert a signed PCM value of `bits` resolution to an offset-binary sample
pub fn offset_binary_from_int(value: i32, bits: u16) -> Sample {
    let value = if bits > 16 {
        value >> (bits - 16)
    } else {
        value << (16 - bits)
    };
    (value + MID_SCALE as i32).clamp(0, Sample::MAX as i32) as Sample
}

/// Convert a float sample in [-1, 1] to an offset-binary sample
pub fn offset_binary_from_float(value: f32) -> Sample {
    let scaled = value.clamp(-1.0, 1.0) * i16::MAX as f32 + MID_SCALE as f32;
    scaled.round().clamp(0.0, Sample::MAX as f32) as Sample
}

/// Scripted in-memory source; exhausted after the last sample
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    samples: Vec<Sample>,
    position: usize,
}

impl VecSource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples, position: 0 }
    }

    /// Samples not yet read
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleSource for VecSource {
    fn read(&mut self) -> Result<Sample, SourceError> {
        let sample = *self.samples.get(self.position).ok_or(SourceError::Exhausted)?;
        self.position += 1;
        Ok(sample)
    }
}
