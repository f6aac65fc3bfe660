/// WAV replay source
///
/// Decodes the first channel of a WAV file up front and serves it one sample
/// per read. No pacing: the acquisition delay is the only clock.

use super::{offset_binary_from_float, offset_binary_from_int};
use crate::hal::{Sample, SampleSource, SourceError};
use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;
use tracing::info;

pub struct WavSource {
    samples: Vec<Sample>,
    position: usize,
    sample_rate: u32,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .map_err(|e| SourceError::Device(format!("{}: {}", path.display(), e)))?;
        let source = Self::from_reader(reader)?;
        info!(
            "Replaying {} ({} samples at {} Hz)",
            path.display(),
            source.samples.len(),
            source.sample_rate
        );
        Ok(source)
    }

    pub fn from_reader<R: Read>(mut reader: WavReader<R>) -> Result<Self, SourceError> {
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let decoded: Result<Vec<Sample>, hound::Error> = match spec.sample_format {
            SampleFormat::Int => reader
                .samples::<i32>()
                .step_by(channels)
                .map(|s| s.map(|v| offset_binary_from_int(v, spec.bits_per_sample)))
                .collect(),
            SampleFormat::Float => reader
                .samples::<f32>()
                .step_by(channels)
                .map(|s| s.map(offset_binary_from_float))
                .collect(),
        };

        Ok(Self {
            samples: decoded.map_err(|e| SourceError::Device(e.to_string()))?,
            position: 0,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for WavSource {
    fn read(&mut self) -> Result<Sample, SourceError> {
        let sample = *self.samples.get(self.position).ok_or(SourceError::Exhausted)?;
        self.position += 1;
        Ok(sample)
    }
}
