/// Two-word spoken command detector
///
/// Learns a "light" and a "dark" utterance from the first two accepted
/// captures, then drives a binary output from every later capture using
/// spectrogram pooling and a squared-error nearest-reference decision.

pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod fft;
pub mod grid;
pub mod hal;
pub mod pooling;
pub mod session;
pub mod sinks;
pub mod sources;
pub mod spectrogram;

// Re-export main types
pub use acquisition::{Acquisition, SampleWindow};
pub use classifier::{Classifier, ClassifierError, Decision, PooledGrid, ReferenceModel, Word};
pub use config::{BlockSize, ConfigError, DetectorConfig};
pub use diagnostics::{DiagnosticWriter, TrainingDump};
pub use fft::FftError;
pub use grid::Grid;
pub use hal::{OutputLevel, OutputSink, Sample, SampleSource, SourceError, Status, MID_SCALE};
pub use pooling::PoolError;
pub use session::{CycleOutcome, DetectionSession, DiscardReason, SessionError, SessionStats, TrainingStage};
pub use sinks::TracingPin;
pub use sources::{VecSource, WavSource};
pub use spectrogram::{NoiseGate, Spectrogram, SpectrogramBuilder, SpectrogramError};

#[cfg(feature = "microphone")]
pub use sources::MicrophoneSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
