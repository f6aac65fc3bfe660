/// Hardware boundary
///
/// The detector core talks to the outside world through two traits: a
/// sample source (an ADC channel, a replayed file) and a binary output sink
/// (a GPIO pin plus a status indicator).

use thiserror::Error;

/// Raw ADC sample, native 16-bit unsigned resolution
pub type Sample = u16;

/// Mid-scale value of an offset-binary sample (silence)
pub const MID_SCALE: Sample = 0x8000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Sample source exhausted")]
    Exhausted,

    #[error("Sample source device error: {0}")]
    Device(String),
}

/// Pull-style sample source.
///
/// `read` returns immediately with the latest sample; the caller controls
/// the spacing between reads.
#[cfg_attr(test, mockall::automock)]
pub trait SampleSource {
    fn read(&mut self) -> Result<Sample, SourceError>;
}

/// Status signals shown on the indicator (or, for training, the output pin)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Blocking until the input crosses the trigger threshold
    AwaitingTrigger,

    /// Trigger crossed, window being filled
    Capturing,

    /// Capture shorter than the minimum word length
    ShortCapture,

    /// Capture rejected by the noise gate or left undetermined
    NoiseRejected,

    /// Light reference stored; the output flashes and is left high
    TrainedLight,

    /// Dark reference stored; the output flashes and is left low
    TrainedDark,
}

/// Logical level of the controlled output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLevel {
    #[default]
    Low,
    High,
}

/// Fire-and-forget binary output with a status indicator
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink {
    fn set_high(&mut self);

    fn set_low(&mut self);

    fn signal(&mut self, status: Status);
}

impl<T: SampleSource + ?Sized> SampleSource for &mut T {
    fn read(&mut self) -> Result<Sample, SourceError> {
        (**self).read()
    }
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn read(&mut self) -> Result<Sample, SourceError> {
        (**self).read()
    }
}

impl<T: OutputSink + ?Sized> OutputSink for &mut T {
    fn set_high(&mut self) {
        (**self).set_high()
    }

    fn set_low(&mut self) {
        (**self).set_low()
    }

    fn signal(&mut self, status: Status) {
        (**self).signal(status)
    }
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn set_high(&mut self) {
        (**self).set_high()
    }

    fn set_low(&mut self) {
        (**self).set_low()
    }

    fn signal(&mut self, status: Status) {
        (**self).signal(status)
    }
}
