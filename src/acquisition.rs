/// Signal acquisition and trigger
///
/// Blocks until the input crosses the trigger threshold, fills a fixed
/// length window, then trims the trailing silence.

use crate::hal::{OutputSink, Sample, SampleSource, SourceError, Status};
use std::time::Duration;
use tracing::{debug, trace};

/// One candidate utterance, trimmed; never longer than the capture length
pub type SampleWindow = Vec<Sample>;

/// Trigger-driven capture parameters
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Samples per capture
    pub length: usize,

    /// Delay after each read while capturing
    pub inter_sample_delay: Duration,

    /// A read strictly above this level starts the capture
    pub threshold: Sample,
}

impl Acquisition {
    pub fn new(length: usize, inter_sample_delay: Duration, threshold: Sample) -> Self {
        Self {
            length,
            inter_sample_delay,
            threshold,
        }
    }

    /// Capture one window.
    ///
    /// Waits without timeout for the trigger. The first element is the last
    /// sub-threshold read before the trigger (zero if the very first read
    /// triggered); the triggering read itself is not kept.
    pub fn capture_window<S, O>(&self, source: &mut S, sink: &mut O) -> Result<SampleWindow, SourceError>
    where
        S: SampleSource + ?Sized,
        O: OutputSink + ?Sized,
    {
        let mut window = vec![0; self.length];
        if self.length == 0 {
            return Ok(window);
        }

        sink.signal(Status::AwaitingTrigger);
        loop {
            let value = source.read()?;
            if value > self.threshold {
                trace!("Trigger crossed at {}", value);
                break;
            }
            window[0] = value;
        }
        sink.signal(Status::Capturing);

        for slot in window.iter_mut().skip(1) {
            *slot = source.read()?;
            if !self.inter_sample_delay.is_zero() {
                std::thread::sleep(self.inter_sample_delay);
            }
        }

        let end = trailing_sound_end(&window, self.threshold);
        window.truncate(end);
        debug!("Captured {} of {} samples", window.len(), self.length);

        Ok(window)
    }
}

/// End (exclusive) of the sound in `window`: the index of the last sample at
/// or above `threshold`. With no such sample only the final sample is dropped.
pub fn trailing_sound_end(window: &[Sample], threshold: Sample) -> usize {
    window
        .iter()
        .rposition(|&s| s >= threshold)
        .unwrap_or_else(|| window.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockOutputSink, MockSampleSource};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn scripted_source(samples: Vec<Sample>) -> MockSampleSource {
        let mut source = MockSampleSource::new();
        let mut samples = samples.into_iter();
        source
            .expect_read()
            .returning(move || samples.next().ok_or(SourceError::Exhausted));
        source
    }

    fn quiet_sink() -> MockOutputSink {
        let mut sink = MockOutputSink::new();
        sink.expect_signal().return_const(());
        sink
    }

    #[test]
    fn test_trailing_sound_end() {
        assert_eq!(trailing_sound_end(&[10, 50, 60, 10, 10], 50), 2);
        assert_eq!(trailing_sound_end(&[10, 50, 10, 10, 70], 50), 4);
        // Nothing above threshold: only the last sample is dropped
        assert_eq!(trailing_sound_end(&[10, 10, 10], 50), 2);
        assert_eq!(trailing_sound_end(&[], 50), 0);
    }

    #[test]
    fn test_pre_trigger_sample_is_kept() {
        let acquisition = Acquisition::new(6, Duration::ZERO, 100);
        // 7 and 9 are sub-threshold, 150 triggers and is dropped
        let mut source = scripted_source(vec![7, 9, 150, 200, 120, 300, 20, 10]);
        let mut sink = quiet_sink();

        let window = acquisition.capture_window(&mut source, &mut sink).unwrap();

        // [9, 200, 120, 300, 20, 10] trimmed before the last loud sample
        assert_eq!(window, vec![9, 200, 120]);
    }

    #[test]
    fn test_immediate_trigger_leaves_zero_first_sample() {
        let acquisition = Acquisition::new(4, Duration::ZERO, 100);
        let mut source = scripted_source(vec![500, 400, 300, 200]);
        let mut sink = quiet_sink();

        let window = acquisition.capture_window(&mut source, &mut sink).unwrap();

        assert_eq!(window, vec![0, 400, 300]);
    }

    #[test]
    fn test_status_sequence() {
        let acquisition = Acquisition::new(3, Duration::ZERO, 100);
        let mut source = scripted_source(vec![1, 2, 101, 102, 103]);

        let mut sink = MockOutputSink::new();
        let mut seq = Sequence::new();
        sink.expect_signal()
            .with(eq(Status::AwaitingTrigger))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_signal()
            .with(eq(Status::Capturing))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        acquisition.capture_window(&mut source, &mut sink).unwrap();
    }

    #[test]
    fn test_source_failure_propagates() {
        let acquisition = Acquisition::new(8, Duration::ZERO, 100);
        let mut source = scripted_source(vec![1, 2, 3]);
        let mut sink = quiet_sink();

        let result = acquisition.capture_window(&mut source, &mut sink);
        assert_eq!(result, Err(SourceError::Exhausted));
    }

    #[test]
    fn test_window_never_exceeds_length() {
        let acquisition = Acquisition::new(16, Duration::ZERO, 100);
        let mut source = scripted_source(vec![250; 64]);
        let mut sink = quiet_sink();

        let window = acquisition.capture_window(&mut source, &mut sink).unwrap();
        assert_eq!(window.len(), 15);
    }
}
