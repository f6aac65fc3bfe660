/// Integration tests for the word detector
///
/// Drives whole sessions with synthetic utterances: silence, two tones
/// trained as light and dark, and clipped short words.

use approx::assert_relative_eq;
use detectword::pooling::{pool_average, pool_peak};
use detectword::{
    fft, CycleOutcome, Decision, DetectionSession, DetectorConfig, DiscardReason, Grid,
    OutputLevel, OutputSink, Sample, SpectrogramBuilder, Status, TrainingStage, VecSource,
    WavSource, Word, MID_SCALE,
};
use num_complex::Complex64;

/// Output sink that remembers everything it was told
#[derive(Debug, Default)]
struct RecordingSink {
    level: OutputLevel,
    statuses: Vec<Status>,
}

impl OutputSink for RecordingSink {
    fn set_high(&mut self) {
        self.level = OutputLevel::High;
    }

    fn set_low(&mut self) {
        self.level = OutputLevel::Low;
    }

    fn signal(&mut self, status: Status) {
        self.statuses.push(status);
    }
}

fn test_config() -> DetectorConfig {
    DetectorConfig {
        inter_sample_delay_us: 0,
        ..Default::default()
    }
}

/// Sine burst around mid-scale
fn tone(period: f64, len: usize) -> Vec<Sample> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / period;
            (MID_SCALE as f64 + 0x7000 as f64 * phase.sin()) as Sample
        })
        .collect()
}

/// Utterance as the ADC sees it: quiet lead-in, the burst, quiet tail
fn utterance(burst: Vec<Sample>) -> Vec<Sample> {
    let mut stream = vec![MID_SCALE; 50];
    stream.extend(burst);
    stream.extend(vec![MID_SCALE; 2000]);
    stream
}

fn low_word() -> Vec<Sample> {
    utterance(tone(64.0, 1024))
}

fn high_word() -> Vec<Sample> {
    utterance(tone(4.0, 1024))
}

#[test]
fn test_silence_is_noise_at_floor() {
    let config = test_config();
    let mut builder = SpectrogramBuilder::from_config(&config).unwrap();

    let (spectrogram, is_noise) = builder.build(&vec![MID_SCALE; 1024]).unwrap();

    assert!(is_noise);
    assert_eq!(spectrogram.shape(), (64, 64));
    assert!(spectrogram.cells().iter().all(|&v| v == config.floor_threshold));
}

#[test]
fn test_silence_never_triggers() {
    let source = VecSource::new(vec![MID_SCALE; 5000]);
    let mut session = DetectionSession::new(test_config(), source, RecordingSink::default()).unwrap();

    session.run().unwrap();

    assert_eq!(session.stats().cycles, 0);
    assert_eq!(session.stage(), TrainingStage::AwaitingLightReference);
    assert_eq!(session.sink().statuses, vec![Status::AwaitingTrigger]);
}

#[test]
fn test_train_light_and_dark_then_detect() {
    let mut stream = low_word();
    stream.extend(high_word());
    stream.extend(low_word());
    stream.extend(high_word());

    let mut session =
        DetectionSession::new(test_config(), VecSource::new(stream), RecordingSink::default()).unwrap();

    assert_eq!(session.run_cycle().unwrap(), CycleOutcome::Trained(Word::Light));
    assert_eq!(session.sink().statuses.last(), Some(&Status::TrainedLight));
    assert_eq!(session.output_level(), OutputLevel::High);

    assert_eq!(session.run_cycle().unwrap(), CycleOutcome::Trained(Word::Dark));
    assert_eq!(session.stage(), TrainingStage::Detecting);
    assert_eq!(session.output_level(), OutputLevel::Low);

    assert_eq!(session.run_cycle().unwrap(), CycleOutcome::Detected(Decision::Light));
    assert_eq!(session.sink().level, OutputLevel::High);

    assert_eq!(session.run_cycle().unwrap(), CycleOutcome::Detected(Decision::Dark));
    assert_eq!(session.sink().level, OutputLevel::Low);

    // Nothing left to trigger on
    assert!(session.run().is_ok());
    assert_eq!(session.stats().cycles, 4);
}

#[test]
fn test_detection_tolerates_variation() {
    let mut stream = low_word();
    stream.extend(high_word());
    stream.extend(utterance(tone(60.0, 1024)));
    stream.extend(utterance(tone(5.0, 1024)));

    let mut session =
        DetectionSession::new(test_config(), VecSource::new(stream), RecordingSink::default()).unwrap();
    session.run().unwrap();

    let stats = session.stats();
    assert_eq!((stats.light, stats.dark, stats.undetermined), (1, 1, 0));
}

#[test]
fn test_short_word_leaves_session_unchanged() {
    let mut stream = utterance(tone(64.0, 100));
    stream.extend(low_word());

    let mut session =
        DetectionSession::new(test_config(), VecSource::new(stream), RecordingSink::default()).unwrap();
    let references = session.references().clone();

    match session.run_cycle().unwrap() {
        CycleOutcome::Discarded(DiscardReason::ShortCapture { len, min }) => {
            assert!(len < min);
            assert_eq!(min, 204);
        }
        other => panic!("Expected short capture, got {:?}", other),
    }
    assert_eq!(session.stage(), TrainingStage::AwaitingLightReference);
    assert_eq!(session.references(), &references);
    assert!(session.sink().statuses.contains(&Status::ShortCapture));

    // The next full word still trains light
    assert_eq!(session.run_cycle().unwrap(), CycleOutcome::Trained(Word::Light));
}

#[test]
fn test_silent_window_rejected_while_detecting() {
    let mut session = DetectionSession::new(
        test_config(),
        VecSource::default(),
        RecordingSink::default(),
    )
    .unwrap();

    session.process_window(&tone(64.0, 1000)).unwrap();
    session.process_window(&tone(4.0, 1000)).unwrap();
    let level = session.output_level();

    let outcome = session.process_window(&vec![MID_SCALE; 1000]).unwrap();

    assert_eq!(outcome, CycleOutcome::Discarded(DiscardReason::Noise));
    assert_eq!(session.output_level(), level);
}

#[test]
fn test_wav_replay_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 4000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for sample in low_word().into_iter().chain(high_word()).chain(high_word()) {
        writer.write_sample((sample as i32 - MID_SCALE as i32) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let source = WavSource::open(&path).unwrap();
    let mut session = DetectionSession::new(test_config(), source, RecordingSink::default()).unwrap();
    session.run().unwrap();

    assert_eq!(session.stage(), TrainingStage::Detecting);
    assert_eq!(session.stats().dark, 1);
    assert_eq!(session.output_level(), OutputLevel::Low);
}

#[test]
fn test_fft_round_trip() {
    for n in [1usize, 2, 4, 8, 64, 256] {
        let input: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new((i as f64 * 0.7).sin(), (i as f64 * 1.3).cos()))
            .collect();

        let mut buffer = input.clone();
        fft::forward(&mut buffer).unwrap();
        fft::inverse(&mut buffer).unwrap();

        for (a, b) in buffer.iter().zip(&input) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-9);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_pooling_shape_law_on_spectrogram() {
    let mut builder = SpectrogramBuilder::from_config(&test_config()).unwrap();
    let (spectrogram, is_noise) = builder.build(&tone(16.0, 1024)).unwrap();
    assert!(!is_noise);
    assert!(spectrogram.cells().iter().all(|&v| v >= 50));

    for (v, h) in [(1, 1), (2, 4), (8, 8), (16, 2), (64, 64)] {
        let average: Grid<i32> = pool_average(&spectrogram, v, h).unwrap();
        let peak: Grid<i32> = pool_peak(&spectrogram, v, h).unwrap();

        assert_eq!(average.shape(), (64 / v, 64 / h));
        assert_eq!(peak.shape(), (64 / v, 64 / h));
        for (p, a) in peak.cells().iter().zip(average.cells()) {
            assert!(p >= a);
        }
    }
}
