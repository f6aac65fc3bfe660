/// Detection session
///
/// Sequences acquisition -> spectrogram -> pooling -> classification ->
/// output once per cycle. The first two accepted captures become the light
/// and dark references; every later capture is classified against them.

use crate::acquisition::Acquisition;
use crate::classifier::{Classifier, ClassifierError, Decision, ReferenceModel, Word};
use crate::config::{ConfigError, DetectorConfig};
use crate::diagnostics::{DiagnosticWriter, TrainingDump};
use crate::hal::{OutputLevel, OutputSink, Sample, SampleSource, SourceError, Status};
use crate::spectrogram::{NoiseGate, SpectrogramBuilder, SpectrogramError};
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Spectrogram error: {0}")]
    Spectrogram(#[from] SpectrogramError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Sample source error: {0}")]
    Source(#[from] SourceError),
}

/// Training progress; strictly linear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStage {
    AwaitingLightReference,
    AwaitingDarkReference,
    Detecting,
}

/// Why a cycle was dropped without changing session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    ShortCapture { len: usize, min: usize },
    Noise,
}

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Discarded(DiscardReason),
    Trained(Word),
    Detected(Decision),
}

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u64,
    pub discarded: u64,
    pub light: u64,
    pub dark: u64,
    pub undetermined: u64,
}

/// Detection session; owns the reference model and the pipeline buffers
pub struct DetectionSession<S, O> {
    config: DetectorConfig,
    acquisition: Acquisition,
    builder: SpectrogramBuilder,
    classifier: Classifier,
    gate: NoiseGate,
    min_word_len: usize,
    references: ReferenceModel,
    stage: TrainingStage,
    output: OutputLevel,
    stats: SessionStats,
    source: S,
    sink: O,
    diagnostics: Option<DiagnosticWriter<Box<dyn Write + Send>>>,
}

impl<S: SampleSource, O: OutputSink> DetectionSession<S, O> {
    /// Create a session; fails on any configuration error
    pub fn new(config: DetectorConfig, source: S, sink: O) -> Result<Self, SessionError> {
        config.validate()?;

        info!("Initializing detection session");
        info!(
            "Capture: {} samples, {}us spacing, trigger {}",
            config.capture_len, config.inter_sample_delay_us, config.trigger_threshold
        );
        info!(
            "Spectrogram: {}x{} bins, floor {}",
            config.time_bins, config.freq_bins, config.floor_threshold
        );

        let acquisition = Acquisition::new(
            config.capture_len,
            config.inter_sample_delay(),
            config.trigger_threshold,
        );
        let mut builder = SpectrogramBuilder::from_config(&config)?;
        let classifier = Classifier::from_config(&config);

        // Seed both references from a zero capture so their shapes exist before training
        let (seed, _) = builder.build(&vec![0; config.capture_len])?;
        let seed = classifier.reduce(&seed)?;
        let references = ReferenceModel::new(seed.clone(), seed);

        Ok(Self {
            gate: config.noise_gate(),
            min_word_len: config.min_word_len(),
            config,
            acquisition,
            builder,
            classifier,
            references,
            stage: TrainingStage::AwaitingLightReference,
            output: OutputLevel::Low,
            stats: SessionStats::default(),
            source,
            sink,
            diagnostics: None,
        })
    }

    /// Dump every training capture to `out`
    pub fn with_diagnostics(mut self, out: Box<dyn Write + Send>) -> Self {
        self.diagnostics = Some(DiagnosticWriter::new(out));
        self
    }

    /// Run cycles until the sample source fails; an exhausted source ends the loop cleanly
    pub fn run(&mut self) -> Result<(), SessionError> {
        info!("Detection loop running; first two words train light and dark");
        loop {
            match self.run_cycle() {
                Ok(_) => {}
                Err(SessionError::Source(SourceError::Exhausted)) => {
                    info!("Sample source exhausted after {} cycles", self.stats.cycles);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Capture one window and process it
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, SessionError> {
        let window = self.acquisition.capture_window(&mut self.source, &mut self.sink)?;
        self.process_window(&window)
    }

    /// Everything after acquisition: reject, train or classify
    pub fn process_window(&mut self, window: &[Sample]) -> Result<CycleOutcome, SessionError> {
        self.stats.cycles += 1;

        // An empty window is always short, even with a zero minimum
        let min = self.min_word_len.max(1);
        if window.len() < min {
            debug!("Short capture: {} < {} samples", window.len(), min);
            return Ok(self.discard(DiscardReason::ShortCapture {
                len: window.len(),
                min,
            }));
        }

        match self.stage {
            TrainingStage::AwaitingLightReference => self.train(Word::Light, window),
            TrainingStage::AwaitingDarkReference => self.train(Word::Dark, window),
            TrainingStage::Detecting => self.detect(window),
        }
    }

    fn train(&mut self, word: Word, window: &[Sample]) -> Result<CycleOutcome, SessionError> {
        if self.gate.is_noise(window) {
            debug!("Rejected {} training capture as noise", word);
            return Ok(self.discard(DiscardReason::Noise));
        }

        let (spectrogram, is_noise) = self.builder.build(window)?;
        if is_noise {
            warn!("Resampled {} training capture failed the noise gate; storing floor reference", word);
        }
        let reduction = self.classifier.build_reference(&spectrogram)?;

        if let Some(diagnostics) = self.diagnostics.as_mut() {
            let word_label = word.to_string();
            let dump = TrainingDump {
                word: &word_label,
                samples: window,
                spectrogram: &spectrogram,
                average_pool: &reduction.average_pool,
                reduced: &reduction.reduced,
            };
            if let Err(e) = diagnostics.write_training(&dump) {
                warn!("Failed to write {} diagnostics: {}", word, e);
            }
        }

        self.references.set(word, reduction.reduced);
        match word {
            Word::Light => {
                self.stage = TrainingStage::AwaitingDarkReference;
                self.output = OutputLevel::High;
                self.sink.signal(Status::TrainedLight);
            }
            Word::Dark => {
                self.stage = TrainingStage::Detecting;
                self.output = OutputLevel::Low;
                self.sink.signal(Status::TrainedDark);
            }
        }

        info!("Trained {} reference from {} samples", word, window.len());
        Ok(CycleOutcome::Trained(word))
    }

    fn detect(&mut self, window: &[Sample]) -> Result<CycleOutcome, SessionError> {
        let (spectrogram, is_noise) = self.builder.build(window)?;
        if is_noise {
            debug!("Rejected capture as noise");
            return Ok(self.discard(DiscardReason::Noise));
        }

        let decision = self.classifier.classify(&spectrogram, &self.references)?;
        match decision {
            Decision::Light => {
                self.stats.light += 1;
                self.output = OutputLevel::High;
                self.sink.set_high();
            }
            Decision::Dark => {
                self.stats.dark += 1;
                self.output = OutputLevel::Low;
                self.sink.set_low();
            }
            Decision::Undetermined => {
                self.stats.undetermined += 1;
                self.sink.signal(Status::NoiseRejected);
            }
        }

        info!("Detected {:?}", decision);
        Ok(CycleOutcome::Detected(decision))
    }

    fn discard(&mut self, reason: DiscardReason) -> CycleOutcome {
        self.stats.discarded += 1;
        let status = match reason {
            DiscardReason::ShortCapture { .. } => Status::ShortCapture,
            DiscardReason::Noise => Status::NoiseRejected,
        };
        self.sink.signal(status);
        CycleOutcome::Discarded(reason)
    }

    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    pub fn references(&self) -> &ReferenceModel {
        &self.references
    }

    pub fn output_level(&self) -> OutputLevel {
        self.output
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
