/// Word detection service binary
///
/// Trains on the first two utterances it hears, then switches the output
/// pin on "light" and off "dark".

use anyhow::{Context, Result};
use detectword::{DetectionSession, DetectorConfig, SampleSource, TracingPin, WavSource};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the diagnostic dump
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("detectword=debug".parse().unwrap()),
        )
        .init();

    info!("Starting DetectWord service v{}", detectword::VERSION);

    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // The session blocks on the sample source; microphone streams are not Send
    let worker = tokio::task::spawn_blocking(move || run_detector(config));

    tokio::select! {
        result = worker => match result {
            Ok(Ok(())) => info!("DetectWord service stopped"),
            Ok(Err(e)) => {
                error!("Detector failed: {:#}", e);
                std::process::exit(1);
            }
            Err(e) => {
                error!("Detector task panicked: {}", e);
                std::process::exit(1);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            std::process::exit(0);
        }
    }
}

fn run_detector(mut config: DetectorConfig) -> Result<()> {
    let source = open_source(&mut config)?;
    let diagnostics = config.diagnostics;

    let mut session = DetectionSession::new(config, source, TracingPin::new("output"))
        .context("Failed to create detection session")?;
    if diagnostics {
        session = session.with_diagnostics(Box::new(std::io::stdout()));
    }

    session.run().context("Detection loop failed")?;

    let stats = session.stats();
    info!(
        "{} cycles: {} discarded, {} light, {} dark, {} undetermined",
        stats.cycles, stats.discarded, stats.light, stats.dark, stats.undetermined
    );
    Ok(())
}

/// WAV replay when `DETECTWORD_WAV` is set, otherwise the default microphone
fn open_source(config: &mut DetectorConfig) -> Result<Box<dyn SampleSource>> {
    if let Ok(path) = std::env::var("DETECTWORD_WAV") {
        let source = WavSource::open(&path).with_context(|| format!("Failed to open {}", path))?;
        return Ok(Box::new(source));
    }

    open_microphone(config)
}

#[cfg(feature = "microphone")]
fn open_microphone(config: &mut DetectorConfig) -> Result<Box<dyn SampleSource>> {
    let target_rate = 1_000_000 / config.inter_sample_delay_us.max(1);
    let source = detectword::MicrophoneSource::open(target_rate as u32)
        .context("Failed to open microphone")?;

    // The ring already paces reads at the device rate
    config.inter_sample_delay_us = 0;
    info!("Listening at {} Hz", source.sample_rate());
    Ok(Box::new(source))
}

#[cfg(not(feature = "microphone"))]
fn open_microphone(_config: &mut DetectorConfig) -> Result<Box<dyn SampleSource>> {
    anyhow::bail!("No sample source: set DETECTWORD_WAV or build with the `microphone` feature")
}

/// Load configuration from `DETECTWORD_CONFIG` or fall back to defaults
fn load_config() -> Result<DetectorConfig> {
    let config = match std::env::var("DETECTWORD_CONFIG") {
        Ok(path) => DetectorConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => {
            info!("DETECTWORD_CONFIG not set, using defaults");
            DetectorConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}
