/// Live microphone source
///
/// The cpal callback converts the first channel to offset-binary samples,
/// keeps every n-th frame to approach the target rate and pushes them into a
/// lock-free ring. `read` pops one sample, waiting while the ring is empty.

use super::{offset_binary_from_float, offset_binary_from_int};
use crate::hal::{Sample, SampleSource, SourceError};
use cache_padded::CachePadded;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

type RingBuffer = HeapRb<Sample>;
type RingProducer = <RingBuffer as Split>::Prod;
type RingConsumer = <RingBuffer as Split>::Cons;

/// Ring capacity: one second at the default 4 kHz target rate
pub const RING_CAPACITY: usize = 4000;

const EMPTY_POLL: Duration = Duration::from_micros(100);

/// Shared between the audio callback and the reader
struct Shared {
    dropped: CachePadded<AtomicUsize>,
    failed: AtomicBool,
}

/// Feeds one interleaved buffer into the ring
struct Decimator {
    producer: RingProducer,
    channels: usize,
    step: usize,
    phase: usize,
    shared: Arc<Shared>,
}

impl Decimator {
    fn push<T: Copy>(&mut self, data: &[T], convert: impl Fn(T) -> Sample) {
        for frame in data.chunks(self.channels) {
            if self.phase == 0 && self.producer.try_push(convert(frame[0])).is_err() {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
            self.phase = (self.phase + 1) % self.step;
        }
    }
}

pub struct MicrophoneSource {
    consumer: RingConsumer,
    shared: Arc<Shared>,
    sample_rate: u32,
    _stream: Stream,
}

impl MicrophoneSource {
    /// Open the default input device, decimating towards `target_rate` Hz
    pub fn open(target_rate: u32) -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SourceError::Device("No input device available".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| SourceError::Device(format!("Failed to get input configuration: {}", e)))?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let device_rate = config.sample_rate.0;
        let step = (device_rate / target_rate.max(1)).max(1) as usize;

        info!(
            "Input device: {} ({} Hz, {} channels, {:?}), keeping 1 of {} frames",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            device_rate,
            config.channels,
            sample_format,
            step
        );

        let (producer, consumer) = RingBuffer::new(RING_CAPACITY).split();
        let shared = Arc::new(Shared {
            dropped: CachePadded::new(AtomicUsize::new(0)),
            failed: AtomicBool::new(false),
        });

        let mut decimator = Decimator {
            producer,
            channels: config.channels.max(1) as usize,
            step,
            phase: 0,
            shared: shared.clone(),
        };
        let on_error = {
            let shared = shared.clone();
            move |err: cpal::StreamError| {
                error!("Audio stream error: {}", err);
                shared.failed.store(true, Ordering::Relaxed);
            }
        };

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    decimator.push(data, offset_binary_from_float)
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    decimator.push(data, |v| offset_binary_from_int(v as i32, 16))
                },
                on_error,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| decimator.push(data, |v| v),
                on_error,
                None,
            ),
            other => {
                return Err(SourceError::Device(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| SourceError::Device(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| SourceError::Device(format!("Failed to start input stream: {}", e)))?;

        Ok(Self {
            consumer,
            shared,
            sample_rate: device_rate / step as u32,
            _stream: stream,
        })
    }

    /// Effective rate after decimation
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples lost to ring overruns so far
    pub fn dropped(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl SampleSource for MicrophoneSource {
    fn read(&mut self) -> Result<Sample, SourceError> {
        loop {
            if let Some(sample) = self.consumer.try_pop() {
                return Ok(sample);
            }
            if self.shared.failed.load(Ordering::Relaxed) {
                warn!("Input stream failed after {} dropped samples", self.dropped());
                return Err(SourceError::Device("Input stream failed".to_string()));
            }
            std::thread::sleep(EMPTY_POLL);
        }
    }
}
