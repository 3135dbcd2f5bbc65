use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use proctor_events::{join_with_timeout, StopToken};

use crate::{downmix, AudioChunk, ChunkSource, Rechunker, StreamResampler};

/// How long to wait for the device to open before giving up.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval of the thread that keeps the cpal stream alive.
const KEEPALIVE_POLL: Duration = Duration::from_millis(50);

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Microphone input as fixed-size mono 16-bit chunks.
///
/// cpal streams are not `Send` on every platform, so the stream lives on its
/// own thread and forwards converted buffers through a channel.
pub struct MicrophoneSource {
    receiver: Receiver<Vec<i16>>,
    /// First error cpal reported for the running stream.
    errors: Receiver<String>,
    rechunker: Rechunker,
    sample_rate: u32,
    stop: StopToken,
    handle: Option<JoinHandle<()>>,
}

impl MicrophoneSource {
    /// Open `device_name` (or the default input) resampled to `sample_rate`.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        chunk_size: usize,
    ) -> crate::Result<Self> {
        let rechunker = Rechunker::new(chunk_size, sample_rate)?;
        let (tx, rx) = crossbeam_channel::unbounded::<Vec<i16>>();
        let (err_tx, err_rx) = crossbeam_channel::bounded::<String>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<crate::Result<()>>(1);

        let stop = StopToken::new();
        let thread_stop = stop.clone();
        let device_name = device_name.map(str::to_string);

        let handle = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), sample_rate, tx, err_tx) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !thread_stop.is_cancelled() {
                    std::thread::sleep(KEEPALIVE_POLL);
                }
                drop(stream);
                tracing::debug!("microphone stream closed");
            })
            .map_err(|e| crate::AudioError::StreamError(format!("failed to spawn: {e}")))?;

        let opened = ready_rx.recv_timeout(OPEN_TIMEOUT).unwrap_or_else(|_| {
            Err(crate::AudioError::StreamError(
                "timed out opening microphone".to_string(),
            ))
        });
        if let Err(e) = opened {
            stop.cancel();
            join_with_timeout(handle, CLOSE_TIMEOUT, "mic-capture");
            return Err(e);
        }

        tracing::info!(sample_rate, chunk_size, "microphone opened");
        Ok(Self {
            receiver: rx,
            errors: err_rx,
            rechunker,
            sample_rate,
            stop,
            handle: Some(handle),
        })
    }
}

impl ChunkSource for MicrophoneSource {
    fn next_chunk(&mut self, timeout: Duration) -> crate::Result<Option<AudioChunk>> {
        if let Ok(message) = self.errors.try_recv() {
            return Err(crate::AudioError::StreamError(message));
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(chunk) = self.rechunker.pop() {
                return Ok(Some(chunk));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(samples) => self.rechunker.push(&samples),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(crate::AudioError::Disconnected)
                }
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            join_with_timeout(handle, CLOSE_TIMEOUT, "mic-capture");
        }
    }
}

fn get_device(host: &cpal::Host, device_name: Option<&str>) -> crate::Result<Device> {
    match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .ok_or_else(|| crate::AudioError::DeviceNotFound(name.to_string())),
        None => host
            .default_input_device()
            .ok_or_else(|| crate::AudioError::DeviceNotFound("default".to_string())),
    }
}

fn open_stream(
    device_name: Option<&str>,
    target_rate: u32,
    tx: Sender<Vec<i16>>,
    errors: Sender<String>,
) -> crate::Result<Stream> {
    let host = cpal::default_host();
    let device = get_device(&host, device_name)?;
    let config = device.default_input_config().map_err(|e| {
        crate::AudioError::StreamError(format!("failed to get default config: {e}"))
    })?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "opening input stream"
    );
    let mut resampler = StreamResampler::new(sample_rate, target_rate)?;

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _| {
                let _ = tx.send(convert(data, channels, &mut resampler));
            },
            forward_stream_error(errors),
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _| {
                let float: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                let _ = tx.send(convert(&float, channels, &mut resampler));
            },
            forward_stream_error(errors),
            None,
        )?,
        format => {
            return Err(crate::AudioError::StreamError(format!(
                "unsupported sample format: {format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| crate::AudioError::StreamError(format!("failed to start stream: {e}")))?;

    Ok(stream)
}

/// cpal error callback: log, and keep the first error for the consumer.
fn forward_stream_error(errors: Sender<String>) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        tracing::error!("audio stream error: {}", err);
        let _ = errors.try_send(err.to_string());
    }
}

/// Downmix, resample and quantize one device buffer.
fn convert(data: &[f32], channels: usize, resampler: &mut StreamResampler) -> Vec<i16> {
    resampler
        .process(&downmix(data, channels))
        .into_iter()
        .map(to_pcm16)
        .collect()
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_clamps() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn test_convert_stereo_at_native_rate() {
        let mut resampler = StreamResampler::new(16000, 16000).unwrap();
        let out = convert(&[0.5, 0.5, 1.0, 0.0], 2, &mut resampler);
        assert_eq!(out, vec![to_pcm16(0.5), to_pcm16(0.5)]);
    }

    #[test]
    fn test_convert_keeps_resampler_state_between_callbacks() {
        let mut resampler = StreamResampler::new(48000, 16000).unwrap();
        let first = convert(&[0.5; 200], 2, &mut resampler);
        assert!(first.is_empty());

        let second = convert(&[0.5; 2000], 2, &mut resampler);
        assert!(!second.is_empty());
    }

    #[test]
    fn test_device_error_ends_the_source() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (err_tx, err_rx) = crossbeam_channel::bounded(1);
        let mut source = MicrophoneSource {
            receiver: rx,
            errors: err_rx,
            rechunker: Rechunker::new(4, 16000).unwrap(),
            sample_rate: 16000,
            stop: StopToken::new(),
            handle: None,
        };

        tx.send(vec![1, 2, 3, 4]).unwrap();
        assert!(source.next_chunk(Duration::ZERO).unwrap().is_some());

        let mut on_error = forward_stream_error(err_tx);
        on_error(cpal::StreamError::DeviceNotAvailable);
        on_error(cpal::StreamError::DeviceNotAvailable);
        assert!(matches!(
            source.next_chunk(Duration::from_millis(10)),
            Err(crate::AudioError::StreamError(_))
        ));
        assert!(source.next_chunk(Duration::ZERO).unwrap().is_none());
    }
}
