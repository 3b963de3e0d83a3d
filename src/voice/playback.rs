//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioSink, StopOnDrop};
use crate::{Error, Result};

/// Sample rate assumed when a payload carries none (common TTS output)
const DEFAULT_PLAYBACK_RATE: u32 = 24000;

/// Plays audio to the default output device
///
/// Holds a cpal device; build it on the thread that plays.
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let rate = SampleRate(sample_rate);
        let supports = |channels: u16| {
            device.supported_output_configs().ok().and_then(|mut configs| {
                configs.find(|c| {
                    c.channels() == channels
                        && c.min_sample_rate() <= rate
                        && c.max_sample_rate() >= rate
                })
            })
        };

        // Fallback: try stereo
        let supported_config = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config.with_sample_rate(rate).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play mono f32 samples, blocking until they finish or `stop` is set
    ///
    /// Gives up 500 ms after the samples' own duration if the device never
    /// reports the end.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails
    pub fn play_blocking(&self, samples: Vec<f32>, stop: &AtomicBool) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_rate = self.config.sample_rate.0;
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            });
                            frame.fill(sample);
                            if pos < samples.len() {
                                pos += 1;
                            }
                        }
                        position.store(pos, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Playback(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate);
        let deadline = Duration::from_millis(duration_ms + 500);

        if wait_until_done(&finished, stop, deadline) {
            drop(stream);
            tracing::debug!(samples = sample_count, "playback stopped");
            return Ok(());
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Poll until `finished` or `stop` is set, or `deadline` passes
///
/// Returns `true` when stopped early.
fn wait_until_done(finished: &AtomicBool, stop: &AtomicBool, deadline: Duration) -> bool {
    let start = Instant::now();

    while !finished.load(Ordering::Relaxed) && start.elapsed() < deadline {
        if stop.load(Ordering::Relaxed) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    stop.load(Ordering::Relaxed)
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// # Errors
///
/// Returns error if the payload is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                sample_rate.get_or_insert(frame.sample_rate as u32);

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Playback("audio payload contained no MP3 frames".to_string()));
    }

    Ok((samples, sample_rate.unwrap_or(DEFAULT_PLAYBACK_RATE)))
}

/// Plays MP3 payloads on the default output device
#[derive(Debug, Default)]
pub struct SpeakerSink;

impl SpeakerSink {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioSink for SpeakerSink {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        // Timeouts and cancelled turns drop this future; the speaker goes quiet
        let stop = StopOnDrop::default();
        let flag = Arc::clone(&stop.0);

        tokio::task::spawn_blocking(move || {
            let (samples, sample_rate) = decode_mp3(&audio)?;
            let playback = AudioPlayback::new(sample_rate)
                .map_err(|e| Error::Playback(e.to_string()))?;
            playback.play_blocking(samples, &flag)
        })
        .await
        .map_err(|e| Error::Playback(format!("playback task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "speaker"
    }
}

/// Discards audio (API-only deployments)
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        tracing::debug!(bytes = audio.len(), "discarding audio");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_stop_guard_ends_wait_early() {
        let finished = Arc::new(AtomicBool::new(false));
        let guard = StopOnDrop::default();
        let flag = Arc::clone(&guard.0);

        let waiter = {
            let finished = Arc::clone(&finished);
            std::thread::spawn(move || {
                let start = Instant::now();
                let stopped = wait_until_done(&finished, &flag, Duration::from_secs(30));
                (stopped, start.elapsed())
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        drop(guard);

        let (stopped, elapsed) = waiter.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn finished_playback_is_not_a_stop() {
        let finished = AtomicBool::new(true);
        let stop = AtomicBool::new(false);
        assert!(!wait_until_done(&finished, &stop, Duration::from_secs(30)));
    }

    #[test]
    fn garbage_is_not_mp3() {
        assert!(decode_mp3(b"definitely not audio").is_err());
        assert!(decode_mp3(&[]).is_err());
    }
}
