//! Real audio capture using CPAL (Cross-Platform Audio Library).
//!
//! The device is a push source: each CPAL data callback is chunked into
//! fixed-size frames and delivered to a [`FrameSink`]. The core cannot pause
//! the device; the mute gate on the sink side decides what is kept.

use crate::error::{IntervoxError, Result};
use crate::session::capture::FrameSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA error messages that occur during audio backend probing.
/// These are harmless but confusing to users.
///
/// # Safety
/// This modifies environment variables which is safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for GNOME/PipeWire environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

/// Check if a device name should be filtered out.
fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// Check if a device is a preferred device.
fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List all available audio input devices with filtering and recommendations.
///
/// # Returns
/// A vector of device names, with preferred devices marked with "\[recommended\]".
/// Filters out obviously unusable devices (surround channels, HDMI, etc.).
///
/// # Errors
/// Returns `IntervoxError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| IntervoxError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }

            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
///
/// This ensures we respect the desktop's audio device selection.
///
/// # Errors
/// Returns `IntervoxError::AudioDeviceNotFound` if no input device is
/// available.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| IntervoxError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: We ensure that the stream is only accessed from a single thread at
/// a time through the Mutex wrapper in CpalFrameSource. The stream methods
/// are called synchronously and don't cross thread boundaries unsafely.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Splits incoming callback data into fixed-size frames for the sink.
///
/// Samples that don't fill a whole frame are carried over to the next
/// callback, so frame boundaries are stable regardless of the device's
/// buffer size.
fn deliver_frames(carry: &mut Vec<i16>, data: &[i16], frame_samples: usize, sink: &dyn FrameSink) {
    carry.extend_from_slice(data);
    while carry.len() >= frame_samples {
        let frame: Vec<i16> = carry.drain(..frame_samples).collect();
        sink.on_frame(&frame);
    }
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn convert_to_mono_i16(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono: Vec<i16> = if channels <= 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        resample(&mono, source_rate, target_rate)
    }
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            if idx + 1 < samples.len() {
                let frac = src_pos - idx as f64;
                let a = samples[idx] as f64;
                let b = samples[idx + 1] as f64;
                (a + (b - a) * frac) as i16
            } else {
                samples[samples.len() - 1]
            }
        })
        .collect()
}

/// Microphone capture that pushes fixed-size frames into a [`FrameSink`].
///
/// Tries the preferred format first (i16 at the configured rate, mono), then
/// f32, then falls back to the device's native config with software
/// conversion (channel mixing + resampling).
pub struct CpalFrameSource {
    device: cpal::Device,
    stream: Mutex<Option<SendableStream>>,
    callback_count: Arc<AtomicU64>,
    sink: Arc<dyn FrameSink>,
    sample_rate: u32,
    frame_samples: usize,
}

impl CpalFrameSource {
    /// Create a new CPAL frame source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the best default.
    /// * `sample_rate` - Target capture rate in Hz.
    /// * `frame_samples` - Samples per frame delivered to the sink.
    /// * `sink` - Receiver of captured frames (the session's capture gate).
    ///
    /// # Errors
    /// Device-not-found and configuration failures are fatal at startup.
    pub fn new(
        device_name: Option<&str>,
        sample_rate: u32,
        frame_samples: usize,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host
                    .input_devices()
                    .map_err(|e| IntervoxError::AudioCapture {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| IntervoxError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        Ok(Self {
            device,
            stream: Mutex::new(None),
            callback_count: Arc::new(AtomicU64::new(0)),
            sink,
            sample_rate,
            frame_samples,
        })
    }

    /// Starts capture. Safe to call when already started.
    pub fn start(&self) -> Result<()> {
        {
            let guard = self.stream.lock().map_err(|e| IntervoxError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            if guard.is_some() {
                return Ok(()); // Already started
            }
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| IntervoxError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Wait briefly to check if the CPAL callback actually fires.
        // Some PipeWire-ALSA setups accept non-native configs but never
        // deliver data.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let final_stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            drop(stream);
            let native_stream = self.build_stream_native()?;
            native_stream
                .play()
                .map_err(|e| IntervoxError::AudioCapture {
                    message: format!("Failed to start native audio stream: {}", e),
                })?;
            native_stream
        } else {
            stream
        };

        let mut guard = self.stream.lock().map_err(|e| IntervoxError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        *guard = Some(SendableStream(final_stream));
        Ok(())
    }

    /// Stops capture. Safe to call when already stopped.
    pub fn stop(&self) -> Result<()> {
        let mut guard = self.stream.lock().map_err(|e| IntervoxError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable_stream) = guard.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| IntervoxError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    /// Build the audio stream with the configured format.
    ///
    /// Tries in order:
    /// 1. i16 at the target rate, mono — zero-copy path
    /// 2. f32 at the target rate, mono — for devices that only expose floats
    /// 3. Device default config with software conversion (via `start`)
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("Audio stream error: {}", err);
        };

        let frame_samples = self.frame_samples;

        // Try i16 — works with PipeWire/PulseAudio which convert transparently
        let sink = Arc::clone(&self.sink);
        let counter = Arc::clone(&self.callback_count);
        let mut carry: Vec<i16> = Vec::new();
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                deliver_frames(&mut carry, data, frame_samples, sink.as_ref());
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Try f32 — for devices that only expose float formats
        let sink = Arc::clone(&self.sink);
        let counter = Arc::clone(&self.callback_count);
        let mut carry: Vec<i16> = Vec::new();
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                deliver_frames(&mut carry, &converted, frame_samples, sink.as_ref());
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native()
    }

    /// Build a stream using the device's default/native config, with software
    /// channel mixing and resampling to the target rate.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| IntervoxError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let frame_samples = self.frame_samples;

        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln!(
            "intervox: using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let err_callback = |err| {
            eprintln!("Audio stream error: {}", err);
        };

        let sink = Arc::clone(&self.sink);
        let counter = Arc::clone(&self.callback_count);
        let mut carry: Vec<i16> = Vec::new();

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let converted =
                            convert_to_mono_i16(data, native_channels, native_rate, target_rate);
                        deliver_frames(&mut carry, &converted, frame_samples, sink.as_ref());
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| IntervoxError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted = convert_to_mono_i16(
                            &i16_data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        deliver_frames(&mut carry, &converted, frame_samples, sink.as_ref());
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| IntervoxError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(IntervoxError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            }),
        }
    }
}
