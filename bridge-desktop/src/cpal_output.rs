//! Sound-device output using cpal.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread that
//! owns it for its whole lifetime and takes pause/close commands over a
//! channel. The device callback pulls blocks from the core's ring and plays
//! silence when none is ready.

use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioOutput, BlockSource, PcmBlock, PcmFormat},
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

enum Command {
    Pause(bool),
    Close,
}

/// Cursor over the block currently being played by the device callback.
struct BlockCursor {
    source: Arc<dyn BlockSource>,
    current: Option<PcmBlock>,
    offset: usize,
    underruns: Arc<AtomicU64>,
    starved: bool,
}

impl BlockCursor {
    fn new(source: Arc<dyn BlockSource>, underruns: Arc<AtomicU64>) -> Self {
        Self {
            source,
            current: None,
            offset: 0,
            underruns,
            starved: false,
        }
    }

    /// Next little-endian 16-bit sample, or `None` when no block is ready.
    fn next_sample(&mut self) -> Option<i16> {
        loop {
            if let Some(block) = &self.current {
                if self.offset + 1 < block.data.len() {
                    let sample = i16::from_le_bytes([
                        block.data[self.offset],
                        block.data[self.offset + 1],
                    ]);
                    self.offset += 2;
                    return Some(sample);
                }
                let index = block.index;
                self.current = None;
                self.source.release(index);
            }

            if !self.source.is_active() {
                return None;
            }

            match self.source.next_block() {
                Some(block) => {
                    self.current = Some(block);
                    self.offset = 0;
                    self.starved = false;
                }
                None => {
                    if !self.starved {
                        self.underruns.fetch_add(1, Ordering::Relaxed);
                        self.starved = true;
                    }
                    return None;
                }
            }
        }
    }

    fn fill<T: Copy>(&mut self, out: &mut [T], convert: impl Fn(i16) -> T, silence: T) {
        for slot in out.iter_mut() {
            *slot = match self.next_sample() {
                Some(sample) => convert(sample),
                None => silence,
            };
        }
    }
}

impl Drop for BlockCursor {
    fn drop(&mut self) {
        if let Some(block) = self.current.take() {
            self.source.release(block.index);
        }
    }
}

/// Default-device output for 16-bit PCM.
///
/// The device must accept the requested sample rate and channel count; the
/// core never resamples. Devices that only take `f32` samples get a lossless
/// conversion.
pub struct CpalAudioOutput {
    device_name: Option<String>,
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    underruns: Arc<AtomicU64>,
}

impl CpalAudioOutput {
    /// Output on the host's default device.
    pub fn new() -> Self {
        Self {
            device_name: None,
            commands: None,
            worker: None,
            underruns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Output on the named device, falling back to the default when absent.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            ..Self::new()
        }
    }

    /// Device callbacks that found no ready block.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    fn select_device(name: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();
        let named = name.and_then(|wanted| {
            host.output_devices()
                .ok()?
                .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
        });
        if name.is_some() && named.is_none() {
            warn!(requested = ?name, "Output device not found, using default");
        }
        named
            .or_else(|| host.default_output_device())
            .ok_or_else(|| BridgeError::AudioDevice("No output device available".to_string()))
    }

    fn build_stream(
        device: &cpal::Device,
        format: PcmFormat,
        source: Arc<dyn BlockSource>,
        underruns: Arc<AtomicU64>,
    ) -> Result<cpal::Stream> {
        if format.bits_per_sample != 16 {
            return Err(BridgeError::AudioDevice(format!(
                "Only 16-bit PCM is supported, got {} bits",
                format.bits_per_sample
            )));
        }

        let sample_format = device
            .supported_output_configs()
            .map_err(|e| BridgeError::AudioDevice(e.to_string()))?
            .find(|range| {
                range.channels() == format.channels
                    && range.min_sample_rate().0 <= format.sample_rate
                    && range.max_sample_rate().0 >= format.sample_rate
                    && matches!(
                        range.sample_format(),
                        cpal::SampleFormat::I16 | cpal::SampleFormat::F32
                    )
            })
            .map(|range| range.sample_format())
            .ok_or_else(|| {
                BridgeError::AudioDevice(format!(
                    "Device does not support {} Hz / {} channels",
                    format.sample_rate, format.channels
                ))
            })?;

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let mut cursor = BlockCursor::new(source, underruns);
        let on_error = |err: cpal::StreamError| error!("Audio stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config,
                move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    cursor.fill(out, |s| s, 0)
                },
                on_error,
                None,
            ),
            _ => device.build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    cursor.fill(out, |s| s as f32 / 32768.0, 0.0)
                },
                on_error,
                None,
            ),
        };

        stream.map_err(|e| BridgeError::AudioDevice(format!("Failed to build stream: {}", e)))
    }

    fn run(stream: cpal::Stream, commands: Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            let result = match command {
                Command::Pause(true) => stream.pause(),
                Command::Pause(false) => stream.play(),
                Command::Close => break,
            };
            if let Err(e) = result {
                warn!(error = %e, "Audio stream control failed");
            }
        }
        drop(stream);
        debug!("Audio device thread exited");
    }
}

impl Default for CpalAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalAudioOutput {
    fn open(&mut self, format: PcmFormat, source: Arc<dyn BlockSource>) -> Result<()> {
        self.reset()?;

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<String>>(1);
        let (command_tx, command_rx) = mpsc::channel();
        let device_name = self.device_name.clone();
        let underruns = Arc::clone(&self.underruns);

        let worker = thread::Builder::new()
            .name("audio-device".to_string())
            .spawn(move || {
                let opened = Self::select_device(device_name.as_deref()).and_then(|device| {
                    let stream = Self::build_stream(&device, format, source, underruns)?;
                    stream
                        .play()
                        .map_err(|e| BridgeError::AudioDevice(e.to_string()))?;
                    Ok((device.name().unwrap_or_else(|_| "unknown".to_string()), stream))
                });

                match opened {
                    Ok((name, stream)) => {
                        let _ = ready_tx.send(Ok(name));
                        Self::run(stream, command_rx);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(name)) => {
                info!(
                    device = %name,
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "Opened audio device"
                );
                self.commands = Some(command_tx);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(BridgeError::AudioDevice(
                    "Audio device thread exited during open".to_string(),
                ))
            }
        }
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        if let Some(commands) = &self.commands {
            commands
                .send(Command::Pause(paused))
                .map_err(|_| BridgeError::AudioDevice("Audio device thread gone".to_string()))?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Audio device thread panicked");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

impl Drop for CpalAudioOutput {
    fn drop(&mut self) {
        let _ = self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct QueueSource {
        blocks: Mutex<VecDeque<PcmBlock>>,
        released: Mutex<Vec<usize>>,
    }

    impl BlockSource for QueueSource {
        fn next_block(&self) -> Option<PcmBlock> {
            self.blocks.lock().pop_front()
        }

        fn release(&self, index: usize) {
            self.released.lock().push(index);
        }

        fn is_active(&self) -> bool {
            true
        }
    }

    fn block(index: usize, samples: &[i16]) -> PcmBlock {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        PcmBlock {
            index,
            frames: samples.len() / 2,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn cursor_crosses_blocks_and_pads_with_silence() {
        let source = Arc::new(QueueSource {
            blocks: Mutex::new(VecDeque::from(vec![block(0, &[1, 2]), block(1, &[3, 4])])),
            released: Mutex::new(Vec::new()),
        });
        let underruns = Arc::new(AtomicU64::new(0));
        let mut cursor = BlockCursor::new(source.clone(), underruns.clone());

        let mut out = [9i16; 6];
        cursor.fill(&mut out, |s| s, 0);

        assert_eq!(out, [1, 2, 3, 4, 0, 0]);
        assert_eq!(*source.released.lock(), vec![0, 1]);
        assert_eq!(underruns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn dropping_cursor_releases_current_block() {
        let source = Arc::new(QueueSource {
            blocks: Mutex::new(VecDeque::from(vec![block(5, &[7, 7, 7, 7])])),
            released: Mutex::new(Vec::new()),
        });
        let mut cursor = BlockCursor::new(source.clone(), Arc::new(AtomicU64::new(0)));

        let mut out = [0f32; 1];
        cursor.fill(&mut out, |s| s as f32 / 32768.0, 0.0);
        drop(cursor);

        assert_eq!(*source.released.lock(), vec![5]);
    }
}
