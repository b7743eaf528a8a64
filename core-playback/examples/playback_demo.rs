//! # Playback Engine Demo
//!
//! Plays a three-track queue of generated tones through the paced software
//! output, printing engine events as they arrive.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use async_trait::async_trait;
use bridge_desktop::PacedAudioOutput;
use bridge_traits::http::ByteStream;
use bridge_traits::playback::PcmFormat;
use bytes::{BufMut, Bytes, BytesMut};
use core_library::{Ticks, Track};
use core_playback::{
    format_clock, AudioStreamSource, LoopMode, PlaybackConfig, PlaybackEngine, Result,
};
use core_runtime::events::{CoreEvent, PlaybackEvent, QueueEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use futures::stream;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Tone Source
// ============================================================================

/// Serves every track as a sine tone, in uneven chunk sizes like a real
/// server would.
struct ToneSource {
    seconds: f64,
}

impl ToneSource {
    fn render(&self, frequency: f64, format: PcmFormat) -> Vec<Bytes> {
        let frames = (format.sample_rate as f64 * self.seconds) as usize;
        let mut pcm = BytesMut::with_capacity(frames * format.bytes_per_frame());
        for i in 0..frames {
            let t = i as f64 / format.sample_rate as f64;
            let wave = (2.0 * std::f64::consts::PI * frequency * t).sin();
            let sample = (wave * 0.2 * i16::MAX as f64) as i16;
            for _ in 0..format.channels {
                pcm.put_i16_le(sample);
            }
        }

        let mut pcm = pcm.freeze();
        let mut chunks = Vec::new();
        let mut chunk = 1_500;
        while !pcm.is_empty() {
            let take = chunk.min(pcm.len());
            chunks.push(pcm.split_to(take));
            chunk = if chunk > 6_000 { 1_500 } else { chunk * 2 };
        }
        chunks
    }
}

#[async_trait]
impl AudioStreamSource for ToneSource {
    async fn open_stream(&self, track: &Track, format: PcmFormat) -> Result<ByteStream> {
        let frequency = match track.id.as_str() {
            "a4" => 440.0,
            "c5" => 523.25,
            _ => 659.25,
        };
        let chunks = self.render(frequency, format);
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = init_logging(LoggingConfig::default().with_format(LogFormat::Compact));

    let seconds = 2.0;
    let tracks: Vec<Track> = [("a4", "A4"), ("c5", "C5"), ("e5", "E5")]
        .into_iter()
        .map(|(id, name)| {
            Track::new(id, name)
                .with_album("Test Tones")
                .with_duration(Ticks::from_secs(seconds as u64))
        })
        .collect();

    // Run the output at 4x so the demo finishes quickly.
    let engine = PlaybackEngine::new(
        PlaybackConfig::low_memory(),
        Arc::new(ToneSource { seconds }),
        Box::new(PacedAudioOutput::with_time_scale(0.25)),
    )?;
    engine.set_loop_mode(LoopMode::Off).await;

    let mut events = engine.event_bus().subscribe();
    engine.play(tracks, 0).await?;

    loop {
        let event = match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => continue,
            Err(_) => {
                println!("No events for 10s, giving up");
                break;
            }
        };

        match event {
            CoreEvent::Playback(PlaybackEvent::Started { title, .. }) => {
                println!("> {}", title);
            }
            CoreEvent::Playback(PlaybackEvent::PositionChanged { duration_ms, .. }) => {
                if let Some(now) = engine.now_playing().await {
                    println!(
                        "  {} of {} ({:.0}%)",
                        format_clock(now.elapsed),
                        format_clock(Duration::from_millis(duration_ms)),
                        now.progress * 100.0
                    );
                }
            }
            CoreEvent::Playback(PlaybackEvent::Finished { track_id }) => {
                if let Some(stats) = engine.stats().await {
                    println!(
                        "# {} finished: {} bytes, {} blocks, {} under-runs",
                        track_id, stats.bytes_committed, stats.blocks_submitted, stats.underruns
                    );
                }
            }
            CoreEvent::Playback(PlaybackEvent::Failed { track_id, message }) => {
                println!("! {}: {}", track_id, message);
            }
            CoreEvent::Queue(QueueEvent::Exhausted) => {
                println!("Queue finished");
                break;
            }
            _ => {}
        }
    }

    engine.shutdown().await;
    Ok(())
}
