//! # Stream Producer
//!
//! Pulls a track's PCM stream from the network and feeds the block ring. One
//! producer runs per session, as a tokio task owned by that session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        StreamProducer (tokio task)      │
//! │                                         │
//! │  1. Open stream (AudioStreamSource)     │
//! │  2. Pull chunks (paused ⇒ no pulls)     │
//! │  3. Write to RingBuffer (backpressure)  │
//! │  4. Flush last block, wait for drain    │
//! └────────────┬────────────────────────────┘
//!              │ full blocks, in order
//!              ▼
//! ┌─────────────────────────────────────────┐
//! │           RingBuffer (Shared)           │
//! └────────────┬────────────────────────────┘
//!              │ next_block / release
//!              ▼
//! ┌─────────────────────────────────────────┐
//! │     AudioOutput (hardware context)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every await point races the ring's cancellation token, so a stopped
//! session's producer exits within one poll interval even in the middle of a
//! network read.

use crate::error::{PlaybackError, Result};
use crate::ring_buffer::RingBuffer;
use crate::session::SessionShared;
use crate::traits::AudioStreamSource;
use bridge_traits::http::ByteStream;
use bridge_traits::playback::PcmFormat;
use core_library::Track;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How a producer run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProducerOutcome {
    /// End of stream reached and every block played out.
    Finished,
    Failed(PlaybackError),
    /// The ring was cancelled.
    Stopped,
}

pub(crate) struct StreamProducer {
    pub(crate) source: Arc<dyn AudioStreamSource>,
    pub(crate) ring: RingBuffer,
    pub(crate) track: Track,
    pub(crate) format: PcmFormat,
    pub(crate) min_viable_bytes: usize,
    pub(crate) read_timeout: Duration,
    pub(crate) paused: watch::Receiver<bool>,
    pub(crate) shared: Arc<SessionShared>,
}

impl StreamProducer {
    #[instrument(skip(self), fields(track_id = %self.track.id, generation = self.ring.generation()))]
    pub(crate) async fn run(mut self) -> ProducerOutcome {
        let token = self.ring.cancellation_token();

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return ProducerOutcome::Stopped,
            opened = self.source.open_stream(&self.track, self.format) => opened,
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, source = self.source.name(), "Failed to open stream");
                return ProducerOutcome::Failed(e);
            }
        };
        debug!("Stream opened");

        match self.pump(stream, &token).await {
            Ok(()) => {
                info!(
                    bytes = self.shared.bytes_received(),
                    blocks = self.ring.stats().blocks_submitted,
                    "Stream played out"
                );
                ProducerOutcome::Finished
            }
            Err(PlaybackError::Cancelled) => {
                debug!(bytes = self.shared.bytes_received(), "Producer cancelled");
                ProducerOutcome::Stopped
            }
            Err(e) => ProducerOutcome::Failed(e),
        }
    }

    async fn pump(&mut self, mut stream: ByteStream, token: &CancellationToken) -> Result<()> {
        loop {
            self.wait_while_paused(token).await?;

            // A pause abandons the pending read; the next pass waits for
            // resume and then restarts the timeout.
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(PlaybackError::Cancelled),
                changed = self.paused.changed() => {
                    if changed.is_err() {
                        return Err(PlaybackError::Cancelled);
                    }
                    continue;
                }
                next = tokio::time::timeout(self.read_timeout, stream.next()) => next,
            };

            let next = match next {
                Ok(next) => next,
                Err(_) => {
                    warn!(
                        timeout_ms = self.read_timeout.as_millis() as u64,
                        bytes = self.shared.bytes_received(),
                        "Stream stalled"
                    );
                    return Err(PlaybackError::Network("read timed out".to_string()));
                }
            };

            match next {
                Some(Ok(chunk)) => {
                    self.shared.add_received(chunk.len());
                    self.ring.write(&chunk).await?;
                }
                Some(Err(e)) => {
                    warn!(
                        error = %e,
                        bytes = self.shared.bytes_received(),
                        "Stream read failed"
                    );
                    return Err(PlaybackError::Network(e.to_string()));
                }
                None => break,
            }
        }
        drop(stream);

        let received = self.shared.bytes_received();
        if received < self.min_viable_bytes as u64 {
            warn!(
                bytes = received,
                minimum = self.min_viable_bytes,
                "Stream too short to play"
            );
            return Err(PlaybackError::DecodeFormat {
                received,
                minimum: self.min_viable_bytes,
            });
        }

        self.ring.finish()?;
        debug!(bytes = received, "End of stream, waiting for playback");
        self.ring.wait_drained().await
    }

    async fn wait_while_paused(&mut self, token: &CancellationToken) -> Result<()> {
        while *self.paused.borrow_and_update() {
            tokio::select! {
                _ = token.cancelled() => return Err(PlaybackError::Cancelled),
                changed = self.paused.changed() => {
                    if changed.is_err() {
                        return Err(PlaybackError::Cancelled);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    enum Script {
        Chunks(Vec<usize>),
        ChunksThenError(Vec<usize>),
        ChunksThenStall(Vec<usize>),
        OpenError,
        Endless,
    }

    struct ScriptSource {
        script: Script,
        pulled: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AudioStreamSource for ScriptSource {
        async fn open_stream(&self, _track: &Track, _format: PcmFormat) -> Result<ByteStream> {
            let pulled = Arc::clone(&self.pulled);
            let chunk = move |len: usize| -> bridge_traits::error::Result<Bytes> {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from(vec![1u8; len]))
            };
            match &self.script {
                Script::Chunks(sizes) => Ok(Box::pin(stream::iter(
                    sizes.clone().into_iter().map(chunk),
                ))),
                Script::ChunksThenError(sizes) => {
                    let items = sizes
                        .clone()
                        .into_iter()
                        .map(chunk)
                        .chain(std::iter::once(Err(BridgeError::OperationFailed(
                            "connection reset".to_string(),
                        ))));
                    Ok(Box::pin(stream::iter(items)))
                }
                Script::ChunksThenStall(sizes) => Ok(Box::pin(
                    stream::iter(sizes.clone().into_iter().map(chunk)).chain(stream::pending()),
                )),
                Script::OpenError => Err(PlaybackError::Network("404".to_string())),
                Script::Endless => Ok(Box::pin(stream::repeat_with(move || chunk(8)))),
            }
        }
    }

    struct Harness {
        ring: RingBuffer,
        paused: watch::Sender<bool>,
        shared: Arc<SessionShared>,
        pulled: Arc<AtomicUsize>,
    }

    fn producer(script: Script, min_viable_bytes: usize) -> (StreamProducer, Harness) {
        let ring = RingBuffer::new(16, 4, PcmFormat::default(), Duration::from_millis(10));
        ring.reset();
        let (paused, paused_rx) = watch::channel(false);
        let shared = Arc::new(SessionShared::new());
        let pulled = Arc::new(AtomicUsize::new(0));
        let producer = StreamProducer {
            source: Arc::new(ScriptSource {
                script,
                pulled: Arc::clone(&pulled),
            }),
            ring: ring.clone(),
            track: Track::new("t1", "One"),
            format: PcmFormat::default(),
            min_viable_bytes,
            read_timeout: Duration::from_millis(100),
            paused: paused_rx,
            shared: Arc::clone(&shared),
        };
        (
            producer,
            Harness {
                ring,
                paused,
                shared,
                pulled,
            },
        )
    }

    /// Drain and release everything the ring hands out until it is cancelled.
    fn spawn_consumer(ring: RingBuffer) -> (tokio::task::JoinHandle<Vec<u8>>, CancellationToken) {
        let stop = CancellationToken::new();
        let stop_consumer = stop.clone();
        let handle = tokio::spawn(async move {
            let mut played = Vec::new();
            while !stop_consumer.is_cancelled() {
                match ring.drain() {
                    Some(block) => {
                        played.extend_from_slice(&block.data);
                        ring.release(block.index);
                    }
                    None => tokio::time::sleep(Duration::from_millis(1)).await,
                }
            }
            played
        });
        (handle, stop)
    }

    #[tokio::test]
    async fn test_finishes_after_last_partial_block_played() {
        let (producer, harness) = producer(Script::Chunks(vec![10, 7, 30, 3]), 16);
        let (consumer, stop) = spawn_consumer(harness.ring.clone());

        let outcome = timeout(Duration::from_secs(2), producer.run()).await.unwrap();
        assert_eq!(outcome, ProducerOutcome::Finished);

        stop.cancel();
        let played = consumer.await.unwrap();
        assert_eq!(played.len(), 50);
        assert!(harness.ring.is_drained());
        assert_eq!(harness.shared.bytes_received(), 50);
    }

    #[tokio::test]
    async fn test_short_stream_is_format_failure() {
        let (producer, harness) = producer(Script::Chunks(vec![6]), 16);
        let outcome = producer.run().await;
        assert_eq!(
            outcome,
            ProducerOutcome::Failed(PlaybackError::DecodeFormat {
                received: 6,
                minimum: 16
            })
        );
        assert_eq!(harness.ring.stats().blocks_committed, 0);
    }

    #[tokio::test]
    async fn test_read_error_is_network_failure() {
        let (producer, harness) = producer(Script::ChunksThenError(vec![16, 4]), 16);
        let (_consumer, stop) = spawn_consumer(harness.ring.clone());

        let outcome = timeout(Duration::from_secs(2), producer.run()).await.unwrap();
        stop.cancel();
        match outcome {
            ProducerOutcome::Failed(e) => assert!(e.is_network_error()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let (producer, _harness) = producer(Script::ChunksThenStall(vec![8]), 16);

        let outcome = timeout(Duration::from_secs(2), producer.run()).await.unwrap();
        assert_eq!(
            outcome,
            ProducerOutcome::Failed(PlaybackError::Network("read timed out".to_string()))
        );
    }

    #[tokio::test]
    async fn test_paused_time_is_not_a_stall() {
        let (producer, harness) = producer(Script::ChunksThenStall(vec![8]), 16);
        let run = tokio::spawn(producer.run());

        timeout(Duration::from_secs(1), async {
            while harness.pulled.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        harness.paused.send_replace(true);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!run.is_finished());

        harness.ring.cancel();
        assert_eq!(run.await.unwrap(), ProducerOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_open_error_is_reported() {
        let (producer, _harness) = producer(Script::OpenError, 16);
        assert!(matches!(
            producer.run().await,
            ProducerOutcome::Failed(PlaybackError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_backpressure() {
        let (producer, harness) = producer(Script::Endless, 16);
        let run = tokio::spawn(producer.run());

        timeout(Duration::from_secs(1), async {
            while harness.ring.stats().blocks_committed < 4 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        harness.ring.cancel();
        let outcome = timeout(Duration::from_millis(100), run)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ProducerOutcome::Stopped);

        let written = harness.ring.stats().bytes_written;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(harness.ring.stats().bytes_written, written);
    }

    #[tokio::test]
    async fn test_paused_producer_stops_pulling() {
        let (producer, harness) = producer(Script::Endless, 16);
        harness.paused.send_replace(true);
        let run = tokio::spawn(producer.run());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(harness.pulled.load(Ordering::SeqCst), 0);

        harness.paused.send_replace(false);
        timeout(Duration::from_secs(1), async {
            while harness.pulled.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        harness.ring.cancel();
        assert_eq!(run.await.unwrap(), ProducerOutcome::Stopped);
    }
}
