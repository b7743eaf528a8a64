//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and the
//! platform-specific pieces it cannot own itself: the network transport, the
//! persisted configuration, and the audio hardware. Each trait represents a
//! capability the core requires but that is implemented differently per
//! platform (desktop, handheld, headless).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests and streamed response bodies
//!
//! ### Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Audio hardware
//! - [`AudioOutput`](playback::AudioOutput) - Fixed-format PCM output channel
//! - [`BlockSource`](playback::BlockSource) - Consumer side of the core's block ring
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors into it and keep the
//! message actionable (URL, key, device name).
//!
//! ## Thread Safety
//!
//! Bridges that are shared between tasks require `Send + Sync`. The audio output
//! is owned by the playback engine and only needs `Send`.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod logging;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{AudioOutput, BlockSource, PcmBlock, PcmFormat};
pub use storage::{SecureStore, SettingsStore};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
