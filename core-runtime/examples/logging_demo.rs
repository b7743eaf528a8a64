//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run -p core-runtime --example logging_demo
//!
//! # JSON format
//! cargo run -p core-runtime --example logging_demo -- json
//!
//! # Compact format with a custom filter
//! cargo run -p core-runtime --example logging_demo -- compact "logging_demo=trace"
//! ```

use bridge_traits::logging::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_query_secret, LogFormat, LoggingConfig,
};
use std::env;
use std::time::Duration;
use tracing::{debug, info, instrument, span, trace, warn, Level};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_spans(true)
        .with_target(true)
        .with_filter(args.get(2).cloned().unwrap_or_else(|| "logging_demo=trace".to_string()));
    config.display_thread_info = matches!(format, LogFormat::Json);

    if let Err(e) = init_logging(config) {
        eprintln!("{}", e);
        return;
    }

    info!(format = ?format, "Logging initialized");

    demo_session().await;
    demo_redaction();
}

#[instrument]
async fn demo_session() {
    let span = span!(Level::INFO, "session", track_id = "9f1c", generation = 3);
    let _enter = span.enter();

    info!(title = "Harvest Moon", duration_ms = 301_000, "Stream opened");
    for block in 0..3u64 {
        trace!(block, bytes = 16_384, "Block filled");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    debug!(written = 49_152, drained = 32_768, "Ring status");
    warn!(underruns = 1, "Output starved");
    info!("Stream finished");
}

fn demo_redaction() {
    let url = "http://192.168.1.20:8096/Audio/9f1c/stream?static=false&api_key=0123abcd";

    info!(
        url = %redact_query_secret(url, "api_key"),
        token = %redact_if_sensitive("token", "0123abcd"),
        "Redacted stream request"
    );
}
