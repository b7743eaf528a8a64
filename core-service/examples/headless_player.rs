//! # Headless Player
//!
//! Signs in to a Jellyfin server (or reuses the saved session), lists the
//! albums and plays the first one, or the one whose name matches the first
//! argument.
//!
//! ```text
//! EMBERPLAY_SERVER=http://192.168.1.20:8096 \
//! EMBERPLAY_USER=alice EMBERPLAY_PASSWORD=hunter2 \
//!     cargo run --example headless_player --package core-service -- "Kind of Blue"
//! ```
//!
//! Enable `cpal-output` to hear it; the default output only paces the stream.

use core_auth::AuthState;
use core_playback::{format_clock, PlaybackConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventSeverity, PlaybackEvent, QueueEvent};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap_desktop, CoreError, Result};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = init_logging(LoggingConfig::default());

    let config = CoreConfig::builder()
        .device_name("Headless player")
        .build()?;
    let core = bootstrap_desktop(config, PlaybackConfig::default())?;

    if core.start(false).await? == AuthState::LoginRequired {
        let server = match std::env::var("EMBERPLAY_SERVER") {
            Ok(server) => server,
            Err(_) => core.suggested_server_url().await.ok_or_else(|| {
                CoreError::InitializationFailed("set EMBERPLAY_SERVER".to_string())
            })?,
        };
        let user = std::env::var("EMBERPLAY_USER").unwrap_or_default();
        let password = std::env::var("EMBERPLAY_PASSWORD").unwrap_or_default();
        core.login(&server, &user, &password).await?;
    }

    let albums = core.albums().await;
    println!("{} albums", albums.len());

    let wanted = std::env::args().nth(1);
    let album = match &wanted {
        Some(name) => albums.iter().find(|a| a.name.eq_ignore_ascii_case(name)),
        None => albums.first(),
    };
    let Some(album) = album else {
        println!("Nothing to play");
        return Ok(());
    };

    println!("Playing {}", album.name);
    let mut events = core.subscribe();
    core.play_album(&album.id, 0).await?;

    loop {
        let event = match tokio::time::timeout(Duration::from_secs(30), events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => continue,
            Err(_) => break,
        };

        match event {
            CoreEvent::Playback(PlaybackEvent::Started { title, .. }) => println!("> {}", title),
            CoreEvent::Playback(PlaybackEvent::PositionChanged { .. }) => {
                if let Some(now) = core.now_playing().await {
                    println!(
                        "  {} / {}",
                        format_clock(now.elapsed),
                        format_clock(now.duration)
                    );
                }
            }
            CoreEvent::Playback(PlaybackEvent::Failed { track_id, message }) => {
                println!("! {}: {}", track_id, message)
            }
            CoreEvent::Queue(QueueEvent::Exhausted) => break,
            other if other.severity() >= EventSeverity::Warning => {
                println!("! {}", other.description())
            }
            _ => {}
        }
    }

    core.shutdown().await;
    Ok(())
}
