//! cfpacket: show host name and clock on a Crystalfontz packet-mode LCD
//!
//! Usage: `cfpacket <config.json> [section]`

use anyhow::{Context, Result};
use cfpacket_core::driver;
use cfpacket_core::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Logs keypad activity
struct KeyLogger;

impl PacketListener for KeyLogger {
    fn on_key_event(&mut self, key: u8) {
        info!(key, "key event");
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Pad or cut `text` to exactly `cols` bytes
fn fit(text: &str, cols: usize) -> Vec<u8> {
    let mut line: Vec<u8> = text.bytes().take(cols).collect();
    line.resize(cols, b' ');
    line
}

/// Queue one screenful of status lines.
///
/// Skipped while earlier writes are still queued, so a display that stops
/// answering does not make the backlog grow every second.
fn draw(display: &mut CrystalfontzDriver, host: &str) -> Result<(), ProtocolError> {
    let backlog = display.engine().queued();
    if backlog > 0 {
        debug!(backlog, "display behind, skipping redraw");
        return Ok(());
    }
    let now = chrono::Local::now();
    let cols = usize::from(display.model().cols);
    let mut lines = vec![host.to_string(), now.format("%H:%M:%S").to_string()];
    if display.model().rows >= 4 {
        let stats = display.stats();
        lines.push(now.format("%a %d %b %Y").to_string());
        lines.push(format!(
            "tx {} rs {} ab {}",
            stats.commands_sent, stats.commands_resent, stats.commands_abandoned
        ));
    }
    for (row, line) in lines.iter().enumerate() {
        display.send_data(row as u8, 0, &fit(line, cols))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(
        args.next()
            .context("usage: cfpacket <config.json> [section]")?,
    );
    let section = args.next();
    let config = DriverConfig::load(&path, section.as_deref())
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut display = CrystalfontzDriver::new(config)?;
    display.set_listener(Box::new(KeyLogger));
    display
        .start()
        .with_context(|| format!("failed to open {}", display.config().port))?;
    let model_name = &display.model().name;
    info!("cfpacket {} driving {}", cfpacket_core::VERSION, model_name);

    let (handle, task) = driver::spawn(display);
    let host = hostname();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, shutting down");
                break;
            }
            _ = tick.tick() => {
                let host = host.clone();
                match handle.call(move |d| draw(d, &host)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("display update failed: {}", e),
                    Err(_) => break,
                }
            }
        }
    }

    handle.shutdown();
    task.await?.context("display driver stopped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit() {
        assert_eq!(fit("abc", 5), b"abc  ".to_vec());
        assert_eq!(fit("abcdefgh", 4), b"abcd".to_vec());
    }

    #[test]
    fn test_draw_waits_for_backlog() {
        let mut display = CrystalfontzDriver::new(DriverConfig {
            model: "635".to_string(),
            ..Default::default()
        })
        .unwrap();

        draw(&mut display, "host").unwrap();
        assert_eq!(display.engine().queued(), 4);

        draw(&mut display, "host").unwrap();
        draw(&mut display, "host").unwrap();
        assert_eq!(display.engine().queued(), 4);
    }
}
