// src/cli/watch.rs

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Args;
use libsentinel::{SemanticEvent, WatcherConfig, WatcherState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use crate::cli::Format;

#[derive(Args, Debug)]
pub struct WatchOpts {
    /// Directory to watch (defaults to current directory, `~` is expanded)
    #[arg(default_value = ".")]
    pub path: String,

    /// Debounce window in milliseconds (overrides SENTINEL_DEBOUNCE_MS)
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Glob pattern for paths to ignore; may be repeated
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Stop on your own after this many milliseconds
    #[arg(long)]
    pub duration_ms: Option<u64>,
}

/// Run `sentinel watch`
pub fn run(opts: &WatchOpts, format: Format) -> Result<()> {
    let path = shellexpand::tilde(&opts.path).into_owned();

    let mut config = WatcherConfig::from_env().context("reading SENTINEL_* environment")?;
    if let Some(ms) = opts.debounce_ms {
        config.debounce_ms = ms;
    }
    config.exclusions.extend(opts.exclude.iter().cloned());

    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let failure_slot = failure.clone();

    let on_batch = move |batch: Vec<SemanticEvent>| print_batch(&batch, format);
    let mut watcher = libsentinel::watch(&path, on_batch, Some(config))
        .with_context(|| format!("configuring watcher for {path}"))?
        .with_error_handler(move |e| {
            if let Ok(mut slot) = failure_slot.lock() {
                *slot = Some(e.to_string());
            }
        });
    watcher.start().with_context(|| format!("watching {path}"))?;

    let status = watcher.status()?;
    info!(
        root = %status.root.display(),
        directories = status.live_handles,
        "watching; press Ctrl+C to stop"
    );

    let running = Arc::new(AtomicBool::new(true));
    let r_clone = running.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, stopping");
        r_clone.store(false, Ordering::SeqCst);
    })?;

    let started = Instant::now();
    let limit = opts.duration_ms.map(Duration::from_millis);
    while running.load(Ordering::SeqCst) {
        if watcher.state() == WatcherState::Errored {
            break;
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            info!("duration elapsed, stopping");
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    watcher.stop()?;
    let status = watcher.status()?;
    if status.state == WatcherState::Errored {
        let reason = failure
            .lock()
            .ok()
            .and_then(|g| g.clone())
            .or(status.last_error)
            .unwrap_or_else(|| "unknown error".into());
        bail!("watcher failed: {reason}");
    }

    info!(
        batches = status.batches_delivered,
        events = status.events_delivered,
        "watcher stopped"
    );
    Ok(())
}

fn print_batch(batch: &[SemanticEvent], format: Format) {
    match format {
        Format::Text => {
            let ts = Local::now().format("%H:%M:%S%.3f");
            for ev in batch {
                println!("{ts} {ev}");
            }
        }
        Format::Json => {
            #[cfg(feature = "json")]
            {
                for ev in batch {
                    println!("{}", event_json(ev));
                }
            }
            #[cfg(not(feature = "json"))]
            {
                tracing::warn!(
                    events = batch.len(),
                    "JSON output needs the `json` feature; printing text"
                );
                print_batch(batch, Format::Text);
            }
        }
    }
}

#[cfg(feature = "json")]
fn event_json(ev: &SemanticEvent) -> serde_json::Value {
    serde_json::json!({
        "time": Local::now().to_rfc3339(),
        "action": ev.action.as_str(),
        "directory": ev.directory.to_string_lossy(),
        "file": ev.file.to_string_lossy(),
        "new_directory": ev.new_directory.as_ref().map(|d| d.to_string_lossy().into_owned()),
        "new_file": ev.new_file.as_ref().map(|f| f.to_string_lossy().into_owned()),
    })
}
