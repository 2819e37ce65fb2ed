//! treemirror — keep an in-memory mirror of directory trees in step with disk.
//!
//! Thin binary entry point. All logic lives in the `treemirror-core` crate.
//! Each round rescans every root and prints the mirror updates it produced.

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use treemirror_core::io::{MirrorIo, ThreadExecutor};
use treemirror_core::watcher::{LocalWatcher, WatcherConfig};
use treemirror_core::{Mirror, Update, UpdateKind};

#[derive(Debug, Parser)]
#[command(name = "treemirror", version, about = "Mirror directory trees and report changes")]
struct Args {
    /// Directories to mirror. Must not overlap.
    #[arg(required = true)]
    dirs: Vec<PathBuf>,

    /// Number of scan rounds; 0 keeps polling until interrupted.
    #[arg(long, default_value_t = 1)]
    rounds: u64,

    /// Pause between rounds, in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    interval_ms: u64,

    /// Print updates as JSON lines.
    #[arg(long)]
    json: bool,

    /// Follow symbolic links while scanning.
    #[arg(long)]
    follow_links: bool,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("treemirror starting");

    let config = WatcherConfig {
        follow_links: args.follow_links,
        ..WatcherConfig::default()
    };
    let io = MirrorIo::new(
        Mirror::<u64>::shared(),
        LocalWatcher::new(config),
        Arc::new(ThreadExecutor::new("treemirror-client")),
    );
    let updates = io.mirror().lock().subscribe_updates();
    let errors = io.mirror().lock().subscribe_errors();

    let mut roots = Vec::with_capacity(args.dirs.len());
    for dir in &args.dirs {
        let root = dir
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", dir.display()))?;
        io.add_top_level_directory(&root)?;
        roots.push(root);
    }

    let mut round: u64 = 0;
    loop {
        round += 1;
        for root in &roots {
            match io.rescan(root, round).wait() {
                Ok(count) => tracing::debug!("Round {round}: {} holds {count} entries", root.display()),
                Err(err) => tracing::error!("Round {round}: scan of {} failed: {err}", root.display()),
            }
        }

        for update in updates.try_iter() {
            print_update(&update, args.json)?;
        }
        for err in errors.try_iter() {
            tracing::warn!("Mirror out of sync: {err}");
        }

        if args.rounds != 0 && round >= args.rounds {
            break;
        }
        thread::sleep(Duration::from_millis(args.interval_ms));
    }

    tracing::info!("{} entries mirrored after {round} round(s)", io.mirror().lock().len());
    Ok(())
}

fn print_update(update: &Update<u64>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }

    let marker = match update.kind {
        UpdateKind::Creation => '+',
        UpdateKind::Deletion => '-',
        UpdateKind::Modification => '~',
    };
    let now: DateTime<Local> = Local::now();
    println!(
        "{} [round {}] {marker} {}",
        now.format("%H:%M:%S%.3f"),
        update.initiator,
        update.path().display()
    );
    Ok(())
}
