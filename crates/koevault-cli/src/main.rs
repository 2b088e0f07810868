//! Koevault CLI - download character voice datasets from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use koevault::{
    Category, ContentMode, DownloadConfig, ProgressSnapshot, Session, Settings, rewrite_manifest,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "koevault")]
#[command(about = "Character voice dataset downloader")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a character's voice assets and write the manifest
    Fetch {
        /// Character id from the master database
        #[arg(long)]
        character_id: i64,

        /// What to download: all, voices, solo, profile or card
        #[arg(long, default_value = "all")]
        mode: ContentMode,

        /// Keep at most this many card voices
        #[arg(long, default_value_t = DownloadConfig::DEFAULT_MAX_CARD_COUNT)]
        max_cards: usize,

        /// Directory datasets are created beneath
        #[arg(long, default_value = DownloadConfig::DEFAULT_OUTPUT_DIR)]
        output: PathBuf,

        /// Seconds between download starts, shared by all workers
        #[arg(long, default_value_t = 0.3)]
        wait_time: f64,

        /// Concurrent download workers
        #[arg(long, default_value_t = DownloadConfig::DEFAULT_WORKERS)]
        workers: usize,

        /// Metadata cache database path override
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },

    /// List the characters available in the master database
    Characters {
        /// Metadata cache database path override
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },

    /// Rewrite a manifest for a training-tool folder layout
    Rewrite {
        /// Manifest produced by a fetch run
        manifest: PathBuf,

        /// Folder the training tool will read audio from
        target_folder: PathBuf,

        /// Character id stamped into each line
        character_id: i64,

        /// Language code stamped into each line
        #[arg(long, default_value = DownloadConfig::DEFAULT_LANGUAGE)]
        language: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so progress bars and command output stay clean.
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Fetch {
            character_id,
            mode,
            max_cards,
            output,
            wait_time,
            workers,
            cache_path,
        } => {
            let settings = Settings {
                output_root: output,
                cache_path,
                wait_time: Duration::from_secs_f64(wait_time.max(0.0)),
                workers,
            };
            fetch(settings, character_id, mode, max_cards).await
        }
        Command::Characters { cache_path } => {
            let settings = Settings {
                cache_path,
                ..Settings::default()
            };
            characters(settings).await
        }
        Command::Rewrite {
            manifest,
            target_folder,
            character_id,
            language,
        } => {
            let output = rewrite_manifest(&manifest, &target_folder, character_id, &language)?;
            println!("{}", output.display());
            Ok(())
        }
    }
}

async fn fetch(
    settings: Settings,
    character_id: i64,
    mode: ContentMode,
    max_cards: usize,
) -> Result<()> {
    let session =
        Arc::new(Session::new(settings).context("Failed to initialize download session")?);
    let progress = session.progress();

    let run = tokio::spawn({
        let session = session.clone();
        async move { session.run(character_id, mode, max_cards).await }
    });

    let bars = ProgressBars::new(mode);
    while !run.is_finished() {
        bars.update(&progress.snapshot());
        tokio::time::sleep(Duration::from_millis(120)).await;
    }
    let summary = run.await.context("Download task panicked")??;
    bars.update(&progress.snapshot());
    bars.finish();

    println!(
        "{} of {} assets downloaded ({} bytes), manifest at {}",
        summary.succeeded,
        summary.planned,
        summary.bytes_written,
        summary.manifest_path.display()
    );
    let tallies = [
        ("solo", summary.solo),
        ("profile", summary.profile),
        ("card", summary.card),
    ];
    for (label, tally) in tallies {
        if tally.attempted > 0 {
            println!(
                "  {}: {} attempted, {} downloaded, {} failed",
                label, tally.attempted, tally.succeeded, tally.failed
            );
        }
    }
    if summary.failed > 0 {
        eprintln!("{} downloads failed:", summary.failed);
        for failure in &summary.failures {
            eprintln!("  {}", failure);
        }
    }
    Ok(())
}

async fn characters(settings: Settings) -> Result<()> {
    let session = Session::new(settings).context("Failed to initialize session")?;
    let characters = session
        .list_characters()
        .await
        .context("Failed to fetch the character list")?;

    for character in characters {
        println!("{:>4}  {}", character.id, character.name);
    }
    Ok(())
}

/// One progress bar per counter pair the selected mode can move.
struct ProgressBars {
    overall: Option<ProgressBar>,
    profile: Option<ProgressBar>,
    card: Option<ProgressBar>,
    _multi: MultiProgress,
}

impl ProgressBars {
    fn new(mode: ContentMode) -> Self {
        let multi = MultiProgress::new();
        let style = match ProgressStyle::with_template("{msg:>8} [{bar:32}] {pos}/{len}") {
            Ok(style) => style.progress_chars("=> "),
            Err(_) => ProgressStyle::default_bar(),
        };

        let bar = |label: &str| {
            multi.add(
                ProgressBar::new(0)
                    .with_style(style.clone())
                    .with_message(label.to_string()),
            )
        };

        let categories = mode.categories();
        Self {
            overall: categories.contains(&Category::Solo).then(|| bar("overall")),
            profile: categories.contains(&Category::Profile).then(|| bar("profile")),
            card: categories.contains(&Category::Card).then(|| bar("card")),
            _multi: multi,
        }
    }

    fn update(&self, snapshot: &ProgressSnapshot) {
        let pairs = [
            (&self.overall, snapshot.overall),
            (&self.profile, snapshot.profile),
            (&self.card, snapshot.card),
        ];
        for (bar, progress) in pairs {
            if let Some(bar) = bar {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.attempted as u64);
            }
        }
    }

    fn finish(&self) {
        for bar in [&self.overall, &self.profile, &self.card].into_iter().flatten() {
            bar.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_fetch_args() {
        let args = Args::parse_from([
            "koevault",
            "fetch",
            "--character-id",
            "21",
            "--mode",
            "voices",
            "--max-cards",
            "10",
        ]);

        match args.command {
            Command::Fetch {
                character_id,
                mode,
                max_cards,
                workers,
                ..
            } => {
                assert_eq!(character_id, 21);
                assert_eq!(mode, ContentMode::Voices);
                assert_eq!(max_cards, 10);
                assert_eq!(workers, DownloadConfig::DEFAULT_WORKERS);
            }
            other => panic!("parsed into the wrong subcommand: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_mode_alias() {
        let args = Args::parse_from([
            "koevault",
            "fetch",
            "--character-id",
            "3",
            "--mode",
            "2",
        ]);

        match args.command {
            Command::Fetch { mode, .. } => assert_eq!(mode, ContentMode::Solo),
            other => panic!("parsed into the wrong subcommand: {:?}", other),
        }
    }
}
