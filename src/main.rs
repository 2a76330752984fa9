// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use podcatch::{
    CancelHandle, Config, DownloadStatus, EmbedStatus, FilterCriteria, NoopReporter,
    ProgressEvent, ProgressReporter, ReqwestClient, RunPhase, RunReport, RunRequest, RunStatus,
    SharedProgressReporter,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static TAG: Emoji<'_, '_> = Emoji("🏷️  ", "[t] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Download podcast episodes selected by date or title
#[derive(Parser, Debug)]
#[command(name = "podcatch")]
#[command(about = "Download podcast episodes selected by date or title, with embedded metadata")]
#[command(version)]
struct Args {
    /// RSS or Atom feed URL
    feed_url: String,

    /// Base directory; episodes land in a subdirectory named after the podcast
    output_dir: PathBuf,

    /// Episodes published on this day (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["from", "to", "name", "latest"])]
    date: Option<String>,

    /// Episodes published on or after this day (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["name", "latest"])]
    from: Option<String>,

    /// Episodes published on or before this day (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["name", "latest"])]
    to: Option<String>,

    /// Episodes whose title contains this text (case-insensitive)
    #[arg(long, conflicts_with = "latest")]
    name: Option<String>,

    /// The N most recent episodes
    #[arg(long)]
    latest: Option<usize>,

    /// Do not write tags or artwork into downloaded files
    #[arg(long)]
    no_metadata: bool,

    /// Maximum number of concurrent downloads
    #[arg(short = 'c', long, env = "PODCATCH_CONCURRENCY", default_value = "3")]
    concurrent: usize,

    /// Seconds to wait for a download to respond or make progress
    #[arg(long, env = "PODCATCH_TIMEOUT", default_value = "60")]
    timeout: u64,

    /// User-Agent header sent to feed and media hosts
    #[arg(long, env = "PODCATCH_USER_AGENT")]
    user_agent: Option<String>,

    /// Print the run report as JSON instead of progress output
    #[arg(long)]
    json: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn criteria(&self) -> Result<Option<FilterCriteria>> {
        let criteria = if let Some(date) = &self.date {
            Some(FilterCriteria::exact_date(date)?)
        } else if self.from.is_some() || self.to.is_some() {
            Some(FilterCriteria::date_range(
                self.from.as_deref(),
                self.to.as_deref(),
            )?)
        } else if let Some(name) = &self.name {
            Some(FilterCriteria::name(name)?)
        } else if let Some(count) = self.latest {
            Some(FilterCriteria::latest(count)?)
        } else {
            None
        };
        Ok(criteria)
    }

    fn config(&self) -> Config {
        let mut config = Config {
            max_concurrent: self.concurrent,
            download_timeout: Duration::from_secs(self.timeout),
            ..Default::default()
        };
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, episode_id: usize) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(bar) = bars.get(&episode_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(episode_id, bar.clone());
        bar
    }

    fn finish_bar(&self, episode_id: usize) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.remove(&episode_id) {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PhaseChanged { phase } => {
                if phase == RunPhase::Embedding {
                    self.main_bar
                        .set_message(format!("{TAG}Writing tags and artwork"));
                }
            }

            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                podcast_title,
                total_episodes,
                selected_episodes,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} episodes total, {} selected",
                    podcast_title.bold().green(),
                    total_episodes.to_string().cyan(),
                    selected_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::DownloadStarting {
                episode_id,
                episode_title,
                content_length,
            } => {
                let bar = self.get_or_create_bar(episode_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(truncate_title(&episode_title, 40));
            }

            ProgressEvent::DownloadProgress {
                episode_id,
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                let bar = self.get_or_create_bar(episode_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadCompleted {
                episode_id,
                episode_title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(episode_id);
                bar.set_position(bytes_downloaded);
                bar.set_message(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 40).green()
                ));
                self.finish_bar(episode_id);
            }

            ProgressEvent::DownloadFailed {
                episode_id,
                episode_title,
                error,
            } => {
                let bar = self.get_or_create_bar(episode_id);
                bar.abandon_with_message(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.finish_bar(episode_id);
            }

            ProgressEvent::EpisodeWarning {
                episode_title,
                message,
                ..
            } => {
                let _ = self.multi.println(format!(
                    "  {WARNING}{} - {}",
                    truncate_title(&episode_title, 30).yellow(),
                    message.dimmed()
                ));
            }

            ProgressEvent::RunCompleted {
                succeeded,
                failed,
                cancelled,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} failed, {} cancelled",
                    "Done:".bold().green(),
                    succeeded.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    },
                    cancelled.to_string().yellow(),
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("podcatch={level}")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn print_summary(report: &RunReport) {
    if report.outcomes.is_empty() {
        println!(
            "{HEADPHONES}No episodes of {} matched ({} in feed)",
            report.podcast_title.bold(),
            report.total_episodes
        );
        return;
    }

    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match &o.download {
            DownloadStatus::Failed { reason } => Some((o, reason)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        println!("\n{}", "Failed episodes:".red().bold());
        for (outcome, reason) in failed {
            println!("  {}{} - {}", CROSS, outcome.title.yellow(), reason.dimmed());
        }
    }

    let untagged = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.embed, EmbedStatus::Failed { .. }))
        .count();
    if untagged > 0 {
        println!(
            "\n{WARNING}{} downloaded episode(s) could not be tagged",
            untagged.to_string().yellow()
        );
    }

    println!(
        "\n{FOLDER}Output: {}\n",
        report.podcast_dir.display().to_string().cyan()
    );
}

fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Empty | RunStatus::AllSucceeded => 0,
        RunStatus::AllFailed => 1,
        RunStatus::Partial => 2,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let criteria = args.criteria().context("Invalid episode selection")?;
    let config = args.config();
    let show_progress = !args.quiet && !args.json;

    if show_progress {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podcatch".bold().magenta(),
            "- Podcast Episode Downloader".dimmed()
        );
    }

    let client = ReqwestClient::from_config(&config).context("Failed to build HTTP client")?;

    let reporter: SharedProgressReporter = if show_progress {
        Arc::new(IndicatifReporter::new())
    } else {
        NoopReporter::shared()
    };

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing downloads already in progress");
            on_interrupt.cancel();
        }
    });

    let request = RunRequest {
        feed_url: args.feed_url.clone(),
        criteria,
        output_dir: args.output_dir.clone(),
        embed_metadata: !args.no_metadata,
    };

    let report = podcatch::run(&client, &request, &config, reporter, &cancel)
        .await
        .context("Failed to download episodes")?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else if !args.quiet {
        print_summary(&report);
    }

    let code = exit_code(report.status());
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
