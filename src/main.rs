use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bucketsync::config::SyncConfig;
use bucketsync::storage::S3Provider;
use bucketsync::sync::{CredentialProfile, SyncEngine, SyncOutcome, SyncPhase, SyncProgress};

/// Exit code when some objects failed to copy and `--fail-on-error` is set.
const EXIT_COPY_FAILURES: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "bucketsync", version)]
#[command(about = "Copy objects missing from a destination bucket prefix, server-side")]
struct Cli {
    /// Source location, s3://bucket/prefix
    #[arg(env = "SOURCE_URI")]
    source: String,

    /// Destination location, s3://bucket/prefix
    #[arg(env = "DESTINATION_URI")]
    destination: String,

    /// Shared-config credential profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Config file (default: <config dir>/bucketsync/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show what would be copied without copying
    #[arg(long)]
    dry_run: bool,

    /// Copy tasks in flight at once
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Skip source keys matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Region used when bucket region discovery fails
    #[arg(long, value_name = "REGION")]
    fallback_region: Option<String>,

    /// S3-compatible endpoint URL
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Per-object time budget in seconds
    #[arg(long, value_name = "SECS")]
    task_timeout: Option<u64>,

    /// Deadline for the whole copy phase in seconds
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Storage requests per second during the copy phase (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_requests_per_second: Option<u32>,

    /// Exit non-zero when any object fails to copy
    #[arg(long)]
    fail_on_error: bool,
}

impl Cli {
    /// Flags override values from the config file.
    fn apply(&self, config: &mut SyncConfig) {
        if self.profile.is_some() {
            config.profile = self.profile.clone();
        }
        if let Some(ref region) = self.fallback_region {
            config.fallback_region = region.clone();
        }
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(secs) = self.task_timeout {
            config.task_timeout_secs = secs;
        }
        if self.deadline.is_some() {
            config.run_deadline_secs = self.deadline;
        }
        if let Some(rps) = self.max_requests_per_second {
            config.max_requests_per_second = rps;
        }
        config.exclude.extend(self.exclude.iter().cloned());
        config.dry_run |= self.dry_run;
        config.fail_on_copy_error |= self.fail_on_error;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config =
        SyncConfig::load_or_default(cli.config.as_deref()).context("Failed to load config")?;
    cli.apply(&mut config);
    config.validate().context("Invalid options")?;

    let profile = config
        .profile
        .as_deref()
        .map(CredentialProfile::named)
        .unwrap_or_default();
    let mut provider = S3Provider::new(profile);
    if let Some(ref endpoint) = config.endpoint {
        provider = provider.with_endpoint(endpoint.clone());
    }

    let fail_on_copy_error = config.fail_on_copy_error;
    let (tx, rx) = mpsc::channel(256);
    let printer = spawn_progress_printer(rx);

    let engine = SyncEngine::new(Arc::new(provider), config).with_progress(tx);
    let result = engine.run(&cli.source, &cli.destination).await;
    // Closes the channel so the printer drains and exits.
    drop(engine);
    let _ = printer.await;

    let report = result.with_context(|| format!("Sync {} --> {} failed", cli.source, cli.destination))?;

    let summary = report.render();
    match report.outcome() {
        SyncOutcome::NothingToDo | SyncOutcome::Completed => print!("{}", summary.green()),
        SyncOutcome::DryRun(_) => print!("{}", summary.cyan()),
        SyncOutcome::CompletedWithFailures(_) => print!("{}", summary.yellow()),
    }

    if !report.is_success() && fail_on_copy_error {
        return Ok(EXIT_COPY_FAILURES);
    }
    Ok(0)
}

/// Print copy lines and drive a progress bar from engine events.
fn spawn_progress_printer(mut rx: mpsc::Receiver<SyncProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut printer = ProgressPrinter::new(io::stdout(), io::stdout().is_terminal());
        while let Some(event) = rx.recv().await {
            printer.handle(event);
        }
        printer.finish();
    })
}

/// Writes progress lines to `out`. The bar is drawn on stdout only when
/// stdout is a terminal; lines are written either way.
struct ProgressPrinter<W: Write> {
    out: W,
    show_bar: bool,
    planned: u64,
    bar: Option<ProgressBar>,
}

impl<W: Write> ProgressPrinter<W> {
    fn new(out: W, show_bar: bool) -> Self {
        Self {
            out,
            show_bar,
            planned: 0,
            bar: None,
        }
    }

    fn handle(&mut self, event: SyncProgress) {
        match event {
            SyncProgress::DiffReady { objects, .. } => self.planned = objects as u64,
            SyncProgress::Phase(SyncPhase::Copying) => {
                if self.show_bar {
                    let pb = ProgressBar::with_draw_target(
                        Some(self.planned),
                        ProgressDrawTarget::stdout(),
                    );
                    pb.set_style(bar_style());
                    self.bar = Some(pb);
                }
            }
            SyncProgress::Phase(SyncPhase::Complete) => self.finish(),
            SyncProgress::Phase(_) => {}
            SyncProgress::TaskStarted { from, to } => {
                let line = format!("Copying {} --> {}", from, to).cyan().to_string();
                self.print_line(&line);
            }
            SyncProgress::TaskCompleted { .. } => {
                if let Some(ref pb) = self.bar {
                    pb.inc(1);
                }
            }
            SyncProgress::TaskFailed { key, reason } => {
                let line = format!("Failed {}: {}", key, reason).red().to_string();
                self.print_line(&line);
                if let Some(ref pb) = self.bar {
                    pb.inc(1);
                }
            }
        }
    }

    fn print_line(&mut self, line: &str) {
        let out = &mut self.out;
        match self.bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = writeln!(out, "{}", line);
            }),
            None => {
                let _ = writeln!(out, "{}", line);
            }
        }
        let _ = out.flush();
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} objects ({percent}%)")
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
