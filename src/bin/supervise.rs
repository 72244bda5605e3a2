use anyhow::{Context, Result};
use clap::Parser;
use exif_headliner::supervisor::{RestartPolicy, Supervisor};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "headliner-supervise",
    version,
    about = "Keep exif-headliner running on one directory until it completes"
)]
struct Cli {
    /// Directory to process (passed to exif-headliner --directory)
    #[arg(long, value_name = "DIR")]
    directory: PathBuf,

    /// Seconds to wait before restarting after an unsuccessful exit
    #[arg(long, default_value_t = 30)]
    interval_secs: u64,

    /// Stop after this many restarts
    #[arg(long)]
    max_restarts: Option<u32>,

    /// File that receives one line per restart
    #[arg(long, value_name = "FILE", default_value = "headliner-restarts.log")]
    log_file: PathBuf,

    /// exif-headliner executable (defaults to the one next to this binary)
    #[arg(long, value_name = "PATH")]
    program: Option<PathBuf>,

    /// Extra arguments passed through to exif-headliner
    #[arg(last = true)]
    extra: Vec<String>,
}

fn default_program() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    Ok(exe.with_file_name("exif-headliner"))
}

fn run(cli: Cli) -> Result<()> {
    let program = match cli.program {
        Some(p) => p,
        None => default_program()?,
    };

    let directory = std::fs::canonicalize(&cli.directory)
        .with_context(|| format!("Directory does not exist: {}", cli.directory.display()))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install signal handler")?;

    let mut args = vec![
        "--directory".to_string(),
        directory.to_string_lossy().into_owned(),
    ];
    args.extend(cli.extra);

    let supervisor = Supervisor {
        program,
        args,
        directory,
        policy: RestartPolicy {
            interval: Duration::from_secs(cli.interval_secs),
            max_restarts: cli.max_restarts,
        },
        log_file: cli.log_file,
        shutdown,
    };

    supervisor.run()?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
