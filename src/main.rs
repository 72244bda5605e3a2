use anyhow::Context;
use clap::Parser;
use exif_headliner::args::Args;
use exif_headliner::exif::ExifToolBackend;
use exif_headliner::processor::Processor;
use exif_headliner::template::MetadataTemplate;

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = match verbose {
        0 if quiet => "error",
        0 => "warn,exif_headliner=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose >= 2))
        .init();
}

fn run(args: Args) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let root = args.resolve_root(&cwd)?;

    let template = match &args.template {
        Some(path) => MetadataTemplate::load(path)?,
        None => MetadataTemplate::default(),
    };

    // Fail before walking anything if exiftool cannot be started
    let tool = ExifToolBackend::new(args.exiftool.as_deref())
        .context("exiftool is required; install it and make sure it is on PATH")?;

    let mut processor = Processor::new(tool, template, args.process_options());
    processor.process_root(&root)?;
    processor.print_summary();

    Ok(())
}
