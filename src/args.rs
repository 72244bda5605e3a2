use anyhow::{bail, Result};
use clap::{ArgAction, ArgGroup, Parser};
use std::path::{Path, PathBuf};

use crate::processor::ProcessOptions;

#[derive(Debug, Parser)]
#[command(
    name = "exif-headliner",
    version,
    about = "Fill missing IPTC headline and date fields from directory names",
    group(ArgGroup::new("target").required(true).args(["directory", "current"]))
)]
pub struct Args {
    /// Directory to process; relative paths resolve against --archive-root
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Process the current working directory
    #[arg(long)]
    pub current: bool,

    /// Base for relative --directory values
    #[arg(long, value_name = "DIR", env = "EXIF_HEADLINER_ROOT")]
    pub archive_root: Option<PathBuf>,

    /// JSON metadata template (defaults to headline + date created)
    #[arg(long, value_name = "FILE", env = "EXIF_HEADLINER_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Skip directories whose relative path contains this keyword (repeatable)
    #[arg(long, value_name = "KEYWORD", default_value = "received")]
    pub exclude: Vec<String>,

    /// Show the updates that would be made without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Do not leave completion markers while walking
    #[arg(long)]
    pub no_checkpoints: bool,

    /// exiftool executable to use instead of the one on PATH
    #[arg(long, value_name = "PATH")]
    pub exiftool: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Resolve and validate the directory to process
    pub fn resolve_root(&self, cwd: &Path) -> Result<PathBuf> {
        let root = match (&self.directory, self.current) {
            (_, true) => cwd.to_path_buf(),
            (Some(dir), false) if dir.is_absolute() => dir.clone(),
            (Some(dir), false) => match &self.archive_root {
                Some(base) => base.join(dir),
                None => cwd.join(dir),
            },
            (None, false) => bail!("Either --directory or --current must be given"),
        };

        if !root.exists() {
            bail!("Directory does not exist: {}", root.display());
        }
        if !root.is_dir() {
            bail!("Path is not a directory: {}", root.display());
        }

        Ok(root)
    }

    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            dry_run: self.dry_run,
            checkpoints: !self.no_checkpoints,
            exclude: self.exclude.clone(),
        }
    }
}
