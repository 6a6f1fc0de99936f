use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glob::Pattern;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Left (old) directory
    pub left_dir: PathBuf,

    /// Right (new) directory
    pub right_dir: PathBuf,

    /// Glob patterns to ignore (can be repeated or comma separated)
    #[arg(short, long, value_delimiter = ',', num_args = 1..)]
    pub ignore: Vec<String>,

    /// Also list files that are identical on both sides
    #[arg(long)]
    pub show_identical: bool,

    /// Print both directory trees before the report
    #[arg(long)]
    pub tree: bool,

    /// When to color the report
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorChoice,

    /// Worker threads used for fingerprinting (defaults to all cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    #[arg(short, long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

#[derive(Debug)]
pub struct Options {
    pub ignore_patterns: Vec<Pattern>,
    pub show_identical: bool,
    pub print_tree: bool,
    pub color: bool,
    pub jobs: Option<usize>,
}

pub fn build_options(args: &Args) -> Result<Options> {
    let patterns = args
        .ignore
        .iter()
        .map(|s| Pattern::new(s).with_context(|| format!("Invalid glob pattern: {s}")))
        .collect::<Result<Vec<_>>>()?;

    if args.jobs == Some(0) {
        anyhow::bail!("--jobs must be at least 1");
    }

    let color = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::io::stdout().is_terminal()
                && supports_color::on(supports_color::Stream::Stdout).is_some()
        }
    };

    Ok(Options {
        ignore_patterns: patterns,
        show_identical: args.show_identical,
        print_tree: args.tree,
        color,
        jobs: args.jobs,
    })
}
