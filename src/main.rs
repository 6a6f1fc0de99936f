use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use treediff::{
    build_options, build_pair, diff_snapshots, render_report, render_tree, Args, ReportOptions,
};

fn setup_tracing(args: &Args) {
    if let Some(level) = args.log_level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .without_time()
            .compact()
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(&args);
    debug!("Parsed CLI arguments: {args:?}");

    let opts = build_options(&args)?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = opts.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool.build().context("Failed to start worker threads")?;

    let (left, right) = pool
        .install(|| build_pair(&args.left_dir, &args.right_dir, &opts.ignore_patterns))
        .with_context(|| {
            format!(
                "Failed to compare {:?} with {:?}",
                args.left_dir, args.right_dir
            )
        })?;

    if opts.print_tree {
        println!("== {} ==", args.left_dir.display());
        print!("{}", render_tree(&left));
        println!("== {} ==", args.right_dir.display());
        print!("{}", render_tree(&right));
        println!();
    }

    let diff = diff_snapshots(&left, &right);
    print!(
        "{}",
        render_report(
            &diff,
            ReportOptions {
                color: opts.color,
                show_identical: opts.show_identical,
            }
        )
    );

    Ok(())
}
