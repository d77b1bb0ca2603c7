//! doctype - Documentation drift detection for TypeScript
//!
//! Tracks documented symbols through anchors, flags documentation whose
//! symbol signature changed, and applies surgical updates.

use anyhow::Result;
use doctype::cli::{
    analyze, check, fix, init, patch, print_analysis_text, print_check_text, print_fix_text,
    print_json, print_patch_text, print_scan_text, Cli, Commands, FixRequest, OutputFormat,
};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let project_path = Path::new(&cli.path);

    match cli.command {
        Commands::Init(args) => {
            let summary = init(project_path, args.force)?;
            match cli.format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Text => print_scan_text(&summary),
            }
        }

        Commands::Check(args) => {
            let report = check(project_path)?;
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_check_text(&report, args.quiet),
            }
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Fix(args) => {
            let content = match (&args.content, &args.content_file) {
                (Some(text), _) => Some(text.clone()),
                (None, Some(file)) => Some(std::fs::read_to_string(file).map_err(|e| {
                    anyhow::anyhow!("Failed to read content file {:?}: {}", file, e)
                })?),
                (None, None) => None,
            };
            let request = FixRequest {
                id: args.id.clone(),
                content,
                dry_run: args.dry_run,
            };

            let outcomes = fix(project_path, &request)?;
            match cli.format {
                OutputFormat::Json => print_json(&outcomes)?,
                OutputFormat::Text => print_fix_text(&outcomes, args.dry_run),
            }
        }

        Commands::Patch(args) => {
            let report = patch(project_path, &args.doc, &args.old, &args.new, args.dry_run)?;
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_patch_text(&report, args.dry_run),
            }
            if !report.result.success {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Analyze(args) => {
            let symbols = analyze(project_path, &args.file)?;
            match cli.format {
                OutputFormat::Json => print_json(&symbols)?,
                OutputFormat::Text => print_analysis_text(&args.file, &symbols),
            }
        }

        Commands::Watch(args) => {
            run_watch(project_path, args.debounce)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Run in watch mode
fn run_watch(path: &Path, debounce_ms: u64) -> Result<()> {
    use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    // Fail early if the project is not set up
    check(path)?;

    println!("Watching for changes in {:?}...", path);
    println!("Press Ctrl+C to stop.\n");

    let (tx, rx) = channel();

    let config = Config::default().with_poll_interval(Duration::from_millis(debounce_ms));

    let mut watcher = RecommendedWatcher::new(tx, config)?;
    watcher.watch(path, RecursiveMode::Recursive)?;

    let debounce = Duration::from_millis(debounce_ms);
    let mut last_check: Option<Instant> = None;

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                // Debounce
                if last_check.is_some_and(|t| t.elapsed() < debounce) {
                    continue;
                }

                let relevant = event.paths.iter().any(|p| {
                    let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
                    let in_node_modules = p.components().any(|c| c.as_os_str() == "node_modules");
                    !in_node_modules
                        && matches!(ext, "ts" | "tsx" | "mts" | "cts" | "js" | "jsx" | "md")
                });

                if relevant {
                    println!("\n📝 Changes detected, checking...");

                    match check(path) {
                        Ok(report) => print_check_text(&report, false),
                        Err(e) => eprintln!("Check error: {}", e),
                    }

                    last_check = Some(Instant::now());
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watch event error: {}", e);
            }
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}
