//! dirsweep: find heavy dependency/build directories and delete them.
//!
//! Thin binary entry point. All logic lives in the `dirsweep-core` crate.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dirsweep_core::analysis::{is_safe_to_delete, NewestFile};
use dirsweep_core::size::format_size;
use dirsweep_core::{DeleteOptions, FoundFolder, ScanOptions, SortBy, Sweeper};
use tracing::{info, warn};

/// Find and delete node_modules (or any other named directories)
#[derive(Parser, Debug)]
#[command(name = "dirsweep")]
#[command(version)]
struct Args {
    /// Root folder to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Directory names to look for (repeatable)
    #[arg(short, long = "target", default_values_t = ["node_modules".to_string()])]
    targets: Vec<String>,

    /// Skip any path containing this text (repeatable)
    #[arg(short = 'E', long)]
    exclude: Vec<String>,

    /// Order of the final listing
    #[arg(short, long, value_enum)]
    sort: Option<SortArg>,

    /// Delete every safe hit after the scan
    #[arg(short = 'D', long)]
    delete: bool,

    /// Also delete hits flagged as sensitive
    #[arg(long, requires = "delete")]
    force: bool,

    /// Pretend to delete
    #[arg(long)]
    dry_run: bool,

    /// Skip risk analysis of hits
    #[arg(long)]
    no_risk_analysis: bool,

    /// Print one JSON object per hit instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Path,
    Size,
    LastMod,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Path => SortBy::Path,
            SortArg::Size => SortBy::Size,
            SortArg::LastMod => SortBy::LastMod,
        }
    }
}

struct Hit {
    folder: FoundFolder,
    size: Option<u64>,
    newest: Option<NewestFile>,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--json` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let root = args.path.canonicalize().unwrap_or_else(|_| args.path.clone());

    let sweeper = Sweeper::new()?;
    sweeper.validate_root(&root)?;

    let mut options = ScanOptions::new(args.targets.iter().cloned())
        .with_exclude(args.exclude.iter().cloned());
    options.sort_by = args.sort.map(SortBy::from);
    options.perform_risk_analysis = !args.no_risk_analysis;

    info!("dirsweep scanning {}", root.display());

    let mut hits = Vec::new();
    for item in sweeper.start_scan(&root, options.clone()) {
        let path = item?;
        let size = match sweeper.get_size(&path).recv() {
            Ok(Ok(size)) => Some(size),
            Ok(Err(err)) => {
                warn!("{err}");
                None
            }
            Err(_) => None,
        };
        let newest = path.parent().and_then(|project| sweeper.newest_file(project));
        let hit = Hit {
            folder: sweeper.found_folder(path, &options),
            size,
            newest,
        };
        if options.sort_by.is_none() {
            print_hit(&hit, args.json)?;
        }
        hits.push(hit);
    }

    if let Some(sort_by) = options.sort_by {
        sort_hits(&mut hits, sort_by);
        for hit in &hits {
            print_hit(hit, args.json)?;
        }
    }

    let total: u64 = hits.iter().filter_map(|h| h.size).sum();
    info!("{} directories found, {} total", hits.len(), format_size(total));

    if args.delete {
        delete_hits(&sweeper, &hits, &options, &args);
    }

    Ok(())
}

fn sort_hits(hits: &mut [Hit], sort_by: SortBy) {
    match sort_by {
        SortBy::Path => hits.sort_by(|a, b| a.folder.path.cmp(&b.folder.path)),
        SortBy::Size => hits.sort_by(|a, b| b.size.cmp(&a.size)),
        // Stalest projects first.
        SortBy::LastMod => hits.sort_by_key(|h| h.newest.as_ref().map(|n| n.modified)),
    }
}

fn print_hit(hit: &Hit, json: bool) -> anyhow::Result<()> {
    if json {
        let line = serde_json::json!({
            "folder": hit.folder,
            "size": hit.size,
            "newestFile": hit.newest,
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let size = hit.size.map(format_size).unwrap_or_else(|| "?".into());
    let age = hit
        .newest
        .as_ref()
        .map(|n| n.modified.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into());
    let risk = match &hit.folder.risk_analysis {
        Some(r) if r.is_sensitive => format!("  [!] {}", r.reason.unwrap_or("sensitive")),
        _ => String::new(),
    };
    println!("{size:>10}  {age}  {}{risk}", hit.folder.path.display());
    Ok(())
}

fn delete_hits(sweeper: &Sweeper, hits: &[Hit], options: &ScanOptions, args: &Args) {
    let delete_options = DeleteOptions {
        dry_run: args.dry_run,
        ..DeleteOptions::default()
    };
    let mut freed = 0;

    for hit in hits {
        let path = &hit.folder.path;
        if !is_safe_to_delete(path, &options.targets) {
            warn!("Refusing to delete {}: not a target directory", path.display());
            continue;
        }
        let sensitive = hit.folder.risk_analysis.is_some_and(|r| r.is_sensitive);
        if sensitive && !args.force {
            warn!("Skipping sensitive {} (use --force)", path.display());
            continue;
        }
        // Failures are logged by the sweeper; keep going with the rest.
        if let Ok(true) = sweeper.delete(path, &delete_options) {
            freed += hit.size.unwrap_or(0);
        }
    }

    match sweeper.selected_strategy_name() {
        Some(strategy) => info!("Freed {} using {strategy}", format_size(freed)),
        None => info!("Freed {}", format_size(freed)),
    }
}
