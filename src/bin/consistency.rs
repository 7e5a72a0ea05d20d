//! Site Consistency CLI (consistency) - Main binary entry point

use consistency::cli::args::{CheckArgs, Command, CrawlArgs, ListArgs, ViewArgs, parse_args};
use consistency::cli::output::{
    format_json, format_text, format_view_json, format_view_text, summarize_children,
};
use consistency::io::cache::TreeCache;
use consistency::io::inventory::read_inventory_file;
use consistency::io::report::write_report;
use consistency::io::snapshot::{meta_for, read_tree, write_tree};
use consistency::services::lister::{LocalLister, build_pool};
use consistency::services::reconcile::prefix_filter;
use consistency::tree::join_path;
use consistency::{
    AlwaysRunning, CheckOptions, DirectoryInfo, EmptyRemover, Filters, LivenessCheck, Lister,
    RunContext, StopFileCheck,
};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // Initialize logger (controlled by RUST_LOG environment variable)
    // Example: RUST_LOG=debug consistency check /mnt/site --inventory site.txt
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            print_version();
            return;
        }
        _ => {}
    }

    let cli_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let exit_code = match &cli_args.command {
        Command::List(list_args) => handle_list(list_args),
        Command::Check(check_args) => handle_check(check_args),
        Command::View(view_args) => handle_view(view_args),
    };

    process::exit(exit_code);
}

fn exit_code_for(error: &consistency::Error) -> i32 {
    match error {
        consistency::Error::InvalidInput(_) => 2,
        consistency::Error::Cancelled { .. } => 5,
        _ => 4,
    }
}

/// Top-level directory names of `root`, sorted
fn discover_directories(root: &str) -> std::io::Result<Vec<String>> {
    let mut directories = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            directories.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    directories.sort();
    Ok(directories)
}

/// Resolve options, the run context and one local lister per worker.
fn prepare(
    crawl: &CrawlArgs,
    ignore_age_secs: Option<u64>,
) -> Result<(RunContext, Vec<Box<dyn Lister>>), i32> {
    if !Path::new(&crawl.root).is_dir() {
        eprintln!("Error: {} is not a directory", crawl.root);
        return Err(2);
    }

    let mut options: CheckOptions = crawl.to_options(ignore_age_secs);
    if options.directories.is_empty() {
        options.directories = match discover_directories(&crawl.root) {
            Ok(directories) => directories,
            Err(e) => {
                eprintln!("Error: cannot read {}: {e}", crawl.root);
                return Err(4);
            }
        };
    }
    if options.directories.is_empty() {
        eprintln!("Error: {} has no directories to check", crawl.root);
        return Err(2);
    }

    let liveness: Arc<dyn LivenessCheck> = match &crawl.stop_file {
        Some(path) => Arc::new(StopFileCheck::new(path)),
        None => Arc::new(AlwaysRunning),
    };
    let threads = options.worker_count();
    let ctx = RunContext::new(crawl.site.as_str(), options, liveness);

    let location = ctx.options.location.clone();
    let listers = build_pool(
        &ctx.site,
        std::slice::from_ref(&crawl.root),
        threads,
        |site, endpoint| {
            Ok(Box::new(LocalLister::new(site, endpoint, &location)) as Box<dyn Lister>)
        },
    )
    .map_err(|e| {
        eprintln!("Error: {e}");
        exit_code_for(&e)
    })?;

    if !crawl.quiet {
        eprintln!(
            "Listing {} under {} ({} directories, {} workers)",
            crawl.root,
            ctx.options.location,
            ctx.options.directories.len(),
            listers.len()
        );
    }
    Ok((ctx, listers))
}

fn handle_list(args: &ListArgs) -> i32 {
    let snapshot_path = if let Some(ref path) = args.snapshot {
        path.clone()
    } else {
        eprintln!("Error: --snapshot is required for list command");
        eprintln!("Example: consistency list /mnt/site --snapshot site.parquet");
        return 2;
    };

    let (ctx, mut listers) = match prepare(&args.crawl, None) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    let mut tree = match consistency::list_site(&ctx, &mut listers, None) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };
    tree.setup_hash();

    if let Err(e) = write_tree(&snapshot_path, &meta_for(&ctx.site, &tree), &tree) {
        eprintln!("Error: Failed to save snapshot: {e}");
        return 4;
    }

    let unlisted = tree.count_unlisted();
    if !args.crawl.quiet {
        eprintln!(
            "Snapshot saved: {snapshot_path} ({} files in {} directories, {unlisted} unlisted)",
            tree.count_files(),
            tree.count_nodes()
        );
    }

    if unlisted == 0 { 0 } else { 3 }
}

fn build_filters(args: &CheckArgs) -> Filters {
    let mut filters = Filters::new();
    if !args.missing_ok.is_empty() {
        filters = filters.with_missing_ok(prefix_filter(args.missing_ok.clone()));
    }
    if !args.orphan_ok.is_empty() {
        filters = filters.with_orphan_ok(prefix_filter(args.orphan_ok.clone()));
    }
    filters
}

fn handle_check(args: &CheckArgs) -> i32 {
    let inventory_path = if let Some(ref path) = args.inventory {
        path.clone()
    } else {
        eprintln!("Error: --inventory is required for check command");
        eprintln!("Example: consistency check /mnt/site --inventory site.txt");
        return 2;
    };

    let records = match read_inventory_file(Path::new(&inventory_path)) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error reading inventory: {e}");
            return 4;
        }
    };

    let (ctx, mut listers) = match prepare(&args.crawl, args.ignore_age_secs) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    let mut remover = EmptyRemover::for_context(&ctx, prefix_filter(args.protect.clone()), None);
    let filters = build_filters(args);

    let outcome = match &args.cache_dir {
        Some(dir) => {
            let cache = TreeCache::new(dir, Duration::from_secs(args.cache_age_secs));
            cache
                .load_or_build(&ctx.site, "remote", || {
                    consistency::list_site(&ctx, &mut listers, Some(&mut remover))
                })
                .and_then(|mut remote| {
                    let inventory = consistency::build_inventory_tree(&ctx.options, records);
                    consistency::compare_trees(&ctx, inventory, &mut remote, &remover, &filters)
                })
        }
        None => consistency::check_site(&ctx, records, &mut listers, &mut remover, &filters),
    };

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if let Some(base) = &args.report
        && let Err(e) = write_report(base, &report.reconciliation)
    {
        eprintln!("Error: Failed to write report: {e}");
        return 4;
    }

    if args.json {
        println!("{}", format_json(&report));
    } else if !args.crawl.quiet {
        format_text(&report);
    }

    if report.is_consistent() { 0 } else { 3 }
}

fn handle_view(args: &ViewArgs) -> i32 {
    let (meta, mut tree) = match read_tree(&args.snapshot) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error reading snapshot: {e}");
            return 4;
        }
    };
    tree.setup_hash();

    let (node, display_path): (&DirectoryInfo, String) = match &args.path {
        Some(path) => {
            let relative = path
                .strip_prefix(meta.root.as_str())
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(path)
                .trim_start_matches('/');
            match tree.get_node(relative) {
                Some(node) => (node, join_path(&meta.root, relative)),
                None => {
                    eprintln!("Error: Path '{path}' not found in snapshot");
                    return 2;
                }
            }
        }
        None => (&tree, meta.root.clone()),
    };

    let (summary, children) = summarize_children(node, &display_path);
    if args.json {
        println!("{}", format_view_json(&meta, &summary, &children));
    } else {
        format_view_text(&meta, &summary, &children);
    }

    0
}

fn print_help() {
    println!("Site Consistency CLI (consistency) - Compare a storage site against its inventory");
    println!();
    println!("USAGE:");
    println!("    consistency list <LOCAL_ROOT> --snapshot <FILE> [OPTIONS]");
    println!("    consistency check <LOCAL_ROOT> --inventory <FILE> [OPTIONS]");
    println!("    consistency view <SNAPSHOT> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    list      Crawl a site concurrently and persist the tree as a snapshot");
    println!("    check     Crawl a site and reconcile it against an inventory file");
    println!("    view      Summarize a stored tree");
    println!();
    println!("GLOBAL OPTIONS:");
    println!("    -h, --help                 Show this help message");
    println!("    -v, --version              Show version information");
    println!();
    println!("CRAWL OPTIONS (list, check):");
    println!("    --location <LFN>          LFN prefix mapped onto LOCAL_ROOT (default: /store)");
    println!("    --dirs <A,B,...>          Top-level directories to crawl (default: all)");
    println!("    --threads <N>             Listing workers (default: available parallelism)");
    println!("    --retries <N>             Listing attempts per directory (default: 3)");
    println!("    --site <NAME>             Site name used in logs and reports (default: local)");
    println!("    --stop-file <FILE>        Cancel the run once this file exists");
    println!("    --quiet                   Suppress non-error output");
    println!();
    println!("LIST OPTIONS:");
    println!("    --snapshot <FILE>         Save the tree to a Parquet snapshot (required)");
    println!();
    println!("CHECK OPTIONS:");
    println!("    --inventory <FILE>        Inventory lines: <lfn> <size> [mtime] (required)");
    println!("    --ignore-age <S>          Ignore files and directories newer than S seconds");
    println!("    --report <BASE>           Write BASE_missing.txt and BASE_orphan.txt");
    println!("    --json                    Emit machine-readable output");
    println!("    --protect <P,...>         Never prune empty directories under these prefixes");
    println!("    --missing-ok <P,...>      Accept missing files under these prefixes");
    println!("    --orphan-ok <P,...>       Accept orphan files under these prefixes");
    println!("    --cache-dir <DIR>         Reuse a recent remote tree from this directory");
    println!("    --cache-age <S>           Maximum age of a cached tree (default: 86400)");
    println!();
    println!("VIEW OPTIONS:");
    println!("    --path <LFN>              Focus on a directory inside the snapshot");
    println!("    --json                    Emit machine-readable output");
    println!();
    println!("EXIT CODES:");
    println!("    0 consistent, 2 invalid arguments, 3 differences or unlisted directories,");
    println!("    4 I/O or structural failure, 5 cancelled");
    println!();
    println!("EXAMPLES:");
    println!("    consistency list /mnt/site --dirs mc,data --snapshot site.parquet");
    println!("    consistency check /mnt/site --inventory site.txt --ignore-age 86400 --report out/site");
    println!("    consistency view site.parquet --path /store/mc --json");
}

fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_DATE: &str = env!("GIT_DATE");
    const BUILD_TARGET: &str = env!("BUILD_TARGET");

    println!("consistency {VERSION}");
    println!("Commit: {GIT_HASH} ({GIT_DATE})");
    println!("Target: {BUILD_TARGET}");

    #[cfg(debug_assertions)]
    println!("Build: debug");
    #[cfg(not(debug_assertions))]
    println!("Build: release");
}
