//! CLI argument parsing

use crate::CheckOptions;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    List(ListArgs),
    Check(CheckArgs),
    View(ViewArgs),
}

/// Options shared by every command that crawls a site
#[derive(Debug, Clone)]
pub struct CrawlArgs {
    pub root: String,
    pub site: String,
    pub location: String,
    pub directories: Vec<String>,
    pub threads: usize,
    pub retries: usize,
    pub stop_file: Option<String>,
    pub quiet: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub crawl: CrawlArgs,
    pub snapshot: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckArgs {
    pub crawl: CrawlArgs,
    pub inventory: Option<String>,
    pub ignore_age_secs: Option<u64>,
    pub report: Option<String>,
    pub json: bool,
    pub protect: Vec<String>,
    pub missing_ok: Vec<String>,
    pub orphan_ok: Vec<String>,
    pub cache_dir: Option<String>,
    pub cache_age_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ViewArgs {
    pub snapshot: String,
    pub path: Option<String>,
    pub json: bool,
}

impl Default for CrawlArgs {
    fn default() -> Self {
        Self {
            root: String::new(),
            site: "local".to_string(),
            location: "/store".to_string(),
            directories: Vec::new(),
            threads: 0,
            retries: 3,
            stop_file: None,
            quiet: false,
        }
    }
}

impl Default for CheckArgs {
    fn default() -> Self {
        Self {
            crawl: CrawlArgs::default(),
            inventory: None,
            ignore_age_secs: None,
            report: None,
            json: false,
            protect: Vec::new(),
            missing_ok: Vec::new(),
            orphan_ok: Vec::new(),
            cache_dir: None,
            cache_age_secs: 86_400,
        }
    }
}

impl CrawlArgs {
    /// Library options for this crawl; the CLI never deletes anything.
    #[must_use]
    pub fn to_options(&self, ignore_age_secs: Option<u64>) -> CheckOptions {
        CheckOptions {
            location: self.location.clone(),
            directories: self.directories.clone(),
            threads: self.threads,
            max_attempts: self.retries,
            ignore_age: ignore_age_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            dry_run: true,
            ..CheckOptions::default()
        }
    }
}

/// Parse command line arguments
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    let command = match args[1].as_str() {
        "list" => Command::List(parse_list_args(&args[2..])?),
        "check" => Command::Check(parse_check_args(&args[2..])?),
        "view" => Command::View(parse_view_args(&args[2..])?),
        _ => return Err(format!("Unknown command: {}", args[1])),
    };

    Ok(CliArgs { command })
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{flag} must be a non-negative integer"))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply one crawl option at `args[*i]`. Returns false when the option is not a crawl option.
fn parse_crawl_arg(crawl: &mut CrawlArgs, args: &[String], i: &mut usize) -> Result<bool, String> {
    match args[*i].as_str() {
        "--site" => crawl.site = take_value(args, i, "--site")?.to_string(),
        "--location" => {
            let location = take_value(args, i, "--location")?;
            if !location.starts_with('/') {
                return Err("--location must be an absolute LFN prefix".to_string());
            }
            crawl.location = location.trim_end_matches('/').to_string();
        }
        "--dirs" => crawl.directories = split_list(take_value(args, i, "--dirs")?),
        "--threads" => crawl.threads = parse_number(take_value(args, i, "--threads")?, "--threads")?,
        "--retries" => {
            let retries: usize = parse_number(take_value(args, i, "--retries")?, "--retries")?;
            if retries == 0 {
                return Err("--retries must be greater than zero".to_string());
            }
            crawl.retries = retries;
        }
        "--stop-file" => crawl.stop_file = Some(take_value(args, i, "--stop-file")?.to_string()),
        "--quiet" => crawl.quiet = true,
        arg if !arg.starts_with("--") => {
            if crawl.root.is_empty() {
                crawl.root = arg.to_string();
            } else {
                return Err(format!("Unexpected argument: {arg}"));
            }
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_list_args(args: &[String]) -> Result<ListArgs, String> {
    let mut list_args = ListArgs::default();
    let mut i = 0;

    while i < args.len() {
        if !parse_crawl_arg(&mut list_args.crawl, args, &mut i)? {
            match args[i].as_str() {
                "--snapshot" => {
                    list_args.snapshot = Some(take_value(args, &mut i, "--snapshot")?.to_string());
                }
                _ => return Err(format!("Unknown option: {}", args[i])),
            }
        }
        i += 1;
    }

    if list_args.crawl.root.is_empty() {
        return Err("Missing required argument: LOCAL_ROOT".to_string());
    }

    Ok(list_args)
}

fn parse_check_args(args: &[String]) -> Result<CheckArgs, String> {
    let mut check_args = CheckArgs::default();
    let mut i = 0;

    while i < args.len() {
        if !parse_crawl_arg(&mut check_args.crawl, args, &mut i)? {
            match args[i].as_str() {
                "--inventory" => {
                    check_args.inventory =
                        Some(take_value(args, &mut i, "--inventory")?.to_string());
                }
                "--ignore-age" => {
                    check_args.ignore_age_secs = Some(parse_number(
                        take_value(args, &mut i, "--ignore-age")?,
                        "--ignore-age",
                    )?);
                }
                "--report" => {
                    check_args.report = Some(take_value(args, &mut i, "--report")?.to_string());
                }
                "--json" => check_args.json = true,
                "--protect" => {
                    check_args.protect = split_list(take_value(args, &mut i, "--protect")?);
                }
                "--missing-ok" => {
                    check_args.missing_ok = split_list(take_value(args, &mut i, "--missing-ok")?);
                }
                "--orphan-ok" => {
                    check_args.orphan_ok = split_list(take_value(args, &mut i, "--orphan-ok")?);
                }
                "--cache-dir" => {
                    check_args.cache_dir =
                        Some(take_value(args, &mut i, "--cache-dir")?.to_string());
                }
                "--cache-age" => {
                    check_args.cache_age_secs =
                        parse_number(take_value(args, &mut i, "--cache-age")?, "--cache-age")?;
                }
                _ => return Err(format!("Unknown option: {}", args[i])),
            }
        }
        i += 1;
    }

    if check_args.crawl.root.is_empty() {
        return Err("Missing required argument: LOCAL_ROOT".to_string());
    }

    Ok(check_args)
}

fn parse_view_args(args: &[String]) -> Result<ViewArgs, String> {
    let mut snapshot = String::new();
    let mut path = None;
    let mut json = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--path" => path = Some(take_value(args, &mut i, "--path")?.to_string()),
            "--json" => json = true,
            arg if !arg.starts_with("--") => {
                if snapshot.is_empty() {
                    snapshot = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if snapshot.is_empty() {
        return Err("Missing required argument: SNAPSHOT_FILE".to_string());
    }

    Ok(ViewArgs {
        snapshot,
        path,
        json,
    })
}
