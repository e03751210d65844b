use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use album_suggester::additions::{find_additions, load_albums};
use album_suggester::assets::{filter_rows, load_excluded_ids, load_rows, AssetRecord, RawAssetRow};
use album_suggester::export::{export_additions, export_candidates, ExportFormat};
use album_suggester::logging::{self, LogTarget};
use album_suggester::{cluster_rows, Config};

struct Args {
    input: PathBuf,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    format: ExportFormat,
    exclude: Option<PathBuf>,
    additions: Option<PathBuf>,
    verbose: bool,
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> String {
    if *i + 1 < args.len() {
        *i += 1;
        args[*i].clone()
    } else {
        eprintln!("Error: {} requires an argument", flag);
        std::process::exit(1);
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut input = None;
    let mut config_path = None;
    let mut output = None;
    let mut format = ExportFormat::Json;
    let mut exclude = None;
    let mut additions = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("album-suggester {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--input" | "-i" => input = Some(PathBuf::from(take_value(&args, &mut i, "--input"))),
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(take_value(&args, &mut i, "--config")))
            }
            "--output" | "-o" => output = Some(PathBuf::from(take_value(&args, &mut i, "--output"))),
            "--format" | "-f" => {
                let value = take_value(&args, &mut i, "--format");
                format = match ExportFormat::parse(&value) {
                    Ok(format) => format,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                };
            }
            "--exclude" => exclude = Some(PathBuf::from(take_value(&args, &mut i, "--exclude"))),
            "--additions" => {
                additions = Some(PathBuf::from(take_value(&args, &mut i, "--additions")))
            }
            "--verbose" | "-v" => verbose = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(input) = input else {
        eprintln!("Error: --input is required");
        print_help();
        std::process::exit(1);
    };

    Args {
        input,
        config_path,
        output,
        format,
        exclude,
        additions,
        verbose,
    }
}

fn print_help() {
    println!(
        r#"album-suggester - suggest photo albums from clustered events

USAGE:
    album-suggester --input PATH [OPTIONS]

OPTIONS:
    --input, -i PATH     Asset rows (.json array or .csv with header)
    --config, -c PATH    Path to config file
    --output, -o PATH    Output file (default: suggestions.<format> or additions.json)
    --format, -f FORMAT  json or csv (default: json)
    --exclude PATH       Ids of assets already in a suggestion (.json or one per line)
    --additions PATH     Match rows against these albums instead of clustering
    --verbose, -v        Log to stderr at debug level
    --version, -V        Show version
    --help, -h           Show this help message

ENVIRONMENT:
    ALBUM_SUGGESTER_CONFIG  Path to config file (overrides default location)
    ALBUM_SUGGESTER_LOG     Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/album-suggester/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    let target = if args.verbose {
        LogTarget::Stderr
    } else {
        LogTarget::System(None)
    };
    let _ = logging::init(target);

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let excluded = match &args.exclude {
        Some(path) => load_excluded_ids(path)?,
        None => HashSet::new(),
    };
    let rows = filter_rows(load_rows(&args.input)?, &excluded, config.dev_mode.row_limit());

    match &args.additions {
        Some(albums_path) => run_additions(&args, &config, &rows, albums_path),
        None => run_clustering(&args, &config, &rows),
    }
}

fn run_clustering(args: &Args, config: &Config, rows: &[RawAssetRow]) -> Result<()> {
    let (candidates, report) = cluster_rows(rows, config).context("Clustering failed")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("suggestions.{}", args.format.extension())));
    export_candidates(&candidates, &report, &config.defaults, &output, args.format)
        .with_context(|| format!("Failed to write {:?}", output))?;

    info!("Wrote {} candidates to {:?}", candidates.len(), output);
    println!(
        "{} rows, {} kept, {} eventlets, {} album candidates -> {} ({})",
        report.preprocess.rows_in,
        report.preprocess.kept,
        report.eventlets,
        candidates.len(),
        output.display(),
        args.format.name()
    );
    Ok(())
}

fn run_additions(args: &Args, config: &Config, rows: &[RawAssetRow], albums_path: &Path) -> Result<()> {
    let pool: Vec<AssetRecord> = rows
        .iter()
        .filter_map(|row| match AssetRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping asset {}: {}", row.id, e);
                None
            }
        })
        .collect();

    let albums = load_albums(albums_path)?;
    let additions = find_additions(&pool, &albums, &config.additions)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("additions.json"));
    let proposed = export_additions(&additions, &output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!(
        "{} albums, {} with additions, {} assets proposed -> {}",
        albums.len(),
        additions.len(),
        proposed,
        output.display()
    );
    Ok(())
}
