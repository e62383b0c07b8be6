//! Generate the navigation.yaml artifact from a discovered ui-map.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use uilens_cli::{init_tracing, load_ui_map, write_artifact};
use uilens_core::{paths_to_yaml, NavigationGenerator};

const APP_NAME: &str = "navigation-generator";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// Shortest path from the home page to every reachable page.
    Common,
    /// Shortest path between --from-page and --to-page.
    Specific,
    /// All simple paths between --from-page and --to-page.
    All,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "common" => Ok(Mode::Common),
            "specific" => Ok(Mode::Specific),
            "all" => Ok(Mode::All),
            other => Err(anyhow!(
                "unknown mode '{other}' (expected common, specific, or all)"
            )),
        }
    }
}

struct CliOptions {
    input: PathBuf,
    output: PathBuf,
    mode: Mode,
    from_page: Option<String>,
    to_page: Option<String>,
    max_paths: usize,
    max_length: usize,
    verbose: bool,
}

enum CliCommand {
    Run(CliOptions),
    Help,
    Version,
}

fn parse_arguments(args: &[String]) -> Result<CliCommand> {
    if args.is_empty() {
        return Ok(CliCommand::Help);
    }

    let mut input: Option<PathBuf> = None;
    let mut output = PathBuf::from("navigation.yaml");
    let mut mode = Mode::Common;
    let mut from_page: Option<String> = None;
    let mut to_page: Option<String> = None;
    let mut max_paths = 5usize;
    let mut max_length = 10usize;
    let mut verbose = false;
    let mut i = 0;

    let take_value = |args: &[String], i: usize, flag: &str| -> Result<String> {
        args.get(i + 1)
            .cloned()
            .ok_or_else(|| anyhow!("{flag} requires a value"))
    };

    while i < args.len() {
        let arg = &args[i];

        if matches!(arg.as_str(), "-h" | "--help") {
            return Ok(CliCommand::Help);
        }
        if matches!(arg.as_str(), "-V" | "--version") {
            return Ok(CliCommand::Version);
        }

        match arg.as_str() {
            "--input" => {
                input = Some(PathBuf::from(take_value(args, i, arg)?));
                i += 2;
            }
            "--output" => {
                output = PathBuf::from(take_value(args, i, arg)?);
                i += 2;
            }
            "--mode" => {
                mode = take_value(args, i, arg)?.parse()?;
                i += 2;
            }
            "--from-page" => {
                from_page = Some(take_value(args, i, arg)?);
                i += 2;
            }
            "--to-page" => {
                to_page = Some(take_value(args, i, arg)?);
                i += 2;
            }
            "--max-paths" => {
                let value = take_value(args, i, arg)?;
                max_paths = value
                    .parse()
                    .with_context(|| format!("--max-paths expects a number, got '{value}'"))?;
                i += 2;
            }
            "--max-length" => {
                let value = take_value(args, i, arg)?;
                max_length = value
                    .parse()
                    .with_context(|| format!("--max-length expects a number, got '{value}'"))?;
                i += 2;
            }
            "--verbose" => {
                verbose = true;
                i += 1;
            }
            other => return Err(anyhow!("unknown flag: {other}")),
        }
    }

    let input = input.ok_or_else(|| anyhow!("missing required --input argument"))?;
    if mode != Mode::Common && (from_page.is_none() || to_page.is_none()) {
        return Err(anyhow!(
            "--from-page and --to-page are required for this mode"
        ));
    }

    Ok(CliCommand::Run(CliOptions {
        input,
        output,
        mode,
        from_page,
        to_page,
        max_paths,
        max_length,
        verbose,
    }))
}

fn print_help() {
    println!("{APP_NAME} — generate navigation paths from a ui-map");
    println!("Usage: {APP_NAME} --input <UI_MAP> [OPTIONS]\n");
    println!("Options:");
    println!("  --input <PATH>       ui_map.json produced by ui-discovery (required)");
    println!("  --output <PATH>      Output file (default: navigation.yaml)");
    println!("  --mode <MODE>        common, specific, or all (default: common)");
    println!("  --from-page <PAGE>   Start page for specific/all modes");
    println!("  --to-page <PAGE>     Target page for specific/all modes");
    println!("  --max-paths <N>      Path cap for the all mode (default: 5)");
    println!("  --max-length <N>     Hop limit for the all mode (default: 10)");
    println!("  --verbose            Debug logging");
    println!("  -V, --version        Show version information");
    println!("  -h, --help           Show this help message");
}

fn print_version() {
    println!("{APP_NAME} {VERSION}");
}

fn main() -> Result<()> {
    let raw_args = env::args().skip(1).collect::<Vec<_>>();
    let options = match parse_arguments(&raw_args)? {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            print_version();
            return Ok(());
        }
        CliCommand::Run(options) => options,
    };

    init_tracing(options.verbose);

    let ui_map = load_ui_map(&options.input)?;
    let generator = NavigationGenerator::from_ui_map(&ui_map)?;

    let paths = match options.mode {
        Mode::Common => generator.generate_common_paths(),
        Mode::Specific => {
            let from = options.from_page.as_deref().unwrap_or_default();
            let to = options.to_page.as_deref().unwrap_or_default();
            vec![generator.generate_path(from, to)?]
        }
        Mode::All => {
            let from = options.from_page.as_deref().unwrap_or_default();
            let to = options.to_page.as_deref().unwrap_or_default();
            generator.generate_all_paths(from, to, options.max_paths, options.max_length)?
        }
    };

    if paths.is_empty() {
        warn!("no navigation paths generated");
    }

    write_artifact(&options.output, &paths_to_yaml(&paths)?)?;
    info!(
        paths = paths.len(),
        output = %options.output.display(),
        "navigation paths written"
    );
    Ok(())
}
