//! Generate the selectors.yaml artifact from a discovered ui-map.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::info;

use uilens_cli::{init_tracing, load_ui_map, write_artifact};
use uilens_core::SelectorGenerator;

const APP_NAME: &str = "selector-generator";
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct CliOptions {
    input: PathBuf,
    output: PathBuf,
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
    let mut output = PathBuf::from("selectors.yaml");
    let mut verbose = false;
    let mut i = 0;

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
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--input requires a value"))?;
                input = Some(PathBuf::from(value));
                i += 2;
            }
            "--output" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--output requires a value"))?;
                output = PathBuf::from(value);
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

    Ok(CliCommand::Run(CliOptions {
        input,
        output,
        verbose,
    }))
}

fn print_help() {
    println!("{APP_NAME} — generate element selectors from a ui-map");
    println!("Usage: {APP_NAME} --input <UI_MAP> [OPTIONS]\n");
    println!("Options:");
    println!("  --input <PATH>    ui_map.json produced by ui-discovery (required)");
    println!("  --output <PATH>   Output file (default: selectors.yaml)");
    println!("  --verbose         Debug logging");
    println!("  -V, --version     Show version information");
    println!("  -h, --help        Show this help message");
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
    let generator = SelectorGenerator::from_ui_map(&ui_map)?;
    let yaml = generator.to_yaml()?;
    write_artifact(&options.output, &yaml)?;

    let pages = generator.generate()["pages"]
        .as_object()
        .map(|pages| pages.len())
        .unwrap_or(0);
    info!(pages, output = %options.output.display(), "selectors written");
    Ok(())
}
