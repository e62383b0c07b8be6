//! Crawl a web UI through a WebDriver session and write the ui-map JSON.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde_json::Map;
use tracing::info;
use url::Url;

use uilens_cli::{init_tracing, write_artifact};
use uilens_core::discovery::{DiscoveryConfig, UiDiscoveryTool};
use uilens_core::webdriver::{headless_capabilities, WebDriverSession};

const APP_NAME: &str = "ui-discovery";
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct CliOptions {
    url: String,
    output: PathBuf,
    username: Option<String>,
    password: Option<String>,
    login_url: Option<String>,
    webdriver_url: String,
    browser: String,
    headless: bool,
    login: bool,
    crawl_login_page: bool,
    detect_patterns: bool,
    discover_interactions: bool,
    skip_pattern_duplicates: bool,
    max_depth: usize,
    max_pages: usize,
    verbose: bool,
}

enum CliCommand {
    Run(Box<CliOptions>),
    Help,
    Version,
}

fn parse_arguments(args: &[String]) -> Result<CliCommand> {
    if args.is_empty() {
        return Ok(CliCommand::Help);
    }

    let mut url: Option<String> = None;
    let mut output = PathBuf::from("ui_map.json");
    let mut username: Option<String> = None;
    let mut password: Option<String> = None;
    let mut login_url: Option<String> = None;
    let mut webdriver_url = "http://localhost:4444".to_string();
    let mut browser = "firefox".to_string();
    let mut headless = true;
    let mut login = true;
    let mut crawl_login_page = true;
    let mut detect_patterns = true;
    let mut discover_interactions = false;
    let mut skip_pattern_duplicates = false;
    let mut max_depth = 3usize;
    let mut max_pages = 1000usize;
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
            "--url" => {
                url = Some(take_value(args, i, arg)?);
                i += 2;
            }
            "--output" => {
                output = PathBuf::from(take_value(args, i, arg)?);
                i += 2;
            }
            "--username" => {
                username = Some(take_value(args, i, arg)?);
                i += 2;
            }
            "--password" => {
                password = Some(take_value(args, i, arg)?);
                i += 2;
            }
            "--login-url" => {
                login_url = Some(take_value(args, i, arg)?);
                i += 2;
            }
            "--webdriver-url" => {
                webdriver_url = take_value(args, i, arg)?;
                i += 2;
            }
            "--browser" => {
                browser = take_value(args, i, arg)?;
                i += 2;
            }
            "--headless" => {
                headless = true;
                i += 1;
            }
            "--no-headless" => {
                headless = false;
                i += 1;
            }
            "--no-login" => {
                login = false;
                i += 1;
            }
            "--skip-login-discovery" => {
                crawl_login_page = false;
                i += 1;
            }
            "--disable-pattern-detection" => {
                detect_patterns = false;
                i += 1;
            }
            "--discover-interactions" => {
                discover_interactions = true;
                i += 1;
            }
            "--skip-pattern-duplicates" => {
                skip_pattern_duplicates = true;
                i += 1;
            }
            "--max-depth" => {
                let value = take_value(args, i, arg)?;
                max_depth = value
                    .parse()
                    .with_context(|| format!("--max-depth expects a number, got '{value}'"))?;
                i += 2;
            }
            "--max-pages" => {
                let value = take_value(args, i, arg)?;
                max_pages = value
                    .parse()
                    .with_context(|| format!("--max-pages expects a number, got '{value}'"))?;
                i += 2;
            }
            "--verbose" => {
                verbose = true;
                i += 1;
            }
            other => return Err(anyhow!("unknown flag: {other}")),
        }
    }

    let url = url.ok_or_else(|| anyhow!("missing required --url argument"))?;

    Ok(CliCommand::Run(Box::new(CliOptions {
        url,
        output,
        username,
        password,
        login_url,
        webdriver_url,
        browser,
        headless,
        login,
        crawl_login_page,
        detect_patterns,
        discover_interactions,
        skip_pattern_duplicates,
        max_depth,
        max_pages,
        verbose,
    })))
}

fn print_help() {
    println!("{APP_NAME} — map a web UI into a navigable graph");
    println!("Usage: {APP_NAME} --url <URL> [OPTIONS]\n");
    println!("Options:");
    println!("  --url <URL>                   Base URL of the UI to crawl (required)");
    println!("  --output <PATH>               Output file (default: ui_map.json)");
    println!("  --username <USER>             Login username");
    println!("  --password <PASS>             Login password");
    println!("  --login-url <URL>             Login page when it differs from the base URL");
    println!("  --webdriver-url <URL>         WebDriver endpoint (default: http://localhost:4444)");
    println!("  --browser <NAME>              firefox or chrome (default: firefox)");
    println!("  --headless / --no-headless    Run the browser headless (default: headless)");
    println!("  --no-login                    Skip the login flow");
    println!("  --skip-login-discovery        Exclude the login page from the crawl");
    println!("  --disable-pattern-detection   Do not detect URL patterns");
    println!("  --discover-interactions       Click safe buttons to find modals");
    println!("  --skip-pattern-duplicates     Stop crawling sampled URL families");
    println!("  --max-depth <N>               BFS depth limit (default: 3)");
    println!("  --max-pages <N>               Page limit (default: 1000)");
    println!("  --verbose                     Debug logging");
    println!("  -V, --version                 Show version information");
    println!("  -h, --help                    Show this help message");
}

fn print_version() {
    println!("{APP_NAME} {VERSION}");
}

#[tokio::main]
async fn main() -> Result<()> {
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

    let base_url = Url::parse(&options.url).context("invalid --url")?;
    let mut config = DiscoveryConfig::new(base_url);
    config.username = options.username;
    config.password = options.password;
    config.login_url = options.login_url;
    config.perform_login = options.login;
    config.crawl_login_page = options.crawl_login_page;
    config.detect_patterns = options.detect_patterns;
    config.discover_interactions = options.discover_interactions;
    config.skip_pattern_duplicates = options.skip_pattern_duplicates;
    config.max_depth = options.max_depth;
    config.max_pages = options.max_pages;

    let capabilities = if options.headless {
        headless_capabilities(&options.browser)
    } else {
        Map::new()
    };
    let session = WebDriverSession::connect(&options.webdriver_url, capabilities)
        .await
        .context("failed to start a WebDriver session")?;

    let ui_map = UiDiscoveryTool::new(config, session).run().await?;
    write_artifact(&options.output, &serde_json::to_string_pretty(&ui_map)?)?;

    info!(output = %options.output.display(), "ui map written");
    Ok(())
}
