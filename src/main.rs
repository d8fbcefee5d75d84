use clap::{Arg, Command};
use ixhash::config::DEFAULT_CONFIG_PATH;
use ixhash::{
    Config, DigestTriple, ListingResult, LookupError, Milter, ReputationChecker, Stage,
};
use log::LevelFilter;
use serde::Serialize;
use std::io::Read;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("ixhash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("iXhash fuzzy digests for e-mail bodies, with DNS list checks")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("hash")
                .long("hash")
                .value_name("FILE")
                .help("Compute the digests of a message file ('-' reads stdin)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("body-only")
                .long("body-only")
                .help("Treat the input as a bare body instead of a full message")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Look the digests up in every configured zone")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print results as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("milter")
                .long("milter")
                .help("Run as a milter on the configured socket")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let (config, found) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    // Initialize logger based on verbose flag, then the configured level
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.log_level()
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if matches.get_flag("test-config") {
        println!("Configuration OK");
        println!("Zones: {}", config.zones.join(", "));
        println!("DNS timeout: {}s", config.dns.timeout_seconds);
        println!("Milter socket: {}", config.milter.socket_path);
        return;
    }

    if let Some(input) = matches.get_one::<String>("hash") {
        let options = HashOptions {
            body_only: matches.get_flag("body-only"),
            check: matches.get_flag("check"),
            json: matches.get_flag("json"),
        };
        if let Err(e) = hash_file(&config, input, &options).await {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
        return;
    }

    if matches.get_flag("milter") {
        log::info!("Starting iXhash milter...");
        let milter = match Milter::new(&config) {
            Ok(milter) => milter,
            Err(e) => {
                log::error!("Failed to create milter: {e}");
                process::exit(1);
            }
        };
        if let Err(e) = milter.run(&config.milter.socket_path).await {
            log::error!("Milter error: {e}");
            process::exit(1);
        }
        return;
    }

    eprintln!("Nothing to do: pass --hash FILE or --milter (see --help)");
    process::exit(2);
}

fn load_config(path: &str) -> anyhow::Result<(Config, bool)> {
    if std::path::Path::new(path).exists() {
        Ok((Config::from_file(path)?, true))
    } else {
        Ok((Config::default(), false))
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

struct HashOptions {
    body_only: bool,
    check: bool,
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    input: &'a str,
    digests: &'a DigestTriple,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    listings: Vec<ListingReport>,
}

#[derive(Serialize)]
struct ListingReport {
    zone: String,
    stage: Stage,
    digest: String,
    listed: Option<bool>,
    error: Option<String>,
}

impl From<ListingResult> for ListingReport {
    fn from(result: ListingResult) -> Self {
        let (listed, error) = match result.outcome {
            Ok(listed) => (Some(listed), None),
            Err(e) => (None, Some(e.to_string())),
        };
        ListingReport {
            zone: result.zone,
            stage: result.stage,
            digest: result.digest,
            listed,
            error,
        }
    }
}

async fn hash_file(config: &Config, input: &str, options: &HashOptions) -> anyhow::Result<()> {
    use anyhow::Context;

    let raw = if input == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read message from stdin")?;
        buf
    } else {
        std::fs::read(input).with_context(|| format!("Failed to read message file: {input}"))?
    };

    let body = if options.body_only {
        &raw[..]
    } else {
        split_body(&raw)
    };
    log::debug!("Hashing {} body bytes from {input}", body.len());
    let triple = ixhash::all(body);

    let mut results = Vec::new();
    if options.check && !triple.is_empty() {
        let checker = ReputationChecker::from_system_conf()?.with_timeout(config.dns_timeout());
        results = checker.check(&config.zones, &triple).await;
    }

    if options.json {
        let report = Report {
            input,
            digests: &triple,
            listings: results.into_iter().map(ListingReport::from).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (stage, digest) in triple.iter() {
        let shown = if digest.is_empty() { "-" } else { digest };
        println!("{}: {}", stage_label(stage), shown);
    }
    for result in &results {
        println!(
            "{} (stage {}): {}",
            ixhash::lookup_host(&result.zone, &result.digest),
            result.stage,
            listing_status(&result.outcome)
        );
    }
    Ok(())
}

fn listing_status(outcome: &Result<bool, LookupError>) -> String {
    match outcome {
        Ok(true) => "listed".to_string(),
        Ok(false) => "not listed".to_string(),
        Err(e) => format!("error: {e}"),
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::First => "first",
        Stage::Second => "second",
        Stage::Third => "third",
    }
}

/// Body of a raw RFC 5322 message: everything after the first empty line.
/// Input without a header/body separator is taken as a body.
fn split_body(raw: &[u8]) -> &[u8] {
    let lf = find(raw, b"\n\n").map(|i| i + 2);
    let crlf = find(raw, b"\r\n\r\n").map(|i| i + 4);
    let start = match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b).unwrap_or(0),
    };
    &raw[start..]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
