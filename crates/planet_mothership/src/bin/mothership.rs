use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use planet_map::{Direction, Planet};
use planet_mothership::{Mothership, MothershipConfig};

#[derive(Debug, Clone, Default, PartialEq)]
struct CliOptions {
    config_path: Option<PathBuf>,
    bind_addr: Option<String>,
    tick_ms: Option<u64>,
    planet_file: Option<PathBuf>,
    start_node: Option<String>,
    arrival_from: Option<Direction>,
    tank_ip: Option<IpAddr>,
    no_auto_start: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_options(args.iter().map(String::as_str)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            print_help();
            process::exit(1);
        }
    };

    let config = match load_config(&options) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load mothership config: {err}");
            process::exit(1);
        }
    };

    let Some(planet_file) = config.planet_file.clone() else {
        eprintln!("no planet file given (--planet or MOTHERSHIP_PLANET_FILE)");
        process::exit(1);
    };
    let Some(start_node) = config.start_node.clone() else {
        eprintln!("no start node given (--start or MOTHERSHIP_START_NODE)");
        process::exit(1);
    };
    let planet = match Planet::load_json(&planet_file) {
        Ok(planet) => planet,
        Err(err) => {
            eprintln!("failed to load planet {}: {err}", planet_file.display());
            process::exit(1);
        }
    };

    let mut mothership = match Mothership::bind(config.link_config(), planet) {
        Ok(mothership) => mothership
            .with_tick_interval(config.tick_interval())
            .with_auto_start(config.auto_start),
        Err(err) => {
            eprintln!("failed to start mothership: {err}");
            process::exit(1);
        }
    };
    if let Err(err) = mothership.set_start_position(start_node, config.arrival_from) {
        eprintln!("invalid start position: {err}");
        process::exit(1);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    if let Err(err) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        eprintln!("failed to install shutdown handler: {err}");
        process::exit(1);
    }

    if let Err(err) = mothership.run(&shutdown) {
        eprintln!("mothership failed: {err}");
        process::exit(1);
    }
}

fn load_config(options: &CliOptions) -> Result<MothershipConfig, planet_mothership::ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => MothershipConfig::from_config_file(path.as_path())?,
        None => MothershipConfig::from_default_sources()?,
    };
    if let Some(bind_addr) = &options.bind_addr {
        config.bind_addr = bind_addr.clone();
    }
    if let Some(tick_ms) = options.tick_ms {
        config.tick_ms = tick_ms;
    }
    if let Some(planet_file) = &options.planet_file {
        config.planet_file = Some(planet_file.clone());
    }
    if let Some(start_node) = &options.start_node {
        config.start_node = Some(start_node.clone());
    }
    if let Some(arrival_from) = options.arrival_from {
        config.arrival_from = arrival_from;
    }
    if options.tank_ip.is_some() {
        config.tank_ip = options.tank_ip;
    }
    if options.no_auto_start {
        config.auto_start = false;
    }
    Ok(config)
}

fn parse_options<'a>(args: impl Iterator<Item = &'a str>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut iter = args.peekable();

    while let Some(arg) = iter.next() {
        match arg {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                options.config_path = Some(PathBuf::from(
                    iter.next()
                        .ok_or_else(|| "--config requires a path".to_string())?,
                ));
            }
            "--bind" => {
                options.bind_addr = Some(
                    iter.next()
                        .ok_or_else(|| "--bind requires an address".to_string())?
                        .to_string(),
                );
            }
            "--tick-ms" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--tick-ms requires a positive integer".to_string())?;
                options.tick_ms = Some(
                    raw.parse::<u64>()
                        .ok()
                        .filter(|value| *value > 0)
                        .ok_or_else(|| "--tick-ms requires a positive integer".to_string())?,
                );
            }
            "--planet" => {
                options.planet_file = Some(PathBuf::from(
                    iter.next()
                        .ok_or_else(|| "--planet requires a path".to_string())?,
                ));
            }
            "--start" => {
                options.start_node = Some(
                    iter.next()
                        .ok_or_else(|| "--start requires a node id".to_string())?
                        .to_string(),
                );
            }
            "--arrival-from" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--arrival-from requires a direction".to_string())?;
                options.arrival_from = Some(
                    raw.parse::<Direction>()
                        .ok()
                        .filter(|direction| direction.is_cardinal())
                        .ok_or_else(|| format!("--arrival-from: invalid direction {raw}"))?,
                );
            }
            "--tank-ip" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--tank-ip requires an address".to_string())?;
                options.tank_ip = Some(
                    raw.parse::<IpAddr>()
                        .map_err(|_| format!("--tank-ip: invalid address {raw}"))?,
                );
            }
            "--no-auto-start" => {
                options.no_auto_start = true;
            }
            other => return Err(format!("unknown option: {other}")),
        }
    }

    Ok(options)
}

fn print_help() {
    println!(
        "Usage: mothership [--config <file>] [--planet <file>] [--start <node>] \
         [--arrival-from <dir>] [--bind <addr>] [--tick-ms <ms>] [--tank-ip <ip>] \
         [--no-auto-start]"
    );
    println!("Options:");
    println!("  --config <file>      TOML config (default: ./config.toml if present)");
    println!("  --planet <file>      planet JSON with nodes and paths");
    println!("  --start <node>       node the tank starts on");
    println!("  --arrival-from <dir> exit the tank entered the start node through");
    println!("  --bind <addr>        listen address (default 0.0.0.0:65432)");
    println!("  --tick-ms <ms>       loop interval (default 100)");
    println!("  --tank-ip <ip>       only accept the tank from this address");
    println!("  --no-auto-start      do not send start when the tank connects");
}
