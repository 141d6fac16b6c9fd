use std::env;
use std::path::PathBuf;
use std::process;

use planet_net::MothershipClient;
use planet_tank::{ExplorationOutcome, InstantDriver, TankConfig, TankRobot};

#[derive(Debug, Clone, Default, PartialEq)]
struct CliOptions {
    config_path: Option<PathBuf>,
    mothership_ip: Option<String>,
    mothership_port: Option<u16>,
    response_timeout_ms: Option<u64>,
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
            eprintln!("failed to load tank config: {err}");
            process::exit(1);
        }
    };

    let mut client = match MothershipClient::connect(config.client_config()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("failed to reach mothership at {}: {err}", config.mothership_addr());
            process::exit(1);
        }
    };
    if let Err(err) = client.wait_for_start() {
        eprintln!("no start signal from mothership: {err}");
        process::exit(1);
    }

    let mut robot = TankRobot::new(client, InstantDriver);
    match robot.core_loop() {
        Ok(ExplorationOutcome::Finished) => println!("planet explored"),
        Ok(ExplorationOutcome::Stuck) => {
            println!("tank is stuck");
            process::exit(2);
        }
        Err(err) => {
            eprintln!("exploration aborted: {err}");
            process::exit(1);
        }
    }
}

fn load_config(options: &CliOptions) -> Result<TankConfig, planet_tank::ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => TankConfig::from_config_file(path.as_path())?,
        None => TankConfig::from_default_sources()?,
    };
    if let Some(ip) = &options.mothership_ip {
        config.mothership_ip = ip.clone();
    }
    if let Some(port) = options.mothership_port {
        config.mothership_port = port;
    }
    if let Some(timeout_ms) = options.response_timeout_ms {
        config.response_timeout_ms = timeout_ms;
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
            "--mothership-ip" => {
                options.mothership_ip = Some(
                    iter.next()
                        .ok_or_else(|| "--mothership-ip requires an address".to_string())?
                        .to_string(),
                );
            }
            "--port" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--port requires a port number".to_string())?;
                options.mothership_port = Some(
                    raw.parse::<u16>()
                        .ok()
                        .filter(|port| *port > 0)
                        .ok_or_else(|| format!("--port: invalid port {raw}"))?,
                );
            }
            "--response-timeout-ms" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--response-timeout-ms requires an integer".to_string())?;
                options.response_timeout_ms = Some(
                    raw.parse::<u64>()
                        .map_err(|_| format!("--response-timeout-ms: invalid value {raw}"))?,
                );
            }
            other => return Err(format!("unknown option: {other}")),
        }
    }

    Ok(options)
}

fn print_help() {
    println!(
        "Usage: tank [--config <file>] [--mothership-ip <ip>] [--port <port>] \
         [--response-timeout-ms <ms>]"
    );
    println!("Options:");
    println!("  --config <file>             TOML config (default: ./config.toml if present)");
    println!("  --mothership-ip <ip>        mothership address (default 127.0.0.1)");
    println!("  --port <port>               mothership port (default 65432)");
    println!("  --response-timeout-ms <ms>  give up waiting for a reply (0 waits forever)");
}
