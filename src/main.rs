mod bluetooth;
mod config;
mod device;
mod error;
mod exit;
mod protocol;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bluetooth::connection::RfcommConnector;
use bluetooth::scanner::{open_adapter, BluezScanner};
use config::AppConfig;
use device::ambient::{AmbientPayload, AmbientSettings, LEVEL_DISABLED};
use device::selector::select_device;
use device::session::ControlSession;
use error::{ControlError, TransportError};
use protocol::commands::DATA_TYPE_COMMAND;
use protocol::frame::hex;
use protocol::Frame;

#[derive(Parser, Debug)]
#[command(
    name = "ambictl",
    version,
    about = "Set ambient sound and noise cancelling on Sony headphones from the command line",
    after_help = "DISCLAIMER: USE AT OWN RISK. THIRD PARTY TOOL. NOT AFFILIATED WITH SONY."
)]
struct Cli {
    /// Ambient sound level. 0 and 1 select noise suppression, maximum is 19, -1 or "off" disables
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "0",
        allow_negative_numbers = true,
        value_parser = parse_level,
        conflicts_with = "off"
    )]
    asl: i32,

    /// Disable ambient sound control (same as --asl off)
    #[arg(long)]
    off: bool,

    /// Enable focus on voice. Only available with an ambient sound level of 2 or more
    #[arg(long)]
    fov: bool,

    /// Address of the device to control. Not required if exactly one eligible device is connected
    #[arg(long, value_name = "ADDRESS")]
    mac: Option<String>,

    /// Connect to this RFCOMM channel instead of looking up the control service
    #[arg(long, value_name = "CHANNEL", value_parser = clap::value_parser!(u8).range(1..=30))]
    channel: Option<u8>,

    /// List connected devices that can be controlled and exit
    #[arg(long, conflicts_with_all = ["mac", "dry_run"])]
    list: bool,

    /// Print the encoded command frame without touching Bluetooth
    #[arg(long)]
    dry_run: bool,

    /// Config file (default: ~/.config/ambictl/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_level(s: &str) -> std::result::Result<i32, String> {
    if s.eq_ignore_ascii_case("off") {
        return Ok(LEVEL_DISABLED);
    }
    s.parse::<i32>()
        .map_err(|_| format!("expected a number or \"off\", got {:?}", s))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit::USAGE
            } else {
                exit::SUCCESS
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(exit::CONFIG);
        }
    };

    match run(&cli, &config).await {
        Ok(()) => ExitCode::from(exit::SUCCESS),
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(exit::code_for(&e))
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "ambictl=debug,bluer=info"
    } else {
        "ambictl=info,bluer=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => Ok(AppConfig::load()),
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<(), ControlError> {
    if cli.list {
        return list_devices(config).await;
    }

    // Validate before any Bluetooth activity; the headset stops accepting
    // commands after malformed ones.
    let level = if cli.off { LEVEL_DISABLED } else { cli.asl };
    let payload = AmbientSettings::new(level, cli.fov)?.encode();
    info!("Requested {}", payload);

    if cli.dry_run {
        let bytes = Frame::new(DATA_TYPE_COMMAND, 0, &payload.to_bytes()).to_bytes()?;
        let parsed = Frame::from_bytes(&bytes)?;
        info!(
            "Frame {} carries {}",
            parsed,
            AmbientPayload::from_bytes(&parsed.payload)?
        );
        println!("{}", hex::encode(&bytes));
        return Ok(());
    }

    let (session, adapter) = open_adapter(config.adapter.as_deref())
        .await
        .map_err(|e| TransportError::Unavailable(format!("{:#}", e)))?;

    let explicit = cli.mac.as_deref().or(config.device_address.as_deref());
    let scanner = BluezScanner::new(adapter.clone());
    let address = select_device(explicit, &scanner).await?;

    let connector = RfcommConnector::new(session, adapter, cli.channel.or(config.rfcomm_channel));
    ControlSession::apply(&connector, &address, &payload.to_bytes()).await?;

    info!("Applied {} on {}", payload, address);
    Ok(())
}

async fn list_devices(config: &AppConfig) -> Result<(), ControlError> {
    let (_session, adapter) = open_adapter(config.adapter.as_deref())
        .await
        .map_err(|e| TransportError::Unavailable(format!("{:#}", e)))?;

    let devices = BluezScanner::new(adapter)
        .list()
        .await
        .map_err(|e| TransportError::Discovery(format!("{:#}", e)))?;
    for device in devices {
        println!("{}\t{}", device.address, device.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["ambictl"]).unwrap();
        assert_eq!(cli.asl, 0);
        assert!(!cli.fov);
        assert!(!cli.off);
        assert!(cli.mac.is_none());
    }

    #[test]
    fn test_negative_and_off_levels() {
        let cli = Cli::try_parse_from(["ambictl", "--asl", "-1"]).unwrap();
        assert_eq!(cli.asl, -1);
        let cli = Cli::try_parse_from(["ambictl", "--asl", "off"]).unwrap();
        assert_eq!(cli.asl, LEVEL_DISABLED);
    }

    #[test]
    fn test_out_of_range_level_left_to_encoder() {
        let cli = Cli::try_parse_from(["ambictl", "--asl", "25", "--fov"]).unwrap();
        assert_eq!(cli.asl, 25);
        assert!(cli.fov);
    }

    #[test]
    fn test_rejects_garbage_level() {
        let err = Cli::try_parse_from(["ambictl", "--asl", "loud"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_off_conflicts_with_asl() {
        let err = Cli::try_parse_from(["ambictl", "--off", "--asl", "3"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_list_conflicts_with_mac() {
        let err = Cli::try_parse_from(["ambictl", "--list", "--mac", "AA:BB:CC:DD:EE:FF"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_channel_range() {
        let cli = Cli::try_parse_from(["ambictl", "--channel", "9"]).unwrap();
        assert_eq!(cli.channel, Some(9));
        assert!(Cli::try_parse_from(["ambictl", "--channel", "0"]).is_err());
    }

    #[tokio::test]
    async fn test_invalid_parameters_stop_before_bluetooth() {
        let cli = Cli::try_parse_from(["ambictl", "--asl", "1", "--fov"]).unwrap();
        let err = run(&cli, &AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidParameters(_)));
        assert_eq!(exit::code_for(&err), exit::INVALID_PARAMETERS);
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_adapter() {
        let cli = Cli::try_parse_from(["ambictl", "--asl", "5", "--dry-run"]).unwrap();
        assert!(run(&cli, &AppConfig::default()).await.is_ok());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("OFF"), Ok(-1));
        assert_eq!(parse_level("19"), Ok(19));
        assert!(parse_level("1.5").is_err());
    }
}
