//! netmd-probe
//!
//! Command-line tool for poking at NetMD devices: list what is attached,
//! read the product string, and run raw command exchanges.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{hex_dump, parse_hex, setup_logging};
use netmd::{DiscoveredDevice, ProbeConfig, discover, load_config};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "netmd-probe")]
#[command(author, version, about = "Probe USB-attached NetMD MiniDisc devices")]
#[command(long_about = "
Discovers NetMD recorders and decks attached over USB and exchanges raw
command messages with them.

EXAMPLES:
    # List attached NetMD devices
    netmd-probe --list-devices

    # Send a raw command to the first device and print the response
    netmd-probe --send '00 18 06 02 10 10 01 30 00 10 00 ff 00 00 00 00 00'

    # Talk to the second device with debug logging
    netmd-probe --device 1 --send '...' --log-level debug

CONFIGURATION:
    The tool looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/netmd/netmd.toml
    3. /etc/netmd/netmd.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List NetMD devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Index of the device to use, as shown by --list-devices
    #[arg(short, long, value_name = "INDEX", default_value_t = 0)]
    device: usize,

    /// Hex-encoded command to exchange with the device
    #[arg(short, long, value_name = "HEX")]
    send: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = ProbeConfig::default();
        let path = ProbeConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        load_config(path).context("Failed to load configuration")?
    } else {
        ProbeConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("netmd-probe v{}", env!("CARGO_PKG_VERSION"));
    debug!("Exchange settings: {:?}", config.exchange);

    let command = args
        .send
        .as_deref()
        .map(parse_hex)
        .transpose()
        .context("Invalid command")?;

    let devices = discover();

    if args.list_devices {
        list_devices(&devices, &config);
        return Ok(());
    }

    let device = devices.get(args.device).ok_or_else(|| {
        anyhow!(
            "No NetMD device at index {} ({} found)",
            args.device,
            devices.len()
        )
    })?;

    let mut handle = device
        .open(config.exchange)
        .with_context(|| format!("Failed to open {}", device))?;

    let name = handle.device_name();
    println!("Connected to {} [{}]", device, name);

    let Some(command) = command else {
        handle.close();
        return Ok(());
    };

    let result = handle.exchange(&command);
    handle.close();

    let response = result.context("Exchange failed")?;
    println!("{}", hex_dump(&response));

    Ok(())
}

/// Print every discovered device with its product string
fn list_devices(devices: &[DiscoveredDevice], config: &ProbeConfig) {
    if devices.is_empty() {
        println!("No NetMD devices found.");
        return;
    }

    println!("Found {} NetMD device(s):\n", devices.len());
    for (index, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {:04x}:{:04x} - {}",
            index,
            device.vendor_id(),
            device.product_id(),
            device.model()
        );
        println!(
            "      Bus {:03} Device {:03}",
            device.bus_number(),
            device.address()
        );

        // Product string needs an open session; a busy device just goes without
        if let Ok(handle) = device.open(config.exchange) {
            let name = handle.device_name();
            if !name.is_empty() {
                println!("      Product: {}", name);
            }
            handle.close();
        }
        println!();
    }
}
