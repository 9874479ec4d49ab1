//! bleperiphd - host loop for the BLE peripheral
//!
//! Brings the peripheral up on the loopback stack, then polls the update
//! service and publishes a battery level once per iteration.

mod collaborators;

use bleperiph::{LoopbackStack, PeerAddress, Peripheral, PeripheralConfig};
use clap::Parser;
use collaborators::{LogDisplay, StagedUpdate, UPDATE_SERVICE_UUID};
use log::{error, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bleperiphd")]
#[command(about = "BLE peripheral bring-up and host loop")]
struct Cli {
    /// Peripheral configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Host loop iterations to run
    #[arg(short = 'n', long, default_value = "10")]
    cycles: u64,
    /// Delay between iterations, in milliseconds
    #[arg(short, long, default_value = "1000")]
    interval_ms: u64,
    /// Polls after which the staged update asks for a reboot
    #[arg(long)]
    reboot_after: Option<u64>,
    /// Connect and pair a simulated central after bring-up
    #[arg(long)]
    simulate_central: bool,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let config = match &cli.config {
        Some(path) => PeripheralConfig::load(path)?,
        None => PeripheralConfig::default(),
    };

    let stack = LoopbackStack::new();
    let mut peripheral = Peripheral::bring_up(
        &config,
        stack.clone(),
        StagedUpdate::new(cli.reboot_after),
        Arc::new(LogDisplay),
    )?;
    info!(
        "Peripheral '{}' up, advertising update service {}",
        config.device_name, UPDATE_SERVICE_UUID
    );

    if cli.simulate_central {
        stack.connect(PeerAddress::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]))?;
        // The simulated user types exactly what the display shows.
        let outcome = stack.pair(|passkey| passkey)?;
        info!("Simulated central paired: {:?}", outcome);
    }

    let mut battery: u8 = 100;
    for cycle in 1..=cli.cycles {
        peripheral.maintain();
        if peripheral.update_service().reboot_due() {
            info!("Leaving host loop for reboot after {} cycles", cycle);
            break;
        }

        if config.battery {
            if let Err(e) = peripheral.update_battery_level(battery) {
                error!("Battery update failed: {}", e);
            }
            battery = battery.saturating_sub(1);
        }

        thread::sleep(Duration::from_millis(cli.interval_ms));
    }

    if peripheral.is_connected() {
        stack.disconnect()?;
    }
    Ok(())
}
