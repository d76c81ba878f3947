//! ac020 binary for inspecting the command traffic of a configuration.
//!
//! Usage: `ac020 [CONFIG]`. Runs a start/stop cycle against a dry-run bus and
//! prints every transaction instead of touching hardware.

use std::sync::atomic::{AtomicUsize, Ordering};

use ac020::device::COMMAND_TIMEOUT;
use ac020::{
    Ac020, Bus, BusError, CommandKind, FormatWhich, HexBytes, Operation, SensorConfig,
    SensorSubdevice,
};
use tracing_subscriber::EnvFilter;

const DRY_RUN_ADDRESS: u8 = 0x3C;

/// Bus that prints writes and answers reads with zeros.
#[derive(Default)]
struct DryRunBus {
    transfers: AtomicUsize,
}

impl Bus for DryRunBus {
    fn transfer(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let sequence = self.transfers.fetch_add(1, Ordering::Relaxed);
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    println!("#{sequence} {address:#04x} W {}", HexBytes(bytes));
                }
                Operation::Read(buffer) => {
                    buffer.fill(0);
                    println!("#{sequence} {address:#04x} R {} bytes", buffer.len());
                }
            }
        }
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SensorConfig::load(path)?,
        None => SensorConfig::default(),
    };

    let sensor = Ac020::new(DryRunBus::default(), DRY_RUN_ADDRESS, config);
    let format = sensor.format(FormatWhich::Active);

    println!("Subdevice: {}", sensor.subdevice_name());
    println!("Mode: {}", sensor.mode());
    println!(
        "Format: {}x{} {:?} {:?}",
        format.width, format.height, format.encoding, format.field
    );
    println!("Frame interval: {}", sensor.frame_interval());
    println!("START: {}", sensor.pending_frame(CommandKind::Start));
    println!("STOP:  {}", sensor.pending_frame(CommandKind::Stop));

    if sensor.mode().is_stream_exempt() {
        println!("Mode streams without commands");
    }
    sensor.set_streaming(true)?;
    println!("Status: {}", sensor.wait_for_completion(COMMAND_TIMEOUT)?);
    sensor.set_streaming(false)?;
    Ok(())
}
