//! phys605 bench firmware
//!
//! Reads the embedded `bench.toml`, brings up the buses and chips it
//! describes on an RP2040 board, and samples them in a loop, logging over
//! defmt-rtt.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use phys605_core::config::{parse_config, BenchConfig, TransportKind};
use phys605_hal_rp2040::{GpioBank, PinBank};

mod bench;
mod tasks;
mod transport;

/// Bench wiring compiled into the firmware
/// Edit bench.toml and rebuild to change it
const BENCH_CONFIG: &str = include_str!("../bench.toml");

// The GPIO bank is shared by every bus for the life of the firmware
static GPIO: StaticCell<RefCell<GpioBank>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("phys605 bench starting...");

    let p = embassy_rp::init(Default::default());

    let config = match parse_config(BENCH_CONFIG) {
        Ok(config) => {
            info!("Parsed bench configuration");
            config
        }
        Err(e) => {
            error!("bench.toml line {}: {}", e.line, e.kind);
            BenchConfig::default()
        }
    };

    let hardware_spi = matches!(
        &config.spi,
        Some(spi) if spi.transport == TransportKind::Hardware
    );
    let (mut pins, board) = PinBank::new(p, hardware_spi);
    let gpio = GPIO.init(RefCell::new(GpioBank::new(&mut pins)));

    let bench = bench::Bench::build(&config, gpio, board);

    spawner.spawn(tasks::sampler_task(bench)).unwrap();
    info!("Bench running");
}
