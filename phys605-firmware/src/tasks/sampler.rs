//! Bench sampling loop
//!
//! Every period: convert the ADC channel and show the code on the display,
//! then snapshot the input shift register and mirror it onto the outputs.
//! A failed command is logged with its error kind and only that command is
//! skipped.

use defmt::*;
use embassy_time::{Duration, Ticker};
use phys605_core::Error;

use crate::bench::Bench;

/// Time between samples
pub const SAMPLE_PERIOD_MS: u64 = 500;

fn failed(what: &str, e: Error) {
    error!("{} failed: {}", what, e.kind());
}

/// Sample the bench forever
#[embassy_executor::task]
pub async fn sampler_task(mut bench: Bench) {
    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS));
    info!("Sampler running every {} ms", SAMPLE_PERIOD_MS);

    loop {
        if let Some(probe) = bench.adc.as_mut() {
            match probe.adc.read(probe.channel) {
                Ok(code) => {
                    debug!("adc ch{} = {}", probe.channel, code);
                    if let Some(display) = bench.display.as_mut() {
                        if let Err(e) = display.write_int(i32::from(code)) {
                            failed("display write", e);
                        }
                    }
                }
                Err(e) => failed("adc read", e),
            }
        }

        if let Some(inputs) = bench.inputs.as_mut() {
            match inputs.read() {
                Ok(value) => {
                    debug!("inputs = {:#x}", value);
                    if let Some(outputs) = bench.outputs.as_mut() {
                        if let Err(e) = outputs.write(value) {
                            failed("output write", e);
                        }
                    }
                }
                Err(e) => failed("input read", e),
            }
        }

        ticker.next().await;
    }
}
