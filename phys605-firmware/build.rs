//! Build script for phys605-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bench.toml at compile time

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// GPIO pins on the RP2040
const GPIO_COUNT: i64 = 30;

/// Known sections with their required and optional line keys
///
/// Aliases are listed as `a|b`.
const SECTIONS: &[(&str, &[&str], &[&str])] = &[
    ("spi", &[], &["clock|clk", "mosi|data_out", "miso|data_in", "cs|chip_select"]),
    ("adc", &[], &[]),
    ("shift_in", &["data|serial_in", "clock|clk", "load"], &[]),
    ("shift_out", &["data|serial_out", "clock|clk", "latch"], &["clear"]),
    ("display", &["data|din", "clock|clk", "cs|load"], &[]),
];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).expect("cannot create memory.x");
    f.write_all(memory_x).expect("cannot write memory.x");

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate bench.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=bench.toml");

    let config_path = Path::new("bench.toml");
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("bench.toml not found or unreadable", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in bench.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();
    let mut used: BTreeMap<i64, String> = BTreeMap::new();

    let Some(table) = config.as_table() else {
        fail("bench.toml must be a table", &[]);
    };
    for (name, section) in table {
        let known = SECTIONS.iter().find(|(s, _, _)| *s == name.as_str());
        let Some(&(_, required, optional)) = known else {
            errors.push(format!("unknown section [{}]", name));
            continue;
        };
        let Some(section) = section.as_table() else {
            errors.push(format!("[{}] must be a table", name));
            continue;
        };

        let hardware = name == "spi"
            && section.get("transport").and_then(|t| t.as_str()) == Some("hardware");

        for (keys, is_required) in required
            .iter()
            .map(|k| (k, true))
            .chain(optional.iter().map(|k| (k, false)))
        {
            let found = keys.split('|').find_map(|k| section.get(k));
            match found {
                None if is_required => errors.push(format!("[{}] missing '{}'", name, keys)),
                None => {}
                Some(value) => match pin_number(value) {
                    Some(pin) if (0..GPIO_COUNT).contains(&pin) => {
                        // The hardware transport's clock is fixed by SPI0
                        if hardware && keys.starts_with("clock") {
                            continue;
                        }
                        let owner = format!("[{}] {}", name, keys);
                        if let Some(previous) = used.insert(pin, owner.clone()) {
                            // A shared SPI data pin may appear as both mosi and miso
                            if !(previous.starts_with("[spi]") && owner.starts_with("[spi]")) {
                                errors.push(format!(
                                    "gpio{} used by both {} and {}",
                                    pin, previous, owner
                                ));
                            }
                        }
                    }
                    _ => errors.push(format!("[{}] '{}' is not a GPIO 0-29", name, keys)),
                },
            }
        }
    }

    if table.contains_key("adc") && !table.contains_key("spi") {
        errors.push("[adc] needs an [spi] section".to_string());
    }

    if !errors.is_empty() {
        fail("Invalid bench configuration", &errors);
    }

    println!("cargo:warning=bench.toml validated successfully");
}

/// Accept `11`, `"11"` and `"gpio11"`
fn pin_number(value: &toml::Value) -> Option<i64> {
    match value {
        toml::Value::Integer(n) => Some(*n),
        toml::Value::String(s) => s.strip_prefix("gpio").unwrap_or(s).parse().ok(),
        _ => None,
    }
}

/// Abort the build with a boxed error report
fn fail(title: &str, lines: &[String]) -> ! {
    let body = lines
        .iter()
        .map(|line| {
            let truncated = if line.len() > 62 {
                format!("{}...", &line[..59])
            } else {
                line.to_string()
            };
            format!("║  • {:<62} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n");
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title, body
    );
}
