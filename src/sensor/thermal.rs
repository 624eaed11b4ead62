//! Host SoC temperature collaborators.
//!
//! Two implementations of the same single-call contract: `vcgencmd` (the
//! Raspberry Pi firmware tool the original deployment used) and the generic
//! Linux sysfs thermal zone. Read or parse failures surface as errors; the
//! sensor worker maps them to 0.0 rather than stopping.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;

/// Capability contract for reading the host CPU temperature in Celsius.
pub trait CpuThermal: Send {
    fn read_celsius(&mut self) -> Result<f64>;
}

// ----------------------------------------------------------------------------
// vcgencmd (Raspberry Pi)
// ----------------------------------------------------------------------------

/// Reads the SoC temperature by running `vcgencmd measure_temp` and
/// extracting the float from output like `temp=48.3'C`.
pub struct VcgencmdThermal {
    pattern: Regex,
}

impl VcgencmdThermal {
    pub fn new() -> Self {
        Self {
            pattern: float_pattern(),
        }
    }
}

impl Default for VcgencmdThermal {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuThermal for VcgencmdThermal {
    fn read_celsius(&mut self) -> Result<f64> {
        let output = Command::new("vcgencmd")
            .arg("measure_temp")
            .output()
            .context("run vcgencmd measure_temp")?;
        let text = String::from_utf8_lossy(&output.stdout);
        parse_temperature(&self.pattern, &text)
    }
}

// ----------------------------------------------------------------------------
// sysfs thermal zone (generic Linux)
// ----------------------------------------------------------------------------

/// Reads millidegrees Celsius from a sysfs thermal zone file.
pub struct SysfsThermal {
    path: PathBuf,
}

impl SysfsThermal {
    pub fn new() -> Self {
        Self::with_path("/sys/class/thermal/thermal_zone0/temp")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for SysfsThermal {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuThermal for SysfsThermal {
    fn read_celsius(&mut self) -> Result<f64> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read thermal zone {}", self.path.display()))?;
        let millidegrees: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("parse thermal zone value '{}'", raw.trim()))?;
        Ok(millidegrees / 1000.0)
    }
}

fn float_pattern() -> Regex {
    Regex::new(r"[0-9]+\.[0-9]+").expect("static pattern")
}

fn parse_temperature(pattern: &Regex, text: &str) -> Result<f64> {
    let matched = pattern
        .find(text)
        .ok_or_else(|| anyhow!("no temperature in vcgencmd output '{}'", text.trim()))?;
    matched
        .as_str()
        .parse()
        .with_context(|| format!("parse temperature '{}'", matched.as_str()))
}
