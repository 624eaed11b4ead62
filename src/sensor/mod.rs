//! Environmental sensor readings.
//!
//! The physical sensor (a BMP280 on the I2C bus in the original deployment)
//! is an external collaborator; the daemon only depends on the
//! [`SensorProvider`] capability. Readings are packaged as immutable
//! [`SensorSnapshot`] values and replaced wholesale, so a reader can never
//! observe a half-updated tuple.

mod thermal;

pub use thermal::{CpuThermal, SysfsThermal, VcgencmdThermal};

use anyhow::Result;
use chrono::{DateTime, Local};

/// One complete sensor poll. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorSnapshot {
    pub timestamp: DateTime<Local>,
    /// Ambient temperature in degrees Celsius.
    pub temperature: f64,
    /// Reserved for a future humidity sensor; always 0.0.
    pub humidity: f64,
    /// Barometric pressure in hPa.
    pub pressure: f64,
    /// Host SoC temperature in degrees Celsius.
    pub cpu_temperature: f64,
}

impl SensorSnapshot {
    pub fn now(temperature: f64, pressure: f64, cpu_temperature: f64) -> Self {
        Self {
            timestamp: Local::now(),
            temperature,
            humidity: 0.0,
            pressure,
            cpu_temperature,
        }
    }

    /// Text rendered into the telemetry band at the bottom of each frame.
    pub fn caption(&self) -> String {
        format!(
            "{} T={:.2}C, P={:.2}hPa CPU={:.1}C",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.temperature,
            self.pressure,
            self.cpu_temperature,
        )
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Local>::from(std::time::UNIX_EPOCH),
            temperature: 0.0,
            humidity: 0.0,
            pressure: 0.0,
            cpu_temperature: 0.0,
        }
    }
}

/// Capability contract for the environmental sensor.
///
/// Both reads may fail; the sensor worker substitutes 0.0 and keeps polling.
pub trait SensorProvider: Send {
    /// Ambient temperature in degrees Celsius.
    fn read_temperature(&mut self) -> Result<f64>;
    /// Barometric pressure in hPa.
    fn read_pressure(&mut self) -> Result<f64>;
}

/// Fixed-value provider for deployments without the hardware sensor, and for
/// tests.
#[derive(Clone, Debug)]
pub struct StubSensor {
    pub temperature: f64,
    pub pressure: f64,
}

impl Default for StubSensor {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            pressure: 1013.25,
        }
    }
}

impl SensorProvider for StubSensor {
    fn read_temperature(&mut self) -> Result<f64> {
        Ok(self.temperature)
    }

    fn read_pressure(&mut self) -> Result<f64> {
        Ok(self.pressure)
    }
}
