use crate::types::{ArmGeometry, Endpoint, DEFAULT_A23, DEFAULT_A34, DEFAULT_ALLOWED_PORTS};
use eyre::Result;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Legacy trailer appended to every pose line. The deployed arm controller
/// still expects it.
pub const LEGACY_PAYLOAD_SUFFIX: &str = ", hehehehehehehe";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    pub link: LinkConfig,
    pub arm: ArmConfig,
    pub hand: HandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub allowed_ports: Vec<u16>,
    pub connect_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub receive_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub idle_drain_interval_ms: u64,
    pub payload_suffix: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub a23: f64,
    pub a34: f64,
    pub base_position: [f64; 3], // x, y, z
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandConfig {
    pub input_multiplier: f64,
    pub xy_sensitivity: f64,
    pub z_sensitivity: f64,
    pub height_min: f64,
    pub height_max: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_ALLOWED_PORTS[0],
            allowed_ports: DEFAULT_ALLOWED_PORTS.to_vec(),
            connect_timeout_ms: 1000,
            send_timeout_ms: 1000,
            receive_timeout_ms: 1000,
            reconnect_interval_ms: 1000,
            idle_drain_interval_ms: 100,
            payload_suffix: LEGACY_PAYLOAD_SUFFIX.to_string(),
            enabled: true,
        }
    }
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            a23: DEFAULT_A23,
            a34: DEFAULT_A34,
            base_position: [0.0, 0.0, 0.0],
        }
    }
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            input_multiplier: 1.0,
            xy_sensitivity: 1.0,
            z_sensitivity: 1.0,
            height_min: 0.35,
            height_max: 0.5,
        }
    }
}

impl TeleopConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: TeleopConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Applies `COBOT_HOST` and `COBOT_PORT` on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("COBOT_HOST") {
            self.link.host = host;
        }
        if let Ok(val) = std::env::var("COBOT_PORT") {
            match val.trim().parse() {
                Ok(port) => self.link.port = port,
                Err(_) => tracing::warn!("Ignoring unparsable COBOT_PORT={:?}", val),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        ArmGeometry::new(self.arm.a23, self.arm.a34)?;

        if self.link.allowed_ports.is_empty() {
            return Err(eyre::eyre!("allowed_ports must list at least one port"));
        }

        if self.hand.height_min > self.hand.height_max {
            return Err(eyre::eyre!(
                "Hand height band is inverted: min {} > max {}",
                self.hand.height_min,
                self.hand.height_max
            ));
        }

        if self.link.send_timeout_ms == 0 || self.link.receive_timeout_ms == 0 {
            return Err(eyre::eyre!("Socket timeouts must be non-zero"));
        }

        Ok(())
    }

    pub fn geometry(&self) -> Result<ArmGeometry> {
        ArmGeometry::new(self.arm.a23, self.arm.a34)
    }

    pub fn base_position(&self) -> Vector3<f64> {
        let [x, y, z] = self.arm.base_position;
        Vector3::new(x, y, z)
    }
}

impl LinkConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn idle_drain_interval(&self) -> Duration {
        Duration::from_millis(self.idle_drain_interval_ms)
    }
}
