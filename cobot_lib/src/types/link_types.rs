use serde::{Deserialize, Serialize};
use std::fmt;

/// Ports the arm controller is known to listen on.
pub const DEFAULT_ALLOWED_PORTS: [u16; 2] = [5000, 8080];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Configuration problems that block a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("IP is null")]
    MissingHost,

    #[error("Please select a valid port!")]
    PortNotAllowed { port: u16 },
}

/// Where the pose stream goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Checks host presence and the port allow-list.
    pub fn validate(&self, allowed_ports: &[u16]) -> Result<(), EndpointError> {
        if self.host.trim().is_empty() {
            return Err(EndpointError::MissingHost);
        }
        if !allowed_ports.contains(&self.port) {
            return Err(EndpointError::PortNotAllowed { port: self.port });
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

const CONNECTION_REFUSED: &str =
    "-> Connection refused! (Did you start the server, is the IP and port correct?)\n";
const LINK_UP: &str = "Connected!\n";
const LINK_DOWN: &str = "-> Disconnected!\n";

/// Operator-facing warning text, kept in fixed slots so that clearing one
/// problem leaves the others visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBoard {
    host: String,
    port: String,
    link: String,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_endpoint_check(&mut self, result: &Result<(), EndpointError>) {
        match result {
            Ok(()) => {
                self.port.clear();
            }
            Err(EndpointError::MissingHost) => {
                self.host = format!("-> {}\n", EndpointError::MissingHost);
                self.port.clear();
            }
            Err(err) => {
                self.port = format!("-> {}\n", err);
            }
        }
    }

    pub fn connect_failed(&mut self) {
        self.host = CONNECTION_REFUSED.to_string();
    }

    pub fn connect_succeeded(&mut self) {
        self.host.clear();
    }

    pub fn link_up(&mut self) {
        self.link = LINK_UP.to_string();
    }

    pub fn link_down(&mut self) {
        self.link = LINK_DOWN.to_string();
    }

    /// True when any slot carries a problem (the link-up note is not one).
    pub fn has_warning(&self) -> bool {
        !self.host.is_empty() || !self.port.is_empty() || self.link == LINK_DOWN
    }

    pub fn render(&self) -> String {
        format!("{}{}{}", self.host, self.port, self.link)
    }
}

/// Snapshot published by the teleop node whenever the link status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub enabled: bool,
    pub endpoint: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_validation() {
        let allowed = DEFAULT_ALLOWED_PORTS;
        assert!(Endpoint::new("10.0.0.2", 5000).validate(&allowed).is_ok());
        assert!(Endpoint::new("10.0.0.2", 8080).validate(&allowed).is_ok());
        assert_eq!(
            Endpoint::new("10.0.0.2", 5001).validate(&allowed),
            Err(EndpointError::PortNotAllowed { port: 5001 })
        );
        assert_eq!(
            Endpoint::new("  ", 5000).validate(&allowed),
            Err(EndpointError::MissingHost)
        );
    }

    #[test]
    fn test_status_board_slots() {
        let mut board = StatusBoard::new();
        assert_eq!(board.render(), "");
        assert!(!board.has_warning());

        board.record_endpoint_check(&Err(EndpointError::PortNotAllowed { port: 1 }));
        board.link_down();
        assert_eq!(
            board.render(),
            "-> Please select a valid port!\n-> Disconnected!\n"
        );

        board.record_endpoint_check(&Ok(()));
        board.connect_failed();
        assert!(board.render().starts_with("-> Connection refused!"));

        board.connect_succeeded();
        board.link_up();
        assert_eq!(board.render(), "Connected!\n");
        assert!(!board.has_warning());
    }

    #[test]
    fn test_missing_host_clears_port_slot() {
        let mut board = StatusBoard::new();
        board.record_endpoint_check(&Err(EndpointError::PortNotAllowed { port: 1 }));
        board.record_endpoint_check(&Err(EndpointError::MissingHost));
        assert_eq!(board.render(), "-> IP is null\n");
    }
}
