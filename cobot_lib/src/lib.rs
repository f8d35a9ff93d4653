//! # Cobot Library
//!
//! Shared types and utilities for the hand-teleoperated cobot.
//! Used by the `hand_teleop` node and anything else that needs the IK solver
//! or the pose streaming link.

pub mod net;
pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use net::*;
pub use types::*;
pub use utils::*;
