pub mod arm_types;
pub mod config;
pub mod hand_types;
pub mod link_types;

pub use arm_types::*;
pub use config::*;
pub use hand_types::*;
pub use link_types::*;
