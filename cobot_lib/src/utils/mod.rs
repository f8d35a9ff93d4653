pub mod hand_mapping;
pub mod kinematics;
pub mod logging;

pub use hand_mapping::*;
pub use kinematics::*;
pub use logging::*;
