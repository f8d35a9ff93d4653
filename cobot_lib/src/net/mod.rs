pub mod link;
pub mod payload;
pub mod streamer;

pub use link::*;
pub use payload::*;
pub use streamer::*;
