pub mod core;
pub mod state;

pub use core::Supervisor;
pub use state::{Status, StatusInfo};
