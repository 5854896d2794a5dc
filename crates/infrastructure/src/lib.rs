pub mod engine;
pub mod file_server;
pub mod repositories;

pub use engine::*;
pub use file_server::*;
pub use repositories::*;
