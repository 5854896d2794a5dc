pub mod engine_status;
pub mod file_entry;
pub mod info_hash;
pub mod magnet;
pub mod session;
pub mod stream;

pub use engine_status::*;
pub use file_entry::*;
pub use info_hash::*;
pub use magnet::*;
pub use session::*;
pub use stream::*;
