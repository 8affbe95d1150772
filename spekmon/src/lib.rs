pub mod input;
pub mod monitor;
pub mod proto;
pub mod source;

pub use monitor::Monitor;
pub use proto::ScanReading;
