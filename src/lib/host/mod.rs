pub mod stats;
pub mod types;

pub use stats::{available_memory_mb, host_stats};
pub use types::HostStats;
