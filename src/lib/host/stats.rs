use serde::{Serialize, ser::SerializeStruct};
use sysinfo::System;

use super::types::HostStats;

impl Serialize for HostStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("HostStats", 7)?;
        state.serialize_field("total_memory", &format!("{} MB", self.total_memory))?;
        state.serialize_field("available_memory", &format!("{} MB", self.available_memory))?;
        state.serialize_field("total_swap", &format!("{} MB", self.total_swap))?;
        state.serialize_field("used_swap", &format!("{} MB", self.used_swap))?;
        state.serialize_field("system_name", &self.system_name)?;
        state.serialize_field("hostname", &self.hostname)?;
        state.serialize_field("total_cpus", &self.total_cpus)?;
        state.end()
    }
}

pub fn host_stats() -> HostStats {
    let mut sysinfo = System::new();
    sysinfo.refresh_memory();
    sysinfo.refresh_cpu_usage();

    HostStats {
        total_memory: sysinfo.total_memory() / 1024 / 1024,
        available_memory: sysinfo.available_memory() / 1024 / 1024,
        total_swap: sysinfo.total_swap() / 1024 / 1024,
        used_swap: sysinfo.used_swap() / 1024 / 1024,
        system_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        total_cpus: sysinfo.cpus().len() as u64,
    }
}

/// Memory the host can hand to a new container right now, in MB.
pub fn available_memory_mb() -> u64 {
    let mut sysinfo = System::new();
    sysinfo.refresh_memory();
    sysinfo.available_memory() / 1024 / 1024
}
