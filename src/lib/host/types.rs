use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct HostStats {
    pub total_memory: u64,
    pub available_memory: u64,
    pub total_swap: u64,
    pub used_swap: u64,
    pub system_name: String,
    pub hostname: String,
    pub total_cpus: u64,
}
