use serde::{Deserialize, Serialize};

/// Allowed network egress for a sandbox (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Egress {
    /// No network access at all.
    Off,
    /// Only the listed hosts (glob patterns) are reachable.
    Allowlisted(Vec<String>),
    /// Unrestricted network access.
    Full,
}

/// The policy object a sandbox is created under: "allowed egress..., allowed
/// read paths, allowed write paths, max CPU time, max memory, max wall
/// time, and whether exec is permitted at all" (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxPolicy {
    /// Network egress policy.
    pub egress: Egress,
    /// Path glob patterns readable inside the sandbox.
    pub allowed_read: Vec<String>,
    /// Path glob patterns writable inside the sandbox.
    pub allowed_write: Vec<String>,
    /// Maximum cumulative CPU time, in milliseconds.
    pub max_cpu_ms: u64,
    /// Maximum resident memory, in bytes.
    pub max_memory_bytes: u64,
    /// Maximum wall-clock time for any single operation, in milliseconds.
    pub max_wall_ms: u64,
    /// Whether `exec` is permitted at all.
    pub exec_permitted: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            egress: Egress::Off,
            allowed_read: vec!["**".into()],
            allowed_write: vec!["**".into()],
            max_cpu_ms: 60_000,
            max_memory_bytes: 512 * 1024 * 1024,
            max_wall_ms: 120_000,
            exec_permitted: true,
        }
    }
}
