//! Durability mode configuration
//!
//! Controls whether a commit is fsynced before it is acknowledged.

/// Durability mode for log appends
///
/// # Modes
///
/// | Mode | fsync | Data Loss Window |
/// |------|-------|-----------------|
/// | Always | Every commit | Zero |
/// | NoSync | Only at close | Commits since the last close or OS flush |
///
/// `NoSync` still writes every commit record to the file before the commit
/// returns; it only skips the barrier. A crash can therefore lose recent
/// commits or leave a torn tail, which recovery discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every commit (the default)
    #[default]
    Always,

    /// Skip the per-commit fsync
    ///
    /// Use for bulk loads and tests where throughput matters more than the
    /// last few commits.
    NoSync,
}

impl DurabilityMode {
    /// Check if this mode requires an fsync on every commit
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Always => "Always sync (safest, slowest)",
            DurabilityMode::NoSync => "No sync (fastest, recent commits lost on crash)",
        }
    }
}
