/// Tuning for binding behavior
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    /// Arm the per-binding generation counter so a superseded refresh can no
    /// longer overwrite state written by a later call. Off by default: the
    /// stock policy is that every completion writes and the last completion
    /// wins, whatever order the calls were made in.
    pub guard_stale_writes: bool,
}

impl BindOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Only let the latest refresh or update write its state cell
    pub fn guard_stale_writes(mut self) -> Self {
        self.guard_stale_writes = true;
        self
    }
}
