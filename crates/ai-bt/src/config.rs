#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tree driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TreeConfig {
    /// Restart the root on the tick after the primary stack ends.
    pub restart_on_end: bool,

    /// Debug stepping: pause a stack every time it starts delivering a child's result.
    pub pause_after_single_execution: bool,

    /// Maximum node steps a single pass may dispatch before the stack pauses itself. Guards
    /// against synchronous loops that never yield.
    pub max_steps_per_pass: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            restart_on_end: true,
            pause_after_single_execution: false,
            max_steps_per_pass: 10_000,
        }
    }
}
