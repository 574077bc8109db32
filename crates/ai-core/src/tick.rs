#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the three host callbacks that make up a tick, in the order the host calls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TickPhase {
    /// Pre-physics.
    Update,
    /// Physics step.
    FixedUpdate,
    /// Post-physics.
    LateUpdate,
}

impl TickPhase {
    pub const ALL: [TickPhase; 3] = [
        TickPhase::Update,
        TickPhase::FixedUpdate,
        TickPhase::LateUpdate,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
    pub phase: TickPhase,
}

impl TickContext {
    pub fn new(tick: u64, dt_seconds: f32, phase: TickPhase) -> Self {
        Self {
            tick,
            dt_seconds,
            phase,
        }
    }

    pub fn with_phase(self, phase: TickPhase) -> Self {
        Self { phase, ..self }
    }
}

impl Default for TickContext {
    fn default() -> Self {
        Self {
            tick: 0,
            dt_seconds: 0.0,
            phase: TickPhase::Update,
        }
    }
}
