//! Construction-time engine parameters. No environment variables, no
//! config files — this is the entire tunable surface.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bounds the `requiresReRun` fixed-point loop inside a single
    /// `evaluateCell` call. Exceeding it yields `ErrKind::Error` for the
    /// cell under evaluation rather than looping forever on a pathological
    /// spill flip-flop.
    pub max_rerun_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rerun_iterations: 64,
        }
    }
}
