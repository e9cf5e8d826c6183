use crate::constants::DEFAULT_STEP_COUNT;
use crate::error::{FuzzError, Result};
use crate::mode::FuzzMode;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Run parameters for one fuzz iteration.
///
/// Passed by value into every transport; nothing is kept in process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// Synthesize acknowledgements for client writes.
    pub autopilot: bool,
    pub mode: FuzzMode,
    /// Maximum bytes handed out per read; zero or negative disables the cap.
    pub fragment_cap: i32,
    /// Client steps per input.
    pub step_count: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            autopilot: false,
            mode: FuzzMode::Handshake,
            fragment_cap: 0,
            step_count: DEFAULT_STEP_COUNT,
        }
    }
}

impl FuzzConfig {
    #[must_use]
    pub fn new(autopilot: bool, mode: FuzzMode, fragment_cap: i32) -> Self {
        Self {
            autopilot,
            mode,
            fragment_cap,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_autopilot(mut self, autopilot: bool) -> Self {
        self.autopilot = autopilot;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FuzzMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_fragment_cap(mut self, fragment_cap: i32) -> Self {
        self.fragment_cap = fragment_cap;
        self
    }

    #[must_use]
    pub fn with_step_count(mut self, step_count: usize) -> Self {
        self.step_count = step_count;
        self
    }

    /// The cap as a usable limit, `None` when reads are uncapped.
    #[must_use]
    pub fn fragment_limit(&self) -> Option<NonZeroUsize> {
        usize::try_from(self.fragment_cap)
            .ok()
            .and_then(NonZeroUsize::new)
    }

    /// # Errors
    /// Returns `Configuration` if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `Configuration` if the step count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.step_count == 0 {
            return Err(FuzzError::Configuration(
                "step_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
