//! Controller configuration

use std::time::Duration;

/// Configuration for one workflow controller.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Maximum passes through the generate/check/execute loop. When the
    /// budget runs out the run ends with a graceful fallback answer.
    pub max_iterations: usize,

    /// Timeout applied to every gateway and generation call.
    pub call_timeout: Duration,

    /// Sampling temperature for generation calls.
    pub temperature: f32,

    /// Row cap requested of the generation step (instruction only,
    /// overridable by the user's question).
    pub max_result_rows: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            call_timeout: Duration::from_secs(30),
            temperature: 0.0,
            max_result_rows: 5,
        }
    }
}

impl WorkflowConfig {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_result_rows(mut self, rows: u32) -> Self {
        self.max_result_rows = rows;
        self
    }
}
