//! Failure Injection for the Mock Host
//!
//! Makes a registered program raise an exception on demand.

use std::collections::HashMap;

/// Exception raised in place of running a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureConfig {
    /// Exception id the program signals
    pub exception_id: String,
    /// Exception message text
    pub message: String,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that raises `exception_id`
    pub fn exception(exception_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_id: exception_id.into(),
            message: message.into(),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector keyed by program name
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<String, FailureConfig>,
    /// Call counts per program (for fail_count tracking)
    call_counts: HashMap<String, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for a program
    pub fn inject(&mut self, program: &str, config: FailureConfig) {
        let key = program.to_ascii_uppercase();
        self.configs.insert(key.clone(), config);
        self.call_counts.insert(key, 0);
    }

    /// Inject an exception for a program
    pub fn inject_exception(
        &mut self,
        program: &str,
        exception_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.inject(program, FailureConfig::exception(exception_id, message));
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Clear failure injection for one program
    pub fn clear_program(&mut self, program: &str) {
        let key = program.to_ascii_uppercase();
        self.configs.remove(&key);
        self.call_counts.remove(&key);
    }

    /// Returns the failure to raise for this call, if any
    pub fn check(&mut self, program: &str) -> Option<&FailureConfig> {
        let key = program.to_ascii_uppercase();
        let config = self.configs.get(&key)?;
        let count = self.call_counts.entry(key).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }
        Some(config)
    }
}
