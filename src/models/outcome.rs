//! Per-field extraction diagnostics.

use std::fmt;

/// Which strategy, if any, produced a field's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub field: &'static str,
    pub value: Option<String>,
    /// Index into the field's strategy list.
    pub strategy: Option<usize>,
}

impl ExtractionOutcome {
    pub fn found(field: &'static str, value: String, strategy: usize) -> Self {
        Self {
            field,
            value: Some(value),
            strategy: Some(strategy),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self {
            field,
            value: None,
            strategy: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.strategy) {
            (Some(value), Some(idx)) => {
                let preview: String = value.chars().take(40).collect();
                write!(f, "{} <- strategy #{} ({:?})", self.field, idx, preview)
            }
            _ => write!(f, "{} <- none", self.field),
        }
    }
}
