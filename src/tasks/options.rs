//! Progress presentation options carried by tasks for display surfaces.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How a progress bar should interpret reported values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Values map linearly onto `[minimum, maximum]`.
    Determinate,
    /// Values are ignored; the bar shows ongoing activity.
    Indeterminate,
}

/// Presentation hints for a task's progress display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBarOptions {
    pub minimum: u32,
    pub maximum: u32,
    pub mode: ProgressMode,
    /// Text shown while the task runs.
    pub working_text: String,
}

impl ProgressBarOptions {
    /// Determinate bar over `[minimum, maximum]`.
    pub fn determinate(minimum: u32, maximum: u32) -> Self {
        Self {
            minimum,
            maximum,
            mode: ProgressMode::Determinate,
            ..Self::default()
        }
    }

    /// Activity-only bar.
    pub fn indeterminate() -> Self {
        Self {
            mode: ProgressMode::Indeterminate,
            ..Self::default()
        }
    }

    /// Snapshot for debug surfaces.
    pub fn inspect(&self) -> Value {
        json!({
            "minimum": self.minimum,
            "maximum": self.maximum,
            "mode": match self.mode {
                ProgressMode::Determinate => "determinate",
                ProgressMode::Indeterminate => "indeterminate",
            },
            "working_text": self.working_text,
        })
    }
}

impl Default for ProgressBarOptions {
    fn default() -> Self {
        Self {
            minimum: 0,
            maximum: 100,
            mode: ProgressMode::Determinate,
            working_text: "Working...".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let det = ProgressBarOptions::determinate(0, 10);
        assert_eq!(det.maximum, 10);
        assert_eq!(det.mode, ProgressMode::Determinate);

        let ind = ProgressBarOptions::indeterminate();
        assert_eq!(ind.mode, ProgressMode::Indeterminate);
    }
}
