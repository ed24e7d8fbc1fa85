// SPDX-License-Identifier: MIT OR Apache-2.0
//! Call-stack capture points attached to chain nodes.

use backtrace::Backtrace;
use serde::{Deserialize, Serialize};

/// One resolved frame of a captured call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Demangled symbol name, empty when resolution failed.
    #[serde(default)]
    pub symbol: String,
    /// Source file, when debug info was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line within `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Call-stack snapshot for diagnostics.
///
/// Holds the resolved frames together with a pre-formatted text rendering
/// for log sinks that only want plain text. Capture happens lazily via
/// [`Fault::capture_trace`](crate::Fault::capture_trace), never at node
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Resolved frames, innermost call first.
    #[serde(default)]
    pub frames: Vec<Frame>,
    /// Pre-formatted text rendering of the whole stack.
    #[serde(default)]
    pub rendered: String,
}

impl Trace {
    /// Capture and resolve the current call stack.
    pub fn capture() -> Self {
        let backtrace = Backtrace::new();
        let frames = backtrace
            .frames()
            .iter()
            .flat_map(|frame| frame.symbols())
            .map(|symbol| Frame {
                symbol: symbol
                    .name()
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                file: symbol.filename().map(|path| path.display().to_string()),
                line: symbol.lineno(),
            })
            .collect();
        Trace {
            frames,
            rendered: format!("{backtrace:?}"),
        }
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.rendered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_produces_rendering() {
        let trace = Trace::capture();
        assert!(!trace.rendered.is_empty());
        assert!(!trace.is_empty());
    }

    #[test]
    fn default_is_empty() {
        assert!(Trace::default().is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let trace = Trace {
            frames: vec![Frame {
                symbol: "svc::lookup_user".into(),
                file: Some("src/svc.rs".into()),
                line: Some(42),
            }],
            rendered: "0: svc::lookup_user at src/svc.rs:42".into(),
        };
        let json = serde_json::to_string(&trace).unwrap();
        let back: Trace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trace);
    }

    #[test]
    fn frame_without_location_omits_fields() {
        let frame = Frame {
            symbol: "unknown".into(),
            file: None,
            line: None,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("file"));
        assert!(!json.contains("line"));
    }
}
