// SPDX-License-Identifier: MIT OR Apache-2.0
//! Logging sink for fault chains on top of [`tracing`].
//!
//! [`log`] emits exactly one record per fault: the rendered chain as the
//! log message and the flattened chain as structured data. The severity is
//! resolved from the chain's classification through a process-wide
//! [`LevelTranslator`], set once at startup and read from every
//! request-handling path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use faultline::{Cause, Code, Details, FIELD_ERR_MESSAGE, Fault};
use std::sync::RwLock;
use tracing::Level;

/// Maps a classification code to the severity its records are emitted at.
pub type LevelTranslator = Box<dyn Fn(&Code) -> Level + Send + Sync>;

static LEVEL_TRANSLATOR: RwLock<Option<LevelTranslator>> = RwLock::new(None);
static OMIT_ERR_MESSAGE_FIELD: RwLock<bool> = RwLock::new(false);

/// Replace the process-wide level translator used by [`log`].
///
/// Meant to be called once (or rarely) at startup; concurrent readers see
/// the new mapping after this returns.
pub fn set_level_translator(translator: LevelTranslator) {
    *LEVEL_TRANSLATOR
        .write()
        .expect("level translator lock poisoned") = Some(translator);
}

/// Severity for the given code under the current translator.
///
/// Defaults to [`Level::ERROR`] for every code until a translator is set.
pub fn level_for(code: &Code) -> Level {
    let guard = LEVEL_TRANSLATOR
        .read()
        .expect("level translator lock poisoned");
    match guard.as_ref() {
        Some(translator) => translator(code),
        None => Level::ERROR,
    }
}

/// Set whether the reserved rendered-message field is dropped from the
/// structured fields.
///
/// The rendered chain is already the log line; omitting the duplicate field
/// improves human readability of structured output.
pub fn omit_error_message_field(omit: bool) {
    *OMIT_ERR_MESSAGE_FIELD
        .write()
        .expect("omit message field lock poisoned") = omit;
}

/// Emit one record for the fault at the severity resolved from its
/// classification.
pub fn log(fault: &Fault) {
    log_at(level_for(&fault.resolve_code()), fault);
}

/// Wrap with a [`Code::NEUTRAL`] context level, then [`log`].
pub fn wrap_and_log(cause: impl Into<Cause>, message: &str) {
    log(&Fault::wrap(cause, Code::NEUTRAL, message, None));
}

/// Emit one record for the fault at the given severity.
///
/// The flattened chain travels as a single structured `fields` value;
/// `tracing` macros only take statically named fields.
pub fn log_at(level: Level, fault: &Fault) {
    let fields = structured_fields(fault);
    let fields = serde_json::to_string(&fields).unwrap_or_else(|_| String::from("{}"));
    let code = fault.resolve_code();
    let message = fault.to_string();
    if level == Level::TRACE {
        tracing::trace!(code = %code, fields = %fields, "{message}");
    } else if level == Level::DEBUG {
        tracing::debug!(code = %code, fields = %fields, "{message}");
    } else if level == Level::INFO {
        tracing::info!(code = %code, fields = %fields, "{message}");
    } else if level == Level::WARN {
        tracing::warn!(code = %code, fields = %fields, "{message}");
    } else {
        tracing::error!(code = %code, fields = %fields, "{message}");
    }
}

/// Flattened fields for one record, honoring the omit-message toggle.
fn structured_fields(fault: &Fault) -> Details {
    let mut fields = fault.flatten();
    let omit = *OMIT_ERR_MESSAGE_FIELD
        .read()
        .expect("omit message field lock poisoned");
    if omit {
        fields.remove(FIELD_ERR_MESSAGE);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn default_level_is_error_for_every_code() {
        assert_eq!(level_for(&Code::BAD_INPUT), Level::ERROR);
        assert_eq!(level_for(&Code::INTERNAL), Level::ERROR);
        assert_eq!(level_for(&Code::from_static("domain-code")), Level::ERROR);
    }

    #[test]
    #[serial]
    fn translator_overrides_default() {
        set_level_translator(Box::new(|code| {
            if *code == Code::BAD_INPUT {
                Level::WARN
            } else {
                Level::ERROR
            }
        }));
        assert_eq!(level_for(&Code::BAD_INPUT), Level::WARN);
        assert_eq!(level_for(&Code::INTERNAL), Level::ERROR);
        set_level_translator(Box::new(|_| Level::ERROR));
    }

    #[test]
    #[serial]
    fn omit_toggle_drops_reserved_message_field() {
        let fault = Fault::bad_input("invalid id", None);
        omit_error_message_field(true);
        let omitted = structured_fields(&fault);
        omit_error_message_field(false);
        let kept = structured_fields(&fault);
        assert!(!omitted.contains_key(FIELD_ERR_MESSAGE));
        assert!(kept.contains_key(FIELD_ERR_MESSAGE));
    }
}
