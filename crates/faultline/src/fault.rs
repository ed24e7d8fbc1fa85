// SPDX-License-Identifier: MIT OR Apache-2.0
//! The chain node, its constructors, and the traversal-backed aggregations.

use crate::code::Code;
use crate::layers::{Layer, Layers};
use crate::trace::Trace;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Debugging details attached to one chain level.
///
/// Keys are unique within a level; [`Fault::flatten`] namespaces them by
/// level so identically named keys on different levels never collide.
pub type Details = BTreeMap<String, serde_json::Value>;

/// Reserved key in [`Fault::flatten`] output holding the resolved
/// classification of the whole chain.
pub const FIELD_CODE: &str = "x_code";

/// Reserved key in [`Fault::flatten`] output holding the rendered message
/// of the whole chain.
pub const FIELD_ERR_MESSAGE: &str = "x_err_message";

/// Reserved detail key under which the codec stores the formatted
/// representation of a foreign cause whose own serialization could not be
/// decomposed into a keyed document.
pub const DETAIL_NATIVE: &str = "_native";

// ---------------------------------------------------------------------------
// ForeignError
// ---------------------------------------------------------------------------

/// An error produced outside this crate, treated as an opaque chain
/// terminus.
///
/// A foreign error has a renderable message and nothing else: no code, no
/// details, no further unwrapping. An optional structured payload, captured
/// at construction via [`ForeignError::with_payload`], lets the codec keep
/// the error's own fields instead of only its text.
///
/// The underlying error is shared behind an [`Arc`] so chains stay [`Clone`]
/// and a rebuilt chain points at the same terminus.
#[derive(Debug, Clone)]
pub struct ForeignError {
    inner: Arc<dyn StdError + Send + Sync>,
    payload: Option<serde_json::Value>,
}

impl ForeignError {
    /// Wrap an arbitrary error as an opaque terminus.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ForeignError {
            inner: Arc::new(err),
            payload: None,
        }
    }

    /// Wrap a serializable error, capturing its own serialization for the
    /// codec.
    ///
    /// A capture failure is not an error: the payload is simply absent and
    /// the codec falls back to the formatted representation.
    pub fn with_payload<E>(err: E) -> Self
    where
        E: StdError + Serialize + Send + Sync + 'static,
    {
        let payload = serde_json::to_value(&err).ok();
        ForeignError {
            inner: Arc::new(err),
            payload,
        }
    }

    /// Terminus carrying nothing but a message, used when a decoded nested
    /// payload is not a structured chain.
    pub fn opaque(message: impl Into<String>) -> Self {
        ForeignError {
            inner: Arc::new(OpaqueError(message.into())),
            payload: None,
        }
    }

    /// Structured payload captured at construction, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// Borrow the underlying error object.
    pub fn as_error(&self) -> &(dyn StdError + 'static) {
        self.inner.as_ref()
    }

    /// Shared handle to the underlying error object.
    pub fn into_inner(self) -> Arc<dyn StdError + Send + Sync> {
        self.inner
    }
}

impl fmt::Display for ForeignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for ForeignError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

/// Plain message-only error, the terminus behind payloads the codec could
/// not decode as structured chains.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct OpaqueError(pub String);

// ---------------------------------------------------------------------------
// Cause
// ---------------------------------------------------------------------------

/// Predecessor of a chain level.
///
/// The explicit variant keeps dispatch in one place ([`Layers`]); everything
/// consuming a chain treats it as opaque. A missing predecessor is
/// `Option<Cause>::None` on the node.
#[derive(Debug, Clone)]
pub enum Cause {
    /// A structured chain node.
    Fault(Box<Fault>),
    /// An opaque foreign terminus.
    Foreign(ForeignError),
}

impl Cause {
    /// Wrap an arbitrary non-structured error as a foreign cause.
    pub fn foreign<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Cause::Foreign(ForeignError::new(err))
    }

    /// Like [`Cause::foreign`], capturing the error's own serialization so
    /// the codec can keep its fields.
    pub fn foreign_with_payload<E>(err: E) -> Self
    where
        E: StdError + Serialize + Send + Sync + 'static,
    {
        Cause::Foreign(ForeignError::with_payload(err))
    }

    /// Iterate the chain starting at this cause.
    pub fn layers(&self) -> Layers<'_> {
        Layers::new(Some(self.as_layer()))
    }

    pub(crate) fn as_layer(&self) -> Layer<'_> {
        match self {
            Cause::Fault(fault) => Layer::Fault(fault),
            Cause::Foreign(foreign) => Layer::Foreign(foreign),
        }
    }

    /// Normalize to a structured node.
    ///
    /// Structured input is returned as-is (identity, not a copy); foreign
    /// input is wrapped once with [`Code::UNEXPECTED`].
    pub fn cast(self) -> Fault {
        match self {
            Cause::Fault(fault) => *fault,
            foreign => Fault {
                cause: Some(foreign),
                ..Fault::default()
            },
        }
    }

    /// First non-[`Code::NEUTRAL`] classification of the chain, top-down.
    pub fn resolve_code(&self) -> Code {
        resolve_code_of(self.layers())
    }

    /// Return this chain with every pass-through flag forced off.
    ///
    /// Foreign input is returned unchanged. The chain is consumed, so the
    /// result is a fresh value no other holder can observe mid-change;
    /// applying it twice yields the same chain as once.
    pub fn clear_pass_through(self) -> Cause {
        match self {
            Cause::Fault(fault) => Cause::Fault(Box::new(fault.clear_pass_through())),
            foreign => foreign,
        }
    }
}

impl From<Fault> for Cause {
    fn from(fault: Fault) -> Cause {
        Cause::Fault(Box::new(fault))
    }
}

impl From<Box<Fault>> for Cause {
    fn from(fault: Box<Fault>) -> Cause {
        Cause::Fault(fault)
    }
}

impl From<ForeignError> for Cause {
    fn from(foreign: ForeignError) -> Cause {
        Cause::Foreign(foreign)
    }
}

// ---------------------------------------------------------------------------
// Fault
// ---------------------------------------------------------------------------

/// One level of structured error context: a classification [`Code`], a
/// message, debugging [`Details`], an optional predecessor, and an optional
/// captured [`Trace`].
///
/// A `Fault` is the container kept while an error bubbles upward: each
/// abstraction boundary that wants to add context wraps the previous error
/// into a new outer node via [`Fault::wrap`]. Consumers never mutate a
/// chain; they read it through [`Fault::resolve_code`], the [`fmt::Display`]
/// rendering, and [`Fault::flatten`], or resolve it with [`finalize`].
#[derive(Debug, Clone, Default)]
pub struct Fault {
    /// Classification of this level only.
    ///
    /// This is a purely local marker; use [`Fault::resolve_code`] for the
    /// effective classification of the whole chain (skipping
    /// [`Code::NEUTRAL`] levels added by wrapping).
    pub code: Code,
    /// Wrapped predecessor; absent for a chain terminus.
    pub cause: Option<Cause>,
    /// Whether [`finalize`] must return `cause` directly instead of the
    /// structured wrapper. Meaningless without a cause.
    pub pass_through: bool,
    /// Message for this level; empty messages are skipped when rendering.
    pub message: String,
    /// Debugging details for this level.
    pub details: Details,
    /// Captured call stack, set via [`Fault::capture_trace`].
    pub trace: Option<Trace>,
}

impl Fault {
    /// Terminal node with the given classification, message, and details:
    /// the root cause occurred at construction of this very node.
    pub fn new(code: Code, message: impl Into<String>, details: Option<Details>) -> Self {
        Fault {
            code,
            message: message.into(),
            details: details.unwrap_or_default(),
            ..Fault::default()
        }
    }

    /// New outer node wrapping `cause`.
    ///
    /// Any pass-through flags anywhere in the wrapped chain are cleared
    /// first: wrapping insulates pending pass-through unless explicitly
    /// re-requested via [`Fault::wrap_pass_through`].
    ///
    /// No stack trace is attached; capture one explicitly with
    /// [`Fault::capture_trace`] where it is worth the cost.
    pub fn wrap(
        cause: impl Into<Cause>,
        code: Code,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault {
            code,
            cause: Some(cause.into().clear_pass_through()),
            message: message.into(),
            details: details.unwrap_or_default(),
            ..Fault::default()
        }
    }

    /// Like [`Fault::wrap`], but marks the new node for pass-through and
    /// leaves inner pass-through flags untouched.
    ///
    /// [`finalize`] will return the wrapped error from the outermost level
    /// marked this way, even through further structured context added above
    /// it with [`Fault::wrap_pass_through`].
    pub fn wrap_pass_through(
        cause: impl Into<Cause>,
        code: Code,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault {
            code,
            cause: Some(cause.into()),
            pass_through: true,
            message: message.into(),
            details: details.unwrap_or_default(),
            ..Fault::default()
        }
    }

    /// Wrap with only a new classification; message and details stay with
    /// the predecessor.
    pub fn apply_code(cause: impl Into<Cause>, code: Code) -> Self {
        Fault {
            code,
            cause: Some(cause.into()),
            ..Fault::default()
        }
    }

    /// Wrap with only additional details, using the [`Code::NEUTRAL`] code
    /// so classification stays with the predecessor.
    pub fn apply_details(cause: impl Into<Cause>, details: Details) -> Self {
        Fault {
            code: Code::NEUTRAL,
            cause: Some(cause.into()),
            details,
            ..Fault::default()
        }
    }

    /// [`Code::INTERNAL`] terminal node.
    pub fn internal(message: impl Into<String>, details: Option<Details>) -> Self {
        Fault::new(Code::INTERNAL, message, details)
    }

    /// [`Code::INTERNAL`] node wrapping `cause`.
    pub fn internal_from(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault::wrap(cause, Code::INTERNAL, message, details)
    }

    /// [`Code::BAD_INPUT`] terminal node.
    pub fn bad_input(message: impl Into<String>, details: Option<Details>) -> Self {
        Fault::new(Code::BAD_INPUT, message, details)
    }

    /// [`Code::BAD_INPUT`] node wrapping `cause`.
    pub fn bad_input_from(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault::wrap(cause, Code::BAD_INPUT, message, details)
    }

    /// [`Code::NOT_FOUND`] terminal node.
    pub fn not_found(message: impl Into<String>, details: Option<Details>) -> Self {
        Fault::new(Code::NOT_FOUND, message, details)
    }

    /// [`Code::NOT_FOUND`] node wrapping `cause`.
    pub fn not_found_from(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault::wrap(cause, Code::NOT_FOUND, message, details)
    }

    /// [`Code::UNAUTHORIZED`] terminal node.
    pub fn unauthorized(message: impl Into<String>, details: Option<Details>) -> Self {
        Fault::new(Code::UNAUTHORIZED, message, details)
    }

    /// [`Code::UNAUTHORIZED`] node wrapping `cause`.
    pub fn unauthorized_from(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault::wrap(cause, Code::UNAUTHORIZED, message, details)
    }

    /// [`Code::FORBIDDEN`] terminal node.
    pub fn forbidden(message: impl Into<String>, details: Option<Details>) -> Self {
        Fault::new(Code::FORBIDDEN, message, details)
    }

    /// [`Code::FORBIDDEN`] node wrapping `cause`.
    pub fn forbidden_from(
        cause: impl Into<Cause>,
        message: impl Into<String>,
        details: Option<Details>,
    ) -> Self {
        Fault::wrap(cause, Code::FORBIDDEN, message, details)
    }

    /// Attach one detail, converting the value via [`serde_json::to_value`].
    ///
    /// If the value does not serialize, the entry is silently skipped.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.details.insert(key.into(), value);
        }
        self
    }

    /// Capture the current call stack onto this node.
    ///
    /// Nodes are otherwise immutable once built; take this builder step
    /// right after construction, before the node is shared.
    pub fn capture_trace(mut self) -> Self {
        self.trace = Some(Trace::capture());
        self
    }

    /// Iterate the chain from this node down to its terminus.
    pub fn layers(&self) -> Layers<'_> {
        Layers::new(Some(Layer::Fault(self)))
    }

    /// First non-[`Code::NEUTRAL`] classification of the chain, top-down.
    ///
    /// A foreign level counts as [`Code::UNEXPECTED`]. If the whole chain is
    /// neutral, [`Code::NEUTRAL`] itself is returned and means "no
    /// classification available", never a valid business code.
    pub fn resolve_code(&self) -> Code {
        resolve_code_of(self.layers())
    }

    /// Aggregate every level's details into one flat map.
    ///
    /// Each key is namespaced as `"{level}/{key}"`, so identically named
    /// keys on different levels coexist. Two reserved entries,
    /// [`FIELD_CODE`] and [`FIELD_ERR_MESSAGE`], carry the resolved
    /// classification and the rendered message of the whole chain. The
    /// returned map is a copy; mutating it never touches the chain.
    pub fn flatten(&self) -> Details {
        let mut map = Details::new();
        let mut layers = self.layers();
        while let Some(layer) = layers.next() {
            if let Some(fault) = layer.as_fault() {
                for (key, value) in &fault.details {
                    map.insert(format!("{}/{}", layers.level(), key), value.clone());
                }
            }
        }
        map.insert(
            FIELD_CODE.to_owned(),
            serde_json::Value::String(self.resolve_code().as_str().to_owned()),
        );
        map.insert(
            FIELD_ERR_MESSAGE.to_owned(),
            serde_json::Value::String(self.to_string()),
        );
        map
    }

    /// Innermost captured trace in the chain, if any level recorded one.
    pub fn deepest_trace(&self) -> Option<&Trace> {
        let mut deepest = None;
        for layer in self.layers() {
            if let Some(trace) = layer.as_fault().and_then(|fault| fault.trace.as_ref()) {
                deepest = Some(trace);
            }
        }
        deepest
    }

    /// Chain-wide pass-through clearing on a structured root; see
    /// [`Cause::clear_pass_through`].
    pub fn clear_pass_through(mut self) -> Fault {
        self.pass_through = false;
        if let Some(cause) = self.cause.take() {
            self.cause = Some(cause.clear_pass_through());
        }
        self
    }
}

impl fmt::Display for Fault {
    /// Renders the chain as the classic `"outer: inner: root"` string:
    /// non-empty messages joined with `": "` in traversal order. Codes and
    /// details never appear here.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for layer in self.layers() {
            match layer {
                Layer::Fault(fault) if fault.message.is_empty() => continue,
                Layer::Fault(fault) => {
                    if !first {
                        f.write_str(": ")?;
                    }
                    f.write_str(&fault.message)?;
                }
                Layer::Foreign(foreign) => {
                    let message = foreign.to_string();
                    if message.is_empty() {
                        continue;
                    }
                    if !first {
                        f.write_str(": ")?;
                    }
                    f.write_str(&message)?;
                }
            }
            first = false;
        }
        Ok(())
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.cause {
            Some(Cause::Fault(fault)) => Some(fault.as_ref()),
            Some(Cause::Foreign(foreign)) => Some(foreign.as_error()),
            None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions over chains
// ---------------------------------------------------------------------------

fn resolve_code_of(layers: Layers<'_>) -> Code {
    for layer in layers {
        match layer {
            Layer::Fault(fault) if fault.code.is_neutral() => continue,
            Layer::Fault(fault) => return fault.code.clone(),
            // A foreign level classifies as a cast would: unexpected.
            Layer::Foreign(_) => return Code::UNEXPECTED,
        }
    }
    Code::NEUTRAL
}

/// Normalize any error value to a structured [`Fault`].
///
/// Structured input is returned unchanged; foreign input is wrapped once
/// with [`Code::UNEXPECTED`]. `None` should not happen at call sites and
/// yields a diagnostic node instead of failing, so misuse surfaces in logs
/// rather than as a crash.
pub fn cast(err: Option<Cause>) -> Fault {
    match err {
        Some(cause) => cause.cast(),
        None => Fault {
            message: "cast of absent error".to_owned(),
            ..Fault::default()
        },
    }
}

/// Resolve a chain for handing off to callers that do not understand the
/// structured format.
///
/// Walks top-down; at the outermost level marked pass-through, the wrapped
/// value is returned verbatim, bypassing all structure above and below it.
/// Intermediate layers may still have added structured context for logging
/// before this point. Without any pass-through marker, the cast-normalized
/// chain itself is returned. `None` stays `None`.
pub fn finalize(err: Option<Cause>) -> Option<Cause> {
    let err = err?;
    Some(match err {
        Cause::Fault(fault) => match descend_pass_through(*fault) {
            Ok(passed) => passed,
            Err(original) => Cause::Fault(Box::new(original)),
        },
        foreign => Cause::Fault(Box::new(foreign.cast())),
    })
}

/// Descend looking for the outermost pass-through level. `Ok` carries the
/// wrapped value to pass through; `Err` carries the reassembled, untouched
/// chain.
fn descend_pass_through(mut fault: Fault) -> Result<Cause, Fault> {
    match fault.cause.take() {
        Some(cause) if fault.pass_through => Ok(cause),
        Some(Cause::Fault(inner)) => match descend_pass_through(*inner) {
            Ok(passed) => Ok(passed),
            Err(rebuilt) => {
                fault.cause = Some(Cause::Fault(Box::new(rebuilt)));
                Err(fault)
            }
        },
        Some(foreign) => {
            fault.cause = Some(foreign);
            Err(fault)
        }
        None => Err(fault),
    }
}

// ---------------------------------------------------------------------------
// Result extension
// ---------------------------------------------------------------------------

/// Extension for wrapping the error arm of a [`Result`] into a new chain
/// level.
pub trait ResultExt<T> {
    /// Wrap the error with `code` and `message` as a new outer level.
    fn wrap_fault<M: Into<String>>(self, code: Code, message: M) -> Result<T, Fault>;

    /// Like [`ResultExt::wrap_fault`], with lazily built message and
    /// details for call sites where producing them is not free.
    fn wrap_fault_with<F>(self, code: Code, build: F) -> Result<T, Fault>
    where
        F: FnOnce() -> (String, Option<Details>);
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Cause>,
{
    fn wrap_fault<M: Into<String>>(self, code: Code, message: M) -> Result<T, Fault> {
        self.map_err(|err| Fault::wrap(err, code, message, None))
    }

    fn wrap_fault_with<F>(self, code: Code, build: F) -> Result<T, Fault>
    where
        F: FnOnce() -> (String, Option<Details>),
    {
        self.map_err(|err| {
            let (message, details) = build();
            Fault::wrap(err, code, message, details)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
