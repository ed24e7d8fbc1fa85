// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured error chains with stable codes, details, and pass-through
//! finalization.
//!
//! Every [`Fault`] carries a machine-checkable [`Code`], a human-readable
//! message, arbitrary debugging [`Details`], an optional captured call
//! stack, and an optional wrapped predecessor. Wrapping at each abstraction
//! boundary builds a chain that call sites can classify uniformly
//! ([`Fault::resolve_code`]), render as the classic `"outer: inner: root"`
//! string (the [`std::fmt::Display`] impl), aggregate into flat structured
//! fields ([`Fault::flatten`]), and serialize as a nested JSON document
//! ([`codec`]) without losing information. Chain links may be foreign
//! errors produced by other libraries; they are carried as opaque termini.
//!
//! ```
//! use faultline::{Code, Fault};
//!
//! let root = Fault::new(Code::BAD_INPUT, "invalid id", None);
//! let err = Fault::wrap(root, Code::NEUTRAL, "lookup user", None);
//! assert_eq!(err.to_string(), "lookup user: invalid id");
//! assert_eq!(err.resolve_code(), Code::BAD_INPUT);
//! ```
//!
//! Layers that need to hand an error back to a caller that does not
//! understand this structure mark it with [`Fault::wrap_pass_through`];
//! [`finalize`] then substitutes the wrapped error for the structured
//! wrapper at the process boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod code;
pub mod codec;
mod fault;
mod layers;
mod trace;

pub use code::Code;
pub use fault::{
    Cause, DETAIL_NATIVE, Details, FIELD_CODE, FIELD_ERR_MESSAGE, Fault, ForeignError,
    OpaqueError, ResultExt, cast, finalize,
};
pub use layers::{Layer, Layers};
pub use trace::{Frame, Trace};
