// SPDX-License-Identifier: MIT OR Apache-2.0
//! Classification codes carried by chain levels.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Machine-checkable classification tag for one chain level.
///
/// Codes are open-ended strings: domains built on top of this crate mint
/// their own values with [`Code::from_static`] or [`Code::new`]. The
/// reserved values below carry fixed meaning for
/// [`resolve_code`](crate::Fault::resolve_code); [`Code::NEUTRAL`] in
/// particular is never a terminal classification, it defers to the
/// wrapped predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(Cow<'static, str>);

impl Code {
    /// Default classification used when no other code was specified.
    pub const UNEXPECTED: Code = Code::from_static("");
    /// Basic internal failures.
    pub const INTERNAL: Code = Code::from_static("internal");
    /// Submitted data was invalid. Use when handling external input, e.g.
    /// client data or database requests failing due to constraint
    /// violations.
    pub const BAD_INPUT: Code = Code::from_static("bad-input");
    /// A requested resource was not found.
    pub const NOT_FOUND: Code = Code::from_static("not-found");
    /// Wrapping marker: this level adds no classification of its own and
    /// defers to its predecessor.
    pub const NEUTRAL: Code = Code::from_static("neutral");
    /// The caller is not known but the resource requires authorized access.
    pub const UNAUTHORIZED: Code = Code::from_static("unauthorized");
    /// The caller is known but may not access the resource.
    pub const FORBIDDEN: Code = Code::from_static("forbidden");

    /// Const constructor for domain-defined codes.
    pub const fn from_static(code: &'static str) -> Self {
        Code(Cow::Borrowed(code))
    }

    /// Constructor for dynamically produced codes.
    pub fn new(code: impl Into<String>) -> Self {
        Code(Cow::Owned(code.into()))
    }

    /// String form of the code.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this code defers classification to its predecessor.
    pub fn is_neutral(&self) -> bool {
        *self == Code::NEUTRAL
    }
}

impl Default for Code {
    fn default() -> Self {
        Code::UNEXPECTED
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Code {
    fn from(code: &'static str) -> Self {
        Code(Cow::Borrowed(code))
    }
}

impl From<String> for Code {
    fn from(code: String) -> Self {
        Code(Cow::Owned(code))
    }
}
