// SPDX-License-Identifier: MIT OR Apache-2.0
//! Level-ordered traversal over a fault chain.

use crate::fault::{Cause, Fault, ForeignError};

/// One level of a chain as seen by [`Layers`].
///
/// All dispatch between structured nodes and foreign termini happens here;
/// a foreign layer only answers "what is your message".
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    /// A structured chain node.
    Fault(&'a Fault),
    /// An opaque foreign terminus.
    Foreign(&'a ForeignError),
}

impl<'a> Layer<'a> {
    /// The level's message: a structured node's own message or the foreign
    /// error's rendering.
    pub fn message(&self) -> String {
        match self {
            Layer::Fault(fault) => fault.message.clone(),
            Layer::Foreign(foreign) => foreign.to_string(),
        }
    }

    /// The structured node at this level, if it is one.
    pub fn as_fault(&self) -> Option<&'a Fault> {
        match self {
            Layer::Fault(fault) => Some(fault),
            Layer::Foreign(_) => None,
        }
    }
}

/// Lazy top-to-bottom iterator over the levels of a chain.
///
/// The starting error itself is level 0, so no special case is needed for
/// the initial node. Iteration terminates after a foreign terminus or a
/// node without a predecessor; there is nothing left to unwrap behind
/// either.
#[derive(Debug, Clone)]
pub struct Layers<'a> {
    pending: Option<Layer<'a>>,
    level: i64,
}

impl<'a> Layers<'a> {
    pub(crate) fn new(start: Option<Layer<'a>>) -> Self {
        Layers {
            pending: start,
            level: -1,
        }
    }

    /// Level of the most recently yielded layer.
    ///
    /// Starts at -1 and reaches 0 with the first call to
    /// [`Iterator::next`].
    pub fn level(&self) -> i64 {
        self.level
    }
}

impl<'a> Iterator for Layers<'a> {
    type Item = Layer<'a>;

    fn next(&mut self) -> Option<Layer<'a>> {
        let current = self.pending.take()?;
        self.level += 1;
        self.pending = match current {
            Layer::Fault(fault) => fault.cause.as_ref().map(Cause::as_layer),
            Layer::Foreign(_) => None,
        };
        Some(current)
    }
}
