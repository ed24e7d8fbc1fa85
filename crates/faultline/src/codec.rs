// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON (de)serialization of fault chains.
//!
//! Wire schema per node: `code`, `wrappedErr` (nested document, omitted at
//! the terminus), `wrappedErrPassThrough`, `message`, `details`, `trace`.
//! A foreign cause is flattened into a one-level document whose message is
//! the foreign rendering and whose details carry the foreign error's own
//! serialization when it is document-shaped, or its formatted form under
//! [`DETAIL_NATIVE`] otherwise. Decoding never fails because a nested
//! payload was not one of our chains; such payloads degrade to opaque
//! foreign messages. Only an invalid outer envelope is an error.

use crate::code::Code;
use crate::fault::{Cause, DETAIL_NATIVE, Details, Fault, ForeignError};
use crate::trace::Trace;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaultDoc {
    #[serde(default)]
    code: Code,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wrapped_err: Option<serde_json::Value>,
    #[serde(default)]
    wrapped_err_pass_through: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Option<Details>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace: Option<Trace>,
}

impl Serialize for Fault {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wrapped_err = match &self.cause {
            None => None,
            Some(Cause::Fault(fault)) => {
                Some(serde_json::to_value(fault.as_ref()).map_err(S::Error::custom)?)
            }
            Some(Cause::Foreign(foreign)) => {
                Some(foreign_doc(foreign).map_err(S::Error::custom)?)
            }
        };
        FaultDoc {
            code: self.code.clone(),
            wrapped_err,
            wrapped_err_pass_through: self.pass_through,
            message: self.message.clone(),
            details: Some(self.details.clone()),
            trace: self.trace.clone(),
        }
        .serialize(serializer)
    }
}

/// Flatten a foreign terminus into a one-level document.
fn foreign_doc(foreign: &ForeignError) -> Result<serde_json::Value, serde_json::Error> {
    let mut details = Details::new();
    match foreign.payload() {
        Some(serde_json::Value::Object(map)) => {
            details.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        // Not document-shaped (bare string, array, ...): keep the raw form.
        Some(other) => {
            details.insert(DETAIL_NATIVE.to_owned(), other.clone());
        }
        None => {
            details.insert(
                DETAIL_NATIVE.to_owned(),
                serde_json::Value::String(format!("{:?}", foreign.as_error())),
            );
        }
    }
    serde_json::to_value(FaultDoc {
        code: Code::UNEXPECTED,
        wrapped_err: None,
        wrapped_err_pass_through: false,
        message: foreign.to_string(),
        details: Some(details),
        trace: None,
    })
}

impl<'de> Deserialize<'de> for Fault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let doc = FaultDoc::deserialize(deserializer)?;
        Ok(Fault {
            code: doc.code,
            cause: doc.wrapped_err.map(decode_cause),
            pass_through: doc.wrapped_err_pass_through,
            message: doc.message,
            details: doc.details.unwrap_or_default(),
            trace: doc.trace.filter(|trace| !trace.is_empty()),
        })
    }
}

/// Nested payloads are tried as structured chains first; anything that does
/// not fit the schema becomes an opaque foreign message carrying the raw
/// JSON text.
fn decode_cause(value: serde_json::Value) -> Cause {
    match serde_json::from_value::<Fault>(value.clone()) {
        Ok(fault) => Cause::Fault(Box::new(fault)),
        Err(_) => Cause::Foreign(ForeignError::opaque(value.to_string())),
    }
}

/// Encode a fault chain to a JSON document string.
///
/// Encoding degrades before it fails: foreign causes that cannot be
/// decomposed still encode via [`DETAIL_NATIVE`]. A failure to produce the
/// document at all surfaces as an [`Code::INTERNAL`]-classified [`Fault`].
pub fn to_json(fault: &Fault) -> Result<String, Fault> {
    serde_json::to_string(fault)
        .map_err(|err| Fault::internal_from(Cause::foreign(err), "encode fault chain", None))
}

/// Decode a fault chain from a JSON document string.
///
/// Only an invalid outer envelope fails; malformed nested payloads come
/// back as opaque foreign termini instead of errors.
pub fn from_json(json: &str) -> Result<Fault, Fault> {
    serde_json::from_str(json)
        .map_err(|err| Fault::internal_from(Cause::foreign(err), "decode fault chain", None))
}
