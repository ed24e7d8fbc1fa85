// SPDX-License-Identifier: MIT OR Apache-2.0
//! Classification of postgres driver errors into fault chains.
//!
//! Server-reported SQLSTATEs decide the classification: what the client
//! submitted ([`Code::BAD_INPUT`]) versus what the service got wrong
//! ([`Code::INTERNAL`]). The failed query and the server's own error fields
//! travel along as details so the log record locates the statement.
//!
//! SQLSTATE classes: <https://www.postgresql.org/docs/13/errcodes-appendix.html>.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use faultline::{Cause, Code, Details, Fault};
use tokio_postgres::Error as PgError;

/// SQLSTATE class prefix for data exceptions.
pub const SQLSTATE_CLASS_DATA_EXCEPTION: &str = "22";

/// SQLSTATE class prefix for integrity constraint violations.
pub const SQLSTATE_CLASS_CONSTRAINT_VIOLATION: &str = "23";

/// SQLSTATE class prefix for syntax errors and access rule violations.
pub const SQLSTATE_CLASS_SYNTAX_OR_ACCESS: &str = "42";

/// Classify a driver error by its SQLSTATE class.
///
/// This is the driver-agnostic seam: constraint violations and data
/// exceptions come from what the caller submitted and classify as
/// [`Code::BAD_INPUT`]; syntax and access rule violations are our own
/// statements gone wrong and classify as [`Code::INTERNAL`], as does
/// everything unrecognized.
pub fn classify_sqlstate(cause: impl Into<Cause>, sqlstate: Option<&str>) -> Fault {
    match sqlstate {
        Some(state) if state.starts_with(SQLSTATE_CLASS_CONSTRAINT_VIOLATION) => {
            Fault::wrap(cause, Code::BAD_INPUT, "constraint violation", None)
        }
        Some(state) if state.starts_with(SQLSTATE_CLASS_DATA_EXCEPTION) => {
            Fault::wrap(cause, Code::BAD_INPUT, "data exception", None)
        }
        Some(state) if state.starts_with(SQLSTATE_CLASS_SYNTAX_OR_ACCESS) => {
            Fault::wrap(cause, Code::INTERNAL, "syntax error", None)
        }
        _ => Fault::wrap(cause, Code::INTERNAL, "", None),
    }
}

/// Classify a failed query and attach the query text as a detail.
///
/// Server errors classify through [`classify_sqlstate`] with the
/// server-reported fields added to the details. A closed connection is an
/// [`Code::INTERNAL`] condition of its own; anything else falls back to
/// [`Code::INTERNAL`] with the caller's message.
pub fn query_error(err: PgError, message: impl Into<String>, query: &str) -> Fault {
    let mut details = Details::new();
    details.insert("query".to_owned(), query.into());
    let sqlstate = err.code().map(|state| state.code().to_owned());
    if let Some(db) = err.as_db_error() {
        details.insert("pg_message".to_owned(), db.message().to_owned().into());
        if let Some(detail) = db.detail() {
            details.insert("pg_detail".to_owned(), detail.to_owned().into());
        }
        if let Some(constraint) = db.constraint() {
            details.insert("pg_constraint".to_owned(), constraint.to_owned().into());
        }
        if let Some(table) = db.table() {
            details.insert("pg_table".to_owned(), table.to_owned().into());
        }
        if let Some(column) = db.column() {
            details.insert("pg_column".to_owned(), column.to_owned().into());
        }
    }
    if let Some(state) = &sqlstate {
        details.insert("sqlstate".to_owned(), state.clone().into());
    }

    let is_server_error = err.as_db_error().is_some();
    let connection_closed = err.is_closed();
    let cause = Cause::foreign(err);
    if is_server_error {
        Fault::wrap(
            classify_sqlstate(cause, sqlstate.as_deref()),
            Code::NEUTRAL,
            message,
            Some(details),
        )
    } else if connection_closed {
        Fault::wrap(
            Fault::wrap(cause, Code::INTERNAL, "connection closed", None),
            Code::NEUTRAL,
            message,
            Some(details),
        )
    } else {
        Fault::internal_from(cause, message, Some(details))
    }
}

/// [`Code::INTERNAL`] fault for a row-scan failure, query attached.
pub fn row_error(err: PgError, message: impl Into<String>, query: &str) -> Fault {
    let mut details = Details::new();
    details.insert("query".to_owned(), query.into());
    Fault::internal_from(Cause::foreign(err), message, Some(details))
}

/// Classification for errors out of query-then-scan call sites, where the
/// driver folds both failure kinds into one error value.
pub fn query_row_error(err: PgError, message: impl Into<String>, query: &str) -> Fault {
    query_error(err, message, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline::OpaqueError;

    fn driver_stand_in(text: &str) -> Cause {
        Cause::foreign(OpaqueError(text.into()))
    }

    #[test]
    fn constraint_violation_is_bad_input() {
        let fault = classify_sqlstate(driver_stand_in("duplicate key"), Some("23505"));
        assert_eq!(fault.resolve_code(), Code::BAD_INPUT);
        assert_eq!(fault.message, "constraint violation");
    }

    #[test]
    fn data_exception_is_bad_input() {
        let fault = classify_sqlstate(driver_stand_in("value too long"), Some("22001"));
        assert_eq!(fault.resolve_code(), Code::BAD_INPUT);
        assert_eq!(fault.message, "data exception");
    }

    #[test]
    fn syntax_error_is_internal() {
        let fault = classify_sqlstate(driver_stand_in("syntax error at or near"), Some("42601"));
        assert_eq!(fault.resolve_code(), Code::INTERNAL);
        assert_eq!(fault.message, "syntax error");
    }

    #[test]
    fn unrecognized_state_is_internal_without_message() {
        let fault = classify_sqlstate(driver_stand_in("connection failure"), Some("08006"));
        assert_eq!(fault.resolve_code(), Code::INTERNAL);
        assert!(fault.message.is_empty());
    }

    #[test]
    fn missing_state_is_internal() {
        let fault = classify_sqlstate(driver_stand_in("gone"), None);
        assert_eq!(fault.resolve_code(), Code::INTERNAL);
    }

    #[test]
    fn driver_rendering_stays_in_the_chain() {
        let fault = classify_sqlstate(driver_stand_in("duplicate key value"), Some("23505"));
        assert_eq!(fault.to_string(), "constraint violation: duplicate key value");
    }
}
