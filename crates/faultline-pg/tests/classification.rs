// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end shape of a classified query failure.
//!
//! Driver error values cannot be fabricated outside the driver, so these
//! tests exercise the classification seam the way `query_error` composes
//! it: classified level below, neutral caller-context level with the query
//! detail on top.

use faultline::{Cause, Code, Details, Fault, OpaqueError};
use faultline_pg::classify_sqlstate;

fn query_fault(sqlstate: &str, driver_text: &str, message: &str, query: &str) -> Fault {
    let mut details = Details::new();
    details.insert("query".to_owned(), query.into());
    details.insert("sqlstate".to_owned(), sqlstate.into());
    let classified = classify_sqlstate(
        Cause::foreign(OpaqueError(driver_text.into())),
        Some(sqlstate),
    );
    Fault::wrap(classified, Code::NEUTRAL, message, Some(details))
}

#[test]
fn constraint_violation_classifies_and_keeps_the_query() {
    let fault = query_fault(
        "23505",
        "duplicate key value violates unique constraint \"users_pkey\"",
        "insert user",
        "INSERT INTO users (id) VALUES ($1)",
    );

    assert_eq!(fault.resolve_code(), Code::BAD_INPUT);
    assert_eq!(
        fault.to_string(),
        "insert user: constraint violation: duplicate key value violates unique constraint \"users_pkey\""
    );

    let flat = fault.flatten();
    assert_eq!(
        flat["0/query"],
        serde_json::json!("INSERT INTO users (id) VALUES ($1)")
    );
    assert_eq!(flat["0/sqlstate"], serde_json::json!("23505"));
}

#[test]
fn syntax_error_stays_internal_end_to_end() {
    let fault = query_fault(
        "42703",
        "column \"namme\" does not exist",
        "load profile",
        "SELECT namme FROM users",
    );

    assert_eq!(fault.resolve_code(), Code::INTERNAL);
    let flat = fault.flatten();
    assert_eq!(flat["0/query"], serde_json::json!("SELECT namme FROM users"));
}

#[test]
fn classified_chain_serializes_for_transport() {
    let fault = query_fault("22003", "numeric value out of range", "update balance", "UPDATE ...");
    let json = faultline::codec::to_json(&fault).unwrap();
    let back = faultline::codec::from_json(&json).unwrap();
    assert_eq!(back.resolve_code(), Code::BAD_INPUT);
    assert_eq!(back.to_string(), fault.to_string());
}
