//! # case-core
//!
//! Entity model and lifecycle rules for Casebook troubleshooting cases.
//!
//! This crate has no I/O. It provides:
//! - The `Case` aggregate and its child entities
//! - Status enums, including the case lifecycle state machine
//! - Phase documents (schema-flexible per-phase state)
//! - Prefixed identifier generation
//! - The shared `CaseError` taxonomy
//! - The legacy severity/category adapter

pub mod audit_detail;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod legacy;
pub mod phases;
pub mod timestamps;
pub mod validation;
