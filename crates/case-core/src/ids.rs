//! Identifier prefixes and generation.
//!
//! Identifiers are generated on the caller side (never by the store) as a
//! short prefix followed by lowercase hex drawn from OS entropy, e.g.
//! `case_3fa85f6457b2`. A duplicate on insert indicates a bug, not a race,
//! and surfaces as `CaseError::Conflict`.

use std::fmt::Write as _;

use crate::errors::CaseError;

pub const PREFIX_CASE: &str = "case";
pub const PREFIX_EVIDENCE: &str = "ev";
pub const PREFIX_HYPOTHESIS: &str = "hyp";
pub const PREFIX_SOLUTION: &str = "sol";
pub const PREFIX_FILE: &str = "file";
pub const PREFIX_MESSAGE: &str = "msg";
pub const PREFIX_TOOL_CALL: &str = "call";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_CASE,
    PREFIX_EVIDENCE,
    PREFIX_HYPOTHESIS,
    PREFIX_SOLUTION,
    PREFIX_FILE,
    PREFIX_MESSAGE,
    PREFIX_TOOL_CALL,
];

/// Number of random bytes per prefix. Messages and tool calls are
/// high-volume appends and get a wider random part.
const fn random_bytes_for(prefix: &str) -> usize {
    match prefix.as_bytes() {
        b"msg" | b"call" => 8,
        _ => 6,
    }
}

/// Generate a prefixed identifier, e.g. `"hyp_a3f8b2c1d4e5"`.
///
/// # Errors
///
/// Returns `CaseError::Other` if the OS entropy source is unavailable.
pub fn generate_id(prefix: &str) -> Result<String, CaseError> {
    let mut buf = [0u8; 8];
    let len = random_bytes_for(prefix);
    getrandom::fill(&mut buf[..len])
        .map_err(|e| CaseError::Other(anyhow::anyhow!("entropy source unavailable: {e}")))?;

    let mut id = String::with_capacity(prefix.len() + 1 + len * 2);
    id.push_str(prefix);
    id.push('_');
    for byte in &buf[..len] {
        // Writing into a String cannot fail.
        let _ = write!(id, "{byte:02x}");
    }
    Ok(id)
}
