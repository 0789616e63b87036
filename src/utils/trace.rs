/// Trace token handling
/// The front end passes free text as the trace; an e-mail address inside it
/// is the student's identity and becomes the token.
use crate::config::types::NO_TRACE;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Hex characters of the token hash used as a directory name
const TOKEN_HASH_LEN: usize = 16;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").ok())
        .as_ref()
}

/// First e-mail address found in `text`
pub fn extract_email(text: &str) -> Option<&str> {
    email_regex()?.find(text).map(|m| m.as_str())
}

/// Trace token for a request: the e-mail inside the trace if any, the trimmed
/// trace otherwise, `NoTrace` when absent or blank.
pub fn normalize_trace(trace: Option<&str>) -> String {
    let trace = match trace.map(str::trim) {
        None | Some("") => return NO_TRACE.to_string(),
        Some(t) => t,
    };
    extract_email(trace).unwrap_or(trace).to_string()
}

/// Stable, path-safe hash of a trace token
pub fn token_hash(trace_token: &str) -> String {
    let digest = Sha256::digest(trace_token.as_bytes());
    let mut hashed = hex::encode(digest);
    hashed.truncate(TOKEN_HASH_LEN);
    hashed
}
