//! Header utilities shared by request cloning and response relay.
//!
//! # Design Decisions
//! - Copying is additive: values are appended, existing entries are never
//!   replaced or removed
//! - Keep-alive is forced by stripping `close` tokens from `Connection`

use http::header::{HeaderMap, HeaderValue, CONNECTION};

/// Append every value of `src` onto `dst`, preserving order and duplicates.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.append(name.clone(), value.clone());
    }
}

/// Remove any `close` token from the `Connection` header so the upstream
/// connection stays persistent. Other tokens are kept in order; values that
/// are not visible ASCII are kept unchanged.
pub fn force_keep_alive(headers: &mut HeaderMap) {
    if !headers.contains_key(CONNECTION) {
        return;
    }

    let kept: Vec<HeaderValue> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| {
            let Ok(raw) = value.to_str() else {
                return Some(value.clone());
            };
            let tokens: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("close"))
                .collect();
            if tokens.is_empty() {
                None
            } else {
                HeaderValue::from_str(&tokens.join(", ")).ok()
            }
        })
        .collect();

    headers.remove(CONNECTION);
    for value in kept {
        headers.append(CONNECTION, value);
    }
}

/// Render headers one per line for diagnostic dumps.
pub(crate) fn dump_headers(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers.iter() {
        out.push_str(name.as_str());
        out.push_str(": ");
        out.push_str(&String::from_utf8_lossy(value.as_bytes()));
        out.push('\n');
    }
    out
}
