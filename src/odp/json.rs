//! JSON helpers for ODP GraphQL responses.

use anyhow::Result;
use serde_json::Value;

/// Walk a dotted key path (`"a.b.c"`) through nested objects.
///
/// Returns `None` as soon as a segment is missing or the current value is not
/// an object. An empty path yields the root value.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        _ if path.is_empty() => Some(value),
        Some((head, rest)) => extract_path(value.as_object()?.get(head)?, rest),
        None => value.as_object()?.get(path),
    }
}

/// Parse a response body and, on failure, include a snippet of the line where
/// the error occurred along with the serde path and type mismatch.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner_err = err.inner();
            let (line, column) = (inner_err.line(), inner_err.column());
            let path = err.path().to_string();

            let msg = inner_err.to_string();
            let loc = format!(" at line {line} column {column}");
            let msg_without_loc = msg.strip_suffix(&loc).unwrap_or(&msg);

            let snippet = build_error_snippet(body, line, column, 20);

            let mut final_err = String::new();
            if !path.is_empty() && path != "." {
                final_err.push_str(&format!("at path '{path}': "));
            }
            final_err.push_str(&format!(
                "{msg_without_loc} (line {line} col {column})\n{snippet}"
            ));

            Err(anyhow::anyhow!(final_err))
        }
    }
}

fn build_error_snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target_line = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target_line.is_empty() {
        return "(empty line)".to_string();
    }

    // serde columns are 1-based and may point one past the end on EOF errors
    let error_idx = column.saturating_sub(1).min(target_line.len());

    let half_len = context_len / 2;
    let mut start = error_idx.saturating_sub(half_len);
    let mut end = (error_idx + half_len).min(target_line.len());
    while !target_line.is_char_boundary(start) {
        start -= 1;
    }
    while !target_line.is_char_boundary(end) {
        end += 1;
    }

    let slice = &target_line[start..end];
    let indicator = " ".repeat(error_idx - start) + "^";

    format!("...{slice}...\n   {indicator}")
}
