use serde_json::Value;
use tracing::{debug, warn};

use super::types::{FailureKind, HarmonizationFailure, HarmonizationRecord, ResponseLogEntry};
use super::TARGET_ANTIGEN;

/// Pull a JSON value out of free-form model output.
///
/// Starts at the first `{` or `[`. If the remainder is not valid JSON, the
/// parse is retried on the prefix ending where the first attempt failed, which
/// recovers a complete object followed by trailing prose or a closing code
/// fence. Returns `Ok(None)` when there is no opening character at all, and
/// the decode error when the retry fails too.
pub fn extract_structured(text: &str) -> Result<Option<Value>, serde_json::Error> {
    let start = match text.find(|c: char| c == '{' || c == '[') {
        Some(start) => start,
        None => return Ok(None),
    };
    let candidate = &text[start..];

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(Some(value)),
        Err(first_error) => {
            let Some(offset) = error_offset(candidate, &first_error) else {
                return Err(first_error);
            };
            debug!(
                target: TARGET_ANTIGEN,
                "Full parse failed ({}), retrying on first {} bytes", first_error, offset
            );
            serde_json::from_str::<Value>(&candidate[..offset]).map(Some)
        }
    }
}

/// Byte offset of a decode error within `text`. serde_json reports a 1-based
/// line and a byte column pointing just past the offending character.
fn error_offset(text: &str, error: &serde_json::Error) -> Option<usize> {
    if error.line() == 0 {
        return None;
    }

    let line_start = if error.line() == 1 {
        0
    } else {
        text.match_indices('\n')
            .nth(error.line() - 2)
            .map(|(index, _)| index + 1)?
    };

    let mut offset = (line_start + error.column().saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    Some(offset)
}

/// Turn one raw generation response into a log entry for `cleaned`.
pub fn interpret_response(cleaned: &str, response: &str) -> ResponseLogEntry {
    let structured = match extract_structured(response) {
        Ok(Some(structured)) => structured,
        Ok(None) => {
            warn!(target: TARGET_ANTIGEN, "No structured data in response for '{}'", cleaned);
            return ResponseLogEntry::Failed(HarmonizationFailure::new(
                cleaned,
                response,
                FailureKind::NoStructuredData,
            ));
        }
        Err(e) => {
            warn!(target: TARGET_ANTIGEN, "Unparseable response for '{}': {}", cleaned, e);
            return ResponseLogEntry::Failed(
                HarmonizationFailure::new(cleaned, response, FailureKind::Unparseable)
                    .with_detail(e.to_string()),
            );
        }
    };

    let harmonized = structured
        .get("harmonized_gene_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let Some(harmonized) = harmonized else {
        warn!(
            target: TARGET_ANTIGEN,
            "Response for '{}' has no harmonized_gene_name: {}", cleaned, structured
        );
        return ResponseLogEntry::Failed(
            HarmonizationFailure::new(cleaned, response, FailureKind::MissingGeneName)
                .with_structured(structured),
        );
    };

    let common_name = structured
        .get("common_name")
        .and_then(Value::as_str)
        .map(str::to_string);

    let echoed_string = structured
        .get("original_string")
        .and_then(Value::as_str)
        .filter(|echoed| *echoed != cleaned)
        .map(str::to_string);

    if let Some(echoed) = &echoed_string {
        debug!(
            target: TARGET_ANTIGEN,
            "Model echoed '{}' for input '{}'", echoed, cleaned
        );
    }

    ResponseLogEntry::Harmonized(HarmonizationRecord {
        original_string: cleaned.to_string(),
        harmonized_gene_name: harmonized.to_string(),
        common_name,
        echoed_string,
    })
}
