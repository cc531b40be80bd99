//! Row-level parsing of the specification file
//!
//! A row is split into fields for its metadata, while the expected text is
//! cut out of the raw row between two literal markers. The two passes are
//! independent: a comma inside the expected text never shifts the fields.

use crate::corpus::language::detect_language;
use crate::corpus::{CorpusEntry, Identifiers};
use crate::errors::RowError;

/// Literal that precedes the confirmed on-screen text
pub const TEXT_START_MARKER: &str = "确认文言表示,";
/// Separator plus the three confirmation flags that close the confirmed text
pub const TEXT_END_MARKER: &str = ",Y,Y,Y";
/// Rows with fewer fields are malformed
pub const MIN_FIELDS: usize = 8;

const SCREEN_ID_PREFIXES: &[&str] = &["ScreenID：", "ScreenID:"];
const PART_ID_PREFIXES: &[&str] = &["PartID:"];
const STRING_ID_PREFIXES: &[&str] = &["String ID:"];

/// Index of the field holding ScreenID / PartID / String ID
const METADATA_FIELD: usize = 4;

/// Split a row on commas. A double quote toggles the inside-quotes state and
/// is dropped; commas inside quotes belong to the current field.
pub fn split_fields(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in row.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

/// Extract the text between [`TEXT_START_MARKER`] and [`TEXT_END_MARKER`].
///
/// The end marker includes its leading separator, so text that itself ends
/// in `Y` is kept whole. Surrounding whitespace and enclosing quotes are
/// removed. Returns `None` when a marker is missing or nothing is left.
pub fn extract_target_text(row: &str) -> Option<String> {
    let start = row.find(TEXT_START_MARKER)? + TEXT_START_MARKER.len();
    let end = start + row[start..].find(TEXT_END_MARKER)?;

    let text = row[start..end].trim();
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Value following the first matching prefix, up to the end of its line
fn scan_prefixed(field: &str, prefixes: &[&str]) -> Option<String> {
    prefixes.iter().find_map(|prefix| {
        let start = field.find(prefix)? + prefix.len();
        let rest = &field[start..];
        let value = rest.split('\n').next().unwrap_or(rest).trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Pull the screen, part and string identifiers out of the metadata field
pub fn extract_identifiers(metadata: &str) -> (Option<String>, Option<String>, Option<String>) {
    (
        scan_prefixed(metadata, SCREEN_ID_PREFIXES),
        scan_prefixed(metadata, PART_ID_PREFIXES),
        scan_prefixed(metadata, STRING_ID_PREFIXES),
    )
}

/// Parse one logical row into a corpus entry
pub fn parse_row(line: usize, row: &str) -> Result<CorpusEntry, RowError> {
    let fields = split_fields(row);
    if fields.len() < MIN_FIELDS {
        return Err(RowError::TooFewFields {
            line,
            expected: MIN_FIELDS,
            found: fields.len(),
        });
    }

    let expected_text = extract_target_text(row).ok_or(RowError::MissingTargetText { line })?;

    let (screen_id, part_id, string_id) = fields
        .get(METADATA_FIELD)
        .map(|field| extract_identifiers(field))
        .unwrap_or_default();
    let string_id = string_id.ok_or(RowError::MissingStringId { line })?;

    let language = detect_language(&expected_text);

    Ok(CorpusEntry {
        source_line: line,
        sequence_id: fields[0].trim().to_string(),
        module_name: fields[2].trim().to_string(),
        description: fields[3].trim().to_string(),
        expected_text,
        identifiers: Identifiers {
            string_id,
            screen_id,
            part_id,
        },
        language,
        duplicate_lines: Vec::new(),
    })
}
