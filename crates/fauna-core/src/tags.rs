//! Tag naming rules for detected animals.
//!
//! Detection labels become hierarchical tag values under a single root,
//! `Animals/<Label>`. Every prefix of a hierarchical value is itself a tag
//! (the parent), so `Animals/Dog` implies `Animals`.

use crate::defaults::{ANIMAL_TAG_ROOT, TAG_MAX_LEN, TAG_PATH_SEPARATOR};
use crate::models::DetectionResult;

/// Tag value for one detection label. The label is used verbatim.
pub fn animal_tag_name(label: &str) -> String {
    format!("{}{}{}", ANIMAL_TAG_ROOT, TAG_PATH_SEPARATOR, label)
}

/// Tag values for every detection, in detection order.
///
/// Repeated labels are kept; materialization deduplicates.
pub fn animal_tag_names(result: &DetectionResult) -> Vec<String> {
    result
        .animals
        .iter()
        .map(|d| animal_tag_name(&d.label))
        .collect()
}

/// Parent value of a hierarchical tag, `None` for a root tag.
pub fn parent_tag_value(value: &str) -> Option<&str> {
    value.rsplit_once(TAG_PATH_SEPARATOR).map(|(parent, _)| parent)
}

/// Every ancestor of `value` followed by `value` itself, root first.
///
/// `"Animals/Dog"` yields `["Animals", "Animals/Dog"]`.
pub fn tag_lineage(value: &str) -> Vec<&str> {
    value
        .char_indices()
        .filter(|(_, c)| *c == TAG_PATH_SEPARATOR)
        .map(|(i, _)| &value[..i])
        .chain(std::iter::once(value))
        .collect()
}

/// Validate a tag value.
///
/// Rules:
/// - Length between 1-100 characters
/// - No leading, trailing or doubled separators (every segment non-empty)
/// - No control characters
pub fn validate_tag_value(value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        return Err("Tag value cannot be empty".to_string());
    }
    if value.chars().count() > TAG_MAX_LEN {
        return Err(format!(
            "Tag value must be {} characters or less",
            TAG_MAX_LEN
        ));
    }
    if value.split(TAG_PATH_SEPARATOR).any(|s| s.trim().is_empty()) {
        return Err(format!("Tag value has an empty path segment: '{}'", value));
    }
    if value.chars().any(char::is_control) {
        return Err("Tag value contains control characters".to_string());
    }
    Ok(())
}
