//! Scanner result vocabulary to checklist status mapping.

use crate::models::checklist::ChecklistStatus;

/// Map a raw `rule-result/result` value to a checklist status.
///
/// Case-insensitive and total: anything unrecognised is `NotReviewed`.
pub fn map_status(raw: &str) -> ChecklistStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pass" | "fixed" => ChecklistStatus::NotAFinding,
        "fail" | "error" => ChecklistStatus::Open,
        "notapplicable" => ChecklistStatus::NotApplicable,
        "notchecked" | "notselected" | "unknown" | "informational" => ChecklistStatus::NotReviewed,
        _ => ChecklistStatus::NotReviewed,
    }
}
