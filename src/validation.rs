//! Field-level constraint checks
//!
//! Pure functions with no side effects. Checks never stop at the first
//! problem: every failing field is collected so a caller can report all of
//! them from one pass.

use std::collections::HashSet;
use std::fmt;

use crate::constants::validation::*;
use crate::types::{DisplayInfo, WorkspaceAssignment};

/// A single failing field of one record
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_name(name: &str) -> Option<ValidationError> {
    name.trim()
        .is_empty()
        .then(|| ValidationError::new("name", "monitor name cannot be empty"))
}

pub fn validate_resolution(width: u32, height: u32) -> Option<ValidationError> {
    (width == 0 || height == 0).then(|| {
        ValidationError::new(
            "resolution",
            format!("width and height must be greater than 0 (got {width}x{height})"),
        )
    })
}

pub fn validate_refresh_rate(refresh_rate: f64) -> Option<ValidationError> {
    (!(refresh_rate > 0.0 && refresh_rate <= MAX_REFRESH_RATE)).then(|| {
        ValidationError::new(
            "refreshRate",
            format!("refresh rate must be in (0, {MAX_REFRESH_RATE}] Hz (got {refresh_rate})"),
        )
    })
}

pub fn validate_scale(scale: f64) -> Option<ValidationError> {
    (!(scale > 0.0 && scale <= MAX_SCALE)).then(|| {
        ValidationError::new(
            "scale",
            format!("scale must be in (0, {MAX_SCALE}] (got {scale})"),
        )
    })
}

pub fn validate_transform(transform: &crate::types::Transform) -> Option<ValidationError> {
    (!transform.is_known()).then(|| {
        ValidationError::new(
            "transform",
            format!(
                "unknown transform '{transform}' (expected normal, 90, 180, 270, flipped or flipped-90)"
            ),
        )
    })
}

pub fn validate_position(x: i32, y: i32) -> Option<ValidationError> {
    let range = -MAX_COORDINATE..=MAX_COORDINATE;
    (!(range.contains(&x) && range.contains(&y))).then(|| {
        ValidationError::new(
            "position",
            format!("position {x}x{y} is outside ±{MAX_COORDINATE}"),
        )
    })
}

/// Every failing field of one display, in field order
pub fn validate_display(display: &DisplayInfo) -> Vec<ValidationError> {
    [
        validate_name(&display.name),
        validate_resolution(display.width, display.height),
        validate_refresh_rate(display.refresh_rate),
        validate_scale(display.scale),
        validate_transform(&display.transform),
        validate_position(display.x, display.y),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Human-readable summary for one failing record
pub fn describe_failure(display: &DisplayInfo, errors: &[ValidationError]) -> String {
    let label = if display.name.trim().is_empty() {
        "<unnamed>"
    } else {
        display.name.as_str()
    };
    let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("Display {label}: {}", details.join("; "))
}

/// Batch check: one message per failing record, in input order.
/// Duplicate names are reported against the later record.
pub fn validate_displays(displays: &[DisplayInfo]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut messages = Vec::new();

    for display in displays {
        let mut errors = validate_display(display);
        if !display.name.is_empty() && !seen.insert(display.name.as_str()) {
            errors.push(ValidationError::new("name", "duplicate monitor name"));
        }
        if !errors.is_empty() {
            messages.push(describe_failure(display, &errors));
        }
    }

    messages
}

/// Optional preference fields that the grammar carries but the core
/// invariants do not cover; reported by `validate` but not fatal to apply
pub fn validate_preferences(display: &DisplayInfo) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (field, value) in [
        ("sdrBrightness", display.sdr_brightness),
        ("sdrSaturation", display.sdr_saturation),
    ] {
        if !(value > 0.0 && value <= MAX_SDR_MULTIPLIER) {
            errors.push(ValidationError::new(
                field,
                format!("must be in (0, {MAX_SDR_MULTIPLIER}] (got {value})"),
            ));
        }
    }
    if !display.mirror_of.is_empty() && display.mirror_of == display.name {
        errors.push(ValidationError::new("mirrorOf", "a monitor cannot mirror itself"));
    }
    errors
}

pub fn validate_workspace(assignment: &WorkspaceAssignment) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if assignment.workspace_name.trim().is_empty() {
        errors.push(ValidationError::new("workspace", "workspace name cannot be empty"));
    }
    if assignment.monitor_name.trim().is_empty() {
        errors.push(ValidationError::new("monitor", "monitor name cannot be empty"));
    }
    errors
}

/// Batch check for workspace assignments, one message per failing entry
pub fn validate_workspaces(assignments: &[WorkspaceAssignment]) -> Vec<String> {
    assignments
        .iter()
        .enumerate()
        .filter_map(|(index, assignment)| {
            let errors = validate_workspace(assignment);
            (!errors.is_empty()).then(|| {
                let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
                format!("Workspace {}: {}", index + 1, details.join("; "))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transform;

    fn valid_display(name: &str) -> DisplayInfo {
        let mut display = DisplayInfo::new(name);
        display.width = 1920;
        display.height = 1080;
        display.refresh_rate = 60.0;
        display
    }

    #[test]
    fn test_valid_display_has_no_errors() {
        assert!(validate_display(&valid_display("DP-1")).is_empty());
    }

    #[test]
    fn test_each_field_rule() {
        let mut display = valid_display("");
        display.width = 0;
        display.refresh_rate = 361.0;
        display.scale = 5.5;
        display.transform = Transform::Other("sideways".to_string());
        display.x = 10001;

        let fields: Vec<&str> = validate_display(&display).iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["name", "resolution", "refreshRate", "scale", "transform", "position"]
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let mut display = valid_display("DP-1");
        display.refresh_rate = 360.0;
        display.scale = 5.0;
        display.x = -10000;
        display.y = 10000;
        assert!(validate_display(&display).is_empty());

        display.scale = 0.0;
        assert_eq!(validate_display(&display).len(), 1);
    }

    #[test]
    fn test_batch_reports_only_the_failing_record() {
        let mut displays: Vec<DisplayInfo> = ["DP-1", "DP-2", "DP-3", "HDMI-A-1"]
            .iter()
            .map(|name| valid_display(name))
            .collect();
        displays[2].width = 0;

        let messages = validate_displays(&displays);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("DP-3"));
        assert!(messages[0].contains("width"));
    }

    #[test]
    fn test_batch_accumulates_in_order() {
        let mut displays = vec![valid_display("A"), valid_display("B"), valid_display("C")];
        displays[0].scale = -1.0;
        displays[2].refresh_rate = 0.0;

        let messages = validate_displays(&displays);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("Display A"));
        assert!(messages[1].starts_with("Display C"));
    }

    #[test]
    fn test_duplicate_names_reported() {
        let displays = vec![valid_display("DP-1"), valid_display("DP-1")];
        let messages = validate_displays(&displays);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("duplicate"));
    }

    #[test]
    fn test_preferences_and_workspaces() {
        let mut display = valid_display("DP-1");
        display.sdr_brightness = 0.0;
        display.mirror_of = "DP-1".to_string();
        assert_eq!(validate_preferences(&display).len(), 2);

        let assignments = vec![
            WorkspaceAssignment::new("1", "DP-1"),
            WorkspaceAssignment::new("", "DP-1"),
        ];
        let messages = validate_workspaces(&assignments);
        assert_eq!(messages, vec!["Workspace 2: workspace: workspace name cannot be empty"]);
    }
}
