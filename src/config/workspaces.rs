//! Workspace assignment DSL: `workspace=<name>,monitor:<monitor>`

use tracing::debug;

use crate::constants::dsl::{MIN_WORKSPACE_FIELDS, WORKSPACE_MONITOR_PREFIX, WORKSPACE_PREFIX};
use crate::types::WorkspaceAssignment;

pub fn parse_workspace_line(line: &str) -> Option<WorkspaceAssignment> {
    let body = line.trim().strip_prefix(WORKSPACE_PREFIX)?;
    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() < MIN_WORKSPACE_FIELDS {
        debug!(line = %line.trim(), "Skipping workspace line with too few fields");
        return None;
    }

    // Other workspace rules (gapsout:, default:true, ...) are not assignments
    let monitor = parts[1..]
        .iter()
        .find_map(|part| part.trim().strip_prefix(WORKSPACE_MONITOR_PREFIX))?;

    Some(WorkspaceAssignment::new(parts[0].trim(), monitor.trim()))
}

pub fn parse_workspaces(content: &str) -> Vec<WorkspaceAssignment> {
    content.lines().filter_map(parse_workspace_line).collect()
}

pub fn generate_workspaces(assignments: &[WorkspaceAssignment]) -> String {
    assignments
        .iter()
        .map(|a| format!("{WORKSPACE_PREFIX}{},{WORKSPACE_MONITOR_PREFIX}{}\n", a.workspace_name, a.monitor_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_generate() {
        let content = "workspace=1,monitor:DP-1\nworkspace=2\nmonitor=DP-1,1920x1080@60,0x0,1\nworkspace=name:web,monitor:HDMI-A-1\n";
        let assignments = parse_workspaces(content);
        assert_eq!(
            assignments,
            vec![
                WorkspaceAssignment::new("1", "DP-1"),
                WorkspaceAssignment::new("name:web", "HDMI-A-1"),
            ]
        );

        assert_eq!(
            generate_workspaces(&assignments),
            "workspace=1,monitor:DP-1\nworkspace=name:web,monitor:HDMI-A-1\n"
        );
    }

    #[test]
    fn test_rules_without_monitor_are_skipped() {
        assert_eq!(parse_workspace_line("workspace=3,gapsout:10"), None);
        assert_eq!(
            parse_workspace_line("workspace=3,gapsout:10,monitor:DP-2"),
            Some(WorkspaceAssignment::new("3", "DP-2"))
        );
    }
}
