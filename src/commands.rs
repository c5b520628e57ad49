//! Compositor apply commands
//!
//! Bulk apply is best-effort: a record that fails validation, or whose
//! dispatch fails, is reported and skipped while the rest still go out.

use tracing::{info, warn};

use crate::constants::hyprctl;
use crate::hyprctl::{HyprctlError, HyprctlExecutor};
use crate::types::DisplayInfo;
use crate::validation::{describe_failure, validate_display};

/// `monitor,<name>,<W>x<H>@<rate>,<x>x<y>,<scale>[,<transform>][,mirror,<target>]`
pub fn build_monitor_command(display: &DisplayInfo) -> String {
    let mut command = format!(
        "monitor,{},{}@{:.2},{},{:.2}",
        display.name,
        display.resolution(),
        display.refresh_rate,
        display.position(),
        display.scale
    );
    if !display.transform.is_normal() && !display.transform.as_str().is_empty() {
        command.push(',');
        command.push_str(display.transform.as_str());
    }
    if !display.mirror_of.is_empty() {
        command.push_str(",mirror,");
        command.push_str(&display.mirror_of);
    }
    command
}

pub fn enable_command(name: &str, enabled: bool) -> String {
    format!("monitor,{name},{}", if enabled { "enable" } else { "disable" })
}

pub fn mirror_command(name: &str, target: &str) -> String {
    format!("monitor,{name},mirror,{target}")
}

pub fn unmirror_command(name: &str) -> String {
    format!("monitor,{name},unmirror")
}

pub fn workspace_command(workspace: &str, monitor: &str) -> String {
    format!("workspace,{workspace},monitor,{monitor}")
}

/// One display that did not make it into, or through, the batch
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    pub display: String,
    pub message: String,
}

/// Commands ready to issue, in canonical order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub commands: Vec<(String, String)>,
    pub rejected: Vec<ApplyFailure>,
}

/// Validate and build a command for every enabled display
pub fn build_batch(displays: &[DisplayInfo]) -> Batch {
    let mut batch = Batch::default();
    for display in displays.iter().filter(|d| d.enabled) {
        let errors = validate_display(display);
        if errors.is_empty() {
            batch
                .commands
                .push((display.name.clone(), build_monitor_command(display)));
        } else {
            let message = describe_failure(display, &errors);
            let name = &display.name;
            warn!(display = %name, %message, "Skipping invalid display");
            batch.rejected.push(ApplyFailure {
                display: display.name.clone(),
                message,
            });
        }
    }
    batch
}

/// Outcome of a bulk apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub issued: Vec<String>,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `hyprctl dispatch keyword <command>`
pub fn dispatch_keyword(executor: &dyn HyprctlExecutor, command: &str) -> Result<(), HyprctlError> {
    executor.dispatch(&[hyprctl::DISPATCH, hyprctl::KEYWORD, command])
}

/// Issue every command in order. A failed dispatch does not stop the
/// ones after it; the first process error is handed back so the caller
/// can update connectivity.
pub fn apply_batch(executor: &dyn HyprctlExecutor, batch: Batch) -> (ApplyReport, Option<HyprctlError>) {
    let mut report = ApplyReport {
        issued: Vec::new(),
        failures: batch.rejected,
    };
    let mut first_error = None;

    for (name, command) in batch.commands {
        match dispatch_keyword(executor, &command) {
            Ok(()) => report.issued.push(name),
            Err(e) => {
                warn!(display = %name, error = %e, "Apply command failed");
                report.failures.push(ApplyFailure {
                    display: name,
                    message: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    info!(
        issued = report.issued.len(),
        failed = report.failures.len(),
        "Applied display configuration"
    );
    (report, first_error)
}
