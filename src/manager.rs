//! Display manager
//!
//! Owns the store, the frozen canvas, the workspace assignments and the
//! executor. Every operation the CLI offers goes through here.

use anyhow::{Context, Result, bail};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::commands::{
    self, ApplyReport, apply_batch, build_batch, build_monitor_command, dispatch_keyword,
};
use crate::config::backup::{BackupBundle, BackupEntry, BackupStore};
use crate::config::monitors::{generate_monitors, parse_monitors};
use crate::config::settings::Settings;
use crate::config::workspaces::{generate_workspaces, parse_workspaces};
use crate::constants::hyprctl;
use crate::hyprctl::{
    Connectivity, HyprctlError, HyprctlExecutor, ReconnectPolicy, probe, wait_until_reachable,
};
use crate::layout::{Canvas, CanvasRect, CanvasTransform, normalize_to_origin};
use crate::snapshot;
use crate::store::{DisplayStore, OperationGuards, OperationKind};
use crate::types::WorkspaceAssignment;
use crate::validation::{describe_failure, validate_displays, validate_preferences, validate_workspaces};

pub struct DisplayManager<E: HyprctlExecutor> {
    executor: E,
    settings: Settings,
    store: DisplayStore,
    workspaces: Vec<WorkspaceAssignment>,
    canvas: Canvas,
    guards: OperationGuards,
    backups: BackupStore,
    connectivity: Connectivity,
}

impl<E: HyprctlExecutor> DisplayManager<E> {
    pub fn new(executor: E, settings: Settings, backup_dir: PathBuf) -> Self {
        let canvas = Canvas::new(settings.canvas_width, settings.canvas_height);
        Self {
            executor,
            settings,
            store: DisplayStore::new(),
            workspaces: Vec::new(),
            canvas,
            guards: OperationGuards::new(),
            backups: BackupStore::new(backup_dir),
            connectivity: Connectivity::Disconnected,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &DisplayStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DisplayStore {
        &mut self.store
    }

    pub fn workspaces(&self) -> &[WorkspaceAssignment] {
        &self.workspaces
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    #[cfg(test)]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn track<T>(&mut self, result: &Result<T, HyprctlError>) {
        match result {
            Ok(_) => self.connectivity = Connectivity::Connected,
            Err(e) => {
                if self.connectivity == Connectivity::Connected {
                    warn!(error = %e, "Lost connection to compositor");
                }
                self.connectivity = Connectivity::Disconnected;
            }
        }
    }

    pub fn probe(&mut self) -> Connectivity {
        self.connectivity = probe(&self.executor);
        self.connectivity
    }

    pub fn wait_until_reachable(&mut self, policy: ReconnectPolicy) -> Connectivity {
        self.connectivity = wait_until_reachable(&self.executor, policy);
        self.connectivity
    }

    /// Replace the canonical set with a fresh snapshot. JSON first, the
    /// text listing as fallback; on failure the current set is kept.
    pub fn refresh(&mut self) -> Result<usize> {
        let _token = self.guards.begin(OperationKind::Refresh)?;

        let json = self
            .executor
            .query(&[hyprctl::JSON_FLAG, hyprctl::MONITORS, hyprctl::ALL]);
        let displays = match json {
            Ok(output) => {
                self.connectivity = Connectivity::Connected;
                match snapshot::parse_json(&output) {
                    Ok(displays) => displays,
                    Err(e) => {
                        warn!(error = %e, "JSON snapshot unusable, trying text listing");
                        let text = self.executor.query(&[hyprctl::MONITORS, hyprctl::ALL]);
                        let output = text.context("Failed to query monitors as text")?;
                        snapshot::parse_text(&output).context("Failed to parse monitor snapshot")?
                    }
                }
            }
            Err(e) => {
                self.connectivity = Connectivity::Disconnected;
                error!(error = %e, "Failed to query monitors");
                return Err(e).context("Failed to query monitors");
            }
        };

        let count = displays.len();
        self.store.replace_all(displays);
        if let Err(e) = self.canvas.rebuild(self.store.displays()) {
            warn!(error = %e, "Could not lay out displays on the canvas");
        }
        info!(count, "Refreshed displays");
        Ok(count)
    }

    /// Merge the persisted monitors file into the current set and load the
    /// workspace assignments. Missing files count as empty.
    pub fn load_persisted(&mut self) -> Result<usize> {
        let _token = self.guards.begin(OperationKind::Load)?;

        let merged = match read_optional(&self.settings.monitors_path)? {
            Some(content) => {
                let rules = parse_monitors(&content);
                debug!(rules = rules.len(), "Parsed monitors file");
                self.store.merge_persisted(&rules)
            }
            None => 0,
        };

        self.workspaces = match read_optional(&self.settings.workspaces_path) {
            Ok(content) => content.map(|c| parse_workspaces(&c)).unwrap_or_default(),
            Err(e) => {
                self.workspaces.clear();
                return Err(e);
            }
        };
        for assignment in &self.workspaces {
            if self.store.get(&assignment.monitor_name).is_none() {
                debug!(workspace = %assignment.workspace_name, monitor = %assignment.monitor_name, "Workspace assigned to absent monitor");
            }
        }

        Ok(merged)
    }

    /// Normalize, validate, back up and write both DSL files
    pub fn save(&mut self) -> Result<PathBuf> {
        let _token = self.guards.begin(OperationKind::Save)?;

        if self.store.is_empty() {
            bail!("No displays to save");
        }

        let mut displays = self.store.displays().to_vec();
        normalize_to_origin(&mut displays);

        let mut problems = validate_displays(&displays);
        problems.extend(validate_workspaces(&self.workspaces));
        if !problems.is_empty() {
            if self.settings.strict_validation {
                bail!("Refusing to save invalid configuration:\n{}", problems.join("\n"));
            }
            for problem in &problems {
                warn!(problem = %problem, "Saving despite validation problem");
            }
        }

        self.store.replace_all(displays);

        if self.settings.auto_backup {
            self.backup_now()?;
        }

        let monitors_path = self.settings.monitors_path.clone();
        write_atomic(&monitors_path, &generate_monitors(self.store.displays()))?;
        write_atomic(&self.settings.workspaces_path, &generate_workspaces(&self.workspaces))?;

        info!(
            path = %monitors_path.display(),
            displays = self.store.len(),
            workspaces = self.workspaces.len(),
            "Saved display configuration"
        );
        Ok(monitors_path)
    }

    /// Issue a monitor command for every enabled display, best-effort
    pub fn apply(&mut self) -> ApplyReport {
        let batch = build_batch(self.store.displays());
        let (report, error) = apply_batch(&self.executor, batch);
        match error {
            Some(e) => self.track::<()>(&Err(e)),
            None if !report.issued.is_empty() => self.connectivity = Connectivity::Connected,
            None => {}
        }
        report
    }

    fn dispatch(&mut self, command: &str) -> Result<()> {
        let result = dispatch_keyword(&self.executor, command);
        self.track(&result);
        result.with_context(|| format!("Failed to dispatch '{}'", command))
    }

    /// Issue the full monitor command for one display
    pub fn apply_display(&mut self, name: &str) -> Result<()> {
        let display = self
            .store
            .get(name)
            .with_context(|| format!("No display named '{}'", name))?;
        let command = build_monitor_command(display);
        self.dispatch(&command)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        self.store.set_enabled(name, enabled)?;
        self.dispatch(&commands::enable_command(name, enabled))
    }

    /// Mirror `name` onto `target`; an empty target unmirrors
    pub fn mirror(&mut self, name: &str, target: &str) -> Result<()> {
        self.store.set_mirror(name, target)?;
        if target.is_empty() {
            self.dispatch(&commands::unmirror_command(name))
        } else {
            self.dispatch(&commands::mirror_command(name, target))
        }
    }

    /// Assign `workspace` to `monitor`, replacing any earlier assignment
    /// of the same workspace. `apply` also moves it live.
    pub fn assign_workspace(&mut self, workspace: &str, monitor: &str, apply: bool) -> Result<()> {
        let assignment = WorkspaceAssignment::new(workspace.trim(), monitor.trim());
        let problems = validate_workspaces(std::slice::from_ref(&assignment));
        if let Some(problem) = problems.first() {
            bail!("{}", problem);
        }
        if !self.store.is_empty() && self.store.get(&assignment.monitor_name).is_none() {
            bail!("No display named '{}'", assignment.monitor_name);
        }

        match self
            .workspaces
            .iter_mut()
            .find(|a| a.workspace_name == assignment.workspace_name)
        {
            Some(existing) => existing.monitor_name = assignment.monitor_name.clone(),
            None => self.workspaces.push(assignment.clone()),
        }
        info!(workspace = %assignment.workspace_name, monitor = %assignment.monitor_name, "Assigned workspace");

        if apply {
            self.dispatch(&commands::workspace_command(
                &assignment.workspace_name,
                &assignment.monitor_name,
            ))?;
        }
        Ok(())
    }

    pub fn reload(&mut self) -> Result<()> {
        let result = self.executor.dispatch(&[hyprctl::RELOAD]);
        self.track(&result);
        result.context("Failed to reload compositor configuration")
    }

    /// The frozen transform, built on first use
    fn transform(&mut self) -> Result<CanvasTransform> {
        if let Some(transform) = self.canvas.transform() {
            return Ok(*transform);
        }
        Ok(self.canvas.rebuild(self.store.displays())?)
    }

    pub fn resize_canvas(&mut self, width: f64, height: f64) -> Result<()> {
        self.canvas.resize(width, height, self.store.displays())?;
        Ok(())
    }

    /// Canvas rectangle of every display, in canonical order
    pub fn layout(&mut self) -> Result<Vec<(String, CanvasRect)>> {
        let transform = self.transform()?;
        Ok(self
            .store
            .displays()
            .iter()
            .map(|d| (d.name.clone(), transform.rect(d)))
            .collect())
    }

    /// Drop `name` with its top-left corner at canvas point (vx, vy)
    pub fn drag(&mut self, name: &str, vx: f64, vy: f64) -> Result<(i32, i32)> {
        let transform = self.transform()?;
        let (x, y) = transform.to_logical(vx, vy);
        let threshold = self.settings.snap_threshold;
        Ok(self.store.move_to(name, x, y, threshold)?)
    }

    pub fn move_display(&mut self, name: &str, x: i32, y: i32, snap: Option<u32>) -> Result<(i32, i32)> {
        let threshold = snap.unwrap_or(self.settings.snap_threshold);
        Ok(self.store.move_to(name, x, y, threshold)?)
    }

    fn backup_now(&self) -> Result<PathBuf> {
        let now = Local::now();
        let bundle = BackupBundle::new(self.store.displays(), &self.workspaces, &self.settings, now);
        let path = self.backups.create(&bundle, &now)?;
        self.backups.prune(self.settings.max_backups)?;
        Ok(path)
    }

    pub fn create_backup(&mut self) -> Result<PathBuf> {
        self.backup_now()
    }

    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        self.backups.list()
    }

    /// Replace display and workspace state with a bundle's contents
    pub fn restore_backup(&mut self, file_name: &str) -> Result<BackupBundle> {
        let bundle = self.backups.restore(file_name)?;
        self.store.replace_all(bundle.display_config.clone());
        self.workspaces = bundle.workspace_config.clone();
        if let Err(e) = self.canvas.rebuild(self.store.displays()) {
            warn!(error = %e, "Could not lay out restored displays");
        }
        Ok(bundle)
    }

    pub fn delete_backup(&self, file_name: &str) -> Result<()> {
        self.backups.delete(file_name)
    }
}

/// Every problem in a monitors file, one message per failing record
pub fn validate_file(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read monitors file {:?}", path))?;
    let displays: Vec<_> = parse_monitors(&content).iter().map(|r| r.to_display()).collect();

    let mut problems = validate_displays(&displays);
    for display in &displays {
        let errors = validate_preferences(display);
        if !errors.is_empty() {
            problems.push(describe_failure(display, &errors));
        }
    }
    Ok(problems)
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        info!(path = %path.display(), "File not found, treating as empty");
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("Failed to read {:?}", path))
}

/// Write through a sibling temp file so a failure never leaves a half file
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let file_name = path
        .file_name()
        .with_context(|| format!("{:?} has no file name", path))?
        .to_string_lossy();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp, content).with_context(|| format!("Failed to write {:?}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
    Ok(())
}
