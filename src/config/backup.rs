//! Backup bundles
//!
//! A bundle captures display records, workspace assignments and the
//! application settings at one point in time. One JSON file per bundle,
//! named `hyprdisplays_backup_YYYYMMDD_HHMMSS.json`.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::constants::backup::*;
use crate::types::{DisplayInfo, WorkspaceAssignment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupBundle {
    pub display_config: Vec<DisplayInfo>,
    pub workspace_config: Vec<WorkspaceAssignment>,
    pub application_config: Settings,
    pub timestamp: String,
    pub version: String,
}

impl BackupBundle {
    pub fn new(
        displays: &[DisplayInfo],
        workspaces: &[WorkspaceAssignment],
        settings: &Settings,
        taken_at: DateTime<Local>,
    ) -> Self {
        Self {
            display_config: displays.to_vec(),
            workspace_config: workspaces.to_vec(),
            application_config: settings.clone(),
            timestamp: taken_at.to_rfc3339(),
            version: VERSION.to_string(),
        }
    }
}

/// A bundle file found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
}

pub fn backup_file_name(taken_at: &DateTime<Local>) -> String {
    format!("{PREFIX}{}{EXTENSION}", taken_at.format(TIMESTAMP_FORMAT))
}

/// Timestamp embedded in a bundle file name, `None` for any other file
pub fn parse_backup_file_name(file_name: &str) -> Option<NaiveDateTime> {
    let stamp = file_name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    if stamp.len() != TIMESTAMP_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Directory of bundle files
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `bundle` to a file named after `taken_at`. A name already taken
    /// within the same second moves on to the next free second.
    pub fn create(&self, bundle: &BackupBundle, taken_at: &DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create backup directory {:?}", self.dir))?;

        let mut stamp = *taken_at;
        let mut path = self.dir.join(backup_file_name(&stamp));
        while path.exists() {
            debug!(path = %path.display(), "Backup name taken, trying the next second");
            stamp += TimeDelta::seconds(1);
            path = self.dir.join(backup_file_name(&stamp));
        }
        let json = serde_json::to_string_pretty(bundle).context("Failed to serialize backup bundle")?;
        fs::write(&path, json).with_context(|| format!("Failed to write backup {:?}", path))?;

        info!(
            path = %path.display(),
            displays = bundle.display_config.len(),
            workspaces = bundle.workspace_config.len(),
            "Created backup"
        );
        Ok(path)
    }

    /// Bundle files, newest first. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read backup directory {:?}", self.dir))?
        {
            let entry = entry.context("Failed to read backup directory entry")?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            match parse_backup_file_name(&file_name) {
                Some(taken_at) => entries.push(BackupEntry {
                    path: entry.path(),
                    file_name,
                    taken_at,
                }),
                None => debug!(file = %file_name, "Ignoring non-backup file"),
            }
        }

        entries.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
        Ok(entries)
    }

    pub fn restore(&self, file_name: &str) -> Result<BackupBundle> {
        let path = self.resolve(file_name)?;
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read backup {:?}", path))?;
        let bundle: BackupBundle = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse backup {:?}", path))?;

        if bundle.version != VERSION {
            warn!(file = %file_name, version = %bundle.version, expected = VERSION, "Backup was written by a different version");
        }
        info!(file = %file_name, displays = bundle.display_config.len(), "Restored backup");
        Ok(bundle)
    }

    pub fn delete(&self, file_name: &str) -> Result<()> {
        let path = self.resolve(file_name)?;
        fs::remove_file(&path).with_context(|| format!("Failed to delete backup {:?}", path))?;
        info!(file = %file_name, "Deleted backup");
        Ok(())
    }

    /// Delete the oldest bundles beyond `max_backups`; returns how many went
    pub fn prune(&self, max_backups: usize) -> Result<usize> {
        let entries = self.list()?;
        let mut removed = 0;
        for entry in entries.iter().skip(max_backups) {
            fs::remove_file(&entry.path)
                .with_context(|| format!("Failed to prune backup {:?}", entry.path))?;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, kept = max_backups, "Pruned old backups");
        }
        Ok(removed)
    }

    /// Only names matching the bundle pattern resolve, so a caller cannot
    /// reach outside the backup directory
    fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        if parse_backup_file_name(file_name).is_none() {
            bail!("'{}' is not a backup file name", file_name);
        }
        let path = self.dir.join(file_name);
        if !path.exists() {
            bail!("Backup '{}' does not exist", file_name);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, hour, minute, second).unwrap()
    }

    fn bundle(name: &str) -> BackupBundle {
        let mut display = DisplayInfo::new(name);
        display.width = 1920;
        display.height = 1080;
        display.refresh_rate = 60.0;
        BackupBundle::new(
            &[display],
            &[WorkspaceAssignment::new("1", name)],
            &Settings::default(),
            at(12, 0, 0),
        )
    }

    #[test]
    fn test_file_name_pattern() {
        assert_eq!(backup_file_name(&at(8, 5, 3)), "hyprdisplays_backup_20240309_080503.json");
        assert!(parse_backup_file_name("hyprdisplays_backup_20240309_080503.json").is_some());
        assert!(parse_backup_file_name("hyprdisplays_backup_2024039_080503.json").is_none());
        assert!(parse_backup_file_name("hyprdisplays_backup_20241399_080503.json").is_none());
        assert!(parse_backup_file_name("notes.json").is_none());
    }

    #[test]
    fn test_create_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path().join("backups"));
        let original = bundle("DP-1");

        let path = store.create(&original, &at(9, 0, 0)).unwrap();
        assert!(path.exists());

        let restored = store.restore("hyprdisplays_backup_20240309_090000.json").unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.version, "1.0.0");
    }

    #[test]
    fn test_bundle_json_keys() {
        let json = serde_json::to_value(bundle("DP-1")).unwrap();
        for key in ["displayConfig", "workspaceConfig", "applicationConfig", "timestamp", "version"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_same_second_backups_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let first = bundle("DP-1");
        let second = bundle("HDMI-A-1");

        store.create(&first, &at(9, 0, 0)).unwrap();
        let path = store.create(&second, &at(9, 0, 0)).unwrap();
        assert!(path.ends_with("hyprdisplays_backup_20240309_090001.json"));

        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.restore("hyprdisplays_backup_20240309_090000.json").unwrap(), first);
        assert_eq!(store.restore("hyprdisplays_backup_20240309_090001.json").unwrap(), second);
    }

    #[test]
    fn test_list_is_newest_first_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        store.create(&bundle("A"), &at(9, 0, 0)).unwrap();
        store.create(&bundle("B"), &at(11, 0, 0)).unwrap();
        store.create(&bundle("C"), &at(10, 0, 0)).unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|e| e.file_name).collect();
        assert_eq!(
            names,
            vec![
                "hyprdisplays_backup_20240309_110000.json",
                "hyprdisplays_backup_20240309_100000.json",
                "hyprdisplays_backup_20240309_090000.json",
            ]
        );
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        for minute in 0..4 {
            store.create(&bundle("DP-1"), &at(9, minute, 0)).unwrap();
        }

        assert_eq!(store.prune(2).unwrap(), 2);
        let remaining: Vec<String> = store.list().unwrap().into_iter().map(|e| e.file_name).collect();
        assert_eq!(
            remaining,
            vec![
                "hyprdisplays_backup_20240309_090300.json",
                "hyprdisplays_backup_20240309_090200.json",
            ]
        );
    }

    #[test]
    fn test_delete_rejects_foreign_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        store.create(&bundle("DP-1"), &at(9, 0, 0)).unwrap();

        assert!(store.delete("../settings.json").is_err());
        assert!(store.delete("hyprdisplays_backup_20240309_100000.json").is_err());
        store.delete("hyprdisplays_backup_20240309_090000.json").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
    }
}
