//! Canonical display state
//!
//! The store owns the ordered set of display records, applies the
//! persisted-over-live merge policy, carries the interactive edit
//! operations, and tells registered listeners about every mutation.

use std::cell::Cell;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::monitors::MonitorRule;
use crate::constants::validation::MAX_SDR_MULTIPLIER;
use crate::snapping::{Rect, find_snap_position};
use crate::types::{DisplayInfo, Mode, Transform, VrrMode};
use crate::validation::{
    ValidationError, validate_position, validate_refresh_rate, validate_resolution, validate_scale,
    validate_transform,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The whole set was swapped (snapshot, merge, restore)
    Replaced,
    Upserted(String),
    Removed(String),
    Cleared,
}

pub type Listener = Box<dyn FnMut(&StoreEvent)>;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("No display named '{0}'")]
    UnknownDisplay(String),

    #[error("Display {display} does not support mode {mode}")]
    UnsupportedMode { display: String, mode: String },

    #[error("Display {display}: {error}")]
    Invalid {
        display: String,
        error: ValidationError,
    },
}

#[derive(Default)]
pub struct DisplayStore {
    displays: Vec<DisplayInfo>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for DisplayStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayStore")
            .field("displays", &self.displays)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl DisplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: StoreEvent) {
        debug!(event = ?event, "Store changed");
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn displays(&self) -> &[DisplayInfo] {
        &self.displays
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DisplayInfo> {
        self.displays.iter().find(|d| d.name == name)
    }

    fn index_of(&self, name: &str) -> Result<usize, StoreError> {
        self.displays
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| StoreError::UnknownDisplay(name.to_string()))
    }

    /// Replace the record with the same name, or append
    pub fn upsert(&mut self, display: DisplayInfo) {
        let name = display.name.clone();
        match self.displays.iter_mut().find(|d| d.name == name) {
            Some(existing) => *existing = display,
            None => self.displays.push(display),
        }
        self.notify(StoreEvent::Upserted(name));
    }

    pub fn remove(&mut self, name: &str) -> Option<DisplayInfo> {
        let index = self.displays.iter().position(|d| d.name == name)?;
        let removed = self.displays.remove(index);
        self.notify(StoreEvent::Removed(name.to_string()));
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.displays.clear();
        self.notify(StoreEvent::Cleared);
    }

    /// Swap in a whole new set, never patched incrementally
    pub fn replace_all(&mut self, displays: Vec<DisplayInfo>) {
        self.displays = displays;
        self.notify(StoreEvent::Replaced);
    }

    /// Overlay persisted preferences onto the live records sharing a
    /// name. Identity, capability and enablement stay hardware-sourced.
    /// Returns how many records matched.
    pub fn merge_persisted(&mut self, rules: &[MonitorRule]) -> usize {
        let mut merged = 0;
        for rule in rules {
            let Some(display) = self.displays.iter_mut().find(|d| d.name == rule.name) else {
                debug!(display = %rule.name, "Persisted monitor not present, skipping");
                continue;
            };
            merge_rule(display, rule);
            merged += 1;
        }
        if merged > 0 {
            info!(merged, "Merged persisted monitor preferences");
            self.notify(StoreEvent::Replaced);
        }
        merged
    }

    /// Run `edit` on one record and announce it
    fn edit<T>(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut DisplayInfo) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let index = self.index_of(name)?;
        let value = edit(&mut self.displays[index])?;
        self.notify(StoreEvent::Upserted(name.to_string()));
        Ok(value)
    }

    /// Move to a logical position, snapping flush to a neighbour's edge
    /// when within `snap_threshold`. Returns the final position.
    pub fn move_to(&mut self, name: &str, x: i32, y: i32, snap_threshold: u32) -> Result<(i32, i32), StoreError> {
        let index = self.index_of(name)?;
        let mut moved = Rect::from(&self.displays[index]);
        moved.x = x as i64;
        moved.y = y as i64;
        let others: Vec<Rect> = self
            .displays
            .iter()
            .filter(|d| d.name != name && d.enabled)
            .map(Rect::from)
            .collect();

        let (x, y) = match find_snap_position(moved, &others, snap_threshold) {
            Some((sx, sy)) => {
                debug!(display = %name, from_x = x, from_y = y, to_x = sx, to_y = sy, "Snapped to edge");
                (clamp_coordinate(sx), clamp_coordinate(sy))
            }
            None => (x, y),
        };

        self.edit(name, |display| {
            check(display, validate_position(x, y))?;
            display.x = x;
            display.y = y;
            Ok((x, y))
        })
    }

    /// `strict` rejects modes the hardware did not report (when it
    /// reported any)
    pub fn set_mode(&mut self, name: &str, mode: Mode, strict: bool) -> Result<(), StoreError> {
        self.edit(name, |display| {
            check(display, validate_resolution(mode.width, mode.height))?;
            check(display, validate_refresh_rate(mode.refresh_rate))?;
            if strict && !display.available_modes.is_empty() && !display.supports_mode(&mode) {
                return Err(StoreError::UnsupportedMode {
                    display: display.name.clone(),
                    mode: mode.to_string(),
                });
            }
            display.set_mode(mode);
            Ok(())
        })
    }

    pub fn set_scale(&mut self, name: &str, scale: f64) -> Result<(), StoreError> {
        self.edit(name, |display| {
            check(display, validate_scale(scale))?;
            display.scale = scale;
            Ok(())
        })
    }

    pub fn set_transform(&mut self, name: &str, transform: Transform) -> Result<(), StoreError> {
        self.edit(name, |display| {
            check(display, validate_transform(&transform))?;
            display.transform = transform;
            Ok(())
        })
    }

    pub fn set_vrr(&mut self, name: &str, mode: VrrMode) -> Result<(), StoreError> {
        self.edit(name, |display| {
            if mode != VrrMode::Off && !display.vrr_capable {
                warn!(display = %name, "Enabling VRR on a display that did not report VRR support");
            }
            display.vrr_mode = mode;
            Ok(())
        })
    }

    /// HDR and wide gamut are mutually exclusive; enabling one clears the other
    pub fn set_hdr(&mut self, name: &str, enabled: bool) -> Result<(), StoreError> {
        self.edit(name, |display| {
            display.hdr = enabled;
            if enabled {
                display.wide_gamut = false;
            }
            Ok(())
        })
    }

    pub fn set_wide_gamut(&mut self, name: &str, enabled: bool) -> Result<(), StoreError> {
        self.edit(name, |display| {
            display.wide_gamut = enabled;
            if enabled {
                display.hdr = false;
            }
            Ok(())
        })
    }

    pub fn set_ten_bit(&mut self, name: &str, enabled: bool) -> Result<(), StoreError> {
        self.edit(name, |display| {
            display.ten_bit = enabled;
            Ok(())
        })
    }

    pub fn set_sdr(&mut self, name: &str, brightness: Option<f64>, saturation: Option<f64>) -> Result<(), StoreError> {
        self.edit(name, |display| {
            for (field, value) in [("sdrBrightness", brightness), ("sdrSaturation", saturation)] {
                let Some(value) = value else { continue };
                if !(value > 0.0 && value <= MAX_SDR_MULTIPLIER) {
                    return Err(StoreError::Invalid {
                        display: display.name.clone(),
                        error: ValidationError {
                            field,
                            message: format!("must be in (0, {MAX_SDR_MULTIPLIER}] (got {value})"),
                        },
                    });
                }
            }
            if let Some(value) = brightness {
                display.sdr_brightness = value;
            }
            if let Some(value) = saturation {
                display.sdr_saturation = value;
            }
            Ok(())
        })
    }

    /// Empty `target` clears mirroring
    pub fn set_mirror(&mut self, name: &str, target: &str) -> Result<(), StoreError> {
        if !target.is_empty() {
            if target == name {
                return Err(StoreError::Invalid {
                    display: name.to_string(),
                    error: ValidationError {
                        field: "mirrorOf",
                        message: "a monitor cannot mirror itself".to_string(),
                    },
                });
            }
            self.index_of(target)?;
        }
        self.edit(name, |display| {
            display.mirror_of = target.to_string();
            Ok(())
        })
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), StoreError> {
        self.edit(name, |display| {
            display.enabled = enabled;
            Ok(())
        })
    }

    /// Workspace shown on `name`
    pub fn set_workspace(&mut self, name: &str, workspace: &str) -> Result<(), StoreError> {
        self.edit(name, |display| {
            display.workspace = workspace.to_string();
            Ok(())
        })
    }
}

fn check(display: &DisplayInfo, error: Option<ValidationError>) -> Result<(), StoreError> {
    match error {
        Some(error) => Err(StoreError::Invalid {
            display: display.name.clone(),
            error,
        }),
        None => Ok(()),
    }
}

fn clamp_coordinate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn merge_rule(display: &mut DisplayInfo, rule: &MonitorRule) {
    display.vrr_mode = rule.vrr_mode;
    display.hdr = rule.hdr;
    display.sdr_brightness = rule.sdr_brightness;
    display.sdr_saturation = rule.sdr_saturation;
    display.ten_bit = rule.ten_bit;
    display.wide_gamut = rule.wide_gamut;
    if let Some(scale) = rule.scale {
        display.scale = scale;
    }
    if let Some(mode) = rule.mode {
        display.set_mode(mode);
    }
}

/// Operations that must never overlap with themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Load,
    Save,
    Refresh,
}

impl OperationKind {
    fn index(self) -> usize {
        match self {
            OperationKind::Load => 0,
            OperationKind::Save => 1,
            OperationKind::Refresh => 2,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Load => "load",
            OperationKind::Save => "save",
            OperationKind::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpState {
    #[default]
    Idle,
    InProgress,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("A {0} operation is already in progress")]
    AlreadyInProgress(OperationKind),
}

/// One {Idle, InProgress} state per operation kind
#[derive(Debug, Default)]
pub struct OperationGuards {
    states: [Cell<OpState>; 3],
}

impl OperationGuards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: OperationKind) -> OpState {
        self.states[kind.index()].get()
    }

    /// Enter `kind`, or reject if it is already running. The state returns
    /// to Idle when the token drops.
    pub fn begin(&self, kind: OperationKind) -> Result<OperationToken<'_>, OperationError> {
        let state = &self.states[kind.index()];
        if state.get() == OpState::InProgress {
            warn!(operation = %kind, "Rejected overlapping operation");
            return Err(OperationError::AlreadyInProgress(kind));
        }
        state.set(OpState::InProgress);
        Ok(OperationToken { state })
    }
}

#[must_use = "the operation ends when the token is dropped"]
pub struct OperationToken<'a> {
    state: &'a Cell<OpState>,
}

impl Drop for OperationToken<'_> {
    fn drop(&mut self) {
        self.state.set(OpState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::monitors::parse_monitors;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn live(name: &str, x: i32) -> DisplayInfo {
        let mut d = DisplayInfo::new(name);
        d.manufacturer = "Dell".to_string();
        d.serial = format!("SN-{name}");
        d.width = 1920;
        d.height = 1080;
        d.refresh_rate = 60.0;
        d.x = x;
        d.primary = x == 0;
        d.available_modes = vec!["1920x1080@60.00Hz".to_string(), "2560x1440@144.00Hz".to_string()];
        d.vrr_capable = true;
        d
    }

    fn store() -> DisplayStore {
        let mut store = DisplayStore::new();
        store.replace_all(vec![live("DP-1", 0), live("DP-2", 1920)]);
        store
    }

    #[test]
    fn test_upsert_replaces_or_appends() {
        let mut store = store();
        let mut changed = live("DP-1", 0);
        changed.scale = 2.0;
        store.upsert(changed);
        store.upsert(live("HDMI-A-1", 3840));

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("DP-1").map(|d| d.scale), Some(2.0));
        assert_eq!(store.displays()[2].name, "HDMI-A-1");

        assert!(store.remove("DP-2").is_some());
        assert!(store.remove("DP-2").is_none());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_listeners_see_every_mutation() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut store = DisplayStore::new();
        let sink = Rc::clone(&events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        store.replace_all(vec![live("DP-1", 0)]);
        store.set_scale("DP-1", 1.5).unwrap();
        store.remove("DP-1");
        store.clear();

        assert_eq!(
            *events.borrow(),
            vec![
                StoreEvent::Replaced,
                StoreEvent::Upserted("DP-1".to_string()),
                StoreEvent::Removed("DP-1".to_string()),
                StoreEvent::Cleared,
            ]
        );
    }

    #[test]
    fn test_merge_keeps_hardware_identity() {
        let mut store = store();
        let before = store.displays().to_vec();
        let rules = parse_monitors(
            "monitor=DP-1,2560x1440@144.00,500x500,1.50,cm,hdr,vrr,2\nmonitor=HDMI-A-9,1920x1080@60,0x0,1\n",
        );

        assert_eq!(store.merge_persisted(&rules), 1);
        let dp = store.get("DP-1").unwrap();
        assert_eq!(dp.name, before[0].name);
        assert_eq!(dp.manufacturer, before[0].manufacturer);
        assert_eq!(dp.serial, before[0].serial);
        assert_eq!(dp.available_modes, before[0].available_modes);
        assert_eq!(dp.enabled, before[0].enabled);
        assert_eq!(dp.primary, before[0].primary);
        assert_eq!((dp.x, dp.y), (0, 0));

        assert_eq!(dp.scale, 1.5);
        assert!(dp.hdr);
        assert_eq!(dp.vrr_mode, VrrMode::FullscreenOnly);
        assert_eq!((dp.width, dp.height, dp.refresh_rate), (2560, 1440, 144.0));

        assert_eq!(store.get("DP-2"), Some(&before[1]));
        assert!(store.get("HDMI-A-9").is_none());
    }

    #[test]
    fn test_merge_leaves_mode_when_not_spelled_out() {
        let mut store = store();
        let rules = parse_monitors("monitor=DP-2,preferred,auto,auto\n");
        store.merge_persisted(&rules);
        let dp = store.get("DP-2").unwrap();
        assert_eq!((dp.width, dp.height, dp.scale), (1920, 1080, 1.0));
    }

    #[test]
    fn test_move_snaps_and_validates() {
        let mut store = store();
        assert_eq!(store.move_to("DP-2", 1930, 8, 20).unwrap(), (1920, 0));
        assert_eq!(store.move_to("DP-2", 1930, 8, 0).unwrap(), (1930, 8));
        assert!(matches!(
            store.move_to("DP-2", 20000, 0, 0),
            Err(StoreError::Invalid { .. })
        ));
        assert_eq!(
            store.move_to("nope", 0, 0, 0),
            Err(StoreError::UnknownDisplay("nope".to_string()))
        );
    }

    #[test]
    fn test_set_mode_checks_available_modes() {
        let mut store = store();
        let mode: Mode = "2560x1440@144".parse().unwrap();
        store.set_mode("DP-1", mode, true).unwrap();
        assert_eq!(store.get("DP-1").unwrap().resolution(), "2560x1440");

        let odd: Mode = "1024x768@75".parse().unwrap();
        assert!(matches!(
            store.set_mode("DP-1", odd, true),
            Err(StoreError::UnsupportedMode { .. })
        ));
        store.set_mode("DP-1", odd, false).unwrap();
    }

    #[test]
    fn test_hdr_and_wide_gamut_are_exclusive() {
        let mut store = store();
        store.set_wide_gamut("DP-1", true).unwrap();
        store.set_hdr("DP-1", true).unwrap();
        let dp = store.get("DP-1").unwrap();
        assert!(dp.hdr && !dp.wide_gamut);

        store.set_wide_gamut("DP-1", true).unwrap();
        let dp = store.get("DP-1").unwrap();
        assert!(!dp.hdr && dp.wide_gamut);
    }

    #[test]
    fn test_vrr_is_set_even_without_reported_support() {
        let mut store = store();
        let mut plain = live("HDMI-A-1", 3840);
        plain.vrr_capable = false;
        store.upsert(plain);

        store.set_vrr("HDMI-A-1", VrrMode::FullscreenOnly).unwrap();
        assert_eq!(store.get("HDMI-A-1").unwrap().vrr_mode, VrrMode::FullscreenOnly);
    }

    #[test]
    fn test_edit_rejections_leave_record_untouched() {
        let mut store = store();
        let before = store.get("DP-1").cloned();
        assert!(store.set_scale("DP-1", 0.0).is_err());
        assert!(store.set_transform("DP-1", Transform::from("sideways")).is_err());
        assert!(store.set_sdr("DP-1", Some(1.2), Some(3.0)).is_err());
        assert!(store.set_mirror("DP-1", "DP-1").is_err());
        assert!(store.set_mirror("DP-1", "HDMI-A-9").is_err());
        assert_eq!(store.get("DP-1").cloned(), before);

        store.set_mirror("DP-2", "DP-1").unwrap();
        store.set_sdr("DP-1", Some(1.2), None).unwrap();
        assert_eq!(store.get("DP-2").unwrap().mirror_of, "DP-1");
        assert_eq!(store.get("DP-1").unwrap().sdr_brightness, 1.2);
    }

    #[test]
    fn test_guard_rejects_same_kind_only() {
        let guards = OperationGuards::new();
        let refresh = guards.begin(OperationKind::Refresh).unwrap();
        assert_eq!(
            guards.begin(OperationKind::Refresh).err(),
            Some(OperationError::AlreadyInProgress(OperationKind::Refresh))
        );

        let save = guards.begin(OperationKind::Save);
        assert!(save.is_ok());
        drop(save);

        drop(refresh);
        assert_eq!(guards.state(OperationKind::Refresh), OpState::Idle);
        assert!(guards.begin(OperationKind::Refresh).is_ok());
    }
}
