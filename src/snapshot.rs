//! Live snapshot parsing
//!
//! Translates `hyprctl -j monitors all` (JSON) or the plain `hyprctl monitors`
//! text into display records. Both paths finish with the same reading-order
//! sort so enumeration is deterministic.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{DisplayInfo, Transform, VrrMode};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActiveWorkspace {
    name: String,
}

/// Wire shape of one monitor object. Every key-to-field mapping, default
/// and coercion for the JSON path lives here and in `into_display`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HyprMonitor {
    name: String,
    description: String,
    make: String,
    model: String,
    serial: String,
    width: u32,
    height: u32,
    refresh_rate: f64,
    x: i32,
    y: i32,
    scale: Option<f64>,
    disabled: bool,
    focused: bool,
    transform: i64,
    mirror_of: String,
    active_workspace: ActiveWorkspace,
    /// Key presence doubles as the HDR capability flag
    hdr: Option<bool>,
    sdr_brightness: Option<f64>,
    sdr_saturation: Option<f64>,
    vrr_mode: Option<u8>,
    /// Only the presence of this key matters
    vrr: Option<serde_json::Value>,
    available_modes: Vec<String>,
    ten_bit: bool,
    wide_gamut: bool,
}

impl HyprMonitor {
    fn into_display(self) -> DisplayInfo {
        let vrr_mode = match self.vrr_mode.map(VrrMode::try_from) {
            Some(Ok(mode)) => mode,
            Some(Err(e)) => {
                warn!(display = %self.name, error = %e, "Ignoring VRR mode from snapshot");
                VrrMode::Off
            }
            None => VrrMode::Off,
        };

        DisplayInfo {
            description: self.description,
            manufacturer: self.make,
            model: self.model,
            serial: self.serial,
            width: self.width,
            height: self.height,
            refresh_rate: self.refresh_rate,
            x: self.x,
            y: self.y,
            scale: self.scale.unwrap_or(1.0),
            enabled: !self.disabled,
            primary: self.focused,
            transform: Transform::from_code(self.transform),
            mirror_of: normalize_mirror(&self.mirror_of),
            workspace: self.active_workspace.name,
            hdr: self.hdr.unwrap_or(false),
            ten_bit: self.ten_bit,
            wide_gamut: self.wide_gamut,
            sdr_brightness: self.sdr_brightness.unwrap_or(1.0),
            sdr_saturation: self.sdr_saturation.unwrap_or(1.0),
            vrr_mode,
            available_modes: self.available_modes,
            vrr_capable: self.vrr.is_some(),
            hdr_capable: self.hdr.is_some(),
            name: self.name,
        }
    }
}

/// The compositor spells "no mirror" as `none`
fn normalize_mirror(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value == "none" {
        String::new()
    } else {
        value.to_string()
    }
}

/// Ascending by (y, x); stable for displays sharing a position
pub fn sort_reading_order(displays: &mut [DisplayInfo]) {
    displays.sort_by_key(|d| (d.y, d.x));
}

/// Parse a JSON monitor array. Fails if the input is not an array or no
/// usable monitor remains; callers must then keep their current state.
pub fn parse_json(output: &str) -> Result<Vec<DisplayInfo>> {
    let value: serde_json::Value =
        serde_json::from_str(output).context("Snapshot is not valid JSON")?;
    let serde_json::Value::Array(items) = value else {
        bail!("Snapshot JSON is not an array");
    };

    let mut displays = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<HyprMonitor>(item) {
            Ok(monitor) if monitor.name.is_empty() => {
                warn!(index, "Skipping snapshot entry without a name");
            }
            Ok(monitor) => displays.push(monitor.into_display()),
            Err(e) => warn!(index, error = %e, "Skipping malformed snapshot entry"),
        }
    }

    if displays.is_empty() {
        bail!("Snapshot contained no monitors");
    }

    sort_reading_order(&mut displays);
    debug!(count = displays.len(), "Parsed JSON snapshot");
    Ok(displays)
}

/// `Monitor DP-1 (ID 0):` -> `DP-1`
fn parse_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("Monitor ")?;
    let (name, tail) = rest.split_once(' ')?;
    (tail.trim_start().starts_with("(ID") && !name.is_empty()).then_some(name)
}

/// `2560x1440@179.99899 at 2560x0`
fn parse_mode_line(line: &str, display: &mut DisplayInfo) -> bool {
    let Some((mode, position)) = line.split_once(" at ") else {
        return false;
    };
    let Ok(mode) = mode.trim().parse() else {
        return false;
    };
    let Some((x, y)) = crate::types::parse_pair::<i32>(position) else {
        return false;
    };
    display.set_mode(mode);
    display.x = x;
    display.y = y;
    true
}

fn flush(current: &mut Option<DisplayInfo>, displays: &mut Vec<DisplayInfo>) {
    if let Some(display) = current.take() {
        displays.push(display);
    }
}

/// Parse the plain-text listing. A header line starts a new record and
/// flushes the previous one; `key: value` lines fill the current record.
/// Without an explicit `focused: yes`, the leftmost display is primary.
pub fn parse_text(output: &str) -> Result<Vec<DisplayInfo>> {
    let mut displays = Vec::new();
    let mut current: Option<DisplayInfo> = None;
    let mut explicit_primary = false;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = parse_header(line) {
            flush(&mut current, &mut displays);
            current = Some(DisplayInfo::new(name));
            continue;
        }

        let Some(display) = current.as_mut() else {
            continue;
        };

        if parse_mode_line(line, display) {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "description" => display.description = value.to_string(),
            "make" => display.manufacturer = value.to_string(),
            "model" => display.model = value.to_string(),
            "serial" => display.serial = value.to_string(),
            "scale" => match value.parse() {
                Ok(scale) => display.scale = scale,
                Err(_) => {
                    let name = &display.name;
                    warn!(display = %name, value, "Unparseable scale in snapshot");
                }
            },
            "transform" => display.transform = Transform::from(value),
            "mirrorOf" => display.mirror_of = normalize_mirror(value),
            "active workspace" => {
                // `1 (1)` or `name:web (-98)`
                display.workspace = value.split_whitespace().next().unwrap_or_default().to_string();
            }
            "disabled" => display.enabled = !value.eq_ignore_ascii_case("true"),
            "focused" => {
                display.primary = value.eq_ignore_ascii_case("yes");
                explicit_primary |= display.primary;
            }
            "availableModes" => {
                display.available_modes = value.split_whitespace().map(str::to_string).collect();
            }
            "vrr" => {
                display.vrr_capable = true;
                if let Ok(mode) = value.parse::<u8>().map(VrrMode::try_from) {
                    display.vrr_mode = mode.unwrap_or_default();
                }
            }
            _ => {}
        }
    }
    flush(&mut current, &mut displays);

    if displays.is_empty() {
        bail!("Text snapshot contained no monitors");
    }

    if !explicit_primary {
        let leftmost = displays
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| d.x)
            .map(|(index, _)| index);
        if let Some(index) = leftmost {
            displays[index].primary = true;
        }
    }

    sort_reading_order(&mut displays);
    debug!(count = displays.len(), "Parsed text snapshot");
    Ok(displays)
}
