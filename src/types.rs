//! Core display records shared by every component
//!
//! `DisplayInfo` is the one record type for a physical output. Hardware-only
//! fields (identity, capabilities, available modes) are filled by the
//! snapshot parser; the monitor DSL only ever carries the preference fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output rotation / flip as understood by the compositor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Transform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    /// Token that is not one of the known transforms; rejected by validation
    Other(String),
}

impl Transform {
    pub fn as_str(&self) -> &str {
        match self {
            Transform::Normal => "normal",
            Transform::Rotate90 => "90",
            Transform::Rotate180 => "180",
            Transform::Rotate270 => "270",
            Transform::Flipped => "flipped",
            Transform::Flipped90 => "flipped-90",
            Transform::Other(token) => token,
        }
    }

    /// Map the compositor's numeric transform code (wl_output order)
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Transform::Normal,
            1 => Transform::Rotate90,
            2 => Transform::Rotate180,
            3 => Transform::Rotate270,
            4 => Transform::Flipped,
            5 => Transform::Flipped90,
            other => Transform::Other(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Transform::Other(_))
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Transform::Normal)
    }
}

impl From<&str> for Transform {
    fn from(token: &str) -> Self {
        match token {
            "normal" | "0" => Transform::Normal,
            "90" | "1" => Transform::Rotate90,
            "180" | "2" => Transform::Rotate180,
            "270" | "3" => Transform::Rotate270,
            "flipped" | "4" => Transform::Flipped,
            "flipped-90" | "5" => Transform::Flipped90,
            other => Transform::Other(other.to_string()),
        }
    }
}

impl From<String> for Transform {
    fn from(token: String) -> Self {
        Transform::from(token.as_str())
    }
}

impl From<Transform> for String {
    fn from(transform: Transform) -> Self {
        transform.as_str().to_string()
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variable refresh rate policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VrrMode {
    #[default]
    Off,
    Global,
    FullscreenOnly,
}

impl TryFrom<u8> for VrrMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VrrMode::Off),
            1 => Ok(VrrMode::Global),
            2 => Ok(VrrMode::FullscreenOnly),
            other => Err(format!("invalid VRR mode {other} (expected 0, 1 or 2)")),
        }
    }
}

impl From<VrrMode> for u8 {
    fn from(mode: VrrMode) -> Self {
        match mode {
            VrrMode::Off => 0,
            VrrMode::Global => 1,
            VrrMode::FullscreenOnly => 2,
        }
    }
}

impl fmt::Display for VrrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A `WxH@rate` video mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: f64,
}

impl FromStr for Mode {
    type Err = String;

    /// Accepts `1920x1080@60`, `1920x1080@59.94` and the compositor's
    /// `1920x1080@60.00Hz` spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resolution, rate) = s
            .trim()
            .split_once('@')
            .ok_or_else(|| format!("mode '{s}' is missing '@<rate>'"))?;
        let (width, height) = parse_pair::<u32>(resolution)
            .ok_or_else(|| format!("mode '{s}' has an invalid resolution"))?;
        let rate = rate.trim_end_matches("Hz");
        let refresh_rate = rate
            .parse::<f64>()
            .map_err(|_| format!("mode '{s}' has an invalid refresh rate"))?;
        Ok(Mode { width, height, refresh_rate })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{:.2}", self.width, self.height, self.refresh_rate)
    }
}

/// Parse an `AxB` pair such as a resolution or a position
pub fn parse_pair<T: FromStr>(s: &str) -> Option<(T, T)> {
    let (a, b) = s.trim().split_once('x')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// One physical output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayInfo {
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: f64,
    pub x: i32,
    pub y: i32,
    pub scale: f64,
    pub enabled: bool,
    pub primary: bool,
    pub transform: Transform,
    pub mirror_of: String,
    pub workspace: String,
    pub hdr: bool,
    pub ten_bit: bool,
    pub wide_gamut: bool,
    pub sdr_brightness: f64,
    pub sdr_saturation: f64,
    pub vrr_mode: VrrMode,
    pub available_modes: Vec<String>,
    pub vrr_capable: bool,
    pub hdr_capable: bool,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            manufacturer: String::new(),
            model: String::new(),
            serial: String::new(),
            width: 0,
            height: 0,
            refresh_rate: 0.0,
            x: 0,
            y: 0,
            scale: 1.0,
            enabled: true,
            primary: false,
            transform: Transform::Normal,
            mirror_of: String::new(),
            workspace: String::new(),
            hdr: false,
            ten_bit: false,
            wide_gamut: false,
            sdr_brightness: 1.0,
            sdr_saturation: 1.0,
            vrr_mode: VrrMode::Off,
            available_modes: Vec::new(),
            vrr_capable: false,
            hdr_capable: false,
        }
    }
}

impl DisplayInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// `WxH`, derived from width/height so it can never go stale
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// `XxY`, derived from x/y
    pub fn position(&self) -> String {
        format!("{}x{}", self.x, self.y)
    }

    pub fn mode(&self) -> Mode {
        Mode {
            width: self.width,
            height: self.height,
            refresh_rate: self.refresh_rate,
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.width = mode.width;
        self.height = mode.height;
        self.refresh_rate = mode.refresh_rate;
    }

    /// Right edge in logical space
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge in logical space
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Whether `mode` is one of the hardware-reported modes.
    /// Refresh rates are compared with a small tolerance since the
    /// compositor reports values like 59.95 for a 60 Hz panel.
    pub fn supports_mode(&self, mode: &Mode) -> bool {
        self.available_modes
            .iter()
            .filter_map(|m| m.parse::<Mode>().ok())
            .any(|m| {
                m.width == mode.width
                    && m.height == mode.height
                    && (m.refresh_rate - mode.refresh_rate).abs() < 0.5
            })
    }
}

/// `workspace=<name>,monitor:<monitor>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceAssignment {
    pub workspace_name: String,
    pub monitor_name: String,
}

impl WorkspaceAssignment {
    pub fn new(workspace_name: impl Into<String>, monitor_name: impl Into<String>) -> Self {
        Self {
            workspace_name: workspace_name.into(),
            monitor_name: monitor_name.into(),
        }
    }
}
