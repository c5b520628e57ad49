//! Monitor configuration DSL
//!
//! One directive per line:
//!
//! ```text
//! monitor=<name>,<W>x<H>@<rate>,<x>x<y>,<scale>[,<opt>,...]
//! ```
//!
//! Trailing options are consumed left to right; some stand alone, some take
//! the following token as their argument. Malformed lines are skipped, never
//! fatal to the rest of the file.

use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::constants::dsl::*;
use crate::types::{DisplayInfo, Mode, Transform, VrrMode, parse_pair};

/// A persisted monitor preference as read from one DSL line.
///
/// Fields the line did not spell out in a usable form (`preferred`,
/// `auto`, ...) stay `None` so a merge can tell "absent" from "default".
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorRule {
    pub name: String,
    pub mode: Option<Mode>,
    pub position: Option<(i32, i32)>,
    pub scale: Option<f64>,
    pub transform: Transform,
    pub mirror_of: String,
    pub hdr: bool,
    pub ten_bit: bool,
    pub wide_gamut: bool,
    pub sdr_brightness: f64,
    pub sdr_saturation: f64,
    pub vrr_mode: VrrMode,
}

impl MonitorRule {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: None,
            position: None,
            scale: None,
            transform: Transform::Normal,
            mirror_of: String::new(),
            hdr: false,
            ten_bit: false,
            wide_gamut: false,
            sdr_brightness: 1.0,
            sdr_saturation: 1.0,
            vrr_mode: VrrMode::Off,
        }
    }

    /// Materialize as a display record carrying only DSL-encoded fields
    pub fn to_display(&self) -> DisplayInfo {
        let mut display = DisplayInfo::new(self.name.clone());
        if let Some(mode) = self.mode {
            display.set_mode(mode);
        }
        if let Some((x, y)) = self.position {
            display.x = x;
            display.y = y;
        }
        if let Some(scale) = self.scale {
            display.scale = scale;
        }
        display.transform = self.transform.clone();
        display.mirror_of = self.mirror_of.clone();
        display.hdr = self.hdr;
        display.ten_bit = self.ten_bit;
        display.wide_gamut = self.wide_gamut;
        display.sdr_brightness = self.sdr_brightness;
        display.sdr_saturation = self.sdr_saturation;
        display.vrr_mode = self.vrr_mode;
        display
    }

    /// Consume the trailing option tokens of a directive
    fn apply_options(&mut self, options: &[&str]) {
        let mut tokens = options.iter().map(|t| t.trim());

        while let Some(token) = tokens.next() {
            match token {
                "cm" => match tokens.next() {
                    Some("hdr") => self.hdr = true,
                    Some("wide") => self.wide_gamut = true,
                    other => debug!(monitor = %self.name, value = ?other, "Ignoring unrecognized color management mode"),
                },
                "bitdepth" => {
                    if tokens.next() == Some("10") {
                        self.ten_bit = true;
                    }
                }
                "vrr" => {
                    if let Some(value) = tokens.next() {
                        match value.parse::<u8>().map_err(|e| e.to_string()).and_then(VrrMode::try_from) {
                            Ok(mode) => self.vrr_mode = mode,
                            Err(e) => warn!(monitor = %self.name, value = %value, error = %e, "Invalid vrr value, keeping previous mode"),
                        }
                    }
                }
                "sdrbrightness" => {
                    if let Some(value) = tokens.next() {
                        match value.parse() {
                            Ok(v) => self.sdr_brightness = v,
                            Err(_) => warn!(monitor = %self.name, value = %value, "Invalid sdrbrightness value"),
                        }
                    }
                }
                "sdrsaturation" => {
                    if let Some(value) = tokens.next() {
                        match value.parse() {
                            Ok(v) => self.sdr_saturation = v,
                            Err(_) => warn!(monitor = %self.name, value = %value, "Invalid sdrsaturation value"),
                        }
                    }
                }
                "mirror" => {
                    if let Some(target) = tokens.next() {
                        self.mirror_of = target.to_string();
                    }
                }
                "" | AUTO => {}
                other => self.transform = Transform::from(other),
            }
        }
    }
}

/// Parse one line. Returns `None` for anything that is not a well-formed
/// monitor directive.
pub fn parse_monitor_line(line: &str) -> Option<MonitorRule> {
    let body = line.trim().strip_prefix(MONITOR_PREFIX)?;
    let parts: Vec<&str> = body.split(',').collect();

    if parts.len() < MIN_MONITOR_FIELDS {
        debug!(line = %line.trim(), fields = parts.len(), "Skipping monitor line with too few fields");
        return None;
    }

    let name = parts[0].trim();
    if name.is_empty() {
        debug!(line = %line.trim(), "Skipping monitor line without a name");
        return None;
    }

    let mut rule = MonitorRule::new(name);
    rule.mode = parts[1].parse::<Mode>().ok();
    rule.position = parse_pair::<i32>(parts[2]);
    rule.scale = parts[3].trim().parse::<f64>().ok();
    rule.apply_options(&parts[MIN_MONITOR_FIELDS..]);

    Some(rule)
}

/// Parse a whole monitors file, preserving line order
pub fn parse_monitors(content: &str) -> Vec<MonitorRule> {
    content.lines().filter_map(parse_monitor_line).collect()
}

/// Render one display as a monitor directive (without trailing newline)
pub fn generate_monitor_line(display: &DisplayInfo) -> String {
    let mut line = format!(
        "{MONITOR_PREFIX}{},{}x{}@{:.2},{}x{},{:.2}",
        display.name,
        display.width,
        display.height,
        display.refresh_rate,
        display.x,
        display.y,
        display.scale,
    );

    // HDR and wide gamut share the cm option; HDR wins when both are set
    if display.hdr {
        if display.wide_gamut {
            let name = &display.name;
            warn!(monitor = %name, "HDR and wide gamut both enabled, writing HDR only");
        }
        let _ = write!(
            line,
            ",cm,hdr,sdrbrightness,{:.2},sdrsaturation,{:.2}",
            display.sdr_brightness, display.sdr_saturation
        );
    } else if display.wide_gamut {
        line.push_str(",cm,wide");
    }

    if display.ten_bit {
        line.push_str(",bitdepth,10");
    }

    if display.vrr_mode != VrrMode::Off {
        let _ = write!(line, ",vrr,{}", display.vrr_mode);
    }

    if !display.mirror_of.is_empty() {
        let _ = write!(line, ",mirror,{}", display.mirror_of);
    }

    if !display.transform.is_normal() && !display.transform.as_str().is_empty() {
        let _ = write!(line, ",{}", display.transform);
    }

    line
}

/// Render every display, one line each, in iteration order
pub fn generate_monitors(displays: &[DisplayInfo]) -> String {
    displays.iter().fold(String::new(), |mut content, display| {
        content.push_str(&generate_monitor_line(display));
        content.push('\n');
        content
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_display() -> DisplayInfo {
        let mut display = DisplayInfo::new("DP-2");
        display.width = 2560;
        display.height = 1440;
        display.refresh_rate = 143.97;
        display.x = 1920;
        display.y = -200;
        display.scale = 1.25;
        display.transform = Transform::Rotate270;
        display.mirror_of = "DP-1".to_string();
        display.hdr = true;
        display.ten_bit = true;
        display.sdr_brightness = 1.35;
        display.sdr_saturation = 0.85;
        display.vrr_mode = VrrMode::FullscreenOnly;
        display
    }

    fn assert_dsl_fields_eq(parsed: &DisplayInfo, expected: &DisplayInfo) {
        assert_eq!(parsed.name, expected.name);
        assert_eq!(parsed.width, expected.width);
        assert_eq!(parsed.height, expected.height);
        assert!((parsed.refresh_rate - expected.refresh_rate).abs() < 0.005);
        assert_eq!((parsed.x, parsed.y), (expected.x, expected.y));
        assert!((parsed.scale - expected.scale).abs() < 0.005);
        assert_eq!(parsed.transform, expected.transform);
        assert_eq!(parsed.mirror_of, expected.mirror_of);
        assert_eq!(parsed.hdr, expected.hdr);
        assert_eq!(parsed.ten_bit, expected.ten_bit);
        assert_eq!(parsed.vrr_mode, expected.vrr_mode);
        assert!((parsed.sdr_brightness - expected.sdr_brightness).abs() < 0.005);
        assert!((parsed.sdr_saturation - expected.sdr_saturation).abs() < 0.005);
    }

    #[test]
    fn test_parse_literal_hdr_line() {
        let rules = parse_monitors(
            "monitor=DP-1,1920x1080@60.00,0x0,1.00,cm,hdr,sdrbrightness,1.20,sdrsaturation,0.90,bitdepth,10,vrr,1",
        );
        assert_eq!(rules.len(), 1);
        let display = rules[0].to_display();

        assert_eq!(display.name, "DP-1");
        assert_eq!((display.width, display.height), (1920, 1080));
        assert_eq!(display.refresh_rate, 60.0);
        assert_eq!((display.x, display.y), (0, 0));
        assert_eq!(display.scale, 1.0);
        assert!(display.hdr);
        assert!(!display.wide_gamut);
        assert_eq!(display.sdr_brightness, 1.2);
        assert_eq!(display.sdr_saturation, 0.9);
        assert!(display.ten_bit);
        assert_eq!(display.vrr_mode, VrrMode::Global);
        assert_eq!(display.transform, Transform::Normal);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let content = "monitor=DP-1,1920x1080@60.00,0x0,1.00\nmonitor=DP-2,preferred\n";
        let rules = parse_monitors(content);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "DP-1");
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        let content = "\
# generated
$mainMod = SUPER
workspace=1,monitor:DP-1
   monitor=HDMI-A-1,1920x1080@60,0x0,1
";
        let rules = parse_monitors(content);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "HDMI-A-1");
    }

    #[test]
    fn test_non_numeric_fields_stay_absent() {
        let rule = parse_monitor_line("monitor=DP-3,preferred,auto,auto").unwrap();
        assert_eq!(rule.mode, None);
        assert_eq!(rule.position, None);
        assert_eq!(rule.scale, None);
        assert_eq!(rule.transform, Transform::Normal);
    }

    #[test]
    fn test_last_transform_token_wins() {
        let rule = parse_monitor_line("monitor=DP-1,1920x1080@60,0x0,1,90,auto,flipped").unwrap();
        assert_eq!(rule.transform, Transform::Flipped);
    }

    #[test]
    fn test_option_tokens_consume_their_argument() {
        let rule = parse_monitor_line("monitor=DP-1,1920x1080@60,0x0,1,mirror,180,cm,wide,bitdepth,8").unwrap();
        // 180 is the mirror target, 8 belongs to bitdepth; neither is a transform
        assert_eq!(rule.mirror_of, "180");
        assert!(rule.wide_gamut);
        assert!(!rule.ten_bit);
        assert_eq!(rule.transform, Transform::Normal);
    }

    #[test]
    fn test_invalid_vrr_value_keeps_default() {
        let rule = parse_monitor_line("monitor=DP-1,1920x1080@60,0x0,1,vrr,9").unwrap();
        assert_eq!(rule.vrr_mode, VrrMode::Off);
    }

    #[test]
    fn test_generate_literal_line() {
        let mut display = DisplayInfo::new("DP-1");
        display.width = 1920;
        display.height = 1080;
        display.refresh_rate = 60.0;
        display.hdr = true;
        display.sdr_brightness = 1.2;
        display.sdr_saturation = 0.9;
        display.ten_bit = true;
        display.vrr_mode = VrrMode::Global;

        assert_eq!(
            generate_monitor_line(&display),
            "monitor=DP-1,1920x1080@60.00,0x0,1.00,cm,hdr,sdrbrightness,1.20,sdrsaturation,0.90,bitdepth,10,vrr,1"
        );
    }

    #[test]
    fn test_generate_minimal_line_has_no_options() {
        let mut display = DisplayInfo::new("eDP-1");
        display.width = 2880;
        display.height = 1800;
        display.refresh_rate = 59.94;
        display.scale = 2.0;
        // sdr values are only written alongside hdr
        display.sdr_brightness = 1.5;
        assert_eq!(generate_monitor_line(&display), "monitor=eDP-1,2880x1800@59.94,0x0,2.00");
    }

    #[test]
    fn test_round_trip_preserves_dsl_fields() {
        let display = sample_display();
        let rules = parse_monitors(&generate_monitors(std::slice::from_ref(&display)));
        assert_eq!(rules.len(), 1);
        assert_dsl_fields_eq(&rules[0].to_display(), &display);
    }

    #[test]
    fn test_round_trip_wide_gamut_without_hdr() {
        let mut display = sample_display();
        display.hdr = false;
        display.wide_gamut = true;
        display.sdr_brightness = 1.0;
        display.sdr_saturation = 1.0;
        display.transform = Transform::Normal;
        display.mirror_of.clear();

        let parsed = parse_monitors(&generate_monitors(&[display.clone()]))[0].to_display();
        assert!(parsed.wide_gamut);
        assert!(!parsed.hdr);
        assert_dsl_fields_eq(&parsed, &display);
    }

    #[test]
    fn test_round_trip_hdr_takes_priority_over_wide_gamut() {
        let mut display = sample_display();
        display.wide_gamut = true;

        let parsed = parse_monitors(&generate_monitors(&[display]))[0].to_display();
        assert!(parsed.hdr);
        assert!(!parsed.wide_gamut);
    }

    #[test]
    fn test_round_trip_ignores_hardware_fields() {
        let mut display = sample_display();
        display.manufacturer = "Dell Inc.".to_string();
        display.serial = "ABC123".to_string();
        display.available_modes = vec!["2560x1440@143.97Hz".to_string()];
        display.vrr_capable = true;

        let parsed = parse_monitors(&generate_monitors(&[display]))[0].to_display();
        assert!(parsed.manufacturer.is_empty());
        assert!(parsed.serial.is_empty());
        assert!(parsed.available_modes.is_empty());
        assert!(!parsed.vrr_capable);
    }

    #[test]
    fn test_generate_preserves_order() {
        let mut a = DisplayInfo::new("B-second");
        a.width = 1;
        a.height = 1;
        let mut b = DisplayInfo::new("A-first");
        b.width = 1;
        b.height = 1;

        let content = generate_monitors(&[a, b]);
        let names: Vec<String> = parse_monitors(&content).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["B-second", "A-first"]);
    }
}
