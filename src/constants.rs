//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// External control utility (`hyprctl`) invocation constants
pub mod hyprctl {
    /// Name of the compositor control binary
    pub const BINARY: &str = "hyprctl";

    /// Default timeout for a single invocation, in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

    /// Flag requesting JSON output
    pub const JSON_FLAG: &str = "-j";

    /// Monitor enumeration query
    pub const MONITORS: &str = "monitors";

    /// Include disabled monitors in the enumeration
    pub const ALL: &str = "all";

    /// Version query used as the connectivity probe
    pub const VERSION: &str = "version";

    /// Dispatcher invocation
    pub const DISPATCH: &str = "dispatch";

    /// Dispatch keyword used to set configuration values at runtime
    pub const KEYWORD: &str = "keyword";

    /// Configuration reload command
    pub const RELOAD: &str = "reload";
}

/// Connectivity polling (the only retried operation)
pub mod reconnect {
    /// Maximum number of probe attempts before giving up
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Interval between probe attempts, in milliseconds
    pub const INTERVAL_MS: u64 = 5000;
}

/// Monitor and workspace configuration DSL
pub mod dsl {
    /// Prefix of a monitor directive
    pub const MONITOR_PREFIX: &str = "monitor=";

    /// Prefix of a workspace directive
    pub const WORKSPACE_PREFIX: &str = "workspace=";

    /// Prefix of the monitor reference inside a workspace directive
    pub const WORKSPACE_MONITOR_PREFIX: &str = "monitor:";

    /// Minimum number of comma-separated fields in a monitor directive
    pub const MIN_MONITOR_FIELDS: usize = 4;

    /// Minimum number of comma-separated fields in a workspace directive
    pub const MIN_WORKSPACE_FIELDS: usize = 2;

    /// Token that never sets a transform
    pub const AUTO: &str = "auto";
}

/// Field-level limits enforced by the validator
pub mod validation {
    /// Maximum refresh rate in Hz (inclusive)
    pub const MAX_REFRESH_RATE: f64 = 360.0;

    /// Maximum scale factor (inclusive)
    pub const MAX_SCALE: f64 = 5.0;

    /// Bound on absolute logical coordinates (inclusive)
    pub const MAX_COORDINATE: i32 = 10000;

    /// Upper bound accepted for SDR brightness / saturation multipliers
    pub const MAX_SDR_MULTIPLIER: f64 = 2.0;

    /// Largest valid VRR mode value
    pub const MAX_VRR_MODE: u8 = 2;
}

/// Interactive arrangement canvas
pub mod canvas {
    /// Margin reserved on each side of the canvas, in canvas pixels
    pub const MARGIN: f64 = 10.0;

    /// Default canvas width
    pub const DEFAULT_WIDTH: f64 = 800.0;

    /// Default canvas height
    pub const DEFAULT_HEIGHT: f64 = 400.0;

    /// Default edge snap threshold in logical pixels (0 = disabled)
    pub const DEFAULT_SNAP_THRESHOLD: u32 = 0;
}

/// Settings and backup file locations
pub mod config {
    /// Directory name under the user's config dir
    pub const APP_DIR: &str = "hyprdisplays";

    /// Settings filename
    pub const FILENAME: &str = "settings.json";

    /// Backup directory name under APP_DIR
    pub const BACKUP_DIR: &str = "backups";

    /// Compositor config directory under the user's config dir
    pub const HYPR_DIR: &str = "hypr";

    /// Default monitors DSL filename
    pub const MONITORS_FILE: &str = "monitors.conf";

    /// Default workspaces DSL filename
    pub const WORKSPACES_FILE: &str = "workspaces.conf";
}

/// Backup bundle naming
pub mod backup {
    /// Filename prefix of every backup
    pub const PREFIX: &str = "hyprdisplays_backup_";

    /// Filename extension of every backup
    pub const EXTENSION: &str = ".json";

    /// chrono format of the fixed-width date-time embedded in the filename
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Length of the formatted timestamp (YYYYMMDD_HHMMSS)
    pub const TIMESTAMP_LEN: usize = 15;

    /// Bundle format version
    pub const VERSION: &str = "1.0.0";

    /// Default number of backups kept after pruning
    pub const DEFAULT_MAX_BACKUPS: usize = 5;
}
