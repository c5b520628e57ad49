//! Logical desktop space <-> visual canvas mapping
//!
//! The five transform parameters are computed once per rebuild (snapshot
//! refresh or canvas resize) and then frozen, so every edit between two
//! rebuilds maps through exactly the same function in both directions.

use thiserror::Error;
use tracing::debug;

use crate::constants::canvas::MARGIN;
use crate::types::DisplayInfo;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("No displays to lay out")]
    Empty,

    #[error("Displays span zero area ({width}x{height})")]
    Degenerate { width: i64, height: i64 },

    #[error("Canvas {width}x{height} leaves no room inside the margin")]
    CanvasTooSmall { width: f64, height: f64 },
}

/// Axis-aligned rectangle in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Logical bounding box of a display set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl Bounds {
    pub fn of(displays: &[DisplayInfo]) -> Option<Self> {
        let first = displays.first()?;
        let initial = Bounds {
            min_x: first.x as i64,
            min_y: first.y as i64,
            max_x: first.right(),
            max_y: first.bottom(),
        };
        Some(displays.iter().skip(1).fold(initial, |b, d| Bounds {
            min_x: b.min_x.min(d.x as i64),
            min_y: b.min_y.min(d.y as i64),
            max_x: b.max_x.max(d.right()),
            max_y: b.max_y.max(d.bottom()),
        }))
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }
}

/// Uniform scale plus centering offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasTransform {
    pub min_x: f64,
    pub min_y: f64,
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl CanvasTransform {
    /// Fit `displays` into a `canvas_width` x `canvas_height` canvas,
    /// aspect preserved, with `MARGIN` reserved on every side
    pub fn fit(displays: &[DisplayInfo], canvas_width: f64, canvas_height: f64) -> Result<Self, LayoutError> {
        let bounds = Bounds::of(displays).ok_or(LayoutError::Empty)?;
        let (span_x, span_y) = (bounds.width(), bounds.height());
        if span_x <= 0 || span_y <= 0 {
            return Err(LayoutError::Degenerate { width: span_x, height: span_y });
        }

        let usable_w = canvas_width - 2.0 * MARGIN;
        let usable_h = canvas_height - 2.0 * MARGIN;
        if !(usable_w > 0.0 && usable_h > 0.0) {
            return Err(LayoutError::CanvasTooSmall {
                width: canvas_width,
                height: canvas_height,
            });
        }

        let scale = (usable_w / span_x as f64).min(usable_h / span_y as f64);
        let transform = CanvasTransform {
            min_x: bounds.min_x as f64,
            min_y: bounds.min_y as f64,
            scale,
            offset_x: (canvas_width - span_x as f64 * scale) / 2.0,
            offset_y: (canvas_height - span_y as f64 * scale) / 2.0,
        };
        debug!(
            scale = transform.scale,
            offset_x = transform.offset_x,
            offset_y = transform.offset_y,
            "Rebuilt canvas transform"
        );
        Ok(transform)
    }

    pub fn to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.offset_x + (x - self.min_x) * self.scale,
            self.offset_y + (y - self.min_y) * self.scale,
        )
    }

    pub fn to_logical_f64(&self, vx: f64, vy: f64) -> (f64, f64) {
        (
            (vx - self.offset_x) / self.scale + self.min_x,
            (vy - self.offset_y) / self.scale + self.min_y,
        )
    }

    /// Inverse mapping rounded to the nearest logical pixel
    pub fn to_logical(&self, vx: f64, vy: f64) -> (i32, i32) {
        let (x, y) = self.to_logical_f64(vx, vy);
        (x.round() as i32, y.round() as i32)
    }

    pub fn rect(&self, display: &DisplayInfo) -> CanvasRect {
        let (x, y) = self.to_canvas(display.x as f64, display.y as f64);
        CanvasRect {
            x,
            y,
            width: display.width as f64 * self.scale,
            height: display.height as f64 * self.scale,
        }
    }
}

/// Translate the set so min(x) and min(y) both become 0
pub fn normalize_to_origin(displays: &mut [DisplayInfo]) {
    let Some(bounds) = Bounds::of(displays) else {
        return;
    };
    if bounds.min_x == 0 && bounds.min_y == 0 {
        return;
    }
    for display in displays.iter_mut() {
        display.x = (display.x as i64 - bounds.min_x) as i32;
        display.y = (display.y as i64 - bounds.min_y) as i32;
    }
    debug!(dx = -bounds.min_x, dy = -bounds.min_y, "Normalized layout to origin");
}

/// A canvas of fixed size with its transform frozen until the next rebuild
#[derive(Debug, Clone)]
pub struct Canvas {
    width: f64,
    height: f64,
    transform: Option<CanvasTransform>,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            transform: None,
        }
    }

    /// Recompute the transform from the current set
    pub fn rebuild(&mut self, displays: &[DisplayInfo]) -> Result<CanvasTransform, LayoutError> {
        let transform = CanvasTransform::fit(displays, self.width, self.height);
        self.transform = transform.as_ref().ok().copied();
        transform
    }

    pub fn resize(&mut self, width: f64, height: f64, displays: &[DisplayInfo]) -> Result<CanvasTransform, LayoutError> {
        self.width = width;
        self.height = height;
        self.rebuild(displays)
    }

    /// The frozen transform, if a rebuild has succeeded
    pub fn transform(&self) -> Option<&CanvasTransform> {
        self.transform.as_ref()
    }
}
