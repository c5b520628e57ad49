use crate::types::DisplayInfo;

/// Display rectangle in logical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn left(&self) -> i64 {
        self.x
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn top(&self) -> i64 {
        self.y
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }
}

impl From<&DisplayInfo> for Rect {
    fn from(display: &DisplayInfo) -> Self {
        Rect {
            x: display.x as i64,
            y: display.y as i64,
            width: display.width as i64,
            height: display.height as i64,
        }
    }
}

#[derive(Debug)]
struct SnapCandidate {
    offset: i64,
    distance: i64,
}

/// Find the best snap position for a moved display
/// Returns (x, y) if snapping should occur, None otherwise
pub fn find_snap_position(moved: Rect, others: &[Rect], threshold: u32) -> Option<(i64, i64)> {
    if threshold == 0 {
        return None; // Snapping disabled
    }

    let mut best_x: Option<SnapCandidate> = None;
    let mut best_y: Option<SnapCandidate> = None;
    let threshold = threshold as i64;

    for other in others {
        // Left edge to right edge of other, right to left, then alignment
        check_snap(&mut best_x, moved.left(), other.right(), threshold);
        check_snap(&mut best_x, moved.right(), other.left(), threshold);
        check_snap(&mut best_x, moved.left(), other.left(), threshold);
        check_snap(&mut best_x, moved.right(), other.right(), threshold);

        check_snap(&mut best_y, moved.top(), other.bottom(), threshold);
        check_snap(&mut best_y, moved.bottom(), other.top(), threshold);
        check_snap(&mut best_y, moved.top(), other.top(), threshold);
        check_snap(&mut best_y, moved.bottom(), other.bottom(), threshold);
    }

    let snap_x = best_x.map(|s| moved.x + s.offset);
    let snap_y = best_y.map(|s| moved.y + s.offset);

    match (snap_x, snap_y) {
        (Some(x), Some(y)) => Some((x, y)),
        (Some(x), None) => Some((x, moved.y)),
        (None, Some(y)) => Some((moved.x, y)),
        (None, None) => None,
    }
}

fn check_snap(best: &mut Option<SnapCandidate>, edge: i64, target: i64, threshold: i64) {
    let distance = (edge - target).abs();
    if distance <= threshold {
        let candidate = SnapCandidate {
            offset: target - edge,
            distance,
        };

        // Keep this candidate if it's closer than the current best
        if best.as_ref().is_none_or(|b| candidate.distance < b.distance) {
            *best = Some(candidate);
        }
    }
}
