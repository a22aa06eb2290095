//! Pointer input adapters. They turn raw drags into discrete session calls.

use crate::navigation::Direction;

/// Fraction of the width on each side where a swipe may start.
pub const EDGE_FRACTION: f32 = 0.2;
pub const MIN_SWIPE_COLUMNS: u16 = 6;
pub const PULL_THRESHOLD_ROWS: u16 = 3;
pub const NEAR_BOTTOM_ROWS: usize = 5;

/// A leftward drag starting in the right edge zone means next, a rightward
/// drag from the left edge zone means previous.
pub fn classify_swipe(start_x: u16, end_x: u16, width: u16, min_distance: u16) -> Option<Direction> {
    if width == 0 {
        return None;
    }
    let width_f = f32::from(width);
    let start = f32::from(start_x);
    if end_x < start_x {
        let moved = start_x - end_x;
        if moved >= min_distance && start > width_f * (1.0 - EDGE_FRACTION) {
            return Some(Direction::Next);
        }
    } else if end_x > start_x {
        let moved = end_x - start_x;
        if moved >= min_distance && start < width_f * EDGE_FRACTION {
            return Some(Direction::Prev);
        }
    }
    None
}

/// Tracks one vertical drag and reports whether releasing it should refresh.
#[derive(Debug, Clone)]
pub struct PullToRefresh {
    threshold: u16,
    origin: Option<u16>,
}

impl Default for PullToRefresh {
    fn default() -> Self {
        Self::new(PULL_THRESHOLD_ROWS)
    }
}

impl PullToRefresh {
    pub fn new(threshold: u16) -> Self {
        Self {
            threshold,
            origin: None,
        }
    }

    pub fn press(&mut self, row: u16) {
        self.origin = Some(row);
    }

    pub fn cancel(&mut self) {
        self.origin = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.origin.is_some()
    }

    pub fn release(&mut self, row: u16, at_top: bool, loading: bool) -> bool {
        let Some(origin) = self.origin.take() else {
            return false;
        };
        if !at_top || loading || row <= origin {
            return false;
        }
        row - origin >= self.threshold
    }
}

/// True once the viewport bottom is within [`NEAR_BOTTOM_ROWS`] of the content end.
pub fn near_bottom(offset: usize, viewport: usize, content: usize) -> bool {
    offset + viewport + NEAR_BOTTOM_ROWS >= content
}
