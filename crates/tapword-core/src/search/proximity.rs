use std::collections::HashMap;

use crate::codec::to_lower;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_sq(self, other: TouchPoint) -> f32 {
        let (dx, dy) = (self.x - other.x, self.y - other.y);
        dx * dx + dy * dy
    }
}

/// Maps a touch position to how plausibly it meant a given key.
///
/// Supplied by the host per call; the engine only consumes it.
pub trait ProximityModel: Send + Sync {
    /// Cost in `[0, 1]` of reading `point` as `code_point`: 0 at the key
    /// centre, growing with distance. `None` when the key is out of reach
    /// or not on the layout.
    fn cost(&self, point: TouchPoint, code_point: u32) -> Option<f32>;
}

/// No layout: only the typed code points themselves are considered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProximity;

impl ProximityModel for NoProximity {
    fn cost(&self, _point: TouchPoint, _code_point: u32) -> Option<f32> {
        None
    }
}

/// Keys as centres on a plane; cost is squared distance normalised by the
/// reach radius.
#[derive(Debug, Clone)]
pub struct KeyGridProximity {
    centers: HashMap<u32, TouchPoint>,
    radius_sq: f32,
}

impl KeyGridProximity {
    /// Keys reachable within `radius` (layout units) of their centre.
    pub fn new(radius: f32) -> Self {
        Self {
            centers: HashMap::new(),
            radius_sq: radius * radius,
        }
    }

    /// Lay out rows of keys on a `key_width` × `key_height` grid, each row
    /// shifted right by `row_offset` key widths relative to the previous one.
    /// Reach is 1.5 key widths.
    pub fn from_rows(rows: &[&str], key_width: f32, key_height: f32, row_offset: f32) -> Self {
        let mut grid = Self::new(key_width * 1.5);
        for (r, row) in rows.iter().enumerate() {
            let shift = r as f32 * row_offset * key_width;
            for (c, ch) in row.chars().enumerate() {
                let center = TouchPoint::new(
                    shift + (c as f32 + 0.5) * key_width,
                    (r as f32 + 0.5) * key_height,
                );
                grid.insert(u32::from(ch), center);
            }
        }
        grid
    }

    pub fn insert(&mut self, code_point: u32, center: TouchPoint) {
        self.centers.insert(to_lower(code_point), center);
    }

    pub fn key_center(&self, code_point: u32) -> Option<TouchPoint> {
        self.centers.get(&to_lower(code_point)).copied()
    }
}

impl ProximityModel for KeyGridProximity {
    fn cost(&self, point: TouchPoint, code_point: u32) -> Option<f32> {
        let center = self.key_center(code_point)?;
        let d = point.distance_sq(center);
        (d <= self.radius_sq).then(|| d / self.radius_sq)
    }
}
