// src/services/region.rs
use serde::{Deserialize, Serialize};

/// Pixel rectangle handed to the inpainting backend as a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Inclusive ranges of rows and columns on a 3x3 grid named by a region text.
#[derive(Debug, Default, PartialEq)]
struct GridHint {
    rows: Option<(usize, usize)>,
    cols: Option<(usize, usize)>,
}

impl GridHint {
    fn is_localized(&self) -> bool {
        self.rows.is_some() || self.cols.is_some()
    }
}

const TOP_WORDS: &[&str] = &["top", "upper", "above", "sky", "ceiling", "overhead"];
const BOTTOM_WORDS: &[&str] = &[
    "bottom",
    "lower",
    "below",
    "foreground",
    "ground",
    "floor",
    "feet",
];
const CENTER_WORDS: &[&str] = &["middle", "center", "centre", "central"];
const SUBJECT_WORDS: &[&str] = &["face", "subject", "person", "eyes", "portrait", "skin"];

impl MaskRegion {
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Maps an analyzer region such as "top-left sky" to pixels. Unrecognised
    /// text covers the whole frame. Returns `None` when dimensions are unknown.
    pub fn locate(region: &str, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let hint = grid_hint(region);
        if !hint.is_localized() {
            return Some(Self::full_frame(width, height));
        }
        Some(Self::from_hint(&hint, width, height))
    }

    /// Like `locate`, but only when the feedback actually names a place in the frame.
    pub fn from_feedback(feedback: &str, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let hint = grid_hint(feedback);
        hint.is_localized()
            .then(|| Self::from_hint(&hint, width, height))
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn from_hint(hint: &GridHint, width: u32, height: u32) -> Self {
        let (row_lo, row_hi) = hint.rows.unwrap_or((0, 2));
        let (col_lo, col_hi) = hint.cols.unwrap_or((0, 2));
        let (y, h) = span(row_lo, row_hi, height);
        let (x, w) = span(col_lo, col_hi, width);
        Self {
            x,
            y,
            width: w,
            height: h,
        }
    }
}

/// Start and length of grid cells `lo..=hi` along one axis, padded by 5%.
fn span(lo: usize, hi: usize, extent: u32) -> (u32, u32) {
    let extent_u = extent as u64;
    let pad = extent_u / 20;
    let start = (lo as u64 * extent_u / 3).saturating_sub(pad);
    let end = ((hi as u64 + 1) * extent_u / 3 + pad).min(extent_u);
    (start as u32, (end - start).max(1) as u32)
}

fn grid_hint(text: &str) -> GridHint {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |set: &[&str]| words.iter().any(|w| set.contains(w));

    let mut rows = Vec::new();
    let mut cols = Vec::new();

    if has(TOP_WORDS) {
        rows.push(0);
    }
    if has(BOTTOM_WORDS) {
        rows.push(2);
    }
    if words.contains(&"left") {
        cols.push(0);
    }
    if words.contains(&"right") {
        cols.push(2);
    }
    if has(CENTER_WORDS) {
        // "center" alone is the middle cell; next to another word it only
        // narrows the axis that word left open.
        if rows.is_empty() {
            rows.push(1);
        }
        if cols.is_empty() {
            cols.push(1);
        }
    }
    if has(SUBJECT_WORDS) && rows.is_empty() && cols.is_empty() {
        rows.push(1);
        cols.push(1);
    }

    GridHint {
        rows: bounds(&rows),
        cols: bounds(&cols),
    }
}

fn bounds(cells: &[usize]) -> Option<(usize, usize)> {
    let lo = cells.iter().min()?;
    let hi = cells.iter().max()?;
    Some((*lo, *hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_left_sky_lands_in_upper_left_cell() {
        let mask = MaskRegion::locate("top-left sky", 900, 600).unwrap();
        assert_eq!(mask.x, 0);
        assert_eq!(mask.y, 0);
        // one third plus 5% padding
        assert_eq!(mask.width, 345);
        assert_eq!(mask.height, 230);
    }

    #[test]
    fn bottom_strip_spans_full_width() {
        let mask = MaskRegion::locate("foreground rocks", 900, 600).unwrap();
        assert_eq!(mask.x, 0);
        assert_eq!(mask.width, 900);
        assert_eq!(mask.y, 370);
        assert_eq!(mask.y + mask.height, 600);
    }

    #[test]
    fn unrecognised_region_covers_the_frame() {
        let mask = MaskRegion::locate("everywhere", 640, 480).unwrap();
        assert_eq!(mask, MaskRegion::full_frame(640, 480));
    }

    #[test]
    fn unknown_dimensions_give_no_mask() {
        assert!(MaskRegion::locate("top", 0, 480).is_none());
        assert!(MaskRegion::from_feedback("brighten the sky", 640, 0).is_none());
    }

    #[test]
    fn feedback_without_place_is_not_localized() {
        assert!(MaskRegion::from_feedback("make it warmer overall", 640, 480).is_none());
        assert!(MaskRegion::from_feedback("remove the sign on the right", 640, 480).is_some());
    }

    #[test]
    fn subject_words_pick_the_center_cell() {
        let mask = MaskRegion::from_feedback("soften the subject's skin", 300, 300).unwrap();
        assert_eq!(mask.x, 85);
        assert_eq!(mask.y, 85);
        assert!(mask.area() < 300 * 300);
    }
}
