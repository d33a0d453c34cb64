//! Geometry model for signature boxes
//!
//! Boxes are stored in normalized page coordinates: center position and
//! width in percent, with a top-down y axis matching the on-screen
//! convention. These functions convert a box to the pixel rectangle to
//! draw in PDF space (origin bottom-left, y increasing upward) and apply
//! interactive drag/resize edits. All functions are pure and total over
//! constructor-validated boxes.

use crate::model::SignatureBox;

/// Narrowest allowed box, percent of page width.
pub const MIN_WIDTH_PCT: f64 = 10.0;
/// Widest allowed box, percent of page width.
pub const MAX_WIDTH_PCT: f64 = 80.0;

/// Pixel rectangle in PDF coordinate space; `x`/`y` are the lower-left
/// corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Corner grabbed during a resize gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    fn is_right(self) -> bool {
        matches!(self, Corner::TopRight | Corner::BottomRight)
    }
}

/// Widest width (percent) whose derived height still fits the page.
pub(crate) fn max_width_pct(aspect_ratio: f64) -> f64 {
    MAX_WIDTH_PCT.min(100.0 * aspect_ratio)
}

pub(crate) fn clamp_width(width: f64, aspect_ratio: f64) -> f64 {
    let max = max_width_pct(aspect_ratio).max(MIN_WIDTH_PCT);
    width.clamp(MIN_WIDTH_PCT, max)
}

/// Clamp a center coordinate so the half-extent stays inside `[0,100]`.
pub(crate) fn clamp_axis(center: f64, half_extent: f64) -> f64 {
    if half_extent >= 50.0 {
        // Extent covers the whole axis; the only valid center is the middle.
        50.0
    } else {
        center.clamp(half_extent, 100.0 - half_extent)
    }
}

/// Pixel rectangle for a box on a page of the given dimensions.
///
/// The normalized `y` is measured top-down while PDF pages are bottom-up,
/// so the vertical placement flips here.
pub fn pixel_rect(bx: &SignatureBox, page_width: f64, page_height: f64) -> PixelRect {
    let width = bx.width / 100.0 * page_width;
    let height = width / bx.aspect_ratio;
    PixelRect {
        x: bx.x / 100.0 * page_width - width / 2.0,
        y: page_height - bx.y / 100.0 * page_height - height / 2.0,
        width,
        height,
    }
}

/// Move a box by a percentage delta, keeping it fully on the page.
///
/// Each axis clamps independently, so no intermediate out-of-bounds
/// state is ever produced mid-gesture.
pub fn apply_drag(bx: &SignatureBox, dx_pct: f64, dy_pct: f64) -> SignatureBox {
    let half_w = bx.width / 2.0;
    let half_h = bx.height_pct() / 2.0;
    SignatureBox {
        x: clamp_axis(bx.x + dx_pct, half_w),
        y: clamp_axis(bx.y + dy_pct, half_h),
        ..bx.clone()
    }
}

/// Resize a box from one corner, keeping the center fixed.
///
/// The aspect ratio is fixed, so width is the only resize degree of
/// freedom: the width changes by twice the horizontal pointer delta
/// (dragging the right edge outward moves the left edge outward too) and
/// the vertical delta is ignored for every corner. The result is clamped
/// into the allowed width range and the center re-clamped so the grown
/// rectangle never exits the page.
pub fn apply_resize(bx: &SignatureBox, corner: Corner, dx_pct: f64, _dy_pct: f64) -> SignatureBox {
    let delta = if corner.is_right() { dx_pct } else { -dx_pct };
    let width = clamp_width(bx.width + 2.0 * delta, bx.aspect_ratio);
    let half_w = width / 2.0;
    let half_h = width / bx.aspect_ratio / 2.0;
    SignatureBox {
        x: clamp_axis(bx.x, half_w),
        y: clamp_axis(bx.y, half_h),
        width,
        ..bx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_box() -> SignatureBox {
        SignatureBox::new("doc-1", "a@example.com", 1, 50.0, 50.0, 30.0, 3.0).unwrap()
    }

    #[test]
    fn pixel_rect_worked_example() {
        // {x:50, y:50, width:30, aspect:3} on a 600x800 page.
        let rect = pixel_rect(&sample_box(), 600.0, 800.0);
        assert_eq!(rect.width, 180.0);
        assert_eq!(rect.height, 60.0);
        assert_eq!(rect.x, 210.0);
        assert_eq!(rect.y, 370.0);
    }

    #[test]
    fn pixel_rect_flips_y_axis() {
        // A box near the top of the screen lands near the top of the
        // PDF page, which is high y in PDF space.
        let near_top = SignatureBox::new("d", "a@x.com", 1, 50.0, 10.0, 30.0, 3.0).unwrap();
        let near_bottom = SignatureBox::new("d", "a@x.com", 1, 50.0, 90.0, 30.0, 3.0).unwrap();
        let top_rect = pixel_rect(&near_top, 600.0, 800.0);
        let bottom_rect = pixel_rect(&near_bottom, 600.0, 800.0);
        assert!(top_rect.y > bottom_rect.y);
    }

    #[test]
    fn drag_moves_center() {
        let moved = apply_drag(&sample_box(), 10.0, -5.0);
        assert_eq!(moved.x, 60.0);
        assert_eq!(moved.y, 45.0);
        assert_eq!(moved.width, 30.0);
    }

    #[test]
    fn drag_clamps_at_edges() {
        let moved = apply_drag(&sample_box(), 1000.0, 1000.0);
        assert_eq!(moved.x, 85.0);
        assert_eq!(moved.y, 95.0);

        let moved = apply_drag(&sample_box(), -1000.0, -1000.0);
        assert_eq!(moved.x, 15.0);
        assert_eq!(moved.y, 5.0);
    }

    #[test]
    fn resize_right_corner_grows_with_positive_dx() {
        let resized = apply_resize(&sample_box(), Corner::BottomRight, 5.0, 0.0);
        assert_eq!(resized.width, 40.0);
        assert_eq!(resized.x, 50.0);
    }

    #[test]
    fn resize_left_corner_grows_with_negative_dx() {
        let resized = apply_resize(&sample_box(), Corner::TopLeft, -5.0, 0.0);
        assert_eq!(resized.width, 40.0);
    }

    #[test]
    fn resize_ignores_vertical_delta() {
        let a = apply_resize(&sample_box(), Corner::TopRight, 5.0, 0.0);
        let b = apply_resize(&sample_box(), Corner::TopRight, 5.0, 40.0);
        assert_eq!(a, b);
    }

    #[test]
    fn resize_clamps_width() {
        let resized = apply_resize(&sample_box(), Corner::BottomRight, 100.0, 0.0);
        assert_eq!(resized.width, MAX_WIDTH_PCT);

        let resized = apply_resize(&sample_box(), Corner::BottomRight, -100.0, 0.0);
        assert_eq!(resized.width, MIN_WIDTH_PCT);
    }

    #[test]
    fn resize_near_edge_pushes_center_back_in() {
        // A box hugging the right edge must slide left as it grows.
        let bx = SignatureBox::new("d", "a@x.com", 1, 85.0, 50.0, 30.0, 3.0).unwrap();
        let resized = apply_resize(&bx, Corner::BottomRight, 25.0, 0.0);
        assert_eq!(resized.width, 80.0);
        assert!(resized.x + resized.width / 2.0 <= 100.0);
    }

    #[test]
    fn resize_caps_width_for_tall_aspect_ratios() {
        // Aspect 0.5: height is twice the width, so width beyond 50%
        // would push the height past the page.
        let bx = SignatureBox::new("d", "a@x.com", 1, 50.0, 50.0, 20.0, 0.5).unwrap();
        let resized = apply_resize(&bx, Corner::BottomRight, 100.0, 0.0);
        assert_eq!(resized.width, 50.0);
        assert_eq!(resized.height_pct(), 100.0);
    }
}
