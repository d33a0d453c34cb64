//! Freehand signature capture
//!
//! Turns a sequence of pointer positions into a raster PNG. Strokes are
//! rendered progressively as round-capped line segments so fast gestures
//! leave no gaps, with a bounded undo history of pre-stroke snapshots.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::collections::VecDeque;

/// Default canvas size, matching a 3:1 signature pad.
pub const DEFAULT_WIDTH: u32 = 900;
pub const DEFAULT_HEIGHT: u32 = 300;

/// Stroke thickness in canvas pixels.
const STROKE_WIDTH: f64 = 3.0;

/// Undo snapshots kept; oldest entries are evicted past this depth.
const HISTORY_DEPTH: usize = 50;

/// Spacing of disc stamps along a segment, in pixels.
const STAMP_STEP: f64 = 0.5;

/// An in-memory signature pad over an RGBA canvas.
pub struct SignaturePad {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    history: VecDeque<Vec<u8>>,
    last_point: Option<(f64, f64)>,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
            history: VecDeque::new(),
            last_point: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Start a stroke at a canvas position, snapshotting the current
    /// raster so the stroke can be undone as a unit.
    pub fn begin_stroke(&mut self, x: f64, y: f64) {
        self.history.push_back(self.pixels.clone());
        if self.history.len() > HISTORY_DEPTH {
            self.history.pop_front();
        }
        self.last_point = Some((x, y));
        self.stamp(x, y);
    }

    /// Extend the current stroke to a new position, drawing the full
    /// segment. Ignored when no stroke is in progress.
    pub fn extend_stroke(&mut self, x: f64, y: f64) {
        let Some((px, py)) = self.last_point else {
            return;
        };
        self.draw_segment(px, py, x, y);
        self.last_point = Some((x, y));
    }

    /// Finish the current stroke.
    pub fn end_stroke(&mut self) {
        self.last_point = None;
    }

    /// Undo the most recent stroke by restoring its pre-stroke snapshot.
    /// No-op once the history is exhausted.
    pub fn undo(&mut self) {
        if let Some(snapshot) = self.history.pop_back() {
            self.pixels = snapshot;
        }
        self.last_point = None;
    }

    /// Reset to a blank canvas and drop the undo history.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.history.clear();
        self.last_point = None;
    }

    /// Whether no pixel has ever been inked (or undo/clear returned to
    /// blank). Full alpha-channel scan; fine at signature-pad sizes.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Encode the canvas as PNG bytes, or `None` when blank.
    pub fn export(&self) -> Option<Vec<u8>> {
        if self.is_blank() {
            return None;
        }
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().ok()?;
            writer.write_image_data(&self.pixels).ok()?;
        }
        Some(out)
    }

    /// Export as a `data:image/png;base64,...` URI suitable for both
    /// live preview and storage, or `None` when blank.
    pub fn export_data_url(&self) -> Option<String> {
        self.export()
            .map(|png| format!("data:image/png;base64,{}", BASE64.encode(png)))
    }

    fn draw_segment(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        let dist = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let steps = (dist / STAMP_STEP).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            self.stamp(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
        }
    }

    /// Stamp a filled disc of the stroke radius, giving round caps and
    /// joins.
    fn stamp(&mut self, cx: f64, cy: f64) {
        let r = STROKE_WIDTH / 2.0;
        let x_min = ((cx - r).floor().max(0.0)) as u32;
        let y_min = ((cy - r).floor().max(0.0)) as u32;
        let x_max = ((cx + r).ceil().min(self.width as f64 - 1.0)).max(0.0) as u32;
        let y_max = ((cy + r).ceil().min(self.height as f64 - 1.0)).max(0.0) as u32;
        if cx + r < 0.0 || cy + r < 0.0 {
            return;
        }
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    let idx = ((y * self.width + x) * 4) as usize;
                    // Opaque black ink.
                    self.pixels[idx] = 0;
                    self.pixels[idx + 1] = 0;
                    self.pixels[idx + 2] = 0;
                    self.pixels[idx + 3] = 255;
                }
            }
        }
    }
}

/// Decode a `data:image/png;base64,...` URI back to PNG bytes.
pub fn png_from_data_url(data_url: &str) -> Option<Vec<u8>> {
    let encoded = data_url.strip_prefix("data:image/png;base64,")?;
    BASE64.decode(encoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_stroke(pad: &mut SignaturePad, from: (f64, f64), to: (f64, f64)) {
        pad.begin_stroke(from.0, from.1);
        pad.extend_stroke(to.0, to.1);
        pad.end_stroke();
    }

    #[test]
    fn blank_pad_exports_none() {
        let pad = SignaturePad::new(100, 40);
        assert!(pad.is_blank());
        assert!(pad.export().is_none());
        assert!(pad.export_data_url().is_none());
    }

    #[test]
    fn stroke_produces_png() {
        let mut pad = SignaturePad::new(100, 40);
        draw_stroke(&mut pad, (10.0, 10.0), (80.0, 30.0));
        assert!(!pad.is_blank());

        let png = pad.export().unwrap();
        // PNG magic bytes.
        assert!(png.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
    }

    #[test]
    fn fast_gesture_leaves_no_gaps() {
        let mut pad = SignaturePad::new(100, 40);
        // One long segment; every column it crosses must be inked.
        draw_stroke(&mut pad, (5.0, 20.0), (95.0, 20.0));
        for x in 5..95 {
            let idx = ((20 * pad.width() + x) * 4 + 3) as usize;
            assert_ne!(pad.pixels[idx], 0, "gap at column {}", x);
        }
    }

    #[test]
    fn clear_returns_to_blank() {
        let mut pad = SignaturePad::new(100, 40);
        draw_stroke(&mut pad, (10.0, 10.0), (80.0, 30.0));
        pad.clear();
        assert!(pad.export().is_none());
        // History is gone too: undo after clear changes nothing.
        pad.undo();
        assert!(pad.is_blank());
    }

    #[test]
    fn undo_of_only_stroke_exports_none() {
        let mut pad = SignaturePad::new(100, 40);
        draw_stroke(&mut pad, (10.0, 10.0), (80.0, 30.0));
        pad.undo();
        assert!(pad.export().is_none());
    }

    #[test]
    fn undo_removes_one_stroke_at_a_time() {
        let mut pad = SignaturePad::new(100, 40);
        draw_stroke(&mut pad, (10.0, 10.0), (40.0, 10.0));
        draw_stroke(&mut pad, (10.0, 30.0), (40.0, 30.0));

        pad.undo();
        assert!(!pad.is_blank());
        pad.undo();
        assert!(pad.is_blank());
    }

    #[test]
    fn history_is_bounded() {
        let mut pad = SignaturePad::new(100, 40);
        for i in 0..60 {
            let y = 1.0 + (i as f64) / 2.0;
            draw_stroke(&mut pad, (10.0, y), (40.0, y));
        }
        // Only the most recent snapshots survive; undoing past the
        // bound cannot reach the blank canvas again.
        for _ in 0..60 {
            pad.undo();
        }
        assert!(!pad.is_blank());
    }

    #[test]
    fn extend_without_begin_is_noop() {
        let mut pad = SignaturePad::new(100, 40);
        pad.extend_stroke(50.0, 20.0);
        assert!(pad.is_blank());
    }

    #[test]
    fn out_of_bounds_points_are_clipped() {
        let mut pad = SignaturePad::new(100, 40);
        draw_stroke(&mut pad, (-20.0, -20.0), (120.0, 60.0));
        // Does not panic, and the on-canvas portion is inked.
        assert!(!pad.is_blank());
    }

    #[test]
    fn data_url_round_trips() {
        let mut pad = SignaturePad::new(100, 40);
        draw_stroke(&mut pad, (10.0, 10.0), (80.0, 30.0));
        let url = pad.export_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(png_from_data_url(&url).unwrap(), pad.export().unwrap());
    }

    #[test]
    fn rejects_non_png_data_url() {
        assert!(png_from_data_url("data:image/jpeg;base64,AAAA").is_none());
        assert!(png_from_data_url("data:image/png;base64,!!notbase64!!").is_none());
    }
}
