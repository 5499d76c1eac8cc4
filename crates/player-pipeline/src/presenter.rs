// crates/player-pipeline/src/presenter.rs
//
// Blits a decoded video Frame onto the host-owned VideoSurface (spec.md
// §4.6, "Presenter"). Frames already carry a pre-scaled RGBA rendition —
// scaling to the surface's pixel format happened once at decode time via
// `Scaler`; what's left here is aspect-preserving placement plus the
// stride-aware row copy.

use player_core::{Frame, PlayerError};
use player_codec::VideoSurface;

pub struct Presenter {
    surface: Box<dyn VideoSurface>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Aspect-preserving "contain" rect: `src` scaled by its sample aspect
/// ratio, centered within `(dst_w, dst_h)`.
fn aspect_fit(src_w: u32, src_h: u32, sar: f64, dst_w: u32, dst_h: u32) -> Rect {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return Rect { x: 0, y: 0, w: 0, h: 0 };
    }
    let sar = if sar > 0.0 { sar } else { 1.0 };
    let aspect = (src_w as f64 * sar) / src_h as f64;

    let mut w = dst_w as f64;
    let mut h = w / aspect;
    if h > dst_h as f64 {
        h = dst_h as f64;
        w = h * aspect;
    }
    let x = ((dst_w as f64 - w) / 2.0).max(0.0);
    let y = ((dst_h as f64 - h) / 2.0).max(0.0);
    Rect { x: x as u32, y: y as u32, w: w as u32, h: h as u32 }
}

/// Nearest-neighbor row-by-row copy of `src` (tightly packed RGBA) into
/// `dst` at `rect`, honoring `dst`'s stride in pixels.
fn blit_rgba(src: &[u8], src_w: u32, src_h: u32, dst: &mut [u8], stride_px: usize, rect: Rect) {
    if rect.w == 0 || rect.h == 0 {
        return;
    }
    for row in 0..rect.h {
        let src_row = (row as u64 * src_h as u64 / rect.h as u64) as u32;
        let dst_y = rect.y + row;
        let dst_row_start = dst_y as usize * stride_px * 4 + rect.x as usize * 4;
        if dst_row_start + rect.w as usize * 4 > dst.len() {
            break;
        }
        for col in 0..rect.w {
            let src_col = (col as u64 * src_w as u64 / rect.w as u64) as u32;
            let src_idx = (src_row as usize * src_w as usize + src_col as usize) * 4;
            let dst_idx = dst_row_start + col as usize * 4;
            if src_idx + 4 > src.len() || dst_idx + 4 > dst.len() {
                continue;
            }
            dst[dst_idx..dst_idx + 4].copy_from_slice(&src[src_idx..src_idx + 4]);
        }
    }
}

impl Presenter {
    pub fn new(surface: Box<dyn VideoSurface>) -> Self {
        Self { surface }
    }

    /// Drops (logs, doesn't error) frames with no RGBA rendition or when the
    /// surface lock fails (spec.md §4.10: "drop the frame, log").
    pub fn display(&mut self, frame: &Frame) -> Result<(), PlayerError> {
        let Some(video) = frame.as_video() else { return Ok(()) };
        let Some(rgba) = &video.rgba else { return Ok(()) };

        let Some(mut guard) = self.surface.lock() else {
            return Err(PlayerError::SurfaceLock(anyhow::anyhow!("surface lock returned None")));
        };
        let (dst_w, dst_h) = (guard.width(), guard.height());
        let stride_px = guard.stride_px();
        let rect = aspect_fit(video.width, video.height, video.sample_aspect_ratio, dst_w, dst_h);
        blit_rgba(rgba, video.width, video.height, guard.bits_mut(), stride_px, rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_fit_centers_narrower_source() {
        let rect = aspect_fit(100, 100, 1.0, 200, 100);
        assert_eq!(rect.w, 100);
        assert_eq!(rect.h, 100);
        assert_eq!(rect.x, 50);
        assert_eq!(rect.y, 0);
    }

    #[test]
    fn aspect_fit_accounts_for_sample_aspect_ratio() {
        let rect = aspect_fit(100, 100, 2.0, 400, 100);
        assert_eq!(rect.h, 100);
        assert_eq!(rect.w, 200);
    }

    #[test]
    fn blit_copies_into_offset_rect() {
        let src = vec![0xFFu8; 4 * 4 * 4];
        let mut dst = vec![0u8; 8 * 8 * 4];
        blit_rgba(&src, 4, 4, &mut dst, 8, Rect { x: 2, y: 2, w: 4, h: 4 });
        let idx = (2 * 8 + 2) * 4;
        assert_eq!(&dst[idx..idx + 4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&dst[0..4], &[0, 0, 0, 0]);
    }
}
