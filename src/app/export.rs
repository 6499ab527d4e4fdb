use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use glow::HasContext;

/// Read back the frame that was just drawn and write it next to the working directory.
///
/// Call before the buffer swap so the back buffer still holds the frame.
pub fn save_screenshot(gl: &glow::Context, width: u32, height: u32) {
    let mut pixels = vec![0u8; (width * height * 4) as usize];

    // SAFETY: reading the default framebuffer of the current context into a
    // buffer sized for `width * height` RGBA8 pixels.
    unsafe {
        gl.read_pixels(
            0,
            0,
            width as i32,
            height as i32,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelPackData::Slice(&mut pixels),
        );
    }

    // OpenGL reads bottom-to-top
    let flipped = flip_rows(&pixels, width, height);
    let path = screenshot_path(Path::new("."), SystemTime::now());

    match image::save_buffer(&path, &flipped, width, height, image::ColorType::Rgba8) {
        Ok(()) => log::info!("Screenshot saved to {:?}", path),
        Err(e) => log::error!("Failed to save screenshot: {}", e),
    }
}

fn flip_rows(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_size = (width * 4) as usize;
    let mut flipped = Vec::with_capacity(data.len());
    for row in data.chunks_exact(row_size).take(height as usize).rev() {
        flipped.extend_from_slice(row);
    }
    flipped
}

fn screenshot_path(dir: &Path, at: SystemTime) -> PathBuf {
    let secs = at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
    dir.join(format!("cien-{secs}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flips_bottom_row_to_top() {
        // 1x3 image, one RGBA pixel per row.
        let data = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
        assert_eq!(flip_rows(&data, 1, 3), vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn keeps_pixel_order_within_rows() {
        let data = [1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0];
        assert_eq!(flip_rows(&data, 2, 2), vec![3, 0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn names_screenshots_by_unix_time() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(
            screenshot_path(Path::new("/tmp"), at),
            PathBuf::from("/tmp/cien-1700000000.png")
        );
    }
}
