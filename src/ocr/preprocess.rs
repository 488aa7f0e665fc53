use image::{ImageBuffer, Rgba, RgbaImage, imageops};

use super::regions::{REFERENCE_HEIGHT, REFERENCE_WIDTH, Region};

/// Scale factor applied to numeric cells before recognition.
const UPSCALE_FACTOR: u32 = 2;

/// Box blur kernel size (square).
const BLUR_KERNEL: u32 = 5;

/// Pixel rectangle in the actual screenshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scales a reference-resolution region to an image of the given size.
///
/// Each coordinate is `value * actual / reference`, truncated. Width and
/// height are scaled on their own, so the right/bottom edges are
/// `x + scaled width`. Aspect-ratio mismatches are not corrected.
pub fn scale_region(region: &Region, image_width: u32, image_height: u32) -> PixelRect {
    let sx = |v: u32| (v as u64 * image_width as u64 / REFERENCE_WIDTH as u64) as u32;
    let sy = |v: u32| (v as u64 * image_height as u64 / REFERENCE_HEIGHT as u64) as u32;

    PixelRect {
        x: sx(region.x),
        y: sy(region.y),
        width: sx(region.width),
        height: sy(region.height),
    }
}

/// Crops a region out of the screenshot, clamped to the image bounds.
pub fn crop_region(img: &RgbaImage, region: &Region) -> RgbaImage {
    let (w, h) = img.dimensions();
    let rect = scale_region(region, w, h);

    let x0 = rect.x.min(w);
    let y0 = rect.y.min(h);
    let rw = rect.width.min(w - x0);
    let rh = rect.height.min(h - y0);

    imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Upscales 2x with bilinear filtering, then applies a 5×5 box blur.
///
/// Thin digits in the stat columns come out noticeably cleaner this way.
pub fn enhance_digits(img: &RgbaImage) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let upscaled = imageops::resize(
        img,
        w * UPSCALE_FACTOR,
        h * UPSCALE_FACTOR,
        imageops::FilterType::Triangle,
    );
    box_blur(&upscaled, BLUR_KERNEL)
}

/// Mean filter over a `kernel`×`kernel` window. Edge pixels reuse the
/// nearest in-bounds neighbour.
pub fn box_blur(img: &RgbaImage, kernel: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    let radius = (kernel / 2) as i64;
    let area = (kernel * kernel) as u32;
    let mut output: RgbaImage = ImageBuffer::new(width, height);

    for (x, y, out) in output.enumerate_pixels_mut() {
        let mut sums = [0u32; 4];
        for dy in -radius..=radius {
            let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
            for dx in -radius..=radius {
                let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                let px = img.get_pixel(sx, sy);
                for c in 0..4 {
                    sums[c] += px[c] as u32;
                }
            }
        }
        *out = Rgba([
            (sums[0] / area) as u8,
            (sums[1] / area) as u8,
            (sums[2] / area) as u8,
            (sums[3] / area) as u8,
        ]);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: u32, y: u32, width: u32, height: u32) -> Region {
        Region { name: "player1_points".to_string(), x, y, width, height }
    }

    #[test]
    fn test_scale_region_identity_at_reference() {
        let r = region(1219, 520, 485, 81);
        let rect = scale_region(&r, 3840, 2160);
        assert_eq!(rect, PixelRect { x: 1219, y: 520, width: 485, height: 81 });
    }

    #[test]
    fn test_scale_region_truncates() {
        // 1920x1080 halves everything; odd values round down.
        let r = region(1219, 843, 135, 77);
        let rect = scale_region(&r, 1920, 1080);
        assert_eq!(rect, PixelRect { x: 609, y: 421, width: 67, height: 38 });
    }

    #[test]
    fn test_crop_region() {
        let img: RgbaImage = ImageBuffer::from_fn(384, 216, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        // Reference (100, 200, 400, 300) at 1/10 scale → (10, 20, 40, 30)
        let cropped = crop_region(&img, &region(100, 200, 400, 300));

        assert_eq!(cropped.dimensions(), (40, 30));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 20);
    }

    #[test]
    fn test_crop_region_clamps() {
        let img: RgbaImage = ImageBuffer::new(384, 216);
        let cropped = crop_region(&img, &region(3800, 2100, 400, 400));
        assert_eq!(cropped.dimensions(), (4, 6));
    }

    #[test]
    fn test_enhance_doubles_size() {
        let img: RgbaImage = ImageBuffer::from_pixel(7, 3, Rgba([200, 200, 200, 255]));
        let out = enhance_digits(&img);
        assert_eq!(out.dimensions(), (14, 6));
        // Uniform input stays uniform after blur.
        assert_eq!(out.get_pixel(5, 3)[0], 200);
    }

    #[test]
    fn test_box_blur_averages() {
        let mut img: RgbaImage = ImageBuffer::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        img.put_pixel(2, 2, Rgba([250, 0, 0, 255]));

        let out = box_blur(&img, 5);
        assert_eq!(out.get_pixel(2, 2)[0], 10);
        assert_eq!(out.get_pixel(2, 2)[3], 255);
    }
}
