use image::{GrayImage, Luma, Rgba, RgbaImage, imageops};

use crate::ocr::Rect;

pub(crate) const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub(crate) const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Average color of the thin bands just outside `bounds`.
pub fn surrounding_average_color(image: &RgbaImage, bounds: &Rect, margin: i32) -> Rgba<u8> {
    let bands = [
        Rect::new(bounds.left - margin, bounds.top, bounds.left, bounds.bottom),
        Rect::new(bounds.right, bounds.top, bounds.right + margin, bounds.bottom),
        Rect::new(bounds.left, bounds.top - margin, bounds.right, bounds.top),
        Rect::new(bounds.left, bounds.bottom, bounds.right, bounds.bottom + margin),
    ];

    let mut totals = [0u64; 3];
    let mut count = 0u64;
    for band in bands {
        let Some(band) = band.clip_to(image.width(), image.height()) else {
            continue;
        };
        for pixel in pixels_in(image, &band) {
            totals[0] += pixel[0] as u64;
            totals[1] += pixel[1] as u64;
            totals[2] += pixel[2] as u64;
            count += 1;
        }
    }

    if count == 0 {
        return WHITE;
    }
    Rgba([
        (totals[0] / count) as u8,
        (totals[1] / count) as u8,
        (totals[2] / count) as u8,
        255,
    ])
}

/// The pixel inside `bounds` that contrasts most with `background`.
pub(crate) fn foreground_by_contrast(
    image: &RgbaImage,
    bounds: &Rect,
    background: Rgba<u8>,
) -> Rgba<u8> {
    let bg_luminance = luminance(background);
    let Some(bounds) = bounds.clip_to(image.width(), image.height()) else {
        return BLACK;
    };
    let mut best = None;
    let mut best_contrast = f32::MIN;
    for pixel in pixels_in(image, &bounds) {
        let contrast = contrast_ratio(luminance(pixel), bg_luminance);
        if contrast > best_contrast {
            best_contrast = contrast;
            best = Some(Rgba([pixel[0], pixel[1], pixel[2], 255]));
        }
    }
    best.unwrap_or(BLACK)
}

pub(crate) fn luminance(color: Rgba<u8>) -> f32 {
    let r = color[0] as f32 / 255.0;
    let g = color[1] as f32 / 255.0;
    let b = color[2] as f32 / 255.0;
    0.299 * r + 0.587 * g + 0.114 * b
}

pub(crate) fn contrast_ratio(a: f32, b: f32) -> f32 {
    (a.max(b) + 0.05) / (a.min(b) + 0.05)
}

/// Paints `bounds` with `color`, then lays a blurred copy of the same fill at
/// `alpha` over it so the seam fades into the surroundings.
pub(crate) fn erase_with_soft_blur(
    image: &mut RgbaImage,
    bounds: &Rect,
    color: Rgba<u8>,
    blur_radius: f32,
    blur_alpha: f32,
) {
    let Some(inner) = bounds.clip_to(image.width(), image.height()) else {
        return;
    };
    for y in inner.top..inner.bottom {
        for x in inner.left..inner.right {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
    if blur_radius <= 0.0 || blur_alpha <= 0.0 {
        return;
    }

    let pad = (blur_radius * 2.0).ceil() as i32;
    let Some(outer) = Rect::new(
        bounds.left - pad,
        bounds.top - pad,
        bounds.right + pad,
        bounds.bottom + pad,
    )
    .clip_to(image.width(), image.height()) else {
        return;
    };

    let mut mask = GrayImage::new(outer.width() as u32, outer.height() as u32);
    for y in inner.top..inner.bottom {
        for x in inner.left..inner.right {
            mask.put_pixel((x - outer.left) as u32, (y - outer.top) as u32, Luma([255]));
        }
    }
    // blur radius to gaussian sigma, matching common canvas conventions
    let sigma = blur_radius * 0.577_35 + 0.5;
    let mask = imageops::blur(&mask, sigma);

    for (mx, my, weight) in mask.enumerate_pixels() {
        let coverage = weight[0] as f32 / 255.0 * blur_alpha.clamp(0.0, 1.0);
        if coverage <= 0.0 {
            continue;
        }
        let x = outer.left as u32 + mx;
        let y = outer.top as u32 + my;
        let blended = blend(*image.get_pixel(x, y), color, coverage);
        image.put_pixel(x, y, blended);
    }
}

/// Draws a rectangle border, used for layout debugging.
pub fn outline_rect(image: &mut RgbaImage, rect: &Rect, color: Rgba<u8>, thickness: i32) {
    let thickness = thickness.max(1);
    let edges = [
        Rect::new(rect.left, rect.top, rect.right, rect.top + thickness),
        Rect::new(rect.left, rect.bottom - thickness, rect.right, rect.bottom),
        Rect::new(rect.left, rect.top, rect.left + thickness, rect.bottom),
        Rect::new(rect.right - thickness, rect.top, rect.right, rect.bottom),
    ];
    for edge in edges {
        let Some(edge) = edge.clip_to(image.width(), image.height()) else {
            continue;
        };
        for y in edge.top..edge.bottom {
            for x in edge.left..edge.right {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

pub(crate) fn blend(base: Rgba<u8>, over: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let mix = |a: u8, b: u8| (a as f32 * (1.0 - alpha) + b as f32 * alpha).round() as u8;
    Rgba([
        mix(base[0], over[0]),
        mix(base[1], over[1]),
        mix(base[2], over[2]),
        base[3],
    ])
}

fn pixels_in<'a>(image: &'a RgbaImage, rect: &Rect) -> impl Iterator<Item = Rgba<u8>> + 'a {
    let (left, right) = (rect.left as u32, rect.right as u32);
    (rect.top as u32..rect.bottom as u32)
        .flat_map(move |y| (left..right).map(move |x| *image.get_pixel(x, y)))
}
