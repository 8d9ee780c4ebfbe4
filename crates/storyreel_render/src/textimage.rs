//! Rasterized text overlays. Each rendered block is persisted as a
//! PNG named by a content hash of everything that affects its pixels,
//! so identical text/style combinations across sections or runs reuse
//! the same artifact. Writes go through a temp file and a rename, so
//! concurrent readers only ever see complete files.

use std::path::{Path, PathBuf};

use fontdue::Font;
use image::{ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Vertical gap between stacked text blocks, in pixels.
pub const LINE_GAP_PX: u32 = 8;
const PAD_PX: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct TextArtifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Everything that affects the rendered pixels; part of the cache key.
#[derive(Debug, Clone)]
pub struct RasterSpec<'a> {
    pub text: &'a str,
    pub font_name: &'a str,
    pub size: f32,
    pub fill: &'a str,
    pub stroke_color: &'a str,
    pub stroke_width: u32,
    pub max_width: f32,
}

pub fn cache_key(spec: &RasterSpec<'_>) -> String {
    let mut hasher = Sha256::new();
    for part in [
        spec.text,
        spec.font_name,
        &format!("{:.2}", spec.size),
        spec.fill,
        spec.stroke_color,
        &spec.stroke_width.to_string(),
        &format!("{:.1}", spec.max_width),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Render (or reuse) the PNG artifact for a text block.
pub fn render_text(font: &Font, spec: &RasterSpec<'_>, cache_dir: &Path) -> Result<TextArtifact> {
    let key = cache_key(spec);
    let path = cache_dir.join(format!("text_{key}.png"));
    if path.exists() {
        let (width, height) = image::image_dimensions(&path)?;
        return Ok(TextArtifact { path, width, height });
    }

    std::fs::create_dir_all(cache_dir)?;
    let img = rasterize(font, spec);
    let tmp = cache_dir.join(format!("text_{key}.png.{}.tmp", std::process::id()));
    img.save_with_format(&tmp, ImageFormat::Png)?;
    std::fs::rename(&tmp, &path)?;

    Ok(TextArtifact {
        path,
        width: img.width(),
        height: img.height(),
    })
}

fn rasterize(font: &Font, spec: &RasterSpec<'_>) -> RgbaImage {
    let lines: Vec<&str> = spec.text.split('\n').collect();
    let stroke = spec.stroke_width;

    let (ascent, line_height) = font
        .horizontal_line_metrics(spec.size)
        .map(|m| (m.ascent, m.new_line_size))
        .unwrap_or((spec.size * 0.8, spec.size * 1.2));
    let line_advance = line_height.ceil() as u32 + LINE_GAP_PX;

    let widest = lines
        .iter()
        .map(|line| advance_width(font, line, spec.size))
        .fold(0.0f32, f32::max);
    let width = (widest.ceil() as u32 + 2 * stroke + 2 * PAD_PX).max(1);
    let line_count = lines.len() as u32;
    let height =
        (line_count * line_height.ceil() as u32 + (line_count - 1) * LINE_GAP_PX + 2 * stroke
            + 2 * PAD_PX)
            .max(1);

    let mut img = RgbaImage::new(width, height);
    let fill = parse_hex_color(spec.fill, [255, 255, 255]);
    let stroke_color = parse_hex_color(spec.stroke_color, [0, 0, 0]);

    let origin_x = (PAD_PX + stroke) as i32;
    for (li, line) in lines.iter().enumerate() {
        let baseline = (PAD_PX + stroke) as f32 + li as f32 * line_advance as f32 + ascent;
        if stroke > 0 {
            let s = stroke as i32;
            for dy in [-s, 0, s] {
                for dx in [-s, 0, s] {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    blit_line(
                        &mut img,
                        font,
                        line,
                        spec.size,
                        origin_x + dx,
                        baseline + dy as f32,
                        stroke_color,
                    );
                }
            }
        }
        blit_line(&mut img, font, line, spec.size, origin_x, baseline, fill);
    }
    img
}

fn advance_width(font: &Font, line: &str, size: f32) -> f32 {
    line.chars().map(|c| font.metrics(c, size).advance_width).sum()
}

fn blit_line(
    img: &mut RgbaImage,
    font: &Font,
    line: &str,
    size: f32,
    origin_x: i32,
    baseline: f32,
    color: [u8; 3],
) {
    let (img_w, img_h) = (img.width() as i32, img.height() as i32);
    let mut pen = origin_x as f32;
    for ch in line.chars() {
        let (metrics, bitmap) = font.rasterize(ch, size);
        let gx = pen.round() as i32 + metrics.xmin;
        let gy = baseline.round() as i32 - metrics.ymin - metrics.height as i32;
        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let coverage = bitmap[row * metrics.width + col];
                if coverage == 0 {
                    continue;
                }
                let px = gx + col as i32;
                let py = gy + row as i32;
                if px < 0 || py < 0 || px >= img_w || py >= img_h {
                    continue;
                }
                blend(img.get_pixel_mut(px as u32, py as u32), color, coverage);
            }
        }
        pen += metrics.advance_width;
    }
}

fn blend(dst: &mut Rgba<u8>, src: [u8; 3], coverage: u8) {
    let a = f32::from(coverage) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = a + da * (1.0 - a);
    if out_a <= 0.0 {
        return;
    }
    for i in 0..3 {
        let blended = (f32::from(src[i]) * a + f32::from(dst[i]) * da * (1.0 - a)) / out_a;
        dst[i] = blended.round() as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

/// `#RRGGBB` (leading `#` optional); malformed input falls back.
fn parse_hex_color(value: &str, fallback: [u8; 3]) -> [u8; 3] {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return fallback;
    }
    let parse = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16);
    match (parse(0..2), parse(2..4), parse(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => [r, g, b],
        _ => fallback,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
