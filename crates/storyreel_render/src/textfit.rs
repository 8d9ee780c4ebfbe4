//! Text-fit resolution: shrink the font size until the widest line
//! fits a pixel budget, then wrap at a natural boundary, then accept a
//! best-effort uniform scale-down. The caller always gets a usable
//! result; `FitOutcome::fits` reports whether the budget was met.

use fontdue::Font;

pub const SHRINK_FACTOR: f32 = 0.9;
pub const FINAL_SCALE: f32 = 0.85;
pub const DEFAULT_MIN_SIZE: f32 = 24.0;

/// Break candidates for the wrap fallback, in addition to whitespace.
const BREAK_CHARS: &[char] = &[
    '、', '。', '，', '．', ',', '.', '!', '?', '！', '？', ':', '：', ';', '；',
];

#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// Possibly re-wrapped text (a line break may have been inserted).
    pub text: String,
    pub size: f32,
    /// False when the text still overflows after all fallback tiers.
    pub fits: bool,
    pub max_line_width: f32,
}

/// Width of one line at `size`, including stroke on both sides.
pub fn line_width(font: &Font, line: &str, size: f32, stroke_width: f32) -> f32 {
    if line.is_empty() {
        return 0.0;
    }
    let advance: f32 = line
        .chars()
        .map(|c| font.metrics(c, size).advance_width)
        .sum();
    advance + 2.0 * stroke_width
}

/// Check whether every line of `text` fits within `max_width_px`.
/// Returns the widest measured line alongside the verdict.
pub fn verify_fit(
    font: &Font,
    text: &str,
    size: f32,
    max_width_px: f32,
    stroke_width: f32,
) -> (bool, f32) {
    let widest = text
        .split('\n')
        .map(|line| line_width(font, line, size, stroke_width))
        .fold(0.0f32, f32::max);
    (widest <= max_width_px, widest)
}

/// Shrink `initial_size` by `SHRINK_FACTOR` steps until the text fits
/// or `min_size` is reached. Text that already fits returns
/// `initial_size` unchanged.
pub fn fit_font_size(
    font: &Font,
    text: &str,
    initial_size: f32,
    max_width_px: f32,
    min_size: f32,
    stroke_width: f32,
) -> f32 {
    let mut size = initial_size;
    loop {
        let (fits, _) = verify_fit(font, text, size, max_width_px, stroke_width);
        if fits || size <= min_size {
            return size;
        }
        size = (size * SHRINK_FACTOR).max(min_size);
    }
}

/// Insert a line break at the space or punctuation boundary nearest
/// the midpoint; if the text has no such boundary, split hard at the
/// midpoint character index.
pub fn split_midpoint(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < 2 {
        return text.to_string();
    }
    let mid = chars.len() / 2;

    let mut best: Option<usize> = None;
    for (i, c) in chars.iter().enumerate() {
        if i == 0 || i + 1 >= chars.len() {
            continue;
        }
        if c.is_whitespace() || BREAK_CHARS.contains(c) {
            // Break after the boundary character.
            let pos = i + 1;
            let better = match best {
                None => true,
                Some(b) => pos.abs_diff(mid) < b.abs_diff(mid),
            };
            if better {
                best = Some(pos);
            }
        }
    }

    let pos = best.unwrap_or(mid);
    let head: String = chars[..pos].iter().collect();
    let tail: String = chars[pos..].iter().collect();
    // A trailing space on the first line would inflate its width.
    format!("{}\n{}", head.trim_end(), tail.trim_start())
}

/// Full three-tier fit: shrink, then wrap and re-shrink, then a final
/// uniform scale-down accepted as best effort.
pub fn fit_text(
    font: &Font,
    text: &str,
    initial_size: f32,
    max_width_px: f32,
    min_size: f32,
    stroke_width: f32,
) -> FitOutcome {
    let size = fit_font_size(font, text, initial_size, max_width_px, min_size, stroke_width);
    let (fits, widest) = verify_fit(font, text, size, max_width_px, stroke_width);
    if fits {
        return FitOutcome {
            text: text.to_string(),
            size,
            fits: true,
            max_line_width: widest,
        };
    }

    let wrapped = split_midpoint(text);
    let size = fit_font_size(
        font,
        &wrapped,
        initial_size,
        max_width_px,
        min_size,
        stroke_width,
    );
    let (fits, widest) = verify_fit(font, &wrapped, size, max_width_px, stroke_width);
    if fits {
        return FitOutcome {
            text: wrapped,
            size,
            fits: true,
            max_line_width: widest,
        };
    }

    let size = (size * FINAL_SCALE).max(1.0);
    let (fits, widest) = verify_fit(font, &wrapped, size, max_width_px, stroke_width);
    FitOutcome {
        text: wrapped,
        size,
        fits,
        max_line_width: widest,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
