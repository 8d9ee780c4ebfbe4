//! Symbolic anchor positions resolved into ffmpeg coordinate
//! expressions. The same tokens work in two variable namespaces:
//! `drawtext` (`w`/`text_w`) and `overlay` (`W`/`w`).

use storyreel_core::script::PosValue;

#[derive(Debug, Clone, Copy)]
pub struct PosVars {
    /// Frame dimension variable for this axis.
    pub dim: &'static str,
    /// Rendered-extent variable for this axis (text or overlay size).
    pub extent: &'static str,
}

pub const DRAWTEXT_X: PosVars = PosVars { dim: "w", extent: "text_w" };
pub const DRAWTEXT_Y: PosVars = PosVars { dim: "h", extent: "text_h" };
pub const OVERLAY_X: PosVars = PosVars { dim: "W", extent: "w" };
pub const OVERLAY_Y: PosVars = PosVars { dim: "H", extent: "h" };

/// Resolve one axis of a position into an expression string.
///
/// Unrecognized tokens pass through unchanged. That leniency is
/// intentional: authors may write raw ffmpeg expressions directly.
pub fn format_position(value: &PosValue, vars: PosVars, scale: f64) -> String {
    let raw = match value {
        PosValue::Px(v) => return scaled_literal(i64::from(*v), scale),
        PosValue::Anchor(raw) => raw,
    };
    let token = raw.trim().to_ascii_lowercase();
    let PosVars { dim, extent } = vars;

    match token.as_str() {
        "center" => format!("({dim}-{extent})/2"),
        "left" | "top" => "0".to_string(),
        "right" | "bottom" => format!("{dim}-{extent}"),
        _ => match parse_anchor_offset(&token) {
            Some((anchor, offset)) => {
                let base = match anchor {
                    "center" => format!("({dim}-{extent})/2"),
                    "left" | "top" => "0".to_string(),
                    _ => format!("{dim}-{extent}"),
                };
                let offset = (offset as f64 * scale).round() as i64;
                if offset >= 0 {
                    format!("{base}+{offset}")
                } else {
                    format!("{base}-{}", -offset)
                }
            }
            None => raw.clone(),
        },
    }
}

fn scaled_literal(value: i64, scale: f64) -> String {
    ((value as f64 * scale).round() as i64).to_string()
}

/// Parse `anchor±offset` tokens such as `right-120` or `center+40`.
fn parse_anchor_offset(token: &str) -> Option<(&'static str, i64)> {
    for anchor in ["left", "right", "top", "bottom", "center"] {
        let Some(rest) = token.strip_prefix(anchor) else {
            continue;
        };
        let mut chars = rest.chars();
        let sign = match chars.next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => continue,
        };
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let offset: i64 = digits.parse().ok()?;
        return Some((anchor, sign * offset));
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(s: &str) -> PosValue {
        PosValue::anchor(s)
    }

    #[test]
    fn center_and_bottom_offset() {
        assert_eq!(format_position(&anchor("center"), DRAWTEXT_X, 1.0), "(w-text_w)/2");
        assert_eq!(
            format_position(&anchor("bottom-180"), DRAWTEXT_Y, 1.0),
            "h-text_h-180"
        );
    }

    #[test]
    fn keyword_anchors_with_offsets() {
        assert_eq!(
            format_position(&anchor("right-100"), DRAWTEXT_X, 1.0),
            "w-text_w-100"
        );
        assert_eq!(format_position(&anchor("top+20"), DRAWTEXT_Y, 1.0), "0+20");
        assert_eq!(
            format_position(&anchor("center+40"), DRAWTEXT_X, 1.0),
            "(w-text_w)/2+40"
        );
    }

    #[test]
    fn mirrored_edges() {
        // right-100 and left+100 land symmetrically on a frame.
        assert_eq!(
            format_position(&anchor("right-100"), DRAWTEXT_X, 1.0),
            "w-text_w-100"
        );
        assert_eq!(format_position(&anchor("left+100"), DRAWTEXT_X, 1.0), "0+100");
    }

    #[test]
    fn bare_edges() {
        assert_eq!(format_position(&anchor("left"), DRAWTEXT_X, 1.0), "0");
        assert_eq!(format_position(&anchor("top"), DRAWTEXT_Y, 1.0), "0");
        assert_eq!(format_position(&anchor("right"), DRAWTEXT_X, 1.0), "w-text_w");
        assert_eq!(format_position(&anchor("bottom"), DRAWTEXT_Y, 1.0), "h-text_h");
    }

    #[test]
    fn overlay_variable_namespace() {
        assert_eq!(format_position(&anchor("center"), OVERLAY_X, 1.0), "(W-w)/2");
        assert_eq!(format_position(&anchor("bottom-40"), OVERLAY_Y, 1.0), "H-h-40");
    }

    #[test]
    fn case_insensitive_and_trimmed() {
        assert_eq!(format_position(&anchor(" Center "), DRAWTEXT_X, 1.0), "(w-text_w)/2");
        assert_eq!(
            format_position(&anchor("BOTTOM-40"), DRAWTEXT_Y, 1.0),
            "h-text_h-40"
        );
    }

    #[test]
    fn literal_pixels_scaled() {
        assert_eq!(format_position(&PosValue::Px(120), DRAWTEXT_X, 1.0), "120");
        assert_eq!(format_position(&PosValue::Px(120), DRAWTEXT_X, 0.5), "60");
        assert_eq!(format_position(&PosValue::Px(-15), DRAWTEXT_Y, 1.0), "-15");
    }

    #[test]
    fn offset_scaled_and_rounded() {
        assert_eq!(
            format_position(&anchor("right-100"), DRAWTEXT_X, 0.5),
            "w-text_w-50"
        );
        assert_eq!(
            format_position(&anchor("bottom-25"), DRAWTEXT_Y, 0.3),
            "h-text_h-8"
        );
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(
            format_position(&anchor("main_w/3"), DRAWTEXT_X, 1.0),
            "main_w/3"
        );
        assert_eq!(format_position(&anchor("right-"), DRAWTEXT_X, 1.0), "right-");
    }
}
