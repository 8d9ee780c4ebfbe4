//! Per-section visual effects: a small closed vocabulary of friendly
//! names mapped to filter expressions gated by an enable window.

/// Map an effect name to a filter expression active between
/// `start_sec` and `end_sec`. Unknown names are ignored; the zoom
/// family is currently disabled (zoompan behaves inconsistently across
/// ffmpeg builds) and also maps to `None`.
pub fn effect_filter(name: &str, start_sec: f64, end_sec: f64) -> Option<String> {
    let normalized = name.trim().to_ascii_lowercase();
    let expr = match normalized.as_str() {
        "blur" | "soften" => "gblur=sigma=12",
        "grayscale" | "mono" | "bw" => "hue=s=0",
        "vignette" => "vignette=PI/4",
        "contrast" => "eq=contrast=1.2:saturation=1.05",
        "zoom_in" | "zoom-in" | "zoom_out" | "zoom-out" | "zoom_pan_left" | "zoompanleft"
        | "zoom_pan_right" | "zoompanright" => {
            tracing::debug!(effect = %normalized, "zoom effects are disabled, skipping");
            return None;
        }
        _ => {
            tracing::debug!(effect = %normalized, "unknown effect name, skipping");
            return None;
        }
    };
    Some(format!(
        "{expr}:enable='between(t,{start_sec:.2},{end_sec:.2})'"
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_effects_carry_enable_window() {
        assert_eq!(
            effect_filter("grayscale", 0.0, 2.0).unwrap(),
            "hue=s=0:enable='between(t,0.00,2.00)'"
        );
        assert_eq!(
            effect_filter("blur", 1.5, 4.25).unwrap(),
            "gblur=sigma=12:enable='between(t,1.50,4.25)'"
        );
        assert_eq!(
            effect_filter("vignette", 0.0, 1.0).unwrap(),
            "vignette=PI/4:enable='between(t,0.00,1.00)'"
        );
        assert_eq!(
            effect_filter("contrast", 0.0, 1.0).unwrap(),
            "eq=contrast=1.2:saturation=1.05:enable='between(t,0.00,1.00)'"
        );
    }

    #[test]
    fn aliases_collapse() {
        assert_eq!(
            effect_filter("mono", 0.0, 1.0),
            effect_filter("bw", 0.0, 1.0)
        );
        assert_eq!(
            effect_filter("soften", 0.0, 1.0),
            effect_filter("blur", 0.0, 1.0)
        );
    }

    #[test]
    fn case_insensitive() {
        assert!(effect_filter("GRAYSCALE", 0.0, 1.0).is_some());
        assert!(effect_filter(" Blur ", 0.0, 1.0).is_some());
    }

    #[test]
    fn zoom_family_is_disabled() {
        for name in [
            "zoom_in",
            "zoom-in",
            "zoom_out",
            "zoom-out",
            "zoom_pan_left",
            "zoompanleft",
            "zoom_pan_right",
            "zoompanright",
        ] {
            assert!(effect_filter(name, 0.0, 1.0).is_none(), "{name}");
        }
    }

    #[test]
    fn unknown_names_are_noops() {
        assert!(effect_filter("sparkle", 0.0, 1.0).is_none());
        assert!(effect_filter("", 0.0, 1.0).is_none());
    }
}
