use crate::text_metrics;

/// Width of a single-line label in px.
pub(crate) fn text_width(text: &str, font_size: f64, font_family: &str, fast_metrics: bool) -> f64 {
    if fast_metrics {
        return estimated_width(text, font_size);
    }
    text_metrics::measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| estimated_width(text, font_size))
}

/// Height of the box reserved for a label of the given font size.
pub(crate) fn text_height(font_size: f64) -> f64 {
    (font_size - 1.0).max(1.0)
}

/// Font-independent estimate from per-glyph width classes.
fn estimated_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .filter(|ch| !ch.is_control())
        .map(em_width)
        .sum::<f64>()
        * font_size
}

/// Rough advance of `ch` in ems for a proportional sans-serif face.
fn em_width(ch: char) -> f64 {
    match ch {
        'i' | 'j' | 'l' | 'I' | '\'' | '|' | '!' | '.' | ',' | ':' | ';' => 0.25,
        ' ' | 'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '{' | '}' | '/' | '\\' | '-' => 0.33,
        'm' | 'w' | 'M' | 'W' => 0.88,
        '@' | '%' | '&' | '#' => 0.9,
        'A'..='Z' => match ch {
            'C' | 'D' | 'G' | 'H' | 'N' | 'O' | 'Q' | 'U' => 0.74,
            'E' | 'F' | 'J' | 'L' | 'T' | 'Z' => 0.58,
            _ => 0.65,
        },
        '1' => 0.4,
        '0'..='9' => 0.6,
        'a'..='z' => match ch {
            'b' | 'd' | 'g' | 'h' | 'n' | 'p' | 'q' | 'u' => 0.6,
            _ => 0.55,
        },
        _ if is_wide(ch) => 1.0,
        _ => 0.57,
    }
}

/// East Asian wide and fullwidth ranges render at a full em.
fn is_wide(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1FAFF
            | 0x20000..=0x3FFFD
    )
}
