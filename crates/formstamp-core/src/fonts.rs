//! Standard-14 font selection and advance-width metrics
//!
//! Only the fonts the stamp can be drawn with are listed. Widths are the
//! AFM advance widths in 1/1000 em for the printable ASCII range (32..=126),
//! which is all the overlay ever draws.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Advance width used for bytes outside the table
const FALLBACK_WIDTH: u16 = 600;

const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, //
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, //
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, //
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, //
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, //
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, //
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, //
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// A PDF standard font usable without embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StandardFont {
    #[default]
    #[serde(rename = "Helvetica")]
    Helvetica,
    #[serde(rename = "Helvetica-Bold")]
    HelveticaBold,
    #[serde(rename = "Times-Roman")]
    TimesRoman,
    #[serde(rename = "Courier")]
    Courier,
}

impl StandardFont {
    /// The `/BaseFont` name written into the font dictionary
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::Courier => "Courier",
        }
    }

    /// Advance width of a single byte in 1/1000 em
    pub fn glyph_width(&self, byte: u8) -> u16 {
        if !(32..=126).contains(&byte) {
            return FALLBACK_WIDTH;
        }
        let idx = (byte - 32) as usize;
        match self {
            StandardFont::Helvetica => HELVETICA_WIDTHS[idx],
            StandardFont::HelveticaBold => HELVETICA_BOLD_WIDTHS[idx],
            StandardFont::TimesRoman => TIMES_ROMAN_WIDTHS[idx],
            StandardFont::Courier => 600,
        }
    }

    /// Width of `text` in points when set at `font_size`
    pub fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let units: u32 = text.bytes().map(|b| self.glyph_width(b) as u32).sum();
        units as f64 * font_size / 1000.0
    }
}

impl fmt::Display for StandardFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_font())
    }
}

impl FromStr for StandardFont {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "helvetica" | "arial" | "sans-serif" => Ok(StandardFont::Helvetica),
            "helvetica-bold" | "helveticabold" | "arial-bold" => Ok(StandardFont::HelveticaBold),
            "times-roman" | "times" | "timesroman" | "serif" => Ok(StandardFont::TimesRoman),
            "courier" | "monospace" => Ok(StandardFont::Courier),
            other => Err(format!(
                "Unsupported font '{}': expected Helvetica, Helvetica-Bold, Times-Roman or Courier",
                other
            )),
        }
    }
}

/// Replace anything the standard encoding can't draw with `?`
pub fn encodable_text(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_helvetica_digit_width() {
        // Every Helvetica digit is 556 units wide
        let w = StandardFont::Helvetica.text_width("0123456789", 10.0);
        assert!((w - 55.6).abs() < 1e-9);
    }

    #[test]
    fn test_date_string_width() {
        // "01/02/2024": 8 digits at 556 plus 2 slashes at 278
        let w = StandardFont::Helvetica.text_width("01/02/2024", 12.0);
        let expected = (8.0 * 556.0 + 2.0 * 278.0) * 12.0 / 1000.0;
        assert!((w - expected).abs() < 1e-9);
    }

    #[test]
    fn test_proportional_widths_differ() {
        let helv = StandardFont::Helvetica;
        assert!(helv.text_width("W", 12.0) > helv.text_width("i", 12.0));
    }

    #[test]
    fn test_courier_is_monospaced() {
        let courier = StandardFont::Courier;
        assert_eq!(courier.text_width("WWW", 10.0), courier.text_width("iii", 10.0));
        assert!((courier.text_width("abc", 10.0) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_str_accepts_aliases() {
        assert_eq!("helvetica".parse::<StandardFont>(), Ok(StandardFont::Helvetica));
        assert_eq!(
            "Helvetica-Bold".parse::<StandardFont>(),
            Ok(StandardFont::HelveticaBold)
        );
        assert_eq!("times".parse::<StandardFont>(), Ok(StandardFont::TimesRoman));
        assert_eq!("Courier".parse::<StandardFont>(), Ok(StandardFont::Courier));
        assert!("Comic Sans".parse::<StandardFont>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for font in [
            StandardFont::Helvetica,
            StandardFont::HelveticaBold,
            StandardFont::TimesRoman,
            StandardFont::Courier,
        ] {
            assert_eq!(font.to_string().parse::<StandardFont>(), Ok(font));
        }
    }

    #[test]
    fn test_encodable_text_replaces_non_ascii() {
        assert_eq!(encodable_text("12/31/2024"), "12/31/2024");
        assert_eq!(encodable_text("31 déc"), "31 d?c");
        assert_eq!(encodable_text("a\tb"), "a?b");
    }

    proptest! {
        /// Width is additive over concatenation
        #[test]
        fn width_is_additive(a in "[ -~]{0,20}", b in "[ -~]{0,20}") {
            let font = StandardFont::Helvetica;
            let joined = format!("{}{}", a, b);
            let sum = font.text_width(&a, 12.0) + font.text_width(&b, 12.0);
            prop_assert!((font.text_width(&joined, 12.0) - sum).abs() < 1e-6);
        }

        /// Width scales linearly with font size
        #[test]
        fn width_scales_with_size(text in "[ -~]{1,20}", size in 1.0f64..72.0) {
            let font = StandardFont::TimesRoman;
            let at_one = font.text_width(&text, 1.0);
            prop_assert!((font.text_width(&text, size) - at_one * size).abs() < 1e-6);
        }
    }
}
