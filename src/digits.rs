use serde::{Deserialize, Serialize};

const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

/// Which digit glyphs formatted output uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitMode {
    Latin,
    #[default]
    Persian,
}

impl DigitMode {
    pub fn apply(self, text: &str) -> String {
        match self {
            DigitMode::Latin => text.to_string(),
            DigitMode::Persian => to_persian_digits(text),
        }
    }

    fn group_separator(self) -> char {
        match self {
            DigitMode::Latin => ',',
            DigitMode::Persian => '٬',
        }
    }

    fn decimal_separator(self) -> char {
        match self {
            DigitMode::Latin => '.',
            DigitMode::Persian => '٫',
        }
    }
}

/// Maps Persian (U+06F0..) and Arabic-Indic (U+0660..) digits to ASCII.
pub fn to_english_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            _ => c,
        })
        .collect()
}

pub fn to_persian_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => PERSIAN_DIGITS[d as usize],
            _ => c,
        })
        .collect()
}

/// Groups thousands, keeps up to three fraction digits and appends the toman unit.
pub fn format_amount(amount: f64, mode: DigitMode) -> String {
    let rendered = format!("{:.3}", amount.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(mode.group_separator());
        }
        grouped.push(c);
    }
    if !frac_part.is_empty() {
        grouped.push(mode.decimal_separator());
        grouped.push_str(frac_part);
    }

    // no "-0"
    let sign = if amount < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{}{} تومان", sign, mode.apply(&grouped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_persian_and_arabic_digits() {
        assert_eq!(to_english_digits("۱۴۰۳/۰۷/۱۵"), "1403/07/15");
        assert_eq!(to_english_digits("٠١٢٣٤٥٦٧٨٩"), "0123456789");
        assert_eq!(to_english_digits("card 12"), "card 12");
    }

    #[test]
    fn persian_digits_round_trip() {
        assert_eq!(to_persian_digits("1403/07/15"), "۱۴۰۳/۰۷/۱۵");
        assert_eq!(to_english_digits(&to_persian_digits("9876543210")), "9876543210");
    }

    #[test]
    fn formats_amounts_in_both_modes() {
        assert_eq!(format_amount(2_500_000.0, DigitMode::Latin), "2,500,000 تومان");
        assert_eq!(format_amount(1500.5, DigitMode::Latin), "1,500.5 تومان");
        assert_eq!(format_amount(-999.0, DigitMode::Latin), "-999 تومان");
        assert_eq!(format_amount(1000.0, DigitMode::Persian), "۱٬۰۰۰ تومان");
        assert_eq!(format_amount(0.0, DigitMode::Latin), "0 تومان");
    }
}
