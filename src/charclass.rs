use unicode_general_category::{get_general_category, GeneralCategory};

/// Unicode general categories that make up a "graphic" symbol.
///
/// These are the PCRE `[:graph:]` categories: all letters, marks, numbers,
/// punctuation and symbols, plus format characters. Built-in "is graphic"
/// predicates disagree with this list (they usually drop `Cf`), and any
/// disagreement changes the produced digests.
const GRAPHIC: &[GeneralCategory] = &[
    // L
    GeneralCategory::UppercaseLetter,
    GeneralCategory::LowercaseLetter,
    GeneralCategory::TitlecaseLetter,
    GeneralCategory::ModifierLetter,
    GeneralCategory::OtherLetter,
    // M
    GeneralCategory::NonspacingMark,
    GeneralCategory::SpacingMark,
    GeneralCategory::EnclosingMark,
    // N
    GeneralCategory::DecimalNumber,
    GeneralCategory::LetterNumber,
    GeneralCategory::OtherNumber,
    // P
    GeneralCategory::ConnectorPunctuation,
    GeneralCategory::DashPunctuation,
    GeneralCategory::OpenPunctuation,
    GeneralCategory::ClosePunctuation,
    GeneralCategory::InitialPunctuation,
    GeneralCategory::FinalPunctuation,
    GeneralCategory::OtherPunctuation,
    // S
    GeneralCategory::MathSymbol,
    GeneralCategory::CurrencySymbol,
    GeneralCategory::ModifierSymbol,
    GeneralCategory::OtherSymbol,
    // Cf
    GeneralCategory::Format,
];

/// A closed set of Unicode general categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    /// L, M, N, P, S and Cf.
    Graphic,
    /// Graphic plus Zs (space separators).
    Printable,
}

impl CharClass {
    /// Reports whether `ch` belongs to this class.
    pub fn contains(self, ch: char) -> bool {
        let category = get_general_category(ch);
        match self {
            CharClass::Graphic => GRAPHIC.contains(&category),
            CharClass::Printable => {
                category == GeneralCategory::SpaceSeparator || GRAPHIC.contains(&category)
            }
        }
    }

    /// Classifies a single byte taken as the Latin-1 code point `U+00XX`.
    ///
    /// The stages work on raw bytes, so a UTF-8 lead byte such as `0xC3`
    /// is judged as `Ã` rather than as part of a multi-byte sequence.
    pub fn contains_byte(self, b: u8) -> bool {
        self.contains(char::from(b))
    }
}

/// Unicode White_Space within the Latin-1 range.
///
/// Besides ASCII whitespace this covers NEL (`0x85`) and NBSP (`0xA0`).
pub fn is_space(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0B | 0x0C | b'\r' | b' ' | 0x85 | 0xA0)
}

/// POSIX `[:space:]`: ASCII whitespace only.
pub fn is_ascii_space(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0B | 0x0C | b'\r' | b' ')
}

/// POSIX `[:cntrl:]`: `0x00..=0x1F` and DEL.
pub fn is_ascii_control(b: u8) -> bool {
    b < 0x20 || b == 0x7F
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphic_ascii() {
        for b in 0x21u8..=0x7E {
            assert!(CharClass::Graphic.contains_byte(b), "byte {b:#04x}");
        }
        assert!(!CharClass::Graphic.contains_byte(b' '));
        assert!(!CharClass::Graphic.contains_byte(b'\n'));
        assert!(!CharClass::Graphic.contains_byte(0x7F));
    }

    #[test]
    fn test_printable_adds_space_separators() {
        assert!(CharClass::Printable.contains_byte(b' '));
        assert!(CharClass::Printable.contains_byte(0xA0));
        assert!(!CharClass::Graphic.contains_byte(0xA0));
        assert!(!CharClass::Printable.contains_byte(b'\t'));
        assert!(!CharClass::Printable.contains_byte(0x85));
    }

    #[test]
    fn test_format_characters_are_graphic() {
        // Soft hyphen and zero-width joiner are Cf
        assert!(CharClass::Graphic.contains_byte(0xAD));
        assert!(CharClass::Graphic.contains('\u{200D}'));
        assert!(CharClass::Printable.contains('\u{FEFF}'));
    }

    #[test]
    fn test_latin1_upper_half() {
        for b in 0xA1u8..=0xFF {
            assert!(CharClass::Graphic.contains_byte(b), "byte {b:#04x}");
        }
        for b in 0x80u8..=0x9F {
            assert!(!CharClass::Printable.contains_byte(b), "byte {b:#04x}");
        }
    }

    #[test]
    fn test_non_latin_classes() {
        assert!(CharClass::Graphic.contains('ж'));
        assert!(CharClass::Graphic.contains('€'));
        assert!(CharClass::Printable.contains('\u{3000}'));
        assert!(!CharClass::Graphic.contains('\u{3000}'));
        assert!(!CharClass::Printable.contains('\u{2028}'));
        assert!(!CharClass::Printable.contains('\u{E000}'));
    }

    #[test]
    fn test_space_predicates() {
        assert!(is_space(0x85));
        assert!(is_space(0xA0));
        assert!(!is_ascii_space(0x85));
        assert!(!is_ascii_space(0xA0));
        for b in [b'\t', b'\n', 0x0B, 0x0C, b'\r', b' '] {
            assert!(is_space(b) && is_ascii_space(b));
        }
        assert!(!is_space(b'x'));
    }

    #[test]
    fn test_ascii_control() {
        assert!(is_ascii_control(0));
        assert!(is_ascii_control(b'\n'));
        assert!(is_ascii_control(0x7F));
        assert!(!is_ascii_control(b' '));
        assert!(!is_ascii_control(0x85));
    }
}
