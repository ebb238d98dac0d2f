use log::debug;

/// Marker inserted in place of each mangled punctuation character.
///
/// The prefix and the grapheme words below are part of the native linkage
/// contract: independently compiled native modules export symbols built
/// from exactly these strings, so none of them may change.
pub const MANGLED_GRAPHEME_PREFIX: &str = "__cionom_mangled_grapheme_";

const GRAPHEME_KEYS: [char; 30] = [
    '+', '-', '/', '*', '=', '!', '#', '|', '\\', '"', '\'', ';', ':', '`', '~', '.', ',', '<',
    '>', '[', ']', '{', '}', '(', ')', '@', '$', '^', '%', '&',
];

const GRAPHEME_VALUES: [&str; 30] = [
    "plus",
    "minus",
    "slash",
    "asterisk",
    "equals",
    "bang",
    "hash",
    "pipe",
    "backslash",
    "double_quote",
    "single_quote",
    "semicolon",
    "colon",
    "backtick",
    "tilde",
    "full_stop",
    "comma",
    "left_chevron",
    "right_chevron",
    "left_bracket",
    "right_bracket",
    "left_brace",
    "right_brace",
    "left_parenthesis",
    "right_parenthesis",
    "at",
    "dollar",
    "circumflex",
    "percentage",
    "ampersand",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MangleError {
    /// The identifier contains a character outside the mangling alphabet
    /// (ASCII alphanumerics, `_`, and the 30 mapped punctuation marks).
    UnmappableCharacter { character: char, position: usize },
}

impl std::fmt::Display for MangleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MangleError::UnmappableCharacter {
                character,
                position,
            } => {
                write!(
                    f,
                    "mangle error: invalid character {:?} at byte {} of identifier",
                    character, position
                )
            }
        }
    }
}

impl std::error::Error for MangleError {}

/// Transform a source identifier into a linkage-safe symbol name.
///
/// ASCII alphanumerics and `_` pass through unchanged. Each mapped
/// punctuation character becomes [`MANGLED_GRAPHEME_PREFIX`] followed by its
/// grapheme word, inserted verbatim at that position with no separators.
pub fn mangle(identifier: &str) -> Result<String, MangleError> {
    let mut mangled = String::with_capacity(identifier.len());

    for (position, character) in identifier.char_indices() {
        if character == '_' || character.is_ascii_alphanumeric() {
            mangled.push(character);
            continue;
        }

        let word = GRAPHEME_KEYS
            .iter()
            .position(|&key| key == character)
            .map(|index| GRAPHEME_VALUES[index])
            .ok_or(MangleError::UnmappableCharacter {
                character,
                position,
            })?;

        mangled.push_str(MANGLED_GRAPHEME_PREFIX);
        mangled.push_str(word);
    }

    debug!("mangled `{}` as `{}`", identifier, mangled);
    Ok(mangled)
}
