//! The English proficiency scale.

use crate::error::ValidationError;

/// Ordered scale of `(code, description)` pairs. Profiles store the index.
pub const LEVELS: [(&str, &str); 11] = [
    ("A1", "Elementary"),
    ("A1+", "..."),
    ("A2", "Pre Intermediate"),
    ("A2+", "..."),
    ("B1", "Intermediate"),
    ("B1+", "..."),
    ("B2", "Upper Intermediate"),
    ("B2+", "..."),
    ("C1", "Advanced"),
    ("C1+", "..."),
    ("C2", "Proficient"),
];

/// Highest valid level index.
pub const MAX_LEVEL: u8 = (LEVELS.len() - 1) as u8;

/// Code for a level index, e.g. `4 -> "B1"`.
pub fn code(index: u8) -> Option<&'static str> {
    LEVELS.get(index as usize).map(|(code, _)| *code)
}

/// The scale rendered one level per line, for re-prompts.
pub fn scale_listing() -> String {
    LEVELS
        .iter()
        .map(|(code, description)| format!("{code} – {description}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Upper-case the answer and swap Cyrillic А, В, С for their Latin twins.
pub fn normalize(input: &str) -> String {
    input
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'А' => 'A',
            'В' => 'B',
            'С' => 'C',
            other => other,
        })
        .collect()
}

/// Parse a level answer into its scale index.
pub fn parse(input: &str) -> Result<u8, ValidationError> {
    let normalized = normalize(input);
    LEVELS
        .iter()
        .position(|(code, _)| *code == normalized)
        .map(|i| i as u8)
        .ok_or(ValidationError::UnknownLevel(normalized))
}

/// Inclusive index range of partners compatible with `level`.
pub fn window(level: u8) -> (u8, u8) {
    (level.saturating_sub(3), level.saturating_add(3).min(MAX_LEVEL))
}
