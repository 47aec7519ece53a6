//! Invoice folio sequencing.
//!
//! A folio is an alphabetic prefix followed by a number padded to at least
//! three digits (`F001`, `P042`). The next folio is derived from the largest
//! identifier currently stored, where "largest" is the store's text ordering.

use std::fmt;

use serde::Serialize;

/// Prefix used when the stored maximum carries no leading letters.
pub const DEFAULT_PREFIX: &str = "F";
/// Folio handed out when no order header exists yet.
pub const SEED_FOLIO: &str = "F001";
/// Minimum number of digits rendered after the prefix.
pub const MIN_DIGITS: usize = 3;

/// Human-facing invoice identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Folio(String);

impl Folio {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Folio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the folio that follows `current_max`.
///
/// Every ASCII digit of the identifier contributes to the number, not only a
/// trailing run: `A1B2` yields `A013`. Numbers wider than [`MIN_DIGITS`] are
/// rendered in full, so `F999` is followed by `F1000`.
pub fn next_folio(current_max: Option<&str>) -> Folio {
    let Some(current) = current_max.map(str::trim).filter(|value| !value.is_empty()) else {
        return Folio::new(SEED_FOLIO);
    };

    let (prefix, number) = split_folio(current);
    let next = number.saturating_add(1);
    Folio(format!("{prefix}{next:0width$}", width = MIN_DIGITS))
}

/// Splits a folio into its leading alphabetic run and its embedded number.
///
/// Missing letters fall back to [`DEFAULT_PREFIX`]; missing digits count as
/// zero. Digit runs that overflow `u64` saturate.
pub fn split_folio(folio: &str) -> (&str, u64) {
    let prefix_len = folio
        .char_indices()
        .find(|(_, ch)| !ch.is_alphabetic())
        .map(|(idx, _)| idx)
        .unwrap_or(folio.len());
    let prefix = match &folio[..prefix_len] {
        "" => DEFAULT_PREFIX,
        letters => letters,
    };

    let number = folio
        .chars()
        .filter_map(|ch| ch.to_digit(10))
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u64::from(digit))
        });

    (prefix, number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_yields_seed_folio() {
        assert_eq!(next_folio(None).as_str(), "F001");
        assert_eq!(next_folio(Some("")).as_str(), "F001");
        assert_eq!(next_folio(Some("   ")).as_str(), "F001");
    }

    #[test]
    fn increments_existing_folio() {
        assert_eq!(next_folio(Some("F007")).as_str(), "F008");
        assert_eq!(next_folio(Some("P005")).as_str(), "P006");
        assert_eq!(next_folio(Some(" F010 ")).as_str(), "F011");
    }

    #[test]
    fn four_digit_numbers_are_not_truncated() {
        let (_, number) = split_folio("F999");
        assert_eq!(number + 1, 1000);
        assert_eq!(next_folio(Some("F999")).as_str(), "F1000");
    }

    #[test]
    fn missing_prefix_uses_default_letter() {
        assert_eq!(next_folio(Some("041")).as_str(), "F042");
    }

    #[test]
    fn missing_digits_start_at_one() {
        assert_eq!(next_folio(Some("INV")).as_str(), "INV001");
    }

    #[test]
    fn digits_are_collected_from_the_whole_identifier() {
        assert_eq!(split_folio("A1B2"), ("A", 12));
        assert_eq!(next_folio(Some("A1B2")).as_str(), "A013");
    }

    #[test]
    fn oversized_numbers_saturate() {
        let (_, number) = split_folio("F99999999999999999999999");
        assert_eq!(number, u64::MAX);
        assert_eq!(
            next_folio(Some("F99999999999999999999999")).as_str(),
            format!("F{}", u64::MAX)
        );
    }
}
