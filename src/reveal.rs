use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GameError, Result};

/// Upper bound on words per puzzle. Every reveal code needs its own image
/// variant, so a puzzle with N words requires 2^N uploads before it can start.
pub const MAX_WORD_COUNT: u8 = 16;

/// Bit vector tracking which words of a puzzle have been found.
///
/// The string form ("reveal code") is derived on demand: word `i` maps to
/// character `i - 1` of the code, so the leftmost character is word 1 and a
/// set bit renders as `'1'`. The same convention keys the image map, making
/// `code()` directly usable as an image-lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundMask {
    word_count: u8,
    bits: u32,
}

impl FoundMask {
    pub fn new(word_count: u8) -> Result<Self> {
        if word_count == 0 || word_count > MAX_WORD_COUNT {
            return Err(GameError::WordCountOutOfRange);
        }
        Ok(Self {
            word_count,
            bits: 0,
        })
    }

    pub fn word_count(&self) -> u8 {
        self.word_count
    }

    fn in_range(&self, index: u8) -> bool {
        index >= 1 && index <= self.word_count
    }

    /// Mark word `index` (1-based) as found. Out-of-range indices are ignored;
    /// callers validate indices against the puzzle's word table first.
    pub fn set(&mut self, index: u8) {
        if self.in_range(index) {
            self.bits |= 1 << (index - 1);
        }
    }

    pub fn is_set(&self, index: u8) -> bool {
        self.in_range(index) && self.bits & (1 << (index - 1)) != 0
    }

    pub fn found_count(&self) -> u8 {
        self.bits.count_ones() as u8
    }

    pub fn is_full(&self) -> bool {
        self.found_count() == self.word_count
    }

    /// Fixed-width binary reveal code for the current mask.
    pub fn code(&self) -> String {
        (1..=self.word_count)
            .map(|i| if self.is_set(i) { '1' } else { '0' })
            .collect()
    }

    /// The code this mask would have if word `index` were also found.
    pub fn code_with(&self, index: u8) -> String {
        let mut next = *self;
        next.set(index);
        next.code()
    }

    /// Codes reachable from the current mask by finding any single missing
    /// word. Setup flows use this to enumerate the next frontier of image
    /// variants to collect.
    pub fn next_candidate_codes(&self) -> Vec<String> {
        (1..=self.word_count)
            .filter(|&i| !self.is_set(i))
            .map(|i| self.code_with(i))
            .collect()
    }

    /// Total number of image variants a puzzle of this size requires.
    pub fn variant_count(&self) -> usize {
        1usize << self.word_count
    }

    /// All 2^N codes, in ascending numeric order of the rightmost-word bit.
    pub fn all_codes(&self) -> Vec<String> {
        let n = self.word_count;
        (0..self.variant_count() as u32)
            .map(|bits| Self {
                word_count: n,
                bits,
            })
            .map(|m| m.code())
            .collect()
    }

    /// Parse a reveal code back into a mask, rejecting wrong width or any
    /// character outside {0,1}.
    pub fn parse_code(code: &str) -> Result<Self> {
        let width = code.chars().count();
        if width == 0 || width > MAX_WORD_COUNT as usize {
            return Err(GameError::InvalidRevealCode(code.to_string()));
        }
        let mut mask = Self::new(width as u8)?;
        for (pos, ch) in code.chars().enumerate() {
            match ch {
                '0' => {}
                '1' => mask.set(pos as u8 + 1),
                _ => return Err(GameError::InvalidRevealCode(code.to_string())),
            }
        }
        Ok(mask)
    }

    /// True when `code` is a well-formed reveal code for this mask's width.
    pub fn is_valid_code(&self, code: &str) -> bool {
        code.chars().count() == self.word_count as usize
            && code.chars().all(|c| c == '0' || c == '1')
    }
}

// Persist the mask as its code string. One representation on disk and in
// memory; the old dual mask/code invariant cannot be violated.
impl Serialize for FoundMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for FoundMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        FoundMask::parse_code(&code).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_new_rejects_zero_words() {
        assert_matches!(FoundMask::new(0), Err(GameError::WordCountOutOfRange));
    }

    #[test]
    fn test_new_rejects_oversized_puzzle() {
        assert_matches!(
            FoundMask::new(MAX_WORD_COUNT + 1),
            Err(GameError::WordCountOutOfRange)
        );
    }

    #[test]
    fn test_empty_mask_code_is_zero_padded() {
        let mask = FoundMask::new(5).unwrap();
        assert_eq!(mask.code(), "00000");
        assert_eq!(mask.found_count(), 0);
        assert!(!mask.is_full());
    }

    #[test]
    fn test_set_maps_word_one_to_leftmost_character() {
        let mut mask = FoundMask::new(4).unwrap();
        mask.set(1);
        assert_eq!(mask.code(), "1000");
        mask.set(4);
        assert_eq!(mask.code(), "1001");
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut mask = FoundMask::new(3).unwrap();
        mask.set(2);
        mask.set(2);
        assert_eq!(mask.code(), "010");
        assert_eq!(mask.found_count(), 1);
    }

    #[test]
    fn test_set_ignores_out_of_range_index() {
        let mut mask = FoundMask::new(3).unwrap();
        mask.set(0);
        mask.set(4);
        assert_eq!(mask.code(), "000");
    }

    #[test]
    fn test_is_full_with_all_bits() {
        let mut mask = FoundMask::new(2).unwrap();
        mask.set(1);
        assert!(!mask.is_full());
        mask.set(2);
        assert!(mask.is_full());
        assert_eq!(mask.code(), "11");
    }

    #[test]
    fn test_code_with_does_not_mutate() {
        let mask = FoundMask::new(3).unwrap();
        assert_eq!(mask.code_with(2), "010");
        assert_eq!(mask.code(), "000");
    }

    #[test]
    fn test_next_candidate_codes_from_empty() {
        let mask = FoundMask::new(3).unwrap();
        assert_eq!(mask.next_candidate_codes(), vec!["100", "010", "001"]);
    }

    #[test]
    fn test_next_candidate_codes_skip_found_words() {
        let mut mask = FoundMask::new(3).unwrap();
        mask.set(1);
        assert_eq!(mask.next_candidate_codes(), vec!["110", "101"]);
    }

    #[test]
    fn test_next_candidate_codes_empty_when_full() {
        let mut mask = FoundMask::new(1).unwrap();
        mask.set(1);
        assert!(mask.next_candidate_codes().is_empty());
    }

    #[test]
    fn test_all_codes_covers_power_set() {
        let mask = FoundMask::new(3).unwrap();
        let codes = mask.all_codes();
        assert_eq!(codes.len(), 8);
        assert!(codes.contains(&"000".to_string()));
        assert!(codes.contains(&"111".to_string()));
        assert!(codes.contains(&"101".to_string()));
        // No duplicates.
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
    }

    #[test]
    fn test_parse_code_roundtrip() {
        for code in ["1", "0", "010", "1101", "0000000000000001"] {
            let mask = FoundMask::parse_code(code).unwrap();
            assert_eq!(mask.code(), code);
        }
    }

    #[test]
    fn test_parse_code_rejects_bad_alphabet() {
        assert_matches!(
            FoundMask::parse_code("01a"),
            Err(GameError::InvalidRevealCode(_))
        );
    }

    #[test]
    fn test_parse_code_rejects_empty_and_oversized() {
        assert_matches!(FoundMask::parse_code(""), Err(GameError::InvalidRevealCode(_)));
        let long = "0".repeat(MAX_WORD_COUNT as usize + 1);
        assert_matches!(
            FoundMask::parse_code(&long),
            Err(GameError::InvalidRevealCode(_))
        );
    }

    #[test]
    fn test_is_valid_code() {
        let mask = FoundMask::new(3).unwrap();
        assert!(mask.is_valid_code("010"));
        assert!(!mask.is_valid_code("01"));
        assert!(!mask.is_valid_code("0100"));
        assert!(!mask.is_valid_code("01x"));
    }

    #[test]
    fn test_serde_as_code_string() {
        let mut mask = FoundMask::new(3).unwrap();
        mask.set(2);
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, "\"010\"");
        let back: FoundMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_code_stable_under_rederivation() {
        let mut mask = FoundMask::new(4).unwrap();
        mask.set(3);
        mask.set(1);
        let code = mask.code();
        let reparsed = FoundMask::parse_code(&code).unwrap();
        assert_eq!(reparsed.code(), code);
        assert_eq!(reparsed, mask);
    }
}
