use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GameError, Result};
use crate::reveal::FoundMask;
use crate::{ChannelId, PlayerId};

/// Serialize image payloads as base64 strings so the sessions document stays
/// a plain JSON file.
mod image_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        images: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = images
            .iter()
            .map(|(code, bytes)| (code.as_str(), STANDARD.encode(bytes)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(code, data)| {
                STANDARD
                    .decode(data.as_bytes())
                    .map(|bytes| (code, bytes))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// Strip everything outside `[0-9A-Za-z_]` and lowercase the rest. Applied to
/// both the stored answer and the guess at comparison time, never at storage
/// time, so "Fire-Bird!" matches "firebird".
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// One running puzzle game, scoped to one channel.
///
/// Words are 1-based; word `i` owns character `i - 1` of the reveal code.
/// `check_guess` is the only path that sets a found bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub channel_id: ChannelId,
    /// Display hint only (e.g. 5 for a 5x5 tile grid).
    pub grid_size: u32,
    words: BTreeMap<u8, String>,
    clues: BTreeMap<u8, String>,
    #[serde(with = "image_bytes")]
    images: BTreeMap<String, Vec<u8>>,
    found: FoundMask,
    players: BTreeSet<PlayerId>,
    scores: BTreeMap<PlayerId, u32>,
    guess_log: BTreeMap<u8, Vec<String>>,
    started_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    duration_secs: Option<u32>,
}

impl Puzzle {
    pub fn new(channel_id: ChannelId, grid_size: u32, word_count: u8) -> Result<Self> {
        if grid_size == 0 {
            return Err(GameError::InvalidGridSize);
        }
        Ok(Self {
            channel_id,
            grid_size,
            words: BTreeMap::new(),
            clues: BTreeMap::new(),
            images: BTreeMap::new(),
            found: FoundMask::new(word_count)?,
            players: BTreeSet::new(),
            scores: BTreeMap::new(),
            guess_log: BTreeMap::new(),
            started_at: None,
            ends_at: None,
            duration_secs: None,
        })
    }

    pub fn word_count(&self) -> u8 {
        self.found.word_count()
    }

    // --- setup ---

    /// Add or overwrite a word and its clue. Valid only before the game
    /// starts.
    pub fn add_word(&mut self, index: u8, word: &str, clue: &str) -> Result<()> {
        if self.has_started() {
            return Err(GameError::AlreadyStarted);
        }
        if index < 1 || index > self.word_count() {
            return Err(GameError::UnknownWord(index));
        }
        self.words.insert(index, word.trim().to_string());
        self.clues.insert(index, clue.trim().to_string());
        Ok(())
    }

    /// Accept an image payload for one reveal code. The core never fetches
    /// bytes itself; the upload flow hands them in.
    pub fn add_image(&mut self, code: &str, bytes: Vec<u8>) -> Result<()> {
        if !self.found.is_valid_code(code) {
            return Err(GameError::InvalidRevealCode(code.to_string()));
        }
        self.images.insert(code.to_string(), bytes);
        Ok(())
    }

    pub fn images_complete(&self) -> bool {
        self.images.len() == self.found.variant_count()
    }

    pub fn missing_codes(&self) -> Vec<String> {
        self.found
            .all_codes()
            .into_iter()
            .filter(|code| !self.images.contains_key(code))
            .collect()
    }

    pub fn next_candidate_codes(&self) -> Vec<String> {
        self.found.next_candidate_codes()
    }

    // --- gameplay ---

    /// The single authoritative word-completion transition.
    ///
    /// Returns false without mutation when the index is unknown or already
    /// found. On a wrong guess, logs the normalized guess. Scoring is the
    /// caller's job on a true result.
    pub fn check_guess(&mut self, index: u8, raw_guess: &str) -> bool {
        let Some(answer) = self.words.get(&index) else {
            return false;
        };
        if self.found.is_set(index) {
            return false;
        }
        let guess = normalize(raw_guess);
        if guess == normalize(answer) {
            self.found.set(index);
            true
        } else {
            self.guess_log.entry(index).or_default().push(guess);
            false
        }
    }

    pub fn has_word(&self, index: u8) -> bool {
        self.words.contains_key(&index)
    }

    pub fn is_found(&self, index: u8) -> bool {
        self.found.is_set(index)
    }

    pub fn is_complete(&self) -> bool {
        self.found.is_full()
    }

    pub fn found_count(&self) -> u8 {
        self.found.found_count()
    }

    pub fn reveal_code(&self) -> String {
        self.found.code()
    }

    pub fn clue(&self, index: u8) -> Option<&str> {
        self.clues.get(&index).map(String::as_str)
    }

    pub fn clues(&self) -> &BTreeMap<u8, String> {
        &self.clues
    }

    pub fn guess_log(&self) -> &BTreeMap<u8, Vec<String>> {
        &self.guess_log
    }

    // --- timing ---

    /// Start the clock. Requires the full 2^N image set and a nonzero
    /// duration; the end time is fixed here and never moves again.
    pub fn start(&mut self, now: DateTime<Utc>, duration_secs: u32) -> Result<()> {
        if self.has_started() {
            return Err(GameError::AlreadyStarted);
        }
        if duration_secs == 0 {
            return Err(GameError::InvalidDuration);
        }
        if !self.images_complete() {
            return Err(GameError::ImagesIncomplete(self.missing_codes().len()));
        }
        self.started_at = Some(now);
        self.ends_at = Some(now + Duration::seconds(duration_secs as i64));
        self.duration_secs = Some(duration_secs);
        Ok(())
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    pub fn is_past_end(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.map_or(false, |ends| now >= ends)
    }

    /// Seconds until the end time, floored at zero. None if never started.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.ends_at
            .map(|ends| (ends - now).num_seconds().max(0))
    }

    // --- players and scores ---

    /// Returns false if the player was already in the game.
    pub fn join(&mut self, player: PlayerId) -> bool {
        self.players.insert(player)
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Scoring hook: 1 point per word, attributed to whoever submitted the
    /// winning guess.
    pub fn award_point(&mut self, player: PlayerId) {
        *self.scores.entry(player).or_insert(0) += 1;
    }

    pub fn score_of(&self, player: PlayerId) -> u32 {
        self.scores.get(&player).copied().unwrap_or(0)
    }

    /// Scores in descending order, ties broken by ascending player id.
    pub fn leaderboard(&self, limit: usize) -> Vec<(PlayerId, u32)> {
        self.scores
            .iter()
            .map(|(&player, &score)| (player, score))
            .sorted_by_key(|&(player, score)| (Reverse(score), player))
            .take(limit)
            .collect()
    }

    // --- image lookup boundary ---

    pub fn image_for(&self, code: &str) -> Option<&[u8]> {
        self.images.get(code).map(Vec::as_slice)
    }

    /// Image matching the current reveal state.
    pub fn current_image(&self) -> Option<&[u8]> {
        self.image_for(&self.reveal_code())
    }

    /// All-zeros variant, shown when the game opens.
    pub fn cover_image(&self) -> Option<&[u8]> {
        self.image_for(&"0".repeat(self.word_count() as usize))
    }

    /// All-ones variant, shown when the game ends solved.
    pub fn solved_image(&self) -> Option<&[u8]> {
        self.image_for(&"1".repeat(self.word_count() as usize))
    }
}
