use chrono::{DateTime, Utc};
use log::{error, info};
use std::collections::HashSet;

use crate::error::{GameError, Result};
use crate::puzzle::Puzzle;
use crate::store::{CommandPermissions, SessionMap, SessionStore};
use crate::{ChannelId, PlayerId};

/// Entries shown on the end-of-game leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;
/// Entries shown in the in-game status summary.
const STATUS_TOP: usize = 3;

/// Everything the announcement layer needs when a game starts.
#[derive(Debug, Clone, PartialEq)]
pub struct StartReport {
    pub grid_size: u32,
    pub word_count: u8,
    pub clues: Vec<(u8, String)>,
    pub cover_image: Option<Vec<u8>>,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined { cover_image: Option<Vec<u8>> },
    AlreadyJoined,
}

/// Result of a guess routed through the registry. A correct final word ends
/// the game inline and carries the end report.
#[derive(Debug, Clone, PartialEq)]
pub enum GuessOutcome {
    Correct {
        index: u8,
        reveal_code: String,
        image: Option<Vec<u8>>,
        finished: Option<EndReport>,
    },
    Incorrect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndReport {
    pub channel_id: ChannelId,
    pub leaderboard: Vec<(PlayerId, u32)>,
    pub solved_image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub found_count: u8,
    pub word_count: u8,
    pub player_count: usize,
    pub your_score: u32,
    pub remaining_seconds: Option<i64>,
    pub top: Vec<(PlayerId, u32)>,
}

/// Owns every active session, keyed by channel, with an injected store.
///
/// One session per channel. All mutations are write-through: the store save
/// completes before the triggering call returns. Removal from the session
/// map is the linearization point for ending a game, so a timeout sweep and
/// a completion-triggered end cannot both finalize the same session.
pub struct Registry {
    sessions: SessionMap,
    setup_in_progress: HashSet<ChannelId>,
    permissions: CommandPermissions,
    store: Box<dyn SessionStore>,
}

impl Registry {
    /// Construct with load-on-start semantics: both persisted documents are
    /// read immediately.
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        let sessions = store.load_sessions();
        let permissions = store.load_permissions();
        if !sessions.is_empty() {
            info!("restored {} active game(s)", sessions.len());
        }
        Self {
            sessions,
            setup_in_progress: HashSet::new(),
            permissions,
            store,
        }
    }

    fn persist(&self) -> Result<()> {
        self.store.save_sessions(&self.sessions)?;
        self.store.save_permissions(&self.permissions)?;
        Ok(())
    }

    pub fn session(&self, channel: ChannelId) -> Option<&Puzzle> {
        self.sessions.get(&channel)
    }

    pub fn active_channels(&self) -> Vec<ChannelId> {
        self.sessions.keys().copied().collect()
    }

    // --- setup ---

    /// Guard against two concurrent setup flows in the same channel.
    pub fn begin_setup(&mut self, channel: ChannelId) -> Result<()> {
        if !self.setup_in_progress.insert(channel) {
            return Err(GameError::SetupInProgress);
        }
        Ok(())
    }

    pub fn cancel_setup(&mut self, channel: ChannelId) {
        self.setup_in_progress.remove(&channel);
    }

    /// Install the configured puzzle, replacing any previous session in the
    /// channel, and release the setup guard.
    pub fn finish_setup(&mut self, channel: ChannelId, puzzle: Puzzle) -> Result<()> {
        self.setup_in_progress.remove(&channel);
        self.sessions.insert(channel, puzzle);
        self.persist()
    }

    pub fn add_image(&mut self, channel: ChannelId, code: &str, bytes: Vec<u8>) -> Result<()> {
        let session = self.sessions.get_mut(&channel).ok_or(GameError::NoGame)?;
        session.add_image(code, bytes)?;
        self.persist()
    }

    pub fn missing_codes(&self, channel: ChannelId) -> Result<Vec<String>> {
        let session = self.sessions.get(&channel).ok_or(GameError::NoGame)?;
        Ok(session.missing_codes())
    }

    // --- lifecycle ---

    pub fn start(
        &mut self,
        channel: ChannelId,
        now: DateTime<Utc>,
        duration_secs: u32,
    ) -> Result<StartReport> {
        let session = self.sessions.get_mut(&channel).ok_or(GameError::NoGame)?;
        session.start(now, duration_secs)?;
        let report = StartReport {
            grid_size: session.grid_size,
            word_count: session.word_count(),
            clues: session
                .clues()
                .iter()
                .map(|(&index, clue)| (index, clue.clone()))
                .collect(),
            cover_image: session.cover_image().map(<[u8]>::to_vec),
            duration_secs,
        };
        self.persist()?;
        info!("game started in channel {channel}, ends in {duration_secs}s");
        Ok(report)
    }

    pub fn join(&mut self, channel: ChannelId, player: PlayerId) -> Result<JoinOutcome> {
        let session = self.sessions.get_mut(&channel).ok_or(GameError::NoGame)?;
        if !session.join(player) {
            return Ok(JoinOutcome::AlreadyJoined);
        }
        let cover_image = session.cover_image().map(<[u8]>::to_vec);
        self.persist()?;
        Ok(JoinOutcome::Joined { cover_image })
    }

    /// Route a guess to the channel's session.
    ///
    /// Rejected outright when there is no game, the player never joined, the
    /// word number does not exist, or the end time has passed (the sweep may
    /// simply not have noticed yet). A correct guess scores a point for the
    /// guesser; the final correct guess also ends the game.
    pub fn guess(
        &mut self,
        channel: ChannelId,
        player: PlayerId,
        index: u8,
        raw_guess: &str,
        now: DateTime<Utc>,
    ) -> Result<GuessOutcome> {
        let session = self.sessions.get_mut(&channel).ok_or(GameError::NoGame)?;
        if !session.has_player(player) {
            return Err(GameError::NotJoined);
        }
        if session.is_past_end(now) {
            return Err(GameError::GameOver);
        }
        if !session.has_word(index) {
            return Err(GameError::UnknownWord(index));
        }

        if !session.check_guess(index, raw_guess) {
            // Wrong guesses still mutate the guess log.
            self.persist()?;
            return Ok(GuessOutcome::Incorrect);
        }

        session.award_point(player);
        let reveal_code = session.reveal_code();
        let image = session.current_image().map(<[u8]>::to_vec);
        let complete = session.is_complete();
        self.persist()?;

        let finished = if complete { self.end(channel)? } else { None };
        Ok(GuessOutcome::Correct {
            index,
            reveal_code,
            image,
            finished,
        })
    }

    /// The single authoritative end-of-game entry point. Popping the session
    /// is the linearization point; a second call for the same channel is a
    /// silent no-op.
    pub fn end(&mut self, channel: ChannelId) -> Result<Option<EndReport>> {
        let Some(session) = self.sessions.remove(&channel) else {
            return Ok(None);
        };
        self.persist()?;
        info!(
            "game ended in channel {channel} with {}/{} words found",
            session.found_count(),
            session.word_count()
        );
        Ok(Some(EndReport {
            channel_id: channel,
            leaderboard: session.leaderboard(LEADERBOARD_SIZE),
            solved_image: session.solved_image().map(<[u8]>::to_vec),
        }))
    }

    /// Periodic expiry check, invoked by the external scheduler. Finalizes
    /// every session whose end time has passed, each exactly once.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<EndReport> {
        let expired: Vec<ChannelId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_past_end(now))
            .map(|(&channel, _)| channel)
            .collect();

        let mut reports = Vec::new();
        for channel in expired {
            match self.end(channel) {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(err) => error!("failed to finalize expired game in channel {channel}: {err}"),
            }
        }
        reports
    }

    // --- queries ---

    pub fn hint(&self, channel: ChannelId, index: u8) -> Result<&str> {
        let session = self.sessions.get(&channel).ok_or(GameError::NoGame)?;
        session.clue(index).ok_or(GameError::UnknownWord(index))
    }

    pub fn status(
        &self,
        channel: ChannelId,
        player: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<StatusReport> {
        let session = self.sessions.get(&channel).ok_or(GameError::NoGame)?;
        Ok(StatusReport {
            found_count: session.found_count(),
            word_count: session.word_count(),
            player_count: session.player_count(),
            your_score: session.score_of(player),
            remaining_seconds: session.remaining_seconds(now),
            top: session.leaderboard(STATUS_TOP),
        })
    }

    pub fn leaderboard(&self, channel: ChannelId) -> Result<Vec<(PlayerId, u32)>> {
        let session = self.sessions.get(&channel).ok_or(GameError::NoGame)?;
        Ok(session.leaderboard(LEADERBOARD_SIZE))
    }

    pub fn wrong_guesses(&self, channel: ChannelId) -> Result<Vec<(u8, Vec<String>)>> {
        let session = self.sessions.get(&channel).ok_or(GameError::NoGame)?;
        Ok(session
            .guess_log()
            .iter()
            .map(|(&index, guesses)| (index, guesses.clone()))
            .collect())
    }

    // --- permissions ---

    pub fn grant_permission(&mut self, command: &str, id: PlayerId) -> Result<bool> {
        let changed = self.permissions.grant(command, id);
        if changed {
            self.store.save_permissions(&self.permissions)?;
        }
        Ok(changed)
    }

    pub fn revoke_permission(&mut self, command: &str, id: PlayerId) -> Result<bool> {
        let changed = self.permissions.revoke(command, id);
        if changed {
            self.store.save_permissions(&self.permissions)?;
        }
        Ok(changed)
    }

    pub fn is_allowed(&self, command: &str, id: PlayerId) -> bool {
        self.permissions.is_allowed(command, id)
    }
}
