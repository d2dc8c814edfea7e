use thiserror::Error;

use crate::reveal::MAX_WORD_COUNT;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("word count must be between 1 and {MAX_WORD_COUNT}")]
    WordCountOutOfRange,
    #[error("grid size must be a positive number")]
    InvalidGridSize,
    #[error("word number {0} is not part of this puzzle")]
    UnknownWord(u8),
    #[error("reveal code {0:?} does not match this puzzle")]
    InvalidRevealCode(String),
    #[error("no game in this channel")]
    NoGame,
    #[error("a setup is already in progress in this channel")]
    SetupInProgress,
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("missing {0} image(s); every reveal code needs one before start")]
    ImagesIncomplete(usize),
    #[error("duration must be a positive number of seconds")]
    InvalidDuration,
    #[error("join the game first")]
    NotJoined,
    #[error("the game is over, no more guesses are accepted")]
    GameOver,
    #[error("failed to persist game state: {0}")]
    Store(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GameError>;
