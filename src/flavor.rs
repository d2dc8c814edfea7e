use rand::seq::SliceRandom;

/// Category of flavor text shown alongside game responses. Cosmetic only;
/// game logic never branches on the chosen phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Welcome,
    CorrectGuess,
    WrongGuess,
    GameStart,
    Hint,
    GameEnd,
}

const WELCOME: &[&str] = &[
    "A new puzzler lands in the nest!",
    "Great to have you aboard, word hunter!",
    "Welcome in! Grab a clue and start pecking.",
];

const CORRECT_GUESS: &[&str] = &[
    "Cracked it! Another tile falls.",
    "Sharp eyes! The picture grows clearer.",
    "That's the one! Keep them coming.",
];

const WRONG_GUESS: &[&str] = &[
    "Not this time. Keep at it!",
    "Close, maybe. But no tile for that one.",
    "The grid stays stubborn. Try another angle!",
];

const GAME_START: &[&str] = &[
    "The hunt is on! First clue takers, step up.",
    "Tiles locked, clues posted. Go!",
    "A fresh grid awaits. Let the guessing begin!",
];

const HINT: &[&str] = &[
    "A little whisper for you...",
    "Lean in, here's a nudge...",
    "Between us, consider this...",
];

const GAME_END: &[&str] = &[
    "All tiles turned! The picture is whole.",
    "That's a wrap on this grid. Well hunted!",
    "Game over. Rest those guessing fingers.",
];

impl Flavor {
    fn phrases(self) -> &'static [&'static str] {
        match self {
            Flavor::Welcome => WELCOME,
            Flavor::CorrectGuess => CORRECT_GUESS,
            Flavor::WrongGuess => WRONG_GUESS,
            Flavor::GameStart => GAME_START,
            Flavor::Hint => HINT,
            Flavor::GameEnd => GAME_END,
        }
    }
}

/// Uniform-random phrase for the given category.
pub fn pick(flavor: Flavor) -> &'static str {
    let phrases = flavor.phrases();
    phrases
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(phrases[0])
}
