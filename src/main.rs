use chrono::Utc;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tilehunt::flavor::{self, Flavor};
use tilehunt::puzzle::Puzzle;
use tilehunt::registry::{EndReport, GuessOutcome, JoinOutcome, Registry};
use tilehunt::store::FileSessionStore;
use tilehunt::{ChannelId, PlayerId};

/// local command-line driver for the tilehunt puzzle core
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Drives one tilehunt channel from stdin, standing in for the chat platform layer: it owns identities, fetches image bytes from disk, and triggers the expiry sweep by hand."
)]
struct Cli {
    /// directory holding the persisted sessions and permissions documents
    #[clap(short, long)]
    data_dir: Option<PathBuf>,

    /// channel id to operate in
    #[clap(short, long, default_value_t = 1)]
    channel: ChannelId,
}

const HELP: &str = "\
commands (player ids are plain numbers):
  setup <player> <grid> <words>   begin configuring a new puzzle
  word <num> <answer> <clue...>   set a word and its clue (during setup)
  done                            install the configured puzzle
  image <code> <path>             load an image variant from a file
  missing                         list reveal codes still lacking an image
  start <seconds>                 start the clock
  join <player>                   join the running game
  guess <player> <num> <word...>  guess a word
  hint <num>                      show a clue
  status <player>                 progress, score, time remaining
  board                           leaderboard
  wrongs                          all wrong guesses so far
  grant <command> <player>        restrict a command to granted players
  revoke <command> <player>       remove a grant
  end <player>                    end the game now
  sweep                           run the expiry check
  quit";

struct Driver {
    registry: Registry,
    channel: ChannelId,
    pending: Option<Puzzle>,
}

impl Driver {
    fn dispatch(&mut self, line: &str) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            return;
        };
        match command {
            "setup" => self.cmd_setup(args),
            "word" => self.cmd_word(args),
            "done" => self.cmd_done(),
            "image" => self.cmd_image(args),
            "missing" => self.cmd_missing(),
            "start" => self.cmd_start(args),
            "join" => self.cmd_join(args),
            "guess" => self.cmd_guess(args),
            "hint" => self.cmd_hint(args),
            "status" => self.cmd_status(args),
            "board" => self.cmd_board(),
            "wrongs" => self.cmd_wrongs(),
            "grant" => self.cmd_grant(args, true),
            "revoke" => self.cmd_grant(args, false),
            "end" => self.cmd_end(args),
            "sweep" => self.cmd_sweep(),
            "help" => println!("{HELP}"),
            other => println!("unknown command {other:?}, try `help`"),
        }
    }

    fn cmd_setup(&mut self, args: &[&str]) {
        let (Some(player), Some(grid), Some(words)) = (
            args.first().and_then(|a| a.parse::<PlayerId>().ok()),
            args.get(1).and_then(|a| a.parse::<u32>().ok()),
            args.get(2).and_then(|a| a.parse::<u8>().ok()),
        ) else {
            println!("usage: setup <player> <grid> <words>");
            return;
        };
        if !self.registry.is_allowed("setup", player) {
            println!("player {player} is not allowed to run setup here");
            return;
        }
        if let Err(err) = self.registry.begin_setup(self.channel) {
            println!("{err}");
            return;
        }
        match Puzzle::new(self.channel, grid, words) {
            Ok(puzzle) => {
                self.pending = Some(puzzle);
                println!("setup started: fill in {words} word(s) with `word`, then `done`");
            }
            Err(err) => {
                self.registry.cancel_setup(self.channel);
                println!("{err}");
            }
        }
    }

    fn cmd_word(&mut self, args: &[&str]) {
        let Some(pending) = self.pending.as_mut() else {
            println!("no setup in progress, run `setup` first");
            return;
        };
        let (Some(index), Some(answer)) =
            (args.first().and_then(|a| a.parse::<u8>().ok()), args.get(1))
        else {
            println!("usage: word <num> <answer> <clue...>");
            return;
        };
        let clue = args[2..].join(" ");
        match pending.add_word(index, answer, &clue) {
            Ok(()) => println!("word {index} set"),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_done(&mut self) {
        let Some(puzzle) = self.pending.take() else {
            println!("no setup in progress");
            return;
        };
        let missing = puzzle.missing_codes().len();
        match self.registry.finish_setup(self.channel, puzzle) {
            Ok(()) => println!(
                "puzzle installed; supply {missing} image variant(s) with `image`, then `start`"
            ),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_image(&mut self, args: &[&str]) {
        let (Some(code), Some(path)) = (args.first(), args.get(1)) else {
            println!("usage: image <code> <path>");
            return;
        };
        // The core only accepts bytes; fetching is this layer's job, and a
        // failed fetch is reported per image without aborting setup.
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                println!("failed to read image for code {code}: {err}");
                return;
            }
        };
        match self.registry.add_image(self.channel, code, bytes) {
            Ok(()) => println!("image stored for code {code}"),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_missing(&mut self) {
        match self.registry.missing_codes(self.channel) {
            Ok(codes) if codes.is_empty() => println!("all image variants supplied"),
            Ok(codes) => println!("missing: {}", codes.join(", ")),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_start(&mut self, args: &[&str]) {
        let Some(seconds) = args.first().and_then(|a| a.parse::<u32>().ok()) else {
            println!("usage: start <seconds>");
            return;
        };
        match self.registry.start(self.channel, Utc::now(), seconds) {
            Ok(report) => {
                println!("{}", flavor::pick(Flavor::GameStart));
                println!(
                    "grid {0}x{0}, {1} words, ends in {2}s",
                    report.grid_size, report.word_count, report.duration_secs
                );
                for (index, clue) in &report.clues {
                    println!("word {index}: {clue}");
                }
                if let Some(image) = &report.cover_image {
                    println!("[cover image, {} bytes]", image.len());
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_join(&mut self, args: &[&str]) {
        let Some(player) = args.first().and_then(|a| a.parse::<PlayerId>().ok()) else {
            println!("usage: join <player>");
            return;
        };
        match self.registry.join(self.channel, player) {
            Ok(JoinOutcome::Joined { cover_image }) => {
                println!("{}", flavor::pick(Flavor::Welcome));
                if let Some(image) = cover_image {
                    println!("[cover image, {} bytes]", image.len());
                }
            }
            Ok(JoinOutcome::AlreadyJoined) => println!("you're already in the game"),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_guess(&mut self, args: &[&str]) {
        let (Some(player), Some(index)) = (
            args.first().and_then(|a| a.parse::<PlayerId>().ok()),
            args.get(1).and_then(|a| a.parse::<u8>().ok()),
        ) else {
            println!("usage: guess <player> <num> <word...>");
            return;
        };
        let guess = args[2..].join(" ");
        match self
            .registry
            .guess(self.channel, player, index, &guess, Utc::now())
        {
            Ok(GuessOutcome::Correct {
                index,
                reveal_code,
                image,
                finished,
            }) => {
                println!(
                    "{} word {index} found!",
                    flavor::pick(Flavor::CorrectGuess)
                );
                if let Some(image) = image {
                    println!("[reveal image {reveal_code}, {} bytes]", image.len());
                }
                if let Some(report) = finished {
                    println!("{}", flavor::pick(Flavor::GameEnd));
                    print_end(&report);
                }
            }
            Ok(GuessOutcome::Incorrect) => println!("{}", flavor::pick(Flavor::WrongGuess)),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_hint(&mut self, args: &[&str]) {
        let Some(index) = args.first().and_then(|a| a.parse::<u8>().ok()) else {
            println!("usage: hint <num>");
            return;
        };
        match self.registry.hint(self.channel, index) {
            Ok(clue) => println!("{} {clue}", flavor::pick(Flavor::Hint)),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_status(&mut self, args: &[&str]) {
        let Some(player) = args.first().and_then(|a| a.parse::<PlayerId>().ok()) else {
            println!("usage: status <player>");
            return;
        };
        match self.registry.status(self.channel, player, Utc::now()) {
            Ok(status) => {
                println!(
                    "words found: {}/{}, players: {}, your score: {}",
                    status.found_count, status.word_count, status.player_count, status.your_score
                );
                if let Some(secs) = status.remaining_seconds {
                    println!("time remaining: {secs}s");
                }
                for (rank, (player, score)) in status.top.iter().enumerate() {
                    println!("{}. player {player}: {score} word(s)", rank + 1);
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_board(&mut self) {
        match self.registry.leaderboard(self.channel) {
            Ok(board) => print_board(&board),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_wrongs(&mut self) {
        match self.registry.wrong_guesses(self.channel) {
            Ok(log) if log.is_empty() => println!("no wrong guesses yet"),
            Ok(log) => {
                for (index, guesses) in log {
                    println!("word {index}: {}", guesses.join(", "));
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_grant(&mut self, args: &[&str], grant: bool) {
        let (Some(command), Some(player)) = (
            args.first(),
            args.get(1).and_then(|a| a.parse::<PlayerId>().ok()),
        ) else {
            println!("usage: grant|revoke <command> <player>");
            return;
        };
        let result = if grant {
            self.registry.grant_permission(command, player)
        } else {
            self.registry.revoke_permission(command, player)
        };
        match result {
            Ok(true) => println!("permissions updated"),
            Ok(false) => println!("no change"),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_end(&mut self, args: &[&str]) {
        let Some(player) = args.first().and_then(|a| a.parse::<PlayerId>().ok()) else {
            println!("usage: end <player>");
            return;
        };
        if !self.registry.is_allowed("end", player) {
            println!("player {player} is not allowed to end the game");
            return;
        }
        match self.registry.end(self.channel) {
            Ok(Some(report)) => {
                println!("{}", flavor::pick(Flavor::GameEnd));
                print_end(&report);
            }
            Ok(None) => println!("no game in this channel"),
            Err(err) => println!("{err}"),
        }
    }

    fn cmd_sweep(&mut self) {
        let reports = self.registry.sweep(Utc::now());
        if reports.is_empty() {
            println!("nothing expired");
        }
        for report in reports {
            println!("time's up in channel {}!", report.channel_id);
            print_end(&report);
        }
    }
}

fn print_board(board: &[(PlayerId, u32)]) {
    if board.is_empty() {
        println!("no scores yet");
    }
    for (rank, (player, score)) in board.iter().enumerate() {
        println!("{}. player {player}: {score} word(s)", rank + 1);
    }
}

fn print_end(report: &EndReport) {
    print_board(&report.leaderboard);
    if let Some(image) = &report.solved_image {
        println!("[solved image, {} bytes]", image.len());
    }
}

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = match &cli.data_dir {
        Some(dir) => FileSessionStore::with_dir(dir),
        None => FileSessionStore::new(),
    };
    let mut driver = Driver {
        registry: Registry::new(Box::new(store)),
        channel: cli.channel,
        pending: None,
    };

    println!("tilehunt: channel {} (`help` for commands)", cli.channel);
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line == "quit" || line == "exit" {
            break;
        }
        driver.dispatch(line);
    }
    Ok(())
}
