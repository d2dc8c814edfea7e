use directories::ProjectDirs;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::puzzle::Puzzle;
use crate::{ChannelId, PlayerId};

/// Per-command allow lists. A command with no entry is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandPermissions {
    commands: BTreeMap<String, Vec<PlayerId>>,
}

impl CommandPermissions {
    /// Returns false if the id was already granted.
    pub fn grant(&mut self, command: &str, id: PlayerId) -> bool {
        let ids = self.commands.entry(command.to_string()).or_default();
        if ids.contains(&id) {
            false
        } else {
            ids.push(id);
            true
        }
    }

    pub fn revoke(&mut self, command: &str, id: PlayerId) -> bool {
        let Some(ids) = self.commands.get_mut(command) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|&existing| existing != id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            self.commands.remove(command);
        }
        removed
    }

    pub fn is_allowed(&self, command: &str, id: PlayerId) -> bool {
        match self.commands.get(command) {
            Some(ids) => ids.contains(&id),
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

pub type SessionMap = BTreeMap<ChannelId, Puzzle>;

/// Durable storage for the two independent documents: the sessions map and
/// the command permissions table.
///
/// Loads are forgiving (missing file is a normal empty start; a malformed
/// file is logged and discarded rather than partially recovered). Saves are
/// all-or-nothing: readers never observe a half-written document.
pub trait SessionStore {
    fn load_sessions(&self) -> SessionMap;
    fn save_sessions(&self, sessions: &SessionMap) -> io::Result<()>;
    fn load_permissions(&self) -> CommandPermissions;
    fn save_permissions(&self, permissions: &CommandPermissions) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    sessions_path: PathBuf,
    permissions_path: PathBuf,
}

impl FileSessionStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_dir(Self::default_dir())
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            sessions_path: dir.join("sessions.json"),
            permissions_path: dir.join("permissions.json"),
        }
    }

    /// State directory under $HOME/.local/state, falling back to the
    /// platform-specific data dir, then to the working directory.
    pub fn default_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("tilehunt")
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "tilehunt") {
            proj_dirs.data_local_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }

    pub fn sessions_path(&self) -> &Path {
        &self.sessions_path
    }

    /// Write via a temp sibling and rename, so a crash mid-save leaves the
    /// previous document intact.
    fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)
    }

    fn load_document<T: Default + for<'de> Deserialize<'de>>(path: &Path, what: &str) -> T {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("no saved {what} found at {}", path.display());
                return T::default();
            }
            Err(err) => {
                error!("error reading {what} from {}: {err}", path.display());
                return T::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                info!("{what} loaded from {}", path.display());
                value
            }
            Err(err) => {
                // Discard on corruption, per design; prior state is lost.
                error!("error decoding {what} from {}: {err}", path.display());
                T::default()
            }
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load_sessions(&self) -> SessionMap {
        Self::load_document(&self.sessions_path, "games")
    }

    fn save_sessions(&self, sessions: &SessionMap) -> io::Result<()> {
        let data = serde_json::to_vec(sessions).map_err(io::Error::from)?;
        Self::write_atomic(&self.sessions_path, &data)?;
        info!("games saved to {}", self.sessions_path.display());
        Ok(())
    }

    fn load_permissions(&self) -> CommandPermissions {
        Self::load_document(&self.permissions_path, "command permissions")
    }

    fn save_permissions(&self, permissions: &CommandPermissions) -> io::Result<()> {
        let data = serde_json::to_vec(permissions).map_err(io::Error::from)?;
        Self::write_atomic(&self.permissions_path, &data)?;
        info!(
            "command permissions saved to {}",
            self.permissions_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_sessions() -> SessionMap {
        let mut puzzle = Puzzle::new(42, 5, 2).unwrap();
        puzzle.add_word(1, "stork", "a bird").unwrap();
        puzzle.add_word(2, "nest", "its home").unwrap();
        puzzle.add_image("00", vec![0, 1, 2]).unwrap();
        puzzle.join(7);
        assert!(puzzle.check_guess(1, "stork"));
        puzzle.award_point(7);

        let mut sessions = SessionMap::new();
        sessions.insert(42, puzzle);
        sessions.insert(43, Puzzle::new(43, 3, 1).unwrap());
        sessions
    }

    #[test]
    fn test_missing_files_load_empty() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());
        assert!(store.load_sessions().is_empty());
        assert!(store.load_permissions().is_empty());
    }

    #[test]
    fn test_sessions_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());
        let sessions = sample_sessions();

        store.save_sessions(&sessions).unwrap();
        let loaded = store.load_sessions();

        assert_eq!(loaded, sessions);
        let game = &loaded[&42];
        assert_eq!(game.reveal_code(), "10");
        assert_eq!(game.score_of(7), 1);
        assert_eq!(game.player_count(), 1);
        assert_eq!(game.image_for("00"), Some([0, 1, 2].as_slice()));
    }

    #[test]
    fn test_malformed_sessions_file_discarded() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());
        fs::write(store.sessions_path(), b"{ not json").unwrap();
        assert!(store.load_sessions().is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());
        store.save_sessions(&sample_sessions()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sessions.json".to_string()]);
    }

    #[test]
    fn test_save_overwrites_previous_document() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());
        store.save_sessions(&sample_sessions()).unwrap();
        store.save_sessions(&SessionMap::new()).unwrap();
        assert!(store.load_sessions().is_empty());
    }

    #[test]
    fn test_permissions_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());

        let mut permissions = CommandPermissions::default();
        assert!(permissions.grant("setup", 7));
        assert!(permissions.grant("setup", 8));
        assert!(!permissions.grant("setup", 7));

        store.save_permissions(&permissions).unwrap();
        let loaded = store.load_permissions();
        assert_eq!(loaded, permissions);
        assert!(loaded.is_allowed("setup", 7));
        assert!(!loaded.is_allowed("setup", 9));
    }

    #[test]
    fn test_permissions_unlisted_command_is_open() {
        let permissions = CommandPermissions::default();
        assert!(permissions.is_allowed("guess", 1));
    }

    #[test]
    fn test_permissions_revoke() {
        let mut permissions = CommandPermissions::default();
        permissions.grant("end", 7);
        assert!(permissions.revoke("end", 7));
        assert!(!permissions.revoke("end", 7));
        // Last grant removed: the command is unrestricted again.
        assert!(permissions.is_allowed("end", 9));
    }

    #[test]
    fn test_sessions_document_keys_channels_as_strings() {
        let sessions = sample_sessions();
        let json = serde_json::to_string(&sessions).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("42").is_some());
        assert!(value.get("43").is_some());
    }
}
