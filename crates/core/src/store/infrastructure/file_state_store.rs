use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use crate::store::domain::state_store::{StateKey, StateStore, StoreError};

/// One text file per cell (`<dir>/<key>.txt`), shared between processes.
///
/// Writes go to a process-unique temp file which is then renamed over the
/// cell, so a reader in another process never sees a half-written value.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cell_path(&self, key: StateKey) -> PathBuf {
        self.dir.join(format!("{}.txt", key.name()))
    }

    fn temp_path(&self, key: StateKey) -> PathBuf {
        let thread_id = format!("{:?}", std::thread::current().id());
        let thread_tag: String = thread_id.chars().filter(char::is_ascii_digit).collect();
        self.dir.join(format!(
            ".{}.{}-{}.part",
            key.name(),
            std::process::id(),
            thread_tag
        ))
    }
}

impl StateStore for FileStateStore {
    fn read_raw(&self, key: StateKey) -> Option<String> {
        match fs::read_to_string(self.cell_path(key)) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Unable to read {key}: {e}");
                None
            }
        }
    }

    fn write_raw(&self, key: StateKey, value: &str) -> Result<(), StoreError> {
        let to_store_error = |source| StoreError::Write { key, source };

        fs::create_dir_all(&self.dir).map_err(to_store_error)?;
        let temp_path = self.temp_path(key);
        let mut file = fs::File::create(&temp_path).map_err(to_store_error)?;
        file.write_all(value.as_bytes()).map_err(to_store_error)?;
        file.sync_all().map_err(to_store_error)?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, self.cell_path(key)) {
            let _ = fs::remove_file(&temp_path);
            return Err(to_store_error(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_missing_cell_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert_eq!(store.read_raw(StateKey::Done), None);
        assert_eq!(store.get_int(StateKey::NumPlayers), 0);
        assert!(!store.get_bool(StateKey::GameStart));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.set_int(StateKey::NumPlayers, 3).unwrap();
        assert_eq!(store.get_int(StateKey::NumPlayers), 3);
        assert_eq!(
            fs::read_to_string(dir.path().join("numPlayers.txt")).unwrap(),
            "3"
        );
    }

    #[test]
    fn test_overwrite_replaces_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.set_int(StateKey::NumPlayers, 12).unwrap();
        store.set_int(StateKey::NumPlayers, 4).unwrap();
        assert_eq!(store.read_raw(StateKey::NumPlayers).as_deref(), Some("4"));
    }

    #[test]
    fn test_reads_cells_written_by_hand() {
        // Operators and the downstream consumer edit cells with plain tools.
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("done.txt"), "1\n").unwrap();
        fs::write(dir.path().join("gameStart.txt"), "banana").unwrap();
        let store = FileStateStore::new(dir.path());

        let snap = store.snapshot();

        assert!(snap.done);
        assert!(!snap.game_start);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("cells"));
        store.set_bool(StateKey::ScanningComplete, true).unwrap();
        assert!(store.get_bool(StateKey::ScanningComplete));
    }

    #[test]
    fn test_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.reset_all().unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n.ends_with(".txt")));
    }

    #[test]
    fn test_write_into_unwritable_location_fails() {
        let store = FileStateStore::new("/proc/definitely/not/here");
        assert!(store.set_int(StateKey::Done, 1).is_err());
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStateStore::new(dir.path()));
        store.set_int(StateKey::NumPlayers, 1111).unwrap();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let value = if i % 2 == 0 { 2222 } else { 1111 };
                    store.set_int(StateKey::NumPlayers, value).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let value = store.get_int(StateKey::NumPlayers);
            assert!(value == 1111 || value == 2222, "saw torn value {value}");
        }
        writer.join().unwrap();
    }
}
