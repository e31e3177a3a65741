use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fivestack::storage::{Storage, StorageError, LOBBIES_KEY, PLAYER_KEY};
use fivestack::{GameStore, JsonFileStorage, MemoryStorage, LOBBY_CAPACITY};
use pretty_assertions::assert_eq;
use serial_test::serial;

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("fivestack-{tag}-{}-{nanos}", std::process::id()))
}

/// Storage whose writes always fail, standing in for a wedged backend.
struct FailingStorage;

impl Storage for FailingStorage {
    fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn save(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            "backend offline",
        )))
    }

    fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            "backend offline",
        )))
    }
}

#[test]
fn test_state_survives_reopen() {
    let storage = MemoryStorage::new();

    let mut session = GameStore::open(storage.clone());
    let ana = session.login("Ana", 9).unwrap();
    let alpha = session.create_lobby("Alpha", None, Some("hunter2")).unwrap();
    let snapshot = session.get_lobbies();
    drop(session);

    // A later session over the same profile picks up where this one left off.
    let reopened = GameStore::open(storage.clone());
    assert_eq!(reopened.current_player(), Some(ana));
    assert_eq!(reopened.get_lobbies(), snapshot);
    assert_eq!(reopened.current_lobby().map(|l| l.id), Some(alpha.id));
}

#[test]
fn test_logout_clears_identity_record() {
    let storage = MemoryStorage::new();

    let mut session = GameStore::open(storage.clone());
    session.login("Ana", 9).unwrap();
    assert!(storage.load(PLAYER_KEY).unwrap().is_some());

    session.logout();
    assert_eq!(storage.load(PLAYER_KEY).unwrap(), None);

    let reopened = GameStore::open(storage.clone());
    assert_eq!(reopened.current_player(), None);
}

#[test]
fn test_corrupt_records_fall_back_to_empty() {
    let mut storage = MemoryStorage::new();
    storage.save(PLAYER_KEY, "definitely not json").unwrap();
    storage.save(LOBBIES_KEY, "{\"wrong\": \"shape\"}").unwrap();

    let mut session = GameStore::open(storage.clone());
    assert_eq!(session.current_player(), None);
    assert_eq!(session.get_lobbies().len(), 0);

    // The next change writes a clean record over the garbage.
    session.login("Ana", 9).unwrap();
    let raw = storage.load(PLAYER_KEY).unwrap().unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&raw).is_ok());
}

#[test]
fn test_write_failures_do_not_block_the_session() {
    let mut session = GameStore::open(FailingStorage);

    let ana = session.login("Ana", 9).unwrap();
    let alpha = session.create_lobby("Alpha", None, None).unwrap();
    assert_eq!(session.current_player().map(|p| p.id), Some(ana.id));
    assert_eq!(session.current_lobby().map(|l| l.id), Some(alpha.id));

    // A failing remove on logout is swallowed the same way.
    session.logout();
    assert_eq!(session.current_player(), None);
    assert_eq!(session.get_lobbies().len(), 0);
}

#[test]
fn test_records_are_rewritten_whole() {
    let storage = MemoryStorage::new();

    let mut session = GameStore::open(storage.clone());
    let ana = session.login("Ana", 9).unwrap();
    session
        .create_lobby("Alpha", Some("evening runs"), None)
        .unwrap();

    let raw = storage.load(PLAYER_KEY).unwrap().unwrap();
    let player_json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(player_json["nickname"].as_str().unwrap(), "Ana");
    assert_eq!(player_json["id"].as_str().unwrap(), ana.id.to_string());

    let raw = storage.load(LOBBIES_KEY).unwrap().unwrap();
    let lobbies_json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(lobbies_json.as_array().unwrap().len(), 1);
    assert_eq!(lobbies_json[0]["name"].as_str().unwrap(), "Alpha");
    assert_eq!(
        lobbies_json[0]["description"].as_str().unwrap(),
        "evening runs"
    );
    // No password on this lobby, so the field is omitted entirely.
    assert!(lobbies_json[0].get("password").is_none());

    // Deleting the lobby rewrites the registry record down to nothing.
    session.delete_lobby().unwrap();
    assert_eq!(storage.load(LOBBIES_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn test_current_match_is_session_only() {
    let storage = MemoryStorage::new();

    let mut session = GameStore::open(storage.clone());
    let host = session.login("host", 14).unwrap();
    let lobby = session.create_lobby("Full house", None, None).unwrap();
    for i in 1..LOBBY_CAPACITY {
        let mut session = GameStore::open(storage.clone());
        session.login(&format!("guest_{i}"), i as u8).unwrap();
        session.join_lobby(&lobby.id, None).unwrap();
    }

    // The host takes the profile back and draws teams.
    let mut handle = storage.clone();
    handle
        .save(PLAYER_KEY, &serde_json::to_string(&host).unwrap())
        .unwrap();
    let mut session = GameStore::open(storage.clone());
    session.shuffle_teams().unwrap();
    assert!(session.current_match().is_some());
    drop(session);

    // The drawn match never hits storage; the membership-derived view does
    // come back.
    let reopened = GameStore::open(storage.clone());
    assert_eq!(reopened.current_match(), None);
    assert_eq!(reopened.current_lobby().map(|l| l.id), Some(lobby.id));
}

#[test]
fn test_json_file_storage_round_trip() {
    let dir = scratch_dir("roundtrip");
    let storage = JsonFileStorage::new(&dir);

    let mut session = GameStore::open(storage);
    let ana = session.login("Ana", 9).unwrap();
    session.create_lobby("Alpha", None, None).unwrap();

    assert!(dir.join(format!("{PLAYER_KEY}.json")).is_file());
    assert!(dir.join(format!("{LOBBIES_KEY}.json")).is_file());

    let reopened = GameStore::open(JsonFileStorage::new(&dir));
    assert_eq!(reopened.current_player(), Some(ana));
    assert_eq!(reopened.get_lobbies().len(), 1);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_json_file_storage_handles_missing_entries() {
    let dir = scratch_dir("missing");
    let mut storage = JsonFileStorage::new(&dir);

    // Nothing written yet: loads are empty and removing is not an error.
    assert_eq!(storage.load(PLAYER_KEY).unwrap(), None);
    storage.remove(PLAYER_KEY).unwrap();

    storage.save(PLAYER_KEY, "{}").unwrap();
    assert_eq!(storage.load(PLAYER_KEY).unwrap().as_deref(), Some("{}"));
    storage.remove(PLAYER_KEY).unwrap();
    assert_eq!(storage.load(PLAYER_KEY).unwrap(), None);

    fs::remove_dir_all(&dir).ok();
}

#[test]
#[serial]
fn test_from_env_reads_data_dir() {
    let dir = scratch_dir("env");
    std::env::set_var("FIVESTACK_DATA_DIR", &dir);
    let storage = JsonFileStorage::from_env();
    assert_eq!(storage.dir(), dir.as_path());

    std::env::remove_var("FIVESTACK_DATA_DIR");
    let storage = JsonFileStorage::from_env();
    assert_eq!(storage.dir(), Path::new("fivestack_data"));

    fs::remove_dir_all(&dir).ok();
}
