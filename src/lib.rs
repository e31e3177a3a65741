//! Session and lobby state core for a browser-local 5v5 party tool.
//!
//! One [`GameStore`] models one profile: at most one logged-in identity, a
//! shared lobby registry, and the derived current-lobby and current-match
//! views. Mutations are synchronous operations on `&mut GameStore`; they
//! reject bad input with a [`GameError`] instead of panicking, and persist
//! the identity and registry as two JSON records through a pluggable
//! [`storage::Storage`] backend.
//!
//! ```
//! use fivestack::GameStore;
//!
//! let mut store = GameStore::in_memory();
//! store.login("Alice", 12).unwrap();
//! let lobby = store.create_lobby("Evening mix", None, None).unwrap();
//! assert_eq!(store.current_lobby().map(|l| l.id), Some(lobby.id));
//! assert!(store.is_host());
//! ```

pub mod error;
pub mod lobby;
pub mod shuffle;
pub mod state;
pub mod storage;

pub use error::GameError;
pub use lobby::{
    Lobby, LobbyId, Match, MatchId, Player, PlayerId, LOBBY_CAPACITY, MAX_LEVEL, MIN_LEVEL,
    TEAM_SIZE,
};
pub use state::GameStore;
pub use storage::{JsonFileStorage, MemoryStorage, Storage, StorageError};

use tracing_subscriber::prelude::*;

pub fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fivestack=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(false)
                .with_target(false),
        )
        .init();
}
