use crate::error::GameError;
use crate::lobby::{Lobby, LobbyId, Match, Player, PlayerId, LOBBY_CAPACITY, MAX_LEVEL, MIN_LEVEL};
use crate::shuffle::split_teams;
use crate::storage::{MemoryStorage, Storage, StorageError, LOBBIES_KEY, PLAYER_KEY};
use chrono::Utc;
use rand::thread_rng;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The single authority over one profile's session and lobby state.
///
/// A `GameStore` owns the current identity, the shared lobby registry and the
/// session's derived views (current lobby, current match). Every mutation goes
/// through one of the operation methods below; each either commits fully and
/// bumps [`GameStore::revision`], or rejects with a [`GameError`] and leaves
/// the store untouched. Operations run on `&mut self`, so overlapping
/// mutations cannot happen by construction.
///
/// Persistence is best-effort: after each committed change the affected
/// record is rewritten through the [`Storage`] backend, and a failing write
/// is logged and otherwise ignored.
pub struct GameStore {
    storage: Box<dyn Storage>,
    current_player: Option<Player>,
    lobbies: HashMap<LobbyId, Lobby>,
    current_match: Option<Match>,
    revision: u64,
}

impl GameStore {
    /// Opens a store over `storage`, loading whatever identity and lobby
    /// registry records survive there. A missing or unreadable record falls
    /// back to its empty default and never fails the open.
    pub fn open(storage: impl Storage + 'static) -> Self {
        let mut store = Self {
            storage: Box::new(storage),
            current_player: None,
            lobbies: HashMap::new(),
            current_match: None,
            revision: 0,
        };
        store.current_player = store.load_record(PLAYER_KEY);
        let lobbies: Option<Vec<Lobby>> = store.load_record(LOBBIES_KEY);
        if let Some(lobbies) = lobbies {
            store.lobbies = lobbies.into_iter().map(|l| (l.id, l)).collect();
        }
        debug!(
            identity = store.current_player.is_some(),
            lobbies = store.lobbies.len(),
            "store opened from persisted records"
        );
        store
    }

    /// A store with no durability at all; state lives only as long as the
    /// value does.
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    /// Creates a fresh identity and makes it the current one, replacing any
    /// previous identity outright.
    ///
    /// The nickname is trimmed and must be non-empty; `level` is clamped into
    /// [`MIN_LEVEL`]..=[`MAX_LEVEL`].
    pub fn login(&mut self, nickname: &str, level: u8) -> Result<Player, GameError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(GameError::EmptyNickname);
        }
        let player = Player::new(nickname, level.clamp(MIN_LEVEL, MAX_LEVEL));
        info!(nickname = %player.nickname, level = player.level, "player logged in");
        self.current_player = Some(player.clone());
        self.persist_player();
        self.sync_views();
        Ok(player)
    }

    /// Drops the current identity. If it still occupies a lobby, the full
    /// leave transition (host transfer, delete-when-empty) runs first, so no
    /// lobby is left pointing at a vanished member.
    pub fn logout(&mut self) {
        if self.current_lobby_ref().is_some() {
            let _ = self.leave_lobby();
        }
        if let Some(player) = self.current_player.take() {
            info!(nickname = %player.nickname, "player logged out");
        }
        self.persist_player();
        self.sync_views();
    }

    /// Creates a lobby with the caller as sole member and host.
    ///
    /// Rejected while the caller occupies any lobby; leaving or deleting the
    /// old one is always an explicit step, never implied. A blank description
    /// or password collapses to `None`.
    pub fn create_lobby(
        &mut self,
        name: &str,
        description: Option<&str>,
        password: Option<&str>,
    ) -> Result<Lobby, GameError> {
        let player = self.current_player.clone().ok_or(GameError::NoIdentity)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::EmptyLobbyName);
        }
        if self.current_lobby_ref().is_some() {
            return Err(GameError::AlreadyInLobby);
        }
        let lobby = Lobby {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
            password: password.filter(|p| !p.is_empty()).map(String::from),
            host_player_id: player.id,
            players: vec![player],
            created_at: Utc::now(),
        };
        info!(lobby = %lobby.name, lobby_id = %lobby.id, "lobby created");
        self.lobbies.insert(lobby.id, lobby.clone());
        self.persist_lobbies();
        self.sync_views();
        Ok(lobby)
    }

    /// Adds the caller to `lobby_id`, leaving any currently occupied lobby
    /// first.
    ///
    /// All preconditions are checked against the target before anything
    /// changes, so a rejected join never evacuates the caller's old lobby.
    /// A password-protected lobby requires the exact stored password.
    pub fn join_lobby(
        &mut self,
        lobby_id: &LobbyId,
        password: Option<&str>,
    ) -> Result<Lobby, GameError> {
        let player = self.current_player.clone().ok_or(GameError::NoIdentity)?;

        let target = self.lobbies.get(lobby_id).ok_or(GameError::LobbyNotFound)?;
        if target.is_full() {
            return Err(GameError::LobbyFull);
        }
        if target.is_member(player.id) {
            return Err(GameError::AlreadyJoined);
        }
        if let Some(expected) = target.password.as_deref() {
            if password != Some(expected) {
                return Err(GameError::WrongPassword);
            }
        }

        if let Some(previous) = self.current_lobby_ref().map(|l| l.id) {
            self.depart(player.id, previous);
        }

        let joined = match self.lobbies.get_mut(lobby_id) {
            Some(lobby) => {
                lobby.players.push(player.clone());
                lobby.clone()
            }
            None => return Err(GameError::LobbyNotFound),
        };
        info!(lobby = %joined.name, nickname = %player.nickname, "joined lobby");
        self.current_match = None;
        self.persist_lobbies();
        self.sync_views();
        Ok(joined)
    }

    /// Removes the caller from their current lobby. The lobby is deleted if
    /// this empties it; if the host leaves a non-empty lobby, the first
    /// remaining member becomes host.
    pub fn leave_lobby(&mut self) -> Result<(), GameError> {
        let player = self.current_player.clone().ok_or(GameError::NoIdentity)?;
        let (lobby_id, name) = match self.current_lobby_ref() {
            Some(lobby) => (lobby.id, lobby.name.clone()),
            None => return Err(GameError::NotInLobby),
        };
        info!(lobby = %name, nickname = %player.nickname, "leaving lobby");
        self.depart(player.id, lobby_id);
        self.current_match = None;
        self.persist_lobbies();
        self.sync_views();
        Ok(())
    }

    /// Removes another member from the current lobby. Host-only, and the
    /// host cannot kick themself, so this can never empty a lobby or move
    /// the host role.
    pub fn kick_player(&mut self, player_id: &PlayerId) -> Result<Player, GameError> {
        let player = self.current_player.clone().ok_or(GameError::NoIdentity)?;
        let lobby_id = match self.current_lobby_ref() {
            Some(lobby) => {
                if lobby.host_player_id != player.id {
                    return Err(GameError::NotHost);
                }
                lobby.id
            }
            None => return Err(GameError::NotInLobby),
        };
        if *player_id == player.id {
            return Err(GameError::SelfKick);
        }
        let kicked = match self.lobbies.get_mut(&lobby_id) {
            Some(lobby) => match lobby.players.iter().position(|p| p.id == *player_id) {
                Some(index) => lobby.players.remove(index),
                None => return Err(GameError::PlayerNotFound),
            },
            None => return Err(GameError::LobbyNotFound),
        };
        info!(lobby_id = %lobby_id, kicked = %kicked.nickname, "player kicked from lobby");
        self.persist_lobbies();
        self.sync_views();
        Ok(kicked)
    }

    /// Deletes the current lobby outright, members and all. Host-only.
    pub fn delete_lobby(&mut self) -> Result<(), GameError> {
        let player = self.current_player.clone().ok_or(GameError::NoIdentity)?;
        let (lobby_id, name) = match self.current_lobby_ref() {
            Some(lobby) => {
                if lobby.host_player_id != player.id {
                    return Err(GameError::NotHost);
                }
                (lobby.id, lobby.name.clone())
            }
            None => return Err(GameError::NotInLobby),
        };
        self.lobbies.remove(&lobby_id);
        self.current_match = None;
        info!(lobby = %name, lobby_id = %lobby_id, "lobby deleted by host");
        self.persist_lobbies();
        self.sync_views();
        Ok(())
    }

    /// Draws a fresh 5v5 partition of the current lobby and stores it as the
    /// current match. Host-only, and the lobby must hold exactly
    /// [`LOBBY_CAPACITY`] players.
    pub fn shuffle_teams(&mut self) -> Result<Match, GameError> {
        let player = self.current_player.clone().ok_or(GameError::NoIdentity)?;
        let lobby = match self.current_lobby_ref() {
            Some(lobby) => lobby.clone(),
            None => return Err(GameError::NotInLobby),
        };
        if lobby.host_player_id != player.id {
            return Err(GameError::NotHost);
        }
        if lobby.players.len() != LOBBY_CAPACITY {
            return Err(GameError::WrongPlayerCount {
                found: lobby.players.len(),
            });
        }
        let (team_a, team_b) = split_teams(&lobby.players, &mut thread_rng());
        let game_match = Match {
            id: Uuid::new_v4(),
            lobby_id: lobby.id,
            team_a,
            team_b,
            created_at: Utc::now(),
        };
        info!(lobby = %lobby.name, match_id = %game_match.id, "teams shuffled");
        self.current_match = Some(game_match.clone());
        self.sync_views();
        Ok(game_match)
    }

    /// A brand-new draw under the same preconditions; nothing from the
    /// previous match carries over.
    pub fn reshuffle_teams(&mut self) -> Result<Match, GameError> {
        self.shuffle_teams()
    }

    pub fn current_player(&self) -> Option<Player> {
        self.current_player.clone()
    }

    pub fn get_lobby(&self, id: &LobbyId) -> Option<Lobby> {
        self.lobbies.get(id).cloned()
    }

    /// Every lobby in the registry, oldest first.
    pub fn get_lobbies(&self) -> Vec<Lobby> {
        let mut all: Vec<Lobby> = self.lobbies.values().cloned().collect();
        all.sort_by_key(|l| (l.created_at, l.id));
        all
    }

    /// The lobbies the caller could browse and join: everything except the
    /// one they already occupy.
    pub fn get_available_lobbies(&self) -> Vec<Lobby> {
        let occupied = self.current_lobby_ref().map(|l| l.id);
        self.get_lobbies()
            .into_iter()
            .filter(|l| Some(l.id) != occupied)
            .collect()
    }

    /// The lobby the current identity is a member of, if any.
    pub fn current_lobby(&self) -> Option<Lobby> {
        self.current_lobby_ref().cloned()
    }

    pub fn current_match(&self) -> Option<Match> {
        self.current_match.clone()
    }

    /// Whether the current identity hosts the lobby it occupies.
    pub fn is_host(&self) -> bool {
        match (&self.current_player, self.current_lobby_ref()) {
            (Some(player), Some(lobby)) => lobby.host_player_id == player.id,
            _ => false,
        }
    }

    /// Monotonic change counter, bumped by every committed mutation. Views
    /// that cached a snapshot re-read when this moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Pure selector for the current lobby: recomputed from the registry and
    /// the identity on every read, so it can never disagree with either.
    fn current_lobby_ref(&self) -> Option<&Lobby> {
        let player = self.current_player.as_ref()?;
        self.lobbies.values().find(|l| l.is_member(player.id))
    }

    /// The one leave transition. Drops the member, then either deletes the
    /// emptied lobby or hands the host role to the first remaining member.
    fn depart(&mut self, player_id: PlayerId, lobby_id: LobbyId) {
        let emptied = match self.lobbies.get_mut(&lobby_id) {
            Some(lobby) => {
                lobby.players.retain(|p| p.id != player_id);
                if lobby.players.is_empty() {
                    true
                } else {
                    if lobby.host_player_id == player_id {
                        lobby.host_player_id = lobby.players[0].id;
                        info!(
                            lobby_id = %lobby_id,
                            new_host = %lobby.players[0].nickname,
                            "host left, first remaining member takes over"
                        );
                    }
                    false
                }
            }
            None => false,
        };
        if emptied {
            info!(lobby_id = %lobby_id, "last member left, deleting lobby");
            self.lobbies.remove(&lobby_id);
        }
    }

    /// Recomputes derived state after a mutation: a stored match survives
    /// only while it belongs to the current lobby and still covers its exact
    /// roster. Always bumps the revision.
    fn sync_views(&mut self) {
        let keep = match (&self.current_match, self.current_lobby_ref()) {
            (Some(m), Some(lobby)) => m.lobby_id == lobby.id && m.same_roster(lobby),
            (None, _) => true,
            (Some(_), None) => false,
        };
        if !keep {
            debug!("match roster diverged from current lobby, discarding match");
            self.current_match = None;
        }
        self.revision += 1;
    }

    fn load_record<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.load(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read persisted record, starting empty");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable persisted record");
                None
            }
        }
    }

    fn persist_player(&mut self) {
        let record = self.current_player.clone();
        let result = match record {
            Some(player) => serde_json::to_string(&player)
                .map_err(StorageError::from)
                .and_then(|json| self.storage.save(PLAYER_KEY, &json)),
            None => self.storage.remove(PLAYER_KEY),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist identity record, session continues in memory");
        }
    }

    fn persist_lobbies(&mut self) {
        let result = serde_json::to_string(&self.get_lobbies())
            .map_err(StorageError::from)
            .and_then(|json| self.storage.save(LOBBIES_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist lobby registry, session continues in memory");
        }
    }
}
