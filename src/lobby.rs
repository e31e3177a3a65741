use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub type PlayerId = Uuid;
pub type LobbyId = Uuid;
pub type MatchId = Uuid;

/// Hard cap on lobby membership, and the exact count a team shuffle needs.
pub const LOBBY_CAPACITY: usize = 10;
pub const TEAM_SIZE: usize = 5;
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub level: u8,
    pub created_at: DateTime<Utc>,
}

impl Player {
    /// A fresh identity with a random id. Validation (trimming, level
    /// clamping) happens in [`crate::state::GameStore::login`].
    pub fn new(nickname: impl Into<String>, level: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            level,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub host_player_id: PlayerId,
    pub players: Vec<Player>,
    pub created_at: DateTime<Utc>,
}

impl Lobby {
    pub fn is_full(&self) -> bool {
        self.players.len() >= LOBBY_CAPACITY
    }

    pub fn is_protected(&self) -> bool {
        self.password.is_some()
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn member_count(&self) -> usize {
        self.players.len()
    }

    /// The host's member record. `None` only on corrupt data; every operation
    /// keeps the host inside `players`.
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.id == self.host_player_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    pub lobby_id: LobbyId,
    pub team_a: Vec<Player>,
    pub team_b: Vec<Player>,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// True while the two teams together are exactly the lobby's members.
    /// A match that fails this is stale and gets discarded.
    pub fn same_roster(&self, lobby: &Lobby) -> bool {
        if self.team_a.len() + self.team_b.len() != lobby.players.len() {
            return false;
        }
        let mut members: HashSet<PlayerId> = lobby.players.iter().map(|p| p.id).collect();
        self.team_a
            .iter()
            .chain(self.team_b.iter())
            .all(|p| members.remove(&p.id))
    }

    /// Summed player levels per team, the balance figure shown next to each
    /// roster.
    pub fn level_totals(&self) -> (u32, u32) {
        let total = |team: &[Player]| team.iter().map(|p| u32::from(p.level)).sum();
        (total(&self.team_a), total(&self.team_b))
    }
}
