use thiserror::Error;

/// Every way a session or lobby operation can be rejected.
///
/// These are recoverable outcomes, not failures: the store is left exactly as
/// it was and the caller surfaces the message to the player.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("no player is logged in")]
    NoIdentity,
    #[error("nickname cannot be empty")]
    EmptyNickname,
    #[error("lobby name cannot be empty")]
    EmptyLobbyName,
    #[error("lobby not found")]
    LobbyNotFound,
    #[error("lobby is full")]
    LobbyFull,
    #[error("already a member of this lobby")]
    AlreadyJoined,
    #[error("leave the current lobby before creating a new one")]
    AlreadyInLobby,
    #[error("incorrect password")]
    WrongPassword,
    #[error("not currently in a lobby")]
    NotInLobby,
    #[error("only the host can do that")]
    NotHost,
    #[error("the host cannot kick themself")]
    SelfKick,
    #[error("player is not in this lobby")]
    PlayerNotFound,
    #[error("need exactly 10 players to shuffle teams, lobby has {found}")]
    WrongPlayerCount { found: usize },
}
