//! Unbiased partition of a full lobby into two teams.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::lobby::{Player, LOBBY_CAPACITY, TEAM_SIZE};

/// Shuffles a copy of `players` with a canonical Fisher-Yates pass and splits
/// it down the middle: positions 0..5 become team A, positions 5..10 team B.
/// Every one of the 10!/(5!·5!) partitions is equally likely under a uniform
/// `rng`.
///
/// Callers hand in exactly [`LOBBY_CAPACITY`] players; the store checks this
/// before drawing.
pub fn split_teams<R: Rng + ?Sized>(players: &[Player], rng: &mut R) -> (Vec<Player>, Vec<Player>) {
    debug_assert_eq!(players.len(), LOBBY_CAPACITY);
    let mut pool = players.to_vec();
    pool.shuffle(rng);
    let team_b = pool.split_off(TEAM_SIZE);
    (pool, team_b)
}
