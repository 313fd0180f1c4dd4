//! # Players
//!
//! Players are the anchors of activation: every connected player keeps the
//! regions around it live. A player with peer id 0 is known to the world
//! (it has a name and a position) but is not connected.

use rand::Rng;
use terrarium_core::WorldPoint;

use crate::error::PlayerError;

/// Peer id of a player with no connection.
pub const DISCONNECTED: u16 = 0;

/// A player known to the simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Network peer, or [`DISCONNECTED`].
    pub peer_id: u16,
    /// Unique display name.
    pub name: String,
    /// Current position.
    pub position: WorldPoint,
}

impl Player {
    /// Creates a player.
    #[must_use]
    pub fn new(peer_id: u16, name: impl Into<String>, position: WorldPoint) -> Self {
        Self {
            peer_id,
            name: name.into(),
            position,
        }
    }

    /// Whether a peer is attached.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.peer_id != DISCONNECTED
    }
}

/// Every player known to the simulation.
#[derive(Clone, Debug, Default)]
pub struct PlayerList {
    players: Vec<Player>,
}

impl PlayerList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or taken, or the peer id is non-zero and
    /// taken.
    pub fn add(&mut self, player: Player) -> Result<(), PlayerError> {
        if player.name.is_empty() {
            return Err(PlayerError::EmptyName);
        }
        if player.is_connected() && self.get(player.peer_id).is_some() {
            return Err(PlayerError::DuplicatePeer(player.peer_id));
        }
        if self.by_name(&player.name).is_some() {
            return Err(PlayerError::DuplicateName(player.name));
        }
        tracing::info!("player {} joined (peer {})", player.name, player.peer_id);
        self.players.push(player);
        Ok(())
    }

    /// Removes every player attached to `peer_id`. Returns how many went.
    pub fn remove(&mut self, peer_id: u16) -> usize {
        let before = self.players.len();
        self.players.retain(|p| p.peer_id != peer_id);
        let removed = before - self.players.len();
        if removed > 0 {
            tracing::info!("removed {} player(s) with peer {}", removed, peer_id);
        }
        removed
    }

    /// Detaches the peer but keeps the player. Returns false if unknown.
    pub fn disconnect(&mut self, peer_id: u16) -> bool {
        if peer_id == DISCONNECTED {
            return false;
        }
        match self.get_mut(peer_id) {
            Some(player) => {
                player.peer_id = DISCONNECTED;
                true
            }
            None => false,
        }
    }

    /// Finds a connected player by peer id.
    #[must_use]
    pub fn get(&self, peer_id: u16) -> Option<&Player> {
        if peer_id == DISCONNECTED {
            return None;
        }
        self.players.iter().find(|p| p.peer_id == peer_id)
    }

    /// Finds a connected player by peer id, mutably.
    pub fn get_mut(&mut self, peer_id: u16) -> Option<&mut Player> {
        if peer_id == DISCONNECTED {
            return None;
        }
        self.players.iter_mut().find(|p| p.peer_id == peer_id)
    }

    /// Finds a player by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Finds a player by name, mutably.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Iterates connected players.
    pub fn connected(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_connected())
    }

    /// Positions of connected players; the activation anchors.
    pub fn anchors(&self) -> impl Iterator<Item = WorldPoint> + '_ {
        self.connected().map(|p| p.position)
    }

    /// The connected player closest to `pos`.
    #[must_use]
    pub fn nearest_connected(&self, pos: WorldPoint) -> Option<&Player> {
        self.connected().min_by(|a, b| {
            a.position
                .distance(pos)
                .total_cmp(&b.position.distance(pos))
        })
    }

    /// A connected player chosen uniformly at random.
    pub fn random_connected<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Player> {
        let count = self.connected().count();
        if count == 0 {
            return None;
        }
        self.connected().nth(rng.gen_range(0..count))
    }

    /// Iterates every player.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Number of players, connected or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
