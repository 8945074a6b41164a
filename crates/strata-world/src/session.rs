//! Player session tracking with refresh-based timeout.

use std::time::{Duration, Instant};

use rand::RngCore;
use rustc_hash::FxHashMap;
use strata_coords::AbsolutePrecisePosition;

use crate::entity::Entity;

/// How long a session stays valid without a refresh, unless overridden.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// An authenticated player's presence on the server.
#[derive(Clone, Debug)]
pub struct PlayerSession {
    /// Opaque session token handed to the client.
    pub token: String,
    /// The player's display name.
    pub player_name: String,
    /// The player's entity in the registry.
    pub entity: Entity,
    /// Last time the session was created, refreshed, or moved.
    pub last_refresh: Instant,
    /// Last reported player position.
    pub position: AbsolutePrecisePosition,
}

impl PlayerSession {
    fn is_live(&self, timeout: Duration) -> bool {
        self.last_refresh.elapsed() < timeout
    }
}

/// Issues tokens and tracks session liveness.
///
/// A session is valid while its last refresh is younger than the timeout.
/// Expired sessions linger until [`SessionManager::sweep_expired`] runs, but
/// every query treats them as gone.
pub struct SessionManager {
    sessions: FxHashMap<String, PlayerSession>,
    timeout: Duration,
}

impl SessionManager {
    /// Creates a manager with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: FxHashMap::default(),
            timeout,
        }
    }

    /// The configured session timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates a session and returns its token.
    ///
    /// Tokens carry 16 bytes of CSPRNG entropy, hex encoded; a collision
    /// with a live token re-rolls.
    pub fn create(
        &mut self,
        player_name: &str,
        entity: Entity,
        position: AbsolutePrecisePosition,
    ) -> String {
        let mut token = generate_token();
        while self.sessions.contains_key(&token) {
            token = generate_token();
        }
        self.sessions.insert(
            token.clone(),
            PlayerSession {
                token: token.clone(),
                player_name: player_name.to_string(),
                entity,
                last_refresh: Instant::now(),
                position,
            },
        );
        token
    }

    /// Renews the session's timeout window. Returns `false` for unknown or
    /// already-expired tokens.
    pub fn refresh(&mut self, token: &str) -> bool {
        let timeout = self.timeout;
        match self.sessions.get_mut(token) {
            Some(session) if session.is_live(timeout) => {
                session.last_refresh = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Updates the session's position. Also counts as a refresh.
    pub fn update_position(&mut self, token: &str, position: AbsolutePrecisePosition) -> bool {
        let timeout = self.timeout;
        match self.sessions.get_mut(token) {
            Some(session) if session.is_live(timeout) => {
                session.position = position;
                session.last_refresh = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// `true` while the token names a live session.
    pub fn is_valid(&self, token: &str) -> bool {
        self.sessions
            .get(token)
            .is_some_and(|s| s.is_live(self.timeout))
    }

    /// A copy of the session, only while it is live.
    pub fn get(&self, token: &str) -> Option<PlayerSession> {
        self.sessions
            .get(token)
            .filter(|s| s.is_live(self.timeout))
            .cloned()
    }

    /// Removes a session. Removing an unknown token is a no-op.
    pub fn remove(&mut self, token: &str) {
        self.sessions.remove(token);
    }

    /// Removes every expired session, returning `(token, entity)` pairs so
    /// the caller can despawn the orphaned entities.
    pub fn sweep_expired(&mut self) -> Vec<(String, Entity)> {
        let timeout = self.timeout;
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| !s.is_live(timeout))
            .map(|s| s.token.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|token| self.sessions.remove(&token).map(|s| (token, s.entity)))
            .collect()
    }

    /// Copies of every live session.
    pub fn active_sessions(&self) -> Vec<PlayerSession> {
        self.sessions
            .values()
            .filter(|s| s.is_live(self.timeout))
            .cloned()
            .collect()
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.is_live(self.timeout))
            .count()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRegistry;

    const SHORT: Duration = Duration::from_millis(40);

    fn manager_with_session() -> (SessionManager, String, Entity) {
        let mut registry = EntityRegistry::new();
        let entity = registry.spawn_player("alice", AbsolutePrecisePosition::new(0.0, 64.0, 0.0));
        let mut manager = SessionManager::new(SHORT);
        let token = manager.create("alice", entity, AbsolutePrecisePosition::new(0.0, 64.0, 0.0));
        (manager, token, entity)
    }

    #[test]
    fn test_created_session_is_valid() {
        let (manager, token, _) = manager_with_session();
        assert!(manager.is_valid(&token));
        let session = manager.get(&token).expect("live session");
        assert_eq!(session.player_name, "alice");
    }

    #[test]
    fn test_tokens_are_unique_and_opaque() {
        let mut registry = EntityRegistry::new();
        let entity = registry.spawn_player("bob", AbsolutePrecisePosition::default());
        let mut manager = SessionManager::new(SHORT);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let token = manager.create("bob", entity, AbsolutePrecisePosition::default());
            assert_eq!(token.len(), 32, "16 bytes of entropy, hex encoded");
            assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(token), "token collision");
        }
    }

    #[test]
    fn test_session_expires_without_refresh() {
        let (mut manager, token, _) = manager_with_session();
        std::thread::sleep(SHORT + Duration::from_millis(15));

        assert!(!manager.is_valid(&token));
        assert!(!manager.refresh(&token), "expired session must not refresh");
        assert!(manager.get(&token).is_none());
    }

    #[test]
    fn test_refresh_extends_the_window() {
        let (mut manager, token, _) = manager_with_session();
        for _ in 0..3 {
            std::thread::sleep(SHORT / 2);
            assert!(manager.refresh(&token));
        }
        assert!(manager.is_valid(&token));
    }

    #[test]
    fn test_update_position_refreshes_too() {
        let (mut manager, token, _) = manager_with_session();
        std::thread::sleep(SHORT / 2);
        assert!(manager.update_position(&token, AbsolutePrecisePosition::new(1.0, 64.0, 1.0)));
        std::thread::sleep(SHORT / 2);
        // Without the implicit refresh this would have expired by now.
        assert!(manager.is_valid(&token));
        assert_eq!(
            manager.get(&token).expect("live").position,
            AbsolutePrecisePosition::new(1.0, 64.0, 1.0)
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (mut manager, token, _) = manager_with_session();
        manager.remove(&token);
        assert!(!manager.is_valid(&token));
        manager.remove(&token);
        manager.remove("no-such-token");
    }

    #[test]
    fn test_sweep_returns_expired_entities() {
        let mut registry = EntityRegistry::new();
        let mut manager = SessionManager::new(SHORT);

        let expired_entity =
            registry.spawn_player("expired", AbsolutePrecisePosition::default());
        let expired_token =
            manager.create("expired", expired_entity, AbsolutePrecisePosition::default());
        std::thread::sleep(SHORT + Duration::from_millis(15));

        let live_entity = registry.spawn_player("live", AbsolutePrecisePosition::default());
        let live_token = manager.create("live", live_entity, AbsolutePrecisePosition::default());

        let swept = manager.sweep_expired();
        assert_eq!(swept, vec![(expired_token, expired_entity)]);
        assert!(manager.is_valid(&live_token));
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_reconnect_issues_fresh_token() {
        let (mut manager, first, entity) = manager_with_session();
        std::thread::sleep(SHORT + Duration::from_millis(15));
        manager.sweep_expired();

        let second = manager.create("alice", entity, AbsolutePrecisePosition::default());
        assert_ne!(first, second);
        assert!(manager.is_valid(&second));
        assert!(!manager.is_valid(&first));
    }
}
