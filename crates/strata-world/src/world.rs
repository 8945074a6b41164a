//! The world: resident chunks, the anchor-driven load/unload loop, dirty
//! tracking, and the session-facing operations the RPC surface calls.

use std::sync::{Mutex, RwLock};
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_coords::{
    chebyshev_distance, AbsoluteBlockPosition, AbsoluteChunkPosition, AbsolutePrecisePosition,
};
use strata_persist::{ChunkPersistence, SaveAllReport};
use strata_voxel::{Block, ChunkSpan};
use strata_worldgen::ChunkGenerator;

use crate::entity::{Entity, EntityRegistry};
use crate::session::{PlayerSession, SessionManager, DEFAULT_SESSION_TIMEOUT};

type EntityUpdatedCallback = Box<dyn Fn(Entity) + Send + Sync>;

/// Construction-time wiring for a [`World`].
pub struct WorldOptions {
    /// Chunk generator, consulted when persistence has no record.
    pub generator: Option<Box<dyn ChunkGenerator>>,
    /// Durable chunk store. `None` disables persistence entirely.
    pub persistence: Option<Box<dyn ChunkPersistence>>,
    /// Configured load anchors; live players are added on top of these.
    pub anchors: Vec<AbsoluteBlockPosition>,
    /// Chebyshev half-extent of the resident cube around each anchor.
    pub radius_in_chunks: u32,
    /// World seed handed to the generator.
    pub seed: u64,
    /// Session timeout.
    pub session_timeout: Duration,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            generator: None,
            persistence: None,
            anchors: vec![AbsoluteBlockPosition::new(0, 0, 0)],
            radius_in_chunks: 2,
            seed: 0,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

/// The authoritative world state.
///
/// Each shared resource sits behind its own lock so RPC handler tasks, the
/// anchor-maintenance loop, and the session-cleanup tick can run in
/// parallel: the chunk map under one `RwLock`, and the dirty set, session
/// map, and entity registry each under a `Mutex`. Lock scopes never nest
/// chunk access inside session/entity access or vice versa.
pub struct World {
    chunks: RwLock<FxHashMap<AbsoluteChunkPosition, ChunkSpan>>,
    dirty: Mutex<FxHashSet<AbsoluteChunkPosition>>,
    sessions: Mutex<SessionManager>,
    entities: Mutex<EntityRegistry>,
    entity_updated: Mutex<Option<EntityUpdatedCallback>>,
    generator: Option<Box<dyn ChunkGenerator>>,
    persistence: Option<Box<dyn ChunkPersistence>>,
    anchors: Vec<AbsoluteBlockPosition>,
    radius_in_chunks: u32,
    seed: u64,
}

impl World {
    /// Builds a world from the given wiring. No chunks are loaded until the
    /// first [`ensure_chunks_loaded`](Self::ensure_chunks_loaded).
    pub fn new(options: WorldOptions) -> Self {
        Self {
            chunks: RwLock::new(FxHashMap::default()),
            dirty: Mutex::new(FxHashSet::default()),
            sessions: Mutex::new(SessionManager::new(options.session_timeout)),
            entities: Mutex::new(EntityRegistry::new()),
            entity_updated: Mutex::new(None),
            generator: options.generator,
            persistence: options.persistence,
            anchors: options.anchors,
            radius_in_chunks: options.radius_in_chunks,
            seed: options.seed,
        }
    }

    /// Configured load radius, in chunks.
    pub fn radius_in_chunks(&self) -> u32 {
        self.radius_in_chunks
    }

    /// Registers a callback fired whenever a player entity is spawned or
    /// moved.
    pub fn set_entity_updated_callback(&self, callback: EntityUpdatedCallback) {
        *self.entity_updated.lock().expect("callback lock") = Some(callback);
    }

    fn notify_entity_updated(&self, entity: Entity) {
        if let Some(callback) = &*self.entity_updated.lock().expect("callback lock") {
            callback(entity);
        }
    }

    // -----------------------------------------------------------------------
    // Chunk queries and mutation
    // -----------------------------------------------------------------------

    /// Snapshot of the chunk at `position`, if resident. Never triggers a
    /// load.
    pub fn chunk_at(&self, position: AbsoluteChunkPosition) -> Option<ChunkSpan> {
        self.chunks
            .read()
            .expect("chunk map lock")
            .get(&position)
            .cloned()
    }

    /// Sparse serialization of the chunk at `position`, if resident.
    pub fn serialized_chunk_at(&self, position: AbsoluteChunkPosition) -> Option<Vec<u8>> {
        self.chunks
            .read()
            .expect("chunk map lock")
            .get(&position)
            .map(ChunkSpan::serialize)
    }

    /// `true` while the chunk is resident.
    pub fn is_chunk_loaded(&self, position: AbsoluteChunkPosition) -> bool {
        self.chunks
            .read()
            .expect("chunk map lock")
            .contains_key(&position)
    }

    /// Number of resident chunks.
    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.read().expect("chunk map lock").len()
    }

    /// The block at an absolute position, or `None` while its chunk is not
    /// resident.
    pub fn get_block_if_loaded(&self, position: AbsoluteBlockPosition) -> Option<Block> {
        self.chunks
            .read()
            .expect("chunk map lock")
            .get(&position.chunk())
            .map(|chunk| chunk.get(position.chunk_local()))
    }

    /// Writes a block if its chunk is resident, marking the chunk dirty for
    /// update observers. Returns `false` (without loading anything) when the
    /// chunk is not resident.
    pub fn set_block_if_loaded(&self, position: AbsoluteBlockPosition, block: Block) -> bool {
        let chunk_pos = position.chunk();
        {
            let mut chunks = self.chunks.write().expect("chunk map lock");
            match chunks.get_mut(&chunk_pos) {
                Some(chunk) => chunk.set(position.chunk_local(), block),
                None => return false,
            }
        }
        self.dirty
            .lock()
            .expect("dirty set lock")
            .insert(chunk_pos);
        true
    }

    /// Atomically removes and returns the dirty chunks within
    /// `render_distance` (Chebyshev) of the observer's chunk. Dirty entries
    /// outside the range stay for other observers.
    pub fn drain_updated_chunks_in_range(
        &self,
        observer: AbsoluteBlockPosition,
        render_distance: u32,
    ) -> Vec<AbsoluteChunkPosition> {
        let observer_chunk = observer.chunk();
        let mut dirty = self.dirty.lock().expect("dirty set lock");
        let mut drained: Vec<AbsoluteChunkPosition> = dirty
            .iter()
            .filter(|pos| chebyshev_distance(**pos, observer_chunk) <= render_distance)
            .copied()
            .collect();
        for pos in &drained {
            dirty.remove(pos);
        }
        drained.sort();
        drained
    }

    // -----------------------------------------------------------------------
    // Anchor-driven lifecycle
    // -----------------------------------------------------------------------

    /// Brings the resident set in line with the anchors: loads every chunk
    /// within the radius of a configured anchor or live player (persistence
    /// first, then the generator, then all-`Empty`), and evicts everything
    /// else, saving evicted chunks when persistence is configured.
    ///
    /// After this returns, the resident set equals the needed set.
    pub fn ensure_chunks_loaded(&self) {
        let needed = self.needed_chunk_set();
        let mut chunks = self.chunks.write().expect("chunk map lock");

        for position in &needed {
            if !chunks.contains_key(position) {
                chunks.insert(*position, self.load_or_generate(*position));
            }
        }

        let evicted: Vec<AbsoluteChunkPosition> = chunks
            .keys()
            .filter(|pos| !needed.contains(*pos))
            .copied()
            .collect();
        for position in evicted {
            if let Some(chunk) = chunks.remove(&position) {
                self.save_evicted(&chunk);
            }
        }
    }

    /// The eviction half of the lifecycle on its own: unloads (and saves)
    /// every resident chunk outside the needed set without loading anything.
    pub fn garbage_collect_chunks(&self) {
        let needed = self.needed_chunk_set();
        let mut chunks = self.chunks.write().expect("chunk map lock");
        let evicted: Vec<AbsoluteChunkPosition> = chunks
            .keys()
            .filter(|pos| !needed.contains(*pos))
            .copied()
            .collect();
        for position in evicted {
            if let Some(chunk) = chunks.remove(&position) {
                self.save_evicted(&chunk);
            }
        }
    }

    /// Flushes every resident chunk to persistence. Returns `None` when no
    /// persistence is configured.
    pub fn save_all_chunks(&self) -> Option<SaveAllReport> {
        let store = self.persistence.as_ref()?;
        let chunks = self.chunks.read().expect("chunk map lock");
        let report = store.save_all(&mut chunks.values());
        if !report.is_complete() {
            tracing::warn!(
                failed = report.failed.len(),
                saved = report.saved,
                "some chunks failed to save"
            );
        }
        Some(report)
    }

    /// Anchor set = configured anchors ∪ live player positions, expanded to
    /// the full Chebyshev cube of the load radius.
    fn needed_chunk_set(&self) -> FxHashSet<AbsoluteChunkPosition> {
        let mut anchor_blocks = self.anchors.clone();
        {
            let mut entities = self.entities.lock().expect("entity registry lock");
            anchor_blocks.extend(entities.player_positions().into_iter().map(|p| p.block()));
        }

        let radius = self.radius_in_chunks as i32;
        let mut needed = FxHashSet::default();
        for anchor in anchor_blocks {
            let center = anchor.chunk();
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    for dz in -radius..=radius {
                        needed.insert(center.offset(dx, dy, dz));
                    }
                }
            }
        }
        needed
    }

    fn load_or_generate(&self, position: AbsoluteChunkPosition) -> ChunkSpan {
        if let Some(store) = &self.persistence {
            match store.load_chunk(position) {
                Ok(Some(chunk)) => return chunk,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(?position, %err, "chunk load failed; falling back to generator");
                }
            }
        }
        match &self.generator {
            Some(generator) => generator.generate(position, self.seed),
            None => ChunkSpan::new(position),
        }
    }

    fn save_evicted(&self, chunk: &ChunkSpan) {
        if let Some(store) = &self.persistence {
            if let Err(err) = store.save_chunk(chunk) {
                tracing::warn!(position = ?chunk.position(), %err, "failed to save evicted chunk");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Sessions and players
    // -----------------------------------------------------------------------

    /// Spawns a player entity and opens a session for it. Returns the
    /// session token.
    pub fn create_player_session(
        &self,
        player_name: &str,
        spawn: AbsolutePrecisePosition,
    ) -> String {
        let entity = self
            .entities
            .lock()
            .expect("entity registry lock")
            .spawn_player(player_name, spawn);
        self.notify_entity_updated(entity);
        self.sessions
            .lock()
            .expect("session map lock")
            .create(player_name, entity, spawn)
    }

    /// Renews a session's timeout window.
    pub fn refresh_player_session(&self, token: &str) -> bool {
        self.sessions
            .lock()
            .expect("session map lock")
            .refresh(token)
    }

    /// Moves a player: updates the session (which also refreshes it) and
    /// the entity's position component, then fires the entity-updated
    /// callback. Returns `false` for an invalid session or a vanished
    /// entity.
    pub fn update_player_position(&self, token: &str, position: AbsolutePrecisePosition) -> bool {
        let entity = {
            let mut sessions = self.sessions.lock().expect("session map lock");
            if !sessions.update_position(token, position) {
                return false;
            }
            sessions.get(token).map(|session| session.entity)
        };
        let Some(entity) = entity else {
            return false;
        };

        let moved = self
            .entities
            .lock()
            .expect("entity registry lock")
            .set_position(entity, position);
        if moved {
            self.notify_entity_updated(entity);
        }
        moved
    }

    /// `true` while the token names a live session.
    pub fn is_valid_session(&self, token: &str) -> bool {
        self.sessions
            .lock()
            .expect("session map lock")
            .is_valid(token)
    }

    /// A copy of the session, only while it is live.
    pub fn get_player_session(&self, token: &str) -> Option<PlayerSession> {
        self.sessions.lock().expect("session map lock").get(token)
    }

    /// Copies of every live session.
    pub fn active_sessions(&self) -> Vec<PlayerSession> {
        self.sessions
            .lock()
            .expect("session map lock")
            .active_sessions()
    }

    /// Closes a session and despawns its player entity. Unknown tokens are
    /// a no-op.
    pub fn disconnect_player_by_session(&self, token: &str) {
        let entity = {
            let mut sessions = self.sessions.lock().expect("session map lock");
            let entity = sessions.get(token).map(|session| session.entity);
            sessions.remove(token);
            entity
        };
        if let Some(entity) = entity {
            self.entities
                .lock()
                .expect("entity registry lock")
                .despawn(entity);
        }
    }

    /// Sweeps expired sessions and despawns their entities. Returns the
    /// removed tokens.
    pub fn cleanup_expired_sessions(&self) -> Vec<String> {
        let swept = self
            .sessions
            .lock()
            .expect("session map lock")
            .sweep_expired();
        if swept.is_empty() {
            return Vec::new();
        }

        let mut entities = self.entities.lock().expect("entity registry lock");
        let mut tokens = Vec::with_capacity(swept.len());
        for (token, entity) in swept {
            entities.despawn(entity);
            tokens.push(token);
        }
        tracing::debug!(count = tokens.len(), "cleaned up expired sessions");
        tokens
    }

    /// Number of live player entities (for diagnostics and tests).
    pub fn player_count(&self) -> usize {
        self.entities
            .lock()
            .expect("entity registry lock")
            .player_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
