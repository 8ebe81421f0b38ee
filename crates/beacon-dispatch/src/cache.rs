//! Cache collaborators.
//!
//! Each cache is a keyed store with `set` / `get` / `delete` and no eviction
//! policy. The normalizer writes through [`CacheStore`] only; any store with
//! the same contract can replace [`MemoryCache`].

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use beacon_core::ids::{CompoundKey, Snowflake};
use parking_lot::RwLock;

use crate::models::{Channel, Guild, Member, Message, Presence, Role, User, VoiceState};

/// An entity that knows its own cache key.
pub trait Cached: Clone + Send + Sync + 'static {
    /// [`Snowflake`] for plain entities, [`CompoundKey`] for per-guild-per-user state.
    type Key: Copy + Eq + Hash + fmt::Display + Send + Sync;

    /// The key this entity is stored under.
    fn cache_key(&self) -> Self::Key;
}

/// Keyed entity store.
pub trait CacheStore<T: Cached>: Send + Sync {
    /// Insert or overwrite the entity under its own key.
    fn set(&self, entity: T);

    /// Look up an entity.
    fn get(&self, key: &T::Key) -> Option<T>;

    /// Remove an entity. Returns whether it was present.
    fn delete(&self, key: &T::Key) -> bool;

    /// Number of stored entities.
    fn len(&self) -> usize;

    /// Drop every entity for which `keep` returns false. Returns how many
    /// were dropped.
    fn retain(&self, keep: &dyn Fn(&T) -> bool) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-and-remove.
    fn take(&self, key: &T::Key) -> Option<T> {
        let existing = self.get(key)?;
        let _ = self.delete(key);
        Some(existing)
    }
}

/// In-memory [`CacheStore`] backed by a `HashMap`.
pub struct MemoryCache<T: Cached> {
    entries: RwLock<HashMap<T::Key, T>>,
}

impl<T: Cached> MemoryCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Cached> Default for MemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Cached> CacheStore<T> for MemoryCache<T> {
    fn set(&self, entity: T) {
        let _ = self.entries.write().insert(entity.cache_key(), entity);
    }

    fn get(&self, key: &T::Key) -> Option<T> {
        self.entries.read().get(key).cloned()
    }

    fn delete(&self, key: &T::Key) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn retain(&self, keep: &dyn Fn(&T) -> bool) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entity| keep(entity));
        before - entries.len()
    }

    fn take(&self, key: &T::Key) -> Option<T> {
        self.entries.write().remove(key)
    }
}

/// The full set of caches the normalizer maintains.
#[derive(Clone)]
pub struct Caches {
    /// Users by id.
    pub users: Arc<dyn CacheStore<User>>,
    /// Guilds by id.
    pub guilds: Arc<dyn CacheStore<Guild>>,
    /// Channels and threads by id.
    pub channels: Arc<dyn CacheStore<Channel>>,
    /// Messages by id.
    pub messages: Arc<dyn CacheStore<Message>>,
    /// Roles by id.
    pub roles: Arc<dyn CacheStore<Role>>,
    /// Members by `guild:user`.
    pub members: Arc<dyn CacheStore<Member>>,
    /// Voice states by `guild:user`.
    pub voice_states: Arc<dyn CacheStore<VoiceState>>,
    /// Presences by `guild:user`.
    pub presences: Arc<dyn CacheStore<Presence>>,
}

impl Caches {
    /// Every cache backed by a fresh [`MemoryCache`].
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryCache::<User>::new()),
            guilds: Arc::new(MemoryCache::<Guild>::new()),
            channels: Arc::new(MemoryCache::<Channel>::new()),
            messages: Arc::new(MemoryCache::<Message>::new()),
            roles: Arc::new(MemoryCache::<Role>::new()),
            members: Arc::new(MemoryCache::<Member>::new()),
            voice_states: Arc::new(MemoryCache::<VoiceState>::new()),
            presences: Arc::new(MemoryCache::<Presence>::new()),
        }
    }

    /// Look up a member by guild and user.
    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.members.get(&CompoundKey::new(guild_id, user_id))
    }

    /// Look up a voice state by guild and user.
    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<VoiceState> {
        self.voice_states.get(&CompoundKey::new(guild_id, user_id))
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Caches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caches")
            .field("users", &self.users.len())
            .field("guilds", &self.guilds.len())
            .field("channels", &self.channels.len())
            .field("messages", &self.messages.len())
            .field("roles", &self.roles.len())
            .field("members", &self.members.len())
            .field("voice_states", &self.voice_states.len())
            .field("presences", &self.presences.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: u64, name: &str) -> User {
        serde_json::from_value(json!({"id": id.to_string(), "username": name})).unwrap()
    }

    #[test]
    fn set_get_delete() {
        let cache = MemoryCache::<User>::new();
        cache.set(user(1, "a"));
        assert_eq!(cache.get(&Snowflake::new(1)).unwrap().username, "a");
        assert!(cache.delete(&Snowflake::new(1)));
        assert!(!cache.delete(&Snowflake::new(1)));
        assert!(cache.get(&Snowflake::new(1)).is_none());
    }

    #[test]
    fn set_overwrites() {
        let cache = MemoryCache::<User>::new();
        cache.set(user(1, "a"));
        cache.set(user(1, "b"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&Snowflake::new(1)).unwrap().username, "b");
    }

    #[test]
    fn take_returns_and_removes() {
        let cache = MemoryCache::<User>::new();
        cache.set(user(7, "x"));
        assert_eq!(cache.take(&Snowflake::new(7)).unwrap().username, "x");
        assert!(cache.is_empty());
        assert!(cache.take(&Snowflake::new(7)).is_none());
    }

    #[test]
    fn compound_keys_separate_guilds() {
        let caches = Caches::in_memory();
        for guild in [1, 2] {
            let member: Member = serde_json::from_value(json!({
                "guild_id": guild.to_string(), "user": {"id": "9"}, "nick": format!("g{guild}")
            }))
            .unwrap();
            caches.members.set(member);
        }
        assert_eq!(caches.members.len(), 2);
        let nick = caches.member(Snowflake::new(2), Snowflake::new(9)).unwrap().nick;
        assert_eq!(nick.as_deref(), Some("g2"));
        assert!(caches.voice_state(Snowflake::new(1), Snowflake::new(9)).is_none());
    }

    #[test]
    fn retain_drops_rejected_entities() {
        let caches = Caches::in_memory();
        for (guild, user) in [(1, 9), (1, 8), (2, 9)] {
            let member: Member = serde_json::from_value(json!({
                "guild_id": guild.to_string(), "user": {"id": user.to_string()}
            }))
            .unwrap();
            caches.members.set(member);
        }

        let dropped = caches.members.retain(&|m| m.guild_id != Snowflake::new(1));
        assert_eq!(dropped, 2);
        assert_eq!(caches.members.len(), 1);
        assert!(caches.member(Snowflake::new(2), Snowflake::new(9)).is_some());
        assert_eq!(caches.members.retain(&|_| true), 0);
    }

    struct CountingStore {
        inner: MemoryCache<User>,
        deletes: parking_lot::Mutex<u32>,
    }

    impl CacheStore<User> for CountingStore {
        fn set(&self, entity: User) {
            self.inner.set(entity);
        }
        fn get(&self, key: &Snowflake) -> Option<User> {
            self.inner.get(key)
        }
        fn delete(&self, key: &Snowflake) -> bool {
            *self.deletes.lock() += 1;
            self.inner.delete(key)
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
        fn retain(&self, keep: &dyn Fn(&User) -> bool) -> usize {
            self.inner.retain(keep)
        }
    }

    #[test]
    fn default_take_goes_through_get_and_delete() {
        let store = CountingStore {
            inner: MemoryCache::new(),
            deletes: parking_lot::Mutex::new(0),
        };
        store.set(user(3, "c"));
        assert!(store.take(&Snowflake::new(3)).is_some());
        assert!(store.take(&Snowflake::new(3)).is_none());
        assert_eq!(*store.deletes.lock(), 1);
    }
}
