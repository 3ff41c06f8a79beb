use shared::ChatId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const DEFAULT_PREPROCESSING: bool = true;

/// Per-chat "preprocessing enabled" flags, kept for the process lifetime.
///
/// Clones share the same map. Every operation takes the lock for a single key
/// only; a poisoned lock is recovered since a `bool` entry cannot be left
/// half-written.
#[derive(Clone, Default)]
pub struct PreferenceStore {
    states: Arc<RwLock<HashMap<ChatId, bool>>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat_id: ChatId) -> bool {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states.get(&chat_id).copied().unwrap_or(DEFAULT_PREPROCESSING)
    }

    pub fn set(&self, chat_id: ChatId, enabled: bool) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        states.insert(chat_id, enabled);
    }

    /// Flips the flag under one write lock and returns the new value.
    pub fn toggle(&self, chat_id: ChatId) -> bool {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let entry = states.entry(chat_id).or_insert(DEFAULT_PREPROCESSING);
        *entry = !*entry;
        *entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_chat_defaults_to_enabled() {
        let store = PreferenceStore::new();
        assert!(store.get(42));
        assert!(store.get(-100123));
    }

    #[test]
    fn set_then_get_returns_value() {
        let store = PreferenceStore::new();
        for enabled in [false, true, false, false] {
            store.set(7, enabled);
            assert_eq!(store.get(7), enabled);
        }
    }

    #[test]
    fn chats_are_independent() {
        let store = PreferenceStore::new();
        store.set(1, false);
        assert!(!store.get(1));
        assert!(store.get(2));
        store.set(2, true);
        assert!(!store.get(1));
    }

    #[test]
    fn toggle_flips_from_default() {
        let store = PreferenceStore::new();
        assert!(!store.toggle(5));
        assert!(store.toggle(5));
        assert!(store.get(5));
    }

    #[test]
    fn clones_share_state() {
        let store = PreferenceStore::new();
        let handle = store.clone();
        handle.set(9, false);
        assert!(!store.get(9));
    }

    #[test]
    fn concurrent_writers_on_distinct_chats() {
        let store = PreferenceStore::new();
        let workers: Vec<_> = (0..8)
            .map(|chat_id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.toggle(chat_id);
                    }
                    store.set(chat_id, chat_id % 2 == 0);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        for chat_id in 0..8 {
            assert_eq!(store.get(chat_id), chat_id % 2 == 0);
        }
    }
}
