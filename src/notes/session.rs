use std::sync::Arc;

use dashmap::DashMap;

use crate::db::models::{DeletedItem, Item};

/// Per-chat memory of the last pulled and last deleted note.
#[derive(Clone, Default)]
pub struct SessionStore {
    last_pulled: Arc<DashMap<i64, Item>>,
    last_deleted: Arc<DashMap<i64, DeletedItem>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember_pulled(&self, chat_id: i64, item: Item) {
        self.last_pulled.insert(chat_id, item);
    }

    pub fn last_pulled(&self, chat_id: i64) -> Option<Item> {
        self.last_pulled.get(&chat_id).map(|entry| entry.value().clone())
    }

    pub fn forget_pulled(&self, chat_id: i64) {
        self.last_pulled.remove(&chat_id);
    }

    pub fn remember_deleted(&self, chat_id: i64, item: DeletedItem) {
        self.last_deleted.insert(chat_id, item);
    }

    pub fn last_deleted(&self, chat_id: i64) -> Option<DeletedItem> {
        self.last_deleted.get(&chat_id).map(|entry| entry.value().clone())
    }

    pub fn forget_deleted(&self, chat_id: i64) {
        self.last_deleted.remove(&chat_id);
    }
}
