use std::sync::Mutex;

use chrono::Utc;
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use replicator_core::types::{ChatId, MappingKind, MsgId, PairId, PairStatus, SenderBinding, SenderId};

use crate::error::{Result, StoreError};
use crate::types::{BlockedImage, FilterPolicy, Mapping, Pair, PairStats, SenderRecord, StatKind, Subscription};

/// Durable registry of pairs, mappings, senders, block lists, and
/// subscriptions, backed by a single SQLite connection.
///
/// Two read-mostly caches sit in front of the connection: `source_index`
/// mirrors `source_chat -> [pair_id]` for the hot path of routing an inbound
/// message, and `blocked_images` mirrors the full block-list for the
/// Hamming-distance scan. Both are rebuilt wholesale (not incrementally
/// patched) on the write paths that can affect them.
pub struct Store {
    conn: Mutex<Connection>,
    source_index: DashMap<ChatId, Vec<PairId>>,
    blocked_images: DashMap<i64, BlockedImage>,
}

fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        crate::db::init_db(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            source_index: DashMap::new(),
            blocked_images: DashMap::new(),
        };
        store.warm_caches()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::init_db(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            source_index: DashMap::new(),
            blocked_images: DashMap::new(),
        };
        store.warm_caches()?;
        Ok(store)
    }

    fn warm_caches(&self) -> Result<()> {
        self.rebuild_source_index()?;
        self.reload_blocked_images()
    }

    fn rebuild_source_index(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, source_chat FROM pair WHERE status = 'active'")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        self.source_index.clear();
        for row in rows {
            let (id, chat) = row?;
            self.source_index.entry(chat).or_default().push(PairId(id));
        }
        debug!(pairs = self.source_index.len(), "source index rebuilt");
        Ok(())
    }

    // ---- pairs ----------------------------------------------------------

    pub fn upsert_pair(&self, pair: &mut Pair) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filters_json = serde_json::to_string(&pair.filters)?;
        let stats_json = serde_json::to_string(&pair.stats)?;
        let now = Utc::now().to_rfc3339();

        if pair.id.0 == 0 {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM pair WHERE source_chat = ?1 AND destination_chat = ?2",
                    params![pair.source_chat, pair.destination_chat],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Err(StoreError::DuplicatePair(id, pair.destination_chat));
            }
            pair.created_at = now.clone();
            pair.updated_at = now.clone();
            conn.execute(
                "INSERT INTO pair
                    (source_chat, destination_chat, name, status, sender_binding, filters, stats, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    pair.source_chat,
                    pair.destination_chat,
                    pair.name,
                    pair.status.to_string(),
                    sender_binding_to_str(&pair.sender_binding),
                    filters_json,
                    stats_json,
                    pair.created_at,
                    pair.updated_at,
                ],
            )?;
            pair.id = PairId(conn.last_insert_rowid());
        } else {
            pair.updated_at = now;
            conn.execute(
                "UPDATE pair SET source_chat=?2, destination_chat=?3, name=?4, status=?5,
                    sender_binding=?6, filters=?7, stats=?8, updated_at=?9 WHERE id=?1",
                params![
                    pair.id.0,
                    pair.source_chat,
                    pair.destination_chat,
                    pair.name,
                    pair.status.to_string(),
                    sender_binding_to_str(&pair.sender_binding),
                    filters_json,
                    stats_json,
                    pair.updated_at,
                ],
            )?;
        }
        drop(conn);
        self.rebuild_source_index()?;
        Ok(())
    }

    pub fn delete_pair(&self, id: PairId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM pair WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::PairNotFound(id.0));
        }
        conn.execute("DELETE FROM mapping WHERE pair_id = ?1", params![id.0])?;
        conn.execute("DELETE FROM blocked_word WHERE pair_id = ?1", params![id.0])?;
        conn.execute("DELETE FROM blocked_image WHERE pair_id = ?1", params![id.0])?;
        drop(conn);
        self.rebuild_source_index()?;
        self.reload_blocked_images()?;
        info!(pair_id = id.0, "pair and dependent rows deleted");
        Ok(())
    }

    pub fn get_pair_by_id(&self, id: PairId) -> Result<Pair> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(PAIR_SELECT_SQL, params![id.0], row_to_pair)
            .optional()?
            .ok_or(StoreError::PairNotFound(id.0))
    }

    pub fn list_pairs(&self) -> Result<Vec<Pair>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, source_chat, destination_chat, name, status, sender_binding, filters, stats, created_at, updated_at FROM pair ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_pair)?;
        rows.map(|r| r.map_err(StoreError::from)).collect()
    }

    /// O(1) lookup of active pairs sourced from a given chat, used on the
    /// hot inbound-message path. Served from cache; never touches the
    /// connection directly.
    pub fn pairs_by_source_chat(&self, chat: ChatId) -> Vec<PairId> {
        self.source_index.get(&chat).map(|v| v.clone()).unwrap_or_default()
    }

    /// Increment one counter on a pair's stats blob in place.
    pub fn bump_stat(&self, pair_id: PairId, kind: StatKind) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let stats_json: String = conn.query_row(
            "SELECT stats FROM pair WHERE id = ?1",
            params![pair_id.0],
            |row| row.get(0),
        ).optional()?.ok_or(StoreError::PairNotFound(pair_id.0))?;
        let mut stats: PairStats = serde_json::from_str(&stats_json).unwrap_or_default();
        match kind {
            StatKind::Sent => stats.sent += 1,
            StatKind::WordsBlocked => stats.words_blocked += 1,
            StatKind::ImagesBlocked => stats.images_blocked += 1,
            StatKind::OtherDropped => stats.other_dropped += 1,
            StatKind::SendErrors => stats.send_errors += 1,
        }
        conn.execute(
            "UPDATE pair SET stats = ?2 WHERE id = ?1",
            params![pair_id.0, serde_json::to_string(&stats)?],
        )?;
        Ok(())
    }

    // ---- mappings ---------------------------------------------------------

    pub fn save_mapping(&self, mapping: &Mapping) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO mapping
                (source_msg_id, dest_msg_id, pair_id, sender_id, source_chat, dest_chat,
                 kind, has_media, reply_to_source_id, reply_to_dest_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(source_msg_id, pair_id) DO UPDATE SET
                dest_msg_id=excluded.dest_msg_id,
                sender_id=excluded.sender_id,
                kind=excluded.kind,
                has_media=excluded.has_media,
                reply_to_source_id=excluded.reply_to_source_id,
                reply_to_dest_id=excluded.reply_to_dest_id,
                updated_at=excluded.updated_at",
            params![
                mapping.source_msg_id,
                mapping.dest_msg_id,
                mapping.pair_id.0,
                mapping.sender_id.map(|s| s.0),
                mapping.source_chat,
                mapping.dest_chat,
                mapping.kind.to_string(),
                mapping.has_media as i32,
                mapping.reply_to_source_id,
                mapping.reply_to_dest_id,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_mapping(&self, pair_id: PairId, source_msg_id: MsgId) -> Result<Mapping> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(MAPPING_SELECT_SQL, params![source_msg_id, pair_id.0], row_to_mapping)
            .optional()?
            .ok_or(StoreError::MappingNotFound(source_msg_id, pair_id.0))
    }

    pub fn delete_mapping(&self, pair_id: PairId, source_msg_id: MsgId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "DELETE FROM mapping WHERE source_msg_id = ?1 AND pair_id = ?2",
            params![source_msg_id, pair_id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::MappingNotFound(source_msg_id, pair_id.0));
        }
        Ok(())
    }

    // ---- senders ------------------------------------------------------

    pub fn add_sender(&self, display_handle: &str, credential: &str) -> Result<SenderRecord> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sender (display_handle, credential, enabled, usage_count)
             VALUES (?1, ?2, 1, 0)",
            params![display_handle, credential],
        )?;
        let id = SenderId(conn.last_insert_rowid());
        Ok(SenderRecord {
            id,
            display_handle: display_handle.to_string(),
            credential: credential.to_string(),
            enabled: true,
            usage_count: 0,
            last_used_at: None,
        })
    }

    pub fn toggle_sender(&self, id: SenderId, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE sender SET enabled = ?2 WHERE id = ?1",
            params![id.0, enabled as i32],
        )?;
        if affected == 0 {
            return Err(StoreError::SenderNotFound(id.0));
        }
        Ok(())
    }

    pub fn delete_sender(&self, id: SenderId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM sender WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::SenderNotFound(id.0));
        }
        Ok(())
    }

    pub fn list_senders(&self) -> Result<Vec<SenderRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, display_handle, credential, enabled, usage_count, last_used_at FROM sender ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_sender)?;
        rows.map(|r| r.map_err(StoreError::from)).collect()
    }

    pub fn record_sender_use(&self, id: SenderId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE sender SET usage_count = usage_count + 1, last_used_at = ?2 WHERE id = ?1",
            params![id.0, now],
        )?;
        Ok(())
    }

    // ---- blocked words --------------------------------------------------

    pub fn add_blocked_word(&self, word: &str, pair_id: Option<PairId>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO blocked_word (word, pair_id, created_at) VALUES (?1, ?2, ?3)",
            params![word, pair_id.map(|p| p.0), now],
        )?;
        Ok(())
    }

    pub fn remove_blocked_word(&self, word: &str, pair_id: Option<PairId>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match pair_id {
            Some(p) => conn.execute(
                "DELETE FROM blocked_word WHERE word = ?1 AND pair_id = ?2",
                params![word, p.0],
            )?,
            None => conn.execute(
                "DELETE FROM blocked_word WHERE word = ?1 AND pair_id IS NULL",
                params![word],
            )?,
        };
        Ok(())
    }

    /// The admin-managed global word block (`pair_id IS NULL`), independent
    /// of any one pair.
    pub fn global_blocked_words(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT word FROM blocked_word WHERE pair_id IS NULL ORDER BY word")?;
        let words = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(words)
    }

    /// Words blocking a pair, split by scope: the global list and this
    /// pair's own additions to the same table. Callers fold a pair's
    /// `FilterPolicy.blocked_words` into the latter themselves, since that
    /// list lives on the pair record, not here.
    pub fn blocked_words_for(&self, pair_id: PairId) -> Result<(Vec<String>, Vec<String>)> {
        let global = self.global_blocked_words()?;
        let conn = self.conn.lock().unwrap();
        let mut pair_stmt = conn.prepare("SELECT word FROM blocked_word WHERE pair_id = ?1 ORDER BY word")?;
        let pair_scoped: Vec<String> = pair_stmt
            .query_map(params![pair_id.0], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<_>>()?;

        Ok((global, pair_scoped))
    }

    // ---- blocked images -------------------------------------------------

    pub fn block_image(&self, phash: u64, pair_id: Option<PairId>, threshold: u32, note: Option<String>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR REPLACE INTO blocked_image (phash, pair_id, threshold, usage_count, note, created_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![phash as i64, pair_id.map(|p| p.0), threshold, note, now],
        )?;
        drop(conn);
        self.reload_blocked_images()
    }

    pub fn unblock_image(&self, phash: u64, pair_id: Option<PairId>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match pair_id {
            Some(p) => conn.execute(
                "DELETE FROM blocked_image WHERE phash = ?1 AND pair_id = ?2",
                params![phash as i64, p.0],
            )?,
            None => conn.execute(
                "DELETE FROM blocked_image WHERE phash = ?1 AND pair_id IS NULL",
                params![phash as i64],
            )?,
        };
        drop(conn);
        self.reload_blocked_images()
    }

    pub fn list_blocked_images(&self) -> Vec<BlockedImage> {
        self.blocked_images.iter().map(|e| e.value().clone()).collect()
    }

    fn reload_blocked_images(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT rowid, phash, pair_id, threshold, usage_count, note, created_at FROM blocked_image",
        )?;
        let rows = stmt.query_map([], row_to_blocked_image)?;
        let mut fresh = Vec::new();
        for row in rows {
            fresh.push(row?);
        }
        drop(stmt);
        self.blocked_images.clear();
        for (rowid, img) in fresh {
            self.blocked_images.insert(rowid, img);
        }
        Ok(())
    }

    /// Scans the in-memory block-list cache for a perceptual hash within
    /// threshold of any global or pair-scoped entry. Entry scope wins over
    /// scan order: a pair-scoped entry only matches for that pair.
    pub fn lookup_blocked(&self, phash: u64, pair_id: PairId) -> Option<BlockedImage> {
        self.blocked_images.iter().find_map(|entry| {
            let img = entry.value();
            let scoped = img.pair_id.map(|p| p == pair_id).unwrap_or(true);
            if scoped && hamming(phash, img.phash) <= img.threshold {
                Some(img.clone())
            } else {
                None
            }
        })
    }

    // ---- subscriptions --------------------------------------------------

    pub fn add_subscription(&self, sub: &Subscription) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO subscription (user_id, expires_at, added_by, notes)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET expires_at=excluded.expires_at, added_by=excluded.added_by, notes=excluded.notes",
            params![sub.user_id, sub.expires_at, sub.added_by, sub.notes],
        )?;
        Ok(())
    }

    pub fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT user_id, expires_at, added_by, notes FROM subscription ORDER BY expires_at")?;
        let rows = stmt.query_map([], row_to_subscription)?;
        rows.map(|r| r.map_err(StoreError::from)).collect()
    }

    /// Subscriptions whose expires_at has already passed, as of `now`.
    pub fn expired(&self, now: &str) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, expires_at, added_by, notes FROM subscription WHERE expires_at <= ?1",
        )?;
        let rows = stmt.query_map(params![now], row_to_subscription)?;
        rows.map(|r| r.map_err(StoreError::from)).collect()
    }

    pub fn get_subscription(&self, user_id: &str) -> Result<Subscription> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, expires_at, added_by, notes FROM subscription WHERE user_id = ?1",
            params![user_id],
            row_to_subscription,
        )
        .optional()?
        .ok_or_else(|| StoreError::SubscriptionNotFound(user_id.to_string()))
    }

    pub fn remove_subscription(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM subscription WHERE user_id = ?1", params![user_id])?;
        if affected == 0 {
            return Err(StoreError::SubscriptionNotFound(user_id.to_string()));
        }
        Ok(())
    }

    // ---- maintenance ----------------------------------------------------

    /// Delete mappings older than `cutoff` (RFC3339), keeping pairs and
    /// their stats intact. Used by the admin `cleanup` operation.
    pub fn cleanup_mappings_older_than(&self, cutoff: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM mapping WHERE created_at < ?1", params![cutoff])?;
        Ok(affected)
    }

    /// Snapshot the live database to `dest_path` via SQLite's online
    /// backup API, safe to call while the connection is in active use.
    pub fn backup_to(&self, dest_path: &str) -> Result<()> {
        if let Some(parent) = std::path::Path::new(dest_path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.conn.lock().unwrap();
        let mut dest = Connection::open(dest_path)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(5, std::time::Duration::from_millis(250), None)?;
        Ok(())
    }
}

const PAIR_SELECT_SQL: &str = "SELECT id, source_chat, destination_chat, name, status, sender_binding, filters, stats, created_at, updated_at FROM pair WHERE id = ?1";

const MAPPING_SELECT_SQL: &str = "SELECT source_msg_id, dest_msg_id, pair_id, sender_id, source_chat, dest_chat, kind, has_media, reply_to_source_id, reply_to_dest_id, created_at, updated_at FROM mapping WHERE source_msg_id = ?1 AND pair_id = ?2";

fn sender_binding_to_str(b: &SenderBinding) -> String {
    match b {
        SenderBinding::Pool => "pool".to_string(),
        SenderBinding::Specific(id) => format!("specific:{}", id.0),
    }
}

fn sender_binding_from_str(s: &str) -> SenderBinding {
    match s.strip_prefix("specific:").and_then(|n| n.parse::<i64>().ok()) {
        Some(id) => SenderBinding::Specific(SenderId(id)),
        None => SenderBinding::Pool,
    }
}

fn row_to_pair(row: &rusqlite::Row) -> rusqlite::Result<Pair> {
    let filters_json: String = row.get(6)?;
    let stats_json: String = row.get(7)?;
    let status_str: String = row.get(4)?;
    let binding_str: String = row.get(5)?;
    Ok(Pair {
        id: PairId(row.get(0)?),
        source_chat: row.get(1)?,
        destination_chat: row.get(2)?,
        name: row.get(3)?,
        status: status_str.parse::<PairStatus>().unwrap_or(PairStatus::Active),
        sender_binding: sender_binding_from_str(&binding_str),
        filters: serde_json::from_str::<FilterPolicy>(&filters_json).unwrap_or_default(),
        stats: serde_json::from_str::<PairStats>(&stats_json).unwrap_or_default(),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_mapping(row: &rusqlite::Row) -> rusqlite::Result<Mapping> {
    let kind_str: String = row.get(6)?;
    Ok(Mapping {
        source_msg_id: row.get(0)?,
        dest_msg_id: row.get(1)?,
        pair_id: PairId(row.get(2)?),
        sender_id: row.get::<_, Option<i64>>(3)?.map(SenderId),
        source_chat: row.get(4)?,
        dest_chat: row.get(5)?,
        kind: kind_str.parse::<MappingKind>().unwrap_or(MappingKind::Text),
        has_media: row.get::<_, i64>(7)? != 0,
        reply_to_source_id: row.get(8)?,
        reply_to_dest_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn row_to_sender(row: &rusqlite::Row) -> rusqlite::Result<SenderRecord> {
    Ok(SenderRecord {
        id: SenderId(row.get(0)?),
        display_handle: row.get(1)?,
        credential: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        usage_count: row.get::<_, i64>(4)? as u64,
        last_used_at: row.get(5)?,
    })
}

fn row_to_blocked_image(row: &rusqlite::Row) -> rusqlite::Result<(i64, BlockedImage)> {
    let rowid: i64 = row.get(0)?;
    let img = BlockedImage {
        phash: row.get::<_, i64>(1)? as u64,
        pair_id: row.get::<_, Option<i64>>(2)?.map(PairId),
        threshold: row.get::<_, i64>(3)? as u32,
        usage_count: row.get::<_, i64>(4)? as u64,
        note: row.get(5)?,
        created_at: row.get(6)?,
    };
    Ok((rowid, img))
}

fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        user_id: row.get(0)?,
        expires_at: row.get(1)?,
        added_by: row.get(2)?,
        notes: row.get(3)?,
    })
}
