use rusqlite::{Connection, Result};

/// Initialise all replicator tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_pair_table(conn)?;
    create_mapping_table(conn)?;
    create_sender_table(conn)?;
    create_blocked_word_table(conn)?;
    create_blocked_image_table(conn)?;
    create_subscription_table(conn)?;
    create_setting_table(conn)?;
    Ok(())
}

fn create_pair_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pair (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            source_chat      INTEGER NOT NULL,
            destination_chat INTEGER NOT NULL,
            name             TEXT NOT NULL,
            status           TEXT NOT NULL DEFAULT 'active',
            sender_binding   TEXT NOT NULL DEFAULT 'pool',
            filters          TEXT NOT NULL,
            stats            TEXT NOT NULL,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            UNIQUE(source_chat, destination_chat)
        );
        CREATE INDEX IF NOT EXISTS idx_pair_status ON pair(status);
        CREATE INDEX IF NOT EXISTS idx_pair_source ON pair(source_chat);",
    )
}

fn create_mapping_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS mapping (
            source_msg_id      INTEGER NOT NULL,
            dest_msg_id        INTEGER NOT NULL,
            pair_id            INTEGER NOT NULL REFERENCES pair(id) ON DELETE CASCADE,
            sender_id          INTEGER,
            source_chat        INTEGER NOT NULL,
            dest_chat          INTEGER NOT NULL,
            kind               TEXT NOT NULL,
            has_media          INTEGER NOT NULL DEFAULT 0,
            reply_to_source_id INTEGER,
            reply_to_dest_id   INTEGER,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL,
            UNIQUE(source_msg_id, pair_id)
        );
        CREATE INDEX IF NOT EXISTS idx_mapping_dest ON mapping(dest_msg_id, pair_id);",
    )
}

fn create_sender_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sender (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            display_handle TEXT NOT NULL,
            credential     TEXT NOT NULL,
            enabled        INTEGER NOT NULL DEFAULT 1,
            usage_count    INTEGER NOT NULL DEFAULT 0,
            last_used_at   TEXT
        );",
    )
}

fn create_blocked_word_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blocked_word (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            word       TEXT NOT NULL,
            pair_id    INTEGER REFERENCES pair(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE(word, pair_id)
        );
        CREATE INDEX IF NOT EXISTS idx_blocked_word_pair ON blocked_word(pair_id);",
    )
}

fn create_blocked_image_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blocked_image (
            phash       INTEGER NOT NULL,
            pair_id     INTEGER REFERENCES pair(id) ON DELETE CASCADE,
            threshold   INTEGER NOT NULL DEFAULT 5,
            usage_count INTEGER NOT NULL DEFAULT 0,
            note        TEXT,
            created_at  TEXT NOT NULL,
            UNIQUE(phash, pair_id)
        );
        CREATE INDEX IF NOT EXISTS idx_blocked_image_scope ON blocked_image(phash, pair_id);",
    )
}

fn create_subscription_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS subscription (
            user_id    TEXT PRIMARY KEY,
            expires_at TEXT NOT NULL,
            added_by   TEXT NOT NULL,
            notes      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_subscription_expiry ON subscription(expires_at);",
    )
}

fn create_setting_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS setting (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}
