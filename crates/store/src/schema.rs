//! SQLite schema
//!
//! Decimals are stored as TEXT, timestamps as RFC3339 TEXT in UTC with
//! microseconds, so lexical order matches chronological order.

pub(crate) const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        utc_offset_secs INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS checks (
        id TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL,
        provider TEXT NOT NULL,
        tx_id TEXT NOT NULL,
        currency_id INTEGER NOT NULL,
        direction TEXT NOT NULL,
        output_address TEXT NOT NULL,
        external_id TEXT NOT NULL,
        status TEXT NOT NULL,
        score TEXT NOT NULL DEFAULT '0',
        risk_level TEXT NOT NULL DEFAULT 'undefined',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_checks_user_created
    ON checks(user_id, created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_checks_provider
    ON checks(provider, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS check_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        check_id TEXT NOT NULL REFERENCES checks(id),
        request BLOB NOT NULL,
        response BLOB NOT NULL,
        error TEXT,
        attempt INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(check_id, attempt)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS check_queue (
        check_id TEXT PRIMARY KEY REFERENCES checks(id),
        attempts INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        user_id INTEGER NOT NULL,
        provider TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, provider, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS provider_currencies (
        provider TEXT NOT NULL,
        currency_id INTEGER NOT NULL,
        code TEXT NOT NULL,
        asset TEXT NOT NULL,
        network TEXT NOT NULL,
        token_id TEXT,
        family TEXT NOT NULL,
        PRIMARY KEY (provider, currency_id)
    )
    "#,
];
