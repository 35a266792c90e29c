use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            email            TEXT NOT NULL UNIQUE,
            full_name        TEXT NOT NULL,
            password         TEXT NOT NULL,
            profile_pic      TEXT NOT NULL DEFAULT '',
            private_key      TEXT NOT NULL,
            private_key_set  INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id           TEXT PRIMARY KEY,
            sender_id    TEXT NOT NULL REFERENCES users(id),
            receiver_id  TEXT NOT NULL REFERENCES users(id),
            text         TEXT NOT NULL DEFAULT '',
            images       TEXT NOT NULL DEFAULT '[]',
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, receiver_id);

        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id, sender_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
