use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

const USER_COLUMNS: &str =
    "id, email, full_name, password, profile_pic, private_key, private_key_set, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
        private_key: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, full_name, password, private_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, email, full_name, password_hash, private_key, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
            let row = stmt.query_row([email], read_user).optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            let row = stmt.query_row([id], read_user).optional()?;
            Ok(row)
        })
    }

    /// Case-insensitive email substring search, excluding the searcher.
    pub fn search_users_by_email(&self, term: &str, exclude_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE instr(lower(email), lower(?1)) > 0 AND id != ?2
                 ORDER BY email"
            ))?;
            let rows = stmt
                .query_map(params![term, exclude_id], read_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_profile_pic(&self, id: &str, profile_pic: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET profile_pic = ?2 WHERE id = ?1",
                params![id, profile_pic],
            )?;
            Ok(changed > 0)
        })
    }

    /// Stores a new private key and marks it as explicitly set. The old
    /// key is overwritten; no history is kept.
    pub fn set_private_key(&self, id: &str, private_key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET private_key = ?2, private_key_set = 1 WHERE id = ?1",
                params![id, private_key],
            )?;
            Ok(changed > 0)
        })
    }

    /// Batch-fetch users for a set of ids, preserving the order of `ids`.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let sql_params: Vec<&dyn rusqlite::types::ToSql> = ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let mut rows = stmt
                .query_map(sql_params.as_slice(), read_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // SQLite returns IN-clause matches in table order; callers want
            // the order of `ids` (the sidebar scan order).
            rows.sort_by_key(|row| ids.iter().position(|id| *id == row.id));
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        images_json: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, text, images, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, sender_id, receiver_id, text, images_json, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, text, images, created_at
                 FROM messages WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], read_message).optional()?;
            Ok(row)
        })
    }

    /// All messages between the pair, in either direction, in insertion order.
    pub fn messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages_between(conn, a, b))
    }

    /// Whether any message exists between the pair, in either direction.
    /// A `false` here is what makes a send a first contact.
    pub fn has_messages_between(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM messages
                     WHERE (sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1))",
                params![a, b],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Distinct ids of everyone the user has a conversation with, in the
    /// order they first appear in the message scan.
    pub fn conversation_partner_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sender_id, receiver_id FROM messages
                 WHERE sender_id = ?1 OR receiver_id = ?1
                 ORDER BY rowid",
            )?;

            let pairs = stmt
                .query_map([user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut seen = HashSet::new();
            let mut partners = Vec::new();
            for (sender_id, receiver_id) in pairs {
                let other = if sender_id == user_id {
                    receiver_id
                } else {
                    sender_id
                };
                if seen.insert(other.clone()) {
                    partners.push(other);
                }
            }
            Ok(partners)
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(removed)
        })
    }

    /// Removes every message between the pair in one statement, so the
    /// bulk delete is atomic. Returns the number of rows removed.
    pub fn delete_conversation(&self, a: &str, b: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)",
                params![a, b],
            )?;
            Ok(removed)
        })
    }
}

fn read_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        password: row.get(3)?,
        profile_pic: row.get(4)?,
        private_key: row.get(5)?,
        private_key_set: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn read_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        text: row.get(3)?,
        images: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_messages_between(conn: &Connection, a: &str, b: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, text, images, created_at
         FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2)
            OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY rowid",
    )?;

    let rows = stmt
        .query_map(params![a, b], read_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, id: &str, email: &str) {
        db.create_user(
            id,
            email,
            "Test User",
            "$argon2id$fake-hash",
            "c0ffee00",
            "2026-01-01T00:00:00Z",
        )
        .unwrap();
    }

    fn add_message(db: &Database, id: &str, sender: &str, receiver: &str, text: &str) {
        db.insert_message(id, sender, receiver, text, "[]", "2026-01-01T00:00:00Z")
            .unwrap();
    }

    #[test]
    fn messages_between_covers_both_directions_in_order() {
        let db = test_db();
        add_user(&db, "a", "a@example.com");
        add_user(&db, "b", "b@example.com");
        add_user(&db, "c", "c@example.com");

        add_message(&db, "m1", "a", "b", "hi");
        add_message(&db, "m2", "b", "a", "hello");
        add_message(&db, "m3", "a", "c", "unrelated");
        add_message(&db, "m4", "a", "b", "again");

        let messages = db.messages_between("a", "b").unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m4"]);

        // Same result regardless of argument order
        let reversed = db.messages_between("b", "a").unwrap();
        assert_eq!(reversed.len(), 3);
    }

    #[test]
    fn first_contact_detection() {
        let db = test_db();
        add_user(&db, "a", "a@example.com");
        add_user(&db, "b", "b@example.com");

        assert!(!db.has_messages_between("a", "b").unwrap());
        add_message(&db, "m1", "b", "a", "hi");
        assert!(db.has_messages_between("a", "b").unwrap());
        assert!(db.has_messages_between("b", "a").unwrap());
    }

    #[test]
    fn partner_list_is_distinct_and_scan_ordered() {
        let db = test_db();
        for (id, email) in [
            ("a", "a@example.com"),
            ("b", "b@example.com"),
            ("c", "c@example.com"),
        ] {
            add_user(&db, id, email);
        }

        add_message(&db, "m1", "a", "c", "first");
        add_message(&db, "m2", "b", "a", "second");
        add_message(&db, "m3", "a", "c", "third");
        add_message(&db, "m4", "b", "c", "not a's conversation");

        let partners = db.conversation_partner_ids("a").unwrap();
        assert_eq!(partners, vec!["c".to_string(), "b".to_string()]);
    }

    #[test]
    fn delete_conversation_removes_exactly_the_pair() {
        let db = test_db();
        for (id, email) in [
            ("a", "a@example.com"),
            ("b", "b@example.com"),
            ("c", "c@example.com"),
        ] {
            add_user(&db, id, email);
        }

        add_message(&db, "m1", "a", "b", "one");
        add_message(&db, "m2", "b", "a", "two");
        add_message(&db, "m3", "a", "c", "keep me");

        let removed = db.delete_conversation("a", "b").unwrap();
        assert_eq!(removed, 2);
        assert!(db.messages_between("a", "b").unwrap().is_empty());
        assert_eq!(db.messages_between("a", "c").unwrap().len(), 1);
    }

    #[test]
    fn delete_single_message() {
        let db = test_db();
        add_user(&db, "a", "a@example.com");
        add_user(&db, "b", "b@example.com");
        add_message(&db, "m1", "a", "b", "one");

        assert_eq!(db.delete_message("m1").unwrap(), 1);
        assert_eq!(db.delete_message("m1").unwrap(), 0);
        assert!(db.get_message("m1").unwrap().is_none());
    }

    #[test]
    fn email_search_is_case_insensitive_and_excludes_self() {
        let db = test_db();
        add_user(&db, "a", "Alice@Example.com");
        add_user(&db, "b", "bob@example.com");
        add_user(&db, "c", "carol@other.net");

        let hits = db.search_users_by_email("EXAMPLE", "a").unwrap();
        let emails: Vec<&str> = hits.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["bob@example.com"]);

        let hits = db.search_users_by_email("alice", "b").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = test_db();
        add_user(&db, "a", "a@example.com");
        let result = db.create_user(
            "b",
            "a@example.com",
            "Other",
            "$argon2id$fake-hash",
            "deadbeef",
            "2026-01-01T00:00:00Z",
        );
        assert!(result.is_err());
    }

    #[test]
    fn private_key_rotation_persists() {
        let db = test_db();
        add_user(&db, "a", "a@example.com");

        let before = db.get_user_by_id("a").unwrap().unwrap();
        assert!(!before.private_key_set);
        assert!(!before.private_key.is_empty());

        assert!(db.set_private_key("a", "ab12").unwrap());
        let after = db.get_user_by_id("a").unwrap().unwrap();
        assert_eq!(after.private_key, "ab12");
        assert!(after.private_key_set);

        assert!(!db.set_private_key("missing", "ab12").unwrap());
    }

    #[test]
    fn users_by_ids_preserves_requested_order() {
        let db = test_db();
        add_user(&db, "a", "a@example.com");
        add_user(&db, "b", "b@example.com");
        add_user(&db, "c", "c@example.com");

        let ids = vec!["c".to_string(), "a".to_string()];
        let users = db.get_users_by_ids(&ids).unwrap();
        let got: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(got, vec!["c", "a"]);

        assert!(db.get_users_by_ids(&[]).unwrap().is_empty());
    }
}
