use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
)";

/// One row of the projects table. Serialized with the `Id`/`Name` field
/// names the API clients expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Handle to the projects table. Cheap to clone; all clones share one
/// connection behind a mutex, which is enough for the short single-table
/// statements this API runs.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic elsewhere may poison the lock; the connection itself is
        // still usable.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list(&self) -> rusqlite::Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name FROM projects ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    pub fn get(&self, id: i64) -> rusqlite::Result<Option<Project>> {
        self.conn()
            .query_row(
                "SELECT id, name FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    pub fn create(&self, name: &str) -> rusqlite::Result<Project> {
        let conn = self.conn();
        conn.execute("INSERT INTO projects (name) VALUES (?1)", params![name])?;
        Ok(Project {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Returns the updated row, or `None` when no row has this id.
    pub fn update(&self, id: i64, name: &str) -> rusqlite::Result<Option<Project>> {
        let changed = self.conn().execute(
            "UPDATE projects SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok((changed > 0).then(|| Project {
            id,
            name: name.to_string(),
        }))
    }

    /// Returns whether a row was actually deleted.
    pub fn delete(&self, id: i64) -> rusqlite::Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
