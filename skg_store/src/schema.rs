//! Persistence schema: tables, indices, and pragmas.
//!
//! Mirrors `database.py::init_database`/`get_connection`, realized as SQL
//! text constants executed with [`rusqlite::Connection::execute_batch`],
//! matching the `SCHEMA_SQL`/`PRAGMAS_SQL`-as-`&str`-constants idiom seen in
//! `other_examples/7b7d835e_rand-homer__homer-core-src-store-schema.rs.rs`.

use rusqlite::Connection;

/// Pragmas applied to every connection. `foreign_keys` matches the
/// original's `PRAGMA foreign_keys = ON`; `journal_mode = WAL` is a standard
/// companion pragma for a single-writer embedded database and changes no
/// documented semantics.
pub const PRAGMAS_SQL: &str = "
PRAGMA foreign_keys = ON;
PRAGMA journal_mode = WAL;
";

/// DDL for the three tables plus the five required indices.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS user_knowledge_vertex (
    vertex_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    content     TEXT NOT NULL,
    embedding   TEXT NOT NULL,
    meta_data   TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_vertex_user_content
    ON user_knowledge_vertex(user_id, content);

CREATE TABLE IF NOT EXISTS user_knowledge_edge (
    edge_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    tail_vertex INTEGER NOT NULL REFERENCES user_knowledge_vertex(vertex_id),
    head_vertex INTEGER NOT NULL REFERENCES user_knowledge_vertex(vertex_id),
    content     TEXT NOT NULL,
    meta_data   TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_edge_dedup
    ON user_knowledge_edge(user_id, tail_vertex, head_vertex, content);

CREATE TABLE IF NOT EXISTS simplex_vertex (
    node_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    parent_id   INTEGER REFERENCES simplex_vertex(node_id),
    vertex_id   INTEGER NOT NULL REFERENCES user_knowledge_vertex(vertex_id),
    depth       INTEGER NOT NULL,
    type        TEXT NOT NULL,
    meta_data   TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_simplex_sibling
    ON simplex_vertex(user_id, parent_id, vertex_id);
CREATE INDEX IF NOT EXISTS idx_simplex_coface_scan
    ON simplex_vertex(user_id, vertex_id, depth);
CREATE INDEX IF NOT EXISTS idx_simplex_children
    ON simplex_vertex(parent_id);
";

/// Opens a connection at `path`, applying the pragmas of [`PRAGMAS_SQL`].
/// Does not install the schema — call [`init_schema`] after opening on
/// first use.
///
/// # Errors
///
/// Returns an error if the connection cannot be opened or the pragmas
/// cannot be applied.
pub fn open_connection(path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(PRAGMAS_SQL)?;
    Ok(conn)
}

/// Installs the schema on `conn`. Idempotent — every statement is
/// `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the DDL fails to execute.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_install_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(PRAGMAS_SQL).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
