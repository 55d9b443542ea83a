//! SQL schemas for the Kindred SQLite backends.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Ordered key-value table. `TEXT` keys compare bytewise (BINARY collation),
/// which is the order every prefix scan relies on.
pub const KV_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS entries (
    key    TEXT PRIMARY KEY,
    value  BLOB NOT NULL
) WITHOUT ROWID;

PRAGMA user_version = 1;
";

/// Graph tables. Nodes are only ever upserted with `ON CONFLICT DO UPDATE`:
/// `INSERT OR REPLACE` deletes the old row first, which would cascade to its
/// edges.
pub const GRAPH_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS nodes (
    node_id     TEXT PRIMARY KEY,
    node_type   TEXT NOT NULL,   -- snake_case NodeType
    properties  TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edges (
    edge_id     TEXT PRIMARY KEY,
    edge_type   TEXT NOT NULL,   -- SCREAMING_SNAKE_CASE EdgeType
    source_id   TEXT NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    target_id   TEXT NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    properties  TEXT NOT NULL DEFAULT '{}',
    confidence  REAL NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS nodes_type_idx   ON nodes(node_type, node_id);
CREATE INDEX IF NOT EXISTS edges_source_idx ON edges(source_id, edge_type, target_id);
CREATE INDEX IF NOT EXISTS edges_target_idx ON edges(target_id, edge_type, source_id);

PRAGMA user_version = 1;
";
