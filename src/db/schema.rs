//! Database schema and migrations for Cubby.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: directory tree, closure table and files
    r#"
-- One row per directory. A NULL parent marks the user's root.
CREATE TABLE directories (
    id          TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    name        TEXT NOT NULL,
    parent_id   TEXT REFERENCES directories(id),
    created_at  TEXT NOT NULL,
    updated_at  TEXT,
    last_write  TEXT,
    CONSTRAINT unique_directory_name_parent UNIQUE (parent_id, name)
);

-- NULL parents never collide under UNIQUE, so roots need their own index.
CREATE UNIQUE INDEX unique_user_root_directory
    ON directories(owner, name) WHERE parent_id IS NULL;

CREATE INDEX idx_directories_owner ON directories(owner);

-- Closure table: every (ancestor, descendant, distance) pair.
CREATE TABLE ancestry (
    ancestor_id     TEXT NOT NULL REFERENCES directories(id),
    descendant_id   TEXT NOT NULL REFERENCES directories(id),
    depth           INTEGER NOT NULL,
    PRIMARY KEY (ancestor_id, descendant_id)
);

CREATE INDEX idx_ancestry_descendant ON ancestry(descendant_id, depth);

CREATE TABLE files (
    id              TEXT PRIMARY KEY,
    owner           TEXT NOT NULL,
    directory_id    TEXT NOT NULL REFERENCES directories(id),
    name            TEXT NOT NULL,
    uploaded_at     TEXT NOT NULL,
    CONSTRAINT unique_file_name_directory UNIQUE (directory_id, name)
);

CREATE INDEX idx_files_owner ON files(owner);
"#,
];
