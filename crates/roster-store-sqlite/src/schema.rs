//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup. Every statement is idempotent.

pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id      INTEGER PRIMARY KEY,
    username        TEXT UNIQUE,
    full_name       TEXT,
    display_name    TEXT,
    preferred_email TEXT,
    status          TEXT,
    active          INTEGER NOT NULL DEFAULT 1,
    password_hash   TEXT,            -- argon2 PHC string
    registered_at   TEXT NOT NULL    -- RFC 3339 UTC
);

-- Every registered address, the preferred one included.
CREATE TABLE IF NOT EXISTS account_emails (
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    email      TEXT NOT NULL,
    PRIMARY KEY (account_id, email)
);

CREATE TABLE IF NOT EXISTS groups (
    group_uuid     TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    url            TEXT,
    email          TEXT,
    visible_to_all INTEGER NOT NULL DEFAULT 0,
    owner_uuid     TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_uuid TEXT NOT NULL REFERENCES groups(group_uuid),
    account_id INTEGER NOT NULL,
    PRIMARY KEY (group_uuid, account_id)
);

-- Subgroups may belong to any backend, so there is no foreign key on them.
CREATE TABLE IF NOT EXISTS group_subgroups (
    group_uuid    TEXT NOT NULL REFERENCES groups(group_uuid),
    subgroup_uuid TEXT NOT NULL,
    PRIMARY KEY (group_uuid, subgroup_uuid)
);

CREATE TABLE IF NOT EXISTS draft_comments (
    draft_id   TEXT PRIMARY KEY,
    account_id INTEGER NOT NULL,
    change_id  INTEGER NOT NULL,
    message    TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS published_comments (
    comment_id   TEXT PRIMARY KEY,
    account_id   INTEGER NOT NULL,
    change_id    INTEGER NOT NULL,
    message      TEXT NOT NULL,
    published_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS group_members_account_idx ON group_members(account_id);
CREATE INDEX IF NOT EXISTS group_subgroups_child_idx ON group_subgroups(subgroup_uuid);
CREATE INDEX IF NOT EXISTS draft_comments_account_idx ON draft_comments(account_id);

PRAGMA user_version = 1;
";
