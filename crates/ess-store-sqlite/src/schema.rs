//! SQL schema for the case store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Reference data, owned elsewhere and upserted into this store.
CREATE TABLE IF NOT EXISTS registrants (
    registrant_id TEXT PRIMARY KEY,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    date_of_birth TEXT,
    active        INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS team_members (
    team_member_id TEXT PRIMARY KEY,
    display_name   TEXT NOT NULL,
    active         INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS tasks (
    task_number TEXT PRIMARY KEY,
    community   TEXT,
    active      INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS suppliers (
    supplier_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1
);

-- Files are never deleted; `active` = 0 is the logical delete.
CREATE TABLE IF NOT EXISTS evacuation_files (
    file_key                   TEXT PRIMARY KEY,
    file_number                INTEGER NOT NULL UNIQUE,
    status                     TEXT NOT NULL,
    active                     INTEGER NOT NULL DEFAULT 1,
    primary_registrant_id      TEXT NOT NULL REFERENCES registrants(registrant_id),
    task_number                TEXT REFERENCES tasks(task_number),
    evacuated_from             TEXT,
    security_phrase            TEXT,
    created_at                 TEXT NOT NULL,
    current_needs_assessment_id TEXT
);

-- Every file write appends a snapshot; the file points at the current one.
CREATE TABLE IF NOT EXISTS needs_assessments (
    needs_assessment_id TEXT PRIMARY KEY,
    file_key            TEXT NOT NULL REFERENCES evacuation_files(file_key),
    jurisdiction        TEXT,
    reviewed_by_id      TEXT REFERENCES team_members(team_member_id),
    needs               TEXT NOT NULL,   -- JSON-encoded Needs
    insurance           TEXT NOT NULL,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS household_members (
    member_id             TEXT PRIMARY KEY,
    registrant_id         TEXT REFERENCES registrants(registrant_id),
    first_name            TEXT NOT NULL,
    last_name             TEXT NOT NULL,
    date_of_birth         TEXT,
    gender                TEXT,
    is_primary_registrant INTEGER NOT NULL DEFAULT 0,
    is_minor              INTEGER NOT NULL DEFAULT 0
);

-- One association table for every owner of a household member. `role`
-- discriminates the owner kind so file, needs-assessment and support links
-- over the same member row cannot drift apart structurally.
CREATE TABLE IF NOT EXISTS member_links (
    member_id TEXT NOT NULL REFERENCES household_members(member_id),
    role      TEXT NOT NULL,   -- 'file' | 'needs_assessment' | 'support'
    owner_id  TEXT NOT NULL,
    PRIMARY KEY (member_id, role, owner_id)
);

CREATE TABLE IF NOT EXISTS pets (
    pet_id   TEXT PRIMARY KEY,
    file_key TEXT NOT NULL REFERENCES evacuation_files(file_key),
    kind     TEXT NOT NULL,
    quantity INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notes (
    note_id     TEXT PRIMARY KEY,
    file_key    TEXT NOT NULL REFERENCES evacuation_files(file_key),
    content     TEXT NOT NULL,
    added_by_id TEXT REFERENCES team_members(team_member_id),
    is_hidden   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS supports (
    support_key         TEXT PRIMARY KEY,
    support_number      INTEGER NOT NULL UNIQUE,
    file_key            TEXT NOT NULL REFERENCES evacuation_files(file_key),
    needs_assessment_id TEXT NOT NULL REFERENCES needs_assessments(needs_assessment_id),
    category            TEXT NOT NULL,
    method              TEXT NOT NULL,
    status              TEXT NOT NULL,
    active              INTEGER NOT NULL DEFAULT 1,
    valid_from          TEXT NOT NULL,
    valid_to            TEXT NOT NULL,
    amount_cents        INTEGER,
    supplier_id         TEXT REFERENCES suppliers(supplier_id),
    payee_id            TEXT REFERENCES registrants(registrant_id),
    group_lodging_city  TEXT,
    issued_by_id        TEXT REFERENCES team_members(team_member_id),
    manual_referral_id  TEXT,
    void_reason         TEXT,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS support_flags (
    flag_id          TEXT PRIMARY KEY,
    support_key      TEXT NOT NULL REFERENCES supports(support_key),
    kind             TEXT NOT NULL,   -- SupportFlag discriminant
    duplicate_of_key TEXT REFERENCES supports(support_key),
    detail           TEXT NOT NULL,   -- JSON-encoded SupportFlag
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS queue_items (
    queue_item_id    TEXT PRIMARY KEY,
    queue_id         TEXT NOT NULL,
    object_type_code INTEGER NOT NULL,
    support_key      TEXT NOT NULL REFERENCES supports(support_key),
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS files_created_idx     ON evacuation_files(created_at);
CREATE INDEX IF NOT EXISTS assessments_file_idx  ON needs_assessments(file_key);
CREATE INDEX IF NOT EXISTS member_links_owner_idx ON member_links(role, owner_id);
CREATE INDEX IF NOT EXISTS members_registrant_idx ON household_members(registrant_id);
CREATE INDEX IF NOT EXISTS supports_file_idx     ON supports(file_key);
CREATE INDEX IF NOT EXISTS flags_support_idx     ON support_flags(support_key);
CREATE INDEX IF NOT EXISTS queue_support_idx     ON queue_items(support_key);

PRAGMA user_version = 1;
";
