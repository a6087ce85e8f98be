//! SQLite schema. Timestamps are Unix seconds; ids are UUIDv4 strings.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS licenses (
    id                  TEXT PRIMARY KEY,
    license_key         TEXT NOT NULL UNIQUE,
    license_key_hash    TEXT NOT NULL UNIQUE,
    owner_id            TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'active',
    plan_type           TEXT NOT NULL DEFAULT 'single',
    max_domains         INTEGER NOT NULL DEFAULT 1,
    created_at          INTEGER NOT NULL,
    expires_at          INTEGER,
    suspended_at        INTEGER,
    suspension_reason   TEXT,
    created_ip          TEXT,
    meta                TEXT,
    updated_at          INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_licenses_owner ON licenses(owner_id);
CREATE INDEX IF NOT EXISTS idx_licenses_status ON licenses(status);
CREATE INDEX IF NOT EXISTS idx_licenses_expires ON licenses(expires_at);

CREATE TABLE IF NOT EXISTS license_plugins (
    id          TEXT PRIMARY KEY,
    license_id  TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
    plugin_slug TEXT NOT NULL,
    assigned_at INTEGER NOT NULL,
    removed_at  INTEGER,
    UNIQUE (license_id, plugin_slug)
);
CREATE INDEX IF NOT EXISTS idx_license_plugins_slug ON license_plugins(plugin_slug);

CREATE TABLE IF NOT EXISTS activated_domains (
    id               TEXT PRIMARY KEY,
    license_id       TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
    plugin_slug      TEXT NOT NULL,
    domain           TEXT NOT NULL,
    ip_address       TEXT,
    activated_at     INTEGER NOT NULL,
    last_check_in    INTEGER,
    deactivated_at   INTEGER,
    activation_token TEXT NOT NULL,
    install_uuid     TEXT NOT NULL
);
-- Uniqueness holds only while active; deactivated rows stay for audit
CREATE UNIQUE INDEX IF NOT EXISTS idx_active_domain
    ON activated_domains(license_id, plugin_slug, domain)
    WHERE deactivated_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_activated_domains_license ON activated_domains(license_id);
CREATE INDEX IF NOT EXISTS idx_activated_domains_check_in ON activated_domains(last_check_in);

CREATE TABLE IF NOT EXISTS plugin_versions (
    id           TEXT PRIMARY KEY,
    plugin_slug  TEXT NOT NULL,
    version      TEXT NOT NULL,
    download_url TEXT NOT NULL,
    changelog    TEXT,
    requires_php TEXT,
    requires_wp  TEXT,
    tested_up_to TEXT,
    file_hash    TEXT,
    file_size    INTEGER,
    released_at  INTEGER NOT NULL,
    UNIQUE (plugin_slug, version)
);
CREATE INDEX IF NOT EXISTS idx_plugin_versions_slug ON plugin_versions(plugin_slug);

CREATE TABLE IF NOT EXISTS activation_logs (
    id          TEXT PRIMARY KEY,
    license_id  TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
    plugin_slug TEXT NOT NULL,
    domain      TEXT NOT NULL,
    action      TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'success',
    reason      TEXT,
    ip_address  TEXT,
    user_agent  TEXT,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activation_logs_license ON activation_logs(license_id);
CREATE INDEX IF NOT EXISTS idx_activation_logs_created ON activation_logs(created_at);

CREATE TABLE IF NOT EXISTS license_history (
    id          TEXT PRIMARY KEY,
    license_id  TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
    change_type TEXT NOT NULL,
    old_value   TEXT,
    new_value   TEXT,
    reason      TEXT,
    changed_by  TEXT,
    ip_address  TEXT,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_license_history_license ON license_history(license_id);

CREATE TABLE IF NOT EXISTS owners (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    api_token_hash TEXT NOT NULL UNIQUE,
    created_at     INTEGER NOT NULL
);
";

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
