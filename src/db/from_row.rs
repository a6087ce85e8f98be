//! Row-mapping helpers: column lists and generic query functions so every
//! SELECT names its columns exactly once.

use rusqlite::types::Type;
use rusqlite::{Connection, Row, ToSql};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Parse a TEXT column into a strum-backed enum, surfacing bad stored values
/// as a conversion error instead of a panic.
fn parse_text<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value: {raw}").into(),
        )
    })
}

pub const LICENSE_COLS: &str = "id, license_key, license_key_hash, owner_id, status, plan_type, \
     max_domains, created_at, expires_at, suspended_at, suspension_reason, created_ip, meta, updated_at";

impl FromRow for License {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            license_key: row.get(1)?,
            license_key_hash: row.get(2)?,
            owner_id: row.get(3)?,
            status: parse_text(row, 4)?,
            plan_type: parse_text(row, 5)?,
            max_domains: row.get(6)?,
            created_at: row.get(7)?,
            expires_at: row.get(8)?,
            suspended_at: row.get(9)?,
            suspension_reason: row.get(10)?,
            created_ip: row.get(11)?,
            meta: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

pub const DOMAIN_COLS: &str = "id, license_id, plugin_slug, domain, ip_address, activated_at, \
     last_check_in, deactivated_at, activation_token, install_uuid";

impl FromRow for ActivatedDomain {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            license_id: row.get(1)?,
            plugin_slug: row.get(2)?,
            domain: row.get(3)?,
            ip_address: row.get(4)?,
            activated_at: row.get(5)?,
            last_check_in: row.get(6)?,
            deactivated_at: row.get(7)?,
            activation_token: row.get(8)?,
            install_uuid: row.get(9)?,
        })
    }
}

pub const ASSIGNED_PLUGIN_COLS: &str = "id, license_id, plugin_slug, assigned_at, removed_at";

impl FromRow for AssignedPlugin {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            license_id: row.get(1)?,
            plugin_slug: row.get(2)?,
            assigned_at: row.get(3)?,
            removed_at: row.get(4)?,
        })
    }
}

pub const PLUGIN_VERSION_COLS: &str = "id, plugin_slug, version, download_url, changelog, \
     requires_php, requires_wp, tested_up_to, file_hash, file_size, released_at";

impl FromRow for PluginVersion {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            plugin_slug: row.get(1)?,
            version: row.get(2)?,
            download_url: row.get(3)?,
            changelog: row.get(4)?,
            requires_php: row.get(5)?,
            requires_wp: row.get(6)?,
            tested_up_to: row.get(7)?,
            file_hash: row.get(8)?,
            file_size: row.get(9)?,
            released_at: row.get(10)?,
        })
    }
}

pub const ACTIVATION_LOG_COLS: &str = "id, license_id, plugin_slug, domain, action, status, \
     reason, ip_address, user_agent, created_at";

impl FromRow for ActivationLogEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            license_id: row.get(1)?,
            plugin_slug: row.get(2)?,
            domain: row.get(3)?,
            action: parse_text(row, 4)?,
            status: parse_text(row, 5)?,
            reason: row.get(6)?,
            ip_address: row.get(7)?,
            user_agent: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

pub const HISTORY_COLS: &str = "id, license_id, change_type, old_value, new_value, reason, \
     changed_by, ip_address, created_at";

impl FromRow for LicenseHistoryEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            license_id: row.get(1)?,
            change_type: parse_text(row, 2)?,
            old_value: row.get(3)?,
            new_value: row.get(4)?,
            reason: row.get(5)?,
            changed_by: row.get(6)?,
            ip_address: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

pub const OWNER_COLS: &str = "id, name, created_at";

impl FromRow for Owner {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, |row| T::from_row(row))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
