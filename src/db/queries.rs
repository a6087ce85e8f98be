use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::crypto::{self, SiteSecret};
use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    ACTIVATION_LOG_COLS, ASSIGNED_PLUGIN_COLS, DOMAIN_COLS, HISTORY_COLS, LICENSE_COLS,
    OWNER_COLS, PLUGIN_VERSION_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Licenses ============

/// Internal creation record; expirations and meta encryption are resolved by
/// the caller before this hits the store.
#[derive(Debug)]
pub struct NewLicense {
    pub owner_id: String,
    pub plan_type: PlanType,
    pub max_domains: i64,
    pub expires_at: Option<i64>,
    pub meta: Option<String>,
    pub created_ip: Option<String>,
}

/// Create a license with a freshly generated key. The raw key is returned on
/// the model exactly once; lookups afterwards go through the hash.
pub fn create_license(conn: &Connection, input: &NewLicense, secret: &SiteSecret) -> Result<License> {
    let id = gen_id();
    let now = now();
    let license_key = crypto::generate_license_key();
    let license_key_hash = crypto::hash_license_key(&license_key, secret);

    conn.execute(
        "INSERT INTO licenses (id, license_key, license_key_hash, owner_id, status, plan_type, max_domains, created_at, expires_at, created_ip, meta, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &id,
            &license_key,
            &license_key_hash,
            &input.owner_id,
            input.plan_type.as_ref(),
            input.max_domains,
            now,
            input.expires_at,
            &input.created_ip,
            &input.meta,
            now
        ],
    )?;

    log_history(
        conn,
        &id,
        HistoryChangeType::Created,
        None,
        Some(input.plan_type.as_ref()),
        None,
        None,
        input.created_ip.as_deref(),
    )?;

    Ok(License {
        id,
        license_key,
        license_key_hash,
        owner_id: input.owner_id.clone(),
        status: LicenseStatus::Active,
        plan_type: input.plan_type,
        max_domains: input.max_domains,
        created_at: now,
        expires_at: input.expires_at,
        suspended_at: None,
        suspension_reason: None,
        created_ip: input.created_ip.clone(),
        meta: input.meta.clone(),
        updated_at: now,
    })
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        &[&id],
    )
}

/// Look up a license by raw key. Keys failing format validation are rejected
/// without a store round-trip; valid ones are fetched by lookup hash so the
/// raw key is never compared against stored plaintext.
pub fn get_license_by_key(
    conn: &Connection,
    raw_key: &str,
    secret: &SiteSecret,
) -> Result<Option<License>> {
    if !crate::validation::is_valid_license_key(raw_key) {
        return Ok(None);
    }

    let hash = crypto::hash_license_key(raw_key, secret);
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE license_key_hash = ?1",
            LICENSE_COLS
        ),
        &[&hash],
    )
}

pub fn list_licenses_for_owner(conn: &Connection, owner_id: &str) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE owner_id = ?1 ORDER BY created_at DESC",
            LICENSE_COLS
        ),
        &[&owner_id],
    )
}

// ============ Plugin assignments ============

/// Assign a plugin to a license. Re-assigning a previously removed plugin
/// revives the existing row.
pub fn assign_plugin(
    conn: &Connection,
    license_id: &str,
    plugin_slug: &str,
) -> Result<AssignedPlugin> {
    let now = now();
    conn.execute(
        "INSERT INTO license_plugins (id, license_id, plugin_slug, assigned_at, removed_at)
         VALUES (?1, ?2, ?3, ?4, NULL)
         ON CONFLICT (license_id, plugin_slug)
         DO UPDATE SET removed_at = NULL, assigned_at = excluded.assigned_at",
        params![gen_id(), license_id, plugin_slug, now],
    )?;

    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_plugins WHERE license_id = ?1 AND plugin_slug = ?2",
            ASSIGNED_PLUGIN_COLS
        ),
        &[&license_id, &plugin_slug],
    )?
    .ok_or_else(|| AppError::Internal("Assignment row missing after upsert".into()))
}

/// Soft-remove a plugin assignment. Returns false when the plugin was not
/// currently assigned.
pub fn remove_plugin(conn: &Connection, license_id: &str, plugin_slug: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE license_plugins SET removed_at = ?1
         WHERE license_id = ?2 AND plugin_slug = ?3 AND removed_at IS NULL",
        params![now(), license_id, plugin_slug],
    )?;
    Ok(affected > 0)
}

/// Slugs currently assigned (removed_at null).
pub fn plugins_for_license(conn: &Connection, license_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT plugin_slug FROM license_plugins
         WHERE license_id = ?1 AND removed_at IS NULL
         ORDER BY assigned_at",
    )?;
    let slugs = stmt
        .query_map([license_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(slugs)
}

pub fn is_plugin_assigned(conn: &Connection, license_id: &str, plugin_slug: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM license_plugins
         WHERE license_id = ?1 AND plugin_slug = ?2 AND removed_at IS NULL",
        params![license_id, plugin_slug],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ============ Activated domains ============

/// Result of a domain activation attempt.
#[derive(Debug)]
pub struct ActivationGrant {
    pub domain: ActivatedDomain,
    /// False when an existing active row was refreshed (idempotent retry)
    pub created: bool,
    /// Seats left in the license-wide pool after this activation
    pub domains_remaining: i64,
}

/// Atomically activate a domain for a license, enforcing the seat limit.
///
/// Runs inside an IMMEDIATE transaction (write lock at BEGIN) so that two
/// concurrent activations cannot both read "one seat free" and both insert.
/// License validity and plugin assignment are re-checked inside the same
/// transaction; a suspend or unassign that commits first wins the race.
///
/// Re-activating an already-active (plugin, domain) pair refreshes the
/// existing row, reissues its activation token, and consumes no seat.
pub fn activate_domain_atomic(
    conn: &mut Connection,
    license_id: &str,
    plugin_slug: &str,
    domain: &str,
    ip_address: Option<&str>,
) -> Result<ActivationGrant> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let license: License = query_one(
        &tx,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        &[&license_id],
    )?
    .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let now = now();
    if !license.is_valid_at(now) {
        return Err(AppError::LicenseInvalid);
    }

    let assigned: i64 = tx.query_row(
        "SELECT COUNT(*) FROM license_plugins
         WHERE license_id = ?1 AND plugin_slug = ?2 AND removed_at IS NULL",
        params![license_id, plugin_slug],
        |row| row.get(0),
    )?;
    if assigned == 0 {
        return Err(AppError::PluginNotAssigned);
    }

    let active_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM activated_domains
         WHERE license_id = ?1 AND deactivated_at IS NULL",
        params![license_id],
        |row| row.get(0),
    )?;

    let existing: Option<ActivatedDomain> = query_one(
        &tx,
        &format!(
            "SELECT {} FROM activated_domains
             WHERE license_id = ?1 AND plugin_slug = ?2 AND domain = ?3 AND deactivated_at IS NULL",
            DOMAIN_COLS
        ),
        &[&license_id, &plugin_slug, &domain],
    )?;

    if let Some(row) = existing {
        // Idempotent re-activation: refresh check-in, reissue the token,
        // keep the install UUID, consume no seat
        let activation_token = crypto::generate_activation_token();
        tx.execute(
            "UPDATE activated_domains SET last_check_in = ?1, activation_token = ?2 WHERE id = ?3",
            params![now, &activation_token, &row.id],
        )?;
        tx.commit()?;

        return Ok(ActivationGrant {
            domain: ActivatedDomain {
                last_check_in: Some(now),
                activation_token,
                ..row
            },
            created: false,
            domains_remaining: license.max_domains - active_count,
        });
    }

    if active_count >= license.max_domains {
        // Dropping the transaction releases the lock; nothing was inserted
        return Err(AppError::SeatLimitReached {
            active: active_count,
            max: license.max_domains,
        });
    }

    let id = gen_id();
    let activation_token = crypto::generate_activation_token();
    let install_uuid = crypto::generate_install_uuid();

    tx.execute(
        "INSERT INTO activated_domains (id, license_id, plugin_slug, domain, ip_address, activated_at, last_check_in, deactivated_at, activation_token, install_uuid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)",
        params![
            &id,
            license_id,
            plugin_slug,
            domain,
            ip_address,
            now,
            now,
            &activation_token,
            &install_uuid
        ],
    )?;

    tx.commit()?;

    Ok(ActivationGrant {
        domain: ActivatedDomain {
            id,
            license_id: license_id.to_string(),
            plugin_slug: plugin_slug.to_string(),
            domain: domain.to_string(),
            ip_address: ip_address.map(String::from),
            activated_at: now,
            last_check_in: Some(now),
            deactivated_at: None,
            activation_token,
            install_uuid,
        },
        created: true,
        domains_remaining: license.max_domains - active_count - 1,
    })
}

/// Soft-deactivate the matching active row, freeing one seat. Returns false
/// when nothing matched (a no-op, not an error).
pub fn deactivate_domain(
    conn: &Connection,
    license_id: &str,
    plugin_slug: &str,
    domain: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE activated_domains SET deactivated_at = ?1
         WHERE license_id = ?2 AND plugin_slug = ?3 AND domain = ?4 AND deactivated_at IS NULL",
        params![now(), license_id, plugin_slug, domain],
    )?;
    Ok(affected > 0)
}

pub fn list_active_domains(conn: &Connection, license_id: &str) -> Result<Vec<ActivatedDomain>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activated_domains
             WHERE license_id = ?1 AND deactivated_at IS NULL
             ORDER BY activated_at",
            DOMAIN_COLS
        ),
        &[&license_id],
    )
}

pub fn count_active_domains(conn: &Connection, license_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM activated_domains WHERE license_id = ?1 AND deactivated_at IS NULL",
        params![license_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Stamp last_check_in on the matching active row. Verification calls this
/// so stale installs can be told apart from live ones.
pub fn touch_check_in(
    conn: &Connection,
    license_id: &str,
    plugin_slug: &str,
    domain: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE activated_domains SET last_check_in = ?1
         WHERE license_id = ?2 AND plugin_slug = ?3 AND domain = ?4 AND deactivated_at IS NULL",
        params![now(), license_id, plugin_slug, domain],
    )?;
    Ok(affected > 0)
}

pub fn get_domain_by_token(conn: &Connection, token: &str) -> Result<Option<ActivatedDomain>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM activated_domains WHERE activation_token = ?1 AND deactivated_at IS NULL",
            DOMAIN_COLS
        ),
        &[&token],
    )
}

/// Active rows that have not checked in since `cutoff` (falling back to the
/// activation time for installs that never checked in).
pub fn list_stale_activations(conn: &Connection, cutoff: i64) -> Result<Vec<ActivatedDomain>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activated_domains
             WHERE deactivated_at IS NULL AND COALESCE(last_check_in, activated_at) < ?1
             ORDER BY COALESCE(last_check_in, activated_at)",
            DOMAIN_COLS
        ),
        &[&cutoff],
    )
}

// ============ Lifecycle transitions ============

/// Renew: the single recovery path. Reactivates suspended, expired, and
/// cancelled licenses, clears suspension fields, and pushes expiry out by
/// `days` from the renewal instant. Returns the new expiry.
pub fn renew_license(
    conn: &Connection,
    license_id: &str,
    days: i64,
    changed_by: Option<&str>,
    ip_address: Option<&str>,
) -> Result<i64> {
    let license = get_license_by_id(conn, license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let now = now();
    let new_expiry = crate::util::timestamp_after_days(now, days);

    conn.execute(
        "UPDATE licenses SET status = 'active', expires_at = ?1, suspended_at = NULL, suspension_reason = NULL, updated_at = ?2
         WHERE id = ?3",
        params![new_expiry, now, license_id],
    )?;

    log_history(
        conn,
        license_id,
        HistoryChangeType::Renewed,
        license.expires_at.map(|v| v.to_string()).as_deref(),
        Some(&new_expiry.to_string()),
        Some("License renewed"),
        changed_by,
        ip_address,
    )?;

    Ok(new_expiry)
}

/// Suspend blocks new verification success; existing installs keep running
/// until their next check-in, so active domains are left untouched.
pub fn suspend_license(
    conn: &Connection,
    license_id: &str,
    reason: &str,
    changed_by: Option<&str>,
    ip_address: Option<&str>,
) -> Result<bool> {
    let license = get_license_by_id(conn, license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let now = now();
    let affected = conn.execute(
        "UPDATE licenses SET status = 'suspended', suspended_at = ?1, suspension_reason = ?2, updated_at = ?3
         WHERE id = ?4",
        params![now, reason, now, license_id],
    )?;

    if affected > 0 {
        log_history(
            conn,
            license_id,
            HistoryChangeType::Suspended,
            Some(license.status.as_ref()),
            Some("suspended"),
            Some(reason),
            changed_by,
            ip_address,
        )?;
    }

    Ok(affected > 0)
}

/// Cancellation is a status transition, not removal; the record and its
/// audit trail stay. Recoverable only through renew.
pub fn cancel_license(
    conn: &Connection,
    license_id: &str,
    reason: Option<&str>,
    changed_by: Option<&str>,
    ip_address: Option<&str>,
) -> Result<bool> {
    let license = get_license_by_id(conn, license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let affected = conn.execute(
        "UPDATE licenses SET status = 'cancelled', updated_at = ?1 WHERE id = ?2",
        params![now(), license_id],
    )?;

    if affected > 0 {
        log_history(
            conn,
            license_id,
            HistoryChangeType::Cancelled,
            Some(license.status.as_ref()),
            Some("cancelled"),
            reason,
            changed_by,
            ip_address,
        )?;
    }

    Ok(affected > 0)
}

/// Advisory sweep: flip past-expiry active licenses to `expired` for
/// reporting. Validity is always computed live, so correctness never depends
/// on this having run.
pub fn mark_expired_licenses(conn: &Connection) -> Result<usize> {
    let now = now();

    let expired_ids: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM licenses
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < ?1",
        )?;
        stmt.query_map([now], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for id in &expired_ids {
        conn.execute(
            "UPDATE licenses SET status = 'expired', updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        log_history(
            conn,
            id,
            HistoryChangeType::Expired,
            Some("active"),
            Some("expired"),
            Some("Expiry sweep"),
            None,
            None,
        )?;
    }

    Ok(expired_ids.len())
}

// ============ Activation log ============

#[allow(clippy::too_many_arguments)]
pub fn log_activation(
    conn: &Connection,
    license_id: &str,
    plugin_slug: &str,
    domain: &str,
    action: ActivationAction,
    status: ActivationOutcome,
    reason: Option<&str>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO activation_logs (id, license_id, plugin_slug, domain, action, status, reason, ip_address, user_agent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            gen_id(),
            license_id,
            plugin_slug,
            domain,
            action.as_ref(),
            status.as_ref(),
            reason,
            ip_address,
            user_agent,
            now()
        ],
    )?;
    Ok(())
}

pub fn list_activation_logs_paginated(
    conn: &Connection,
    license_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ActivationLogEntry>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM activation_logs WHERE license_id = ?1",
        params![license_id],
        |row| row.get(0),
    )?;

    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM activation_logs WHERE license_id = ?1
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            ACTIVATION_LOG_COLS
        ),
        params![license_id, limit, offset],
    )?;

    Ok((items, total))
}

// ============ License history ============

#[allow(clippy::too_many_arguments)]
pub fn log_history(
    conn: &Connection,
    license_id: &str,
    change_type: HistoryChangeType,
    old_value: Option<&str>,
    new_value: Option<&str>,
    reason: Option<&str>,
    changed_by: Option<&str>,
    ip_address: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO license_history (id, license_id, change_type, old_value, new_value, reason, changed_by, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            gen_id(),
            license_id,
            change_type.as_ref(),
            old_value,
            new_value,
            reason,
            changed_by,
            ip_address,
            now()
        ],
    )?;
    Ok(())
}

pub fn list_history(conn: &Connection, license_id: &str) -> Result<Vec<LicenseHistoryEntry>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_history WHERE license_id = ?1 ORDER BY created_at DESC",
            HISTORY_COLS
        ),
        &[&license_id],
    )
}

// ============ Plugin versions ============

pub fn create_plugin_version(
    conn: &Connection,
    input: &CreatePluginVersion,
) -> Result<PluginVersion> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO plugin_versions (id, plugin_slug, version, download_url, changelog, requires_php, requires_wp, tested_up_to, file_hash, file_size, released_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &id,
            &input.plugin_slug,
            &input.version,
            &input.download_url,
            &input.changelog,
            &input.requires_php,
            &input.requires_wp,
            &input.tested_up_to,
            &input.file_hash,
            input.file_size,
            now
        ],
    )?;

    Ok(PluginVersion {
        id,
        plugin_slug: input.plugin_slug.clone(),
        version: input.version.clone(),
        download_url: input.download_url.clone(),
        changelog: input.changelog.clone(),
        requires_php: input.requires_php.clone(),
        requires_wp: input.requires_wp.clone(),
        tested_up_to: input.tested_up_to.clone(),
        file_hash: input.file_hash.clone(),
        file_size: input.file_size,
        released_at: now,
    })
}

pub fn get_latest_version(conn: &Connection, plugin_slug: &str) -> Result<Option<PluginVersion>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM plugin_versions WHERE plugin_slug = ?1
             ORDER BY released_at DESC LIMIT 1",
            PLUGIN_VERSION_COLS
        ),
        &[&plugin_slug],
    )
}

pub fn get_version(
    conn: &Connection,
    plugin_slug: &str,
    version: &str,
) -> Result<Option<PluginVersion>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM plugin_versions WHERE plugin_slug = ?1 AND version = ?2",
            PLUGIN_VERSION_COLS
        ),
        &[&plugin_slug, &version],
    )
}

pub fn list_versions(conn: &Connection, plugin_slug: &str) -> Result<Vec<PluginVersion>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM plugin_versions WHERE plugin_slug = ?1 ORDER BY released_at DESC",
            PLUGIN_VERSION_COLS
        ),
        &[&plugin_slug],
    )
}

// ============ Owners ============

/// Create an owner and return the raw API token alongside. The token is
/// shown once; only its hash is stored.
pub fn create_owner(conn: &Connection, name: &str) -> Result<(Owner, String)> {
    let id = gen_id();
    let now = now();
    let token = crypto::generate_api_token();
    let token_hash = crypto::hash_secret(&token);

    conn.execute(
        "INSERT INTO owners (id, name, api_token_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&id, name, &token_hash, now],
    )?;

    Ok((
        Owner {
            id,
            name: name.to_string(),
            created_at: now,
        },
        token,
    ))
}

pub fn get_owner_by_token(conn: &Connection, token: &str) -> Result<Option<Owner>> {
    let token_hash = crypto::hash_secret(token);
    query_one(
        conn,
        &format!(
            "SELECT {} FROM owners WHERE api_token_hash = ?1",
            OWNER_COLS
        ),
        &[&token_hash],
    )
}
