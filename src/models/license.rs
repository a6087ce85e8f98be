use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Inactive,
    Suspended,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanType {
    Single,
    Bundle,
    Lifetime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    /// Raw key, shown to the owner once at creation
    pub license_key: String,
    /// Lookup digest; the only column ever queried by key
    #[serde(skip_serializing)]
    pub license_key_hash: String,
    pub owner_id: String,
    pub status: LicenseStatus,
    pub plan_type: PlanType,
    pub max_domains: i64,
    pub created_at: i64,
    /// None = lifetime license
    pub expires_at: Option<i64>,
    pub suspended_at: Option<i64>,
    pub suspension_reason: Option<String>,
    pub created_ip: Option<String>,
    /// Encrypted auxiliary blob
    #[serde(skip_serializing)]
    pub meta: Option<String>,
    pub updated_at: i64,
}

impl License {
    /// Validity is computed on read: `status == active` AND not past expiry.
    /// A background sweep may flip `status` to `expired` for reporting, but
    /// this check never depends on the sweep having run.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.status == LicenseStatus::Active
            && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLicense {
    pub owner_id: String,
    #[serde(default = "default_plan_type")]
    pub plan_type: PlanType,
    /// License-wide seat pool, shared across all assigned plugins
    pub max_domains: Option<i64>,
    /// Days of validity; None falls back to the configured default,
    /// lifetime plans get no expiry
    pub validity_days: Option<i64>,
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Arbitrary metadata, stored encrypted
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

fn default_plan_type() -> PlanType {
    PlanType::Single
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryChangeType {
    Created,
    Suspended,
    Expired,
    Renewed,
    Cancelled,
}

/// Immutable record of a lifecycle transition, for audit. Never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseHistoryEntry {
    pub id: String,
    pub license_id: String,
    pub change_type: HistoryChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: Option<String>,
    pub changed_by: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}
