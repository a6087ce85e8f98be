use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// One seat of the license's `max_domains` pool: a (plugin, domain) binding
/// that stays consumed until deactivated.
#[derive(Debug, Clone, Serialize)]
pub struct ActivatedDomain {
    pub id: String,
    pub license_id: String,
    pub plugin_slug: String,
    pub domain: String,
    pub ip_address: Option<String>,
    pub activated_at: i64,
    pub last_check_in: Option<i64>,
    pub deactivated_at: Option<i64>,
    /// Continuity token reissued on every (re-)activation. Informational:
    /// the server always re-derives validity from the license record.
    pub activation_token: String,
    pub install_uuid: String,
}

impl ActivatedDomain {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivationAction {
    Activate,
    Deactivate,
    CheckIn,
    UpdateCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivationOutcome {
    Success,
    Failed,
    Pending,
}

/// Append-only record of one client-facing action. Never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationLogEntry {
    pub id: String,
    pub license_id: String,
    pub plugin_slug: String,
    pub domain: String,
    pub action: ActivationAction,
    pub status: ActivationOutcome,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: i64,
}
