use serde::{Deserialize, Serialize};

/// Many-to-many join between licenses and plugins. A plugin counts as
/// assigned only while `removed_at` is null.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedPlugin {
    pub id: String,
    pub license_id: String,
    pub plugin_slug: String,
    pub assigned_at: i64,
    pub removed_at: Option<i64>,
}

/// Published version metadata for the update-check/download read model.
#[derive(Debug, Clone, Serialize)]
pub struct PluginVersion {
    pub id: String,
    pub plugin_slug: String,
    pub version: String,
    pub download_url: String,
    pub changelog: Option<String>,
    pub requires_php: Option<String>,
    pub requires_wp: Option<String>,
    pub tested_up_to: Option<String>,
    pub file_hash: Option<String>,
    pub file_size: Option<i64>,
    pub released_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePluginVersion {
    pub plugin_slug: String,
    pub version: String,
    pub download_url: String,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub requires_php: Option<String>,
    #[serde(default)]
    pub requires_wp: Option<String>,
    #[serde(default)]
    pub tested_up_to: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}
