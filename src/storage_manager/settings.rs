use serde::{Deserialize, Serialize};

use super::kv::KvStore;
use crate::error::AppError;
use crate::utils::now_iso;

pub const SETTINGS_KEY: &str = "settings";
pub const DEFAULT_FREE_CREDITS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
}

/// The single per-installation preference record. Persisted as one JSON
/// document under the namespaced `settings` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    pub theme: ThemePreference,
    pub ai_api_key: String,
    pub show_onboarding: bool,
    pub is_trial_version: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_credits: Option<u32>,
    pub last_updated_at: String,
}

impl StoredSettings {
    pub fn defaults() -> Self {
        Self {
            theme: ThemePreference::Dark,
            ai_api_key: String::new(),
            show_onboarding: true,
            is_trial_version: true,
            remaining_credits: Some(DEFAULT_FREE_CREDITS),
            last_updated_at: now_iso(),
        }
    }

    pub fn has_custom_ai_key(&self) -> bool {
        !self.ai_api_key.is_empty()
    }

    pub fn should_show_onboarding(&self) -> bool {
        self.show_onboarding
    }
}

/// Field-wise partial update. An absent field never overwrites the stored
/// value, so explicit empty strings and zero credits survive merges.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub theme: Option<ThemePreference>,
    pub ai_api_key: Option<String>,
    pub show_onboarding: Option<bool>,
    pub is_trial_version: Option<bool>,
    pub remaining_credits: Option<u32>,
}

/// Merge `updates` onto `current` (or defaults), trimming the API key and
/// refreshing `lastUpdatedAt`.
pub fn merge_settings(current: Option<&StoredSettings>, updates: &SettingsUpdate) -> StoredSettings {
    let base = current.cloned().unwrap_or_else(StoredSettings::defaults);
    StoredSettings {
        theme: updates.theme.unwrap_or(base.theme),
        ai_api_key: updates
            .ai_api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .unwrap_or(base.ai_api_key),
        show_onboarding: updates.show_onboarding.unwrap_or(base.show_onboarding),
        is_trial_version: updates.is_trial_version.unwrap_or(base.is_trial_version),
        remaining_credits: updates.remaining_credits.or(base.remaining_credits),
        last_updated_at: now_iso(),
    }
}

/// Read-through-defaults store for [`StoredSettings`]. Updates are
/// read-modify-write over the whole record; overlapping async updates are
/// last-write-wins, which is acceptable for a single-user local app.
#[derive(Clone)]
pub struct SettingsStore {
    kv: KvStore,
}

impl SettingsStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Current settings, or defaults when nothing is stored yet. Defaults
    /// are not persisted until the first update.
    pub async fn refresh(&self) -> Result<StoredSettings, AppError> {
        Ok(self
            .kv
            .get_item::<StoredSettings>(SETTINGS_KEY)
            .await?
            .unwrap_or_else(StoredSettings::defaults))
    }

    pub async fn update(&self, updates: SettingsUpdate) -> Result<StoredSettings, AppError> {
        let current = self.kv.get_item::<StoredSettings>(SETTINGS_KEY).await?;
        let merged = merge_settings(current.as_ref(), &updates);
        self.kv.set_item(SETTINGS_KEY, &merged).await?;
        Ok(merged)
    }

    /// Erase the persisted record and hand back fresh defaults.
    pub async fn clear(&self) -> Result<StoredSettings, AppError> {
        self.kv.remove_item(SETTINGS_KEY).await?;
        Ok(StoredSettings::defaults())
    }
}
