use std::collections::BTreeSet;

use crate::error::AppError;
use crate::storage_manager::settings::{SettingsStore, SettingsUpdate, StoredSettings};

/// Entitlement that marks a verified paid subscription.
pub const PRO_ENTITLEMENT: &str = "Diotrix Pro";

/// External purchase/subscription SDK. The core only reads entitlement state
/// from it; purchase and restore flows pass straight through.
pub trait EntitlementProvider: Send + Sync {
    fn active_entitlements(&self) -> Result<BTreeSet<String>, AppError>;
    fn active_subscription_ids(&self) -> Result<BTreeSet<String>, AppError>;
    fn purchase(&self, package_id: &str) -> Result<(), AppError>;
    fn restore(&self) -> Result<(), AppError>;
}

/// Pro status: the "Diotrix Pro" entitlement, or any active entitlement or
/// subscription at all.
pub fn is_pro(entitlements: &BTreeSet<String>, subscription_ids: &BTreeSet<String>) -> bool {
    entitlements.contains(PRO_ENTITLEMENT)
        || !entitlements.is_empty()
        || !subscription_ids.is_empty()
}

/// Outcome of a generation authorization check. Denial is a normal outcome
/// that the caller answers with an upgrade prompt, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAccess {
    pub allowed: bool,
    pub api_key_override: Option<String>,
    pub consume_credit: bool,
}

impl GenerationAccess {
    fn denied() -> Self {
        Self {
            allowed: false,
            api_key_override: None,
            consume_credit: false,
        }
    }
}

/// Decide which generation path applies: paid entitlement (unlimited), a
/// user-supplied API key (unlimited via that key), or one free credit.
/// Pure function of its inputs; the credit itself is only consumed after a
/// successful generation.
pub fn resolve_generation_authorization(
    settings: &StoredSettings,
    is_pro: bool,
) -> GenerationAccess {
    if is_pro {
        return GenerationAccess {
            allowed: true,
            api_key_override: None,
            consume_credit: false,
        };
    }

    let custom_key = settings.ai_api_key.trim();
    if !custom_key.is_empty() {
        return GenerationAccess {
            allowed: true,
            api_key_override: Some(custom_key.to_string()),
            consume_credit: false,
        };
    }

    if settings.remaining_credits.unwrap_or(0) > 0 {
        return GenerationAccess {
            allowed: true,
            api_key_override: None,
            consume_credit: true,
        };
    }

    GenerationAccess::denied()
}

/// Ties the external entitlement provider and local settings together into
/// the per-attempt authorization decision and the post-success bookkeeping.
pub struct EntitlementTracker<P> {
    provider: P,
    settings: SettingsStore,
}

impl<P: EntitlementProvider> EntitlementTracker<P> {
    pub fn new(provider: P, settings: SettingsStore) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_pro(&self) -> Result<bool, AppError> {
        let entitlements = self.provider.active_entitlements()?;
        let subscriptions = self.provider.active_subscription_ids()?;
        Ok(is_pro(&entitlements, &subscriptions))
    }

    pub async fn authorize_generation(&self) -> Result<GenerationAccess, AppError> {
        let settings = self.settings.refresh().await?;
        let is_pro = self.is_pro()?;
        Ok(resolve_generation_authorization(&settings, is_pro))
    }

    /// Apply the credit decrement decided at authorization time. Called only
    /// after a successful generation, so a failed call never costs a credit.
    pub async fn commit_credit_use(&self, access: &GenerationAccess) -> Result<(), AppError> {
        if !access.consume_credit {
            return Ok(());
        }
        let current = self.settings.refresh().await?;
        let Some(remaining) = current.remaining_credits else {
            return Ok(());
        };
        let updated = self
            .settings
            .update(SettingsUpdate {
                remaining_credits: Some(remaining.saturating_sub(1)),
                ..Default::default()
            })
            .await?;
        tracing::debug!(
            remaining = ?updated.remaining_credits,
            "consumed one free generation credit"
        );
        Ok(())
    }

    /// Once a verified paid entitlement has been observed, the trial flag is
    /// permanently lowered.
    pub async fn reconcile_trial_flag(&self) -> Result<StoredSettings, AppError> {
        let settings = self.settings.refresh().await?;
        if settings.is_trial_version && self.is_pro()? {
            return self
                .settings
                .update(SettingsUpdate {
                    is_trial_version: Some(false),
                    ..Default::default()
                })
                .await;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(credits: Option<u32>, api_key: &str) -> StoredSettings {
        let mut settings = StoredSettings::defaults();
        settings.remaining_credits = credits;
        settings.ai_api_key = api_key.to_string();
        settings
    }

    #[test]
    fn pro_users_generate_without_credits_or_overrides() {
        let access = resolve_generation_authorization(&settings_with(Some(0), ""), true);
        assert!(access.allowed);
        assert_eq!(access.api_key_override, None);
        assert!(!access.consume_credit);
    }

    #[test]
    fn custom_key_bypasses_credits() {
        let access = resolve_generation_authorization(&settings_with(Some(0), "sk-123"), false);
        assert!(access.allowed);
        assert_eq!(access.api_key_override.as_deref(), Some("sk-123"));
        assert!(!access.consume_credit);
    }

    #[test]
    fn last_credit_is_spendable() {
        let access = resolve_generation_authorization(&settings_with(Some(1), ""), false);
        assert!(access.allowed);
        assert_eq!(access.api_key_override, None);
        assert!(access.consume_credit);
    }

    #[test]
    fn no_credits_and_no_key_is_denied() {
        let access = resolve_generation_authorization(&settings_with(Some(0), ""), false);
        assert!(!access.allowed);
        let access = resolve_generation_authorization(&settings_with(None, ""), false);
        assert!(!access.allowed);
    }

    #[test]
    fn whitespace_key_does_not_count() {
        let access = resolve_generation_authorization(&settings_with(Some(0), "   "), false);
        assert!(!access.allowed);
    }

    #[test]
    fn pro_derivation_accepts_any_entitlement_or_subscription() {
        let none = BTreeSet::new();
        let pro: BTreeSet<String> = [PRO_ENTITLEMENT.to_string()].into();
        let other: BTreeSet<String> = ["Some Bundle".to_string()].into();
        let subs: BTreeSet<String> = ["diotrix.pro.monthly".to_string()].into();

        assert!(is_pro(&pro, &none));
        assert!(is_pro(&other, &none));
        assert!(is_pro(&none, &subs));
        assert!(!is_pro(&none, &none));
    }
}
