use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::audit::{AuditAppend, AuditLog, AuditMetadata};
use crate::database::{GovernanceStore, Write, WriteBatch};
use crate::error::GovernanceResult;
use crate::model::settings::{
    validate_expiry_days, validate_ml_sensitivity, EXPIRY_DAYS_KEY, ML_SENSITIVITY_KEY,
};
use crate::model::{Caller, SystemSettings};

/// Tunable thresholds stored as system config rows.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn GovernanceStore>,
    audit: AuditLog,
    default_expiry_days: u32,
}

impl SettingsService {
    pub fn new(store: Arc<dyn GovernanceStore>, audit: AuditLog, default_expiry_days: u32) -> Self {
        Self {
            store,
            audit,
            default_expiry_days,
        }
    }

    pub async fn current(&self) -> GovernanceResult<SystemSettings> {
        let expiry_days = self.store.get_config(EXPIRY_DAYS_KEY).await?;
        let ml_sensitivity = self.store.get_config(ML_SENSITIVITY_KEY).await?;
        Ok(SystemSettings::from_stored(
            expiry_days.as_ref(),
            ml_sensitivity.as_ref(),
            self.default_expiry_days,
        ))
    }

    pub async fn expiry_days(&self) -> GovernanceResult<u32> {
        Ok(self.current().await?.expiry_days)
    }

    /// Decay config update.
    pub async fn update_expiry_days(
        &self,
        caller: &Caller,
        days: i64,
    ) -> GovernanceResult<SystemSettings> {
        caller.require_admin()?;
        let days = validate_expiry_days(days)?;
        self.write(caller, EXPIRY_DAYS_KEY, json!(days)).await?;
        self.current().await
    }

    pub async fn update_ml_sensitivity(
        &self,
        caller: &Caller,
        value: f64,
    ) -> GovernanceResult<SystemSettings> {
        caller.require_admin()?;
        let value = validate_ml_sensitivity(value)?;
        self.write(caller, ML_SENSITIVITY_KEY, json!(value)).await?;
        self.current().await
    }

    async fn write(&self, caller: &Caller, key: &str, value: Value) -> GovernanceResult<()> {
        let previous_value = self.store.get_config(key).await?;
        let batch = WriteBatch::new()
            .write(Write::UpsertConfig {
                key: key.to_string(),
                value: value.clone(),
            })
            .audit(
                AuditAppend::new(AuditMetadata::ConfigChange {
                    key: key.to_string(),
                    previous_value,
                    new_value: value.clone(),
                })
                .by(caller.user_id.clone())
                .on(key),
            );

        let receipt = self.store.commit(batch).await?;
        self.audit.emit(&receipt.audit);
        info!(key = %key, value = %value, actor_id = %caller.user_id, "Updated system setting");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, AuditQuery, MAX_AUDIT_LIMIT};
    use crate::database::InMemoryStore;
    use crate::error::GovernanceError;
    use crate::model::Role;

    fn service() -> (Arc<InMemoryStore>, SettingsService) {
        let store = Arc::new(InMemoryStore::new());
        let dyn_store: Arc<dyn GovernanceStore> = store.clone();
        let audit = AuditLog::new(dyn_store.clone(), MAX_AUDIT_LIMIT);
        (store, SettingsService::new(dyn_store, audit, 30))
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_stored() {
        let (_, settings) = service();
        let current = settings.current().await.unwrap();
        assert_eq!(current.expiry_days, 30);
        assert_eq!(current.ml_sensitivity, 0.85);
    }

    #[tokio::test]
    async fn test_update_expiry_days_audits_previous_value() {
        let (store, settings) = service();
        let admin = Caller::new("admin", Role::SuperAdmin);

        settings.update_expiry_days(&admin, 14).await.unwrap();
        let updated = settings.update_expiry_days(&admin, 45).await.unwrap();
        assert_eq!(updated.expiry_days, 45);

        let entries = store
            .query_audit(&AuditQuery::for_action(AuditAction::ConfigChange, 10), 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        match &entries[0].metadata {
            AuditMetadata::ConfigChange {
                previous_value,
                new_value,
                ..
            } => {
                assert_eq!(previous_value, &Some(json!(14)));
                assert_eq!(new_value, &json!(45));
            }
            other => panic!("unexpected metadata {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_and_non_admin() {
        let (store, settings) = service();
        let admin = Caller::new("admin", Role::Admin);

        assert!(matches!(
            settings.update_expiry_days(&admin, 0).await.unwrap_err(),
            GovernanceError::Validation(_)
        ));
        assert!(matches!(
            settings.update_ml_sensitivity(&admin, 1.5).await.unwrap_err(),
            GovernanceError::Validation(_)
        ));
        assert!(matches!(
            settings
                .update_ml_sensitivity(&Caller::new("csa", Role::Csa), 0.5)
                .await
                .unwrap_err(),
            GovernanceError::Forbidden(_)
        ));
        assert_eq!(store.audit_len().await, 0);
    }
}
