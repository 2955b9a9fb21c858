//! Audit emission helper shared by every mutating operation.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseTransaction};
use serde::Serialize;
use uuid::Uuid;

use crate::{AuditAction, ResultEngine, audit};

use super::Engine;

impl Engine {
    /// Persist one audit row inside the caller's DB transaction.
    ///
    /// `before`/`after` are serialized snapshots of the target entity; pass
    /// `None::<()>` for creation (no before) or deletion (no after).
    pub(super) async fn record_audit<B: Serialize, A: Serialize>(
        &self,
        db_tx: &DatabaseTransaction,
        actor: &str,
        action: AuditAction,
        target_type: &str,
        target_id: &str,
        before: Option<&B>,
        after: Option<&A>,
    ) -> ResultEngine<()> {
        let record = audit::AuditRecord {
            id: Uuid::new_v4(),
            actor: actor.to_string(),
            action: action.as_str().to_string(),
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            before: before.and_then(|v| serde_json::to_string(v).ok()),
            after: after.and_then(|v| serde_json::to_string(v).ok()),
            created_at: Utc::now(),
        };
        audit::ActiveModel::from(&record).insert(db_tx).await?;
        Ok(())
    }
}

/// Marker for the absent side of an audit snapshot.
pub(super) const NONE: Option<&()> = None;
