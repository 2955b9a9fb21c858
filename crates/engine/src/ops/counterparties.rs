use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuditAction, Counterparty, CounterpartyAlias, CounterpartyKind, EngineError, ResultEngine,
    aliases, counterparties,
    util::{normalize_match_key, normalize_optional_text, normalize_required_name},
};

use super::{Engine, audit::NONE, with_tx};

impl Engine {
    /// Register a trading partner.
    ///
    /// The display name must be unique on its normalized form so it can
    /// participate in bank line matching without ambiguity.
    pub async fn create_counterparty(
        &self,
        name: &str,
        code: Option<&str>,
        kind: CounterpartyKind,
        branch: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<Counterparty> {
        let name = normalize_required_name(name, "counterparty name")?;
        let name_norm = normalize_match_key(&name);

        with_tx!(self, |db_tx| {
            let existing = counterparties::Entity::find()
                .filter(counterparties::Column::NameNorm.eq(name_norm.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(name));
            }

            let cp = Counterparty {
                id: Uuid::new_v4(),
                name,
                code: normalize_optional_text(code),
                kind,
                branch: normalize_optional_text(branch),
                active: true,
            };
            counterparties::ActiveModel::from(&cp).insert(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::CounterpartyCreate,
                "counterparty",
                &cp.id.to_string(),
                NONE,
                Some(&cp),
            )
            .await?;
            debug!(counterparty_id = %cp.id, name = %cp.name, "counterparty created");
            Ok(cp)
        })
    }

    pub async fn counterparty(&self, counterparty_id: Uuid) -> ResultEngine<Counterparty> {
        let model = counterparties::Entity::find_by_id(counterparty_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("counterparty not exists".to_string()))?;
        Counterparty::try_from(model)
    }

    pub async fn list_counterparties(&self, include_inactive: bool) -> ResultEngine<Vec<Counterparty>> {
        let mut query = counterparties::Entity::find().order_by_asc(counterparties::Column::Name);
        if !include_inactive {
            query = query.filter(counterparties::Column::Active.eq(true));
        }
        let models = query.all(&self.database).await?;
        models.into_iter().map(Counterparty::try_from).collect()
    }

    /// Deactivate a counterparty. Inactive counterparties keep their history
    /// but are excluded from bank line auto-matching.
    pub async fn deactivate_counterparty(
        &self,
        counterparty_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_counterparty(&db_tx, counterparty_id).await?;
            let before = Counterparty::try_from(model)?;
            let active = counterparties::ActiveModel {
                id: ActiveValue::Set(counterparty_id.to_string()),
                active: ActiveValue::Set(false),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let mut after = before.clone();
            after.active = false;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::CounterpartyDeactivate,
                "counterparty",
                &counterparty_id.to_string(),
                Some(&before),
                Some(&after),
            )
            .await?;
            Ok(())
        })
    }

    /// Attach a matching alias. The alias is globally unique on its
    /// normalized form, across all counterparties.
    pub async fn add_alias(
        &self,
        counterparty_id: Uuid,
        alias: &str,
        user_id: &str,
    ) -> ResultEngine<CounterpartyAlias> {
        let alias = normalize_required_name(alias, "alias")?;
        let alias_norm = normalize_match_key(&alias);

        with_tx!(self, |db_tx| {
            self.require_counterparty(&db_tx, counterparty_id).await?;

            let existing = aliases::Entity::find()
                .filter(aliases::Column::AliasNorm.eq(alias_norm.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(alias));
            }

            let record = CounterpartyAlias {
                id: Uuid::new_v4(),
                counterparty_id,
                alias,
            };
            aliases::ActiveModel::from(&record).insert(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::AliasAdd,
                "alias",
                &record.id.to_string(),
                NONE,
                Some(&record),
            )
            .await?;
            Ok(record)
        })
    }

    pub async fn list_aliases(&self, counterparty_id: Uuid) -> ResultEngine<Vec<CounterpartyAlias>> {
        let models = aliases::Entity::find()
            .filter(aliases::Column::CounterpartyId.eq(counterparty_id.to_string()))
            .order_by_asc(aliases::Column::Alias)
            .all(&self.database)
            .await?;
        models.into_iter().map(CounterpartyAlias::try_from).collect()
    }

    pub async fn remove_alias(&self, alias_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = aliases::Entity::find_by_id(alias_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("alias not exists".to_string()))?;
            let record = CounterpartyAlias::try_from(model.clone())?;
            model.delete(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::AliasRemove,
                "alias",
                &alias_id.to_string(),
                Some(&record),
                NONE,
            )
            .await?;
            Ok(())
        })
    }

    pub(super) async fn require_counterparty(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        counterparty_id: Uuid,
    ) -> ResultEngine<counterparties::Model> {
        counterparties::Entity::find_by_id(counterparty_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("counterparty not exists".to_string()))
    }
}
