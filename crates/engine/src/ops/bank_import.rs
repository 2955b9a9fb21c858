use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    AuditAction, BankImportJob, BankImportLine, BankImportStatus, EngineError, LineStatus,
    ParsedRow, ResultEngine, TransactionKind, TransactionSource, aliases, bank_import_lines,
    bank_imports, counterparties, util::normalize_match_key,
};

use super::{Engine, audit::NONE, with_tx};

/// Confidence assigned to alias and exact-name matches, and to manual
/// overrides.
const CONFIDENCE_EXACT: i32 = 100;
/// Confidence assigned to substring-containment matches.
const CONFIDENCE_FUZZY: i32 = 70;

impl Engine {
    /// Register an uploaded statement file. The whole-file hash is the
    /// idempotency token: a second upload of the same bytes is rejected.
    pub async fn register_bank_import(
        &self,
        file_name: &str,
        file_hash: &str,
        user_id: &str,
    ) -> ResultEngine<BankImportJob> {
        if file_hash.trim().is_empty() {
            return Err(EngineError::InvalidName(
                "file_hash must not be empty".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let existing = bank_imports::Entity::find()
                .filter(bank_imports::Column::FileHash.eq(file_hash))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(format!("file hash {file_hash}")));
            }

            let job = BankImportJob {
                id: Uuid::new_v4(),
                file_name: file_name.to_string(),
                file_hash: file_hash.to_string(),
                status: BankImportStatus::Uploaded,
                total_lines: 0,
                matched_lines: 0,
                confirmed_lines: 0,
                error: None,
                created_by: user_id.to_string(),
                created_at: Utc::now(),
            };
            bank_imports::ActiveModel::from(&job).insert(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::BankImportUpload,
                "bank_import",
                &job.id.to_string(),
                NONE,
                Some(&job),
            )
            .await?;
            info!(job_id = %job.id, file_name, "bank import registered");
            Ok(job)
        })
    }

    /// Store the rows the external parser extracted from the file.
    ///
    /// Rows with no parseable date or a zero amount are dropped. Each kept
    /// row gets a content-hash `duplicate_key`; a row whose key collides
    /// with any other non-excluded line system-wide (including earlier rows
    /// of the same batch) is flagged `duplicate` instead of `unmatched`.
    ///
    /// Re-running ingestion on a pre-confirmation job replaces its previous
    /// lines, so a failed parse can be retried.
    pub async fn ingest_rows(
        &self,
        job_id: Uuid,
        rows: &[ParsedRow],
        user_id: &str,
    ) -> ResultEngine<BankImportJob> {
        with_tx!(self, |db_tx| {
            let job_model = self.require_job(&db_tx, job_id).await?;
            let mut job = BankImportJob::try_from(job_model)?;
            let before = job.clone();
            if job.status == BankImportStatus::Confirmed {
                return Err(EngineError::StateConflict(
                    "job already confirmed".to_string(),
                ));
            }

            bank_import_lines::Entity::delete_many()
                .filter(bank_import_lines::Column::JobId.eq(job_id.to_string()))
                .exec(&db_tx)
                .await?;

            let mut batch_keys: HashSet<String> = HashSet::new();
            let mut kept = 0;
            for row in rows {
                let Some(occurred_on) = row.date else {
                    debug!(job_id = %job_id, description = %row.description, "dropped undated row");
                    continue;
                };
                if row.amount_minor == 0 {
                    debug!(job_id = %job_id, description = %row.description, "dropped zero-amount row");
                    continue;
                }
                kept += 1;

                let key = bank_import_lines::duplicate_key(
                    occurred_on,
                    row.amount_minor,
                    &row.description,
                    row.reference.as_deref(),
                );
                let collides = batch_keys.contains(&key)
                    || bank_import_lines::Entity::find()
                        .filter(bank_import_lines::Column::DuplicateKey.eq(key.as_str()))
                        .filter(
                            bank_import_lines::Column::Status
                                .ne(LineStatus::Excluded.as_str()),
                        )
                        .count(&db_tx)
                        .await?
                        > 0;
                batch_keys.insert(key.clone());

                let line = BankImportLine {
                    id: Uuid::new_v4(),
                    job_id,
                    line_no: kept,
                    occurred_on,
                    description: row.description.clone(),
                    amount_minor: row.amount_minor,
                    balance_minor: row.balance_minor,
                    counterparty_name: row.counterparty_name.clone(),
                    bank_reference: row.reference.clone(),
                    duplicate_key: key,
                    status: if collides {
                        LineStatus::Duplicate
                    } else {
                        LineStatus::Unmatched
                    },
                    counterparty_id: None,
                    match_confidence: 0,
                    transaction_id: None,
                };
                bank_import_lines::ActiveModel::from(&line)
                    .insert(&db_tx)
                    .await?;
            }

            job.status = BankImportStatus::Parsed;
            job.total_lines = kept;
            job.matched_lines = 0;
            job.confirmed_lines = 0;
            job.error = None;
            bank_imports::ActiveModel::from(&job).update(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::BankImportIngest,
                "bank_import",
                &job_id.to_string(),
                Some(&before),
                Some(&job),
            )
            .await?;
            info!(job_id = %job_id, total = kept, dropped = rows.len() - kept as usize, "rows ingested");
            Ok(job)
        })
    }

    /// Record an external parsing failure against the job. The job can be
    /// retried by re-invoking ingestion once the upstream problem is fixed.
    pub async fn mark_import_failed(
        &self,
        job_id: Uuid,
        error: &str,
        user_id: &str,
    ) -> ResultEngine<BankImportJob> {
        with_tx!(self, |db_tx| {
            let model = self.require_job(&db_tx, job_id).await?;
            let mut job = BankImportJob::try_from(model)?;
            if job.status == BankImportStatus::Confirmed {
                return Err(EngineError::StateConflict(
                    "job already confirmed".to_string(),
                ));
            }
            let before = job.clone();
            job.status = BankImportStatus::Failed;
            job.error = Some(error.to_string());
            bank_imports::ActiveModel::from(&job).update(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::BankImportFail,
                "bank_import",
                &job_id.to_string(),
                Some(&before),
                Some(&job),
            )
            .await?;
            warn!(job_id = %job_id, error, "bank import failed");
            Ok(job)
        })
    }

    /// Resolve counterparties for every unmatched line that carries a raw
    /// name. Precedence: exact alias match, then exact counterparty name
    /// match (both 100), then substring containment (70). Inactive
    /// counterparties never match. Lines with no raw name, or no match,
    /// stay `unmatched` for manual review.
    pub async fn auto_match_import(&self, job_id: Uuid, user_id: &str) -> ResultEngine<BankImportJob> {
        with_tx!(self, |db_tx| {
            let model = self.require_job(&db_tx, job_id).await?;
            let mut job = BankImportJob::try_from(model)?;
            let before = job.clone();
            match job.status {
                BankImportStatus::Parsed | BankImportStatus::Reviewing => {}
                _ => {
                    return Err(EngineError::StateConflict(format!(
                        "job is {}, matching needs parsed rows",
                        job.status.as_str()
                    )));
                }
            }

            let (by_alias, by_name) = self.match_tables(&db_tx).await?;

            let line_models = bank_import_lines::Entity::find()
                .filter(bank_import_lines::Column::JobId.eq(job_id.to_string()))
                .filter(bank_import_lines::Column::Status.eq(LineStatus::Unmatched.as_str()))
                .order_by_asc(bank_import_lines::Column::LineNo)
                .all(&db_tx)
                .await?;
            for line_model in line_models {
                let Some(raw_name) = line_model.counterparty_name.as_deref() else {
                    continue;
                };
                let needle = normalize_match_key(raw_name);
                if needle.is_empty() {
                    continue;
                }

                let matched = by_alias
                    .get(&needle)
                    .or_else(|| by_name.get(&needle))
                    .map(|id| (id.clone(), CONFIDENCE_EXACT))
                    .or_else(|| {
                        by_name
                            .iter()
                            .filter(|(name_norm, _)| {
                                needle.contains(name_norm.as_str())
                                    || name_norm.contains(needle.as_str())
                            })
                            .min_by_key(|(name_norm, _)| name_norm.clone())
                            .map(|(_, id)| (id.clone(), CONFIDENCE_FUZZY))
                    });
                let Some((counterparty_id, confidence)) = matched else {
                    continue;
                };

                let active = bank_import_lines::ActiveModel {
                    id: ActiveValue::Set(line_model.id),
                    status: ActiveValue::Set(LineStatus::Matched.as_str().to_string()),
                    counterparty_id: ActiveValue::Set(Some(counterparty_id)),
                    match_confidence: ActiveValue::Set(confidence),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }

            job.status = BankImportStatus::Reviewing;
            job.matched_lines = self.count_lines(&db_tx, job_id, LineStatus::Matched).await?;
            bank_imports::ActiveModel::from(&job).update(&db_tx).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::BankImportAutoMatch,
                "bank_import",
                &job_id.to_string(),
                Some(&before),
                Some(&job),
            )
            .await?;
            info!(job_id = %job_id, matched = job.matched_lines, "auto-match finished");
            Ok(job)
        })
    }

    /// Manually pin a line to a counterparty, forcing `matched` at full
    /// confidence. Only unmatched or already-matched lines can be
    /// overridden; duplicates, excluded, and confirmed lines cannot.
    pub async fn match_line(
        &self,
        line_id: Uuid,
        counterparty_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<BankImportLine> {
        with_tx!(self, |db_tx| {
            let model = self.require_line(&db_tx, line_id).await?;
            let mut line = BankImportLine::try_from(model)?;
            match line.status {
                LineStatus::Unmatched | LineStatus::Matched => {}
                other => {
                    return Err(EngineError::StateConflict(format!(
                        "line is {}, cannot be matched",
                        other.as_str()
                    )));
                }
            }
            self.require_counterparty(&db_tx, counterparty_id).await?;

            let before = line.clone();
            line.status = LineStatus::Matched;
            line.counterparty_id = Some(counterparty_id);
            line.match_confidence = CONFIDENCE_EXACT;
            bank_import_lines::ActiveModel::from(&line)
                .update(&db_tx)
                .await?;
            self.refresh_job_counters(&db_tx, line.job_id).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::LineMatch,
                "bank_import_line",
                &line_id.to_string(),
                Some(&before),
                Some(&line),
            )
            .await?;
            debug!(line_id = %line_id, counterparty_id = %counterparty_id, "line manually matched");
            Ok(line)
        })
    }

    /// Take a line out of the import entirely. Excluded lines no longer
    /// participate in duplicate flagging and are skipped at confirmation.
    pub async fn exclude_line(&self, line_id: Uuid, user_id: &str) -> ResultEngine<BankImportLine> {
        with_tx!(self, |db_tx| {
            let model = self.require_line(&db_tx, line_id).await?;
            let mut line = BankImportLine::try_from(model)?;
            if line.status == LineStatus::Confirmed {
                return Err(EngineError::StateConflict(
                    "line already confirmed".to_string(),
                ));
            }
            let before = line.clone();
            line.status = LineStatus::Excluded;
            line.counterparty_id = None;
            line.match_confidence = 0;
            bank_import_lines::ActiveModel::from(&line)
                .update(&db_tx)
                .await?;
            self.refresh_job_counters(&db_tx, line.job_id).await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::LineExclude,
                "bank_import_line",
                &line_id.to_string(),
                Some(&before),
                Some(&line),
            )
            .await?;
            debug!(line_id = %line_id, "line excluded");
            Ok(line)
        })
    }

    /// Turn every matched line into a ledger transaction.
    ///
    /// The sign of the parsed amount decides the direction: positive rows
    /// become deposits, negative rows withdrawals, both with the absolute
    /// amount and the line's bank reference. A job confirms exactly once.
    pub async fn confirm_import(&self, job_id: Uuid, user_id: &str) -> ResultEngine<BankImportJob> {
        with_tx!(self, |db_tx| {
            let model = self.require_job(&db_tx, job_id).await?;
            let mut job = BankImportJob::try_from(model)?;
            match job.status {
                BankImportStatus::Parsed | BankImportStatus::Reviewing => {}
                BankImportStatus::Confirmed => {
                    return Err(EngineError::StateConflict(
                        "job already confirmed".to_string(),
                    ));
                }
                other => {
                    return Err(EngineError::StateConflict(format!(
                        "job is {}, cannot be confirmed",
                        other.as_str()
                    )));
                }
            }
            let before = job.clone();

            let line_models = bank_import_lines::Entity::find()
                .filter(bank_import_lines::Column::JobId.eq(job_id.to_string()))
                .filter(bank_import_lines::Column::Status.eq(LineStatus::Matched.as_str()))
                .order_by_asc(bank_import_lines::Column::LineNo)
                .all(&db_tx)
                .await?;

            let mut confirmed = 0;
            for line_model in line_models {
                let line = BankImportLine::try_from(line_model)?;
                let counterparty_id = line.counterparty_id.ok_or_else(|| {
                    EngineError::StateConflict(format!(
                        "line {} is matched but has no counterparty",
                        line.line_no
                    ))
                })?;
                let kind = if line.amount_minor > 0 {
                    TransactionKind::Deposit
                } else {
                    TransactionKind::Withdrawal
                };
                let transaction = self
                    .create_transaction_in(
                        &db_tx,
                        counterparty_id,
                        kind,
                        TransactionSource::BankImport,
                        line.occurred_on,
                        line.amount_minor.abs(),
                        line.bank_reference.as_deref(),
                        Some(&line.description),
                        user_id,
                    )
                    .await?;

                let active = bank_import_lines::ActiveModel {
                    id: ActiveValue::Set(line.id.to_string()),
                    status: ActiveValue::Set(LineStatus::Confirmed.as_str().to_string()),
                    transaction_id: ActiveValue::Set(Some(transaction.id.to_string())),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
                confirmed += 1;
            }

            job.status = BankImportStatus::Confirmed;
            job.matched_lines = 0;
            job.confirmed_lines = confirmed;
            bank_imports::ActiveModel::from(&job).update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::BankImportConfirm,
                "bank_import",
                &job_id.to_string(),
                Some(&before),
                Some(&job),
            )
            .await?;
            info!(job_id = %job_id, confirmed, "bank import confirmed");
            Ok(job)
        })
    }

    /// Delete a job and its lines. Only legal before confirmation; a
    /// confirmed job's transactions are already in the ledger and must be
    /// reversed there instead.
    pub async fn delete_bank_import(&self, job_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_job(&db_tx, job_id).await?;
            let job = BankImportJob::try_from(model)?;
            if job.status == BankImportStatus::Confirmed {
                return Err(EngineError::StateConflict(
                    "job already confirmed".to_string(),
                ));
            }
            bank_import_lines::Entity::delete_many()
                .filter(bank_import_lines::Column::JobId.eq(job_id.to_string()))
                .exec(&db_tx)
                .await?;
            bank_imports::Entity::delete_by_id(job_id.to_string())
                .exec(&db_tx)
                .await?;
            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::BankImportDelete,
                "bank_import",
                &job_id.to_string(),
                Some(&job),
                NONE,
            )
            .await?;
            info!(job_id = %job_id, "bank import deleted");
            Ok(())
        })
    }

    pub async fn bank_import(&self, job_id: Uuid) -> ResultEngine<BankImportJob> {
        let model = bank_imports::Entity::find_by_id(job_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bank import job not exists".to_string()))?;
        BankImportJob::try_from(model)
    }

    pub async fn list_bank_imports(&self) -> ResultEngine<Vec<BankImportJob>> {
        let models = bank_imports::Entity::find()
            .order_by_desc(bank_imports::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(BankImportJob::try_from).collect()
    }

    pub async fn bank_import_lines(
        &self,
        job_id: Uuid,
        status: Option<LineStatus>,
    ) -> ResultEngine<Vec<BankImportLine>> {
        let mut query = bank_import_lines::Entity::find()
            .filter(bank_import_lines::Column::JobId.eq(job_id.to_string()))
            .order_by_asc(bank_import_lines::Column::LineNo);
        if let Some(status) = status {
            query = query.filter(bank_import_lines::Column::Status.eq(status.as_str()));
        }
        let models = query.all(&self.database).await?;
        models.into_iter().map(BankImportLine::try_from).collect()
    }

    /// Lookup tables for auto-matching: normalized alias and counterparty
    /// name, each mapping to the counterparty id. Inactive counterparties
    /// are left out of both.
    async fn match_tables(
        &self,
        db_tx: &DatabaseTransaction,
    ) -> ResultEngine<(HashMap<String, String>, HashMap<String, String>)> {
        let counterparty_models = counterparties::Entity::find()
            .filter(counterparties::Column::Active.eq(true))
            .all(db_tx)
            .await?;
        let mut by_name = HashMap::new();
        let mut active_ids = HashSet::new();
        for model in counterparty_models {
            active_ids.insert(model.id.clone());
            by_name.insert(model.name_norm, model.id);
        }

        let alias_models = aliases::Entity::find().all(db_tx).await?;
        let mut by_alias = HashMap::new();
        for model in alias_models {
            if active_ids.contains(&model.counterparty_id) {
                by_alias.insert(model.alias_norm, model.counterparty_id);
            }
        }
        Ok((by_alias, by_name))
    }

    async fn refresh_job_counters(
        &self,
        db_tx: &DatabaseTransaction,
        job_id: Uuid,
    ) -> ResultEngine<()> {
        let matched = self.count_lines(db_tx, job_id, LineStatus::Matched).await?;
        let active = bank_imports::ActiveModel {
            id: ActiveValue::Set(job_id.to_string()),
            matched_lines: ActiveValue::Set(matched),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(())
    }

    async fn count_lines(
        &self,
        db_tx: &DatabaseTransaction,
        job_id: Uuid,
        status: LineStatus,
    ) -> ResultEngine<i32> {
        let count = bank_import_lines::Entity::find()
            .filter(bank_import_lines::Column::JobId.eq(job_id.to_string()))
            .filter(bank_import_lines::Column::Status.eq(status.as_str()))
            .count(db_tx)
            .await?;
        Ok(count as i32)
    }

    async fn require_job(
        &self,
        db_tx: &DatabaseTransaction,
        job_id: Uuid,
    ) -> ResultEngine<bank_imports::Model> {
        bank_imports::Entity::find_by_id(job_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bank import job not exists".to_string()))
    }

    async fn require_line(
        &self,
        db_tx: &DatabaseTransaction,
        line_id: Uuid,
    ) -> ResultEngine<bank_import_lines::Model> {
        bank_import_lines::Entity::find_by_id(line_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("bank import line not exists".to_string()))
    }
}
