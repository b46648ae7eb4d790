use chrono::Utc;
use rewardpub_commitment::{commit, CommitmentBuilder};
use rewardpub_custody::KeyCustodian;
use rewardpub_store::PublishStateStore;
use rewardpub_types::{
    AuthorizationRef, CanonicalEncoding, Commitment, Epoch, ErrorClass, PipelineError,
    PublicationRecord, PublicationState, Result, Stage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{PublishTarget, PublisherConfig};
use crate::endpoint::{ConfirmationStatus, PublicationEndpoint};

/// How a single drive of an epoch ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DriveOutcome {
    Confirmed,
    /// Reward data not final yet; the record stays `Pending`
    NotReady,
    /// Parked in `Failed`; re-driven on a later tick
    Failed(String),
    /// Cancelled mid-drive; the record keeps its last persisted state
    Interrupted,
}

enum Step {
    Advanced,
    Confirmed,
    Interrupted,
}

enum Recovery {
    Retry,
    Stop(DriveOutcome),
}

/// Per-epoch state machine: build, authorize, deliver, confirm.
///
/// Every state change and every failed attempt is written to the store before the
/// next network call, so a restarted process resumes exactly where the last one
/// stopped.
pub struct Publisher {
    builder: CommitmentBuilder,
    custodian: Arc<dyn KeyCustodian>,
    endpoint: Arc<dyn PublicationEndpoint>,
    store: Arc<dyn PublishStateStore>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(
        builder: CommitmentBuilder,
        custodian: Arc<dyn KeyCustodian>,
        endpoint: Arc<dyn PublicationEndpoint>,
        store: Arc<dyn PublishStateStore>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            builder,
            custodian,
            endpoint,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn PublishStateStore> {
        &self.store
    }

    /// Advance `epoch` as far as it goes right now.
    /// Only `StateStoreUnavailable` is returned as an error.
    pub async fn drive(&self, epoch: &Epoch) -> Result<DriveOutcome> {
        self.drive_until(epoch, &CancellationToken::new()).await
    }

    /// [`Publisher::drive`] that stops between steps and during backoff or confirmation
    /// polling once `cancel` fires
    #[instrument(level = "info", skip(self, cancel), fields(epoch_id = epoch.epoch_id))]
    pub async fn drive_until(
        &self,
        epoch: &Epoch,
        cancel: &CancellationToken,
    ) -> Result<DriveOutcome> {
        match self.drive_epoch(epoch, cancel).await {
            Err(err) if err.class() != ErrorClass::Fatal => {
                error!(error = %err, "drive aborted");
                Ok(DriveOutcome::Failed(err.to_string()))
            }
            other => other,
        }
    }

    async fn drive_epoch(
        &self,
        epoch: &Epoch,
        cancel: &CancellationToken,
    ) -> Result<DriveOutcome> {
        let mut record = self.load_or_create(epoch)?;
        if record.is_terminal() {
            debug!("already confirmed");
            return Ok(DriveOutcome::Confirmed);
        }
        if record.state.is_failed() {
            record.reenter(Utc::now())?;
            self.save(&record)?;
            info!(state = %record.state, "re-entering after failure");
        }

        let mut commitment = None;
        loop {
            if cancel.is_cancelled() {
                info!(state = %record.state, "drive interrupted");
                return Ok(DriveOutcome::Interrupted);
            }
            match self.step(&mut record, &mut commitment, cancel).await {
                Ok(Step::Advanced) => continue,
                Ok(Step::Confirmed) => return Ok(DriveOutcome::Confirmed),
                Ok(Step::Interrupted) => {
                    info!(state = %record.state, "drive interrupted");
                    return Ok(DriveOutcome::Interrupted);
                }
                Err(err) => match self.recover(&mut record, err, cancel).await? {
                    Recovery::Retry => continue,
                    Recovery::Stop(outcome) => return Ok(outcome),
                },
            }
        }
    }

    fn load_or_create(&self, epoch: &Epoch) -> Result<PublicationRecord> {
        if let Some(record) = self.store.get(epoch.epoch_id)? {
            return Ok(record);
        }
        let record = PublicationRecord::new(epoch, Utc::now());
        self.save(&record)?;
        info!(
            period_start = %epoch.period_start,
            period_end = %epoch.period_end,
            "publication record created"
        );
        Ok(record)
    }

    fn save(&self, record: &PublicationRecord) -> Result<()> {
        self.store.upsert(record).map_err(PipelineError::from)
    }

    async fn step(
        &self,
        record: &mut PublicationRecord,
        commitment: &mut Option<Commitment>,
        cancel: &CancellationToken,
    ) -> Result<Step> {
        let Some(stage) = record.stage() else {
            return Ok(Step::Confirmed);
        };

        if stage == Stage::Pending {
            let built = self.builder.build(&record.epoch()).await?;
            self.record_commitment(record, &built)?;
            *commitment = Some(built);
            return Ok(Step::Advanced);
        }

        let current = match commitment.clone() {
            Some(current) => current,
            None => {
                let rebuilt = self.rebuild(record).await?;
                *commitment = Some(rebuilt.clone());
                rebuilt
            }
        };

        match stage {
            Stage::CommitmentBuilt => self.authorize(record, &current).await,
            _ => self.confirm(record, &current, cancel).await,
        }
    }

    fn record_commitment(&self, record: &mut PublicationRecord, commitment: &Commitment) -> Result<()> {
        record.commitment_digest = Some(commitment.digest);
        record.canonical_encoding_version = Some(commitment.canonical_encoding_version);
        record.transition(
            PublicationState::CommitmentBuilt,
            Utc::now(),
            format!(
                "commitment {} over {} recipients",
                commitment.digest, commitment.recipient_count
            ),
        )?;
        self.save(record)?;
        info!(
            digest = %commitment.digest,
            recipients = commitment.recipient_count,
            total = %commitment.total_amount,
            "commitment built"
        );
        Ok(())
    }

    /// Rebuild the commitment of a record that is past `Pending` and check it still
    /// matches what was persisted
    async fn rebuild(&self, record: &PublicationRecord) -> Result<Commitment> {
        let encoding = match record.canonical_encoding_version {
            Some(version) => CanonicalEncoding::from_version(version)?,
            None => self.builder.encoding(),
        };
        let set = self.builder.fetch_reward_set(&record.epoch()).await?;
        let rebuilt = commit(&set, encoding)?;

        if let Some(stored) = record.commitment_digest {
            if stored != rebuilt.digest {
                return Err(PipelineError::RewardSetMismatch {
                    epoch_id: record.epoch_id,
                    stored: stored.to_hex(),
                    rebuilt: rebuilt.digest.to_hex(),
                });
            }
        }
        debug!(digest = %rebuilt.digest, "rebuilt commitment matches");
        Ok(rebuilt)
    }

    async fn authorize(&self, record: &mut PublicationRecord, commitment: &Commitment) -> Result<Step> {
        if self.adopt_stored_authorization(record)? {
            return Ok(Step::Advanced);
        }

        let authorization: AuthorizationRef = match self.config.target {
            PublishTarget::OffChain => self
                .custodian
                .sign(commitment)
                .await
                .map_err(PipelineError::from)?
                .into(),
            PublishTarget::OnChain => self
                .custodian
                .submit(commitment)
                .await
                .map_err(PipelineError::from)?
                .into(),
        };

        record.signature_or_tx_ref = Some(authorization.clone());
        record.transition(
            PublicationState::from_stage(authorization.stage()),
            Utc::now(),
            format!("authorized by {}", self.custodian.signer_id()),
        )?;
        self.save(record)?;
        info!(authorization = %authorization, state = %record.state, "commitment authorized");
        Ok(Step::Advanced)
    }

    /// Re-read the store and take over an authorization persisted earlier.
    /// Returns whether one was found.
    fn adopt_stored_authorization(&self, record: &mut PublicationRecord) -> Result<bool> {
        let Some(stored) = self.store.get(record.epoch_id)? else {
            return Ok(false);
        };
        let Some(authorization) = stored.signature_or_tx_ref.clone() else {
            return Ok(false);
        };

        *record = stored;
        if record.stage() == Some(Stage::CommitmentBuilt) {
            record.transition(
                PublicationState::from_stage(authorization.stage()),
                Utc::now(),
                "adopted persisted authorization",
            )?;
            self.save(record)?;
        }
        info!(authorization = %authorization, "persisted authorization found, custodian skipped");
        Ok(true)
    }

    async fn confirm(
        &self,
        record: &mut PublicationRecord,
        commitment: &Commitment,
        cancel: &CancellationToken,
    ) -> Result<Step> {
        let authorization = record.signature_or_tx_ref.clone().ok_or_else(|| {
            PipelineError::InvalidTransition(format!(
                "epoch {} is {} without an authorization",
                record.epoch_id, record.state
            ))
        })?;

        self.endpoint.deliver(commitment, &authorization).await?;

        let policy = &self.config.confirmation;
        let deadline = Instant::now() + policy.confirmation_timeout;
        loop {
            match self
                .endpoint
                .confirmation(record.epoch_id, &authorization)
                .await?
            {
                ConfirmationStatus::Confirmed => {
                    record.transition(
                        PublicationState::Confirmed,
                        Utc::now(),
                        format!("confirmed {}", authorization),
                    )?;
                    self.save(record)?;
                    info!("publication confirmed");
                    return Ok(Step::Confirmed);
                }
                status => debug!(?status, "awaiting confirmation"),
            }

            if Instant::now() >= deadline {
                return Err(PipelineError::ConfirmationTimeout(format!(
                    "epoch {} not confirmed within {:?}",
                    record.epoch_id, policy.confirmation_timeout
                )));
            }
            if !pause(policy.poll_interval, cancel).await {
                return Ok(Step::Interrupted);
            }
        }
    }

    async fn recover(
        &self,
        record: &mut PublicationRecord,
        err: PipelineError,
        cancel: &CancellationToken,
    ) -> Result<Recovery> {
        let now = Utc::now();
        match err.class() {
            ErrorClass::Fatal => Err(err),
            ErrorClass::NotReady => {
                record.record_deferral(&err, now);
                self.save(record)?;
                info!(reason = %err, "epoch not ready");
                Ok(Recovery::Stop(DriveOutcome::NotReady))
            }
            ErrorClass::Retryable => {
                record.record_failure(&err, now);
                let attempt = record.attempt_count;
                if attempt >= self.config.retry.max_attempts {
                    return self.park(record, err.to_string());
                }
                self.save(record)?;
                let wait = self.config.retry.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts = self.config.retry.max_attempts,
                    backoff = ?wait,
                    error = %err,
                    "attempt failed, retrying"
                );
                if !pause(wait, cancel).await {
                    return Ok(Recovery::Stop(DriveOutcome::Interrupted));
                }
                Ok(Recovery::Retry)
            }
            ErrorClass::Reconcile => {
                if let Some(stored) = self.store.get(record.epoch_id)? {
                    if stored.signature_or_tx_ref.is_some() {
                        warn!(error = %err, "custodian rejected, persisted authorization exists");
                        *record = stored;
                        return Ok(Recovery::Retry);
                    }
                }
                record.record_failure(&err, now);
                self.park(record, err.to_string())
            }
            ErrorClass::Deferred | ErrorClass::Intervention => {
                record.record_failure(&err, now);
                self.park(record, err.to_string())
            }
        }
    }

    fn park(&self, record: &mut PublicationRecord, reason: String) -> Result<Recovery> {
        record.fail(reason.clone(), Utc::now())?;
        self.save(record)?;
        error!(
            total_attempts = record.total_attempts,
            reason = %reason,
            "epoch failed"
        );
        Ok(Recovery::Stop(DriveOutcome::Failed(reason)))
    }
}

/// Sleep for `wait` unless cancelled first. Returns false on cancellation.
async fn pause(wait: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep(wait) => true,
    }
}
