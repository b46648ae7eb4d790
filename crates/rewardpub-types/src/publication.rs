use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::Digest;
use crate::epoch::{Epoch, EpochId};
use crate::error::{PipelineError, Result};

/// Oldest audit entries are dropped past this; `total_attempts` keeps the full count
pub const HISTORY_LIMIT: usize = 512;

/// Working stage of a non-terminal publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    CommitmentBuilt,
    /// Off-chain signature produced
    Signed,
    /// On-chain transaction submitted
    Submitted,
}

impl Stage {
    pub const fn rank(&self) -> u8 {
        match self {
            Stage::Pending => 0,
            Stage::CommitmentBuilt => 1,
            Stage::Signed | Stage::Submitted => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "Pending",
            Stage::CommitmentBuilt => "CommitmentBuilt",
            Stage::Signed => "Signed",
            Stage::Submitted => "Submitted",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of an epoch's publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublicationState {
    Pending,
    CommitmentBuilt,
    Signed,
    Submitted,
    /// Terminal
    Confirmed,
    /// Retries exhausted in `from`; re-driven back into `from` later
    Failed { from: Stage, reason: String },
}

impl PublicationState {
    pub fn from_stage(stage: Stage) -> Self {
        match stage {
            Stage::Pending => PublicationState::Pending,
            Stage::CommitmentBuilt => PublicationState::CommitmentBuilt,
            Stage::Signed => PublicationState::Signed,
            Stage::Submitted => PublicationState::Submitted,
        }
    }

    /// Working stage, `None` once confirmed
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PublicationState::Pending => Some(Stage::Pending),
            PublicationState::CommitmentBuilt => Some(Stage::CommitmentBuilt),
            PublicationState::Signed => Some(Stage::Signed),
            PublicationState::Submitted => Some(Stage::Submitted),
            PublicationState::Confirmed => None,
            PublicationState::Failed { from, .. } => Some(*from),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublicationState::Confirmed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PublicationState::Failed { .. })
    }

    /// Monotonic transition rule shared by every store backend.
    /// Nothing leaves `Confirmed`; otherwise the stage may stay or advance one step,
    /// and `Signed`/`Submitted` never swap.
    pub fn can_transition_to(&self, next: &PublicationState) -> bool {
        let Some(current) = self.stage() else {
            return false;
        };
        match next.stage() {
            None => matches!(current, Stage::Signed | Stage::Submitted),
            Some(target) => {
                if target.rank() < current.rank() || target.rank() > current.rank() + 1 {
                    return false;
                }
                target.rank() != current.rank() || target == current
            }
        }
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationState::Confirmed => f.write_str("Confirmed"),
            PublicationState::Failed { from, reason } => write!(f, "Failed({}): {}", from, reason),
            other => match other.stage() {
                Some(stage) => write!(f, "{}", stage),
                None => f.write_str("Confirmed"),
            },
        }
    }
}

/// Reference to what the key custodian produced for a commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorizationRef {
    Signature {
        signer: String,
        #[serde(with = "crate::hex_bytes")]
        signature: Vec<u8>,
    },
    Transaction {
        tx_ref: String,
    },
}

impl AuthorizationRef {
    /// Stage reached once this reference is persisted
    pub fn stage(&self) -> Stage {
        match self {
            AuthorizationRef::Signature { .. } => Stage::Signed,
            AuthorizationRef::Transaction { .. } => Stage::Submitted,
        }
    }
}

impl fmt::Display for AuthorizationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationRef::Signature { signer, signature } => {
                write!(f, "sig:{}:0x{}", signer, hex::encode(signature))
            }
            AuthorizationRef::Transaction { tx_ref } => write!(f, "tx:{}", tx_ref),
        }
    }
}

/// One line of the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptEntry {
    pub at: DateTime<Utc>,
    pub stage: Option<Stage>,
    pub attempt: u32,
    pub outcome: String,
}

/// Persisted lifecycle of one epoch's publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub epoch_id: EpochId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub state: PublicationState,
    pub commitment_digest: Option<Digest>,
    pub canonical_encoding_version: Option<u16>,
    pub signature_or_tx_ref: Option<AuthorizationRef>,
    /// Consecutive failed attempts in the current stage
    pub attempt_count: u32,
    /// Every failed attempt ever recorded for this epoch
    pub total_attempts: u64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<AttemptEntry>,
}

impl PublicationRecord {
    /// Fresh `Pending` record for an epoch that just became due
    pub fn new(epoch: &Epoch, now: DateTime<Utc>) -> Self {
        let mut record = PublicationRecord {
            epoch_id: epoch.epoch_id,
            period_start: epoch.period_start,
            period_end: epoch.period_end,
            state: PublicationState::Pending,
            commitment_digest: None,
            canonical_encoding_version: None,
            signature_or_tx_ref: None,
            attempt_count: 0,
            total_attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        };
        record.push_history(now, "created".to_string());
        record
    }

    pub fn epoch(&self) -> Epoch {
        Epoch::new(self.epoch_id, self.period_start, self.period_end)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.state.stage()
    }

    /// Move to `next`, resetting the attempt counter when the stage changes
    pub fn transition(
        &mut self,
        next: PublicationState,
        now: DateTime<Utc>,
        note: impl Into<String>,
    ) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(PipelineError::InvalidTransition(format!(
                "epoch {}: {} -> {}",
                self.epoch_id, self.state, next
            )));
        }
        if self.state.stage() != next.stage() {
            self.attempt_count = 0;
        }
        if !next.is_failed() {
            self.last_error = None;
        }
        self.state = next;
        self.updated_at = now;
        self.push_history(now, note.into());
        Ok(())
    }

    /// Count one failed attempt in the current stage
    pub fn record_failure(&mut self, error: &PipelineError, now: DateTime<Utc>) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.last_error = Some(error.to_string());
        self.updated_at = now;
        self.push_history(now, error.to_string());
    }

    /// Note an error without consuming an attempt (e.g. data not finalized yet)
    pub fn record_deferral(&mut self, error: &PipelineError, now: DateTime<Utc>) {
        let message = error.to_string();
        let repeated = self.last_error.as_deref() == Some(message.as_str());
        self.last_error = Some(message.clone());
        self.updated_at = now;
        if !repeated {
            self.push_history(now, message);
        }
    }

    /// Park the record in `Failed`, keeping the stage it failed in
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        let Some(from) = self.stage() else {
            return Err(PipelineError::InvalidTransition(format!(
                "epoch {} is already confirmed",
                self.epoch_id
            )));
        };
        let reason = reason.into();
        self.last_error = Some(reason.clone());
        self.transition(
            PublicationState::Failed {
                from,
                reason: reason.clone(),
            },
            now,
            format!("failed in {}: {}", from, reason),
        )
    }

    /// `Failed(from) -> from` with a fresh attempt budget
    pub fn reenter(&mut self, now: DateTime<Utc>) -> Result<()> {
        let PublicationState::Failed { from, .. } = &self.state else {
            return Ok(());
        };
        let from = *from;
        self.transition(
            PublicationState::from_stage(from),
            now,
            format!("re-driving from {}", from),
        )?;
        self.attempt_count = 0;
        Ok(())
    }

    fn push_history(&mut self, at: DateTime<Utc>, outcome: String) {
        self.history.push(AttemptEntry {
            at,
            stage: self.state.stage(),
            attempt: self.attempt_count,
            outcome,
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> PublicationRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        PublicationRecord::new(&Epoch::new(42, start, end), end)
    }

    #[test]
    fn test_forward_transitions() {
        let mut r = record();
        let now = r.created_at;
        r.transition(PublicationState::CommitmentBuilt, now, "built").unwrap();
        r.transition(PublicationState::Signed, now, "signed").unwrap();
        r.transition(PublicationState::Confirmed, now, "confirmed").unwrap();
        assert!(r.is_terminal());
    }

    #[test]
    fn test_no_skipping_or_regression() {
        let p = PublicationState::Pending;
        assert!(!p.can_transition_to(&PublicationState::Signed));
        assert!(!p.can_transition_to(&PublicationState::Confirmed));
        assert!(!PublicationState::Signed.can_transition_to(&PublicationState::CommitmentBuilt));
        assert!(!PublicationState::Signed.can_transition_to(&PublicationState::Submitted));
        assert!(!PublicationState::Confirmed.can_transition_to(&PublicationState::Confirmed));
        assert!(!PublicationState::Confirmed.can_transition_to(&PublicationState::Pending));
    }

    #[test]
    fn test_failed_and_reenter() {
        let mut r = record();
        let now = r.created_at;
        r.transition(PublicationState::CommitmentBuilt, now, "built").unwrap();
        r.record_failure(&PipelineError::KeyUnavailable("down".into()), now);
        r.record_failure(&PipelineError::KeyUnavailable("down".into()), now);
        assert_eq!(r.attempt_count, 2);

        r.fail("key backend down", now).unwrap();
        assert_eq!(
            r.state,
            PublicationState::Failed {
                from: Stage::CommitmentBuilt,
                reason: "key backend down".into()
            }
        );

        r.reenter(now).unwrap();
        assert_eq!(r.state, PublicationState::CommitmentBuilt);
        assert_eq!(r.attempt_count, 0);
        assert_eq!(r.total_attempts, 2);
        assert!(r.history.len() >= 5);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut r = record();
        let now = r.created_at;
        for _ in 0..(HISTORY_LIMIT + 10) {
            r.record_failure(&PipelineError::DataSourceUnavailable("x".into()), now);
        }
        assert_eq!(r.history.len(), HISTORY_LIMIT);
        assert_eq!(r.total_attempts, (HISTORY_LIMIT + 10) as u64);
    }

    #[test]
    fn test_deferral_does_not_consume_attempts() {
        let mut r = record();
        let now = r.created_at;
        r.record_deferral(&PipelineError::IncompleteData(42), now);
        r.record_deferral(&PipelineError::IncompleteData(42), now);
        assert_eq!(r.attempt_count, 0);
        assert_eq!(r.state, PublicationState::Pending);
        assert_eq!(r.history.len(), 2);
    }
}
