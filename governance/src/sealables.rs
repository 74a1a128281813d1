//! Pausable external resources and the reseal manager.
//!
//! A sealable is paused while `now < resume_since`. Pausing "indefinitely"
//! sets `resume_since` to [`Timestamp::MAX`].

use crate::error::GovernanceError;
use dualgov_types::{Address, Duration, Timestamp};
use std::collections::HashMap;

pub const PAUSE_INFINITELY: Timestamp = Timestamp::MAX;

#[derive(Clone, Debug, Default)]
pub struct Sealables {
    resume_since: HashMap<Address, Timestamp>,
}

impl Sealables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sealable: Address) -> Result<(), GovernanceError> {
        if self.resume_since.contains_key(&sealable) {
            return Err(GovernanceError::SealableAlreadyRegistered(sealable));
        }
        self.resume_since.insert(sealable, Timestamp::ZERO);
        Ok(())
    }

    pub fn is_registered(&self, sealable: &Address) -> bool {
        self.resume_since.contains_key(sealable)
    }

    pub fn resume_since(&self, sealable: &Address) -> Result<Timestamp, GovernanceError> {
        self.resume_since
            .get(sealable)
            .copied()
            .ok_or_else(|| GovernanceError::UnknownSealable(sealable.clone()))
    }

    pub fn is_paused(&self, sealable: &Address, now: Timestamp) -> bool {
        self.resume_since
            .get(sealable)
            .is_some_and(|resume_since| now < *resume_since)
    }

    /// Whether `sealable` stays paused for longer than `tolerance` from now.
    pub fn is_paused_beyond(&self, sealable: &Address, tolerance: Duration, now: Timestamp) -> bool {
        let Some(resume_since) = self.resume_since.get(sealable) else {
            return false;
        };
        match now.checked_add(tolerance) {
            Ok(limit) => *resume_since > limit,
            Err(_) => *resume_since == PAUSE_INFINITELY,
        }
    }

    pub fn pause_for(
        &mut self,
        sealable: &Address,
        duration: Duration,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let until = now.checked_add(duration)?;
        self.pause_until(sealable, until, now)
    }

    pub fn pause_until(
        &mut self,
        sealable: &Address,
        until: Timestamp,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.resume_since(sealable)?;
        if until <= now {
            return Ok(());
        }
        self.resume_since.insert(sealable.clone(), until);
        tracing::debug!(%sealable, resume_since = %until, "sealable paused");
        Ok(())
    }

    pub fn resume(&mut self, sealable: &Address, now: Timestamp) -> Result<(), GovernanceError> {
        if !self.is_paused(sealable, now) {
            self.resume_since(sealable)?;
            return Err(GovernanceError::SealableNotPaused(sealable.clone()));
        }
        self.resume_since.insert(sealable.clone(), now);
        tracing::info!(%sealable, "sealable resumed");
        Ok(())
    }

    /// Extend a temporary pause into an indefinite one.
    pub fn reseal(&mut self, sealable: &Address, now: Timestamp) -> Result<(), GovernanceError> {
        let resume_since = self.resume_since(sealable)?;
        if resume_since == PAUSE_INFINITELY {
            return Err(GovernanceError::SealablePausedIndefinitely(sealable.clone()));
        }
        if now >= resume_since {
            return Err(GovernanceError::SealableNotPaused(sealable.clone()));
        }
        self.resume_since.insert(sealable.clone(), PAUSE_INFINITELY);
        tracing::info!(%sealable, "sealable resealed");
        Ok(())
    }
}
