//! Registry of accounts allowed to submit proposals, each bound to the
//! executor its proposals run through.

use crate::error::GovernanceError;
use dualgov_types::Address;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposer {
    pub account: Address,
    pub executor: Address,
}

#[derive(Clone, Debug, Default)]
pub struct Proposers {
    entries: Vec<Proposer>,
}

impl Proposers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, account: Address, executor: Address) -> Result<(), GovernanceError> {
        if self.get(&account).is_some() {
            return Err(GovernanceError::ProposerAlreadyRegistered(account));
        }
        self.entries.push(Proposer { account, executor });
        Ok(())
    }

    /// Remove `account`. Refused when it is the last proposer bound to
    /// `admin_executor`, which would lock governance out of itself.
    pub fn unregister(
        &mut self,
        account: &Address,
        admin_executor: &Address,
    ) -> Result<(), GovernanceError> {
        let position = self
            .entries
            .iter()
            .position(|p| p.account == *account)
            .ok_or_else(|| GovernanceError::UnknownProposer(account.clone()))?;
        let removed = &self.entries[position];
        if removed.executor == *admin_executor && self.executor_count(admin_executor) == 1 {
            return Err(GovernanceError::LastAdminProposer);
        }
        self.entries.remove(position);
        Ok(())
    }

    pub fn get(&self, account: &Address) -> Option<&Proposer> {
        self.entries.iter().find(|p| p.account == *account)
    }

    pub fn is_executor(&self, executor: &Address) -> bool {
        self.executor_count(executor) > 0
    }

    pub fn all(&self) -> &[Proposer] {
        &self.entries
    }

    fn executor_count(&self, executor: &Address) -> usize {
        self.entries.iter().filter(|p| p.executor == *executor).count()
    }
}
