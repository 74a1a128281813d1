//! Actions committees vote on and their content hashes.
//!
//! The hash of an action is the only thing members vote on: two proposals
//! with the same parameters are the same vote.

use dualgov_crypto::hash_action;
use dualgov_types::{ActionHash, Address};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitteeAction {
    ActivateEmergencyMode,
    EmergencyExecute { proposal_id: u64 },
    EmergencyReset,
    ScheduleProposal { proposal_id: u64 },
    ResumeSealable { sealable: Address, nonce: u64 },
    Reseal { sealables: Vec<Address>, nonce: u64 },
}

impl CommitteeAction {
    fn tag(&self) -> &'static [u8] {
        match self {
            Self::ActivateEmergencyMode => b"emergency-activate",
            Self::EmergencyExecute { .. } => b"emergency-execute",
            Self::EmergencyReset => b"emergency-reset",
            Self::ScheduleProposal { .. } => b"schedule-proposal",
            Self::ResumeSealable { .. } => b"resume-sealable",
            Self::Reseal { .. } => b"reseal",
        }
    }

    pub fn hash(&self) -> ActionHash {
        let tag = self.tag();
        match self {
            Self::ActivateEmergencyMode | Self::EmergencyReset => hash_action(&[tag]),
            Self::EmergencyExecute { proposal_id } | Self::ScheduleProposal { proposal_id } => {
                hash_action(&[tag, &proposal_id.to_be_bytes()])
            }
            Self::ResumeSealable { sealable, nonce } => {
                hash_action(&[tag, sealable.as_str().as_bytes(), &nonce.to_be_bytes()])
            }
            Self::Reseal { sealables, nonce } => {
                let nonce = nonce.to_be_bytes();
                let mut parts: Vec<&[u8]> = Vec::with_capacity(sealables.len() + 2);
                parts.push(tag);
                parts.extend(sealables.iter().map(|s| s.as_str().as_bytes()));
                parts.push(&nonce);
                hash_action(&parts)
            }
        }
    }
}
