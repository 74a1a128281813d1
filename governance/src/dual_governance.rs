//! The dual governance facade.
//!
//! Owns the state machine, every escrow ever deployed, the timelock, the
//! proposer registry and the sealables. Every state-mutating entry point
//! re-evaluates the state machine first; escrow pass-throughs re-evaluate it
//! again after the escrow changed, so a lock that crosses a seal takes
//! effect in the same call.

use crate::config::DualGovernanceConfig;
use crate::error::GovernanceError;
use crate::proposers::Proposers;
use crate::sealables::Sealables;
use crate::state::{DualGovernanceStateMachine, GovernanceState};
use dualgov_escrow::{Escrow, EscrowParams, EscrowState, Lido, UnstEthId};
use dualgov_timelock::{EmergencyProtectedTimelock, ExecutorCall, Proposal};
use dualgov_types::{Address, Duration, ETHValue, PercentD16, SharesValue, Timestamp};
use dualgov_utils::format_duration;

/// Address the timelock knows the governance by.
pub const DUAL_GOVERNANCE_ADDRESS: &str = "dual-governance";

pub struct DualGovernance {
    address: Address,
    config: DualGovernanceConfig,
    state: DualGovernanceStateMachine,
    escrows: Vec<Escrow>,
    timelock: EmergencyProtectedTimelock,
    proposers: Proposers,
    sealables: Sealables,
    withdrawal_blockers: Vec<Address>,
    proposals_canceller: Address,
    tiebreaker_committee: Option<Address>,
    reseal_committee: Option<Address>,
}

impl DualGovernance {
    /// Deploy the governance with its first signalling escrow.
    pub fn new(
        config: DualGovernanceConfig,
        admin_executor: Address,
        now: Timestamp,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;
        let address = Address::new(DUAL_GOVERNANCE_ADDRESS);
        let timelock = EmergencyProtectedTimelock::new(
            address.clone(),
            admin_executor.clone(),
            config.timelock.clone(),
        )?;
        let escrow = Escrow::new(escrow_address(0), escrow_params(&config));
        tracing::info!(%admin_executor, "dual governance deployed");
        Ok(Self {
            address,
            state: DualGovernanceStateMachine::new(0, now),
            escrows: vec![escrow],
            timelock,
            proposers: Proposers::new(),
            sealables: Sealables::new(),
            withdrawal_blockers: Vec::new(),
            proposals_canceller: admin_executor,
            tiebreaker_committee: None,
            reseal_committee: None,
            config,
        })
    }

    // ── State machine ──────────────────────────────────────────────────

    /// Apply at most one pending phase transition. Calling it again at the
    /// same time is a no-op.
    pub fn activate_next_state<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        now: Timestamp,
    ) -> Result<GovernanceState, GovernanceError> {
        let support = self.signalling_escrow().rage_quit_support(lido)?;
        let rage_quit_finalized = self
            .rage_quit_escrow()
            .is_some_and(|escrow| escrow.is_rage_quit_finalized(now));
        let current = self.state.state();
        let next = self
            .state
            .next_state(&self.config, support, rage_quit_finalized, now);
        if next == current {
            return Ok(current);
        }
        if next == GovernanceState::RageQuit {
            self.start_rage_quit(lido)?;
        }
        self.state.enter(next, now);
        tracing::info!(
            from = ?current,
            to = ?next,
            %support,
            dynamic_timelock = %format_duration(self.config.dynamic_timelock(support)),
            "governance state changed"
        );
        Ok(next)
    }

    fn start_rage_quit<L: Lido + ?Sized>(&mut self, lido: &L) -> Result<(), GovernanceError> {
        let round = self.state.rage_quit_round();
        let withdrawals_timelock = self.config.rage_quit_withdrawals_timelock(round)?;
        let extension = self.config.rage_quit_extension_period_duration;
        let retired = self.state.signalling_escrow();
        self.escrow_mut(retired)?
            .start_rage_quit(lido, extension, withdrawals_timelock)?;

        let fresh = self.escrows.len();
        self.escrows
            .push(Escrow::new(escrow_address(fresh), escrow_params(&self.config)));
        self.state.promote_rage_quit_escrow(fresh);
        tracing::info!(
            rage_quit_escrow = retired,
            signalling_escrow = fresh,
            round = self.state.rage_quit_round(),
            withdrawals_timelock = %format_duration(withdrawals_timelock),
            "rage quit escrow promoted"
        );
        Ok(())
    }

    // ── Proposals ──────────────────────────────────────────────────────

    pub fn submit_proposal<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        proposer: &Address,
        calls: Vec<ExecutorCall>,
        now: Timestamp,
    ) -> Result<u64, GovernanceError> {
        self.activate_next_state(lido, now)?;
        if !self.state.is_proposals_creation_allowed() {
            return Err(GovernanceError::ProposalsCreationSuspended(self.state.state()));
        }
        let executor = self
            .proposers
            .get(proposer)
            .map(|p| p.executor.clone())
            .ok_or_else(|| GovernanceError::UnknownProposer(proposer.clone()))?;
        let id = self.timelock.submit(&self.address, executor, calls, now)?;
        Ok(id)
    }

    pub fn schedule_proposal<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        id: u64,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.activate_next_state(lido, now)?;
        let proposal = self.timelock.proposal(id)?;
        if !self.state.can_adopt_proposal(proposal.submitted_at) {
            return Err(GovernanceError::ProposalsAdoptionSuspended {
                id,
                state: self.state.state(),
            });
        }
        self.timelock.schedule(&self.address, id, now)?;
        Ok(())
    }

    /// Execute a scheduled proposal. Open to anyone.
    pub fn execute_proposal(&mut self, id: u64, now: Timestamp) -> Result<Proposal, GovernanceError> {
        Ok(self.timelock.execute(id, now)?)
    }

    /// Cancel every pending proposal while stakers are signalling. Returns
    /// whether anything was cancelled; outside signalling this is a no-op.
    pub fn cancel_all_pending_proposals<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        caller: &Address,
        now: Timestamp,
    ) -> Result<bool, GovernanceError> {
        self.activate_next_state(lido, now)?;
        if *caller != self.proposals_canceller {
            return Err(GovernanceError::Unauthorized {
                caller: caller.clone(),
                role: "proposals canceller",
            });
        }
        if !matches!(
            self.state.state(),
            GovernanceState::VetoSignalling | GovernanceState::VetoSignallingDeactivation
        ) {
            return Ok(false);
        }
        self.timelock
            .cancel_all_non_executed_proposals(&self.address)?;
        Ok(true)
    }

    /// Whether `id` could be scheduled at `now`, judged against the stored
    /// phase.
    pub fn can_schedule_proposal(&self, id: u64, now: Timestamp) -> bool {
        self.timelock
            .proposal(id)
            .is_ok_and(|proposal| self.state.can_adopt_proposal(proposal.submitted_at))
            && self.timelock.can_schedule(id, now)
    }

    // ── Tiebreak ───────────────────────────────────────────────────────

    pub fn is_tiebreak(&self, now: Timestamp) -> bool {
        let tolerance = self.config.sealable_withdrawal_blockers_tolerance;
        let blocker_paused = self
            .withdrawal_blockers
            .iter()
            .any(|sealable| self.sealables.is_paused_beyond(sealable, tolerance, now));
        self.state.is_tiebreak(&self.config, blocker_paused, now)
    }

    pub fn tiebreaker_schedule_proposal<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.activate_next_state(lido, now)?;
        self.check_tiebreak(caller, now)?;
        self.timelock.schedule(&self.address, id, now)?;
        tracing::info!(proposal_id = id, "proposal scheduled by tiebreaker");
        Ok(())
    }

    pub fn tiebreaker_resume_sealable<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        caller: &Address,
        sealable: &Address,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.activate_next_state(lido, now)?;
        self.check_tiebreak(caller, now)?;
        self.sealables.resume(sealable, now)
    }

    fn check_tiebreak(&self, caller: &Address, now: Timestamp) -> Result<(), GovernanceError> {
        check_role(caller, self.tiebreaker_committee.as_ref(), "tiebreaker committee")?;
        if !self.is_tiebreak(now) {
            return Err(GovernanceError::TiebreakNotActive);
        }
        Ok(())
    }

    // ── Reseal ─────────────────────────────────────────────────────────

    /// Turn temporary pauses into indefinite ones while governance is not
    /// in the normal phase.
    pub fn reseal_sealables<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        caller: &Address,
        sealables: &[Address],
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.activate_next_state(lido, now)?;
        check_role(caller, self.reseal_committee.as_ref(), "reseal committee")?;
        if self.state.state() == GovernanceState::Normal {
            return Err(GovernanceError::ResealNotAllowed(GovernanceState::Normal));
        }
        let mut staged = self.sealables.clone();
        for sealable in sealables {
            staged.reseal(sealable, now)?;
        }
        self.sealables = staged;
        Ok(())
    }

    // ── Escrow pass-throughs ───────────────────────────────────────────

    pub fn lock_steth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        amount: ETHValue,
        now: Timestamp,
    ) -> Result<SharesValue, GovernanceError> {
        self.activate_next_state(lido, now)?;
        let shares = self
            .signalling_escrow_mut()?
            .lock_steth(lido, holder, amount, now)?;
        self.activate_next_state(lido, now)?;
        Ok(shares)
    }

    pub fn unlock_steth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        now: Timestamp,
    ) -> Result<SharesValue, GovernanceError> {
        self.activate_next_state(lido, now)?;
        let shares = self.signalling_escrow_mut()?.unlock_steth(lido, holder, now)?;
        self.activate_next_state(lido, now)?;
        Ok(shares)
    }

    pub fn lock_wsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        amount: SharesValue,
        now: Timestamp,
    ) -> Result<SharesValue, GovernanceError> {
        self.activate_next_state(lido, now)?;
        let shares = self
            .signalling_escrow_mut()?
            .lock_wsteth(lido, holder, amount, now)?;
        self.activate_next_state(lido, now)?;
        Ok(shares)
    }

    pub fn unlock_wsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        now: Timestamp,
    ) -> Result<SharesValue, GovernanceError> {
        self.activate_next_state(lido, now)?;
        let shares = self.signalling_escrow_mut()?.unlock_wsteth(lido, holder, now)?;
        self.activate_next_state(lido, now)?;
        Ok(shares)
    }

    pub fn lock_unsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        ids: &[UnstEthId],
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.activate_next_state(lido, now)?;
        self.signalling_escrow_mut()?
            .lock_unsteth(lido, holder, ids, now)?;
        self.activate_next_state(lido, now)?;
        Ok(())
    }

    pub fn unlock_unsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        ids: &[UnstEthId],
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        self.activate_next_state(lido, now)?;
        self.signalling_escrow_mut()?
            .unlock_unsteth(lido, holder, ids, now)?;
        self.activate_next_state(lido, now)?;
        Ok(())
    }

    pub fn mark_unsteth_finalized<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        ids: &[UnstEthId],
        now: Timestamp,
    ) -> Result<(SharesValue, ETHValue), GovernanceError> {
        self.activate_next_state(lido, now)?;
        let marked = self.signalling_escrow_mut()?.mark_unsteth_finalized(lido, ids)?;
        self.activate_next_state(lido, now)?;
        Ok(marked)
    }

    /// Mutable access to a retired escrow for batch processing and
    /// withdrawals. The live signalling escrow is only reachable through
    /// the pass-throughs above.
    pub fn rage_quit_escrow_mut(&mut self, id: usize) -> Result<&mut Escrow, GovernanceError> {
        let escrow = self.escrow_mut(id)?;
        if escrow.state() != EscrowState::RageQuitEscrow {
            return Err(GovernanceError::EscrowNotRetired(id));
        }
        Ok(escrow)
    }

    // ── Admin ──────────────────────────────────────────────────────────

    pub fn register_proposer(
        &mut self,
        caller: &Address,
        proposer: Address,
        executor: Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        tracing::info!(%proposer, %executor, "proposer registered");
        self.proposers.register(proposer, executor)
    }

    pub fn unregister_proposer(
        &mut self,
        caller: &Address,
        proposer: &Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        let admin_executor = self.timelock.admin_executor().clone();
        self.proposers.unregister(proposer, &admin_executor)
    }

    pub fn set_proposals_canceller(
        &mut self,
        caller: &Address,
        canceller: Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        self.proposals_canceller = canceller;
        Ok(())
    }

    pub fn set_tiebreaker_committee(
        &mut self,
        caller: &Address,
        committee: Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        self.tiebreaker_committee = Some(committee);
        Ok(())
    }

    pub fn set_reseal_committee(
        &mut self,
        caller: &Address,
        committee: Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        self.reseal_committee = Some(committee);
        Ok(())
    }

    pub fn register_sealable(
        &mut self,
        caller: &Address,
        sealable: Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        self.sealables.register(sealable)
    }

    /// Mark a registered sealable as blocking withdrawals: while it stays
    /// paused during a rage quit, the tiebreak opens.
    pub fn add_tiebreaker_withdrawal_blocker(
        &mut self,
        caller: &Address,
        sealable: Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        if !self.sealables.is_registered(&sealable) {
            return Err(GovernanceError::UnknownSealable(sealable));
        }
        if !self.withdrawal_blockers.contains(&sealable) {
            self.withdrawal_blockers.push(sealable);
        }
        Ok(())
    }

    pub fn remove_tiebreaker_withdrawal_blocker(
        &mut self,
        caller: &Address,
        sealable: &Address,
    ) -> Result<(), GovernanceError> {
        self.check_admin_executor(caller)?;
        self.withdrawal_blockers.retain(|s| s != sealable);
        Ok(())
    }

    fn check_admin_executor(&self, caller: &Address) -> Result<(), GovernanceError> {
        check_role(caller, Some(self.timelock.admin_executor()), "admin executor")
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &DualGovernanceConfig {
        &self.config
    }

    pub fn state(&self) -> GovernanceState {
        self.state.state()
    }

    pub fn state_machine(&self) -> &DualGovernanceStateMachine {
        &self.state
    }

    pub fn is_proposals_creation_allowed(&self) -> bool {
        self.state.is_proposals_creation_allowed()
    }

    pub fn is_proposals_adoption_allowed(&self) -> bool {
        self.state.is_proposals_adoption_allowed()
    }

    pub fn rage_quit_support<L: Lido + ?Sized>(
        &self,
        lido: &L,
    ) -> Result<PercentD16, GovernanceError> {
        Ok(self.signalling_escrow().rage_quit_support(lido)?)
    }

    /// Veto signalling duration implied by the current support.
    pub fn dynamic_timelock<L: Lido + ?Sized>(&self, lido: &L) -> Result<Duration, GovernanceError> {
        Ok(self.config.dynamic_timelock(self.rage_quit_support(lido)?))
    }

    /// Time spent in veto signalling since its activation, zero outside
    /// VetoSignalling and its deactivation sub-state.
    pub fn veto_signalling_duration(&self, now: Timestamp) -> Duration {
        match self.state.state() {
            GovernanceState::VetoSignalling | GovernanceState::VetoSignallingDeactivation => self
                .state
                .veto_signalling_activated_at()
                .elapsed_since(now),
            _ => Duration::ZERO,
        }
    }

    pub fn escrow(&self, id: usize) -> Option<&Escrow> {
        self.escrows.get(id)
    }

    pub fn escrows_count(&self) -> usize {
        self.escrows.len()
    }

    pub fn signalling_escrow(&self) -> &Escrow {
        // the state machine only ever points at escrows it was handed
        &self.escrows[self.state.signalling_escrow()]
    }

    pub fn rage_quit_escrow(&self) -> Option<&Escrow> {
        self.state.rage_quit_escrow().and_then(|id| self.escrows.get(id))
    }

    pub fn timelock(&self) -> &EmergencyProtectedTimelock {
        &self.timelock
    }

    /// The emergency path: committees act on the timelock directly.
    pub fn timelock_mut(&mut self) -> &mut EmergencyProtectedTimelock {
        &mut self.timelock
    }

    pub fn proposers(&self) -> &Proposers {
        &self.proposers
    }

    pub fn sealables(&self) -> &Sealables {
        &self.sealables
    }

    /// Pausing is done by external gate seals; tests and harnesses drive
    /// it through here.
    pub fn sealables_mut(&mut self) -> &mut Sealables {
        &mut self.sealables
    }

    pub fn tiebreaker_committee(&self) -> Option<&Address> {
        self.tiebreaker_committee.as_ref()
    }

    pub fn reseal_committee(&self) -> Option<&Address> {
        self.reseal_committee.as_ref()
    }

    fn signalling_escrow_mut(&mut self) -> Result<&mut Escrow, GovernanceError> {
        self.escrow_mut(self.state.signalling_escrow())
    }

    fn escrow_mut(&mut self, id: usize) -> Result<&mut Escrow, GovernanceError> {
        self.escrows
            .get_mut(id)
            .ok_or(GovernanceError::UnknownEscrow(id))
    }
}

fn escrow_address(id: usize) -> Address {
    Address::new(format!("escrow-{id}"))
}

fn escrow_params(config: &DualGovernanceConfig) -> EscrowParams {
    EscrowParams {
        min_assets_lock_duration: config.min_assets_lock_duration,
        min_withdrawals_batch_size: config.min_withdrawals_batch_size,
    }
}

fn check_role(
    caller: &Address,
    expected: Option<&Address>,
    role: &'static str,
) -> Result<(), GovernanceError> {
    if expected != Some(caller) {
        return Err(GovernanceError::Unauthorized {
            caller: caller.clone(),
            role,
        });
    }
    Ok(())
}
