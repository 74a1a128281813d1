use dualgov_escrow::EscrowState;
use dualgov_governance::{
    DualGovernance, DualGovernanceConfig, GovernanceError, GovernanceState, PAUSE_INFINITELY,
};
use dualgov_nullables::NullLido;
use dualgov_timelock::{ExecutorCall, ProposalStatus};
use dualgov_types::{Address, Duration, ETHValue, ErrorKind, PercentD16, SharesValue, Timestamp};
use proptest::prelude::*;

const ETHER: u128 = 1_000_000_000_000_000_000;
const T0: Timestamp = Timestamp::new(1_000_000);

fn eth(amount: u128) -> ETHValue {
    ETHValue::new(amount * ETHER)
}

fn alice() -> Address {
    Address::new("alice")
}

fn bob() -> Address {
    Address::new("bob")
}

fn admin() -> Address {
    Address::new("admin-executor")
}

fn dao() -> Address {
    Address::new("dao")
}

fn after(ts: Timestamp, d: Duration) -> Timestamp {
    ts.checked_add(d).unwrap()
}

fn just_after(ts: Timestamp, d: Duration) -> Timestamp {
    after(after(ts, d), Duration::new(1))
}

fn calls() -> Vec<ExecutorCall> {
    vec![ExecutorCall::new("agent", b"upgrade".to_vec())]
}

/// 1000 ether of stETH in circulation: Alice 100, Bob 50, the market 850.
fn setup() -> (NullLido, DualGovernance) {
    let mut lido = NullLido::new();
    lido.submit(&alice(), eth(100));
    lido.submit(&bob(), eth(50));
    lido.submit(&Address::new("market"), eth(850));
    let mut dg = DualGovernance::new(DualGovernanceConfig::default(), admin(), T0).unwrap();
    dg.register_proposer(&admin(), dao(), admin()).unwrap();
    (lido, dg)
}

/// Lock 15% and let the 30 day dynamic timelock run out.
fn enter_rage_quit(lido: &mut NullLido, dg: &mut DualGovernance) -> Timestamp {
    dg.lock_steth(lido, &alice(), eth(100), T0).unwrap();
    dg.lock_steth(lido, &bob(), eth(50), T0).unwrap();
    assert_eq!(dg.state(), GovernanceState::VetoSignalling);

    let max = Duration::from_days(30);
    assert_eq!(
        dg.activate_next_state(lido, after(T0, max)).unwrap(),
        GovernanceState::VetoSignalling
    );
    let now = just_after(T0, max);
    assert_eq!(
        dg.activate_next_state(lido, now).unwrap(),
        GovernanceState::RageQuit
    );
    now
}

#[test]
fn rage_quit_promotes_the_signalling_escrow() {
    let (mut lido, mut dg) = setup();
    enter_rage_quit(&mut lido, &mut dg);

    assert_eq!(dg.escrows_count(), 2);
    assert_eq!(dg.state_machine().rage_quit_round(), 1);
    assert_eq!(dg.state_machine().rage_quit_escrow(), Some(0));

    let retired = dg.rage_quit_escrow().unwrap();
    assert_eq!(retired.address(), &Address::new("escrow-0"));
    assert_eq!(retired.state(), EscrowState::RageQuitEscrow);
    assert_eq!(
        retired.locked_assets_totals().steth_locked_shares,
        SharesValue::new(150 * ETHER)
    );
    assert_eq!(retired.rage_quit_withdrawals_timelock(), Duration::from_days(60));
    assert_eq!(retired.rage_quit_extension_delay(), Duration::from_days(7));

    let fresh = dg.signalling_escrow();
    assert_eq!(fresh.address(), &Address::new("escrow-1"));
    assert_eq!(fresh.state(), EscrowState::SignallingEscrow);
    assert_eq!(
        fresh.locked_assets_totals().steth_locked_shares,
        SharesValue::ZERO
    );
    assert_eq!(dg.rage_quit_support(&lido).unwrap(), PercentD16::ZERO);
}

#[test]
fn rage_quit_runs_to_cooldown_and_pays_out() {
    let (mut lido, mut dg) = setup();
    let entered = enter_rage_quit(&mut lido, &mut dg);
    let retired = dg.state_machine().rage_quit_escrow().unwrap();

    let ids = dg
        .rage_quit_escrow_mut(retired)
        .unwrap()
        .request_next_withdrawals_batch(&mut lido, 4)
        .unwrap();
    assert_eq!(ids.len(), 1);
    lido.finalize_all();

    let claimed_at = after(entered, Duration::from_hours(1));
    let claimed = dg
        .rage_quit_escrow_mut(retired)
        .unwrap()
        .claim_next_withdrawals_batch(&mut lido, 10, claimed_at)
        .unwrap();
    assert_eq!(claimed, eth(150));

    let extension = Duration::from_days(7);
    assert_eq!(
        dg.activate_next_state(&lido, after(claimed_at, extension)).unwrap(),
        GovernanceState::RageQuit
    );
    let cooldown_at = just_after(claimed_at, extension);
    assert_eq!(
        dg.activate_next_state(&lido, cooldown_at).unwrap(),
        GovernanceState::VetoCooldown
    );

    let normal_at = just_after(cooldown_at, Duration::from_days(4));
    assert_eq!(
        dg.activate_next_state(&lido, normal_at).unwrap(),
        GovernanceState::Normal
    );
    assert_eq!(dg.state_machine().rage_quit_round(), 0);

    let unlock = just_after(after(claimed_at, extension), Duration::from_days(60));
    let paid = dg
        .rage_quit_escrow_mut(retired)
        .unwrap()
        .withdraw_eth(&mut lido, &alice(), unlock)
        .unwrap();
    assert_eq!(paid, eth(100));
}

#[test]
fn only_retired_escrows_are_reachable_mutably() {
    let (_, mut dg) = setup();
    assert_eq!(
        dg.rage_quit_escrow_mut(0).unwrap_err(),
        GovernanceError::EscrowNotRetired(0)
    );
    assert_eq!(
        dg.rage_quit_escrow_mut(7).unwrap_err(),
        GovernanceError::UnknownEscrow(7)
    );
}

#[test]
fn dynamic_timelock_tracks_support() {
    let (mut lido, mut dg) = setup();
    assert_eq!(dg.dynamic_timelock(&lido).unwrap(), Duration::ZERO);

    dg.lock_steth(&mut lido, &alice(), eth(10), T0).unwrap();
    assert_eq!(dg.dynamic_timelock(&lido).unwrap(), Duration::from_days(3));

    dg.lock_steth(&mut lido, &alice(), eth(45), T0).unwrap();
    assert_eq!(
        dg.rage_quit_support(&lido).unwrap(),
        PercentD16::from_basis_points(550)
    );
    assert_eq!(
        dg.dynamic_timelock(&lido).unwrap(),
        Duration::new(Duration::from_days(16).as_secs() + Duration::from_hours(12).as_secs())
    );

    dg.lock_steth(&mut lido, &bob(), eth(45), T0).unwrap();
    assert_eq!(dg.dynamic_timelock(&lido).unwrap(), Duration::from_days(30));
}

#[test]
fn support_at_first_seal_does_not_start_signalling() {
    let (mut lido, mut dg) = setup();
    dg.lock_steth(&mut lido, &alice(), eth(10), T0).unwrap();
    assert_eq!(dg.state(), GovernanceState::Normal);

    dg.lock_steth(&mut lido, &alice(), eth(1), T0).unwrap();
    assert_eq!(dg.state(), GovernanceState::VetoSignalling);
    assert_eq!(dg.state_machine().veto_signalling_activated_at(), T0);
    assert_eq!(dg.state_machine().normal_or_veto_cooldown_exited_at(), T0);

    let later = after(T0, Duration::from_days(2));
    assert_eq!(dg.veto_signalling_duration(later), Duration::from_days(2));
}

#[test]
fn proposals_follow_the_phase_gates() {
    let (mut lido, mut dg) = setup();

    let early = dg.submit_proposal(&lido, &dao(), calls(), T0).unwrap();
    assert!(matches!(
        dg.submit_proposal(&lido, &alice(), calls(), T0),
        Err(GovernanceError::UnknownProposer(_))
    ));

    // 2% support: dynamic timelock of 6 days
    dg.lock_steth(&mut lido, &alice(), eth(20), T0).unwrap();
    assert_eq!(dg.state(), GovernanceState::VetoSignalling);

    let during_signalling = after(T0, Duration::from_days(1));
    let late = dg
        .submit_proposal(&lido, &dao(), calls(), during_signalling)
        .unwrap();

    let blocked = after(T0, Duration::from_days(4));
    assert!(matches!(
        dg.schedule_proposal(&lido, early, blocked),
        Err(GovernanceError::ProposalsAdoptionSuspended { .. })
    ));
    assert!(!dg.can_schedule_proposal(early, blocked));

    let deactivation_at = just_after(T0, Duration::from_days(6));
    assert_eq!(
        dg.activate_next_state(&lido, deactivation_at).unwrap(),
        GovernanceState::VetoSignallingDeactivation
    );
    assert!(matches!(
        dg.submit_proposal(&lido, &dao(), calls(), deactivation_at),
        Err(GovernanceError::ProposalsCreationSuspended(
            GovernanceState::VetoSignallingDeactivation
        ))
    ));

    let cooldown_at = just_after(deactivation_at, Duration::from_days(3));
    assert_eq!(
        dg.activate_next_state(&lido, cooldown_at).unwrap(),
        GovernanceState::VetoCooldown
    );

    // only proposals that predate the signalling may pass the cooldown
    assert!(dg.can_schedule_proposal(early, cooldown_at));
    dg.schedule_proposal(&lido, early, cooldown_at).unwrap();
    assert!(matches!(
        dg.schedule_proposal(&lido, late, cooldown_at),
        Err(GovernanceError::ProposalsAdoptionSuspended { id, .. }) if id == late
    ));

    let executed = dg
        .execute_proposal(early, just_after(cooldown_at, Duration::from_days(2)))
        .unwrap();
    assert_eq!(executed.status, ProposalStatus::Executed);
    assert_eq!(executed.executor, admin());

    // support is still above the first seal once the cooldown ends
    let resignal_at = just_after(cooldown_at, Duration::from_days(4));
    assert_eq!(
        dg.activate_next_state(&lido, resignal_at).unwrap(),
        GovernanceState::VetoSignalling
    );
    assert_eq!(dg.state_machine().veto_signalling_activated_at(), resignal_at);
}

#[test]
fn submit_delay_is_enforced_by_the_timelock() {
    let (lido, mut dg) = setup();
    let id = dg.submit_proposal(&lido, &dao(), calls(), T0).unwrap();
    let err = dg
        .schedule_proposal(&lido, id, after(T0, Duration::from_days(1)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);
    dg.schedule_proposal(&lido, id, just_after(T0, Duration::from_days(3)))
        .unwrap();
}

#[test]
fn cancel_all_only_acts_while_signalling() {
    let (mut lido, mut dg) = setup();
    let id = dg.submit_proposal(&lido, &dao(), calls(), T0).unwrap();

    assert!(!dg.cancel_all_pending_proposals(&lido, &admin(), T0).unwrap());
    assert_eq!(dg.timelock().proposal_status(id), ProposalStatus::Submitted);

    dg.lock_steth(&mut lido, &alice(), eth(20), T0).unwrap();
    assert!(matches!(
        dg.cancel_all_pending_proposals(&lido, &alice(), T0),
        Err(GovernanceError::Unauthorized { .. })
    ));
    assert!(dg.cancel_all_pending_proposals(&lido, &admin(), T0).unwrap());
    assert_eq!(dg.timelock().proposal_status(id), ProposalStatus::Cancelled);

    dg.set_proposals_canceller(&admin(), Address::new("canceller"))
        .unwrap();
    assert!(dg
        .cancel_all_pending_proposals(&lido, &Address::new("canceller"), T0)
        .unwrap());
}

#[test]
fn admin_operations_require_the_admin_executor() {
    let (_, mut dg) = setup();
    assert!(matches!(
        dg.register_proposer(&alice(), alice(), admin()),
        Err(GovernanceError::Unauthorized { role: "admin executor", .. })
    ));
    assert_eq!(
        dg.unregister_proposer(&admin(), &dao()).unwrap_err(),
        GovernanceError::LastAdminProposer
    );

    dg.register_proposer(&admin(), Address::new("council"), admin())
        .unwrap();
    dg.unregister_proposer(&admin(), &dao()).unwrap();
    assert_eq!(dg.proposers().all().len(), 1);

    assert!(matches!(
        dg.add_tiebreaker_withdrawal_blocker(&admin(), Address::new("withdrawal-queue")),
        Err(GovernanceError::UnknownSealable(_))
    ));
}

#[test]
fn tiebreak_opens_on_a_paused_withdrawal_blocker() {
    let (mut lido, mut dg) = setup();
    let queue = Address::new("withdrawal-queue");
    let tiebreaker = Address::new("tiebreaker");
    dg.register_sealable(&admin(), queue.clone()).unwrap();
    dg.add_tiebreaker_withdrawal_blocker(&admin(), queue.clone())
        .unwrap();
    dg.set_tiebreaker_committee(&admin(), tiebreaker.clone())
        .unwrap();

    let now = enter_rage_quit(&mut lido, &mut dg);
    assert!(!dg.is_tiebreak(now));
    assert_eq!(
        dg.tiebreaker_resume_sealable(&lido, &tiebreaker, &queue, now)
            .unwrap_err(),
        GovernanceError::TiebreakNotActive
    );

    dg.sealables_mut()
        .pause_for(&queue, Duration::from_days(10), now)
        .unwrap();
    assert!(dg.is_tiebreak(now));
    assert!(matches!(
        dg.tiebreaker_resume_sealable(&lido, &alice(), &queue, now),
        Err(GovernanceError::Unauthorized { .. })
    ));

    dg.tiebreaker_resume_sealable(&lido, &tiebreaker, &queue, now)
        .unwrap();
    assert!(!dg.sealables().is_paused(&queue, now));
    assert!(!dg.is_tiebreak(now));
}

#[test]
fn tiebreak_opens_after_the_activation_timeout() {
    let (mut lido, mut dg) = setup();
    let tiebreaker = Address::new("tiebreaker");
    dg.set_tiebreaker_committee(&admin(), tiebreaker.clone())
        .unwrap();
    let id = dg.submit_proposal(&lido, &dao(), calls(), T0).unwrap();

    // the rage quit never finalizes: its batches are never processed
    enter_rage_quit(&mut lido, &mut dg);

    let timeout = Duration::from_days(365);
    let almost = after(T0, Duration::from_days(364));
    assert!(!dg.is_tiebreak(almost));
    assert!(matches!(
        dg.schedule_proposal(&lido, id, almost),
        Err(GovernanceError::ProposalsAdoptionSuspended { .. })
    ));

    let expired = after(T0, timeout);
    assert!(dg.is_tiebreak(expired));
    dg.tiebreaker_schedule_proposal(&lido, &tiebreaker, id, expired)
        .unwrap();
    assert_eq!(dg.timelock().proposal_status(id), ProposalStatus::Scheduled);
}

#[test]
fn reseal_is_refused_in_normal_state() {
    let (mut lido, mut dg) = setup();
    let queue = Address::new("withdrawal-queue");
    let committee = Address::new("reseal-committee");
    dg.register_sealable(&admin(), queue.clone()).unwrap();
    dg.sealables_mut()
        .pause_for(&queue, Duration::from_days(14), T0)
        .unwrap();

    assert!(matches!(
        dg.reseal_sealables(&lido, &committee, &[queue.clone()], T0),
        Err(GovernanceError::Unauthorized { .. })
    ));
    dg.set_reseal_committee(&admin(), committee.clone()).unwrap();
    assert_eq!(
        dg.reseal_sealables(&lido, &committee, &[queue.clone()], T0)
            .unwrap_err(),
        GovernanceError::ResealNotAllowed(GovernanceState::Normal)
    );

    dg.lock_steth(&mut lido, &alice(), eth(20), T0).unwrap();
    dg.reseal_sealables(&lido, &committee, &[queue.clone()], T0)
        .unwrap();
    assert_eq!(dg.sealables().resume_since(&queue).unwrap(), PAUSE_INFINITELY);
}

#[test]
fn failed_reseal_leaves_every_sealable_untouched() {
    let (mut lido, mut dg) = setup();
    let paused = Address::new("withdrawal-queue");
    let running = Address::new("staking-router");
    let committee = Address::new("reseal-committee");
    dg.register_sealable(&admin(), paused.clone()).unwrap();
    dg.register_sealable(&admin(), running.clone()).unwrap();
    dg.set_reseal_committee(&admin(), committee.clone()).unwrap();
    dg.sealables_mut()
        .pause_for(&paused, Duration::from_days(14), T0)
        .unwrap();
    dg.lock_steth(&mut lido, &alice(), eth(20), T0).unwrap();

    assert!(dg
        .reseal_sealables(&lido, &committee, &[paused.clone(), running], T0)
        .is_err());
    assert_eq!(
        dg.sealables().resume_since(&paused).unwrap(),
        after(T0, Duration::from_days(14))
    );
}

#[test]
fn escrow_unlock_can_end_signalling_early() {
    let (mut lido, mut dg) = setup();
    dg.lock_steth(&mut lido, &alice(), eth(20), T0).unwrap();
    assert_eq!(dg.state(), GovernanceState::VetoSignalling);

    // unlocking drops the dynamic timelock to zero; min active duration is 5h
    let unlock_at = just_after(T0, Duration::from_hours(5));
    dg.unlock_steth(&mut lido, &alice(), unlock_at).unwrap();
    assert_eq!(dg.state(), GovernanceState::VetoSignallingDeactivation);
    assert!(!dg.is_proposals_creation_allowed());
}

#[derive(Clone, Debug)]
enum Op {
    Lock { holder: usize, amount: u128 },
    Unlock { holder: usize },
    Wait(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..2, 1u128..80).prop_map(|(holder, amount)| Op::Lock { holder, amount }),
        (0usize..2).prop_map(|holder| Op::Unlock { holder }),
        (0u32..Duration::from_days(12).as_secs()).prop_map(Op::Wait),
    ]
}

proptest! {
    #[test]
    fn dynamic_timelock_is_monotone(a in 0u64..=HUNDRED, b in 0u64..=HUNDRED) {
        let config = DualGovernanceConfig::default();
        let (low, high) = (a.min(b), a.max(b));
        let low = config.dynamic_timelock(PercentD16::new(low * UNIT));
        let high = config.dynamic_timelock(PercentD16::new(high * UNIT));
        prop_assert!(low <= high);
        prop_assert!(high <= config.veto_signalling_max_duration);
    }

    /// Whatever stakers do, support stays a valid percentage, activation is
    /// idempotent and the escrow slots hold escrows in the matching state.
    #[test]
    fn escrow_slots_stay_consistent(ops in prop::collection::vec(op(), 1..40)) {
        let holders = [alice(), Address::new("whale")];
        let mut lido = NullLido::new();
        lido.submit(&alice(), eth(100));
        lido.submit(&Address::new("whale"), eth(200));
        lido.submit(&Address::new("market"), eth(700));
        let mut dg = DualGovernance::new(DualGovernanceConfig::default(), admin(), T0).unwrap();
        let mut now = T0;

        for op in ops {
            match op {
                Op::Lock { holder, amount } => {
                    let _ = dg.lock_steth(&mut lido, &holders[holder], eth(amount), now);
                }
                Op::Unlock { holder } => {
                    let _ = dg.unlock_steth(&mut lido, &holders[holder], now);
                }
                Op::Wait(secs) => now = after(now, Duration::new(secs)),
            }
            let state = dg.activate_next_state(&lido, now).unwrap();
            prop_assert_eq!(dg.activate_next_state(&lido, now).unwrap(), state);
            prop_assert!(dg.rage_quit_support(&lido).unwrap() <= PercentD16::HUNDRED_PERCENT);
            prop_assert_eq!(dg.signalling_escrow().state(), EscrowState::SignallingEscrow);
            if let Some(escrow) = dg.rage_quit_escrow() {
                prop_assert_eq!(escrow.state(), EscrowState::RageQuitEscrow);
            }
            prop_assert_eq!(
                dg.escrows_count(),
                dg.state_machine().rage_quit_escrow().map_or(1, |id| id + 2)
            );
        }
    }
}

// support sampled in 0.1% steps
const UNIT: u64 = 1_000_000_000_000_000;
const HUNDRED: u64 = 1_000;
