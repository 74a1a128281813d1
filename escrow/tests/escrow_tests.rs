use dualgov_escrow::{
    EtherLedger, Escrow, EscrowError, EscrowParams, EscrowState, StEthToken, UnstEthRecordStatus,
    WithdrawalQueue, WstEthToken,
};
use dualgov_nullables::NullLido;
use dualgov_types::{Address, Duration, ETHValue, ErrorKind, PercentD16, SharesValue, Timestamp};
use proptest::prelude::*;

const ETHER: u128 = 1_000_000_000_000_000_000;

fn eth(amount: u128) -> ETHValue {
    ETHValue::new(amount * ETHER)
}

fn alice() -> Address {
    Address::new("alice")
}

fn bob() -> Address {
    Address::new("bob")
}

fn params() -> EscrowParams {
    EscrowParams {
        min_assets_lock_duration: Duration::from_hours(5),
        min_withdrawals_batch_size: 4,
    }
}

/// Alice holds 100 ether of stETH, Bob 50, the rest of the market 850.
fn setup() -> (NullLido, Escrow) {
    let mut lido = NullLido::new();
    lido.submit(&alice(), eth(100));
    lido.submit(&bob(), eth(50));
    lido.submit(&Address::new("market"), eth(850));
    (lido, Escrow::new(Address::new("escrow-1"), params()))
}

fn at(secs: u64) -> Timestamp {
    Timestamp::new(secs)
}

fn after(ts: Timestamp, d: Duration) -> Timestamp {
    ts.checked_add(d).unwrap()
}

#[test]
fn locking_steth_raises_support() {
    let (mut lido, mut escrow) = setup();
    let shares = escrow
        .lock_steth(&mut lido, &alice(), eth(30), at(10))
        .unwrap();
    assert_eq!(shares, SharesValue::new(30 * ETHER));
    assert_eq!(lido.shares_of(escrow.address()), shares);
    assert_eq!(
        escrow.rage_quit_support(&lido).unwrap(),
        PercentD16::from_percent(3)
    );
    assert_eq!(escrow.vetoer_state(&alice()).steth_locked_shares, shares);
}

#[test]
fn cannot_lock_more_than_balance() {
    let (mut lido, mut escrow) = setup();
    let err = escrow
        .lock_steth(&mut lido, &alice(), eth(101), at(10))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(escrow.locked_assets_totals().steth_locked_shares, SharesValue::ZERO);
}

#[test]
fn unlock_waits_for_min_lock_duration() {
    let (mut lido, mut escrow) = setup();
    let locked_at = at(1_000);
    escrow
        .lock_steth(&mut lido, &alice(), eth(40), locked_at)
        .unwrap();

    let boundary = after(locked_at, Duration::from_hours(5));
    let err = escrow.unlock_steth(&mut lido, &alice(), boundary).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);

    let unlocked = escrow
        .unlock_steth(&mut lido, &alice(), after(boundary, Duration::new(1)))
        .unwrap();
    assert_eq!(unlocked, SharesValue::new(40 * ETHER));
    assert_eq!(lido.shares_of(&alice()), SharesValue::new(100 * ETHER));
    assert_eq!(escrow.rage_quit_support(&lido).unwrap(), PercentD16::ZERO);
}

#[test]
fn wsteth_is_held_as_shares() {
    let mut lido = NullLido::new();
    lido.submit(&Address::new("market"), eth(90));
    let wrapped = lido.submit_wsteth(&alice(), eth(10));
    let mut escrow = Escrow::new(Address::new("escrow-1"), params());

    escrow
        .lock_wsteth(&mut lido, &alice(), wrapped, at(1))
        .unwrap();
    assert_eq!(lido.wsteth_balance_of(&alice()), SharesValue::ZERO);
    assert_eq!(lido.shares_of(escrow.address()), wrapped);
    assert_eq!(
        escrow.rage_quit_support(&lido).unwrap(),
        PercentD16::from_percent(10)
    );

    let later = after(at(1), Duration::from_days(1));
    escrow.unlock_wsteth(&mut lido, &alice(), later).unwrap();
    assert_eq!(lido.wsteth_balance_of(&alice()), wrapped);
    assert_eq!(lido.shares_of(escrow.address()), SharesValue::ZERO);
}

#[test]
fn finalized_unsteth_counts_by_claimable_ether() {
    let (mut lido, mut escrow) = setup();
    let ids = lido.request_withdrawals(&bob(), &[eth(50)]).unwrap();
    escrow.lock_unsteth(&mut lido, &bob(), &ids, at(5)).unwrap();
    assert_eq!(lido.request_owner(ids[0]), Some(escrow.address()));
    assert_eq!(
        escrow.rage_quit_support(&lido).unwrap(),
        PercentD16::from_percent(5)
    );

    lido.finalize_all();
    let (shares, finalized) = escrow.mark_unsteth_finalized(&lido, &ids).unwrap();
    assert_eq!(shares, SharesValue::new(50 * ETHER));
    assert_eq!(finalized, eth(50));
    // 50 / (950 + 50)
    assert_eq!(
        escrow.rage_quit_support(&lido).unwrap(),
        PercentD16::from_percent(5)
    );
    assert_eq!(
        escrow.unsteth_record(ids[0]).unwrap().status,
        UnstEthRecordStatus::Finalized
    );
}

#[test]
fn finalized_nfts_cannot_be_locked() {
    let (mut lido, mut escrow) = setup();
    let ids = lido.request_withdrawals(&bob(), &[eth(1)]).unwrap();
    lido.finalize_all();
    assert!(matches!(
        escrow.lock_unsteth(&mut lido, &bob(), &ids, at(5)),
        Err(EscrowError::UnstEthAlreadyFinalized(_))
    ));
    assert_eq!(lido.request_owner(ids[0]), Some(&bob()));
}

#[test]
fn full_rage_quit_pays_everyone_out() {
    let (mut lido, mut escrow) = setup();
    escrow
        .lock_steth(&mut lido, &alice(), eth(100), at(10))
        .unwrap();
    let bob_ids = lido.request_withdrawals(&bob(), &[eth(50)]).unwrap();
    escrow
        .lock_unsteth(&mut lido, &bob(), &bob_ids, at(10))
        .unwrap();

    let extension = Duration::from_days(7);
    let timelock = Duration::from_days(60);
    escrow.start_rage_quit(&lido, extension, timelock).unwrap();
    assert_eq!(escrow.state(), EscrowState::RageQuitEscrow);
    assert_eq!(escrow.batches_queue().boundary_unsteth_id(), 1);

    // signalling operations are closed now
    assert!(escrow
        .lock_steth(&mut lido, &bob(), eth(1), at(20))
        .is_err());

    assert!(matches!(
        escrow.request_next_withdrawals_batch(&mut lido, 2),
        Err(EscrowError::BatchSizeTooSmall { .. })
    ));
    let ids = escrow.request_next_withdrawals_batch(&mut lido, 4).unwrap();
    assert_eq!(ids, vec![2]);
    assert!(escrow.batches_queue().is_closed());

    let t = at(1_000);
    let err = escrow
        .claim_next_withdrawals_batch(&mut lido, 10, t)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);

    lido.finalize_all();
    let claimed = escrow
        .claim_next_withdrawals_batch(&mut lido, 10, t)
        .unwrap();
    assert_eq!(claimed, eth(100));
    assert_eq!(escrow.rage_quit_extension_delay_started_at(), t);
    assert_eq!(escrow.claim_unsteth(&mut lido, &bob_ids).unwrap(), eth(50));

    assert!(!escrow.is_rage_quit_finalized(after(t, extension)));
    assert!(escrow.is_rage_quit_finalized(after(t, Duration::new(extension.as_secs() + 1))));

    let unlock = after(after(t, extension), timelock);
    let err = escrow.withdraw_eth(&mut lido, &alice(), unlock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);

    let later = after(unlock, Duration::new(1));
    assert_eq!(escrow.withdraw_eth(&mut lido, &alice(), later).unwrap(), eth(100));
    assert_eq!(
        escrow
            .withdraw_eth_unsteth(&mut lido, &bob(), &bob_ids, later)
            .unwrap(),
        eth(50)
    );
    assert_eq!(lido.eth_balance(&alice()), eth(100));
    assert_eq!(lido.eth_balance(&bob()), eth(50));
    assert_eq!(lido.eth_balance(escrow.address()), ETHValue::ZERO);

    assert!(escrow.withdraw_eth(&mut lido, &alice(), later).is_err());
    let replay = escrow
        .withdraw_eth_unsteth(&mut lido, &bob(), &bob_ids, later)
        .unwrap_err();
    assert_eq!(replay.kind(), ErrorKind::Replay);
}

#[test]
fn empty_rage_quit_needs_explicit_extension_start() {
    let (mut lido, mut escrow) = setup();
    let pending = lido.request_withdrawals(&bob(), &[eth(1)]).unwrap();
    escrow
        .start_rage_quit(&lido, Duration::from_days(7), Duration::from_days(60))
        .unwrap();
    assert!(escrow
        .request_next_withdrawals_batch(&mut lido, 4)
        .unwrap()
        .is_empty());
    assert!(escrow.batches_queue().is_closed());

    // requests created before the rage quit must be finalized first
    let err = escrow
        .start_rage_quit_extension_delay(&lido, at(50))
        .unwrap_err();
    assert!(matches!(err, EscrowError::UnstEthNotFinalized { boundary, .. } if boundary == pending[0]));

    lido.finalize_all();
    escrow
        .start_rage_quit_extension_delay(&lido, at(50))
        .unwrap();
    assert!(matches!(
        escrow.start_rage_quit_extension_delay(&lido, at(60)),
        Err(EscrowError::ExtensionDelayAlreadyStarted)
    ));
}

#[test]
fn empty_claim_waits_for_locked_nfts_to_finalize() {
    let (mut lido, mut escrow) = setup();
    let bob_ids = lido.request_withdrawals(&bob(), &[eth(1)]).unwrap();
    escrow
        .lock_unsteth(&mut lido, &bob(), &bob_ids, at(5))
        .unwrap();
    escrow
        .start_rage_quit(&lido, Duration::from_days(7), Duration::from_days(60))
        .unwrap();
    assert!(escrow
        .request_next_withdrawals_batch(&mut lido, 4)
        .unwrap()
        .is_empty());
    assert!(escrow.batches_queue().is_closed());

    assert_eq!(
        escrow
            .claim_next_withdrawals_batch(&mut lido, 10, at(50))
            .unwrap(),
        ETHValue::ZERO
    );
    assert!(escrow.rage_quit_extension_delay_started_at().is_zero());
    assert!(!escrow.is_rage_quit_finalized(at(50_000_000)));

    lido.finalize_all();
    escrow
        .claim_next_withdrawals_batch(&mut lido, 10, at(60))
        .unwrap();
    assert_eq!(escrow.rage_quit_extension_delay_started_at(), at(60));
}

#[test]
fn large_balances_are_split_across_batches() {
    let mut lido = NullLido::with_withdrawal_limits(ETHValue::new(100), eth(10));
    lido.submit(&alice(), eth(95));
    let mut escrow = Escrow::new(Address::new("escrow-1"), params());
    escrow
        .lock_steth(&mut lido, &alice(), eth(95), at(1))
        .unwrap();
    escrow
        .start_rage_quit(&lido, Duration::ZERO, Duration::ZERO)
        .unwrap();

    let first = escrow.request_next_withdrawals_batch(&mut lido, 4).unwrap();
    assert_eq!(first.len(), 4);
    assert!(!escrow.batches_queue().is_closed());
    let second = escrow.request_next_withdrawals_batch(&mut lido, 10).unwrap();
    // five full requests plus the 5 ether remainder
    assert_eq!(second.len(), 6);
    assert!(escrow.batches_queue().is_closed());
    assert_eq!(escrow.batches_queue().batches().len(), 1);
    assert_eq!(escrow.batches_queue().total_count(), 10);
}

#[derive(Clone, Debug)]
enum Op {
    Lock { holder: usize, amount: u128 },
    Unlock { holder: usize },
    Wait(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 1u128..40).prop_map(|(holder, amount)| Op::Lock { holder, amount }),
        (0usize..3).prop_map(|holder| Op::Unlock { holder }),
        (0u32..40_000).prop_map(Op::Wait),
    ]
}

proptest! {
    /// The escrow's share balance always equals the accounted total, which
    /// always equals the sum of what holders have locked. No holder ever
    /// gains or loses shares by locking and unlocking.
    #[test]
    fn locked_shares_match_ledger(ops in prop::collection::vec(op(), 1..50)) {
        let holders = [alice(), bob(), Address::new("carol")];
        let mut lido = NullLido::new();
        let initial: Vec<SharesValue> = holders
            .iter()
            .map(|holder| lido.submit(holder, eth(200)))
            .collect();
        let mut escrow = Escrow::new(Address::new("escrow-1"), params());
        let mut now = at(1);
        for op in ops {
            match op {
                Op::Lock { holder, amount } => {
                    let _ = escrow.lock_steth(&mut lido, &holders[holder], eth(amount), now);
                }
                Op::Unlock { holder } => {
                    let _ = escrow.unlock_steth(&mut lido, &holders[holder], now);
                }
                Op::Wait(secs) => now = after(now, Duration::new(secs)),
            }
            let total = escrow.locked_assets_totals().steth_locked_shares;
            let sum: u128 = holders
                .iter()
                .map(|h| escrow.vetoer_state(h).steth_locked_shares.raw())
                .sum();
            prop_assert_eq!(lido.shares_of(escrow.address()), total);
            prop_assert_eq!(total.raw(), sum);
            for (holder, start) in holders.iter().zip(&initial) {
                let held = lido.shares_of(holder).raw();
                let locked = escrow.vetoer_state(holder).steth_locked_shares.raw();
                prop_assert_eq!(held + locked, start.raw());
            }
        }
    }

    /// Support only grows while holders lock, only shrinks while they
    /// unlock, and never leaves [0, 100%].
    #[test]
    fn support_is_monotone_and_bounded(
        locks in prop::collection::vec((0usize..3, 1u128..60), 1..20),
        unlock_order in Just(vec![0usize, 1, 2]).prop_shuffle(),
    ) {
        let holders = [alice(), bob(), Address::new("carol")];
        let (mut lido, mut escrow) = setup();
        lido.submit(&holders[2], eth(100));
        let mut now = at(1);

        let mut support = escrow.rage_quit_support(&lido).unwrap();
        prop_assert_eq!(support, PercentD16::ZERO);
        for (holder, amount) in locks {
            let _ = escrow.lock_steth(&mut lido, &holders[holder], eth(amount), now);
            let next = escrow.rage_quit_support(&lido).unwrap();
            prop_assert!(next >= support);
            prop_assert!(next <= PercentD16::HUNDRED_PERCENT);
            support = next;
            now = after(now, Duration::new(60));
        }

        now = after(now, Duration::from_hours(6));
        for holder in unlock_order {
            let _ = escrow.unlock_steth(&mut lido, &holders[holder], now);
            let next = escrow.rage_quit_support(&lido).unwrap();
            prop_assert!(next <= support);
            support = next;
        }
        prop_assert_eq!(support, PercentD16::ZERO);
    }
}
