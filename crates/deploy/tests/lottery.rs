//! Lottery draws driven through the randomness coordinator mock.
//! Run with: cargo test --test lottery

mod common;

use std::time::Duration;

use alloy_core::primitives::U256;
use ledgerlab_deploy::contracts::{ILottery, LOTTERY, VRF_COORDINATOR_MOCK};
use ledgerlab_deploy::{
    ContractClient, DevControls, DevLedger, EventSubscription, Ledger, LedgerError, Lottery,
    LotteryState, NetworkRegistry, SubscriptionOutcome, VrfCoordinatorMock, Wallet,
};

struct Fixture {
    ledger: DevLedger,
    lottery: Lottery<DevLedger>,
    coordinator: VrfCoordinatorMock<DevLedger>,
    fee: U256,
    interval: u64,
}

async fn fixture() -> Fixture {
    let ledger = common::dev_ledger();
    let report = common::deploy_all(&ledger).await.unwrap();
    let lottery = Lottery::from_record(ledger.clone(), &report.get(LOTTERY).unwrap().record);
    let coordinator = VrfCoordinatorMock::from_record(
        ledger.clone(),
        &report.get(VRF_COORDINATOR_MOCK).unwrap().record,
    );
    let fee = lottery.entrance_fee().await.unwrap();
    let interval = lottery.interval().await.unwrap().to::<u64>();
    Fixture {
        ledger,
        lottery,
        coordinator,
        fee,
        interval,
    }
}

async fn advance(ledger: &DevLedger, seconds: u64) {
    ledger.increase_time(seconds).await.unwrap();
    ledger.mine().await.unwrap();
}

#[tokio::test]
async fn test_starts_open_with_profile_interval() {
    let Fixture {
        lottery, interval, fee, ..
    } = fixture().await;
    let params = NetworkRegistry::builtin()
        .lottery_params(31337)
        .unwrap()
        .clone();

    assert_eq!(lottery.state().await.unwrap(), LotteryState::Open);
    assert_eq!(U256::from(interval), params.interval);
    assert_eq!(fee, params.entrance_fee);
}

#[tokio::test]
async fn test_entering_requires_fee() {
    let Fixture { lottery, fee, .. } = fixture().await;

    let err = lottery.enter(fee / U256::from(100)).await.unwrap_err();
    assert_eq!(
        LedgerError::revert_reason(&err),
        Some("Lottery__InsufficientFundsForEntrace")
    );
}

#[tokio::test]
async fn test_entering_records_player_and_emits() {
    let Fixture { lottery, fee, .. } = fixture().await;

    let receipt = lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    let entered = receipt.first_event::<ILottery::LotteryEnter>().unwrap();

    assert_eq!(entered.player, DevLedger::accounts()[0]);
    assert_eq!(lottery.player(U256::ZERO).await.unwrap(), DevLedger::accounts()[0]);
    assert_eq!(lottery.number_of_players().await.unwrap(), U256::from(1));
}

#[tokio::test]
async fn test_no_entries_while_calculating() {
    let Fixture {
        ledger,
        lottery,
        fee,
        interval,
        ..
    } = fixture().await;
    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    advance(&ledger, interval + 1).await;
    lottery.perform_upkeep().await.unwrap().wait(1).await.unwrap();

    assert_eq!(lottery.state().await.unwrap(), LotteryState::Calculating);
    assert!(!lottery.check_upkeep().await.unwrap());
    let err = lottery.enter(fee).await.unwrap_err();
    assert_eq!(LedgerError::revert_reason(&err), Some("Lottery__NotOpen"));
}

#[tokio::test]
async fn test_upkeep_needs_players_and_time() {
    let Fixture {
        ledger,
        lottery,
        fee,
        interval,
        ..
    } = fixture().await;

    advance(&ledger, interval + 1).await;
    assert!(!lottery.check_upkeep().await.unwrap());

    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    assert!(lottery.check_upkeep().await.unwrap());
}

#[tokio::test]
async fn test_upkeep_waits_for_interval() {
    let Fixture {
        ledger,
        lottery,
        fee,
        interval,
        ..
    } = fixture().await;
    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    advance(&ledger, interval / 2).await;

    assert!(!lottery.check_upkeep().await.unwrap());
    let err = lottery.perform_upkeep().await.unwrap_err();
    assert_eq!(LedgerError::revert_reason(&err), Some("Lottery__UpkeepNotNeeded"));
}

#[tokio::test]
async fn test_perform_upkeep_requests_randomness() {
    let Fixture {
        ledger,
        lottery,
        fee,
        interval,
        ..
    } = fixture().await;
    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    advance(&ledger, interval + 1).await;

    let receipt = lottery.perform_upkeep().await.unwrap().wait(1).await.unwrap();
    // the coordinator logs its own request before the lottery does
    let requested = receipt.logs[1]
        .decode::<ILottery::RequestedLotteryWinner>()
        .unwrap();
    assert!(requested.requestId > U256::ZERO);
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Calculating);
}

#[tokio::test]
async fn test_fulfill_only_after_upkeep() {
    let Fixture {
        ledger,
        lottery,
        coordinator,
        fee,
        interval,
    } = fixture().await;
    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    advance(&ledger, interval + 1).await;
    let consumer = lottery.address().unwrap();

    for request_id in [0u64, 1] {
        let err = coordinator
            .fulfill_random_words(U256::from(request_id), consumer)
            .await
            .unwrap_err();
        assert_eq!(LedgerError::revert_reason(&err), Some("nonexistent request"));
    }
}

#[tokio::test]
async fn test_winner_takes_the_pot() {
    let Fixture {
        ledger,
        lottery,
        coordinator,
        fee,
        interval,
    } = fixture().await;

    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    for index in 1..4 {
        lottery
            .connect(Wallet::dev_account(index).unwrap())
            .enter(fee)
            .await
            .unwrap()
            .wait(1)
            .await
            .unwrap();
    }
    let mut starting = Vec::new();
    for player in &DevLedger::accounts()[..4] {
        starting.push((*player, ledger.balance(*player).await.unwrap()));
    }
    let started_at = lottery.timestamp().await.unwrap();
    advance(&ledger, interval + 1).await;

    let consumer = lottery.address().unwrap();
    let picked = EventSubscription::<ILottery::WinnerPicked>::subscribe(ledger.clone(), consumer)
        .await
        .unwrap();

    let receipt = lottery.perform_upkeep().await.unwrap().wait(1).await.unwrap();
    let request_id = receipt
        .first_event::<ILottery::RequestedLotteryWinner>()
        .unwrap()
        .requestId;
    coordinator
        .fulfill_random_words(request_id, consumer)
        .await
        .unwrap()
        .wait(1)
        .await
        .unwrap();

    let SubscriptionOutcome::Fired(event) = picked.next_timeout(Duration::from_secs(5)).await.unwrap()
    else {
        panic!("WinnerPicked was not emitted");
    };
    let winner = lottery.winner().await.unwrap();
    assert_eq!(event.winner, winner);

    let (_, start_balance) = starting
        .iter()
        .find(|(player, _)| *player == winner)
        .copied()
        .unwrap();
    assert_eq!(
        ledger.balance(winner).await.unwrap(),
        start_balance + fee * U256::from(4)
    );
    assert_eq!(lottery.number_of_players().await.unwrap(), U256::ZERO);
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Open);
    assert!(lottery.timestamp().await.unwrap() > started_at);
    assert_eq!(ledger.balance(consumer).await.unwrap(), U256::ZERO);
}

#[tokio::test]
async fn test_subscription_times_out_without_draw() {
    let Fixture { ledger, lottery, .. } = fixture().await;

    let picked = EventSubscription::<ILottery::WinnerPicked>::subscribe(
        ledger.clone(),
        lottery.address().unwrap(),
    )
    .await
    .unwrap();
    let outcome = picked.next_timeout(Duration::from_millis(50)).await.unwrap();
    assert!(matches!(outcome, SubscriptionOutcome::TimedOut));
}

#[tokio::test]
async fn test_watch_winner_before_entering_sees_the_draw() {
    let Fixture {
        ledger,
        lottery,
        coordinator,
        fee,
        interval,
    } = fixture().await;

    let picked = lottery.watch_winner().await.unwrap();
    lottery.enter(fee).await.unwrap().wait(1).await.unwrap();
    advance(&ledger, interval + 1).await;

    let receipt = lottery.perform_upkeep().await.unwrap().wait(1).await.unwrap();
    let request_id = receipt
        .first_event::<ILottery::RequestedLotteryWinner>()
        .unwrap()
        .requestId;
    coordinator
        .fulfill_random_words(request_id, lottery.address().unwrap())
        .await
        .unwrap()
        .wait(1)
        .await
        .unwrap();

    let event = picked
        .next_timeout(Duration::from_secs(5))
        .await
        .unwrap()
        .fired()
        .expect("WinnerPicked was not emitted");
    assert_eq!(event.winner, DevLedger::accounts()[0]);
    assert_eq!(lottery.winner().await.unwrap(), event.winner);
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Open);
}
