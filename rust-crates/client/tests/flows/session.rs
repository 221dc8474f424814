use serde_json::json;
use statecraft_client::{
    AccountAddress,
    ClientError,
    config::SessionConfig,
    notify::Severity,
    price_history::InMemoryPriceHistory,
    services::Services,
    store::{
        EntitySet,
        Phase,
        Store,
    },
    test_helpers::{
        FakeLedger,
        FakeWallet,
        RecordingNotifier,
        TestContext,
        profile_record,
        reward_record,
    },
};

fn ledger_with_profile(ledger: &FakeLedger, player: AccountAddress, game_balance: u64) {
    ledger.set_view(
        "citizen",
        "get_profile",
        json!([profile_record(player, 50, game_balance)]),
    );
}

#[tokio::test(start_paused = true)]
async fn train__without_wallet_reports_unavailable_once() {
    // given
    let player = AccountAddress::new([0xa1; 32]);
    let ledger = FakeLedger::new();
    ledger_with_profile(&ledger, player, 0);
    let notifier = RecordingNotifier::new();
    let mut store = Store::new(
        Services::new(ledger),
        notifier.clone(),
        InMemoryPriceHistory::new(),
        SessionConfig::new(player, 4),
    );
    store.refresh_all().await;

    // when
    let result = store.train().await;

    // then
    assert_eq!(result, Err(ClientError::WalletUnavailable));
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, Severity::Error);
}

#[tokio::test(start_paused = true)]
async fn train__wallet_connects_on_demand() {
    // given
    let player = AccountAddress::new([0xa1; 32]);
    let wallet = FakeWallet::connects_as(player);
    let ledger = FakeLedger::with_wallet(wallet.clone());
    ledger_with_profile(&ledger, player, 0);
    let mut store = Store::new(
        Services::new(ledger),
        RecordingNotifier::new(),
        InMemoryPriceHistory::new(),
        SessionConfig::new(player, 4),
    );
    store.refresh_all().await;

    // when
    let result = store.train().await;

    // then
    assert!(result.is_ok());
    assert_eq!(wallet.descriptors()[0].sender, player);
}

#[tokio::test(start_paused = true)]
async fn train__disconnected_wallet_sends_nothing() {
    // given
    let player = AccountAddress::new([0xa1; 32]);
    let wallet = FakeWallet::disconnected();
    let ledger = FakeLedger::with_wallet(wallet.clone());
    ledger_with_profile(&ledger, player, 0);
    let mut store = Store::new(
        Services::new(ledger),
        RecordingNotifier::new(),
        InMemoryPriceHistory::new(),
        SessionConfig::new(player, 4),
    );
    store.refresh_all().await;

    // when
    let result = store.train().await;

    // then
    assert_eq!(result, Err(ClientError::NoAccountConnected));
    assert!(wallet.sends().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refresh_all__unreachable_node_leaves_sets_unloaded() {
    // given
    let ctx = TestContext::new();
    let mut store = ctx.store(4);

    // when
    let updates = store.refresh_all().await;

    // then
    assert_eq!(updates.len(), EntitySet::MOUNTED.len());
    for set in EntitySet::MOUNTED {
        assert_eq!(store.state().phase(set), Phase::Unloaded);
    }
    assert!(ctx.notifier.alerts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn claim_reward__credits_balance_and_drops_reward() {
    // given
    let ctx = TestContext::new();
    ledger_with_profile(&ctx.ledger, ctx.player, 1_000);
    ctx.ledger.set_view(
        "treasury",
        "get_pending_rewards",
        json!([reward_record(1, 250, 0), reward_record(2, 900, 4_000_000_000)]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    store.claim_reward(1).await.unwrap();
    let locked = store.claim_reward(2).await;

    // then
    assert_eq!(
        store.state().profile().unwrap().game_balance.atomic,
        1_250
    );
    let remaining: Vec<u64> = store.state().rewards.value().iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![2]);
    assert!(matches!(
        locked,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn donate__moves_funds_to_country_treasury() {
    // given
    let ctx = TestContext::new();
    ledger_with_profile(&ctx.ledger, ctx.player, 1_000);
    ctx.ledger.set_view(
        "territory",
        "get_country",
        json!([4, "Avalon", { "vec": [] }, "5000", 500, 1000, 1500, 3]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    store.donate(400).await.unwrap();
    let too_much = store.donate(700).await;

    // then
    assert_eq!(store.state().profile().unwrap().game_balance.atomic, 600);
    let country = store.state().country.value().as_ref().unwrap();
    assert_eq!(country.treasury.atomic, 5_400);
    assert_eq!(country.name, "Avalon");
    assert!(matches!(
        too_much,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn travel__to_current_region_is_refused() {
    // given
    let ctx = TestContext::new();
    ledger_with_profile(&ctx.ledger, ctx.player, 0);
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    let same = store.travel(9).await;
    store.travel(10).await.unwrap();

    // then
    assert!(matches!(
        same,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert_eq!(store.state().profile().unwrap().region_id, Some(10));
}

#[tokio::test(start_paused = true)]
async fn apply_job__sets_employer_then_refuses_second_job() {
    // given
    let ctx = TestContext::new();
    ledger_with_profile(&ctx.ledger, ctx.player, 0);
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    store.apply_job(21).await.unwrap();
    let second = store.apply_job(22).await;
    let worked = store.work().await;

    // then
    assert_eq!(store.state().profile().unwrap().employer_id, Some(21));
    assert!(matches!(
        second,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert!(worked.is_ok());
    assert_eq!(store.state().profile().unwrap().energy, 40);
}

#[tokio::test(start_paused = true)]
async fn add_friend__refuses_self_and_duplicates() {
    // given
    let ctx = TestContext::new();
    let friend = AccountAddress::new([0x77; 32]);
    ctx.ledger.set_view(
        "social",
        "get_friends",
        json!([{ "address": friend.to_hex_literal(), "username": "ally" }]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    let myself = store.add_friend(ctx.player).await;
    let duplicate = store.add_friend(friend).await;
    store.add_friend(AccountAddress::new([0x78; 32])).await.unwrap();

    // then
    assert!(matches!(
        myself,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert!(matches!(
        duplicate,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert_eq!(store.state().friends.value().len(), 2);
    assert_eq!(ctx.notifier.alerts().len(), 2);
}
