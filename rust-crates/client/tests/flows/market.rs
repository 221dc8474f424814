use serde_json::json;
use statecraft_client::{
    AccountAddress,
    ClientError,
    notify::Severity,
    services::MarketService,
    store::{
        EntitySet,
        FetchOrigin,
        FetchOutcome,
    },
    test_helpers::{
        FakeLedger,
        TestContext,
        item_record,
        listing_record,
        profile_record,
    },
};

const SELLER: AccountAddress = AccountAddress::new([0x5e; 32]);

#[tokio::test]
async fn listings__raw_record_maps_to_display_prices() {
    // given
    let ledger = FakeLedger::new();
    ledger.set_view(
        "market",
        "get_listings",
        json!({ "result": [[{
            "id": 1,
            "seller": "0xA",
            "item_type": { "category": 1, "quality": 2 },
            "quantity": 5,
            "price_per_unit": 150,
        }]] }),
    );
    let service = MarketService::new(ledger);

    // when
    let listings = service.listings(4).await;

    // then
    assert_eq!(listings.len(), 1);
    let listing = &listings[0];
    assert_eq!(listing.seller, "0xa".parse::<AccountAddress>().unwrap());
    assert_eq!(listing.item.item_id, 12);
    assert_eq!(listing.price_per_unit(), 1.5);
    assert_eq!(listing.total_price(), 7.5);
}

#[tokio::test]
async fn listings__columnar_and_record_responses_agree() {
    // given
    let records = FakeLedger::new();
    records.set_view(
        "market",
        "get_listings",
        json!([
            listing_record(1, SELLER, 12, 5, 150),
            listing_record(2, SELLER, 31, 1, 900),
        ]),
    );
    let columns = FakeLedger::new();
    columns.set_view(
        "market",
        "get_listings",
        json!([
            ["1", "2"],
            [SELLER.to_hex_literal(), SELLER.to_hex_literal()],
            [
                { "item_id": "12", "category": 1, "quality": 2 },
                { "item_id": "31", "category": 3, "quality": 1 },
            ],
            ["5", "1"],
            ["150", "900"],
            [4, 4],
            ["1700000000", "1700000000"],
        ]),
    );

    // when
    let from_records = MarketService::new(records).listings(4).await;
    let from_columns = MarketService::new(columns).listings(4).await;

    // then
    assert_eq!(from_records.len(), 2);
    assert_eq!(from_records, from_columns);
}

#[tokio::test]
async fn listings__malformed_response_reads_as_empty() {
    // given
    let ledger = FakeLedger::new();
    ledger.set_view("market", "get_listings", json!([["1", "2"], ["3"]]));
    let service = MarketService::new(ledger);

    // when
    let absorbed = service.listings(4).await;
    let raw = service.try_listings(4).await;

    // then
    assert!(absorbed.is_empty());
    assert!(matches!(raw, Err(ClientError::MalformedResponse(_))));
}

#[tokio::test(start_paused = true)]
async fn create_listing__moves_stock_then_reconciles_from_ledger() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_view(
        "citizen",
        "get_profile",
        json!([profile_record(ctx.player, 50, 0)]),
    );
    ctx.ledger.set_view(
        "inventory",
        "get_inventory",
        json!([item_record(3, 1, 4)]),
    );
    ctx.ledger.set_view("market", "get_listings", json!([]));
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    store.create_listing(31, 3, 900).await.unwrap();
    let patched = store.state().inventory.value()[0].quantity;
    ctx.ledger.set_view(
        "inventory",
        "get_inventory",
        json!([item_record(3, 1, 1)]),
    );
    ctx.ledger.set_view(
        "market",
        "get_listings",
        json!([listing_record(9, ctx.player, 31, 3, 900)]),
    );
    let mut updates = vec![
        store.next_event().await.unwrap(),
        store.next_event().await.unwrap(),
    ];
    updates.sort_by_key(|update| update.seq);

    // then
    assert_eq!(patched, 1);
    assert!(updates.iter().all(|u| u.origin == FetchOrigin::Reconcile));
    assert!(updates.iter().all(|u| u.outcome == FetchOutcome::Applied));
    let sets: Vec<EntitySet> = updates.iter().map(|u| u.set).collect();
    assert!(sets.contains(&EntitySet::Inventory));
    assert!(sets.contains(&EntitySet::Listings));
    assert_eq!(store.state().listings.value()[0].id, 9);
    assert_eq!(store.price_delta(31).unwrap().current, 900);
}

#[tokio::test(start_paused = true)]
async fn create_listing__more_than_held_is_refused() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_view(
        "inventory",
        "get_inventory",
        json!([item_record(3, 1, 2)]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    let result = store.create_listing(31, 3, 900).await;

    // then
    assert!(matches!(
        result,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert!(ctx.wallet.sends().is_empty());
    assert_eq!(ctx.notifier.alerts()[0].0, Severity::Warning);
}

#[tokio::test(start_paused = true)]
async fn cancel_listing__removes_own_listing_until_reconciled() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_view(
        "market",
        "get_listings",
        json!([
            listing_record(1, ctx.player, 12, 5, 150),
            listing_record(2, SELLER, 12, 5, 160),
        ]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    store.cancel_listing(1).await.unwrap();
    let foreign = store.cancel_listing(2).await;

    // then
    let ids: Vec<u64> = store.state().listings.value().iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![2]);
    assert!(matches!(
        foreign,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert_eq!(ctx.wallet.submitted_functions(), vec!["market::cancel_listing"]);
}
