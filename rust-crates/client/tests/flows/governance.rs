use serde_json::json;
use statecraft_client::{
    ClientError,
    encoding::Decoder,
    proposal::{
        ProposalArgs,
        TaxKind,
        decode_payload,
        encode_payload,
    },
    test_helpers::{
        TestContext,
        proposal_record,
    },
};

#[tokio::test(start_paused = true)]
async fn propose__placeholder_shows_until_ledger_assigns_id() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_view(
        "governance",
        "get_proposals",
        json!([proposal_record(7, 2, false)]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;
    let args = ProposalArgs::SetTaxRate {
        tax: TaxKind::Import,
        rate_bps: 1_250,
    };

    // when
    store.propose(args.clone()).await.unwrap();
    let pending: Vec<u64> = store.state().proposals.value().iter().map(|p| p.id).collect();
    let placeholder = store.state().proposals.value()[1].clone();
    ctx.ledger.set_view(
        "governance",
        "get_proposals",
        json!([proposal_record(7, 2, false), proposal_record(8, 0, false)]),
    );
    store.next_event().await.unwrap();

    // then
    assert_eq!(pending, vec![7, 0]);
    assert_eq!(placeholder.payload, encode_payload(&args).unwrap());
    assert_eq!(placeholder.args, Some(args));
    let ids: Vec<u64> = store.state().proposals.value().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn propose__payload_decodes_back_to_arguments() {
    // given
    let ctx = TestContext::new();
    let mut store = ctx.store(4);
    let args = ProposalArgs::SetWelcomeMessage {
        message: "Welcome, citizen".to_string(),
    };

    // when
    store.propose(args.clone()).await.unwrap();

    // then
    let descriptor = &ctx.wallet.descriptors()[0];
    assert_eq!(descriptor.function_name, "create_proposal");
    assert_eq!(descriptor.encoded_args[0], 4u64.to_le_bytes().to_vec());
    assert_eq!(descriptor.encoded_args[1], vec![args.type_id()]);
    let payload = Decoder::new(&descriptor.encoded_args[2]).read_bytes().unwrap();
    assert_eq!(decode_payload(args.type_id(), &payload).unwrap(), args);
}

#[tokio::test(start_paused = true)]
async fn propose__without_country_is_refused() {
    // given
    let ctx = TestContext::new();
    let mut store = ctx.store(0);

    // when
    let result = store.propose(ProposalArgs::PrintMoney { amount: 10 }).await;

    // then
    assert!(matches!(
        result,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert!(ctx.wallet.descriptors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn execute_proposal__marks_executed_and_reconciles_country() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_view(
        "governance",
        "get_proposals",
        json!([proposal_record(7, 12, false)]),
    );
    let mut store = ctx.store(4);
    store.refresh_all().await;

    // when
    store.execute_proposal(7).await.unwrap();
    let again = store.execute_proposal(7).await;

    // then
    assert!(store.state().proposals.value()[0].executed);
    assert!(matches!(
        again,
        Err(ClientError::DomainPreconditionFailure(_))
    ));
    assert_eq!(
        ctx.wallet.submitted_functions(),
        vec!["governance::execute_proposal"]
    );
}
