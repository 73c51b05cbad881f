#![allow(non_snake_case)]
use pixel_pet::{
    gateway::{
        GatewayError,
        SubmissionOutcome,
        SubmissionStage,
    },
    ledger::{
        ContractFunction,
        LedgerError,
    },
    local_ledger::{
        Fault,
        LocalLedger,
        PET_NOT_FOUND,
    },
    test_helpers::TestContext,
};

#[tokio::test]
async fn create_pet__returns_simulated_pet_and_commits_it() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");

    // when
    let (pet, submission) = gateway.create_pet(&alice, "Rex").await.unwrap();

    // then
    assert_eq!(pet.name, "Rex");
    assert!(pet.is_alive);
    assert_eq!(submission.outcome, SubmissionOutcome::Confirmed);
    assert_eq!(ctx.ledger().pet(alice.address()), Some(pet));
    assert_eq!(ctx.ledger().submitted_calls().len(), 1);
    assert_eq!(
        ctx.ledger().submitted_calls()[0].function,
        ContractFunction::Create
    );
}

#[tokio::test]
async fn invoke__polls_until_the_transaction_lands() {
    let ctx = TestContext::with_ledger(LocalLedger::new().with_pending_polls(2));
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    gateway.create_pet(&alice, "Rex").await.unwrap();

    // when
    let submission = gateway.feed(&alice).await.unwrap();

    // then
    assert_eq!(submission.polls, 3);
    assert_eq!(
        submission.trace,
        vec![
            SubmissionStage::Building,
            SubmissionStage::Signing,
            SubmissionStage::Submitting,
            SubmissionStage::Pending,
            SubmissionStage::Polling,
            SubmissionStage::Success,
        ]
    );
    assert!(!submission.hash.is_empty());
}

#[tokio::test]
async fn invoke__rejected_submission_fails() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    gateway.create_pet(&alice, "Rex").await.unwrap();
    ctx.ledger().inject(Fault::RejectSubmission);

    // when
    let err = gateway.play(&alice).await.unwrap_err();

    // then
    assert!(matches!(err, GatewayError::Rejected { .. }), "{err}");
    assert_eq!(ctx.ledger().submitted_calls().len(), 1);
}

#[tokio::test]
async fn invoke__failed_transaction_fails() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    gateway.create_pet(&alice, "Rex").await.unwrap();
    ctx.ledger().inject(Fault::FailTransaction);

    // when
    let err = gateway.sleep(&alice).await.unwrap_err();

    // then
    assert!(matches!(err, GatewayError::TransactionFailed { .. }), "{err}");
}

#[tokio::test]
async fn invoke__garbled_response_after_submission_is_assumed_confirmed() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    gateway.create_pet(&alice, "Rex").await.unwrap();
    ctx.ledger().inject(Fault::GarbledResponse);

    // when
    let submission = gateway.work(&alice).await.unwrap();

    // then
    assert!(matches!(
        submission.outcome,
        SubmissionOutcome::AssumedConfirmed { .. }
    ));
    assert_eq!(submission.trace.last(), Some(&SubmissionStage::Success));
    assert_eq!(ctx.ledger().coins(alice.address()), 25);
}

#[tokio::test]
async fn invoke__garbled_status_after_polling_keeps_poll_count() {
    let ctx = TestContext::with_ledger(LocalLedger::new().with_pending_polls(2));
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    gateway.create_pet(&alice, "Rex").await.unwrap();
    ctx.ledger().inject(Fault::GarbledStatus);

    // when
    let submission = gateway.play(&alice).await.unwrap();

    // then
    assert!(matches!(
        submission.outcome,
        SubmissionOutcome::AssumedConfirmed { .. }
    ));
    assert_eq!(submission.polls, 3);
    assert_eq!(submission.trace.last(), Some(&SubmissionStage::Success));
}

#[tokio::test]
async fn create_pet__undecodable_simulation_fails_before_signing() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    ctx.ledger().inject(Fault::MalformedSimulation);

    // when
    let err = gateway.create_pet(&alice, "Rex").await.unwrap_err();

    // then
    assert!(matches!(
        err,
        GatewayError::Build {
            function: ContractFunction::Create,
            source: LedgerError::Decode(_),
        }
    ));
    assert!(ctx.ledger().submitted_calls().is_empty());
    assert_eq!(ctx.ledger().pet(alice.address()), None);
}

#[tokio::test]
async fn invoke__unreachable_ledger_fails_during_build() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    ctx.ledger().inject(Fault::Unreachable);

    // when
    let err = gateway.feed(&alice).await.unwrap_err();

    // then
    assert!(matches!(
        err,
        GatewayError::Build {
            function: ContractFunction::Feed,
            source: LedgerError::Transport(_),
        }
    ));
    assert!(ctx.ledger().submitted_calls().is_empty());
}

#[tokio::test]
async fn invoke__contract_refusal_surfaces_at_simulation() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");

    // when
    let err = gateway.work(&alice).await.unwrap_err();

    // then
    match err {
        GatewayError::Build {
            source: LedgerError::Contract(reason),
            ..
        } => assert_eq!(reason, PET_NOT_FOUND),
        other => panic!("unexpected error: {other}"),
    }
    assert!(ctx.ledger().submitted_calls().is_empty());
}

#[tokio::test]
async fn fetch__missing_pet_reads_as_none_and_zero_coins() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let owner = ctx.address("bob");

    // when
    let pet = gateway.fetch_pet(&owner).await.unwrap();
    let coins = gateway.fetch_coins(&owner).await.unwrap();

    // then
    assert_eq!(pet, None);
    assert_eq!(coins, 0);
}

#[tokio::test]
async fn fetch_pet__transport_failure_propagates() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    ctx.ledger().inject(Fault::Unreachable);

    // when
    let result = gateway.fetch_pet(&ctx.address("bob")).await;

    // then
    assert!(matches!(
        result,
        Err(GatewayError::Ledger(LedgerError::Transport(_)))
    ));
}

#[tokio::test]
async fn invoke__pets_are_scoped_to_their_owner() {
    let ctx = TestContext::new();
    let gateway = ctx.gateway();
    let alice = ctx.wallet("alice");
    let bob = ctx.wallet("bob");
    gateway.create_pet(&alice, "Rex").await.unwrap();

    // when
    let bob_pet = gateway.fetch_pet(bob.address()).await.unwrap();
    let err = gateway.feed(&bob).await.unwrap_err();

    // then
    assert_eq!(bob_pet, None);
    assert!(matches!(err, GatewayError::Build { .. }));
    assert!(gateway.fetch_pet(alice.address()).await.unwrap().is_some());
}
