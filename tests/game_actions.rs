#![allow(non_snake_case)]
use pixel_pet::{
    game::{
        COOL_GLASSES,
        GameState,
        PetAction,
        PetMood,
        RemoteAction,
    },
    local_ledger::Fault,
    notify::NotificationKind,
    session::WalletSession,
    test_helpers::TestContext,
};
use std::time::Duration;

fn errors(game: &pixel_pet::game::GameController) -> Vec<String> {
    game.notifications()
        .messages(NotificationKind::Error)
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn successes(game: &pixel_pet::game::GameController) -> Vec<String> {
    game.notifications()
        .messages(NotificationKind::Success)
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn create_pet__connected_player_gets_rex_after_reconciliation() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();

    // when
    game.create_pet(&session, "Rex").await;
    assert!(game.reconcile(&session).await);

    // then
    let state = game.state();
    assert!(state.has_real_pet);
    assert_eq!(state.pet_name.as_deref(), Some("Rex"));
    assert_eq!(state.stats.hunger, 100);
    assert_eq!(state.mood(), PetMood::Happy);
    assert_eq!(successes(&game), vec!["🎉 Rex created on-chain!".to_string()]);
    assert_eq!(game.take_scheduled_syncs(), vec![Duration::ZERO]);
    assert!(ctx.ledger().pet(&ctx.address("alice")).is_some());
}

#[tokio::test]
async fn create_pet__blank_name_is_rejected_locally() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();

    // when
    game.create_pet(&session, "   ").await;

    // then
    assert_eq!(ctx.ledger().request_count(), 0);
    assert!(!game.state().has_real_pet);
    assert_eq!(errors(&game), vec!["Give your pet a name first".to_string()]);
}

#[tokio::test]
async fn feed__without_pet_is_rejected_without_remote_call() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();

    // when
    game.feed(&session).await;
    game.play(&session).await;
    game.work(&session).await;
    game.sleep(&session).await;
    game.mint_glasses(&session).await;

    // then
    assert_eq!(ctx.ledger().request_count(), 0);
    assert_eq!(errors(&game).len(), 5);
    assert!(
        errors(&game)
            .iter()
            .all(|e| e == "Please create a pet first")
    );
}

#[tokio::test]
async fn feed__without_wallet_asks_to_connect() {
    let ctx = TestContext::new();
    let session = WalletSession::new();
    let mut game = ctx.controller();

    // when
    game.feed(&session).await;
    game.create_pet(&session, "Rex").await;
    game.remove_pet(&session).await;

    // then
    assert_eq!(ctx.ledger().request_count(), 0);
    assert!(
        errors(&game)
            .iter()
            .all(|e| e == "Please connect your wallet first")
    );
}

#[tokio::test]
async fn work_and_mint__earns_coins_then_equips_glasses() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;

    // when
    game.work(&session).await;
    game.work(&session).await;
    assert_eq!(game.state().coins, 50);
    game.mint_glasses(&session).await;

    // then
    let state = game.state();
    assert_eq!(state.coins, 0);
    assert_eq!(state.inventory, vec![COOL_GLASSES.to_string()]);
    assert_eq!(state.equipped_items, vec![COOL_GLASSES.to_string()]);
    assert_eq!(state.stats.energy, 60);
    assert_eq!(state.stats.happy, 80);
}

#[tokio::test]
async fn sleep__sets_sleeping_until_another_action_reconciles() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;

    // when
    game.sleep(&session).await;

    // then
    assert!(game.state().is_sleeping);
    assert_eq!(game.mood(), PetMood::Sleeping);

    // when
    game.feed(&session).await;

    // then
    assert!(!game.state().is_sleeping);
}

#[tokio::test]
async fn remove_pet__clears_pet_coins_and_glasses() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    game.work(&session).await;
    game.work(&session).await;
    game.mint_glasses(&session).await;

    // when
    game.remove_pet(&session).await;

    // then
    let state = game.state();
    assert!(!state.has_real_pet);
    assert_eq!(state.pet_name, None);
    assert_eq!(state.coins, 0);
    assert!(state.inventory.is_empty());
    assert!(state.equipped_items.is_empty());
    assert_eq!(ctx.ledger().pet(&ctx.address("alice")), None);
}

#[tokio::test]
async fn remove_pet__without_pet_succeeds() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();

    // when
    game.remove_pet(&session).await;

    // then
    assert!(errors(&game).is_empty());
    assert_eq!(
        successes(&game),
        vec!["🗑️ Pet removed from the ledger!".to_string()]
    );
    assert!(game.take_scheduled_syncs().is_empty());
    assert!(!game.state().has_real_pet);
}

#[tokio::test]
async fn equip__requires_ownership_and_reports_duplicates() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;

    // when
    game.equip(&session, COOL_GLASSES);

    // then
    assert!(game.state().equipped_items.is_empty());
    assert_eq!(errors(&game), vec![format!("You don't own {COOL_GLASSES} yet")]);

    // given
    game.work(&session).await;
    game.work(&session).await;
    game.mint_glasses(&session).await;
    game.unequip(&session, COOL_GLASSES);
    assert!(game.state().equipped_items.is_empty());

    // when
    game.equip(&session, COOL_GLASSES);
    game.equip(&session, COOL_GLASSES);

    // then
    assert_eq!(game.state().equipped_items, vec![COOL_GLASSES.to_string()]);
    assert!(
        game.notifications()
            .messages(NotificationKind::Info)
            .contains(&"👔 Already equipped!")
    );
}

#[tokio::test]
async fn feed__failed_transaction_schedules_retry_sync() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    game.take_scheduled_syncs();
    ctx.ledger().inject(Fault::FailTransaction);

    // when
    game.feed(&session).await;

    // then
    assert_eq!(
        errors(&game),
        vec!["Feeding may be processing. Check pet status in a moment.".to_string()]
    );
    assert_eq!(game.take_scheduled_syncs(), vec![Duration::ZERO]);
    assert!(!game.is_loading());
}

#[tokio::test]
async fn feed__undecodable_response_still_counts_as_success() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    ctx.ledger().advance_time(Duration::from_secs(10 * 3600));
    ctx.ledger().inject(Fault::GarbledResponse);

    // when
    game.feed(&session).await;

    // then
    assert!(errors(&game).is_empty());
    assert!(successes(&game).contains(&"🍖 Yum! Pet fed on-chain!".to_string()));
    assert_eq!(game.state().stats.hunger, 100);
    assert!(game.take_scheduled_syncs().iter().all(|d| *d == Duration::ZERO));
}

#[tokio::test]
async fn reconcile__unreachable_ledger_keeps_state() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    let before = game.state().clone();
    ctx.ledger().inject(Fault::Unreachable);

    // when
    let synced = game.reconcile(&session).await;

    // then
    assert!(!synced);
    assert_eq!(game.state(), &before);
    assert_eq!(errors(&game), vec!["Failed to sync with the ledger".to_string()]);
}

#[tokio::test]
async fn reconcile__dead_pet_clears_flag() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;

    // when
    ctx.ledger().advance_time(Duration::from_secs(100 * 3600));
    game.reconcile(&session).await;

    // then
    assert!(!game.state().has_real_pet);

    // when
    game.create_pet(&session, "Rex II").await;

    // then
    assert!(game.state().has_real_pet);
    assert_eq!(game.state().pet_name.as_deref(), Some("Rex II"));
}

#[tokio::test]
async fn reconcile__disconnected_is_a_no_op() {
    let ctx = TestContext::new();
    let mut game = ctx.controller();

    // when
    let synced = game.reconcile(&WalletSession::new()).await;

    // then
    assert!(!synced);
    assert_eq!(ctx.ledger().request_count(), 0);
}

#[tokio::test]
async fn on_wallet_disconnected__resets_state_and_erases_snapshot() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    assert!(ctx.store().exists());

    // when
    game.on_wallet_disconnected();

    // then
    assert!(!ctx.store().exists());
    assert_eq!(
        GameState {
            last_update: 0,
            ..game.state().clone()
        },
        GameState::default()
    );
}

#[tokio::test]
async fn new__restores_snapshot_from_previous_run() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    game.work(&session).await;
    drop(game);

    // when
    let restored = ctx.controller();

    // then
    assert!(restored.state().has_real_pet);
    assert_eq!(restored.state().coins, 25);
    assert_eq!(restored.state().pet_name.as_deref(), Some("Rex"));
}

#[tokio::test]
async fn reset__returns_to_defaults() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;

    // when
    game.reset();

    // then
    assert!(!game.state().has_real_pet);
    assert_eq!(game.state().pet_name, None);
    assert_eq!(ctx.store().load().unwrap().map(|s| s.has_real_pet), Some(false));
}

#[tokio::test]
async fn actions__keep_equipped_items_within_inventory() {
    let ctx = TestContext::new();
    let session = ctx.session("bob");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;
    game.work(&session).await;
    game.work(&session).await;

    // when
    game.mint_glasses(&session).await;
    game.equip(&session, COOL_GLASSES);
    game.play(&session).await;
    game.remove_pet(&session).await;
    game.equip(&session, COOL_GLASSES);

    // then
    let state = game.state();
    for item in &state.equipped_items {
        assert!(state.inventory.contains(item));
    }
}

#[tokio::test]
async fn begin__holds_loading_state_until_complete() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();
    game.create_pet(&session, "Rex").await;

    // when
    let pending = game
        .begin(&session, RemoteAction::Pet(PetAction::Feed))
        .unwrap();

    // then
    assert!(game.is_loading());
    assert_eq!(
        game.notifications().messages(NotificationKind::Loading),
        vec!["Feeding pet on-chain..."]
    );
    assert_eq!(pending.status_message(), "Feeding pet on-chain...");
    assert_eq!(ctx.ledger().submitted_calls().len(), 1);

    // when
    game.complete(&session, pending).await;

    // then
    assert!(!game.is_loading());
    assert!(game.notifications().messages(NotificationKind::Loading).is_empty());
    assert!(successes(&game).contains(&"🍖 Yum! Pet fed on-chain!".to_string()));
    assert_eq!(ctx.ledger().submitted_calls().len(), 2);
}

#[tokio::test]
async fn begin__refused_action_never_raises_loading() {
    let ctx = TestContext::new();
    let session = ctx.session("alice");
    let mut game = ctx.controller();

    // when
    let pending = game.begin(&session, RemoteAction::Create("  ".to_string()));

    // then
    assert!(pending.is_none());
    assert!(!game.is_loading());
    assert!(game.notifications().messages(NotificationKind::Loading).is_empty());
    assert_eq!(errors(&game), vec!["Give your pet a name first".to_string()]);
}

#[tokio::test]
async fn new__drops_equipped_items_missing_from_restored_inventory() {
    let ctx = TestContext::new();
    let saved = GameState {
        has_real_pet: true,
        inventory: Vec::new(),
        equipped_items: vec![COOL_GLASSES.to_string()],
        ..GameState::default()
    };
    ctx.store().save(&saved).unwrap();

    // when
    let game = ctx.controller();

    // then
    assert!(game.state().has_real_pet);
    assert!(game.state().equipped_items.is_empty());
}
