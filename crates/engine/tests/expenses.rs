use chrono::{Duration, Utc};
use sea_orm::Database;

use engine::{
    Engine, EngineError, ExpenseScope, GroupExpenseCmd, Member, MoneyCents, PersonalExpenseCmd,
    UpdateExpenseCmd,
};
use migration::MigratorTrait;

struct Fixture {
    engine: Engine,
    alice: Member,
    bob: Member,
    carol: Member,
}

async fn engine_with_db() -> Fixture {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();

    let alice = engine
        .register_user("alice", "Alice", "password", None)
        .await
        .unwrap();
    let bob = engine
        .register_user("bob", "Bob", "password", Some("#22c55e"))
        .await
        .unwrap();
    let carol = engine
        .register_user("carol", "Carol", "password", None)
        .await
        .unwrap();
    Fixture {
        engine,
        alice,
        bob,
        carol,
    }
}

fn cents(value: i64) -> MoneyCents {
    MoneyCents::new(value)
}

#[tokio::test]
async fn group_expense_is_split_with_residue_on_first_participants() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Trip", f.alice.id).await.unwrap();
    f.engine
        .add_group_member(group.id, f.bob.id, f.alice.id)
        .await
        .unwrap();
    f.engine
        .add_group_member(group.id, f.carol.id, f.alice.id)
        .await
        .unwrap();

    let detail = f
        .engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.alice.id,
            "Dinner",
            cents(1000),
            vec![f.carol.id, f.alice.id, f.bob.id],
            Utc::now(),
        ))
        .await
        .unwrap();

    assert_eq!(detail.expense.scope, ExpenseScope::Group(group.id));
    assert_eq!(detail.expense.payer, f.alice.id);
    let shares: Vec<(i64, MoneyCents)> = detail
        .shares
        .iter()
        .map(|s| (s.member.id, s.amount))
        .collect();
    assert_eq!(shares.len(), 3);
    assert!(shares.contains(&(f.carol.id, cents(334))));
    assert!(shares.contains(&(f.alice.id, cents(333))));
    assert!(shares.contains(&(f.bob.id, cents(333))));

    let participants = f
        .engine
        .expense_participants(detail.expense.id, f.bob.id)
        .await
        .unwrap();
    let total: MoneyCents = participants.iter().map(|p| p.amount).sum();
    assert_eq!(total, cents(1000));
}

#[tokio::test]
async fn group_expense_requires_membership() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Flat", f.alice.id).await.unwrap();

    let err = f
        .engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.bob.id,
            "Rent",
            cents(50_000),
            vec![f.alice.id, f.bob.id],
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = f
        .engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.alice.id,
            "Rent",
            cents(50_000),
            vec![f.alice.id, f.bob.id],
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidInput(format!(
            "member {} does not belong to group {}",
            f.bob.id, group.id
        ))
    );

    let err = f
        .engine
        .list_group_expenses(group.id, f.carol.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = f
        .engine
        .list_group_expenses(group.id + 100, f.alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn invalid_commands_are_rejected_before_writing() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Flat", f.alice.id).await.unwrap();

    let zero = GroupExpenseCmd::new(
        group.id,
        f.alice.id,
        "Nothing",
        MoneyCents::ZERO,
        vec![f.alice.id],
        Utc::now(),
    );
    assert!(matches!(
        f.engine.create_group_expense(zero).await,
        Err(EngineError::InvalidAmount(_))
    ));

    let empty = GroupExpenseCmd::new(group.id, f.alice.id, "Alone", cents(100), vec![], Utc::now());
    assert!(matches!(
        f.engine.create_group_expense(empty).await,
        Err(EngineError::InvalidInput(_))
    ));

    let duplicate = GroupExpenseCmd::new(
        group.id,
        f.alice.id,
        "Twice",
        cents(100),
        vec![f.alice.id, f.alice.id],
        Utc::now(),
    );
    assert!(matches!(
        f.engine.create_group_expense(duplicate).await,
        Err(EngineError::InvalidInput(_))
    ));

    let blank = GroupExpenseCmd::new(group.id, f.alice.id, "  ", cents(100), vec![f.alice.id], Utc::now());
    assert!(matches!(
        f.engine.create_group_expense(blank).await,
        Err(EngineError::InvalidInput(_))
    ));

    assert!(
        f.engine
            .list_group_expenses(group.id, f.alice.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn personal_expense_visibility_and_ownership() {
    let f = engine_with_db().await;

    let solo = f
        .engine
        .create_personal_expense(PersonalExpenseCmd::new(
            f.alice.id,
            "Books",
            cents(2599),
            Utc::now(),
        ))
        .await
        .unwrap();
    assert_eq!(solo.expense.scope, ExpenseScope::Personal);
    assert_eq!(solo.shares.len(), 1);
    assert_eq!(solo.shares[0].member.id, f.alice.id);
    assert_eq!(solo.shares[0].amount, cents(2599));

    let shared = f
        .engine
        .create_personal_expense(
            PersonalExpenseCmd::new(f.alice.id, "Taxi", cents(1500), Utc::now())
                .participants(vec![f.alice.id, f.bob.id]),
        )
        .await
        .unwrap();

    // Bob takes part in the taxi, Carol in nothing.
    let bob_view = f
        .engine
        .list_personal_expenses(f.bob.id)
        .await
        .unwrap();
    assert_eq!(bob_view.len(), 1);
    assert_eq!(bob_view[0].expense.id, shared.expense.id);
    assert!(
        f.engine
            .list_personal_expenses(f.carol.id)
            .await
            .unwrap()
            .is_empty()
    );

    assert!(matches!(
        f.engine.expense(solo.expense.id, f.bob.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        f.engine
            .delete_personal_expense(shared.expense.id, f.bob.id)
            .await,
        Err(EngineError::Forbidden(_))
    ));

    f.engine
        .delete_personal_expense(shared.expense.id, f.alice.id)
        .await
        .unwrap();
    assert!(
        f.engine
            .list_personal_expenses(f.bob.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn personal_expense_participants_must_exist() {
    let f = engine_with_db().await;
    let err = f
        .engine
        .create_personal_expense(
            PersonalExpenseCmd::new(f.alice.id, "Gift", cents(1000), Utc::now())
                .participants(vec![f.alice.id, 999]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn update_recomputes_shares() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Trip", f.alice.id).await.unwrap();
    f.engine
        .add_group_member(group.id, f.bob.id, f.alice.id)
        .await
        .unwrap();

    let created = f
        .engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.alice.id,
            "Fuel",
            cents(4000),
            vec![f.alice.id, f.bob.id],
            Utc::now(),
        ))
        .await
        .unwrap();

    let updated = f
        .engine
        .update_expense(UpdateExpenseCmd {
            expense_id: created.expense.id,
            description: "Fuel and tolls".to_string(),
            total: cents(4501),
            payer_id: f.bob.id,
            participants: vec![f.bob.id, f.alice.id],
            occurred_at: None,
            requester_id: f.bob.id,
        })
        .await
        .unwrap();

    assert_eq!(updated.expense.description, "Fuel and tolls");
    assert_eq!(updated.expense.payer, f.bob.id);
    assert_eq!(updated.expense.occurred_at, created.expense.occurred_at);
    let bob_share = updated
        .shares
        .iter()
        .find(|s| s.member.id == f.bob.id)
        .unwrap();
    assert_eq!(bob_share.amount, cents(2251));
    let total: MoneyCents = updated.shares.iter().map(|s| s.amount).sum();
    assert_eq!(total, cents(4501));

    let group_after = f
        .engine
        .group_detail(group.id, f.alice.id)
        .await
        .unwrap()
        .group;
    assert!(group_after.updated_at >= group.updated_at);
}

#[tokio::test]
async fn personal_payer_cannot_change() {
    let f = engine_with_db().await;
    let created = f
        .engine
        .create_personal_expense(
            PersonalExpenseCmd::new(f.alice.id, "Lunch", cents(2000), Utc::now())
                .participants(vec![f.alice.id, f.bob.id]),
        )
        .await
        .unwrap();

    let err = f
        .engine
        .update_expense(UpdateExpenseCmd {
            expense_id: created.expense.id,
            description: "Lunch".to_string(),
            total: cents(2000),
            payer_id: f.bob.id,
            participants: vec![f.alice.id, f.bob.id],
            occurred_at: None,
            requester_id: f.alice.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn delete_removes_expense_and_shares() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Trip", f.alice.id).await.unwrap();
    f.engine
        .add_group_member(group.id, f.bob.id, f.alice.id)
        .await
        .unwrap();
    let created = f
        .engine
        .create_group_expense(
            GroupExpenseCmd::new(
                group.id,
                f.bob.id,
                "Hotel",
                cents(12_000),
                vec![f.alice.id, f.bob.id],
                Utc::now(),
            )
            .payer(f.alice.id),
        )
        .await
        .unwrap();
    assert_eq!(created.expense.payer, f.alice.id);

    assert!(matches!(
        f.engine
            .delete_personal_expense(created.expense.id, f.alice.id)
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        f.engine.delete_expense(created.expense.id, f.carol.id).await,
        Err(EngineError::Forbidden(_))
    ));

    f.engine
        .delete_expense(created.expense.id, f.bob.id)
        .await
        .unwrap();
    assert!(matches!(
        f.engine
            .expense_participants(created.expense.id, f.alice.id)
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(
        f.engine
            .list_group_expenses(group.id, f.alice.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        f.engine.overall_balance(f.alice.id).await.unwrap().net,
        MoneyCents::ZERO
    );
}

#[tokio::test]
async fn recent_and_paid_listings_are_newest_first() {
    let f = engine_with_db().await;
    let now = Utc::now();
    for days in 0..7 {
        f.engine
            .create_personal_expense(
                PersonalExpenseCmd::new(
                    f.alice.id,
                    format!("day {days}"),
                    cents(100 + days),
                    now - Duration::days(days),
                )
                .participants(vec![f.alice.id, f.bob.id]),
            )
            .await
            .unwrap();
    }

    let recent = f
        .engine
        .recent_expenses(f.bob.id, engine::DEFAULT_RECENT_LIMIT)
        .await
        .unwrap();
    let descriptions: Vec<&str> = recent.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, vec!["day 0", "day 1", "day 2", "day 3", "day 4"]);

    let newest_two = f.engine.recent_expenses(f.bob.id, 2).await.unwrap();
    assert_eq!(newest_two.len(), 2);
    assert_eq!(newest_two[0].description, "day 0");
    assert_eq!(newest_two[1].description, "day 1");
    let all = f.engine.recent_expenses(f.alice.id, 100).await.unwrap();
    assert_eq!(all.len(), 7);
    assert_eq!(all[6].description, "day 6");

    let paid = f.engine.list_expenses_paid_by(f.alice.id).await.unwrap();
    assert_eq!(paid.len(), 7);
    assert_eq!(paid[6].description, "day 6");
    assert!(f.engine.list_expenses_paid_by(f.bob.id).await.unwrap().is_empty());

    assert!(
        f.engine
            .recent_expenses(f.carol.id, 5)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        f.engine.recent_expenses(f.bob.id, 0).await,
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        f.engine.recent_expenses(f.bob.id, 101).await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn recent_expenses_with_equal_dates_prefer_latest_insert() {
    let f = engine_with_db().await;
    let at = Utc::now();
    for name in ["first", "second", "third"] {
        f.engine
            .create_personal_expense(PersonalExpenseCmd::new(f.bob.id, name, cents(500), at))
            .await
            .unwrap();
    }

    let recent = f.engine.recent_expenses(f.bob.id, 2).await.unwrap();
    let descriptions: Vec<&str> = recent.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, vec!["third", "second"]);
}

#[tokio::test]
async fn totals_above_the_cap_are_rejected() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Trip", f.alice.id).await.unwrap();
    f.engine
        .add_group_member(group.id, f.bob.id, f.alice.id)
        .await
        .unwrap();

    let huge = GroupExpenseCmd::new(
        group.id,
        f.alice.id,
        "Yacht",
        cents(i64::MAX),
        vec![f.alice.id, f.bob.id],
        Utc::now(),
    );
    assert!(matches!(
        f.engine.create_group_expense(huge).await,
        Err(EngineError::InvalidAmount(_))
    ));

    let created = f
        .engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.alice.id,
            "Yacht",
            MoneyCents::MAX_TOTAL,
            vec![f.alice.id, f.bob.id],
            Utc::now(),
        ))
        .await
        .unwrap();
    let settlement = f
        .engine
        .group_settlement(group.id, f.alice.id)
        .await
        .unwrap();
    assert_eq!(settlement.transfers.len(), 1);
    assert_eq!(settlement.transfers[0].from, f.bob.id);
    assert_eq!(settlement.transfers[0].amount, cents(1 << 52));

    let err = f
        .engine
        .update_expense(UpdateExpenseCmd {
            expense_id: created.expense.id,
            description: "Yacht".to_string(),
            total: cents((1 << 53) + 1),
            payer_id: f.alice.id,
            participants: vec![f.alice.id, f.bob.id],
            occurred_at: None,
            requester_id: f.alice.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let personal = PersonalExpenseCmd::new(f.bob.id, "Island", cents(i64::MAX), Utc::now());
    assert!(matches!(
        f.engine.create_personal_expense(personal).await,
        Err(EngineError::InvalidAmount(_))
    ));
}
