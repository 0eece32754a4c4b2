use chrono::Utc;
use sea_orm::Database;

use engine::{
    BalanceReport, BalanceScope, Engine, EngineError, Group, GroupExpenseCmd, Member, MoneyCents,
    NetPosition, PersonalExpenseCmd, Transfer,
};
use migration::MigratorTrait;

struct Fixture {
    engine: Engine,
    alice: Member,
    bob: Member,
    carol: Member,
    dave: Member,
}

async fn engine_with_db() -> Fixture {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();

    let mut members = Vec::new();
    for name in ["alice", "bob", "carol", "dave"] {
        members.push(
            engine
                .register_user(name, name, "password", None)
                .await
                .unwrap(),
        );
    }
    let dave = members.pop().unwrap();
    let carol = members.pop().unwrap();
    let bob = members.pop().unwrap();
    let alice = members.pop().unwrap();
    Fixture {
        engine,
        alice,
        bob,
        carol,
        dave,
    }
}

fn cents(value: i64) -> MoneyCents {
    MoneyCents::new(value)
}

/// Alice, Bob and Carol share a group. Alice pays 30.00 for everyone, Bob
/// pays 15.00 for himself and Carol.
async fn worked_example(f: &Fixture) -> Group {
    let group = f.engine.create_group("Trip", f.alice.id).await.unwrap();
    for member in [&f.bob, &f.carol] {
        f.engine
            .add_group_member(group.id, member.id, f.alice.id)
            .await
            .unwrap();
    }
    f.engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.alice.id,
            "Groceries",
            cents(3000),
            vec![f.alice.id, f.bob.id, f.carol.id],
            Utc::now(),
        ))
        .await
        .unwrap();
    f.engine
        .create_group_expense(GroupExpenseCmd::new(
            group.id,
            f.bob.id,
            "Tickets",
            cents(1500),
            vec![f.bob.id, f.carol.id],
            Utc::now(),
        ))
        .await
        .unwrap();
    group
}

fn net_of(balances: &[engine::MemberBalance], member: &Member) -> MoneyCents {
    balances
        .iter()
        .find(|b| b.member.id == member.id)
        .map(|b| b.position.net)
        .unwrap()
}

#[tokio::test]
async fn group_positions_match_worked_example() {
    let f = engine_with_db().await;
    let group = worked_example(&f).await;

    let balances = f.engine.group_balances(group.id, f.carol.id).await.unwrap();
    assert_eq!(balances.len(), 3);
    assert_eq!(net_of(&balances, &f.alice), cents(2000));
    assert_eq!(net_of(&balances, &f.bob), cents(-250));
    assert_eq!(net_of(&balances, &f.carol), cents(-1750));

    let bob = f
        .engine
        .member_balance_in_group(group.id, f.bob.id, f.alice.id)
        .await
        .unwrap();
    assert_eq!(bob, NetPosition {
        member: f.bob.id,
        paid: cents(1500),
        owed: cents(1000),
        to_receive: cents(750),
        net: cents(-250),
    });
}

#[tokio::test]
async fn group_settlement_emits_two_transfers() {
    let f = engine_with_db().await;
    let group = worked_example(&f).await;

    let settlement = f.engine.group_settlement(group.id, f.bob.id).await.unwrap();
    assert_eq!(settlement.group_id, group.id);
    assert_eq!(settlement.transfers, vec![
        Transfer {
            from: f.carol.id,
            to: f.alice.id,
            amount: cents(1750),
        },
        Transfer {
            from: f.bob.id,
            to: f.alice.id,
            amount: cents(250),
        },
    ]);

    let again = f.engine.group_settlement(group.id, f.bob.id).await.unwrap();
    assert_eq!(settlement, again);
}

#[tokio::test]
async fn scopes_do_not_leak_into_each_other() {
    let f = engine_with_db().await;
    let group = worked_example(&f).await;
    f.engine
        .create_personal_expense(
            PersonalExpenseCmd::new(f.alice.id, "Coffee", cents(800), Utc::now())
                .participants(vec![f.alice.id, f.dave.id]),
        )
        .await
        .unwrap();

    let personal = f.engine.personal_balance(f.alice.id).await.unwrap();
    assert_eq!(personal.paid, cents(800));
    assert_eq!(personal.to_receive, cents(400));
    assert_eq!(personal.net, cents(400));

    let summaries = f.engine.group_summaries(f.alice.id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].group.id, group.id);
    assert_eq!(summaries[0].position.net, cents(2000));

    let overall = f.engine.overall_balance(f.alice.id).await.unwrap();
    assert_eq!(overall.paid, cents(3800));
    assert_eq!(overall.net, cents(2400));

    // Dave is not in the group: his overall balance only sees the coffee.
    let dave = f.engine.overall_balance(f.dave.id).await.unwrap();
    assert_eq!(dave.owed, cents(400));
    assert_eq!(dave.net, cents(-400));
    assert!(f.engine.group_summaries(f.dave.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn compute_balances_dispatches_on_scope() {
    let f = engine_with_db().await;
    let group = worked_example(&f).await;

    let report = f
        .engine
        .compute_balances(f.alice.id, BalanceScope::Overall { member: f.alice.id })
        .await
        .unwrap();
    assert_eq!(
        report,
        BalanceReport::Position(f.engine.overall_balance(f.alice.id).await.unwrap())
    );

    let report = f
        .engine
        .compute_balances(f.carol.id, BalanceScope::Group { group: group.id })
        .await
        .unwrap();
    let BalanceReport::Members(members) = report else {
        panic!("expected per-member report");
    };
    let sum: MoneyCents = members.iter().map(|m| m.position.net).sum();
    assert_eq!(sum, MoneyCents::ZERO);

    let report = f
        .engine
        .compute_balances(f.bob.id, BalanceScope::AllGroupsFor { member: f.bob.id })
        .await
        .unwrap();
    assert!(matches!(report, BalanceReport::Groups(ref groups) if groups.len() == 1));

    let report = f
        .engine
        .compute_balances(f.bob.id, BalanceScope::GroupMember {
            group: group.id,
            member: f.carol.id,
        })
        .await
        .unwrap();
    assert!(matches!(report, BalanceReport::Position(p) if p.net == cents(-1750)));
}

#[tokio::test]
async fn access_errors() {
    let f = engine_with_db().await;
    let group = worked_example(&f).await;

    assert!(matches!(
        f.engine.group_balances(group.id, f.dave.id).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        f.engine.group_settlement(group.id + 50, f.alice.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        f.engine
            .compute_balances(f.alice.id, BalanceScope::Overall { member: f.bob.id })
            .await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        f.engine
            .compute_balances(f.alice.id, BalanceScope::Group { group: -3 })
            .await,
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        f.engine
            .member_balance_in_group(group.id, f.dave.id, f.alice.id)
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        f.engine.overall_balance(4242).await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn empty_group_has_zero_positions() {
    let f = engine_with_db().await;
    let group = f.engine.create_group("Empty", f.alice.id).await.unwrap();
    f.engine
        .add_group_member(group.id, f.bob.id, f.alice.id)
        .await
        .unwrap();

    let balances = f.engine.group_balances(group.id, f.bob.id).await.unwrap();
    assert_eq!(balances.len(), 2);
    assert!(balances.iter().all(|b| b.position == NetPosition::zero(b.member.id)));

    let settlement = f.engine.group_settlement(group.id, f.alice.id).await.unwrap();
    assert!(settlement.transfers.is_empty());
}

#[tokio::test]
async fn removed_member_keeps_group_balanced() {
    let f = engine_with_db().await;
    let group = worked_example(&f).await;
    f.engine
        .remove_group_member(group.id, f.carol.id, f.alice.id)
        .await
        .unwrap();

    let balances = f.engine.group_balances(group.id, f.alice.id).await.unwrap();
    assert_eq!(balances.len(), 3);
    assert_eq!(balances[2].member.id, f.carol.id);
    let sum: MoneyCents = balances.iter().map(|b| b.position.net).sum();
    assert_eq!(sum, MoneyCents::ZERO);

    let settlement = f.engine.group_settlement(group.id, f.alice.id).await.unwrap();
    assert_eq!(settlement.transfers.len(), 2);

    assert!(matches!(
        f.engine.group_balances(group.id, f.carol.id).await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn counterparties_net_out_per_member() {
    let f = engine_with_db().await;
    worked_example(&f).await;
    f.engine
        .create_personal_expense(
            PersonalExpenseCmd::new(f.bob.id, "Snacks", cents(400), Utc::now())
                .participants(vec![f.alice.id, f.bob.id]),
        )
        .await
        .unwrap();

    let views = f.engine.counterparty_balances(f.alice.id).await.unwrap();
    let nets: Vec<(i64, MoneyCents)> = views.iter().map(|v| (v.member.id, v.net)).collect();
    assert_eq!(nets, vec![(f.bob.id, cents(800)), (f.carol.id, cents(1000))]);

    let total: MoneyCents = views.iter().map(|v| v.net).sum();
    assert_eq!(total, f.engine.overall_balance(f.alice.id).await.unwrap().net);
}
