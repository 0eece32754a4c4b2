//! Conversions from engine values to API views.

use api_types::{
    Amount,
    balance::{
        CounterpartyView, GroupBalanceView, GroupSettlementView, MemberBalanceView,
        NetPositionView, TransferView,
    },
    dashboard::{DashboardView, GroupOverviewView, RecentGroupExpenseView},
    expense::{ExpenseDetail, ExpenseView, ShareView},
    group::{GroupDetail, GroupView, MemberView},
    user::UserView,
};
use engine::MoneyCents;

pub(crate) fn amount(value: MoneyCents) -> Amount {
    Amount::from(value.cents())
}

pub(crate) fn map_currency(currency: engine::Currency) -> api_types::Currency {
    match currency {
        engine::Currency::Eur => api_types::Currency::Eur,
    }
}

pub(crate) fn parse_currency(currency: Option<api_types::Currency>) -> engine::Currency {
    match currency.unwrap_or_default() {
        api_types::Currency::Eur => engine::Currency::Eur,
    }
}

pub(crate) fn user_view(member: engine::Member) -> UserView {
    UserView {
        id: member.id,
        username: member.username,
        display_name: member.display_name,
        avatar_color: member.avatar_color,
    }
}

pub(crate) fn group_view(group: engine::Group) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name,
        owner_id: group.owner_id,
        created_at: group.created_at,
        updated_at: group.updated_at,
    }
}

pub(crate) fn group_detail(detail: engine::GroupDetail) -> GroupDetail {
    GroupDetail {
        group: group_view(detail.group),
        members: detail
            .members
            .into_iter()
            .map(|m| MemberView {
                member: user_view(m.member),
                role: m.role.as_str().to_string(),
                added_at: m.added_at,
            })
            .collect(),
    }
}

pub(crate) fn expense_view(expense: engine::Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        group_id: expense.scope.group_id(),
        payer_id: expense.payer,
        description: expense.description,
        amount: amount(expense.total),
        currency: map_currency(expense.currency),
        occurred_at: expense.occurred_at,
    }
}

pub(crate) fn share_view(share: engine::ParticipantShare) -> ShareView {
    ShareView {
        member: user_view(share.member),
        amount: amount(share.amount),
    }
}

pub(crate) fn expense_detail(detail: engine::ExpenseDetail) -> ExpenseDetail {
    ExpenseDetail {
        expense: expense_view(detail.expense),
        shares: detail.shares.into_iter().map(share_view).collect(),
    }
}

pub(crate) fn position_view(position: engine::NetPosition) -> NetPositionView {
    NetPositionView {
        member_id: position.member,
        paid: amount(position.paid),
        owed: amount(position.owed),
        to_receive: amount(position.to_receive),
        net: amount(position.net),
    }
}

pub(crate) fn member_balance(balance: engine::MemberBalance) -> MemberBalanceView {
    MemberBalanceView {
        member: user_view(balance.member),
        position: position_view(balance.position),
    }
}

pub(crate) fn group_balance(balance: engine::GroupBalance) -> GroupBalanceView {
    GroupBalanceView {
        group: group_view(balance.group),
        position: position_view(balance.position),
    }
}

pub(crate) fn settlement(settlement: engine::GroupSettlement) -> GroupSettlementView {
    GroupSettlementView {
        group_id: settlement.group_id,
        balances: settlement
            .balances
            .into_iter()
            .map(member_balance)
            .collect(),
        transfers: settlement
            .transfers
            .into_iter()
            .map(|t| TransferView {
                from: t.from,
                to: t.to,
                amount: amount(t.amount),
            })
            .collect(),
    }
}

pub(crate) fn counterparty(view: engine::CounterpartyView) -> CounterpartyView {
    CounterpartyView {
        member: user_view(view.member),
        net: amount(view.net),
    }
}

pub(crate) fn dashboard(dashboard: engine::Dashboard) -> DashboardView {
    DashboardView {
        total_paid: amount(dashboard.total_paid),
        active_groups: dashboard.active_groups,
        position: position_view(dashboard.position),
        groups: dashboard
            .groups
            .into_iter()
            .map(|g| GroupOverviewView {
                group: group_view(g.group),
                members_count: g.members_count,
                last_expense: g.last_expense.map(expense_view),
            })
            .collect(),
        recent: dashboard
            .recent
            .into_iter()
            .map(|r| RecentGroupExpenseView {
                expense: expense_view(r.expense),
                payer: user_view(r.payer),
            })
            .collect(),
    }
}
