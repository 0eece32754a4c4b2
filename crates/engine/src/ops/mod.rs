use std::{future::Future, pin::Pin};

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::ResultEngine;

mod access;
mod balances;
mod dashboard;
mod expenses;
mod groups;
mod source;
mod users;

pub use access::MemberRole;
pub use balances::{
    BalanceReport, BalanceScope, CounterpartyView, GroupBalance, GroupSettlement, MemberBalance,
};
pub use dashboard::{DASHBOARD_RECENT_LIMIT, Dashboard, GroupOverview, RecentGroupExpense};
pub use expenses::{DEFAULT_RECENT_LIMIT, ExpenseDetail, ParticipantShare};
pub use groups::{GroupDetail, GroupMember};
use source::{ExpenseFilter, ShareFilter};
pub use users::{DEFAULT_AVATAR_COLOR, MIN_PASSWORD_LEN};

/// Future returned by the body of [`Engine::with_tx`].
type TxFuture<'a, T> = Pin<Box<dyn Future<Output = ResultEngine<T>> + Send + 'a>>;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Run `body` inside a DB transaction, committing on success. On error
    /// the transaction is dropped, which rolls it back.
    ///
    /// Reads go through here too, so one balance query sees a single snapshot
    /// of the ledger.
    pub(crate) async fn with_tx<T, F>(&self, body: F) -> ResultEngine<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a Engine, &'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
    {
        let db_tx = self.database.begin().await?;
        let value = body(self, &db_tx).await?;
        db_tx.commit().await?;
        Ok(value)
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
