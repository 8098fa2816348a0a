//! Shared fixture for store integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use coopledger_core::batch::UnbalancedAccount;
use coopledger_core::posting::{AccountInfo, AccountKind, EventContext, EventKind, FinancialEvent};
use coopledger_shared::config::PostingConfig;
use coopledger_shared::types::{
    AccountId, BranchId, MemberId, OrganizationId, Scope, TransactionBatchId, UserId,
};
use coopledger_store::{LedgerPoster, MemoryLedgerStore};

pub struct Fixture {
    pub store: Arc<MemoryLedgerStore>,
    pub poster: Arc<LedgerPoster<MemoryLedgerStore>>,
    pub scope: Scope,
    pub employee: UserId,
    pub cash: AccountId,
    pub bank: AccountId,
    pub savings: AccountId,
    pub time_deposit: AccountId,
    pub overage: AccountId,
    pub shortage: AccountId,
    pub interest_expense: AccountId,
    pub tax_payable: AccountId,
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn fixture() -> Fixture {
    fixture_with(PostingConfig::default()).await
}

pub async fn fixture_with(config: PostingConfig) -> Fixture {
    let store = Arc::new(MemoryLedgerStore::new());
    let scope = Scope::new(OrganizationId::new(), BranchId::new());

    let account = |name: &str, kind: AccountKind| AccountInfo::new(AccountId::new(), name, kind);
    let cash = account("Cash on Hand", AccountKind::Cash);
    let bank = account("Cash in Bank", AccountKind::CashInBank);
    let savings = account("Savings Deposits", AccountKind::Savings);
    let time_deposit = account("Time Deposits", AccountKind::TimeDeposit);
    let overage = account("Cashier Overage", AccountKind::Suspense);
    let shortage = account("Cashier Shortage", AccountKind::Receivable);
    let interest_expense = account("Interest Expense on Savings", AccountKind::Expense);
    let tax_payable = account("Withholding Tax Payable", AccountKind::Payable);

    let ids = Fixture {
        store: Arc::clone(&store),
        poster: Arc::new(LedgerPoster::new(Arc::clone(&store), config)),
        scope,
        employee: UserId::new(),
        cash: cash.id,
        bank: bank.id,
        savings: savings.id,
        time_deposit: time_deposit.id,
        overage: overage.id,
        shortage: shortage.id,
        interest_expense: interest_expense.id,
        tax_payable: tax_payable.id,
    };
    for info in [cash, bank, savings, time_deposit, overage, shortage, interest_expense, tax_payable] {
        store.add_account(info).await;
    }
    store
        .add_unbalanced_account(UnbalancedAccount::new(
            scope,
            "PHP",
            ids.cash,
            ids.shortage,
            ids.overage,
        ))
        .await;
    ids
}

impl Fixture {
    pub fn context(&self, batch: Option<TransactionBatchId>) -> EventContext {
        let ctx = EventContext::new(self.scope, self.employee, date(2024, 3, 1));
        match batch {
            Some(id) => ctx.in_batch(id),
            None => ctx,
        }
    }

    pub fn deposit(
        &self,
        member_id: MemberId,
        amount: Decimal,
        batch: Option<TransactionBatchId>,
    ) -> FinancialEvent {
        FinancialEvent::new(
            self.context(batch),
            EventKind::Deposit {
                member_id,
                savings_account: self.savings,
                cash_account: self.cash,
                amount,
            },
        )
    }

    pub fn withdrawal(
        &self,
        member_id: MemberId,
        account: AccountId,
        amount: Decimal,
        batch: Option<TransactionBatchId>,
    ) -> FinancialEvent {
        FinancialEvent::new(
            self.context(batch),
            EventKind::Withdrawal {
                member_id,
                savings_account: account,
                cash_account: self.cash,
                amount,
            },
        )
    }
}
