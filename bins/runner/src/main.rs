//! Coopledger runner
//!
//! Runs one cashier day against the in-memory store: opens a batch, posts
//! deposits, a withdrawal and a loan release, closes the batch and runs
//! savings interest for the month.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coopledger_core::amortization::{AmortizationBuilder, LoanAccounts, LoanPolicy};
use coopledger_core::batch::{Remittance, RemittanceKind, UnbalancedAccount};
use coopledger_core::posting::{AccountInfo, AccountKind, EventContext, EventKind, FinancialEvent};
use coopledger_core::rates::{
    AccountPolicy, AccountPolicyConfig, ComputationType, LoanModeOfPayment, RateResolver,
};
use coopledger_core::savings::{
    SavingsComputationType, SavingsInterestGenerator, SavingsProduct, SavingsRunRequest,
};
use coopledger_shared::EngineConfig;
use coopledger_shared::config::LoggingConfig;
use coopledger_shared::types::{
    AccountId, BranchId, LoanTransactionId, MemberId, OrganizationId, Scope, UserId,
};
use coopledger_store::{
    BatchReconciler, LedgerPoster, MemoryLedgerStore, SavingsInterestService,
};

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.clone().into());
    let json = logging.json.then(|| tracing_subscriber::fmt::layer().json());
    let plain = (!logging.json).then(|| tracing_subscriber::fmt::layer());
    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

fn account(name: &str, kind: AccountKind) -> AccountInfo {
    AccountInfo::new(AccountId::new(), name, kind)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = EngineConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let store = Arc::new(MemoryLedgerStore::new());
    let poster = Arc::new(LedgerPoster::new(Arc::clone(&store), config.posting.clone()));
    let reconciler = BatchReconciler::new(Arc::clone(&poster));
    let savings_service = SavingsInterestService::new(
        Arc::clone(&poster),
        SavingsInterestGenerator::new(config.branch.settings()),
    );

    let scope = Scope::new(OrganizationId::new(), BranchId::new());
    let teller = UserId::new();
    let today = NaiveDate::from_ymd_opt(2024, 1, 2).context("invalid date")?;

    // Chart of accounts
    let cash = account("Cash on Hand", AccountKind::Cash);
    let savings = account("Savings Deposits", AccountKind::Savings);
    let overage = account("Cashier Overage", AccountKind::Suspense);
    let shortage = account("Cashier Shortage", AccountKind::Receivable);
    let interest_expense = account("Interest Expense on Savings", AccountKind::Expense);
    let tax_payable = account("Withholding Tax Payable", AccountKind::Payable);
    let receivable = account("Loans Receivable", AccountKind::Receivable);
    let interest_receivable = account("Interest Receivable", AccountKind::Receivable);
    let interest_income = account("Interest Income", AccountKind::Income);
    let unearned_interest = account("Unearned Interest", AccountKind::Income);
    let fines_receivable = account("Fines Receivable", AccountKind::Receivable);
    let unearned_fines = account("Unearned Fines", AccountKind::Income);

    let loan_accounts = LoanAccounts {
        loan_receivable: receivable.id,
        interest_receivable: interest_receivable.id,
        interest_income: interest_income.id,
        unearned_interest: unearned_interest.id,
        fines_receivable: fines_receivable.id,
        unearned_fines: unearned_fines.id,
        cash: cash.id,
    };
    let product = SavingsProduct {
        account_id: savings.id,
        interest_rate: dec!(3),
        rate_table: None,
        minimum_balance: dec!(500),
        below_minimum_charge: dec!(25),
        taxable: true,
        interest_expense_account: interest_expense.id,
        tax_payable_account: tax_payable.id,
    };
    store
        .add_unbalanced_account(UnbalancedAccount::new(
            scope,
            config.branch.currency.clone(),
            cash.id,
            shortage.id,
            overage.id,
        ))
        .await;
    for info in [
        cash.clone(),
        savings.clone(),
        overage,
        shortage,
        interest_expense,
        tax_payable,
        receivable.clone(),
        interest_receivable,
        interest_income,
        unearned_interest,
        fines_receivable,
        unearned_fines,
    ] {
        store.add_account(info).await;
    }

    // Cashier session
    let batch = reconciler
        .open_batch(scope, teller, &config.branch.currency, today)
        .await?;
    reconciler.record_funding(batch.id, dec!(20000)).await?;

    let ctx = EventContext::new(scope, teller, today).in_batch(batch.id);
    let members: Vec<MemberId> = (0..3).map(|_| MemberId::new()).collect();
    for (member, amount) in members.iter().zip([dec!(36500), dec!(12000), dec!(300)]) {
        poster
            .post(&FinancialEvent::new(
                ctx.clone().with_description("Cash deposit"),
                EventKind::Deposit {
                    member_id: *member,
                    savings_account: savings.id,
                    cash_account: cash.id,
                    amount,
                },
            ))
            .await?;
    }
    poster
        .post(&FinancialEvent::new(
            ctx.clone().with_description("Cash withdrawal"),
            EventKind::Withdrawal {
                member_id: members[1],
                savings_account: savings.id,
                cash_account: cash.id,
                amount: dec!(2000),
            },
        ))
        .await?;

    let policy = AccountPolicy::from_config(AccountPolicyConfig::new(
        receivable.id,
        ComputationType::Diminishing,
        dec!(12),
    ))?;
    let loan = LoanPolicy {
        policy,
        accounts: loan_accounts,
        automatic_deductions: Vec::new(),
        charges_schemes: Vec::new(),
        member_type_id: None,
        released_on: today,
        previous_balance: rust_decimal::Decimal::ZERO,
    };
    let entries = AmortizationBuilder::new(RateResolver::new(config.branch.annual_divisor))
        .build_entries(&loan, dec!(9000), 3, LoanModeOfPayment::Monthly)?;
    info!(
        proceeds = %entries.proceeds,
        total_interest = %entries.total_interest,
        periods = entries.schedule.len(),
        "Loan entries built"
    );
    poster
        .post(&FinancialEvent::new(
            ctx.clone().with_description("Loan release"),
            EventKind::LoanDisbursement {
                member_id: members[0],
                loan_transaction_id: LoanTransactionId::new(),
                accounts: loan_accounts,
                entries,
            },
        ))
        .await?;

    // Supposed: 20000 + 48800 - 2000 - 9000 = 57800; counted 57850.
    reconciler.record_cash_count(batch.id, dec!(1000), 50).await?;
    reconciler.record_cash_count(batch.id, dec!(50), 1).await?;
    reconciler
        .record_remittance(
            batch.id,
            Remittance {
                kind: RemittanceKind::Online,
                amount: dec!(7800),
                reference_number: Some("GCASH-0001".into()),
            },
        )
        .await?;
    let report = reconciler.close(batch.id, teller).await?;
    info!(
        status = %report.status,
        difference = %report.totals.difference(),
        variance_rows = report.variance_rows.len(),
        "Cashier session closed"
    );

    // Month-end savings interest
    let request = SavingsRunRequest {
        scope,
        document_no: "SI-2024-01".into(),
        last_computation_date: today,
        new_computation_date: NaiveDate::from_ymd_opt(2024, 2, 2).context("invalid date")?,
        computation_type: SavingsComputationType::AverageDailyBalance,
        interest_tax_rate: None,
        member_type_id: None,
        include_closed_account: false,
        employee_user_id: teller,
    };
    let run = savings_service.generate(request, &product).await?;
    let rows = savings_service.post(run.id, &product).await?;
    info!(
        entries = run.entries.len(),
        total_interest = %run.total_interest(),
        total_tax = %run.total_tax(),
        rows = rows.len(),
        "Savings interest posted"
    );

    Ok(())
}
