//! Ledger poster behaviour against the in-memory store.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coopledger_core::posting::{
    EntryType, EventKind, FinancialEvent, LedgerKey, LedgerSource, PostingError, PostingLine,
};
use coopledger_shared::config::PostingConfig;
use coopledger_shared::types::{AccountId, MemberId};
use coopledger_store::LedgerStore;

use common::{fixture, fixture_with};

#[tokio::test]
async fn test_deposit_posts_balanced_rows_and_balances() {
    let f = fixture().await;
    let member = MemberId::new();

    let rows = f.poster.post(&f.deposit(member, dec!(1500), None)).await.unwrap();
    assert_eq!(rows.len(), 2);
    let debit: Decimal = rows.iter().map(|r| r.debit).sum();
    let credit: Decimal = rows.iter().map(|r| r.credit).sum();
    assert_eq!(debit, credit);
    assert!(rows.iter().all(|r| r.transaction_id == rows[0].transaction_id));

    let savings_key = LedgerKey::new(Some(member), f.savings);
    let ledger = f.store.ledger(savings_key).await.unwrap();
    assert_eq!(ledger.balance, dec!(-1500));
    assert_eq!(f.poster.normal_balance(savings_key).await.unwrap(), dec!(1500));
    assert_eq!(ledger.version, 1);
    assert_eq!(ledger.last_pay, Some(common::date(2024, 3, 1)));

    let cash = f.store.ledger(LedgerKey::new(None, f.cash)).await.unwrap();
    assert_eq!(cash.balance, dec!(1500));
}

#[tokio::test]
async fn test_running_balance_and_versions_follow_posting_order() {
    let f = fixture().await;
    let member = MemberId::new();
    let key = LedgerKey::new(Some(member), f.savings);

    f.poster.post(&f.deposit(member, dec!(1000), None)).await.unwrap();
    f.poster
        .post(&f.withdrawal(member, f.savings, dec!(250), None))
        .await
        .unwrap();
    f.poster.post(&f.deposit(member, dec!(75.50), None)).await.unwrap();

    let rows = f.store.rows_for_key(key).await.unwrap();
    let balances: Vec<Decimal> = rows.iter().map(|r| r.balance).collect();
    let versions: Vec<u64> = rows.iter().map(|r| r.ledger_version).collect();
    assert_eq!(balances, vec![dec!(-1000), dec!(-750), dec!(-825.50)]);
    assert_eq!(versions, vec![1, 2, 3]);

    assert_eq!(f.poster.replay_balance(key).await.unwrap(), dec!(-825.50));
    assert_eq!(f.poster.normal_balance(key).await.unwrap(), dec!(825.50));
    assert!(f.poster.verify_balance(key).await.unwrap());
}

#[tokio::test]
async fn test_stored_balance_is_sum_of_debit_minus_credit_on_every_key() {
    let f = fixture().await;
    let member = MemberId::new();

    f.poster.post(&f.deposit(member, dec!(36500), None)).await.unwrap();
    f.poster
        .post(&f.withdrawal(member, f.savings, dec!(1200.25), None))
        .await
        .unwrap();

    // Savings is credit-normal, cash debit-normal; both store debit - credit.
    for key in [LedgerKey::new(Some(member), f.savings), LedgerKey::new(None, f.cash)] {
        let rows = f.store.rows_for_key(key).await.unwrap();
        let replayed: Decimal = rows.iter().map(|r| r.debit - r.credit).sum();
        let ledger = f.store.ledger(key).await.unwrap();
        assert_eq!(ledger.balance, replayed);
        assert_eq!(rows.last().unwrap().balance, replayed);
    }
    assert_eq!(
        f.store
            .ledger(LedgerKey::new(Some(member), f.savings))
            .await
            .unwrap()
            .balance,
        dec!(-35299.75)
    );
}

#[tokio::test]
async fn test_invalid_event_posts_nothing() {
    let f = fixture().await;
    let member = MemberId::new();

    let err = f
        .poster
        .post(&f.deposit(member, dec!(10.005), None))
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::UnroundedAmount { .. }));

    let imbalanced = FinancialEvent::new(
        f.context(None),
        EventKind::Journal {
            lines: vec![
                PostingLine::debit(f.cash, dec!(100)),
                PostingLine::credit(f.savings, dec!(99.99)).for_member(member),
            ],
        },
    );
    assert!(matches!(
        f.poster.post(&imbalanced).await,
        Err(PostingError::ImbalancedPosting { .. })
    ));
    assert!(f.store.all_rows().await.is_empty());
}

#[tokio::test]
async fn test_unknown_account_is_rejected() {
    let f = fixture().await;
    let stray = AccountId::new();
    let event = FinancialEvent::new(
        f.context(None),
        EventKind::Journal {
            lines: vec![
                PostingLine::debit(stray, dec!(5)),
                PostingLine::credit(f.cash, dec!(5)),
            ],
        },
    );
    assert_eq!(
        f.poster.post(&event).await,
        Err(PostingError::UnknownAccount(stray))
    );
    assert!(f.store.all_rows().await.is_empty());
}

#[tokio::test]
async fn test_post_many_is_atomic() {
    let f = fixture().await;
    let member = MemberId::new();
    let good = f.deposit(member, dec!(100), None);
    let bad = f.deposit(member, Decimal::ZERO, None);

    assert!(f.poster.post_many(&[good.clone(), bad]).await.is_err());
    assert!(f.store.all_rows().await.is_empty());

    let rows = f
        .poster
        .post_many(&[good.clone(), good])
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    let key = LedgerKey::new(Some(member), f.savings);
    assert_eq!(f.store.ledger(key).await.unwrap().balance, dec!(-200));
    assert_ne!(rows[0].transaction_id, rows[2].transaction_id);
}

#[tokio::test]
async fn test_storage_failure_leaves_no_partial_state() {
    let f = fixture().await;
    let member = MemberId::new();

    f.store.fail_next_commits(1);
    let err = f.poster.post(&f.deposit(member, dec!(50), None)).await.unwrap_err();
    assert!(matches!(err, PostingError::Storage(_)));
    assert!(f.store.all_rows().await.is_empty());
    assert!(f.store.ledger(LedgerKey::new(None, f.cash)).await.is_none());
}

#[tokio::test]
async fn test_version_conflict_is_retried() {
    let f = fixture().await;
    let member = MemberId::new();

    f.store.conflict_next_commits(2);
    let rows = f.poster.post(&f.deposit(member, dec!(50), None)).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].ledger_version, 1);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let config = PostingConfig {
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        ..PostingConfig::default()
    };
    let f = fixture_with(config).await;

    f.store.conflict_next_commits(3);
    let err = f
        .poster
        .post(&f.deposit(MemberId::new(), dec!(50), None))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "POSTING_CONFLICT");
    assert!(f.store.all_rows().await.is_empty());
}

#[tokio::test]
async fn test_batch_guard_on_post() {
    let f = fixture().await;
    let member = MemberId::new();
    let missing = coopledger_shared::types::TransactionBatchId::new();
    assert_eq!(
        f.poster.post(&f.deposit(member, dec!(10), Some(missing))).await,
        Err(PostingError::UnknownBatch(missing))
    );

    let mut batch = coopledger_core::batch::TransactionBatch::open(
        f.scope,
        f.employee,
        "PHP",
        common::date(2024, 3, 1),
    );
    f.store.save_batch(batch.clone()).await.unwrap();
    let rows = f
        .poster
        .post(&f.deposit(member, dec!(10), Some(batch.id)))
        .await
        .unwrap();
    assert!(rows.iter().all(|r| r.transaction_batch_id == Some(batch.id)));
    assert!(rows.iter().all(|r| r.source == LedgerSource::Deposit));

    batch.begin_close().unwrap();
    f.store.save_batch(batch.clone()).await.unwrap();
    assert_eq!(
        f.poster.post(&f.deposit(member, dec!(10), Some(batch.id))).await,
        Err(PostingError::BatchClosed(batch.id))
    );
}

#[tokio::test]
async fn test_manual_lines_keep_entry_types() {
    let f = fixture().await;
    let member = MemberId::new();
    let event = FinancialEvent::new(
        f.context(None),
        EventKind::Adjustment {
            lines: vec![
                PostingLine::debit(f.interest_expense, dec!(12.34)).describe("Interest correction"),
                PostingLine::credit(f.savings, dec!(12.34)).for_member(member),
            ],
        },
    );
    let rows = f.poster.post(&event).await.unwrap();
    assert_eq!(rows[0].entry_type(), EntryType::Debit);
    assert_eq!(rows[0].description, "Interest correction");
    assert_eq!(rows[1].entry_type(), EntryType::Credit);
    assert_eq!(rows[1].source, LedgerSource::Adjustment);
}

#[tokio::test]
async fn test_loan_release_from_amortization() {
    use coopledger_core::amortization::{
        AmortizationBuilder, AutomaticLoanDeduction, LoanAccounts, LoanPolicy,
    };
    use coopledger_core::posting::{AccountInfo, AccountKind};
    use coopledger_core::rates::{
        AccountPolicy, AccountPolicyConfig, ComputationType, LoanModeOfPayment,
    };
    use coopledger_shared::types::LoanTransactionId;

    let f = fixture().await;
    let account = |name: &str, kind| AccountInfo::new(AccountId::new(), name, kind);
    let receivable = account("Loans Receivable", AccountKind::Receivable);
    let interest = account("Interest Receivable", AccountKind::Receivable);
    let income = account("Interest Income", AccountKind::Income);
    let unearned = account("Unearned Interest", AccountKind::Income);
    let fines = account("Fines Receivable", AccountKind::Receivable);
    let unearned_fines = account("Unearned Fines", AccountKind::Income);
    let notarial = account("Notarial Fees", AccountKind::Income);
    let accounts = LoanAccounts {
        loan_receivable: receivable.id,
        interest_receivable: interest.id,
        interest_income: income.id,
        unearned_interest: unearned.id,
        fines_receivable: fines.id,
        unearned_fines: unearned_fines.id,
        cash: f.cash,
    };
    for info in [receivable, interest, income, unearned, fines, unearned_fines, notarial.clone()] {
        f.store.add_account(info).await;
    }

    let policy = AccountPolicy::from_config(AccountPolicyConfig::new(
        accounts.loan_receivable,
        ComputationType::Diminishing,
        dec!(12),
    ))
    .unwrap();
    let loan = LoanPolicy {
        policy,
        accounts,
        automatic_deductions: vec![AutomaticLoanDeduction::flat(
            notarial.id,
            "Notarial fee",
            dec!(100),
            false,
        )],
        charges_schemes: vec![],
        member_type_id: None,
        released_on: common::date(2024, 3, 1),
        previous_balance: Decimal::ZERO,
    };
    let entries = AmortizationBuilder::default()
        .build_entries(&loan, dec!(9000), 3, LoanModeOfPayment::Monthly)
        .unwrap();
    assert_eq!(entries.proceeds, dec!(8900));

    let member = MemberId::new();
    let event = FinancialEvent::new(
        f.context(None),
        EventKind::LoanDisbursement {
            member_id: member,
            loan_transaction_id: LoanTransactionId::new(),
            accounts,
            entries: entries.clone(),
        },
    );
    let rows = f.poster.post(&event).await.unwrap();
    assert_eq!(rows.len(), entries.entries.len());
    assert!(rows.iter().all(|r| r.source == LedgerSource::Loan));

    let principal = f
        .store
        .ledger(LedgerKey::new(Some(member), accounts.loan_receivable))
        .await
        .unwrap();
    assert_eq!(principal.balance, dec!(9000));
    let interest = f
        .store
        .ledger(LedgerKey::new(Some(member), accounts.interest_receivable))
        .await
        .unwrap();
    assert_eq!(interest.balance, dec!(180));
    assert_eq!(interest.interest, dec!(180));

    let cash = f.store.ledger(LedgerKey::new(None, f.cash)).await.unwrap();
    assert_eq!(cash.balance, dec!(-8900));
}
