//! Batch close through the reconciler.

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coopledger_core::batch::{
    BatchError, BatchState, Remittance, RemittanceKind, TransactionBatchBalanceStatus,
};
use coopledger_core::posting::{LedgerKey, LedgerSource, PostingError};
use coopledger_shared::types::MemberId;
use coopledger_store::{BatchReconciler, LedgerStore, MemoryLedgerStore};

use common::{Fixture, date, fixture};

fn reconciler(f: &Fixture) -> BatchReconciler<MemoryLedgerStore> {
    BatchReconciler::new(Arc::clone(&f.poster))
}

#[tokio::test]
async fn test_close_with_overage_posts_variance() {
    let f = fixture().await;
    let rec = reconciler(&f);
    let batch = rec
        .open_batch(f.scope, f.employee, "PHP", date(2024, 3, 1))
        .await
        .unwrap();
    let member = MemberId::new();

    rec.record_funding(batch.id, dec!(1000)).await.unwrap();
    f.poster
        .post(&f.deposit(member, dec!(4500), Some(batch.id)))
        .await
        .unwrap();
    f.poster
        .post(&f.withdrawal(member, f.savings, dec!(500), Some(batch.id)))
        .await
        .unwrap();
    // Supposed: 1000 + 4500 - 500 = 5000; handled: 5050.
    rec.record_cash_count(batch.id, dec!(1000), 4).await.unwrap();
    rec.record_cash_count(batch.id, dec!(50), 1).await.unwrap();
    rec.record_remittance(
        batch.id,
        Remittance {
            kind: RemittanceKind::Online,
            amount: dec!(1000),
            reference_number: Some("GC-1".into()),
        },
    )
    .await
    .unwrap();

    let report = rec.close(batch.id, f.employee).await.unwrap();
    assert_eq!(report.status, TransactionBatchBalanceStatus::Overage);
    assert_eq!(report.totals.total_cash_handled, dec!(5050));
    assert_eq!(report.totals.total_supposed_remittance, dec!(5000));
    assert_eq!(report.totals.savings_withdrawal, dec!(500));
    assert_eq!(report.batch.state(), BatchState::Closed);

    assert_eq!(report.variance_rows.len(), 2);
    let overage = report
        .variance_rows
        .iter()
        .find(|r| r.account_id == f.overage)
        .unwrap();
    assert_eq!(overage.credit, dec!(50));
    assert_eq!(overage.source, LedgerSource::BatchVariance);
    assert_eq!(overage.transaction_batch_id, Some(batch.id));

    let stored = f.store.batch(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.state(), BatchState::Closed);
    assert_eq!(stored.balance_status(), Some(TransactionBatchBalanceStatus::Overage));
    assert!(stored.closed_at().is_some());
}

#[tokio::test]
async fn test_close_with_shortage_and_time_deposit_withdrawal() {
    let f = fixture().await;
    let rec = reconciler(&f);
    let batch = rec
        .open_batch(f.scope, f.employee, "PHP", date(2024, 3, 1))
        .await
        .unwrap();
    let member = MemberId::new();

    f.poster
        .post(&f.deposit(member, dec!(2000), Some(batch.id)))
        .await
        .unwrap();
    f.poster
        .post(&f.withdrawal(member, f.time_deposit, dec!(300), Some(batch.id)))
        .await
        .unwrap();
    rec.record_cash_count(batch.id, dec!(100), 17).await.unwrap();

    let report = rec.close(batch.id, f.employee).await.unwrap();
    assert_eq!(report.totals.time_deposit_withdrawal, dec!(300));
    assert_eq!(report.totals.savings_withdrawal, Decimal::ZERO);
    assert_eq!(report.totals.total_supposed_remittance, dec!(1700));
    assert_eq!(report.status, TransactionBatchBalanceStatus::Balanced);
    assert!(report.variance_rows.is_empty());

    let batch = rec
        .open_batch(f.scope, f.employee, "PHP", date(2024, 3, 2))
        .await
        .unwrap();
    f.poster
        .post(&f.deposit(member, dec!(800), Some(batch.id)))
        .await
        .unwrap();
    rec.record_cash_count(batch.id, dec!(500), 1).await.unwrap();
    rec.record_deposit_in_bank(batch.id, dec!(200)).await.unwrap();

    let report = rec.close(batch.id, f.employee).await.unwrap();
    assert_eq!(report.status, TransactionBatchBalanceStatus::Shortage);
    let shortage = report
        .variance_rows
        .iter()
        .find(|r| r.account_id == f.shortage)
        .unwrap();
    assert_eq!(shortage.debit, dec!(100));
    let cash = LedgerKey::new(None, f.cash);
    // 2000 - 300 + 800 - 100
    assert_eq!(f.store.ledger(cash).await.unwrap().balance, dec!(2400));
}

#[tokio::test]
async fn test_closed_batch_rejects_postings_and_records() {
    let f = fixture().await;
    let rec = reconciler(&f);
    let batch = rec
        .open_batch(f.scope, f.employee, "PHP", date(2024, 3, 1))
        .await
        .unwrap();
    rec.close(batch.id, f.employee).await.unwrap();

    assert_eq!(
        f.poster
            .post(&f.deposit(MemberId::new(), dec!(10), Some(batch.id)))
            .await,
        Err(PostingError::BatchClosed(batch.id))
    );
    assert_eq!(
        rec.record_funding(batch.id, dec!(10)).await,
        Err(BatchError::BatchClosed(batch.id))
    );
    assert!(matches!(
        rec.close(batch.id, f.employee).await,
        Err(BatchError::BatchClosed(_))
    ));
}

#[tokio::test]
async fn test_failed_variance_posting_reopens_batch() {
    let f = fixture().await;
    let rec = reconciler(&f);
    let batch = rec
        .open_batch(f.scope, f.employee, "PHP", date(2024, 3, 1))
        .await
        .unwrap();
    rec.record_cash_count(batch.id, dec!(20), 3).await.unwrap();

    f.store.fail_next_commits(1);
    let err = rec.close(batch.id, f.employee).await.unwrap_err();
    assert!(matches!(err, BatchError::Posting(PostingError::Storage(_))));

    let stored = f.store.batch(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.state(), BatchState::Open);
    assert!(stored.totals().is_none());
    assert!(f.store.rows_for_batch(batch.id).await.unwrap().is_empty());

    let report = rec.close(batch.id, f.employee).await.unwrap();
    assert_eq!(report.status, TransactionBatchBalanceStatus::Overage);
    assert_eq!(report.variance_rows.len(), 2);
}

#[tokio::test]
async fn test_missing_unbalanced_account_reopens_batch() {
    let f = fixture().await;
    let rec = reconciler(&f);
    let batch = rec
        .open_batch(f.scope, f.employee, "USD", date(2024, 3, 1))
        .await
        .unwrap();

    let err = rec.close(batch.id, f.employee).await.unwrap_err();
    assert_eq!(
        err,
        BatchError::MissingUnbalancedAccount {
            currency: "USD".into()
        }
    );
    let stored = f.store.batch(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.state(), BatchState::Open);
}

#[tokio::test]
async fn test_unknown_batch() {
    let f = fixture().await;
    let rec = reconciler(&f);
    let id = coopledger_shared::types::TransactionBatchId::new();
    assert_eq!(
        rec.close(id, f.employee).await.unwrap_err(),
        BatchError::UnknownBatch(id)
    );
    assert_eq!(
        rec.record_cash_count(id, dec!(100), 1).await,
        Err(BatchError::UnknownBatch(id))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_close_runs_once() {
    let f = fixture().await;
    let rec = Arc::new(reconciler(&f));
    let batch = rec
        .open_batch(f.scope, f.employee, "PHP", date(2024, 3, 1))
        .await
        .unwrap();
    rec.record_cash_count(batch.id, dec!(100), 1).await.unwrap();

    let (a, b) = tokio::join!(rec.close(batch.id, f.employee), rec.close(batch.id, f.employee));
    let ok = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    for result in [a, b] {
        if let Err(err) = result {
            assert!(matches!(
                err,
                BatchError::AlreadyClosing(_) | BatchError::BatchClosed(_)
            ));
        }
    }
    // One variance posting only.
    assert_eq!(f.store.rows_for_batch(batch.id).await.unwrap().len(), 2);
}
