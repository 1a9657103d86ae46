//! Reconciler tests: idempotence, conflicts, and callback races.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::interfaces::{CallbackOutcome, OrderStore, VerifiedResult};
use crate::notify::Notifier;
use crate::orders::{Customer, Order, OrderItem, OrderStatus, PaymentStatus};
use crate::settlement::{Reconciler, Settlement, SettlementError};
use crate::store::MemoryOrderStore;

/// Records notification calls synchronously.
#[derive(Default)]
struct RecordingNotifier {
    settled: Mutex<Vec<Uuid>>,
}

impl Notifier for RecordingNotifier {
    fn order_created(&self, _order: &Order) {}
    fn status_changed(&self, _order: &Order) {}
    fn payment_settled(&self, order: &Order) {
        self.settled.lock().unwrap().push(order.id);
    }
}

fn sample_order() -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        customer: Customer {
            name: "Mai Pham".into(),
            phone: "555-0102".into(),
            email: Some("mai@example.com".into()),
            address: "3 Orchard Road".into(),
            note: None,
        },
        items: vec![OrderItem {
            product_ref: "tulip-mixed".into(),
            quantity: 5,
            unit_price: 50_000,
        }],
        total_amount: 250_000,
        payment_method: None,
        payment_status: PaymentStatus::Unpaid,
        transaction_id: None,
        status: OrderStatus::Pending,
        paid_at: None,
        created_at: now,
        updated_at: now,
    }
}

async fn setup() -> (Reconciler, Arc<MemoryOrderStore>, Arc<RecordingNotifier>, Order) {
    let store = Arc::new(MemoryOrderStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let order = sample_order();
    store.insert(&order).await.unwrap();
    let reconciler = Reconciler::new(store.clone(), notifier.clone());
    (reconciler, store, notifier, order)
}

fn success(order_id: Uuid, transaction_id: &str) -> VerifiedResult {
    VerifiedResult {
        order_id,
        amount: 250_000,
        outcome: CallbackOutcome::Success {
            transaction_id: transaction_id.into(),
        },
    }
}

fn failure(order_id: Uuid) -> VerifiedResult {
    VerifiedResult {
        order_id,
        amount: 250_000,
        outcome: CallbackOutcome::Failure {
            code: Some("24".into()),
        },
    }
}

#[tokio::test]
async fn test_success_settles_and_notifies_once() {
    let (reconciler, store, notifier, order) = setup().await;
    let result = success(order.id, "txn-1");

    let settlement = reconciler.apply(&result).await.unwrap();
    let settled = match settlement {
        Settlement::Applied(order) => order,
        other => panic!("expected Applied, got {other:?}"),
    };
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    assert_eq!(settled.status, OrderStatus::Confirmed);
    assert_eq!(settled.transaction_id.as_deref(), Some("txn-1"));

    // Replaying the same event changes nothing and re-notifies nobody.
    let settlement = reconciler.apply(&result).await.unwrap();
    assert!(matches!(settlement, Settlement::Replayed));

    assert_eq!(notifier.settled.lock().unwrap().len(), 1);
    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_conflicting_transaction_is_rejected() {
    let (reconciler, store, notifier, order) = setup().await;

    reconciler.apply(&success(order.id, "txn-1")).await.unwrap();
    let err = reconciler
        .apply(&success(order.id, "txn-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Conflict { .. }));

    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.transaction_id.as_deref(), Some("txn-1"));
    assert_eq!(notifier.settled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failure_after_success_never_downgrades() {
    let (reconciler, store, _notifier, order) = setup().await;

    reconciler.apply(&success(order.id, "txn-1")).await.unwrap();
    let err = reconciler.apply(&failure(order.id)).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict { .. }));

    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Paid);
    assert_eq!(fetched.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_failure_marks_failed_keeps_pending_no_notification() {
    let (reconciler, store, notifier, order) = setup().await;

    let settlement = reconciler.apply(&failure(order.id)).await.unwrap();
    assert!(matches!(settlement, Settlement::Applied(_)));

    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Failed);
    assert_eq!(fetched.status, OrderStatus::Pending);
    assert!(notifier.settled.lock().unwrap().is_empty());

    // A retried failure callback is a no-op.
    let settlement = reconciler.apply(&failure(order.id)).await.unwrap();
    assert!(matches!(settlement, Settlement::Replayed));
}

#[tokio::test]
async fn test_success_after_failure_recovers() {
    let (reconciler, store, notifier, order) = setup().await;

    reconciler.apply(&failure(order.id)).await.unwrap();
    let settlement = reconciler.apply(&success(order.id, "txn-late")).await.unwrap();
    assert!(matches!(settlement, Settlement::Applied(_)));

    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Paid);
    assert_eq!(notifier.settled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_amount_mismatch_is_rejected_without_mutation() {
    let (reconciler, store, notifier, order) = setup().await;

    let mut result = success(order.id, "txn-1");
    result.amount = 1;
    let err = reconciler.apply(&result).await.unwrap_err();
    assert!(matches!(err, SettlementError::AmountMismatch { .. }));

    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Unpaid);
    assert!(notifier.settled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let (reconciler, _store, _notifier, _order) = setup().await;

    let err = reconciler
        .apply(&success(Uuid::new_v4(), "txn-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::OrderNotFound(_)));
}

#[tokio::test]
async fn test_racing_callbacks_converge_to_one_notification() {
    let (reconciler, store, notifier, order) = setup().await;

    // Webhook and redirect return carry the same verified result and
    // race; either schedule must end with one applied transition.
    let result = success(order.id, "txn-1");
    let (a, b) = tokio::join!(reconciler.apply(&result), reconciler.apply(&result));
    let outcomes = [a.unwrap(), b.unwrap()];

    let applied = outcomes
        .iter()
        .filter(|s| matches!(s, Settlement::Applied(_)))
        .count();
    let replayed = outcomes
        .iter()
        .filter(|s| matches!(s, Settlement::Replayed))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(replayed, 1);
    assert_eq!(notifier.settled.lock().unwrap().len(), 1);

    let fetched = store.get(order.id).await.unwrap();
    assert_eq!(fetched.payment_status, PaymentStatus::Paid);
    assert_eq!(fetched.transaction_id.as_deref(), Some("txn-1"));
}
