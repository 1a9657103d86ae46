//! Notification dispatcher.
//!
//! Settlement-adjacent notifications are side effects, never part of a
//! request's control flow: every send runs on a detached task with its
//! own error handling, so the client-visible response never waits on
//! email delivery and a dead mail relay can never fail an order.

pub mod directory;
pub mod mailer;
mod templates;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::interfaces::{AdminDirectory, Mailer};
use crate::orders::Order;

/// Notification events the core emits.
///
/// Implementations must return without blocking on delivery.
pub trait Notifier: Send + Sync {
    /// A new order was persisted.
    fn order_created(&self, order: &Order);

    /// An admin moved the order along the fulfilment DAG.
    fn status_changed(&self, order: &Order);

    /// A payment callback settled the order as paid.
    fn payment_settled(&self, order: &Order);
}

/// Email-backed notifier.
///
/// Customer mail goes out only when the order carries an email address.
/// Admin recipients come from the [`AdminDirectory`]; an empty set is a
/// warning, not an error. Each recipient is sent independently.
pub struct EmailNotifier {
    mailer: Arc<dyn Mailer>,
    directory: Arc<dyn AdminDirectory>,
}

impl EmailNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, directory: Arc<dyn AdminDirectory>) -> Self {
        Self { mailer, directory }
    }
}

impl Notifier for EmailNotifier {
    fn order_created(&self, order: &Order) {
        let mailer = self.mailer.clone();
        let directory = self.directory.clone();
        let order = order.clone();
        tokio::spawn(async move {
            dispatch_order_created(mailer, directory, &order).await;
        });
    }

    fn status_changed(&self, order: &Order) {
        let mailer = self.mailer.clone();
        let order = order.clone();
        tokio::spawn(async move {
            let (subject, html) = templates::status_changed(&order);
            send_customer(mailer, &order, &subject, &html).await;
        });
    }

    fn payment_settled(&self, order: &Order) {
        let mailer = self.mailer.clone();
        let order = order.clone();
        tokio::spawn(async move {
            let (subject, html) = templates::payment_settled(&order);
            send_customer(mailer, &order, &subject, &html).await;
        });
    }
}

/// A notifier that drops every event. Useful for tools and tests.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn order_created(&self, _order: &Order) {}
    fn status_changed(&self, _order: &Order) {}
    fn payment_settled(&self, _order: &Order) {}
}

async fn dispatch_order_created(
    mailer: Arc<dyn Mailer>,
    directory: Arc<dyn AdminDirectory>,
    order: &Order,
) {
    let (subject, html) = templates::order_created_customer(order);
    send_customer(mailer.clone(), order, &subject, &html).await;

    let (subject, html) = templates::order_created_admin(order);
    send_admins(mailer, directory, &subject, &html).await;
}

/// Send to the order's customer, if they left an email address.
async fn send_customer(mailer: Arc<dyn Mailer>, order: &Order, subject: &str, html: &str) {
    let Some(email) = order.customer.email.as_deref() else {
        debug!(order_id = %order.id, "order has no customer email, skipping notification");
        return;
    };
    if let Err(e) = mailer.send(email, subject, html).await {
        warn!(order_id = %order.id, error = %e, "customer notification failed");
    }
}

/// Fan a mail out to every admin recipient independently.
///
/// One recipient's failure must not block the others, so the sends run
/// concurrently and each logs its own outcome.
async fn send_admins(
    mailer: Arc<dyn Mailer>,
    directory: Arc<dyn AdminDirectory>,
    subject: &str,
    html: &str,
) {
    let recipients = match directory.list_active_admins().await {
        Ok(recipients) => recipients,
        Err(e) => {
            warn!(error = %e, "admin directory lookup failed, skipping admin notification");
            return;
        }
    };

    if recipients.is_empty() {
        warn!("no admin recipients resolved, skipping admin notification");
        return;
    }

    let sends = recipients.iter().map(|to| {
        let mailer = mailer.clone();
        async move {
            if let Err(e) = mailer.send(to, subject, html).await {
                warn!(recipient = %to, error = %e, "admin notification failed");
            }
        }
    });
    join_all(sends).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::directory::StaticDirectory;
    use super::*;
    use crate::interfaces::mailer::{MailerError, Result as MailResult};
    use crate::orders::{Customer, OrderItem, OrderStatus, PaymentStatus};

    /// Records sends; addresses listed in `fail_for` error instead.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: &str) -> MailResult<()> {
            if self.fail_for.iter().any(|f| f == to) {
                return Err(MailerError::Rejected("mailbox unavailable".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn order(email: Option<&str>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer: Customer {
                name: "Lan Tran".into(),
                phone: "555-0101".into(),
                email: email.map(String::from),
                address: "12 Market Lane".into(),
                note: None,
            },
            items: vec![OrderItem {
                product_ref: "rose-red".into(),
                quantity: 2,
                unit_price: 100_000,
            }],
            total_amount: 200_000,
            payment_method: None,
            payment_status: PaymentStatus::Unpaid,
            transaction_id: None,
            status: OrderStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_order_created_mails_customer_and_admins() {
        let mailer = Arc::new(RecordingMailer::default());
        let directory = Arc::new(StaticDirectory::new(vec![
            "ops@example.com".into(),
            "owner@example.com".into(),
        ]));

        dispatch_order_created(mailer.clone(), directory, &order(Some("lan@example.com"))).await;

        let sent = mailer.sent.lock().unwrap();
        let recipients: Vec<&str> = sent.iter().map(|(to, _)| to.as_str()).collect();
        assert_eq!(
            recipients,
            vec!["lan@example.com", "ops@example.com", "owner@example.com"]
        );
    }

    #[tokio::test]
    async fn test_no_customer_email_skips_customer_mail() {
        let mailer = Arc::new(RecordingMailer::default());
        let directory = Arc::new(StaticDirectory::new(vec!["ops@example.com".into()]));

        dispatch_order_created(mailer.clone(), directory, &order(None)).await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops@example.com");
    }

    #[tokio::test]
    async fn test_one_admin_failure_does_not_block_others() {
        let mailer = Arc::new(RecordingMailer {
            sent: Mutex::new(Vec::new()),
            fail_for: vec!["dead@example.com".into()],
        });
        let directory = Arc::new(StaticDirectory::new(vec![
            "dead@example.com".into(),
            "ops@example.com".into(),
        ]));

        send_admins(mailer.clone(), directory, "subject", "<p>body</p>").await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops@example.com");
    }

    #[tokio::test]
    async fn test_empty_recipient_set_is_skipped() {
        let mailer = Arc::new(RecordingMailer::default());
        let directory = Arc::new(StaticDirectory::new(Vec::new()));

        send_admins(mailer.clone(), directory, "subject", "<p>body</p>").await;

        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
