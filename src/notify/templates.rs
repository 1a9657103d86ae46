//! Mail bodies.
//!
//! Plain formatted HTML, one function per notification. Returns
//! `(subject, html)`.

use crate::orders::Order;

pub fn order_created_customer(order: &Order) -> (String, String) {
    let subject = format!("Order received: {}", short_id(order));
    let html = format!(
        "<h2>Thank you, {}!</h2>\
         <p>We received your order and will confirm it shortly.</p>\
         {}\
         <p>Delivery to: {}</p>",
        escape(&order.customer.name),
        items_table(order),
        escape(&order.customer.address),
    );
    (subject, html)
}

pub fn order_created_admin(order: &Order) -> (String, String) {
    let subject = format!(
        "New order {}: {} ({})",
        short_id(order),
        escape(&order.customer.name),
        order.total_amount
    );
    let html = format!(
        "<h2>New order {}</h2>\
         <p>Customer: {} / {}</p>\
         {}\
         <p>Note: {}</p>",
        order.id,
        escape(&order.customer.name),
        escape(&order.customer.phone),
        items_table(order),
        escape(order.customer.note.as_deref().unwrap_or("-")),
    );
    (subject, html)
}

pub fn status_changed(order: &Order) -> (String, String) {
    let subject = format!("Order {} is now {}", short_id(order), order.status);
    let html = format!(
        "<p>Hi {},</p><p>Your order is now <strong>{}</strong>.</p>",
        escape(&order.customer.name),
        order.status,
    );
    (subject, html)
}

pub fn payment_settled(order: &Order) -> (String, String) {
    let subject = format!("Payment received for order {}", short_id(order));
    let html = format!(
        "<p>Hi {},</p>\
         <p>We received your payment of <strong>{}</strong>. \
         Your order is confirmed.</p>",
        escape(&order.customer.name),
        order.total_amount,
    );
    (subject, html)
}

/// First UUID segment, enough for a mail subject.
fn short_id(order: &Order) -> String {
    order.id.to_string()[..8].to_string()
}

fn items_table(order: &Order) -> String {
    let rows: String = order
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&item.product_ref),
                item.quantity,
                item.unit_price
            )
        })
        .collect();
    format!(
        "<table><tr><th>Item</th><th>Qty</th><th>Unit price</th></tr>{rows}</table>\
         <p>Total: <strong>{}</strong></p>",
        order.total_amount
    )
}

/// Minimal HTML escaping for user-supplied text.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
