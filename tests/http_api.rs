//! End-to-end tests over a bound server: order creation, the hosted
//! checkout round trip, webhook settlement, and the admin surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::{Sha256, Sha512};

use fleuron::catalog::StaticCatalog;
use fleuron::config::{CardConfig, CheckoutConfig, GatewaysConfig, PagesConfig};
use fleuron::gateways::GatewayRegistry;
use fleuron::http::{router, AppState};
use fleuron::notify::NullNotifier;
use fleuron::orders::OrderService;
use fleuron::settlement::Reconciler;
use fleuron::store::MemoryOrderStore;

const CHECKOUT_SECRET: &str = "checkout-secret";
const WEBHOOK_SECRET: &str = "whsec_test";

struct TestServer {
    base: String,
    client: reqwest::Client,
}

async fn spawn_server() -> TestServer {
    let store = Arc::new(MemoryOrderStore::new());
    let catalog = Arc::new(StaticCatalog::new(HashMap::from([
        ("rose-red".to_string(), 100_000),
        ("lily-white".to_string(), 50_000),
    ])));
    let notifier = Arc::new(NullNotifier);

    let gateways = GatewaysConfig {
        timeout_secs: 2,
        card: Some(CardConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            api_key: "sk_test".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            currency: "usd".to_string(),
            minor_unit_scale: 100,
            tolerance_secs: 300,
        }),
        checkout: Some(CheckoutConfig {
            pay_url: "https://pay.processor.example/checkout".to_string(),
            merchant_code: "FLEURON01".to_string(),
            secret: CHECKOUT_SECRET.to_string(),
            return_url: "https://shop.example/payments/checkout/return".to_string(),
            currency: "USD".to_string(),
        }),
        wallet: None,
    };

    let orders = Arc::new(OrderService::new(
        store.clone(),
        catalog,
        notifier.clone(),
        Default::default(),
    ));
    let reconciler = Arc::new(Reconciler::new(store, notifier));
    let state = AppState {
        orders,
        reconciler,
        gateways: Arc::new(GatewayRegistry::from_config(&gateways).expect("registry")),
        pages: PagesConfig::default(),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client");
    TestServer {
        base: format!("http://{addr}"),
        client,
    }
}

fn order_body() -> Value {
    json!({
        "customer": {
            "name": "Lan Tran",
            "phone": "555-0101",
            "email": "lan@example.com",
            "address": "12 Market Lane"
        },
        "items": [
            { "product_ref": "rose-red", "quantity": 2 },
            { "product_ref": "lily-white", "quantity": 1 }
        ]
    })
}

async fn create_order(server: &TestServer) -> Value {
    let response = server
        .client
        .post(format!("{}/orders", server.base))
        .json(&order_body())
        .send()
        .await
        .expect("create order");
    assert_eq!(response.status(), 201);
    response.json().await.expect("order json")
}

fn sign_sorted_sha512(params: &BTreeMap<String, String>) -> String {
    let canonical = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut mac =
        Hmac::<Sha512>::new_from_slice(CHECKOUT_SECRET.as_bytes()).expect("hmac init");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build the return-callback parameters the processor would send after
/// a payment attempt, re-signed over the echoed parameter set.
fn checkout_return_params(
    redirect_url: &str,
    response_code: &str,
    transaction_no: &str,
) -> BTreeMap<String, String> {
    let url = reqwest::Url::parse(redirect_url).expect("redirect url");
    let mut params: BTreeMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.remove("signature");
    params.remove("requestedAt");
    params.remove("returnUrl");
    params.insert("responseCode".to_string(), response_code.to_string());
    params.insert("transactionNo".to_string(), transaction_no.to_string());
    let signature = sign_sorted_sha512(&params);
    params.insert("signature".to_string(), signature);
    params
}

#[tokio::test]
async fn test_order_total_is_priced_server_side() {
    let server = spawn_server().await;
    let order = create_order(&server).await;

    assert_eq!(order["total_amount"], 250_000);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "unpaid");
    assert_eq!(order["items"][0]["unit_price"], 100_000);
}

#[tokio::test]
async fn test_empty_order_is_rejected() {
    let server = spawn_server().await;

    let mut body = order_body();
    body["items"] = json!([]);
    let response = server
        .client
        .post(format!("{}/orders", server.base))
        .json(&body)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
    let error: Value = response.json().await.expect("error json");
    assert_eq!(error["error"], "order has no items");
}

#[tokio::test]
async fn test_checkout_round_trip_settles_order() {
    let server = spawn_server().await;
    let order = create_order(&server).await;
    let order_id = order["id"].as_str().expect("order id");

    // Request the hosted checkout redirect.
    let response = server
        .client
        .post(format!("{}/payments/checkout/create", server.base))
        .json(&json!({ "order_id": order_id }))
        .send()
        .await
        .expect("create payment");
    assert_eq!(response.status(), 200);
    let payment: Value = response.json().await.expect("payment json");
    let redirect_url = payment["redirect_url"].as_str().expect("redirect url");
    assert!(redirect_url.contains("signature="));
    assert!(redirect_url.contains("amount=250000"));

    // The processor sends the browser back with a success code.
    let params = checkout_return_params(redirect_url, "00", "CHK778899");
    let response = server
        .client
        .get(format!("{}/payments/checkout/return", server.base))
        .query(&params)
        .send()
        .await
        .expect("return");
    assert_eq!(response.status(), 303);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/payment/success"
    );

    let fetched: Value = server
        .client
        .get(format!("{}/orders/{order_id}", server.base))
        .send()
        .await
        .expect("get order")
        .json()
        .await
        .expect("order json");
    assert_eq!(fetched["payment_status"], "paid");
    assert_eq!(fetched["status"], "confirmed");
    assert_eq!(fetched["transaction_id"], "CHK778899");
    assert_eq!(fetched["payment_method"], "checkout");

    // Replaying the same return is a no-op that still lands on the
    // success page.
    let response = server
        .client
        .get(format!("{}/payments/checkout/return", server.base))
        .query(&params)
        .send()
        .await
        .expect("replayed return");
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/payment/success"
    );
}

#[tokio::test]
async fn test_tampered_checkout_return_is_rejected() {
    let server = spawn_server().await;
    let order = create_order(&server).await;
    let order_id = order["id"].as_str().expect("order id");

    let response = server
        .client
        .post(format!("{}/payments/checkout/create", server.base))
        .json(&json!({ "order_id": order_id }))
        .send()
        .await
        .expect("create payment");
    let payment: Value = response.json().await.expect("payment json");
    let redirect_url = payment["redirect_url"].as_str().expect("redirect url");

    // Alter the amount but keep the original signature.
    let mut params = checkout_return_params(redirect_url, "00", "CHK778899");
    params.insert("amount".to_string(), "1".to_string());
    let response = server
        .client
        .get(format!("{}/payments/checkout/return", server.base))
        .query(&params)
        .send()
        .await
        .expect("return");
    assert_eq!(response.status(), 303);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/payment/failure"
    );

    let fetched: Value = server
        .client
        .get(format!("{}/orders/{order_id}", server.base))
        .send()
        .await
        .expect("get order")
        .json()
        .await
        .expect("order json");
    assert_eq!(fetched["payment_status"], "unpaid");
    assert_eq!(fetched["status"], "pending");
}

#[tokio::test]
async fn test_card_webhook_settles_idempotently() {
    let server = spawn_server().await;
    let order = create_order(&server).await;
    let order_id = order["id"].as_str().expect("order id");

    let body = json!({
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_777",
            "amount": 25_000_000,
            "metadata": { "order_id": order_id }
        }}
    })
    .to_string();
    let timestamp = chrono::Utc::now().timestamp();
    let mut payload = format!("{timestamp}.").into_bytes();
    payload.extend_from_slice(body.as_bytes());
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("hmac init");
    mac.update(&payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    let header = format!("t={timestamp},v1={signature}");

    for _ in 0..2 {
        let response = server
            .client
            .post(format!("{}/payments/card/webhook", server.base))
            .header("x-payment-signature", &header)
            .body(body.clone())
            .send()
            .await
            .expect("webhook");
        assert_eq!(response.status(), 200);
    }

    let fetched: Value = server
        .client
        .get(format!("{}/orders/{order_id}", server.base))
        .send()
        .await
        .expect("get order")
        .json()
        .await
        .expect("order json");
    assert_eq!(fetched["payment_status"], "paid");
    assert_eq!(fetched["transaction_id"], "pi_777");
}

#[tokio::test]
async fn test_card_webhook_bad_signature_is_400() {
    let server = spawn_server().await;

    let response = server
        .client
        .post(format!("{}/payments/card/webhook", server.base))
        .header("x-payment-signature", "t=1,v1=deadbeef")
        .body("{}")
        .send()
        .await
        .expect("webhook");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_admin_status_update_and_delete() {
    let server = spawn_server().await;
    let order = create_order(&server).await;
    let order_id = order["id"].as_str().expect("order id");

    // Off-DAG transition is rejected.
    let response = server
        .client
        .patch(format!("{}/orders/{order_id}", server.base))
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .expect("patch");
    assert_eq!(response.status(), 400);

    let response = server
        .client
        .patch(format!("{}/orders/{order_id}", server.base))
        .json(&json!({ "status": "confirmed", "paid": true }))
        .send()
        .await
        .expect("patch");
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.expect("order json");
    assert_eq!(updated["status"], "confirmed");
    assert_eq!(updated["payment_status"], "paid");

    let response = server
        .client
        .delete(format!("{}/orders/{order_id}", server.base))
        .send()
        .await
        .expect("delete");
    assert_eq!(response.status(), 204);

    let response = server
        .client
        .get(format!("{}/orders/{order_id}", server.base))
        .send()
        .await
        .expect("get");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_unknown_gateway_is_404() {
    let server = spawn_server().await;
    let order = create_order(&server).await;

    let response = server
        .client
        .post(format!("{}/payments/bank/create", server.base))
        .json(&json!({ "order_id": order["id"] }))
        .send()
        .await
        .expect("create payment");
    assert_eq!(response.status(), 404);

    // Configured in code but absent from this deployment.
    let response = server
        .client
        .post(format!("{}/payments/wallet/create", server.base))
        .json(&json!({ "order_id": order["id"] }))
        .send()
        .await
        .expect("create payment");
    assert_eq!(response.status(), 404);
}
