//! End-to-end runs of the real Prosper client against the fake server.

use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;

use prosper_autoinvest::config::{BidFailurePolicy, RunConfig, SecretSource};
use prosper_autoinvest::engine::runner::Runner;
use prosper_autoinvest::error::InvestError;
use prosper_autoinvest::marketplace::prosper::ProsperClient;
use prosper_autoinvest::secrets::{
    StaticCredentialProvider, CLIENT_ID, CLIENT_SECRET, PASSWORD, USER,
};
use prosper_autoinvest::types::{Criteria, InvestmentAmount};

use crate::fake_prosper::{FakeProsper, Script};

pub(crate) fn config(fake: &FakeProsper, amount: u64) -> RunConfig {
    let mut criteria =
        Criteria::from_json(r#"{"prosper_rating": ["A", "B"], "listing_term": 36, "limit": 25}"#)
            .unwrap();
    let listings_limit = criteria.take_limit().unwrap().unwrap_or(10);
    RunConfig {
        investment_amount: InvestmentAmount::new(amount).unwrap(),
        criteria,
        listings_limit,
        bid_failure_policy: BidFailurePolicy::Continue,
        refund_failed_bids: false,
        dry_run: false,
        secret_source: SecretSource::Env,
        endpoints: fake.endpoints(),
    }
}

fn secrets() -> StaticCredentialProvider {
    StaticCredentialProvider::new([
        (USER, "investor@example.com"),
        (PASSWORD, "correct-horse"),
        (CLIENT_ID, "client-abc"),
        (CLIENT_SECRET, "client-xyz"),
    ])
}

#[tokio::test]
async fn test_invests_until_funds_run_out() {
    let fake = FakeProsper::start(Script::default().with_balance(1000.0).with_listings(12)).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let report = Runner::new(&cfg, &secrets, &client).run().await.unwrap();

    assert_eq!(report.placed.len(), 10);
    assert_eq!(report.listings_fetched, 12);
    assert!(report.insufficient_funds);

    let recorded = fake.recorded();
    assert_eq!(recorded.bid_listing_ids(), (1001..=1010).collect::<Vec<u64>>());
    assert_eq!(
        recorded.orders[0],
        json!({"bid_requests": [{"listing_id": 1001, "bid_amount": 100}]})
    );
    // account + listings + 10 orders all carry the bearer token
    assert_eq!(recorded.authorization.len(), 12);
    assert!(recorded.authorization.iter().all(|a| a == "Bearer tok-123"));
}

#[tokio::test]
async fn test_sends_password_grant_and_criteria() {
    let fake = FakeProsper::start(Script::default().with_balance(500.0).with_listings(1)).await;
    let cfg = config(&fake, 25);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    Runner::new(&cfg, &secrets, &client).run().await.unwrap();

    let recorded = fake.recorded();
    assert_eq!(recorded.token_form["grant_type"], "password");
    assert_eq!(recorded.token_form["username"], "investor@example.com");
    assert_eq!(recorded.token_form["password"], "correct-horse");
    assert_eq!(recorded.token_form["client_id"], "client-abc");
    assert_eq!(recorded.token_form["client_secret"], "client-xyz");

    assert_eq!(recorded.listings_query["prosper_rating"], "A,B");
    assert_eq!(recorded.listings_query["listing_term"], "36");
    assert_eq!(recorded.listings_query["limit"], "25");
}

#[tokio::test]
async fn test_insufficient_funds_never_calls_order_endpoint() {
    let fake = FakeProsper::start(Script::default().with_balance(50.0).with_listings(5)).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let report = Runner::new(&cfg, &secrets, &client).run().await.unwrap();

    assert!(report.insufficient_funds);
    assert!(report.placed.is_empty());
    assert_eq!(report.balance, dec!(50));
    assert_eq!(fake.recorded().calls, vec!["token", "account"]);
}

#[tokio::test]
async fn test_missing_balance_aborts_before_listings() {
    let mut script = Script::default().with_listings(3);
    script.account = (200, json!({"total_account_value": 5000.0}));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();

    assert!(matches!(err, InvestError::Api { endpoint: "account", .. }));
    assert_eq!(fake.recorded().calls, vec!["token", "account"]);
}

#[tokio::test]
async fn test_unauthorized_token_aborts_run() {
    let mut script = Script::default().with_listings(3);
    script.token = (401, json!({"error": "invalid_grant"}));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();

    assert!(matches!(err, InvestError::Auth(_)));
    assert!(err.to_string().contains("401"));
    assert_eq!(fake.recorded().calls, vec!["token"]);
}

#[tokio::test]
async fn test_token_response_without_access_token() {
    let mut script = Script::default();
    script.token = (200, json!({"token_type": "bearer"}));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();
    assert!(matches!(err, InvestError::Auth(_)));
}

#[tokio::test]
async fn test_empty_listings_complete_without_bids() {
    let fake = FakeProsper::start(Script::default().with_balance(1000.0)).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let report = Runner::new(&cfg, &secrets, &client).run().await.unwrap();

    assert!(report.placed.is_empty());
    assert!(!report.insufficient_funds);
    assert_eq!(fake.recorded().calls, vec!["token", "account", "listings"]);
}

#[tokio::test]
async fn test_listings_server_error_is_fatal() {
    let mut script = Script::default();
    script.listings = (500, json!({"message": "boom"}));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();
    assert!(matches!(err, InvestError::Api { endpoint: "listings", .. }));
    assert!(!fake.recorded().calls.contains(&"orders"));
}

#[tokio::test]
async fn test_rejected_bid_is_logged_and_skipped() {
    let mut script = Script::default().with_balance(400.0).with_listings(5);
    script.order_statuses = VecDeque::from([200, 400, 200]);
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let report = Runner::new(&cfg, &secrets, &client).run().await.unwrap();

    let placed: Vec<u64> = report.placed.iter().map(|b| b.listing_number).collect();
    assert_eq!(placed, vec![1001, 1003, 1004]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].bid.listing_number, 1002);
    assert_eq!(report.failed[0].rejection.status, 400);
    assert!(report.failed[0].rejection.body.contains("not biddable"));
    assert_eq!(fake.recorded().orders.len(), 4);
}

#[tokio::test]
async fn test_rejected_bid_aborts_under_abort_policy() {
    let mut script = Script::default().with_balance(400.0).with_listings(5);
    script.order_statuses = VecDeque::from([200, 500]);
    let fake = FakeProsper::start(script).await;
    let mut cfg = config(&fake, 100);
    cfg.bid_failure_policy = BidFailurePolicy::Abort;
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();

    assert!(matches!(err, InvestError::Bid { listing_number: 1002, .. }));
    assert_eq!(fake.recorded().orders.len(), 2);
}

#[tokio::test]
async fn test_slow_listings_endpoint_times_out() {
    let mut script = Script::default().with_listings(2);
    script.listings_delay = Some(Duration::from_secs(12));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();

    assert!(matches!(err, InvestError::Timeout { endpoint: "listings", .. }));
    assert!(!fake.recorded().calls.contains(&"orders"));
}

#[tokio::test]
async fn test_malformed_token_body_is_auth_error() {
    let mut script = Script::default();
    script.token = (200, json!("not an object"));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();

    assert!(matches!(err, InvestError::Auth(_)));
    assert!(err.to_string().contains("malformed token response"));
}

#[tokio::test]
async fn test_malformed_listings_body_is_api_error() {
    let mut script = Script::default().with_balance(500.0);
    script.listings = (200, json!({"result": "nope"}));
    let fake = FakeProsper::start(script).await;
    let cfg = config(&fake, 100);
    let client = ProsperClient::new(cfg.endpoints.clone()).unwrap();
    let secrets = secrets();

    let err = Runner::new(&cfg, &secrets, &client).run().await.unwrap_err();

    assert!(matches!(err, InvestError::Api { endpoint: "listings", .. }));
    assert!(!fake.recorded().calls.contains(&"orders"));
}
