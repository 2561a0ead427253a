//! Prosper marketplace integration.
//!
//! Prosper exposes an OAuth2 password-grant token endpoint and a small set
//! of bearer-authenticated JSON endpoints.
//!
//! API docs: https://developers.prosper.com/docs/investor/
//! Token:    POST /v1/security/oauth/token (form encoded)
//! Account:  GET  /v1/accounts/prosper/
//! Listings: GET  /listingsvc/v2/listings/?limit=..&<filters>
//! Orders:   POST /v1/orders/ `{"bid_requests": [{"listing_id", "bid_amount"}]}`
//!
//! Every request is bounded by a 10 second timeout.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Marketplace;
use crate::config::Endpoints;
use crate::error::{InvestError, Result};
use crate::types::{
    AccessToken, Account, BidCommand, BidOutcome, BidRejection, Credentials, Criteria, Listing,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ceiling on every Prosper request, connect through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Prosper API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    result: Vec<Listing>,
}

#[derive(Debug, Serialize)]
struct OrderRequest {
    bid_requests: Vec<BidRequest>,
}

#[derive(Debug, Serialize)]
struct BidRequest {
    listing_id: u64,
    bid_amount: u64,
}

impl From<&BidCommand> for OrderRequest {
    fn from(bid: &BidCommand) -> Self {
        Self {
            bid_requests: vec![BidRequest {
                listing_id: bid.listing_number,
                bid_amount: bid.amount.get(),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Prosper REST client.
pub struct ProsperClient {
    http: Client,
    endpoints: Endpoints,
}

impl ProsperClient {
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("prosper-autoinvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InvestError::Config(format!("Failed to build HTTP client for Prosper: {e}")))?;

        Ok(Self { http, endpoints })
    }

    async fn send(&self, endpoint: &'static str, req: reqwest::RequestBuilder) -> Result<Response> {
        req.send()
            .await
            .map_err(|e| InvestError::from_transport(endpoint, REQUEST_TIMEOUT, e))
    }

    /// Read the full body and decode it as JSON. `malformed` maps a decode
    /// failure to the error the caller reports for this endpoint.
    async fn read_json<T, F>(endpoint: &'static str, resp: Response, malformed: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(serde_json::Error) -> InvestError,
    {
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| InvestError::from_transport(endpoint, REQUEST_TIMEOUT, e))?;
        serde_json::from_slice(&bytes).map_err(malformed)
    }

    /// Turn a non-success response into an `Api` error, keeping the body.
    async fn ensure_success(endpoint: &'static str, resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(InvestError::api(endpoint, format!("{status}: {body}")))
    }
}

#[async_trait]
impl Marketplace for ProsperClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken> {
        info!("Authenticating with Prosper...");

        let form = [
            ("grant_type", "password"),
            ("client_id", credentials.client_id.expose_secret().as_str()),
            ("client_secret", credentials.client_secret.expose_secret().as_str()),
            ("username", credentials.user.expose_secret().as_str()),
            ("password", credentials.password.expose_secret().as_str()),
        ];

        let req = self
            .http
            .post(&self.endpoints.token)
            .header(ACCEPT, JSON)
            .form(&form);
        let resp = self.send("token", req).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InvestError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = Self::read_json("token", resp, |e| {
            InvestError::Auth(format!("malformed token response: {e}"))
        })
        .await?;

        let token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| InvestError::Auth("token response has no access_token".into()))?;

        info!("Prosper authentication successful");
        Ok(AccessToken::new(token))
    }

    async fn fetch_account(&self, token: &AccessToken) -> Result<Account> {
        let req = self
            .http
            .get(&self.endpoints.account)
            .bearer_auth(token.expose())
            .header(ACCEPT, JSON);
        let resp = Self::ensure_success("account", self.send("account", req).await?).await?;

        let account: Account = Self::read_json("account", resp, |e| {
            InvestError::api("account", format!("malformed account response: {e}"))
        })
        .await?;

        debug!(available = ?account.available_cash_balance, "Account fetched");
        Ok(account)
    }

    async fn fetch_listings(
        &self,
        token: &AccessToken,
        criteria: &Criteria,
        limit: u32,
    ) -> Result<Vec<Listing>> {
        let req = self
            .http
            .get(&self.endpoints.listings)
            .bearer_auth(token.expose())
            .header(ACCEPT, JSON)
            .query(&[("limit", limit.to_string())])
            .query(&criteria.query_pairs());

        debug!(limit, filters = criteria.len(), "Fetching listings");
        let resp = Self::ensure_success("listings", self.send("listings", req).await?).await?;

        let listings: ListingsResponse = Self::read_json("listings", resp, |e| {
            InvestError::api("listings", format!("malformed listings response: {e}"))
        })
        .await?;

        info!(count = listings.result.len(), "Listings fetched");
        Ok(listings.result)
    }

    async fn place_bid(&self, token: &AccessToken, bid: &BidCommand) -> Result<BidOutcome> {
        let req = self
            .http
            .post(&self.endpoints.orders)
            .bearer_auth(token.expose())
            .header(ACCEPT, JSON)
            .json(&OrderRequest::from(bid));
        let resp = self.send("orders", req).await?;

        let status = resp.status();
        if status.is_success() {
            info!(
                listing_number = bid.listing_number,
                amount = bid.amount.get(),
                "Successfully bid {} on listing {}",
                bid.amount.get(),
                bid.listing_number
            );
            return Ok(BidOutcome::Success);
        }

        let body = resp.text().await.unwrap_or_default();
        warn!(
            listing_number = bid.listing_number,
            status = status.as_u16(),
            body = %body,
            "Error placing bid"
        );
        Ok(BidOutcome::Failure(BidRejection {
            status: status.as_u16(),
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
