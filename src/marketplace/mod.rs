//! Marketplace integration.
//!
//! Defines the `Marketplace` trait consumed by the runner and the
//! Prosper REST implementation of it.

pub mod prosper;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccessToken, Account, BidCommand, BidOutcome, Credentials, Criteria, Listing};

/// Abstraction over the lending marketplace API.
///
/// Each method performs exactly one request. Only `place_bid` reports a
/// non-success HTTP status as a value instead of an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Exchange the investor's credentials for a bearer token.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken>;

    /// Fetch the account summary, including available cash.
    async fn fetch_account(&self, token: &AccessToken) -> Result<Account>;

    /// Fetch up to `limit` listings matching `criteria`, in marketplace order.
    async fn fetch_listings(
        &self,
        token: &AccessToken,
        criteria: &Criteria,
        limit: u32,
    ) -> Result<Vec<Listing>>;

    /// Submit one bid.
    async fn place_bid(&self, token: &AccessToken, bid: &BidCommand) -> Result<BidOutcome>;
}
