//! Investment run driver.
//!
//! One invocation: load credentials → authenticate → read balance →
//! fetch listings → allocate and bid, one listing at a time. Every step
//! is awaited before the next starts.

use rust_decimal::Decimal;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::allocator::Allocator;
use super::report::{FailedBid, RunReport};
use crate::config::{BidFailurePolicy, RunConfig};
use crate::error::{InvestError, Result};
use crate::marketplace::Marketplace;
use crate::secrets::{load_credentials, CredentialProvider};
use crate::types::{Account, BidOutcome, Listing};

/// Drives a single investment run against injected collaborators.
pub struct Runner<'a> {
    config: &'a RunConfig,
    credentials: &'a dyn CredentialProvider,
    marketplace: &'a dyn Marketplace,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a RunConfig,
        credentials: &'a dyn CredentialProvider,
        marketplace: &'a dyn Marketplace,
    ) -> Self {
        Self {
            config,
            credentials,
            marketplace,
        }
    }

    /// Execute one run. Any error aborts the run where it occurred.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.execute(run_id)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn execute(&self, run_id: Uuid) -> Result<RunReport> {
        let cfg = self.config;
        let amount = cfg.investment_amount;

        info!(
            amount = amount.get(),
            limit = cfg.listings_limit,
            policy = ?cfg.bid_failure_policy,
            dry_run = cfg.dry_run,
            "Starting investment run"
        );

        let credentials = load_credentials(self.credentials).await?;
        let token = self.marketplace.authenticate(&credentials).await?;
        drop(credentials);

        let account = self.marketplace.fetch_account(&token).await?;
        let balance = available_balance(&account)?;
        info!(balance = %balance, "Available cash balance");

        let mut report = RunReport::new(run_id, cfg.dry_run, balance);

        if balance < amount.as_decimal() {
            info!(
                balance = %balance,
                amount = amount.get(),
                "Insufficient funds to invest."
            );
            report.insufficient_funds = true;
            return Ok(report);
        }

        let listings = self
            .marketplace
            .fetch_listings(&token, &cfg.criteria, cfg.listings_limit)
            .await?;
        report.listings_fetched = listings.len();

        let mut allocation = Allocator::new(amount).plan(balance, listings)?;
        while let Some((listing, bid)) = allocation.next() {
            info!(
                listing_number = listing.listing_number,
                "Investing in listing:\n{}",
                pretty(&listing)
            );

            if cfg.dry_run {
                info!("[DRY RUN] Would place {bid}");
                report.placed.push(bid);
                continue;
            }

            match self.marketplace.place_bid(&token, &bid).await? {
                BidOutcome::Success => report.placed.push(bid),
                BidOutcome::Failure(rejection) => {
                    warn!(
                        listing_number = bid.listing_number,
                        rejection = %rejection,
                        "Bid rejected"
                    );
                    if cfg.bid_failure_policy == BidFailurePolicy::Abort {
                        return Err(InvestError::Bid {
                            listing_number: bid.listing_number,
                            detail: rejection.to_string(),
                        });
                    }
                    if cfg.refund_failed_bids {
                        allocation.refund(&bid);
                    }
                    report.failed.push(FailedBid { bid, rejection });
                }
            }
        }

        report.remaining = allocation.remaining();
        if allocation.out_of_funds() {
            report.insufficient_funds = true;
            info!(
                remaining = %report.remaining,
                "Insufficient funds to invest. Available balance: {}",
                report.remaining
            );
        }

        info!(
            placed = report.placed.len(),
            failed = report.failed.len(),
            committed = %report.total_committed(),
            remaining = %report.remaining,
            "Run complete"
        );
        Ok(report)
    }
}

/// Available cash from the account summary. Absent or zero is treated as
/// a broken response rather than an empty account.
fn available_balance(account: &Account) -> Result<Decimal> {
    match account.available_cash_balance {
        Some(balance) if balance > Decimal::ZERO => Ok(balance),
        Some(balance) => Err(InvestError::api(
            "account",
            format!("available_cash_balance is not positive: {balance}"),
        )),
        None => Err(InvestError::api(
            "account",
            "Failed to fetch available_cash_balance from account info",
        )),
    }
}

fn pretty(listing: &Listing) -> String {
    serde_json::to_string_pretty(listing).unwrap_or_else(|_| listing.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
