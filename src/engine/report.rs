//! Run report — what a single invocation did.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

use crate::types::{BidCommand, BidRejection};

/// A bid the marketplace refused.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedBid {
    pub bid: BidCommand,
    pub rejection: BidRejection,
}

/// Summary of one allocation run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Available cash reported by the marketplace at run start.
    pub balance: Decimal,
    pub listings_fetched: usize,
    pub placed: Vec<BidCommand>,
    pub failed: Vec<FailedBid>,
    /// Locally tracked balance after allocation.
    pub remaining: Decimal,
    /// The run stopped (or never started bidding) for lack of funds.
    pub insufficient_funds: bool,
}

impl RunReport {
    pub fn new(run_id: Uuid, dry_run: bool, balance: Decimal) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            dry_run,
            balance,
            listings_fetched: 0,
            placed: Vec::new(),
            failed: Vec::new(),
            remaining: balance,
            insufficient_funds: false,
        }
    }

    pub fn total_committed(&self) -> Decimal {
        self.placed.iter().map(|b| b.amount.as_decimal()).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {}{}: balance=${:.2} listings={} placed={} failed={} committed=${:.2} remaining=${:.2}{}",
            self.run_id,
            if self.dry_run { " [DRY RUN]" } else { "" },
            self.balance,
            self.listings_fetched,
            self.placed.len(),
            self.failed.len(),
            self.total_committed(),
            self.remaining,
            if self.insufficient_funds { " (insufficient funds)" } else { "" },
        )
    }
}
