//! Investment allocator.
//!
//! Walks listings in marketplace order and emits one fixed-size bid per
//! listing until the locally tracked balance can no longer cover a bid.
//! The stake is deducted as soon as the bid is emitted, before the
//! marketplace confirms it, so a run never re-queries the balance.

use rust_decimal::Decimal;

use crate::error::{InvestError, Result};
use crate::types::{BidCommand, InvestmentAmount, Listing};

/// Greedy first-fit allocator for a fixed per-bid stake.
#[derive(Debug, Clone, Copy)]
pub struct Allocator {
    amount: InvestmentAmount,
}

impl Allocator {
    pub fn new(amount: InvestmentAmount) -> Self {
        Self { amount }
    }

    /// Start a lazy allocation over `listings`.
    ///
    /// Each listing is pulled only once funds for it are confirmed, so the
    /// source is never consumed past the point where allocation stops.
    pub fn plan<I>(&self, balance: Decimal, listings: I) -> Result<Allocation<I::IntoIter>>
    where
        I: IntoIterator<Item = Listing>,
    {
        if balance < Decimal::ZERO {
            return Err(InvestError::Config(format!(
                "available balance cannot be negative: {balance}"
            )));
        }
        Ok(Allocation {
            listings: listings.into_iter(),
            remaining: balance,
            amount: self.amount,
            out_of_funds: false,
        })
    }

    /// Allocate eagerly and return every bid in listing order.
    pub fn allocate<I>(&self, balance: Decimal, listings: I) -> Result<Vec<BidCommand>>
    where
        I: IntoIterator<Item = Listing>,
    {
        Ok(self.plan(balance, listings)?.map(|(_, bid)| bid).collect())
    }
}

/// In-progress allocation. Yields each listing alongside its bid.
#[derive(Debug)]
pub struct Allocation<I> {
    listings: I,
    remaining: Decimal,
    amount: InvestmentAmount,
    out_of_funds: bool,
}

impl<I> Allocation<I> {
    /// Balance left after the deductions made so far.
    pub fn remaining(&self) -> Decimal {
        self.remaining
    }

    /// Whether allocation stopped because the balance dropped below one stake.
    pub fn out_of_funds(&self) -> bool {
        self.out_of_funds
    }

    /// Give back the stake of a bid the marketplace rejected.
    pub fn refund(&mut self, bid: &BidCommand) {
        self.remaining += bid.amount.as_decimal();
        self.out_of_funds = false;
    }
}

impl<I> Iterator for Allocation<I>
where
    I: Iterator<Item = Listing>,
{
    type Item = (Listing, BidCommand);

    fn next(&mut self) -> Option<Self::Item> {
        if self.out_of_funds {
            return None;
        }
        if self.remaining < self.amount.as_decimal() {
            self.out_of_funds = true;
            return None;
        }

        let listing = self.listings.next()?;
        self.remaining -= self.amount.as_decimal();
        let bid = BidCommand {
            listing_number: listing.listing_number,
            amount: self.amount,
        };
        Some((listing, bid))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
