//! Core domain types shared across the crate.
//!
//! Amounts are `rust_decimal::Decimal` — never f64 for money.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{InvestError, Result};

// ---------------------------------------------------------------------------
// Investment amount
// ---------------------------------------------------------------------------

/// Fixed stake placed on every bid during one run. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvestmentAmount(u64);

impl InvestmentAmount {
    pub fn new(amount: u64) -> Result<Self> {
        if amount == 0 {
            return Err(InvestError::Config(
                "INVESTMENT_AMOUNT must be a positive integer".into(),
            ));
        }
        Ok(Self(amount))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn as_decimal(self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for InvestmentAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl std::str::FromStr for InvestmentAmount {
    type Err = InvestError;

    fn from_str(s: &str) -> Result<Self> {
        let amount = s.trim().parse::<u64>().map_err(|_| {
            InvestError::Config(format!(
                "INVESTMENT_AMOUNT must be a positive integer, got {s:?}"
            ))
        })?;
        Self::new(amount)
    }
}

// ---------------------------------------------------------------------------
// Listings and bids
// ---------------------------------------------------------------------------

/// A loan listing returned by the marketplace.
///
/// Only `listing_number` is interpreted; every other field is carried
/// through untouched so it can be logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub listing_number: u64,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Listing {
    pub fn new(listing_number: u64) -> Self {
        Self {
            listing_number,
            attributes: serde_json::Map::new(),
        }
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listing #{}", self.listing_number)
    }
}

/// Instruction to bid `amount` on one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidCommand {
    pub listing_number: u64,
    pub amount: InvestmentAmount,
}

impl fmt::Display for BidCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bid {} on listing #{}", self.amount, self.listing_number)
    }
}

/// Result of a bid whose HTTP round trip completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidOutcome {
    Success,
    Failure(BidRejection),
}

/// Details of a bid the marketplace refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidRejection {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for BidRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "HTTP {}", self.status)
        } else {
            write!(f, "HTTP {}: {}", self.status, self.body)
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Account summary. Only the available cash matters to a run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub available_cash_balance: Option<Decimal>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The four secrets needed to obtain an access token.
#[derive(Debug)]
pub struct Credentials {
    pub user: SecretString,
    pub password: SecretString,
    pub client_id: SecretString,
    pub client_secret: SecretString,
}

/// OAuth bearer token for the duration of one run.
#[derive(Debug)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: String) -> Self {
        Self(SecretString::new(token))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

// ---------------------------------------------------------------------------
// Listing criteria
// ---------------------------------------------------------------------------

/// Scalar filter value. Numbers keep the text they were written with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// One listing filter: either a scalar or a list of scalars.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl CriterionValue {
    /// Query-string form. Lists are joined with commas.
    pub fn to_query_value(&self) -> String {
        match self {
            CriterionValue::Scalar(s) => s.to_string(),
            CriterionValue::List(items) => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Investor-supplied listing filters, keyed by marketplace query parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(BTreeMap<String, CriterionValue>);

impl Criteria {
    /// Parse a JSON object such as `{"prosper_rating": ["A", "B"], "term": 36}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| InvestError::Config(format!("INVESTMENT_CRITERIA is not valid JSON: {e}")))?;

        let object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(InvestError::Config(format!(
                    "INVESTMENT_CRITERIA must be a JSON object, got {other}"
                )))
            }
        };

        let mut filters = BTreeMap::new();
        for (key, value) in object {
            let parsed: CriterionValue = serde_json::from_value(value.clone()).map_err(|_| {
                InvestError::Config(format!(
                    "criterion {key:?} must be a scalar or a list of scalars, got {value}"
                ))
            })?;
            filters.insert(key, parsed);
        }
        Ok(Self(filters))
    }

    pub fn get(&self, key: &str) -> Option<&CriterionValue> {
        self.0.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Remove a `limit` entry, returning it as a page size.
    ///
    /// The listings endpoint takes `limit` alongside the filters, so an
    /// investor can set it from the criteria object.
    pub fn take_limit(&mut self) -> Result<Option<u32>> {
        match self.0.remove("limit") {
            None => Ok(None),
            Some(CriterionValue::Scalar(Scalar::Number(n))) if n.as_u64().is_some_and(|v| v > 0) => {
                n.as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .map(Some)
                    .ok_or_else(|| InvestError::Config(format!("criterion \"limit\" is too large: {n}")))
            }
            Some(other) => Err(InvestError::Config(format!(
                "criterion \"limit\" must be a positive integer, got {}",
                other.to_query_value()
            ))),
        }
    }

    /// Query parameters for the listings endpoint.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_query_value()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
