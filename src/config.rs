//! Run configuration from environment variables.
//!
//! Everything a scheduled invocation needs is read from the process
//! environment (a `.env` file is honoured by the binary). The marketplace
//! endpoint table can be overridden from a TOML file.

use serde::Deserialize;
use std::fs;

use crate::error::{InvestError, Result};
use crate::types::{Criteria, InvestmentAmount};

/// Page size sent to the listings endpoint when the criteria don't set one.
pub const DEFAULT_LISTINGS_LIMIT: u32 = 10;

/// What to do when the marketplace rejects an individual bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BidFailurePolicy {
    /// Log the rejection and move on to the next listing.
    #[default]
    Continue,
    /// Abort the run on the first rejection.
    Abort,
}

impl std::str::FromStr for BidFailurePolicy {
    type Err = InvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(InvestError::Config(format!(
                "BID_FAILURE_POLICY must be \"continue\" or \"abort\", got {other:?}"
            ))),
        }
    }
}

/// Where the Prosper credentials are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Google Secret Manager in the given project.
    Gcp { project: String },
    /// Plain environment variables named after the secrets.
    Env,
}

/// Prosper API endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub token: String,
    pub account: String,
    pub listings: String,
    pub orders: String,
}

const TOKEN_PATH: &str = "/v1/security/oauth/token";
const ACCOUNT_PATH: &str = "/v1/accounts/prosper/";
const LISTINGS_PATH: &str = "/listingsvc/v2/listings/";
const ORDERS_PATH: &str = "/v1/orders/";
const PROSPER_BASE_URL: &str = "https://api.prosper.com";

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_base(PROSPER_BASE_URL)
    }
}

impl Endpoints {
    /// Standard Prosper paths rooted at `base` (e.g. a sandbox host).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            token: format!("{base}{TOKEN_PATH}"),
            account: format!("{base}{ACCOUNT_PATH}"),
            listings: format!("{base}{LISTINGS_PATH}"),
            orders: format!("{base}{ORDERS_PATH}"),
        }
    }

    /// Load overrides from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| InvestError::Config(format!("Failed to read endpoints file {path}: {e}")))?;
        Self::from_toml(&contents)
            .map_err(|e| InvestError::Config(format!("Failed to parse endpoints file {path}: {e}")))
    }

    fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Validated configuration for one investment run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub investment_amount: InvestmentAmount,
    pub criteria: Criteria,
    pub listings_limit: u32,
    pub bid_failure_policy: BidFailurePolicy,
    /// Add a rejected bid's stake back to the local balance.
    pub refund_failed_bids: bool,
    pub dry_run: bool,
    pub secret_source: SecretSource,
    pub endpoints: Endpoints,
}

impl RunConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let investment_amount: InvestmentAmount = var("INVESTMENT_AMOUNT")
            .ok_or_else(|| {
                InvestError::Config("INVESTMENT_AMOUNT environment variable is not set.".into())
            })?
            .parse()?;

        let raw_criteria = var("INVESTMENT_CRITERIA").ok_or_else(|| {
            InvestError::Config("INVESTMENT_CRITERIA environment variable is not set.".into())
        })?;
        let mut criteria = Criteria::from_json(&raw_criteria)?;
        let listings_limit = criteria.take_limit()?.unwrap_or(DEFAULT_LISTINGS_LIMIT);

        let bid_failure_policy = match var("BID_FAILURE_POLICY") {
            Some(raw) => raw.parse()?,
            None => BidFailurePolicy::default(),
        };

        let refund_failed_bids = parse_flag("REFUND_FAILED_BIDS", var("REFUND_FAILED_BIDS"))?;
        let dry_run = parse_flag("DRY_RUN", var("DRY_RUN"))?;

        let secret_source = match var("SECRET_SOURCE").as_deref().map(str::trim) {
            None | Some("gcp") => SecretSource::Gcp {
                project: var("GCP_PROJECT").ok_or_else(|| {
                    InvestError::Config("GCP_PROJECT environment variable is not set.".into())
                })?,
            },
            Some("env") => SecretSource::Env,
            Some(other) => {
                return Err(InvestError::Config(format!(
                    "SECRET_SOURCE must be \"gcp\" or \"env\", got {other:?}"
                )))
            }
        };

        let endpoints = match var("PROSPER_ENDPOINTS_FILE") {
            Some(path) => Endpoints::load(&path)?,
            None => Endpoints::default(),
        };

        Ok(Self {
            investment_amount,
            criteria,
            listings_limit,
            bid_failure_policy,
            refund_failed_bids,
            dry_run,
            secret_source,
            endpoints,
        })
    }
}

fn parse_flag(name: &str, raw: Option<String>) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(InvestError::Config(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
