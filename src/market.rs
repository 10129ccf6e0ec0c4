//! Currency quote lookup and the static commodity reference prices shown
//! next to it.

use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A buy/sell exchange rate and when it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub buy: Decimal,
    pub sell: Decimal,
    pub fetched_at: NaiveDateTime,
}

/// Body returned by the quote service
#[derive(Debug, Deserialize)]
struct QuotePayload {
    #[serde(default)]
    compra: Decimal,
    #[serde(default)]
    venta: Decimal,
}

impl QuotePayload {
    fn into_quote(self, fetched_at: NaiveDateTime) -> Quote {
        Quote {
            buy: self.compra,
            sell: self.venta,
            fetched_at,
        }
    }
}

/// Why a quote could not be fetched
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("quote service answered with status {0}")]
    Status(u16),
}

/// Anything that can produce a live quote
pub trait QuoteSource {
    fn fetch(&self) -> Result<Quote, QuoteError>;
}

/// Fetches `{"compra": .., "venta": ..}` JSON over HTTP
pub struct HttpQuoteSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpQuoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, QuoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpQuoteSource {
            url: url.into(),
            client,
        })
    }
}

impl QuoteSource for HttpQuoteSource {
    fn fetch(&self) -> Result<Quote, QuoteError> {
        debug!(url = %self.url, "fetching currency quote");
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::Status(status.as_u16()));
        }
        let payload: QuotePayload = response.json()?;
        Ok(payload.into_quote(Local::now().naive_local()))
    }
}

/// Result of a quote lookup. Failures are never fatal: the caller gets the
/// error together with whatever quote was last fetched successfully.
#[derive(Debug)]
pub enum QuoteOutcome {
    Live(Quote),
    Fallback {
        error: QuoteError,
        last_known: Option<Quote>,
    },
}

impl QuoteOutcome {
    /// The quote to display, live or last known
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            QuoteOutcome::Live(quote) => Some(quote),
            QuoteOutcome::Fallback { last_known, .. } => last_known.as_ref(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, QuoteOutcome::Live(_))
    }
}

/// A fixed reference price, not fetched from anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencePrice {
    pub name: &'static str,
    pub price: &'static str,
    pub source: &'static str,
}

pub const REFERENCE_PRICES: &[ReferencePrice] = &[
    ReferencePrice {
        name: "Soybean (Chicago)",
        price: "U$S 450/t",
        source: "check official source",
    },
    ReferencePrice {
        name: "Corn (Chicago)",
        price: "U$S 200/t",
        source: "check official source",
    },
    ReferencePrice {
        name: "Wheat (Chicago)",
        price: "U$S 250/t",
        source: "check official source",
    },
    ReferencePrice {
        name: "Steer (live kg)",
        price: "$1,800/kg",
        source: "Liniers market",
    },
    ReferencePrice {
        name: "Milk",
        price: "$280/l",
        source: "average price",
    },
];
