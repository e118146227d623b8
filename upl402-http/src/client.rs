//! The payment executor.
//!
//! One [`PaymentClient`] serves one wallet. Payment cycles are serialized by
//! an internal lock held from the budget check through the ledger write, so
//! two concurrent requests on the same client cannot both pass the budget
//! check and together overspend it. Clients for different wallets share
//! nothing and run fully in parallel.
//!
//! A cycle broadcasts at most one transaction. The ledger is updated the
//! moment the transfer confirms, before the retried request is issued:
//! whatever the service says afterwards, the funds are gone.

use crate::config::PaymentClientConfig;
use reqwest::{Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use upl402::amount::Amount;
use upl402::error::PaymentError;
use upl402::ledger::{Direction, PaymentMetrics, PaymentRecord, SpendingTracker};
use upl402::proto::{PAYMENT_HEADER, PaymentPayload, PaymentRequirements};
use upl402::rail::TransferRail;

/// The HTTP client could not be constructed.
#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// An HTTP client that settles `402 Payment Required` responses on-chain.
pub struct PaymentClient<T> {
    http: reqwest::Client,
    rail: T,
    tracker: Mutex<SpendingTracker>,
    cycle: Mutex<()>,
}

impl<T> std::fmt::Debug for PaymentClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient").finish_non_exhaustive()
    }
}

impl<T: TransferRail> PaymentClient<T> {
    /// Creates a client that pays through the given rail.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new(rail: T, config: PaymentClientConfig) -> Result<Self, ClientBuildError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let tracker = SpendingTracker::new(rail.address(), config.hourly_limit);
        Ok(Self {
            http,
            rail,
            tracker: Mutex::new(tracker),
            cycle: Mutex::new(()),
        })
    }

    /// GET a resource, paying for it if the service demands payment.
    ///
    /// # Errors
    ///
    /// See [`PaymentClient::execute`]; additionally fails with
    /// [`PaymentError::Network`] when the body is not the expected JSON.
    pub async fn get<D: DeserializeOwned>(
        &self,
        url: &str,
        query: Option<&[(&str, &str)]>,
    ) -> Result<D, PaymentError> {
        let response = self.execute(Method::GET, url, query, None).await?;
        response
            .json()
            .await
            .map_err(|e| PaymentError::network("response body", e))
    }

    /// POST a JSON body, paying for the call if the service demands payment.
    ///
    /// # Errors
    ///
    /// See [`PaymentClient::execute`]; additionally fails with
    /// [`PaymentError::Network`] when the body is not the expected JSON.
    pub async fn post<D: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<&Value>,
    ) -> Result<D, PaymentError> {
        let response = self.execute(Method::POST, url, None, body).await?;
        response
            .json()
            .await
            .map_err(|e| PaymentError::network("response body", e))
    }

    /// Issues a request, settling a payment demand when one comes back.
    ///
    /// The cycle: issue the request unmodified; on `402 Payment Required`,
    /// parse and validate the requirement, check the hourly budget, settle
    /// through the rail, record the spend, and retry the request with the
    /// payment proof in the [`PAYMENT_HEADER`] header.
    ///
    /// # Errors
    ///
    /// Every variant of [`PaymentError`] according to its taxonomy; see the
    /// crate docs for which imply that funds moved.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "upl402.http.execute", skip(self, body, query), err)
    )]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<Response, PaymentError> {
        let response = self.send(method.clone(), url, query, body, None).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return response
                .error_for_status()
                .map_err(|e| PaymentError::network("request failed", e));
        }

        let requirements: PaymentRequirements = response
            .json()
            .await
            .map_err(|e| PaymentError::MalformedRequirement(format!("unparseable 402 body: {e}")))?;
        let amount = requirements.validate()?;

        #[cfg(feature = "telemetry")]
        tracing::info!(
            amount = %requirements.amount,
            asset = %requirements.asset,
            pay_to = %requirements.pay_to,
            "Payment required, settling on-chain"
        );

        // One payment cycle at a time per wallet: the budget read below and
        // the ledger write after the transfer must not interleave with
        // another cycle, or the budget under-counts.
        let _cycle = self.cycle.lock().await;

        if let Some(remaining) = self.tracker.lock().await.remaining_hourly_budget() {
            if amount.as_decimal() > remaining {
                return Err(PaymentError::BudgetExceeded {
                    requested: amount,
                    remaining,
                });
            }
        }

        let receipt = self.rail.transfer(&requirements).await?;

        // Spent funds are spent: the record stays no matter what the retried
        // request returns.
        self.tracker.lock().await.track(
            receipt.amount,
            &requirements.asset,
            Direction::Sent,
            &requirements.pay_to,
            Some(receipt.signature.clone()),
        );

        let payload = PaymentPayload::for_settlement(
            &requirements,
            self.rail.address(),
            receipt.signature.as_str(),
        );
        let header = payload
            .to_header()
            .map_err(|e| PaymentError::network("encode payment header", e))?;

        let paid = self.send(method, url, query, body, Some(header)).await?;
        if !paid.status().is_success() {
            return Err(PaymentError::SettlementRejected {
                status: paid.status().as_u16(),
                signature: receipt.signature,
            });
        }
        Ok(paid)
    }

    /// The wallet address payments are drawn from.
    #[must_use]
    pub fn payer_address(&self) -> String {
        self.rail.address()
    }

    /// The rail this client settles through.
    #[must_use]
    pub const fn rail(&self) -> &T {
        &self.rail
    }

    /// Lifetime payment metrics for this session.
    pub async fn metrics(&self) -> PaymentMetrics {
        self.tracker.lock().await.metrics()
    }

    /// Payment records newest-first, optionally truncated to `limit`.
    pub async fn history(&self, limit: Option<usize>) -> Vec<PaymentRecord> {
        self.tracker.lock().await.history(limit)
    }

    /// Amount spent in the current wall-clock hour.
    pub async fn spent_this_hour(&self) -> Decimal {
        self.tracker.lock().await.spent_this_hour()
    }

    /// Budget left in the current hour; `None` when no limit is configured.
    pub async fn remaining_hourly_budget(&self) -> Option<Decimal> {
        self.tracker.lock().await.remaining_hourly_budget()
    }

    /// Records an inbound payment, for sessions that earn as well as spend.
    pub async fn record_earnings(&self, amount: Amount, asset: &str, from: &str) {
        self.tracker.lock().await.record_earnings(amount, asset, from);
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&Value>,
        payment: Option<String>,
    ) -> Result<Response, PaymentError> {
        let mut request = self.http.request(method, url);
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(payment) = payment {
            request = request.header(PAYMENT_HEADER, payment);
        }
        request
            .send()
            .await
            .map_err(|e| PaymentError::network("request transport", e))
    }
}
