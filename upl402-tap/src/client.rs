//! Signed directory client for agent registration and discovery.
//!
//! Every call to the directory carries the RFC 9421 header pair, signed with
//! the agent's wallet key under the `agent-payer-auth` tag. Once the agent
//! holds an identity (from registration or configuration), its identity
//! headers ride along on every signed request.

use crate::rfc9421::{
    SIGNATURE_HEADER, SIGNATURE_INPUT_HEADER, SignatureComponents, SignatureError, SignatureParams,
    SignatureTag, sign,
};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_signer::Signer;
use tokio::sync::RwLock;
use url::Url;

/// Header carrying the agent's decentralized identifier.
pub const AGENT_DID_HEADER: &str = "X-Agent-DID";

/// Header carrying the agent's certificate reference.
pub const AGENT_CERT_HEADER: &str = "X-Agent-Cert";

/// Header carrying the agent's wallet address.
pub const AGENT_WALLET_HEADER: &str = "X-Agent-Wallet";

/// Configuration for a [`TapClient`].
#[derive(Debug, Clone, Default)]
pub struct TapConfig {
    /// Identifier of the signing key, used as the `keyid` parameter.
    pub key_id: String,
    /// Decentralized identifier; derived from the key id when absent.
    pub did: Option<String>,
    /// Certificate reference; falls back to the key id when absent.
    pub cert: Option<String>,
    /// Base URL of the directory service. Registration and discovery fail
    /// with [`TapClientError::DirectoryUnavailable`] when unset.
    pub registry_url: Option<Url>,
}

/// An agent known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    /// Decentralized identifier.
    pub did: String,
    /// Certificate reference.
    pub cert: String,
    /// Settlement wallet address.
    pub wallet_address: String,
    /// Directory-assigned reputation score, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation: Option<f64>,
}

/// Errors from directory interactions.
#[derive(Debug, thiserror::Error)]
pub enum TapClientError {
    /// No directory URL is configured.
    #[error("no directory service configured")]
    DirectoryUnavailable,
    /// Signing the request failed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    /// Building the endpoint URL failed.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
}

/// A directory client that signs every outbound request.
pub struct TapClient<S> {
    signer: S,
    config: TapConfig,
    http: Client,
    identity: RwLock<Option<AgentIdentity>>,
}

impl<S> std::fmt::Debug for TapClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: Signer> TapClient<S> {
    /// Creates a client for the given signing key, optionally seeded with an
    /// identity obtained out of band.
    #[must_use]
    pub fn new(signer: S, config: TapConfig, identity: Option<AgentIdentity>) -> Self {
        Self {
            signer,
            config,
            http: Client::new(),
            identity: RwLock::new(identity),
        }
    }

    /// The identity currently attached to outbound requests, if any.
    pub async fn identity(&self) -> Option<AgentIdentity> {
        self.identity.read().await.clone()
    }

    /// Signs a request URL, returning the headers to attach: the RFC 9421
    /// pair plus identity headers when an identity is held.
    ///
    /// # Errors
    ///
    /// Returns [`TapClientError::Signature`] when signing fails.
    pub async fn signed_headers(
        &self,
        url: &Url,
        tag: SignatureTag,
    ) -> Result<Vec<(&'static str, String)>, TapClientError> {
        let components = SignatureComponents::from_url(url);
        let params = SignatureParams::new(self.config.key_id.clone(), tag);
        let signature = sign(&components, &params, &self.signer)?;

        let mut headers = vec![
            (SIGNATURE_INPUT_HEADER, signature.signature_input),
            (SIGNATURE_HEADER, signature.signature),
        ];
        if let Some(identity) = self.identity.read().await.as_ref() {
            headers.push((AGENT_DID_HEADER, identity.did.clone()));
            headers.push((AGENT_CERT_HEADER, identity.cert.clone()));
            headers.push((AGENT_WALLET_HEADER, identity.wallet_address.clone()));
        }
        Ok(headers)
    }

    /// Registers this agent with the directory and holds the returned
    /// identity for subsequent requests.
    ///
    /// # Errors
    ///
    /// Returns [`TapClientError::DirectoryUnavailable`] when no directory
    /// URL is configured, and transport/status errors otherwise.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "upl402.tap.register_agent", skip_all, err)
    )]
    pub async fn register_agent(
        &self,
        wallet_address: &str,
        stake: Option<f64>,
    ) -> Result<AgentIdentity, TapClientError> {
        let url = self.endpoint("agents/register")?;
        let did = self
            .config
            .did
            .clone()
            .unwrap_or_else(|| format!("did:upl:{}", self.config.key_id));
        let cert = self
            .config
            .cert
            .clone()
            .unwrap_or_else(|| self.config.key_id.clone());
        let registration = json!({
            "did": did,
            "walletAddress": wallet_address,
            "cert": cert,
            "publicKey": self.signer.pubkey().to_string(),
            "algorithm": "ed25519",
            "stake": stake.unwrap_or(0.0),
        });

        let response: RegisterResponse = self
            .request_json(Method::POST, url, Some(&registration), "POST /agents/register")
            .await?;
        *self.identity.write().await = Some(response.agent.clone());
        Ok(response.agent)
    }

    /// Queries the directory for agents matching the given filters.
    ///
    /// # Errors
    ///
    /// Returns [`TapClientError::DirectoryUnavailable`] when no directory
    /// URL is configured, and transport/status errors otherwise.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "upl402.tap.discover_agents", skip_all, err)
    )]
    pub async fn discover_agents(
        &self,
        filters: &[(&str, &str)],
    ) -> Result<Vec<AgentIdentity>, TapClientError> {
        let mut url = self.endpoint("agents/discover")?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        let response: DiscoverResponse = self
            .request_json(Method::GET, url, None, "GET /agents/discover")
            .await?;
        Ok(response.agents)
    }

    fn endpoint(&self, path: &str) -> Result<Url, TapClientError> {
        let base = self
            .config
            .registry_url
            .as_ref()
            .ok_or(TapClientError::DirectoryUnavailable)?;
        // Normalize: a single trailing slash keeps Url::join from eating the
        // last base path segment.
        let mut normalized = base.as_str().trim_end_matches('/').to_string();
        normalized.push('/');
        Url::parse(&normalized)
            .and_then(|base| base.join(path))
            .map_err(|e| TapClientError::UrlParse {
                context: "building directory endpoint",
                source: e,
            })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        context: &'static str,
    ) -> Result<T, TapClientError> {
        let headers = self.signed_headers(&url, SignatureTag::PayerAuth).await?;
        let mut request = self.http.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TapClientError::Http { context, source: e })?;

        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| TapClientError::JsonDeserialization { context, source: e })
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TapClientError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    agent: AgentIdentity,
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    agents: Vec<AgentIdentity>,
}
