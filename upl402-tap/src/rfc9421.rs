//! HTTP message signatures, RFC 9421 subset.
//!
//! Covers two derived components, `@authority` and `@path`, which is enough
//! to bind a signature to a specific endpoint of a specific host. The
//! signature base is rebuilt byte-for-byte by the verifier, so its
//! construction must be deterministic: same components and parameters, same
//! bytes, always.
//!
//! Signing uses Ed25519 through the Solana signer stack, so a wallet keypair
//! doubles as the agent's authentication key. Ed25519 is deterministic;
//! callers must not assume that property for other algorithms.

use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use upl402::encoding::Base64Bytes;
use upl402::proto::generate_nonce;
use upl402::timestamp::UnixTimestamp;
use url::Url;

/// Label under which the signature is emitted in both headers.
pub const SIGNATURE_LABEL: &str = "sig2";

/// Seconds a signature stays valid after creation.
pub const SIGNATURE_VALIDITY_SECS: u64 = 300;

/// Header carrying the signature parameters.
pub const SIGNATURE_INPUT_HEADER: &str = "Signature-Input";

/// Header carrying the signature itself.
pub const SIGNATURE_HEADER: &str = "Signature";

/// Errors from signing or verifying a message signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The underlying signer refused to sign.
    #[error("signing failed: {0}")]
    Signing(String),
    /// A signature header did not have the expected `sig2=:base64:` shape.
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),
}

/// The signature algorithm in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// Ed25519 over the UTF-8 bytes of the signature base.
    #[default]
    Ed25519,
}

impl SignatureAlgorithm {
    /// The `alg` parameter value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
        }
    }
}

/// Distinguishes what a signature authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureTag {
    /// Interactive browsing on behalf of a user.
    BrowserAuth,
    /// Autonomous payer calls against directory and paid services.
    PayerAuth,
}

impl SignatureTag {
    /// The `tag` parameter value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BrowserAuth => "agent-browser-auth",
            Self::PayerAuth => "agent-payer-auth",
        }
    }
}

/// The covered request components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureComponents {
    /// The `@authority` component: host, plus port when non-default.
    pub authority: String,
    /// The `@path` component: path plus query string.
    pub path: String,
}

impl SignatureComponents {
    /// Extracts the covered components from a request URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut authority = url.host_str().unwrap_or_default().to_string();
        if let Some(port) = url.port() {
            authority.push(':');
            authority.push_str(&port.to_string());
        }
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Self { authority, path }
    }
}

/// The signature parameters, rendered into the `@signature-params` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    /// Creation time.
    pub created: UnixTimestamp,
    /// Expiry time, normally `created + SIGNATURE_VALIDITY_SECS`.
    pub expires: UnixTimestamp,
    /// Identifier of the signing key.
    pub key_id: String,
    /// Signature algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Per-signature replay-protection nonce.
    pub nonce: String,
    /// What the signature authorizes.
    pub tag: SignatureTag,
}

impl SignatureParams {
    /// Creates parameters valid from now for the standard window, with a
    /// fresh nonce.
    #[must_use]
    pub fn new(key_id: impl Into<String>, tag: SignatureTag) -> Self {
        let created = UnixTimestamp::now();
        Self {
            created,
            expires: created + SIGNATURE_VALIDITY_SECS,
            key_id: key_id.into(),
            algorithm: SignatureAlgorithm::default(),
            nonce: generate_nonce(),
            tag,
        }
    }

    /// Renders the ordered, semicolon-separated parameter list shared by the
    /// signature base and the `Signature-Input` header.
    #[must_use]
    pub fn parameter_list(&self) -> String {
        format!(
            "(\"@authority\" \"@path\"); created={}; expires={}; keyid=\"{}\"; alg=\"{}\"; nonce=\"{}\"; tag=\"{}\"",
            self.created,
            self.expires,
            self.key_id,
            self.algorithm.as_str(),
            self.nonce,
            self.tag.as_str(),
        )
    }
}

/// The rendered header pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// Value for the `Signature-Input` header.
    pub signature_input: String,
    /// Value for the `Signature` header.
    pub signature: String,
}

/// Builds the canonical signature base.
///
/// Newline-joined covered-component lines followed by the
/// `@signature-params` line. The signature is computed over exactly these
/// bytes; any deviation on either side makes verification fail.
#[must_use]
pub fn signature_base(components: &SignatureComponents, params: &SignatureParams) -> String {
    [
        format!("\"@authority\": {}", components.authority),
        format!("\"@path\": {}", components.path),
        format!("\"@signature-params\": {}", params.parameter_list()),
    ]
    .join("\n")
}

/// Signs the base and renders the `Signature-Input`/`Signature` pair.
///
/// The signature bytes use the structured-field binary-sequence encoding:
/// base64 delimited by colons.
///
/// # Errors
///
/// Returns [`SignatureError::Signing`] when the signer refuses.
pub fn sign<S: Signer>(
    components: &SignatureComponents,
    params: &SignatureParams,
    signer: &S,
) -> Result<SignatureHeaders, SignatureError> {
    let base = signature_base(components, params);
    let signature = signer
        .try_sign_message(base.as_bytes())
        .map_err(|e| SignatureError::Signing(e.to_string()))?;
    let encoded = Base64Bytes::encode(signature.as_ref()).into_string();
    Ok(SignatureHeaders {
        signature_input: format!("{SIGNATURE_LABEL}={}", params.parameter_list()),
        signature: format!("{SIGNATURE_LABEL}=:{encoded}:"),
    })
}

/// Verifies a `Signature` header value against a base and public key.
///
/// # Errors
///
/// Returns [`SignatureError::MalformedHeader`] when the header does not
/// parse; a well-formed header that simply does not match yields `Ok(false)`.
pub fn verify(
    public_key: &Pubkey,
    base: &str,
    signature_header: &str,
) -> Result<bool, SignatureError> {
    let malformed = || SignatureError::MalformedHeader(signature_header.to_string());
    let encoded = signature_header
        .strip_prefix(SIGNATURE_LABEL)
        .and_then(|rest| rest.strip_prefix("=:"))
        .and_then(|rest| rest.strip_suffix(':'))
        .ok_or_else(malformed)?;
    let bytes = Base64Bytes::from(encoded).decode().map_err(|_| malformed())?;
    let signature = Signature::try_from(bytes.as_slice()).map_err(|_| malformed())?;
    Ok(signature.verify(public_key.as_ref(), base.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_keypair::Keypair;

    fn components() -> SignatureComponents {
        SignatureComponents {
            authority: "api.example.com".into(),
            path: "/v1/infer?q=1".into(),
        }
    }

    fn params() -> SignatureParams {
        SignatureParams {
            created: UnixTimestamp::from_secs(1_700_000_000),
            expires: UnixTimestamp::from_secs(1_700_000_300),
            key_id: "test-key".into(),
            algorithm: SignatureAlgorithm::Ed25519,
            nonce: "deadbeef".into(),
            tag: SignatureTag::PayerAuth,
        }
    }

    #[test]
    fn test_signature_base_is_byte_exact() {
        let base = signature_base(&components(), &params());
        assert_eq!(
            base,
            "\"@authority\": api.example.com\n\
             \"@path\": /v1/infer?q=1\n\
             \"@signature-params\": (\"@authority\" \"@path\"); created=1700000000; expires=1700000300; keyid=\"test-key\"; alg=\"ed25519\"; nonce=\"deadbeef\"; tag=\"agent-payer-auth\""
        );
    }

    #[test]
    fn test_signature_base_is_deterministic() {
        assert_eq!(
            signature_base(&components(), &params()),
            signature_base(&components(), &params())
        );
    }

    #[test]
    fn test_changing_any_parameter_changes_base() {
        let base = signature_base(&components(), &params());
        let mut other = params();
        other.nonce = "deadbeff".into();
        assert_ne!(base, signature_base(&components(), &other));
        let mut other = params();
        other.tag = SignatureTag::BrowserAuth;
        assert_ne!(base, signature_base(&components(), &other));
    }

    #[test]
    fn test_components_from_url() {
        let url = Url::parse("https://api.example.com/v1/infer?q=1").unwrap();
        assert_eq!(SignatureComponents::from_url(&url), components());

        let url = Url::parse("http://localhost:8080/agents/discover").unwrap();
        let c = SignatureComponents::from_url(&url);
        assert_eq!(c.authority, "localhost:8080");
        assert_eq!(c.path, "/agents/discover");
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let keypair = Keypair::new();
        let headers = sign(&components(), &params(), &keypair).unwrap();
        assert!(headers.signature_input.starts_with("sig2=(\"@authority\""));

        let base = signature_base(&components(), &params());
        assert!(verify(&keypair.pubkey(), &base, &headers.signature).unwrap());
    }

    #[test]
    fn test_verify_fails_on_single_byte_change() {
        let keypair = Keypair::new();
        let headers = sign(&components(), &params(), &keypair).unwrap();
        let base = signature_base(&components(), &params());
        let mut tampered = base.into_bytes();
        tampered[0] ^= 1;
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(!verify(&keypair.pubkey(), &tampered, &headers.signature).unwrap());
    }

    #[test]
    fn test_verify_fails_for_wrong_key() {
        let keypair = Keypair::new();
        let headers = sign(&components(), &params(), &keypair).unwrap();
        let base = signature_base(&components(), &params());
        assert!(!verify(&Keypair::new().pubkey(), &base, &headers.signature).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_header() {
        let keypair = Keypair::new();
        let base = signature_base(&components(), &params());
        assert!(matches!(
            verify(&keypair.pubkey(), &base, "sig2=no-colons"),
            Err(SignatureError::MalformedHeader(_))
        ));
    }
}
