//! Error classification hooks for token endpoint failures.
//!
//! Providers that talk to real authorization servers describe each failure with a
//! [`ProviderErrorContext`] and let a [`ProviderStrategy`] decide its category, so quirky
//! servers can be accommodated without touching the transport code.

// self
use crate::_prelude::*;

/// Token endpoint grants issued by the lifecycle engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization code grant.
	AuthorizationCode,
	/// Refresh token grant.
	RefreshToken,
	/// Client credentials grant.
	ClientCredentials,
	/// RFC 8693 token exchange.
	TokenExchange,
	/// RFC 8628 device code grant.
	DeviceCode,
}
impl GrantType {
	/// Returns the `grant_type` form value for the grant.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
			Self::ClientCredentials => "client_credentials",
			Self::TokenExchange => "urn:ietf:params:oauth:grant-type:token-exchange",
			Self::DeviceCode => "urn:ietf:params:oauth:grant-type:device_code",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy hook that classifies token endpoint errors.
pub trait ProviderStrategy
where
	Self: Send + Sync,
{
	/// Maps low-level HTTP/JSON errors into a [`ProviderErrorKind`].
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Provider failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
	/// Server rejected the grant (bad code, revoked refresh token, denied consent).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the grant covers.
	InsufficientScope,
	/// Device authorization not approved yet; keep polling.
	AuthorizationPending,
	/// Device flow polling too fast; keep polling at a longer interval.
	SlowDown,
	/// A provider option is unknown or malformed.
	InvalidOption,
	/// Operation not offered by the provider.
	Unsupported,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
///
/// Only primitive data is kept (status codes, OAuth fields, body preview) so strategies
/// stay decoupled from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy applying RFC 6749, 8628, and 8693 error codes.
///
/// Structured OAuth fields win, then body text hints, then the HTTP status code. Network
/// failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) = ctx.oauth_error.as_deref().and_then(match_exact_value) {
			return kind;
		}
		if let Some(kind) = classify_body(ctx.error_description.as_deref())
			.or_else(|| classify_body(ctx.body_preview.as_deref()))
		{
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf: String = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	let kind = match value.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" | "expired_token" | "invalid_request" =>
			ProviderErrorKind::InvalidGrant,
		"invalid_client" | "unauthorized_client" => ProviderErrorKind::InvalidClient,
		"invalid_scope" | "insufficient_scope" | "invalid_target" =>
			ProviderErrorKind::InsufficientScope,
		"authorization_pending" => ProviderErrorKind::AuthorizationPending,
		"slow_down" => ProviderErrorKind::SlowDown,
		"unsupported_grant_type" | "unsupported_token_type" => ProviderErrorKind::Unsupported,
		"temporarily_unavailable" | "server_error" => ProviderErrorKind::Transient,
		_ => return None,
	};

	Some(kind)
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(ProviderErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(ctx: ProviderErrorContext) -> ProviderErrorKind {
		DefaultProviderStrategy.classify_token_error(&ctx)
	}

	#[test]
	fn oauth_codes_take_precedence_over_status() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_http_status(503)
			.with_oauth_error("invalid_grant");

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn device_flow_codes_are_recognized() {
		let pending =
			ProviderErrorContext::new(GrantType::DeviceCode).with_oauth_error("authorization_pending");
		let slow = ProviderErrorContext::new(GrantType::DeviceCode).with_oauth_error("slow_down");
		let expired = ProviderErrorContext::new(GrantType::DeviceCode).with_oauth_error("expired_token");

		assert_eq!(classify(pending), ProviderErrorKind::AuthorizationPending);
		assert_eq!(classify(slow), ProviderErrorKind::SlowDown);
		assert_eq!(classify(expired), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn status_and_network_fallbacks() {
		assert_eq!(
			classify(ProviderErrorContext::new(GrantType::ClientCredentials).with_http_status(401)),
			ProviderErrorKind::InvalidClient
		);
		assert_eq!(
			classify(ProviderErrorContext::new(GrantType::ClientCredentials).with_http_status(429)),
			ProviderErrorKind::Transient
		);
		assert_eq!(
			classify(ProviderErrorContext::network_failure(GrantType::TokenExchange)),
			ProviderErrorKind::Transient
		);
	}

	#[test]
	fn body_preview_is_truncated() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken).with_body_preview("x".repeat(400));
		let preview = ctx.body_preview.expect("Preview should be recorded.");

		assert_eq!(preview.chars().count(), ProviderErrorContext::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}
