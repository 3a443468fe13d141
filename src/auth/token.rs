//! Token model and the validity predicate shared by every flow.

pub mod secret;

// self
use crate::{_prelude::*, auth::token::secret::Secret};

/// Smallest leeway ever applied when judging whether a token is still usable.
pub const MIN_EXPIRY_DELTA: Duration = Duration::seconds(10);

/// Token type reported when the provider omits one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// OAuth token as persisted on credential entries.
///
/// A missing expiry means the token never expires.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
	/// Access token presented to resource servers.
	#[serde(default)]
	pub access_token: Secret,
	/// Token type (usually `Bearer`).
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub token_type: String,
	/// Refresh token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<Secret>,
	/// Instant after which the access token is no longer accepted.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub expiry: Option<OffsetDateTime>,
	/// Additional response fields returned by the provider.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl Token {
	/// Creates a bearer token with no expiry and no refresh token.
	pub fn bearer(access_token: impl Into<Secret>) -> Self {
		Self {
			access_token: access_token.into(),
			token_type: DEFAULT_TOKEN_TYPE.into(),
			..Default::default()
		}
	}

	/// Sets the expiry instant.
	pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
		self.expiry = Some(expiry);

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<Secret>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}

	/// Adds an extra response field.
	pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.extra.insert(key.into(), value);

		self
	}

	/// Token type, falling back to [`DEFAULT_TOKEN_TYPE`].
	pub fn token_type(&self) -> &str {
		if self.token_type.is_empty() { DEFAULT_TOKEN_TYPE } else { &self.token_type }
	}

	/// Returns the refresh token when one is present and non-empty.
	pub fn refresh_secret(&self) -> Option<&Secret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Returns `true` when the token carries an access token.
	pub fn is_issued(&self) -> bool {
		!self.access_token.is_empty()
	}

	/// Returns `true` when the token expires within `delta` of `now`.
	///
	/// `delta` is raised to [`MIN_EXPIRY_DELTA`] first. Tokens without an expiry never expire.
	/// A `delta` reaching past the representable range counts as expired.
	pub fn is_expired_at(&self, now: OffsetDateTime, delta: Duration) -> bool {
		match self.expiry {
			None => false,
			Some(expiry) => expiry
				.checked_sub(effective_expiry_delta(delta))
				.is_none_or(|deadline| deadline <= now),
		}
	}

	/// Returns `true` when the token is issued and not expired at `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime, delta: Duration) -> bool {
		self.is_issued() && !self.is_expired_at(now, delta)
	}

	/// Fills in the refresh token from `previous` when this token did not carry one.
	pub(crate) fn inherit_refresh_token(mut self, previous: Option<&Token>) -> Self {
		if self.refresh_secret().is_none() {
			self.refresh_token = previous.and_then(|token| token.refresh_secret()).cloned();
		}

		self
	}
}

/// Raises `requested` to [`MIN_EXPIRY_DELTA`].
pub fn effective_expiry_delta(requested: Duration) -> Duration {
	requested.max(MIN_EXPIRY_DELTA)
}

/// Validity predicate over an optional token.
///
/// An absent token is never valid.
pub fn token_valid(token: Option<&Token>, now: OffsetDateTime, delta: Duration) -> bool {
	token.is_some_and(|token| token.is_valid_at(now, delta))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const NOW: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);

	#[test]
	fn absent_or_empty_tokens_are_invalid() {
		assert!(!token_valid(None, NOW, Duration::ZERO));
		assert!(!token_valid(Some(&Token::default()), NOW, Duration::ZERO));
	}

	#[test]
	fn tokens_without_expiry_never_expire() {
		let token = Token::bearer("access");

		assert!(token_valid(Some(&token), NOW, Duration::days(3650)));
	}

	#[test]
	fn delta_is_raised_to_the_floor() {
		let token = Token::bearer("access").with_expiry(NOW + Duration::seconds(9));

		assert!(!token.is_valid_at(NOW, Duration::ZERO), "Nine seconds is inside the floor.");

		let token = Token::bearer("access").with_expiry(NOW + Duration::seconds(11));

		assert!(token.is_valid_at(NOW, Duration::ZERO));
		assert!(!token.is_valid_at(NOW, Duration::seconds(11)), "Boundary is exclusive.");
	}

	#[test]
	fn validity_check_is_pure() {
		let token = Token::bearer("access").with_expiry(NOW + Duration::minutes(5));
		let first = token.is_valid_at(NOW, Duration::minutes(1));
		let second = token.is_valid_at(NOW, Duration::minutes(1));

		assert_eq!(first, second);
		assert!(first);
	}

	#[test]
	fn refresh_token_is_inherited_only_when_missing() {
		let previous = Token::bearer("old").with_refresh_token("r1");
		let rotated = Token::bearer("new").with_refresh_token("r2").inherit_refresh_token(Some(&previous));
		let kept = Token::bearer("new").inherit_refresh_token(Some(&previous));

		assert_eq!(rotated.refresh_secret().map(Secret::expose), Some("r2"));
		assert_eq!(kept.refresh_secret().map(Secret::expose), Some("r1"));
	}

	#[test]
	fn expiry_serializes_as_rfc3339() {
		let token = Token::bearer("access").with_expiry(NOW);
		let payload = serde_json::to_value(&token).expect("Token should serialize.");

		assert_eq!(payload["expiry"], "2025-03-01T12:00:00Z");

		let decoded: Token = serde_json::from_value(payload).expect("Token should deserialize.");

		assert_eq!(decoded, token);
	}

	#[test]
	fn oversized_deltas_count_as_expired() {
		let token = Token::bearer("access").with_expiry(NOW + Duration::hours(1));

		assert!(token.is_expired_at(NOW, Duration::days(365 * 20_000)));
		assert!(!token_valid(Some(&token), NOW, Duration::MAX));
	}
}
