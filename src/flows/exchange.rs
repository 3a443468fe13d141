//! RFC 8693 token exchange with a per-credential cache keyed by the request shape.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, Token},
	backend::Backend,
	entry::AuthCodeEntry,
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::TokenExchangeOptions,
};

/// Scopes, audiences, and resources requested from an exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeRequest {
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Target audiences.
	pub audiences: Vec<String>,
	/// Target resources.
	pub resources: Vec<String>,
	/// Validity both the subject token and the exchanged token must keep.
	pub minimum_validity: Duration,
}
impl ExchangeRequest {
	/// Cache key for this request shape.
	pub fn signature(&self) -> ExchangeSignature {
		ExchangeSignature::new(&self.scopes, &self.audiences, &self.resources)
	}
}

/// Cache key of an exchanged token. Element order is significant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeSignature(String);
impl ExchangeSignature {
	/// Builds the signature for the given request shape.
	pub fn new(scopes: &[String], audiences: &[String], resources: &[String]) -> Self {
		Self(format!(
			"scopes={},audiences={},resources={}",
			scopes.join(" "),
			audiences.join(" "),
			resources.join(" ")
		))
	}

	/// Returns the signature as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for ExchangeSignature {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

impl Backend {
	/// Returns a token exchanged from credential `name`'s token for `request`.
	///
	/// The subject token is refreshed first when needed. Cached exchanged tokens are reused
	/// while they stay valid for `request.minimum_validity`. Returns `None` when the credential
	/// does not exist.
	pub async fn exchange(
		&self,
		name: &CredentialName,
		request: &ExchangeRequest,
	) -> Result<Option<Token>> {
		const KIND: OpKind = OpKind::Exchange;

		let span = OpSpan::new(KIND, "exchange");

		span.instrument(async move {
			let min_validity = request.minimum_validity;
			let Some(entry) = self.get_or_refresh(name, min_validity).await? else { return Ok(None) };

			usable_subject(&entry, self.clock().now(), min_validity)?;

			let signature = request.signature();

			if let Some(cached) = cached_exchange(&entry, &signature, self.clock().now(), min_validity) {
				return Ok(Some(cached));
			}

			let key = self.store().key::<AuthCodeEntry>(name);
			let locked = self.store().lock::<AuthCodeEntry>(&key).await;
			let Some(mut entry) = locked.read().await? else { return Ok(None) };

			usable_subject(&entry, self.clock().now(), min_validity)?;

			if let Some(cached) = cached_exchange(&entry, &signature, self.clock().now(), min_validity) {
				return Ok(Some(cached));
			}

			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let ops = self.server_operations(&entry.server_name, min_validity).await?;
			let Some(subject) = entry.token.clone() else { return Err(Error::TokenPending) };
			let options = TokenExchangeOptions {
				scopes: request.scopes.clone(),
				audiences: request.audiences.clone(),
				resources: request.resources.clone(),
				provider_options: entry.provider_options.clone(),
			};
			let issued = ops
				.with_secrets(|client| {
					let options = options.clone();
					let subject = &subject;

					async move { client.token_exchange(subject, options).await }
				})
				.await;
			let issued = match issued {
				Ok(issued) => issued.token,
				Err(e) => {
					obs::record_op_outcome(KIND, OpOutcome::Failure);
					tracing::warn!(credential = %name, error = %e, "token exchange failed");

					if e.is_user() {
						return Err(Error::Rejected { reason: format!("exchange failed: {e}") });
					}

					return Err(e.into());
				},
			};
			let now = self.clock().now();

			if !issued.is_valid_at(now, min_validity) {
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				return Err(Error::TokenExpired);
			}

			let issued = cacheable(issued);

			if issued.expiry.is_some() {
				entry.cache_exchanged(signature.as_str(), issued.clone(), now);
				locked.write(&entry).await?;
			}

			obs::record_op_outcome(KIND, OpOutcome::Success);

			Ok(Some(issued))
		})
		.await
	}
}

/// Maps an unusable subject credential onto the caller-facing error.
pub(crate) fn usable_subject(
	entry: &AuthCodeEntry,
	now: OffsetDateTime,
	min_validity: Duration,
) -> Result<()> {
	if entry.token_issued() && entry.token.as_ref().is_some_and(|t| t.is_valid_at(now, min_validity)) {
		return Ok(());
	}
	if let Some(reason) = entry.auth_server_error() {
		return Err(Error::ServerConfiguration {
			server: entry.server_name.to_string(),
			reason: reason.to_owned(),
		});
	}
	if let Some(reason) = entry.user_error() {
		return Err(Error::Rejected { reason: reason.to_owned() });
	}
	if entry.token_issued() { Err(Error::TokenExpired) } else { Err(Error::TokenPending) }
}

// Keeps the fields an exchanged token is cached with, so hits and misses look alike.
fn cacheable(issued: Token) -> Token {
	Token {
		access_token: issued.access_token,
		token_type: issued.token_type,
		expiry: issued.expiry,
		..Default::default()
	}
}

fn cached_exchange(
	entry: &AuthCodeEntry,
	signature: &ExchangeSignature,
	now: OffsetDateTime,
	min_validity: Duration,
) -> Option<Token> {
	entry
		.exchanged_tokens
		.get(signature.as_str())
		.filter(|token| token.is_valid_at(now, min_validity))
		.cloned()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::auth::ServerName;

	const NOW: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

	fn entry() -> AuthCodeEntry {
		AuthCodeEntry::new(
			CredentialName::new("c").expect("Credential fixture should be valid."),
			ServerName::new("s").expect("Server fixture should be valid."),
		)
	}

	#[test]
	fn signature_keeps_element_order() {
		let a = ExchangeSignature::new(&["x".into(), "y".into()], &["aud".into()], &[]);
		let b = ExchangeSignature::new(&["y".into(), "x".into()], &["aud".into()], &[]);

		assert_eq!(a.as_str(), "scopes=x y,audiences=aud,resources=");
		assert_ne!(a, b);
	}

	#[test]
	fn unusable_subjects_map_to_caller_errors() {
		let mut pending = entry();

		assert!(matches!(usable_subject(&pending, NOW, Duration::ZERO), Err(Error::TokenPending)));

		pending.set_auth_server_error("server not found", NOW);

		assert!(matches!(
			usable_subject(&pending, NOW, Duration::ZERO),
			Err(Error::ServerConfiguration { ref reason, .. }) if reason == "server not found"
		));

		let mut expired = entry();

		expired.set_token(Token::bearer("a").with_expiry(NOW - Duration::minutes(1)), NOW);

		assert!(matches!(usable_subject(&expired, NOW, Duration::ZERO), Err(Error::TokenExpired)));

		expired.set_user_error("refresh failed: invalid_grant", NOW);

		assert!(matches!(
			usable_subject(&expired, NOW, Duration::ZERO),
			Err(Error::Rejected { ref reason }) if reason == "refresh failed: invalid_grant"
		));
	}

	#[test]
	fn exchanged_tokens_drop_refresh_tokens_and_extras() {
		let issued = Token::bearer("x")
			.with_refresh_token("r")
			.with_expiry(NOW + Duration::hours(1))
			.with_extra("audience", serde_json::json!("api"));
		let kept = cacheable(issued);

		assert_eq!(kept.access_token.expose(), "x");
		assert_eq!(kept.expiry, Some(NOW + Duration::hours(1)));
		assert!(kept.refresh_token.is_none());
		assert!(kept.extra.is_empty());
	}

	#[test]
	fn cache_hits_respect_minimum_validity() {
		let mut entry = entry();
		let signature = ExchangeSignature::new(&[], &["aud".into()], &[]);

		entry.cache_exchanged(
			signature.as_str(),
			Token::bearer("x").with_expiry(NOW + Duration::minutes(5)),
			NOW,
		);

		assert!(cached_exchange(&entry, &signature, NOW, Duration::minutes(1)).is_some());
		assert!(cached_exchange(&entry, &signature, NOW, Duration::minutes(10)).is_none());
	}
}
