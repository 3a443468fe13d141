//! Caller-facing read models. Server views never carry client secrets.

// self
use crate::{
	_prelude::*,
	auth::{Secret, ServerName, Token},
	entry::ServerEntry,
};

/// An access token as returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TokenView {
	/// Access token.
	pub access_token: Secret,
	/// Token type, `Bearer` when the provider omitted it.
	#[serde(rename = "type")]
	pub token_type: String,
	/// Expiry, absent for tokens that never expire.
	#[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub expire_time: Option<OffsetDateTime>,
	/// Additional response fields returned by the provider.
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl TokenView {
	/// Drops the provider's extra response fields.
	pub fn without_extra(mut self) -> Self {
		self.extra.clear();

		self
	}
}
impl From<&Token> for TokenView {
	fn from(token: &Token) -> Self {
		Self {
			access_token: token.access_token.clone(),
			token_type: token.token_type().to_owned(),
			expire_time: token.expiry,
			extra: token.extra.clone(),
		}
	}
}

/// A server definition as returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerView {
	/// Server name.
	pub name: ServerName,
	/// OAuth client identifier.
	pub client_id: String,
	/// Number of configured client secrets.
	pub client_secrets: usize,
	/// Extra authorization URL parameters.
	pub auth_url_params: BTreeMap<String, String>,
	/// Provider name.
	pub provider: String,
	/// Provider version recorded at write time.
	pub provider_version: i32,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}
impl From<&ServerEntry> for ServerView {
	fn from(server: &ServerEntry) -> Self {
		Self {
			name: server.name.clone(),
			client_id: server.client_id.clone(),
			client_secrets: server.client_secrets.len(),
			auth_url_params: server.auth_url_params.clone(),
			provider: server.provider_name.clone(),
			provider_version: server.provider_version,
			provider_options: server.provider_options.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_view_uses_the_wire_field_names() {
		let token = Token { access_token: Secret::new("abc"), ..Default::default() }
			.with_extra("id_token", serde_json::json!("jwt"));
		let payload = serde_json::to_value(TokenView::from(&token)).expect("View should serialize.");

		assert_eq!(payload["access_token"], "abc");
		assert_eq!(payload["type"], "Bearer");
		assert!(payload.get("expire_time").is_none());
		assert_eq!(payload["extra"]["id_token"], "jwt");
		assert!(
			serde_json::to_value(TokenView::from(&token).without_extra())
				.expect("View should serialize.")
				.get("extra")
				.is_none()
		);
	}

	#[test]
	fn server_view_hides_secrets() {
		let server = ServerEntry::new(
			ServerName::new("corp").expect("Server fixture should be valid."),
			"client",
			"basic",
		)
		.with_client_secret("s1")
		.with_client_secret("s2");
		let payload = serde_json::to_string(&ServerView::from(&server)).expect("View should serialize.");

		assert!(!payload.contains("s1"));
		assert_eq!(ServerView::from(&server).client_secrets, 2);
	}
}
