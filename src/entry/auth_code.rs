//! Authorization-code credentials and their issuance bookkeeping.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, MIN_EXPIRY_DELTA, Secret, ServerName, Token},
	entry::{Entry, EntryError, EntryKind},
	error::ErrorKind,
};

/// A credential obtained through an interactive grant and kept fresh with its refresh token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthCodeEntry {
	/// Credential name.
	pub name: CredentialName,
	/// Server the credential was issued by.
	pub server_name: ServerName,
	/// Current token; `None` until the first issuance succeeds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<Token>,
	/// Last successful issuance.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub last_issue_time: Option<OffsetDateTime>,
	/// Last issuance attempt, successful or not.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub last_attempted_issue_time: Option<OffsetDateTime>,
	/// Transient failures since the last successful issuance.
	#[serde(default)]
	pub transient_errors_since_last_issue: u32,
	/// Most recent transient failure.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_transient_error: Option<String>,
	/// Most recent classified failure (user or auth-server).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<EntryError>,
	/// Provider version that produced the token.
	#[serde(default)]
	pub provider_version: i32,
	/// Provider options snapshotted at issuance and replayed on refresh.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub provider_options: BTreeMap<String, String>,
	/// Exchanged tokens keyed by exchange signature.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub exchanged_tokens: BTreeMap<String, Token>,
	/// Device authorization waiting for the user, when issued via the device grant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_code: Option<PendingDeviceCode>,
}
impl AuthCodeEntry {
	/// Creates an entry that has not been issued a token yet.
	pub fn new(name: CredentialName, server_name: ServerName) -> Self {
		Self {
			name,
			server_name,
			token: None,
			last_issue_time: None,
			last_attempted_issue_time: None,
			transient_errors_since_last_issue: 0,
			last_transient_error: None,
			error: None,
			provider_version: 0,
			provider_options: BTreeMap::new(),
			exchanged_tokens: BTreeMap::new(),
			device_code: None,
		}
	}

	/// Returns `true` once a token with an access token has been stored.
	pub fn token_issued(&self) -> bool {
		self.token.as_ref().is_some_and(Token::is_issued)
	}

	/// Returns `true` when a non-empty refresh token is present.
	pub fn is_refreshable(&self) -> bool {
		self.token.as_ref().and_then(Token::refresh_secret).is_some()
	}

	/// Expiry of the current token, if any.
	pub fn expiry(&self) -> Option<OffsetDateTime> {
		self.token.as_ref().and_then(|token| token.expiry)
	}

	/// Active user error, if any.
	pub fn user_error(&self) -> Option<&str> {
		self.error_of(ErrorKind::User)
	}

	/// Active auth-server error, if any.
	pub fn auth_server_error(&self) -> Option<&str> {
		self.error_of(ErrorKind::AuthServer)
	}

	/// Records a successful issuance and clears every failure.
	pub fn set_token(&mut self, token: Token, now: OffsetDateTime) {
		self.token = Some(token);
		self.last_issue_time = Some(now);
		self.last_attempted_issue_time = Some(now);
		self.transient_errors_since_last_issue = 0;
		self.last_transient_error = None;
		self.error = None;
		self.device_code = None;
	}

	/// Records a failure that requires user action. The token is left untouched.
	pub fn set_user_error(&mut self, message: impl Into<String>, now: OffsetDateTime) {
		self.error = Some(EntryError::new(ErrorKind::User, message));
		self.last_attempted_issue_time = Some(now);
	}

	/// Records that the credential's server is missing or misconfigured.
	pub fn set_auth_server_error(&mut self, message: impl Into<String>, now: OffsetDateTime) {
		self.error = Some(EntryError::new(ErrorKind::AuthServer, message));
		self.last_attempted_issue_time = Some(now);
	}

	/// Records a temporary failure.
	///
	/// Reaching the provider proves the server resolved, so an auth-server error is cleared;
	/// a user error stays until the next successful issuance.
	pub fn set_transient_error(&mut self, message: impl Into<String>, now: OffsetDateTime) {
		if self.auth_server_error().is_some() {
			self.error = None;
		}

		self.transient_errors_since_last_issue = self.transient_errors_since_last_issue.saturating_add(1);
		self.last_transient_error = Some(message.into());
		self.last_attempted_issue_time = Some(now);
	}

	/// Caches an exchanged token, first dropping cached tokens that are no longer valid.
	pub fn cache_exchanged(&mut self, signature: impl Into<String>, token: Token, now: OffsetDateTime) {
		self.exchanged_tokens.retain(|_, cached| cached.is_valid_at(now, MIN_EXPIRY_DELTA));
		self.exchanged_tokens.insert(signature.into(), token);
	}

	fn error_of(&self, kind: ErrorKind) -> Option<&str> {
		self.error.as_ref().filter(|error| error.kind == kind).map(|error| error.message.as_str())
	}
}
impl Entry for AuthCodeEntry {
	const KIND: EntryKind = EntryKind::AuthCode;

	fn name(&self) -> &str {
		self.name.as_str()
	}
}

/// Device authorization obtained from the server and not yet approved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeviceCode {
	/// Device code presented on each poll.
	pub device_code: Secret,
	/// Code the user enters at the verification URI.
	pub user_code: String,
	/// Where the user approves the request.
	pub verification_uri: String,
	/// Verification URI with the user code embedded, if provided.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verification_uri_complete: Option<String>,
	/// When the device code stops being accepted.
	#[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<OffsetDateTime>,
	/// Minimum seconds between polls.
	#[serde(default)]
	pub interval_seconds: i64,
}
impl PendingDeviceCode {
	/// Returns `true` when the device code can no longer be exchanged.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= now)
	}
}
