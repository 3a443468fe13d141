//! Authorization URLs, authorization-code exchange, and refresh-token import.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, Secret, ServerName, Token},
	backend::Backend,
	entry::AuthCodeEntry,
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::{
		AuthCodeExchangeOptions, AuthCodeUrlOptions, ProviderError, ProviderToken,
		RefreshTokenOptions,
	},
};

/// Parameters of an authorization URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthCodeUrlRequest {
	/// Server to authorize against; the default server when `None`.
	pub server: Option<ServerName>,
	/// Opaque state echoed back to the redirect URL.
	pub state: String,
	/// Redirect URL registered with the server.
	pub redirect_url: Option<String>,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Query parameters added after the server's own.
	pub auth_url_params: BTreeMap<String, String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

impl Backend {
	/// Builds the URL a user visits to authorize the client.
	pub async fn auth_code_url(&self, request: AuthCodeUrlRequest) -> Result<Url> {
		if request.state.is_empty() {
			return Err(Error::invalid_input("state", "must not be empty"));
		}

		let server = self.server_or_default(request.server).await?;
		let ops = self.server_operations(&server, Duration::ZERO).await?;
		let mut url_params = ops.server().auth_url_params.clone();

		url_params.extend(request.auth_url_params);

		let options = AuthCodeUrlOptions {
			redirect_url: request.redirect_url,
			scopes: request.scopes,
			url_params,
			provider_options: request.provider_options,
		};

		ops.primary()
			.auth_code_url(&request.state, options)?
			.ok_or_else(|| ProviderError::unsupported("the authorization code flow").into())
	}

	/// Exchanges `code` and stores the resulting credential as `name`, replacing any previous
	/// credential of that name.
	pub(crate) async fn issue_auth_code(
		&self,
		name: &CredentialName,
		server: ServerName,
		code: &str,
		options: AuthCodeExchangeOptions,
	) -> Result<AuthCodeEntry> {
		const KIND: OpKind = OpKind::AuthCodeExchange;

		let span = OpSpan::new(KIND, "issue_auth_code");

		span.instrument(async move {
			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let ops = self.server_operations(&server, Duration::ZERO).await?;
			let mut issued = ops
				.with_secrets(|client| {
					let options = options.clone();

					async move { client.auth_code_exchange(code, options).await }
				})
				.await
				.map_err(|e| rejected(KIND, name, "exchange", e))?;

			if issued.provider_options.is_empty() {
				issued.provider_options = options.provider_options;
			}

			self.store_issued(name, server, issued, None).await
		})
		.await
	}

	/// Stores `refresh_token` as credential `name` and immediately redeems it.
	pub(crate) async fn import_refresh_token(
		&self,
		name: &CredentialName,
		server: ServerName,
		refresh_token: Secret,
		provider_options: BTreeMap<String, String>,
	) -> Result<AuthCodeEntry> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, "import_refresh_token");

		span.instrument(async move {
			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let ops = self.server_operations(&server, Duration::ZERO).await?;
			let seed = Token { refresh_token: Some(refresh_token), ..Default::default() };
			let options = RefreshTokenOptions { provider_options };
			let mut issued = ops
				.with_secrets(|client| {
					let options = options.clone();
					let seed = &seed;

					async move { client.refresh_token(seed, options).await }
				})
				.await
				.map_err(|e| rejected(KIND, name, "refresh", e))?;

			if issued.provider_options.is_empty() {
				issued.provider_options = options.provider_options;
			}

			self.store_issued(name, server, issued, Some(&seed)).await
		})
		.await
	}

	async fn store_issued(
		&self,
		name: &CredentialName,
		server: ServerName,
		issued: ProviderToken,
		previous: Option<&Token>,
	) -> Result<AuthCodeEntry> {
		let key = self.store().key::<AuthCodeEntry>(name);
		let mut entry = AuthCodeEntry::new(name.clone(), server);

		entry.provider_version = issued.provider_version;
		entry.provider_options = issued.provider_options;
		entry.set_token(issued.token.inherit_refresh_token(previous), self.clock().now());
		self.store().lock::<AuthCodeEntry>(&key).await.write(&entry).await?;
		tracing::info!(credential = %name, server = %entry.server_name, "credential issued");

		Ok(entry)
	}
}

/// Maps a failed interactive grant onto the caller-facing error.
fn rejected(kind: OpKind, name: &CredentialName, grant: &str, e: ProviderError) -> Error {
	obs::record_op_outcome(kind, OpOutcome::Failure);
	tracing::warn!(credential = %name, error = %e, "{grant} failed");

	if e.is_user() {
		Error::Rejected { reason: format!("{grant} failed: {e}") }
	} else {
		e.into()
	}
}
