//! Authorization-code credentials: write (code, refresh token, or device grant), read, delete.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, Secret, ServerName},
	backend::{Backend, TokenView},
	entry::AuthCodeEntry,
	flows::{DeviceCodeView, exchange::usable_subject},
	provider::AuthCodeExchangeOptions,
};

/// How a credential write obtains its first token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialGrant {
	/// Exchange an authorization code.
	AuthorizationCode {
		/// Code returned to the redirect URL.
		code: String,
		/// Redirect URL the code was issued for.
		redirect_url: Option<String>,
	},
	/// Import an existing refresh token and redeem it right away.
	RefreshToken {
		/// Refresh token to import.
		refresh_token: Secret,
	},
	/// Start a device authorization the user approves out of band.
	DeviceCode {
		/// Requested scopes.
		scopes: Vec<String>,
	},
}

/// Credential write request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialWrite {
	/// Issuing server; the default server when `None`.
	pub server: Option<ServerName>,
	/// Grant used to obtain the token.
	pub grant: CredentialGrant,
	/// Provider-specific options kept with the credential.
	pub provider_options: BTreeMap<String, String>,
}
impl CredentialWrite {
	/// Request using `grant` against the default server without provider options.
	pub fn new(grant: CredentialGrant) -> Self {
		Self { server: None, grant, provider_options: BTreeMap::new() }
	}

	/// Targets `server` instead of the default server.
	pub fn with_server(mut self, server: ServerName) -> Self {
		self.server = Some(server);

		self
	}
}

/// Result of a credential write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialWriteOutcome {
	/// A token was issued and stored.
	Issued,
	/// The user must approve the device authorization; poll with
	/// [`Backend::poll_device_code`].
	PendingDeviceAuthorization(DeviceCodeView),
}

impl Backend {
	/// Creates or replaces credential `name`.
	pub async fn write_credential(
		&self,
		name: &CredentialName,
		request: CredentialWrite,
	) -> Result<CredentialWriteOutcome> {
		let server = self.server_or_default(request.server).await?;

		self.require_server(&server).await?;

		match request.grant {
			CredentialGrant::AuthorizationCode { code, redirect_url } => {
				if code.is_empty() {
					return Err(Error::invalid_input("code", "must not be empty"));
				}

				let options = AuthCodeExchangeOptions {
					redirect_url,
					url_params: BTreeMap::new(),
					provider_options: request.provider_options,
				};

				self.issue_auth_code(name, server, &code, options).await?;

				Ok(CredentialWriteOutcome::Issued)
			},
			CredentialGrant::RefreshToken { refresh_token } => {
				if refresh_token.is_empty() {
					return Err(Error::invalid_input("refresh_token", "must not be empty"));
				}

				self.import_refresh_token(name, server, refresh_token, request.provider_options).await?;

				Ok(CredentialWriteOutcome::Issued)
			},
			CredentialGrant::DeviceCode { scopes } => {
				let view =
					self.start_device_code(name, server, scopes, request.provider_options).await?;

				Ok(CredentialWriteOutcome::PendingDeviceAuthorization(view))
			},
		}
	}

	/// Returns credential `name`'s access token, refreshed first when it would not stay valid
	/// for `minimum_validity`.
	///
	/// Credentials that cannot produce a token report why: a pending issuance, an expired token,
	/// the recorded user error, or the server's configuration problem.
	pub async fn read_credential(
		&self,
		name: &CredentialName,
		minimum_validity: Duration,
	) -> Result<Option<TokenView>> {
		let Some(entry) = self.get_or_refresh(name, minimum_validity).await? else { return Ok(None) };

		usable_subject(&entry, self.clock().now(), minimum_validity)?;

		Ok(entry.token.as_ref().map(TokenView::from))
	}

	/// Deletes credential `name` with its exchanged tokens.
	pub async fn delete_credential(&self, name: &CredentialName) -> Result<()> {
		let key = self.store().key::<AuthCodeEntry>(name);

		self.store().lock::<AuthCodeEntry>(&key).await.delete().await?;
		tracing::info!(credential = %name, "credential deleted");

		Ok(())
	}
}
