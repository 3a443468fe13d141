//! Client-credentials ("self") entries: write, read, delete.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, ServerName},
	backend::{Backend, TokenView},
	entry::ClientCredsEntry,
};

/// Client-credentials configuration supplied by a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientCredsWrite {
	/// Issuing server; the default server when `None`.
	pub server: Option<ServerName>,
	/// Extra token endpoint parameters.
	pub token_url_params: BTreeMap<String, String>,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

impl Backend {
	/// Stores the configuration of client-credentials entry `name`. Any cached token is dropped;
	/// the next read requests a fresh one.
	pub async fn write_self(&self, name: &CredentialName, request: ClientCredsWrite) -> Result<()> {
		let server = self.server_or_default(request.server).await?;

		self.require_server(&server).await?;

		let mut entry = ClientCredsEntry::new(name.clone(), server);

		entry.token_url_params = request.token_url_params;
		entry.scopes = request.scopes;
		entry.provider_options = request.provider_options;

		let key = self.store().key::<ClientCredsEntry>(name);

		self.store().lock::<ClientCredsEntry>(&key).await.write(&entry).await?;

		Ok(())
	}

	/// Returns a client-credentials token valid for `minimum_validity`, issuing one when needed.
	pub async fn read_self(
		&self,
		name: &CredentialName,
		minimum_validity: Duration,
	) -> Result<Option<TokenView>> {
		let Some(entry) = self.get_or_issue(name, minimum_validity).await? else { return Ok(None) };
		let token = entry.token.as_ref().ok_or(Error::TokenPending)?;

		Ok(Some(TokenView::from(token)))
	}

	/// Deletes client-credentials entry `name`.
	pub async fn delete_self(&self, name: &CredentialName) -> Result<()> {
		let key = self.store().key::<ClientCredsEntry>(name);

		self.store().lock::<ClientCredsEntry>(&key).await.delete().await?;

		Ok(())
	}
}
