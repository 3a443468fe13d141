//! Client-credentials issuance for credentials owned by the client itself.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, token_valid},
	backend::Backend,
	entry::{ClientCredsEntry, EntryKey},
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::ClientCredentialsOptions,
};

impl Backend {
	/// Returns the client-credentials entry `name` with a token valid for `expiry_delta`,
	/// requesting a new token when needed.
	///
	/// Unlike authorization-code credentials, failures are returned to the caller and nothing
	/// is recorded on the entry. Returns `None` when the entry does not exist.
	pub async fn get_or_issue(
		&self,
		name: &CredentialName,
		expiry_delta: Duration,
	) -> Result<Option<ClientCredsEntry>> {
		let key = self.store().key::<ClientCredsEntry>(name);

		match self.store().read::<ClientCredsEntry>(&key).await? {
			Some(entry) if token_valid(entry.token.as_ref(), self.clock().now(), expiry_delta) =>
				Ok(Some(entry)),
			_ => self.issue_locked(&key, expiry_delta).await,
		}
	}

	async fn issue_locked(
		&self,
		key: &EntryKey,
		expiry_delta: Duration,
	) -> Result<Option<ClientCredsEntry>> {
		const KIND: OpKind = OpKind::ClientCredentials;

		let span = OpSpan::new(KIND, "issue_locked");

		span.instrument(async move {
			let locked = self.store().lock::<ClientCredsEntry>(key).await;
			let Some(mut entry) = locked.read().await? else { return Ok(None) };

			if token_valid(entry.token.as_ref(), self.clock().now(), expiry_delta) {
				return Ok(Some(entry));
			}

			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let ops = self.server_operations(&entry.server_name, expiry_delta).await?;
			let options = ClientCredentialsOptions {
				scopes: entry.scopes.clone(),
				url_params: entry.token_url_params.clone(),
				provider_options: entry.provider_options.clone(),
			};
			let issued = ops
				.with_secrets(|client| {
					let options = options.clone();

					async move { client.client_credentials(options).await }
				})
				.await
				.inspect_err(|e| {
					obs::record_op_outcome(KIND, OpOutcome::Failure);
					tracing::warn!(credential = %entry.name, error = %e, "client credentials grant failed");
				})?;

			entry.token = Some(issued.token);
			locked.write(&entry).await?;
			obs::record_op_outcome(KIND, OpOutcome::Success);

			Ok(Some(entry))
		})
		.await
	}
}
