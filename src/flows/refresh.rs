//! Token validity engine for authorization-code credentials.
//!
//! [`Backend::get_or_refresh`] is the single entry point used by reads, exchanges, and the
//! background refresh loop. Provider failures never surface from it; they are classified and
//! recorded on the entry. Only storage failures are returned.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, token_valid},
	backend::Backend,
	entry::{AuthCodeEntry, EntryKey},
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::RefreshTokenOptions,
};

impl Backend {
	/// Returns the credential `name`, refreshing its token first when it would not stay valid
	/// for `expiry_delta`.
	///
	/// Returns `None` when the credential does not exist. Entries without an issued token are
	/// returned as they are.
	pub async fn get_or_refresh(
		&self,
		name: &CredentialName,
		expiry_delta: Duration,
	) -> Result<Option<AuthCodeEntry>> {
		let key = self.store().key::<AuthCodeEntry>(name);

		self.get_or_refresh_key(&key, expiry_delta).await
	}

	pub(crate) async fn get_or_refresh_key(
		&self,
		key: &EntryKey,
		expiry_delta: Duration,
	) -> Result<Option<AuthCodeEntry>> {
		let Some(entry) = self.store().read::<AuthCodeEntry>(key).await? else { return Ok(None) };

		if !needs_refresh(&entry, self.clock().now(), expiry_delta) {
			return Ok(Some(entry));
		}

		self.refresh_locked(key, expiry_delta).await
	}

	async fn refresh_locked(
		&self,
		key: &EntryKey,
		expiry_delta: Duration,
	) -> Result<Option<AuthCodeEntry>> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, "refresh_locked");

		span.instrument(async move {
			let locked = self.store().lock::<AuthCodeEntry>(key).await;
			let Some(mut entry) = locked.read().await? else { return Ok(None) };

			// Another caller may have refreshed the token while we waited for the lock.
			if !needs_refresh(&entry, self.clock().now(), expiry_delta) || !entry.is_refreshable() {
				return Ok(Some(entry));
			}

			self.refresh_entry(&mut entry, expiry_delta).await?;
			locked.write(&entry).await?;

			Ok(Some(entry))
		})
		.await
	}

	/// Refreshes `entry` in place and records the outcome on it. The caller holds the lock.
	pub(crate) async fn refresh_entry(
		&self,
		entry: &mut AuthCodeEntry,
		expiry_delta: Duration,
	) -> Result<()> {
		const KIND: OpKind = OpKind::Refresh;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let ops = match self.server_operations(&entry.server_name, expiry_delta).await {
			Ok(ops) => ops,
			Err(Error::ServerConfiguration { reason, .. }) => {
				tracing::warn!(
					credential = %entry.name,
					server = %entry.server_name,
					%reason,
					"cannot refresh credential"
				);
				entry.set_auth_server_error(reason, self.clock().now());
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				return Ok(());
			},
			Err(e) => return Err(e),
		};
		let Some(current) = entry.token.clone() else { return Ok(()) };
		let options = RefreshTokenOptions { provider_options: entry.provider_options.clone() };
		let result = ops
			.with_secrets(|client| {
				let options = options.clone();
				let current = &current;

				async move { client.refresh_token(current, options).await }
			})
			.await;
		let now = self.clock().now();

		match result {
			Ok(issued) => {
				let token = issued.token.inherit_refresh_token(Some(&current));

				entry.provider_version = issued.provider_version;

				if !issued.provider_options.is_empty() {
					entry.provider_options = issued.provider_options;
				}

				entry.set_token(token, now);
				tracing::debug!(credential = %entry.name, "credential refreshed");
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Err(e) if e.is_user() => {
				tracing::warn!(credential = %entry.name, error = %e, "refresh rejected");
				entry.set_user_error(format!("refresh failed: {e}"), now);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
			Err(e) => {
				tracing::warn!(credential = %entry.name, error = %e, "refresh failed, will retry");
				entry.set_transient_error(format!("refresh failed: {e}"), now);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		Ok(())
	}
}

fn needs_refresh(entry: &AuthCodeEntry, now: OffsetDateTime, expiry_delta: Duration) -> bool {
	entry.token_issued() && !token_valid(entry.token.as_ref(), now, expiry_delta)
}
