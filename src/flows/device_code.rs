//! RFC 8628 device authorization: start, then poll until the user approves.
//!
//! Polling is explicit; the background refresh loop skips entries without an issued token.

// self
use crate::{
	_prelude::*,
	auth::{CredentialName, ServerName},
	backend::Backend,
	entry::{AuthCodeEntry, PendingDeviceCode},
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::{DeviceCodeAuthOptions, DeviceCodeExchangeOptions, ProviderError},
};

/// What the user needs to approve a pending device authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceCodeView {
	/// Code the user enters at the verification URI.
	pub user_code: String,
	/// Where the user approves the request.
	pub verification_uri: String,
	/// Verification URI with the user code embedded, if provided.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub verification_uri_complete: Option<String>,
	/// When the device code stops being accepted.
	#[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
	pub expire_time: Option<OffsetDateTime>,
	/// Minimum seconds between polls.
	pub interval_seconds: i64,
}
impl From<&PendingDeviceCode> for DeviceCodeView {
	fn from(pending: &PendingDeviceCode) -> Self {
		Self {
			user_code: pending.user_code.clone(),
			verification_uri: pending.verification_uri.clone(),
			verification_uri_complete: pending.verification_uri_complete.clone(),
			expire_time: pending.expires_at,
			interval_seconds: pending.interval_seconds,
		}
	}
}

impl Backend {
	/// Starts a device authorization and stores it as credential `name`, replacing any previous
	/// credential of that name.
	pub(crate) async fn start_device_code(
		&self,
		name: &CredentialName,
		server: ServerName,
		scopes: Vec<String>,
		provider_options: BTreeMap<String, String>,
	) -> Result<DeviceCodeView> {
		const KIND: OpKind = OpKind::DeviceCode;

		let span = OpSpan::new(KIND, "start_device_code");

		span.instrument(async move {
			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let ops = self.server_operations(&server, Duration::ZERO).await?;
			let options = DeviceCodeAuthOptions { scopes, provider_options: provider_options.clone() };
			let authorization = ops
				.with_secrets(|client| {
					let options = options.clone();

					async move { client.device_code_auth(options).await }
				})
				.await
				.inspect_err(|_| obs::record_op_outcome(KIND, OpOutcome::Failure))?
				.ok_or_else(|| ProviderError::unsupported("the device code flow"))?;
			let now = self.clock().now();
			let pending = PendingDeviceCode {
				device_code: authorization.device_code,
				user_code: authorization.user_code,
				verification_uri: authorization.verification_uri,
				verification_uri_complete: authorization.verification_uri_complete,
				expires_at: authorization.expires_in.and_then(|lifetime| now.checked_add(lifetime)),
				interval_seconds: authorization.interval.map_or(5, |interval| interval.whole_seconds()),
			};
			let view = DeviceCodeView::from(&pending);
			let key = self.store().key::<AuthCodeEntry>(name);
			let mut entry = AuthCodeEntry::new(name.clone(), server);

			entry.provider_options = provider_options;
			entry.last_attempted_issue_time = Some(now);
			entry.device_code = Some(pending);
			self.store().lock::<AuthCodeEntry>(&key).await.write(&entry).await?;
			obs::record_op_outcome(KIND, OpOutcome::Success);
			tracing::info!(credential = %name, "device authorization started");

			Ok(view)
		})
		.await
	}

	/// Polls the token endpoint once for credential `name`'s pending device authorization.
	///
	/// The outcome is recorded on the entry: approval issues the token, pending or slow-down
	/// answers leave it waiting, and a denied or expired authorization sets a user error.
	/// Returns `None` when the credential does not exist.
	pub async fn poll_device_code(&self, name: &CredentialName) -> Result<Option<AuthCodeEntry>> {
		const KIND: OpKind = OpKind::DeviceCode;

		let span = OpSpan::new(KIND, "poll_device_code");

		span.instrument(async move {
			let key = self.store().key::<AuthCodeEntry>(name);
			let locked = self.store().lock::<AuthCodeEntry>(&key).await;
			let Some(mut entry) = locked.read().await? else { return Ok(None) };
			let Some(pending) = entry.device_code.clone() else { return Ok(Some(entry)) };
			let now = self.clock().now();

			if pending.is_expired_at(now) {
				entry.device_code = None;
				entry.set_user_error("device authorization expired", now);
				locked.write(&entry).await?;

				return Ok(Some(entry));
			}

			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let ops = match self.server_operations(&entry.server_name, Duration::ZERO).await {
				Ok(ops) => ops,
				Err(Error::ServerConfiguration { reason, .. }) => {
					entry.set_auth_server_error(reason, now);
					locked.write(&entry).await?;
					obs::record_op_outcome(KIND, OpOutcome::Failure);

					return Ok(Some(entry));
				},
				Err(e) => return Err(e),
			};
			let options = DeviceCodeExchangeOptions { provider_options: entry.provider_options.clone() };
			let result = ops
				.with_secrets(|client| {
					let options = options.clone();
					let device_code = pending.device_code.expose();

					async move { client.device_code_exchange(device_code, options).await }
				})
				.await;
			let now = self.clock().now();

			match result {
				Ok(issued) => {
					entry.provider_version = issued.provider_version;
					entry.set_token(issued.token, now);
					obs::record_op_outcome(KIND, OpOutcome::Success);
					tracing::info!(credential = %name, "device authorization approved");
				},
				Err(e) if e.is_pending() => {
					tracing::debug!(credential = %name, error = %e, "device authorization still pending");

					return Ok(Some(entry));
				},
				Err(e) if e.is_user() => {
					entry.device_code = None;
					entry.set_user_error(format!("device authorization failed: {e}"), now);
					obs::record_op_outcome(KIND, OpOutcome::Failure);
				},
				Err(e) => {
					entry.set_transient_error(format!("device authorization failed: {e}"), now);
					obs::record_op_outcome(KIND, OpOutcome::Failure);
				},
			}

			locked.write(&entry).await?;

			Ok(Some(entry))
		})
		.await
	}
}
