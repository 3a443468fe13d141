//! Reqwest transport for the built-in provider.
//!
//! `oauth2` consumes token endpoint responses before errors reach the provider, so every
//! request made through [`HttpTransport::recording`] leaves its HTTP status in a
//! [`StatusSlot`] for error classification to pick up.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::redirect::Policy;
// self
use crate::{_prelude::*, error::ConfigError};

/// Status code of the last response seen by a recording handle.
#[derive(Clone, Debug, Default)]
pub struct StatusSlot(Arc<Mutex<Option<u16>>>);
impl StatusSlot {
	fn set(&self, status: u16) {
		*self.0.lock() = Some(status);
	}

	/// Removes and returns the recorded status.
	pub fn take(&self) -> Option<u16> {
		self.0.lock().take()
	}
}

/// HTTP client shared by every operation of a provider instance.
///
/// Token endpoints answer directly, so [`HttpTransport::new`] disables redirects; clients
/// passed to [`HttpTransport::with_client`] should do the same.
#[derive(Clone)]
pub struct HttpTransport(ReqwestClient);
impl HttpTransport {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().redirect(Policy::none()).build()?))
	}

	/// Uses an existing client as is.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Handle for `oauth2` requests that records each response status into `slot`.
	pub(crate) fn recording(&self, slot: StatusSlot) -> RecordingClient {
		RecordingClient { client: self.0.clone(), slot }
	}
}
impl Deref for HttpTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for HttpTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("HttpTransport(..)")
	}
}

/// [`AsyncHttpClient`] returned by [`HttpTransport::recording`].
pub(crate) struct RecordingClient {
	client: ReqwestClient,
	slot: StatusSlot,
}
impl<'c> AsyncHttpClient<'c> for RecordingClient {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			let response =
				self.client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			self.slot.set(status.as_u16());

			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_is_consumed_once() {
		let slot = StatusSlot::default();

		slot.set(400);

		assert_eq!(slot.take(), Some(400));
		assert_eq!(slot.take(), None);
	}

	#[test]
	fn transport_builds_without_redirects() {
		assert!(HttpTransport::new().is_ok());
	}
}
