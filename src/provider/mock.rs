//! Scriptable in-process provider for tests and local development.
//!
//! Tokens are deterministic, every operation is counted, and failures can be queued per
//! operation with [`MockProvider::fail_next`].

// std
use std::{
	collections::VecDeque,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{Secret, Token},
	clock::Clock,
	provider::{
		AuthCodeExchangeOptions, AuthCodeUrlOptions, ClientAuth, ClientCredentialsOptions,
		DeviceAuthorization, DeviceCodeAuthOptions, DeviceCodeExchangeOptions, Provider,
		ProviderConfig, ProviderError, ProviderErrorKind, ProviderFuture, ProviderOperations,
		ProviderToken, RefreshTokenOptions, TokenExchangeOptions,
	},
};

/// Operations observed by [`MockProvider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOperation {
	/// Authorization code exchange.
	AuthCodeExchange,
	/// Refresh.
	Refresh,
	/// Client credentials grant.
	ClientCredentials,
	/// Token exchange.
	TokenExchange,
	/// Device authorization request.
	DeviceCodeAuth,
	/// Device code poll.
	DeviceCodeExchange,
}
impl MockOperation {
	const ALL: [Self; 6] = [
		Self::AuthCodeExchange,
		Self::Refresh,
		Self::ClientCredentials,
		Self::TokenExchange,
		Self::DeviceCodeAuth,
		Self::DeviceCodeExchange,
	];

	fn index(self) -> usize {
		Self::ALL.iter().position(|op| *op == self).unwrap_or_default()
	}
}

/// Shared handle to a scriptable provider; clones observe the same counters.
#[derive(Clone, Debug, Default)]
pub struct MockProvider(Arc<MockState>);
impl MockProvider {
	/// Version reported by the mock.
	pub const VERSION: i32 = 1;

	/// Creates a mock issuing one-hour tokens with refresh tokens.
	pub fn new() -> Self {
		Self::default()
	}

	/// Lifetime of issued tokens; `None` issues tokens that never expire.
	pub fn with_token_lifetime(self, lifetime: Option<Duration>) -> Self {
		self.0.settings.lock().token_lifetime = lifetime;

		self
	}

	/// Lifetime of exchanged tokens; `None` issues tokens that never expire.
	pub fn with_exchange_lifetime(self, lifetime: Option<Duration>) -> Self {
		self.0.settings.lock().exchange_lifetime = lifetime;

		self
	}

	/// Stops issuing refresh tokens from code and device exchanges.
	pub fn without_refresh_tokens(self) -> Self {
		self.0.settings.lock().issue_refresh_tokens = false;

		self
	}

	/// Rejects every client secret except `secret` with `invalid_client`.
	pub fn with_expected_secret(self, secret: impl Into<String>) -> Self {
		self.0.settings.lock().expected_secret = Some(secret.into());

		self
	}

	/// Queues a failure returned by the next call to `operation`.
	pub fn fail_next(&self, operation: MockOperation, error: ProviderError) {
		self.0.failures.lock().entry(operation).or_default().push_back(error);
	}

	/// Number of calls made to `operation`, including failed ones.
	pub fn calls(&self, operation: MockOperation) -> u64 {
		self.0.calls[operation.index()].load(Ordering::SeqCst)
	}

	/// Provider options passed to the most recent refresh.
	pub fn last_refresh_options(&self) -> Option<BTreeMap<String, String>> {
		self.0.last_refresh_options.lock().clone()
	}

	/// Factory suitable for [`ProviderRegistry::register`](crate::provider::ProviderRegistry::register).
	pub fn factory(
		&self,
	) -> impl 'static + Fn(&ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync
	{
		let state = self.0.clone();

		move |config| {
			if config.version.is_some_and(|version| version > Self::VERSION) {
				return Err(ProviderError::new(
					ProviderErrorKind::Unsupported,
					format!("mock provider has no version {}", config.version.unwrap_or_default()),
				));
			}

			Ok(Arc::new(MockInstance { state: state.clone(), clock: config.clock.clone() }))
		}
	}
}

#[derive(Debug, Default)]
struct MockState {
	settings: Mutex<MockSettings>,
	failures: Mutex<HashMap<MockOperation, VecDeque<ProviderError>>>,
	calls: [AtomicU64; 6],
	last_refresh_options: Mutex<Option<BTreeMap<String, String>>>,
}
impl MockState {
	fn begin(&self, operation: MockOperation, client: &ClientAuth) -> Result<u64, ProviderError> {
		let n = self.calls[operation.index()].fetch_add(1, Ordering::SeqCst) + 1;

		if let Some(error) = self.failures.lock().get_mut(&operation).and_then(VecDeque::pop_front) {
			return Err(error);
		}

		let expected = self.settings.lock().expected_secret.clone();

		match expected {
			Some(expected) if client.client_secret.as_ref().map(Secret::expose) != Some(expected.as_str()) =>
				Err(ProviderError::new(ProviderErrorKind::InvalidClient, "invalid_client")),
			_ => Ok(n),
		}
	}
}

#[derive(Debug)]
struct MockSettings {
	token_lifetime: Option<Duration>,
	exchange_lifetime: Option<Duration>,
	issue_refresh_tokens: bool,
	expected_secret: Option<String>,
}
impl Default for MockSettings {
	fn default() -> Self {
		Self {
			token_lifetime: Some(Duration::hours(1)),
			exchange_lifetime: Some(Duration::hours(1)),
			issue_refresh_tokens: true,
			expected_secret: None,
		}
	}
}

struct MockInstance {
	state: Arc<MockState>,
	clock: Arc<dyn Clock>,
}
impl Provider for MockInstance {
	fn version(&self) -> i32 {
		MockProvider::VERSION
	}

	fn operations(&self, client: ClientAuth) -> Box<dyn ProviderOperations> {
		Box::new(MockOperations { state: self.state.clone(), clock: self.clock.clone(), client })
	}
}

struct MockOperations {
	state: Arc<MockState>,
	clock: Arc<dyn Clock>,
	client: ClientAuth,
}
impl MockOperations {
	fn issue(&self, access: String, lifetime: Option<Duration>) -> Token {
		let mut token = Token::bearer(access);

		token.expiry = lifetime.map(|lifetime| self.clock.now() + lifetime);

		token
	}

	fn settings(&self) -> (Option<Duration>, Option<Duration>, bool) {
		let settings = self.state.settings.lock();

		(settings.token_lifetime, settings.exchange_lifetime, settings.issue_refresh_tokens)
	}
}
impl ProviderOperations for MockOperations {
	fn auth_code_url(
		&self,
		state: &str,
		options: AuthCodeUrlOptions,
	) -> Result<Option<Url>, ProviderError> {
		let mut params = vec![
			("client_id".to_owned(), self.client.client_id.clone()),
			("response_type".to_owned(), "code".to_owned()),
			("state".to_owned(), state.to_owned()),
		];

		if !options.scopes.is_empty() {
			params.push(("scope".to_owned(), options.scopes.join(" ")));
		}
		if let Some(redirect) = options.redirect_url {
			params.push(("redirect_uri".to_owned(), redirect));
		}

		params.extend(options.url_params);

		Url::parse_with_params("https://mock.example/authorize", params)
			.map(Some)
			.map_err(|e| ProviderError::transient(e.to_string()))
	}

	fn auth_code_exchange<'a>(
		&'a self,
		code: &'a str,
		options: AuthCodeExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			self.state.begin(MockOperation::AuthCodeExchange, &self.client)?;

			let (lifetime, _, refresh) = self.settings();
			let mut token = self.issue(format!("{code}-access"), lifetime);

			if refresh {
				token.refresh_token = Some(Secret::new(format!("{code}-refresh")));
			}

			let mut issued = ProviderToken::new(token, MockProvider::VERSION);

			issued.provider_options = options.provider_options;

			Ok(issued)
		})
	}

	fn refresh_token<'a>(
		&'a self,
		token: &'a Token,
		options: RefreshTokenOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			let n = self.state.begin(MockOperation::Refresh, &self.client)?;

			*self.state.last_refresh_options.lock() = Some(options.provider_options.clone());

			if token.refresh_secret().is_none() {
				return Err(ProviderError::new(ProviderErrorKind::InvalidGrant, "invalid_grant"));
			}

			tokio::task::yield_now().await;

			let (lifetime, _, _) = self.settings();
			let mut issued = ProviderToken::new(self.issue(format!("refreshed-{n}"), lifetime), MockProvider::VERSION);

			issued.provider_options = options.provider_options;

			Ok(issued)
		})
	}

	fn client_credentials(
		&self,
		_: ClientCredentialsOptions,
	) -> ProviderFuture<'_, ProviderToken> {
		Box::pin(async move {
			let n = self.state.begin(MockOperation::ClientCredentials, &self.client)?;
			let (lifetime, _, _) = self.settings();

			Ok(ProviderToken::new(self.issue(format!("client-{n}"), lifetime), MockProvider::VERSION))
		})
	}

	fn token_exchange<'a>(
		&'a self,
		token: &'a Token,
		options: TokenExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			let n = self.state.begin(MockOperation::TokenExchange, &self.client)?;

			if !token.is_issued() {
				return Err(ProviderError::new(ProviderErrorKind::InvalidGrant, "invalid_grant"));
			}

			let (_, lifetime, _) = self.settings();
			let issued = self
				.issue(format!("exchanged-{n}"), lifetime)
				.with_extra("audience", serde_json::json!(options.audiences));

			Ok(ProviderToken::new(issued, MockProvider::VERSION))
		})
	}

	fn device_code_auth(
		&self,
		_: DeviceCodeAuthOptions,
	) -> ProviderFuture<'_, Option<DeviceAuthorization>> {
		Box::pin(async move {
			let n = self.state.begin(MockOperation::DeviceCodeAuth, &self.client)?;

			Ok(Some(DeviceAuthorization {
				device_code: Secret::new(format!("device-{n}")),
				user_code: format!("USER-{n:04}"),
				verification_uri: "https://mock.example/device".into(),
				verification_uri_complete: None,
				expires_in: Some(Duration::minutes(10)),
				interval: Some(Duration::seconds(5)),
			}))
		})
	}

	fn device_code_exchange<'a>(
		&'a self,
		device_code: &'a str,
		_: DeviceCodeExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken> {
		Box::pin(async move {
			self.state.begin(MockOperation::DeviceCodeExchange, &self.client)?;

			let (lifetime, _, refresh) = self.settings();
			let mut token = self.issue(format!("{device_code}-access"), lifetime);

			if refresh {
				token.refresh_token = Some(Secret::new(format!("{device_code}-refresh")));
			}

			Ok(ProviderToken::new(token, MockProvider::VERSION))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn operations(mock: &MockProvider, secret: Option<&str>) -> Box<dyn ProviderOperations> {
		let config =
			ProviderConfig { version: None, options: BTreeMap::new(), clock: Arc::new(ManualClock::default()) };
		let provider = (mock.factory())(&config).expect("Mock provider should build.");

		provider.operations(ClientAuth {
			client_id: "client".into(),
			client_secret: secret.map(Secret::new),
		})
	}

	#[tokio::test]
	async fn queued_failures_are_returned_once() {
		let mock = MockProvider::new();
		let ops = operations(&mock, None);

		mock.fail_next(MockOperation::ClientCredentials, ProviderError::transient("flap"));

		assert!(ops.client_credentials(Default::default()).await.is_err());
		assert!(ops.client_credentials(Default::default()).await.is_ok());
		assert_eq!(mock.calls(MockOperation::ClientCredentials), 2);
	}

	#[tokio::test]
	async fn expected_secret_is_enforced() {
		let mock = MockProvider::new().with_expected_secret("right");
		let err = operations(&mock, Some("wrong"))
			.client_credentials(Default::default())
			.await
			.expect_err("Wrong secret should be rejected.");

		assert_eq!(err.kind, ProviderErrorKind::InvalidClient);
		assert!(operations(&mock, Some("right")).client_credentials(Default::default()).await.is_ok());
	}

	#[test]
	fn auth_code_url_carries_state_and_scopes() {
		let mock = MockProvider::new();
		let url = operations(&mock, None)
			.auth_code_url(
				"xyz",
				AuthCodeUrlOptions { scopes: vec!["a".into(), "b".into()], ..Default::default() },
			)
			.expect("URL should build.")
			.expect("Mock supports the authorization code flow.");
		let query: BTreeMap<_, _> = url.query_pairs().into_owned().collect();

		assert_eq!(query.get("state").map(String::as_str), Some("xyz"));
		assert_eq!(query.get("scope").map(String::as_str), Some("a b"));
	}
}
