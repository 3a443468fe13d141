//! Provider contracts: the seam between the lifecycle engine and concrete OAuth servers.
//!
//! A [`Provider`] is created from a server definition by the [`ProviderRegistry`] and hands
//! out [`ProviderOperations`] bound to one client identity. Every operation takes an explicit
//! options struct and reports failures as a classified [`ProviderError`].

#[cfg(feature = "reqwest")] pub mod basic;
#[cfg(any(test, feature = "test"))] pub mod mock;
pub mod options;
pub mod registry;
pub mod strategy;

#[cfg(feature = "reqwest")] pub use basic::BasicProvider;
#[cfg(any(test, feature = "test"))] pub use mock::{MockOperation, MockProvider};
pub use options::*;
pub use registry::*;
pub use strategy::*;

// self
use crate::{
	_prelude::*,
	auth::{Secret, Token},
};

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderError>> + 'a + Send>>;

/// A provider implementation instantiated for one server definition.
pub trait Provider
where
	Self: Send + Sync,
{
	/// Version of the implementation; recorded on servers and issued tokens.
	fn version(&self) -> i32;

	/// Operations bound to `client`.
	fn operations(&self, client: ClientAuth) -> Box<dyn ProviderOperations>;
}

/// OAuth operations bound to one client identity.
pub trait ProviderOperations
where
	Self: Send + Sync,
{
	/// Builds the authorization URL, or `None` when the provider has no interactive flow.
	fn auth_code_url(
		&self,
		state: &str,
		options: AuthCodeUrlOptions,
	) -> Result<Option<Url>, ProviderError>;

	/// Exchanges an authorization code for a token.
	fn auth_code_exchange<'a>(
		&'a self,
		code: &'a str,
		options: AuthCodeExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken>;

	/// Uses `token`'s refresh token to obtain a new token.
	fn refresh_token<'a>(
		&'a self,
		token: &'a Token,
		options: RefreshTokenOptions,
	) -> ProviderFuture<'a, ProviderToken>;

	/// Requests a token for the client itself.
	fn client_credentials(
		&self,
		options: ClientCredentialsOptions,
	) -> ProviderFuture<'_, ProviderToken>;

	/// Exchanges `token` for a token with a different scope, audience, or resource.
	fn token_exchange<'a>(
		&'a self,
		token: &'a Token,
		options: TokenExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken>;

	/// Starts a device authorization, or returns `None` when unsupported.
	fn device_code_auth(
		&self,
		options: DeviceCodeAuthOptions,
	) -> ProviderFuture<'_, Option<DeviceAuthorization>>;

	/// Polls the token endpoint with a device code.
	fn device_code_exchange<'a>(
		&'a self,
		device_code: &'a str,
		options: DeviceCodeExchangeOptions,
	) -> ProviderFuture<'a, ProviderToken>;
}

/// Client identity presented to the authorization server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientAuth {
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret; `None` for public clients.
	pub client_secret: Option<Secret>,
}
impl ClientAuth {
	/// Public client without a secret.
	pub fn public(client_id: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: None }
	}

	/// Confidential client.
	pub fn confidential(client_id: impl Into<String>, client_secret: Secret) -> Self {
		Self { client_id: client_id.into(), client_secret: Some(client_secret) }
	}
}

/// Token returned by a provider operation.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderToken {
	/// Issued token.
	pub token: Token,
	/// Provider version that issued the token.
	pub provider_version: i32,
	/// Options the provider wants replayed on later refreshes.
	pub provider_options: BTreeMap<String, String>,
}
impl ProviderToken {
	/// Wraps a token issued by provider version `provider_version`.
	pub fn new(token: Token, provider_version: i32) -> Self {
		Self { token, provider_version, provider_options: BTreeMap::new() }
	}
}

/// Device authorization response (RFC 8628 section 3.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceAuthorization {
	/// Device code used when polling.
	pub device_code: Secret,
	/// Code shown to the user.
	pub user_code: String,
	/// Where the user enters the code.
	pub verification_uri: String,
	/// Verification URI with the code embedded.
	pub verification_uri_complete: Option<String>,
	/// Lifetime of the device code.
	pub expires_in: Option<Duration>,
	/// Minimum polling interval.
	pub interval: Option<Duration>,
}

/// Classified provider failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct ProviderError {
	/// Failure category.
	pub kind: ProviderErrorKind,
	/// Short message safe to persist and show to callers.
	pub message: String,
}
impl ProviderError {
	/// Creates a new classified failure.
	pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into() }
	}

	/// Temporary failure.
	pub fn transient(message: impl Into<String>) -> Self {
		Self::new(ProviderErrorKind::Transient, message)
	}

	/// Unknown or malformed provider option.
	pub fn invalid_option(option: &str, reason: impl Display) -> Self {
		Self::new(ProviderErrorKind::InvalidOption, format!("option {option:?}: {reason}"))
	}

	/// Operation not offered by this provider.
	pub fn unsupported(operation: &str) -> Self {
		Self::new(ProviderErrorKind::Unsupported, format!("{operation} is not supported"))
	}

	/// Returns `true` when only user (or operator) action can clear the failure.
	pub fn is_user(&self) -> bool {
		matches!(
			self.kind,
			ProviderErrorKind::InvalidGrant
				| ProviderErrorKind::InvalidClient
				| ProviderErrorKind::InsufficientScope
				| ProviderErrorKind::InvalidOption
				| ProviderErrorKind::Unsupported
		)
	}

	/// Returns `true` for device-flow responses that ask the client to keep polling.
	pub fn is_pending(&self) -> bool {
		matches!(self.kind, ProviderErrorKind::AuthorizationPending | ProviderErrorKind::SlowDown)
	}
}
