//! Per-operation option structs passed to [`ProviderOperations`](crate::provider::ProviderOperations).

// self
use crate::_prelude::*;

/// Options for building an authorization URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthCodeUrlOptions {
	/// Redirect URL registered with the server.
	pub redirect_url: Option<String>,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Extra query parameters.
	pub url_params: BTreeMap<String, String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

/// Options for exchanging an authorization code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthCodeExchangeOptions {
	/// Redirect URL used when the code was obtained.
	pub redirect_url: Option<String>,
	/// Extra form parameters.
	pub url_params: BTreeMap<String, String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

/// Options for a refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshTokenOptions {
	/// Provider-specific options snapshotted at issuance.
	pub provider_options: BTreeMap<String, String>,
}

/// Options for the client-credentials grant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientCredentialsOptions {
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Extra form parameters.
	pub url_params: BTreeMap<String, String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

/// Options for an RFC 8693 token exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenExchangeOptions {
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Target audiences.
	pub audiences: Vec<String>,
	/// Target resources.
	pub resources: Vec<String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

/// Options for starting a device authorization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceCodeAuthOptions {
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}

/// Options for polling a device code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceCodeExchangeOptions {
	/// Provider-specific options.
	pub provider_options: BTreeMap<String, String>,
}
