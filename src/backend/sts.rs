//! Exchanged ("STS") token reads.

// self
use crate::{
	_prelude::*,
	auth::CredentialName,
	backend::{Backend, TokenView},
	flows::ExchangeRequest,
};

impl Backend {
	/// Returns a token exchanged from credential `name` for `request`.
	///
	/// Only the access token, its type, and its expiry are returned.
	pub async fn read_exchanged(
		&self,
		name: &CredentialName,
		request: &ExchangeRequest,
	) -> Result<Option<TokenView>> {
		let token = self.exchange(name, request).await?;

		Ok(token.as_ref().map(|token| TokenView::from(token).without_extra()))
	}
}
