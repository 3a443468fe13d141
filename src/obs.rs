//! Observability helpers shared by flows and background loops.
//!
//! Every flow runs inside an `oauthapp.op` span with `op` and `stage` fields. Enable the
//! `metrics` feature to increment `oauthapp_op_total{op,outcome}` for every attempt, success,
//! and failure, and `oauthapp_reaped_total{reason}` for every reaped credential.

mod metrics;
mod span;

pub use metrics::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Operations observed by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Refresh of an authorization-code credential.
	Refresh,
	/// RFC 8693 token exchange.
	Exchange,
	/// Client-credentials issuance.
	ClientCredentials,
	/// Authorization code or refresh-token import.
	AuthCodeExchange,
	/// Device authorization start or poll.
	DeviceCode,
	/// Reap evaluation of a credential.
	Reap,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Refresh => "refresh",
			OpKind::Exchange => "exchange",
			OpKind::ClientCredentials => "client_credentials",
			OpKind::AuthCodeExchange => "auth_code_exchange",
			OpKind::DeviceCode => "device_code",
			OpKind::Reap => "reap",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// A provider call is about to be made.
	Attempt,
	/// The operation left the credential usable.
	Success,
	/// The operation failed or recorded a failure on the credential.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
