//! API server errors as seen by the classifier.

use serde::Deserialize;
use thiserror::Error;

/// Machine-readable reason of a failed request, as in `metav1.Status.reason`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum StatusReason {
	NotFound,
	Forbidden,
	Conflict,
	AlreadyExists,
	Invalid,
	BadRequest,
	Unauthorized,
	Timeout,
	ServerTimeout,
	Gone,
	MethodNotAllowed,
	NotAcceptable,
	UnsupportedMediaType,
	RequestEntityTooLarge,
	TooManyRequests,
	InternalError,
	ServiceUnavailable,
	Expired,
	/// Empty or unrecognized reason.
	#[default]
	Unknown,
}

impl From<&str> for StatusReason {
	fn from(reason: &str) -> Self {
		match reason {
			"NotFound" => Self::NotFound,
			"Forbidden" => Self::Forbidden,
			"Conflict" => Self::Conflict,
			"AlreadyExists" => Self::AlreadyExists,
			"Invalid" => Self::Invalid,
			"BadRequest" => Self::BadRequest,
			"Unauthorized" => Self::Unauthorized,
			"Timeout" => Self::Timeout,
			"ServerTimeout" => Self::ServerTimeout,
			"Gone" => Self::Gone,
			"MethodNotAllowed" => Self::MethodNotAllowed,
			"NotAcceptable" => Self::NotAcceptable,
			"UnsupportedMediaType" => Self::UnsupportedMediaType,
			"RequestEntityTooLarge" => Self::RequestEntityTooLarge,
			"TooManyRequests" => Self::TooManyRequests,
			"InternalError" => Self::InternalError,
			"ServiceUnavailable" => Self::ServiceUnavailable,
			"Expired" => Self::Expired,
			_ => Self::Unknown,
		}
	}
}

impl From<String> for StatusReason {
	fn from(reason: String) -> Self {
		Self::from(reason.as_str())
	}
}

/// Subject of a failed request, from `metav1.Status.details`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetails {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub group: String,
	/// Plural resource name, e.g. `namespaces`.
	#[serde(default)]
	pub kind: String,
}

/// A failed API request.
///
/// Deserializes from the `Status` body the API server returns. Errors raised
/// on the client side, before any request reached the server, carry only a
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
	#[serde(default)]
	pub code: Option<u16>,
	#[serde(default)]
	pub reason: StatusReason,
	#[serde(default)]
	pub message: String,
	#[serde(default)]
	pub details: Option<ErrorDetails>,
}

impl ApiError {
	pub fn new(code: u16, reason: impl Into<StatusReason>, message: impl Into<String>) -> Self {
		Self {
			code: Some(code),
			reason: reason.into(),
			message: message.into(),
			details: None,
		}
	}

	pub fn from_message(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			..Self::default()
		}
	}

	pub fn with_details(mut self, details: ErrorDetails) -> Self {
		self.details = Some(details);
		self
	}

	/// The reason decides when the server sent one, the status code only
	/// otherwise.
	fn is(&self, reason: StatusReason, code: u16) -> bool {
		match self.reason {
			StatusReason::Unknown => self.code == Some(code),
			actual => actual == reason,
		}
	}

	pub fn is_not_found(&self) -> bool {
		self.is(StatusReason::NotFound, 404)
	}

	pub fn is_forbidden(&self) -> bool {
		self.is(StatusReason::Forbidden, 403)
	}

	/// Field manager conflicts. `AlreadyExists` shares the 409 code and is
	/// not a conflict.
	pub fn is_conflict(&self) -> bool {
		self.is(StatusReason::Conflict, 409)
	}

	pub fn is_already_exists(&self) -> bool {
		self.reason == StatusReason::AlreadyExists
	}

	pub fn is_timeout(&self) -> bool {
		self.is(StatusReason::Timeout, 504) || self.reason == StatusReason::ServerTimeout
	}

	pub fn is_unauthorized(&self) -> bool {
		self.is(StatusReason::Unauthorized, 401)
	}

	pub fn is_bad_request(&self) -> bool {
		self.is(StatusReason::BadRequest, 400)
	}

	pub fn is_invalid(&self) -> bool {
		self.is(StatusReason::Invalid, 422)
	}

	/// Raised by the client itself, the server never answered.
	pub fn is_client_side(&self) -> bool {
		self.code.is_none() && self.reason == StatusReason::Unknown
	}
}

#[cfg(feature = "kube")]
impl From<&kube::Error> for ApiError {
	fn from(err: &kube::Error) -> Self {
		match err {
			kube::Error::Api(status) => Self {
				code: Some(status.code),
				reason: StatusReason::from(status.reason.as_str()),
				message: status.message.clone(),
				details: status.details.as_ref().map(|details| ErrorDetails {
					name: details.name.clone(),
					group: details.group.clone(),
					kind: details.kind.clone(),
				}),
			},
			other => Self::from_message(other.to_string()),
		}
	}
}

#[cfg(feature = "kube")]
impl From<kube::Error> for ApiError {
	fn from(err: kube::Error) -> Self {
		Self::from(&err)
	}
}
