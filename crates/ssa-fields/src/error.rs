use thiserror::Error;

pub type Result<T, E = FieldsError> = std::result::Result<T, E>;

/// Errors raised while decoding ownership data.
///
/// Most of the extraction path recovers from these locally, only the
/// single-manager lookups surface them to the caller.
#[derive(Debug, Error)]
pub enum FieldsError {
	#[error("merge key {key:?} does not start with {prefix:?}")]
	MissingPrefix { key: String, prefix: &'static str },

	#[error("merge key {key:?} is not a JSON object")]
	InvalidMergeKey {
		key: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("ownership payload of manager {manager:?} is not an object")]
	InvalidPayload { manager: String },

	#[error("serializing ownership payload of manager {manager:?}")]
	PayloadSerialization {
		manager: String,
		#[source]
		source: serde_json::Error,
	},
}
