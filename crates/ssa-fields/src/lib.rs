//! Field ownership resolution for Kubernetes server-side apply.
//!
//! Reads the `managedFields` of a live object and tells, for every field
//! path of the user's desired document, which field manager last wrote it.
//!
//! ```
//! use ssa_fields::{build_ownership_map, managed_fields_from_object};
//! use serde_json::json;
//!
//! let live = json!({
//! 	"metadata": {"managedFields": [{
//! 		"manager": "kubectl",
//! 		"operation": "Apply",
//! 		"apiVersion": "apps/v1",
//! 		"fieldsType": "FieldsV1",
//! 		"fieldsV1": {"f:spec": {"f:replicas": {}}},
//! 	}]},
//! });
//! let entries = managed_fields_from_object(&live);
//! let owners = build_ownership_map(&entries, &json!({"spec": {"replicas": 3}}));
//! assert_eq!(owners["spec.replicas"].manager, "kubectl");
//! ```

pub mod config;
mod error;
pub mod extract;
pub mod fields_v1;
pub mod merge_key;
mod ownership;
pub mod path;

pub use config::{ResolutionMode, ResolverConfig};
pub use error::{FieldsError, Result};
pub use extract::{extract_simple, PathExtractor};
pub use merge_key::{MergeKey, MergeKeyMatcher};
pub use ownership::{
	build_ownership_map, build_simple_ownership_map, conflicting_paths,
	extract_payload_for_manager, filter_to_paths, format_ignore_fields, managed_fields,
	managed_fields_from_object, FieldOwnership, OwnershipMap, OwnershipResolver,
};
