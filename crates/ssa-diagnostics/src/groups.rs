//! API group predicates.
//!
//! Built-in Kubernetes types are validated by their OpenAPI schema, while
//! custom resources may carry user-defined CEL rules. Telling the two apart
//! only needs the apiVersion.

use phf::phf_map;
use regex::Regex;
use std::sync::OnceLock;

use crate::ApiError;

/// Reserved suffix of groups defined by Kubernetes itself.
const KUBERNETES_GROUP_SUFFIX: &str = ".k8s.io";

/// Groups of the well-known built-in kinds. The core group is empty.
static BUILTIN_KIND_GROUPS: phf::Map<&'static str, &'static str> = phf_map! {
	"Binding" => "",
	"ConfigMap" => "",
	"Endpoints" => "",
	"Event" => "",
	"LimitRange" => "",
	"Namespace" => "",
	"Node" => "",
	"PersistentVolume" => "",
	"PersistentVolumeClaim" => "",
	"Pod" => "",
	"PodTemplate" => "",
	"ReplicationController" => "",
	"ResourceQuota" => "",
	"Secret" => "",
	"Service" => "",
	"ServiceAccount" => "",
	"ControllerRevision" => "apps",
	"DaemonSet" => "apps",
	"Deployment" => "apps",
	"ReplicaSet" => "apps",
	"StatefulSet" => "apps",
	"HorizontalPodAutoscaler" => "autoscaling",
	"CronJob" => "batch",
	"Job" => "batch",
	"PodDisruptionBudget" => "policy",
	"MutatingWebhookConfiguration" => "admissionregistration.k8s.io",
	"ValidatingAdmissionPolicy" => "admissionregistration.k8s.io",
	"ValidatingAdmissionPolicyBinding" => "admissionregistration.k8s.io",
	"ValidatingWebhookConfiguration" => "admissionregistration.k8s.io",
	"CustomResourceDefinition" => "apiextensions.k8s.io",
	"APIService" => "apiregistration.k8s.io",
	"CertificateSigningRequest" => "certificates.k8s.io",
	"Lease" => "coordination.k8s.io",
	"EndpointSlice" => "discovery.k8s.io",
	"FlowSchema" => "flowcontrol.apiserver.k8s.io",
	"PriorityLevelConfiguration" => "flowcontrol.apiserver.k8s.io",
	"Ingress" => "networking.k8s.io",
	"IngressClass" => "networking.k8s.io",
	"NetworkPolicy" => "networking.k8s.io",
	"RuntimeClass" => "node.k8s.io",
	"ClusterRole" => "rbac.authorization.k8s.io",
	"ClusterRoleBinding" => "rbac.authorization.k8s.io",
	"Role" => "rbac.authorization.k8s.io",
	"RoleBinding" => "rbac.authorization.k8s.io",
	"PriorityClass" => "scheduling.k8s.io",
	"CSIDriver" => "storage.k8s.io",
	"CSINode" => "storage.k8s.io",
	"StorageClass" => "storage.k8s.io",
	"VolumeAttachment" => "storage.k8s.io",
};

/// Group part of an apiVersion, empty for the core group (`v1`).
pub fn api_group(api_version: &str) -> &str {
	api_version
		.split_once('/')
		.map_or("", |(group, _version)| group)
}

/// Whether `api_version` belongs to a group served by Kubernetes itself.
///
/// That is the core group, any group without a dot (`apps`, `batch`) and
/// any group under `k8s.io`. Everything else is a custom resource group.
pub fn is_builtin_api_group(api_version: &str) -> bool {
	if !api_version.contains('/') {
		return true;
	}
	let group = api_group(api_version);
	!group.contains('.') || group.ends_with(KUBERNETES_GROUP_SUFFIX)
}

/// The group a well-known built-in kind lives in.
pub fn expected_api_group(kind: &str) -> Option<&'static str> {
	BUILTIN_KIND_GROUPS.get(kind).copied()
}

/// The resource type is not served (yet). Common while the defining CRD is
/// still being installed.
pub fn is_crd_not_found(err: &ApiError) -> bool {
	let message = err.message.to_lowercase();
	message.contains("no matches for kind") || message.contains("could not find the requested resource")
}

fn namespace_not_found_regex() -> Option<&'static Regex> {
	static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
	REGEX
		.get_or_init(|| Regex::new(r#"namespaces "[^"]+" not found"#).ok())
		.as_ref()
}

/// The target namespace does not exist (yet).
pub fn is_namespace_not_found(err: &ApiError) -> bool {
	if err.is_not_found()
		&& err
			.details
			.as_ref()
			.is_some_and(|details| details.kind == "namespaces")
	{
		return true;
	}
	namespace_not_found_regex().is_some_and(|regex| regex.is_match(&err.message))
}

/// The error will likely go away once another resource of the same apply
/// (a CRD or a namespace) is in place, so retrying is worthwhile.
pub fn is_dependency_not_ready_error(err: &ApiError) -> bool {
	is_crd_not_found(err) || is_namespace_not_found(err)
}

/// A built-in kind was requested under a group it does not live in, e.g.
/// `Deployment` in `extensions/v1beta1`. Retrying will not help.
pub fn is_invalid_api_group_error(err: &ApiError, kind: &str, api_version: &str) -> bool {
	if !(err.is_not_found() || is_crd_not_found(err)) {
		return false;
	}
	expected_api_group(kind).is_some_and(|expected| api_group(api_version) != expected)
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::{ErrorDetails, StatusReason};

	#[rstest]
	#[case::core("v1", true)]
	#[case::apps("apps/v1", true)]
	#[case::batch("batch/v1", true)]
	#[case::k8s_io("networking.k8s.io/v1", true)]
	#[case::apiserver_k8s_io("flowcontrol.apiserver.k8s.io/v1", true)]
	#[case::crd("widgets.example.com/v1", false)]
	#[case::cluster_api("cluster.x-k8s.io/v1beta1", false)]
	#[case::cert_manager("cert-manager.io/v1", false)]
	fn test_is_builtin_api_group(#[case] api_version: &str, #[case] expected: bool) {
		assert_eq!(is_builtin_api_group(api_version), expected);
	}

	#[test]
	fn test_api_group() {
		assert_eq!(api_group("v1"), "");
		assert_eq!(api_group("apps/v1"), "apps");
		assert_eq!(api_group("widgets.example.com/v1alpha1"), "widgets.example.com");
	}

	#[test]
	fn test_expected_api_group() {
		assert_eq!(expected_api_group("Deployment"), Some("apps"));
		assert_eq!(expected_api_group("ConfigMap"), Some(""));
		assert_eq!(expected_api_group("Ingress"), Some("networking.k8s.io"));
		assert_eq!(expected_api_group("Widget"), None);
	}

	#[test]
	fn test_crd_not_found() {
		let err = ApiError::from_message(r#"no matches for kind "Widget" in version "example.com/v1""#);
		assert!(is_crd_not_found(&err));
		assert!(is_dependency_not_ready_error(&err));

		let err = ApiError::new(404, "NotFound", "the server could not find the requested resource");
		assert!(is_crd_not_found(&err));

		let err = ApiError::new(404, "NotFound", r#"deployments.apps "web" not found"#);
		assert!(!is_crd_not_found(&err));
		assert!(!is_dependency_not_ready_error(&err));
	}

	#[test]
	fn test_namespace_not_found() {
		let by_details = ApiError::new(404, StatusReason::NotFound, "not found").with_details(ErrorDetails {
			name: "team-a".to_string(),
			kind: "namespaces".to_string(),
			..ErrorDetails::default()
		});
		assert!(is_namespace_not_found(&by_details));

		let by_message = ApiError::new(404, "NotFound", r#"namespaces "team-a" not found"#);
		assert!(is_namespace_not_found(&by_message));
		assert!(is_dependency_not_ready_error(&by_message));

		let other = ApiError::new(404, "NotFound", r#"configmaps "settings" not found"#);
		assert!(!is_namespace_not_found(&other));
	}

	#[test]
	fn test_invalid_api_group() {
		let err = ApiError::from_message(
			r#"no matches for kind "Deployment" in version "extensions/v1beta1""#,
		);
		assert!(is_invalid_api_group_error(&err, "Deployment", "extensions/v1beta1"));
		assert!(!is_invalid_api_group_error(&err, "Deployment", "apps/v1"));
		assert!(!is_invalid_api_group_error(&err, "Widget", "example.com/v1"));

		let forbidden = ApiError::new(403, "Forbidden", "forbidden");
		assert!(!is_invalid_api_group_error(&forbidden, "Deployment", "extensions/v1beta1"));
	}
}
