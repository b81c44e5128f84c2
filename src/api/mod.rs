//! Typed Grafana operator resources in the legacy (`v1alpha1`) and target (`v1beta1`) schemas.

use serde::Serialize;

/// Access to the spec that conversion reads and reconciliation owns.
pub trait HasSpec {
    type Spec: Serialize + Clone + Send + Sync;

    fn spec(&self) -> &Self::Spec;
    fn spec_mut(&mut self) -> &mut Self::Spec;
}

/// Implements `kube::Resource` and `HasSpec` for a namespaced custom resource
/// shaped as `{ types, metadata, spec, .. }`.
macro_rules! namespaced_resource {
    ($ty:ident, $spec:ty, group = $group:expr, version = $version:expr, kind = $kind:expr, plural = $plural:expr) => {
        impl ::kube::Resource for $ty {
            type DynamicType = ();
            type Scope = ::k8s_openapi::NamespaceResourceScope;

            fn kind(_: &()) -> ::std::borrow::Cow<'_, str> {
                ::std::borrow::Cow::Borrowed($kind)
            }

            fn group(_: &()) -> ::std::borrow::Cow<'_, str> {
                ::std::borrow::Cow::Borrowed($group)
            }

            fn version(_: &()) -> ::std::borrow::Cow<'_, str> {
                ::std::borrow::Cow::Borrowed($version)
            }

            fn plural(_: &()) -> ::std::borrow::Cow<'_, str> {
                ::std::borrow::Cow::Borrowed($plural)
            }

            fn meta(&self) -> &::k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut ::k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                &mut self.metadata
            }
        }

        impl $crate::api::HasSpec for $ty {
            type Spec = $spec;

            fn spec(&self) -> &$spec {
                &self.spec
            }

            fn spec_mut(&mut self) -> &mut $spec {
                &mut self.spec
            }
        }

        impl $ty {
            /// Builds an object with `apiVersion`/`kind` filled in.
            pub fn new(namespace: &str, name: &str, spec: $spec) -> Self {
                Self {
                    types: Some(::kube::core::TypeMeta {
                        api_version: format!("{}/{}", $group, $version),
                        kind: $kind.to_string(),
                    }),
                    metadata: ::k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                        namespace: Some(namespace.to_string()),
                        name: Some(name.to_string()),
                        ..Default::default()
                    },
                    spec,
                    status: None,
                }
            }
        }
    };
}

pub(crate) use namespaced_resource;

pub mod v1alpha1;
pub mod v1beta1;
