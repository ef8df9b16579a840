//! Ownership authorization for shared objects
//!
//! Before overwriting an object that already exists, a requester must prove
//! it is one of the object's owners. A match requires kind, apiVersion, name
//! and uid to all be equal, so a requester recreated under the same name (new
//! uid) is not an owner of its predecessor's objects.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::Error;

/// Build the controller owner reference for a resource.
///
/// Fails when the resource has not been persisted yet (no name or uid).
pub fn owner_reference<K>(owner: &K) -> Result<OwnerReference, Error>
where
    K: Resource<DynamicType = ()>,
{
    owner.controller_owner_ref(&()).ok_or_else(|| {
        Error::internal_with_context(
            "owner_reference",
            format!("{} has no name or uid", K::kind(&())),
        )
    })
}

/// True iff at least one of `existing` identifies `requester`.
///
/// An object with no owner references is owned by nobody, so this returns
/// false for an empty list.
pub fn is_authorized(requester: &OwnerReference, existing: &[OwnerReference]) -> bool {
    existing.iter().any(|owner| {
        owner.kind == requester.kind
            && owner.api_version == requester.api_version
            && owner.name == requester.name
            && owner.uid == requester.uid
    })
}

/// Fail with [`Error::AuthorizationDenied`] unless `requester` owns `object`.
pub fn authorize(
    requester: &OwnerReference,
    object: &str,
    existing: &[OwnerReference],
) -> Result<(), Error> {
    if is_authorized(requester, existing) {
        return Ok(());
    }
    tracing::warn!(
        object,
        requester.kind = %requester.kind,
        requester.name = %requester.name,
        owners = existing.len(),
        "refusing to overwrite object not owned by requester"
    );
    Err(Error::authorization_denied(
        object,
        format!("{}/{}", requester.kind, requester.name),
    ))
}
