use crate::auth::permissions::{Identity, Permission};
use crate::error::ApiError;

/// Resources with a single, immutable owner.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

/// Whether `identity` may mutate `resource`: it holds the blanket permission
/// or it owns the resource.
pub fn can_mutate<R: Owned + ?Sized>(identity: &Identity, resource: &R, blanket: Permission) -> bool {
    identity.can(blanket) || resource.owner_id() == identity.id
}

/// [`can_mutate`] as a refusal the handler can propagate with `?`.
pub fn ensure_can_mutate<R: Owned + ?Sized>(
    identity: &Identity,
    resource: &R,
    blanket: Permission,
) -> Result<(), ApiError> {
    if can_mutate(identity, resource, blanket) {
        return Ok(());
    }
    tracing::warn!(
        user_id = identity.id,
        owner_id = resource.owner_id(),
        permission = %blanket,
        "mutation refused: neither owner nor permission holder"
    );
    Err(ApiError::forbidden("Unauthorized"))
}
