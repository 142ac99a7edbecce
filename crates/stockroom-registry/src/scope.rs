//! Owner scoping for registry views
//!
//! A view is bound to one [`Scope`] for its whole life. Reads are filtered
//! by it, writes are stamped with it.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Ownership};
use crate::error::{RegistryError, RegistryResult};

/// Authenticated caller identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: EntityId,
    pub tenant_id: Option<EntityId>,
}

impl Principal {
    pub fn new(user_id: EntityId, tenant_id: Option<EntityId>) -> Self {
        Self { user_id, tenant_id }
    }

    /// Nil identifiers never resolve to a caller
    pub fn resolve(principal: Option<&Principal>) -> RegistryResult<Principal> {
        match principal {
            Some(p) if !p.user_id.is_nil() => Ok(*p),
            Some(_) => Err(RegistryError::Authorization(
                "caller identity has a nil user id".to_string(),
            )),
            None => Err(RegistryError::Authorization(
                "user-scoped registry requires a caller identity".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Sees only records owned by the tenant
    Tenant(EntityId),
    /// Sees only records owned by the user
    User(Principal),
    /// Unrestricted, for background jobs and administration
    Service,
}

impl Scope {
    /// User scope for a resolvable caller identity
    pub fn for_user(principal: Option<&Principal>) -> RegistryResult<Scope> {
        Principal::resolve(principal).map(Scope::User)
    }

    pub fn for_tenant(tenant_id: EntityId) -> RegistryResult<Scope> {
        if tenant_id.is_nil() {
            return Err(RegistryError::Authorization(
                "tenant-scoped registry requires a tenant id".to_string(),
            ));
        }
        Ok(Scope::Tenant(tenant_id))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Tenant(_) => "tenant",
            Scope::User(_) => "user",
            Scope::Service => "service",
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Scope::Service)
    }

    pub fn permits(&self, ownership: &Ownership) -> bool {
        match self {
            Scope::Tenant(tenant_id) => ownership.tenant_id == Some(*tenant_id),
            Scope::User(principal) => ownership.user_id == Some(principal.user_id),
            Scope::Service => true,
        }
    }

    /// Stamp owner references on a record written through this view.
    /// Service writes keep whatever ownership the caller supplied.
    pub fn stamp(&self, ownership: &mut Ownership) {
        match self {
            Scope::Tenant(tenant_id) => ownership.tenant_id = Some(*tenant_id),
            Scope::User(principal) => {
                ownership.user_id = Some(principal.user_id);
                if principal.tenant_id.is_some() {
                    ownership.tenant_id = principal.tenant_id;
                }
            }
            Scope::Service => {}
        }
    }
}
