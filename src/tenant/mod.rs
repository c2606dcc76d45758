//! Tenant directory.
//!
//! A tenant (knowledge base) is identified by a stable id and an alternate
//! share token; the core only needs the mapping `share_token | id →
//! collection`. Tenant CRUD lives with the admin layer, which feeds this
//! directory at startup and on change.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::vectorstore::{VectorStoreError, validate_collection_name};

/// An isolated knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Stable opaque id.
    pub id: String,
    /// Alternate public token used by the chat widget.
    pub share_token: String,
    /// Primary vector collection name; `{collection}_qa` and
    /// `{collection}_questions` are derived from it.
    pub collection: String,
    /// Display name shown by the chat widget.
    #[serde(default)]
    pub project_name: String,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: String,
    /// Welcome message shown before the first question.
    #[serde(default)]
    pub welcome_message: String,
}

/// Concurrent `token → tenant` mapping.
#[derive(Default)]
pub struct TenantDirectory {
    by_token: RwLock<HashMap<String, Tenant>>,
}

impl TenantDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tenant under both its id and share token. The collection
    /// name is validated here so a malformed tenant never reaches a query.
    pub fn insert(&self, tenant: Tenant) -> Result<(), VectorStoreError> {
        validate_collection_name(&tenant.collection)?;

        let mut map = self.by_token.write();
        map.insert(tenant.id.clone(), tenant.clone());
        map.insert(tenant.share_token.clone(), tenant);
        Ok(())
    }

    /// Resolves a share token or id.
    pub fn resolve(&self, token: &str) -> Option<Tenant> {
        self.by_token.read().get(token).cloned()
    }

    /// Removes a tenant by id, returning it if present.
    pub fn remove(&self, id: &str) -> Option<Tenant> {
        let mut map = self.by_token.write();
        let tenant = map.remove(id)?;
        map.remove(&tenant.share_token);
        Some(tenant)
    }

    /// Number of registered tenants.
    pub fn len(&self) -> usize {
        // Each tenant appears under two keys.
        self.by_token.read().values().map(|t| &t.id).collect::<std::collections::HashSet<_>>().len()
    }

    /// Returns `true` if no tenants are registered.
    pub fn is_empty(&self) -> bool {
        self.by_token.read().is_empty()
    }
}

impl Tenant {
    /// Convenience constructor for the common fields.
    pub fn new(
        id: impl Into<String>,
        share_token: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            share_token: share_token.into(),
            collection: collection.into(),
            project_name: String::new(),
            avatar_url: String::new(),
            welcome_message: String::new(),
        }
    }
}
