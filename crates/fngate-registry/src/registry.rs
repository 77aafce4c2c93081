//! The storage contract every registry backend satisfies.

use async_trait::async_trait;
use fngate_core::{function_key, FunctionDefinition, FunctionKey};

use crate::error::RegistryResult;

#[async_trait]
pub trait FunctionRegistry: Send + Sync {
    /// Acquire backend resources. Idempotent.
    async fn init(&self) -> RegistryResult<()>;

    /// Store a new definition, stamping `created_at == updated_at == now`.
    ///
    /// Fails with `AlreadyExists` if the derived key is present.
    async fn create(&self, def: &FunctionDefinition) -> RegistryResult<FunctionKey>;

    /// Upsert. Absent keys behave exactly like [`create`](Self::create);
    /// present keys keep `created_at` and get a strictly newer `updated_at`.
    async fn update(&self, def: &FunctionDefinition) -> RegistryResult<FunctionKey>;

    /// Fails with `NotFound` if absent.
    async fn get_by_key(&self, key: &str) -> RegistryResult<FunctionDefinition>;

    /// Removes the entry and returns its key; `NotFound` if absent.
    async fn delete_by_key(&self, key: &str) -> RegistryResult<FunctionKey>;

    /// Every stored definition, in no particular order.
    async fn load(&self) -> RegistryResult<Vec<FunctionDefinition>>;

    /// Backend-specific flush. May be a no-op.
    async fn sync(&self) -> RegistryResult<()>;

    /// Liveness of the backend.
    async fn health(&self) -> bool;

    /// Release backend resources.
    async fn close(&self) -> RegistryResult<()>;

    /// Backend type string, as accepted by the factory.
    fn backend_name(&self) -> &'static str;

    async fn get_by_topic(&self, tenant: &str, name: &str) -> RegistryResult<FunctionDefinition> {
        self.get_by_key(&function_key(tenant, name)).await
    }

    async fn delete(&self, tenant: &str, name: &str) -> RegistryResult<FunctionKey> {
        self.delete_by_key(&function_key(tenant, name)).await
    }
}

/// Merge an incoming definition over a stored one for an upsert.
///
/// Identity and `created_at` come from the stored record; every other
/// attribute comes from the incoming one.
pub(crate) fn merge_update(
    existing: &FunctionDefinition,
    incoming: &FunctionDefinition,
) -> FunctionDefinition {
    FunctionDefinition {
        id: existing.id.clone(),
        name: existing.name.clone(),
        created_at: existing.created_at,
        updated_at: fngate_core::next_stamp(existing.updated_at),
        ..incoming.clone()
    }
}

/// Prepare a definition for first insertion.
pub(crate) fn stamp_new(def: &FunctionDefinition, key: &str) -> FunctionDefinition {
    let now = fngate_core::epoch_millis();
    FunctionDefinition {
        id: key.to_string(),
        created_at: now,
        updated_at: now,
        ..def.clone()
    }
}
