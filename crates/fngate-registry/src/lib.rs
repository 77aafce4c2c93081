//! fngate-registry: persistent store of function definitions.
//!
//! Every backend implements [`FunctionRegistry`], the full capability set the
//! gateway and its reconciliation pass rely on: strict create, upsert,
//! lookups, deletes, a full `load`, and lifecycle hooks.
//!
//! # Backends
//!
//! | Type string | Backend | Durability |
//! |---|---|---|
//! | `inmemory` | [`InMemoryRegistry`] | none, lost on restart |
//! | `redb` | [`RedbRegistry`] | single-file redb database |
//!
//! [`RegistryFactory`] turns a configured type string into a shared
//! `Arc<dyn FunctionRegistry>`. The entry point owns the factory and passes
//! the handle to whoever needs it.

pub mod error;
pub mod factory;
pub mod memory;
pub mod redb_store;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use factory::{RegistryFactory, RegistryKind};
pub use memory::InMemoryRegistry;
pub use redb_store::RedbRegistry;
pub use registry::FunctionRegistry;
