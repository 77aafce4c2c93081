//! fngate-runtime: worker supervision for fngate.
//!
//! Allocates worker ports, stages uploaded sources on disk, spawns worker
//! processes through their language pack's loader, and verifies readiness
//! through each worker's `/health` endpoint before handing out its URL.

pub mod error;
pub mod ports;
pub mod probe;
pub mod staging;
pub mod supervisor;
pub mod worker;

pub use error::{RuntimeError, RuntimeResult};
pub use ports::PortAllocator;
pub use probe::{ProbeResult, RetryPolicy, health_check, health_check_retry, http_probe};
pub use staging::SourceStaging;
pub use supervisor::{Supervisor, SupervisorConfig, parse_language_pack};
pub use worker::{FunctionInstance, WorkerCommand};
