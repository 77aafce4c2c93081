//! Worker processes.
//!
//! Each worker is an interpreter process running the language pack's loader
//! with `<port> <source path>` as arguments. A watcher task owns the child:
//! it logs an unexpected exit, and kills the child once the instance's
//! shutdown sender fires or is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use fngate_core::epoch_millis;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::error::{RuntimeError, RuntimeResult};

/// Host part of every worker URL.
pub const WORKER_HOST: &str = "localhost";

pub fn worker_url(port: u16) -> String {
    format!("http://{WORKER_HOST}:{port}")
}

/// How a worker process is launched.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub interpreter: String,
    pub loader: PathBuf,
}

/// A live worker owned by the supervisor's instance table.
///
/// Dropping the instance stops its process.
#[derive(Debug)]
pub struct FunctionInstance {
    pub id: String,
    pub uri: String,
    pub port: u16,
    pub pid: Option<u32>,
    pub created_at: u64,
    pub updated_at: u64,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FunctionInstance {
    /// Signal the watcher to kill the process.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Launch a worker for `source` on `port`.
///
/// Only the launch is checked here; readiness is the caller's concern.
pub fn spawn_worker(
    command: &WorkerCommand,
    key: &str,
    port: u16,
    source: &Path,
) -> RuntimeResult<FunctionInstance> {
    let spawn_err = |reason: String| RuntimeError::Spawn {
        program: command.interpreter.clone(),
        reason,
    };
    if !source.is_file() {
        return Err(spawn_err(format!("source {} not found", source.display())));
    }

    let mut child = tokio::process::Command::new(&command.interpreter)
        .arg(&command.loader)
        .arg(port.to_string())
        .arg(source)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_err(e.to_string()))?;

    let pid = child.id();
    let id = format!("{key}-{port}");
    let (tx, rx) = oneshot::channel::<()>();

    let watched = id.clone();
    tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => warn!(instance = %watched, %status, "worker exited"),
                Err(e) => error!(instance = %watched, error = %e, "failed to wait on worker"),
            },
            _ = rx => match child.kill().await {
                Ok(()) => info!(instance = %watched, "worker stopped"),
                Err(e) => warn!(instance = %watched, error = %e, "failed to kill worker"),
            },
        }
    });

    info!(instance = %id, port, ?pid, "worker spawned");
    let now = epoch_millis();
    Ok(FunctionInstance {
        id,
        uri: worker_url(port),
        port,
        pid,
        created_at: now,
        updated_at: now,
        shutdown: Some(tx),
    })
}
