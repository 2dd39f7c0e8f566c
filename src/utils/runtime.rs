//! Bridge from synchronous code into the tokio runtime

use anyhow::{Context, Result};
use std::future::Future;

/// Drive `future` to completion from synchronous code.
///
/// Reuses the ambient runtime when called from a blocking worker
/// (`spawn_blocking`), otherwise spins up a current-thread runtime for the call.
/// Must not be called from inside an async task.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start tokio runtime")?;
            Ok(runtime.block_on(future))
        }
    }
}
