use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;

use crate::{BindError, BindResult};

/// The in-flight (or last-completed) outcome of a binding operation.
///
/// Cloneable and awaitable any number of times. The underlying work runs on a
/// spawned task, so a resolution makes progress whether or not anyone awaits
/// it.
pub type Resolution<T> = Shared<BoxFuture<'static, BindResult<T>>>;

/// An already-settled resolution
pub fn resolved<T>(outcome: BindResult<T>) -> Resolution<T>
where
    T: Clone + Send + Sync + 'static,
{
    future::ready(outcome).boxed().shared()
}

/// Spawn `work` and expose its outcome as a shareable resolution.
/// Must be called from within a Tokio runtime context.
pub(crate) fn spawn_resolution<T, F>(work: F) -> Resolution<T>
where
    T: Clone + Send + Sync + 'static,
    F: Future<Output = BindResult<T>> + Send + 'static,
{
    let handle = tokio::spawn(work);
    async move {
        match handle.await {
            Ok(outcome) => outcome,
            Err(join) => Err(BindError::interrupted(join.to_string())),
        }
    }
    .boxed()
    .shared()
}
