//! The provisioning backend seam.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProvisionError;

/// Boxed future returned by [`Provisioner::invoke`].
pub type InvokeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<u8>, ProvisionError>> + Send + 'a>>;

/// Launches one remote worker.
///
/// `target` names the function to run and `payload` is the already-encoded
/// request body. The returned bytes are the backend's response, which the
/// launcher only uses to tell success from failure.
pub trait Provisioner: Send + Sync {
    fn invoke<'a>(&'a self, target: &'a str, payload: Vec<u8>) -> InvokeFuture<'a>;
}
