//! minion-lambda — launch workers by invoking a serverless function.
//!
//! Implements `minion_launcher::Provisioner` on top of the Lambda Invoke
//! REST call:
//!
//! ```text
//! POST http://{endpoint}/2015-03-31/functions/{target}/invocations
//! X-Amz-Invocation-Type: RequestResponse
//!
//! {"CallBackServer": "...", "MaxServeTime": 15}
//! ```
//!
//! The call is synchronous from the worker's point of view: it returns when
//! the function exits, which for a minion worker is after its serve window.
//! Requests are unsigned, so the endpoint is expected to be a runtime
//! interface emulator or a signing gateway in front of the real service.

pub mod invoker;

pub use invoker::LambdaInvoker;
