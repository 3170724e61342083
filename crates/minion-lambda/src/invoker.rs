//! Lambda Invoke client.
//!
//! One HTTP/1.1 connection per invocation, driven by hyper. The whole
//! exchange (connect, send, read body) is bounded by a single timeout.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http_body_util::{BodyExt, Full};
use tracing::debug;

use minion_launcher::{InvokeFuture, ProvisionError, Provisioner};

const INVOCATION_TYPE: &str = "x-amz-invocation-type";
const FUNCTION_ERROR: &str = "x-amz-function-error";

/// Invokes functions on a Lambda-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct LambdaInvoker {
    /// host:port of the invoke API.
    endpoint: String,
    timeout: Duration,
}

impl LambdaInvoker {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke `function` synchronously with `payload` and return its response body.
    ///
    /// Fails on connection errors, timeouts, non-2xx statuses, and responses
    /// carrying `X-Amz-Function-Error`.
    pub async fn invoke_function(
        &self,
        function: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, ProvisionError> {
        match tokio::time::timeout(self.timeout, self.send(function, payload)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(endpoint = %self.endpoint, %function, "invoke timed out");
                Err(ProvisionError::Timeout(self.timeout))
            }
        }
    }

    async fn send(&self, function: &str, payload: Vec<u8>) -> Result<Vec<u8>, ProvisionError> {
        let path = invocation_path(function);

        let stream = tokio::net::TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| self.connect_error(e))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| self.connect_error(e))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "invoke connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(&path)
            .header(HOST, &self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "minion-lambda/0.1")
            .header(INVOCATION_TYPE, "RequestResponse")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| ProvisionError::Other(e.to_string()))?;

        debug!(endpoint = %self.endpoint, %path, "invoking function");
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ProvisionError::Other(e.to_string()))?;

        let status = resp.status();
        let function_error = resp
            .headers()
            .get(FUNCTION_ERROR)
            .map(|v| v.to_str().unwrap_or("Unhandled").to_string());

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ProvisionError::Other(e.to_string()))?
            .to_bytes()
            .to_vec();

        if !status.is_success() {
            return Err(ProvisionError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        if let Some(kind) = function_error {
            return Err(ProvisionError::Function {
                kind,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }

    fn connect_error(&self, e: impl std::fmt::Display) -> ProvisionError {
        ProvisionError::Connect {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        }
    }
}

impl Provisioner for LambdaInvoker {
    fn invoke<'a>(&'a self, target: &'a str, payload: Vec<u8>) -> InvokeFuture<'a> {
        Box::pin(self.invoke_function(target, payload))
    }
}

fn invocation_path(function: &str) -> String {
    format!("/2015-03-31/functions/{function}/invocations")
}
