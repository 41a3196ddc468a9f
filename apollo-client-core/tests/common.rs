use std::sync::Arc;
use std::time::Duration;

use apollo_client_core::error::FetchError;
use apollo_client_core::graphql::Request;
use apollo_client_core::graphql::Response;
use apollo_client_core::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

type Script = dyn Fn(&Request, usize) -> (Duration, Result<Response, FetchError>) + Send + Sync;

/// A transport answering with a script, after a delay chosen by the script.
///
/// The script gets each request and its index among all requests sent.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Script>,
    requests: Arc<Mutex<Vec<(Instant, Request)>>>,
    start: Instant,
}

impl ScriptedTransport {
    pub fn new(
        script: impl Fn(&Request, usize) -> (Duration, Result<Response, FetchError>)
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            script: Arc::new(script),
            requests: Default::default(),
            start: Instant::now(),
        }
    }

    /// Times at which requests for `operation_name` were sent, relative to
    /// the creation of the transport.
    pub fn request_times(&self, operation_name: &str) -> Vec<Duration> {
        self.requests
            .lock()
            .iter()
            .filter(|(_, request)| request.operation_name.as_deref() == Some(operation_name))
            .map(|(at, _)| at.duration_since(self.start))
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: Request) -> Result<Response, FetchError> {
        let (delay, result) = {
            let mut requests = self.requests.lock();
            let answer = (self.script)(&request, requests.len());
            requests.push((Instant::now(), request));
            answer
        };
        tokio::time::sleep(delay).await;
        result
    }
}

pub fn data(value: serde_json_bytes::Value) -> Result<Response, FetchError> {
    Ok(Response::builder().data(value).build())
}
