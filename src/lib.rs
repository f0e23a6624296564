//! Asynchronous JSON-RPC 2.0 client over any duplex text transport.
//!
//! This crate covers the client half of the protocol: building request and
//! notification envelopes, generating correlation ids, and routing each
//! asynchronously arriving response back to the exact caller that issued the
//! matching request. The transport is pluggable: anything that can carry
//! text in both directions works, from a child process's stdio to an
//! in-process [`tokio::io::duplex`] pair.
//!
//! Three call shapes are available on [`Client`]:
//!
//! - [`Client::notify`] sends a notification; no response is expected.
//! - [`Client::call`] sends a request and suspends the calling task until
//!   the matching response arrives.
//! - [`Client::call_with`] sends a request and fires a callback when the
//!   matching response arrives, without suspending the caller.
//!
//! A response carrying a JSON-RPC error object is still an ordinary
//! [`Response`]; telling success apart from application failure is the
//! caller's job (see [`Response::result`]).
//!
//! ```no_run
//! use serde_json::json;
//! use wirecall::{Client, ClientOptions, NO_PARAMS};
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let client = Client::from_stdio(&ClientOptions::default());
//!     client.notify("started", NO_PARAMS).await?;
//!     let response = client.call("add", Some(&json!([1, 2]))).await?;
//!     println!("{}", response.result::<i64>()?);
//!     Ok(())
//! }
//! ```

use std::{
    collections::{HashMap, hash_map},
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use serde::Serialize;
use tokio::{spawn, sync::oneshot, task::JoinHandle, time};
use tracing::warn;

mod client_builder;
mod error;
mod message;
mod transport;

pub use error::*;
pub use message::*;
pub use transport::*;

/// Placeholder argument for calls that carry no params.
pub const NO_PARAMS: Option<&()> = None;

/// Tuning applied to every call issued through a [`Client`].
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    /// Upper bound on how long [`Client::call`] waits for its response.
    ///
    /// `None` keeps the bare protocol contract: a call whose response never
    /// arrives waits forever.
    pub call_timeout: Option<Duration>,
}

/// One-shot action fired when the response matching a registered id arrives.
enum Completion {
    Channel(oneshot::Sender<Result<Response>>),
    Callback(Box<dyn FnOnce(Result<Response>) + Send>),
}

impl Completion {
    fn complete(self, outcome: Result<Response>) {
        match self {
            Completion::Channel(tx) => {
                // The caller may have stopped waiting (timeout rollback).
                let _ = tx.send(outcome);
            }
            Completion::Callback(callback) => callback(outcome),
        }
    }
}

struct ClientState {
    pending: HashMap<RequestId, Completion>,
    next_id: u64,
    shutdown: Option<Error>,
    read_task: Option<JoinHandle<()>>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
            shutdown: None,
            read_task: None,
        }
    }
}

struct RawClient {
    state: Mutex<ClientState>,
    writer: tokio::sync::Mutex<BoxTransportWrite>,
    options: ClientOptions,
}

impl RawClient {
    /// Registers a fresh id for an outgoing call.
    ///
    /// Register and resolve both take the state lock, so a response racing
    /// with registration can never slip past its completion.
    fn register(&self, completion: Completion) -> Result<RequestId> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = &state.shutdown {
            return Err(e.clone());
        }
        let id = RequestId::from_seq(state.next_id);
        state.next_id += 1;
        match state.pending.entry(id.clone()) {
            hash_map::Entry::Occupied(_) => Err(Error::DuplicateRequestId(id)),
            hash_map::Entry::Vacant(e) => {
                e.insert(completion);
                Ok(id)
            }
        }
    }

    /// Completes the pending call registered under `response.id`, if any.
    ///
    /// The entry is removed before the completion fires, which makes
    /// completion exactly-once: a duplicate response finds no entry and is
    /// dropped here. The completion itself runs outside the lock.
    fn resolve(&self, response: Response) {
        let completion = self.state.lock().unwrap().pending.remove(&response.id);
        match completion {
            Some(completion) => completion.complete(Ok(response)),
            None => warn!(id = %response.id, "dropping response with no matching call"),
        }
    }

    /// Removes a registration whose request never made it onto the wire, or
    /// whose caller gave up waiting. No completion fires.
    fn rollback(&self, id: &RequestId) {
        self.state.lock().unwrap().pending.remove(id);
    }

    /// Fails every in-flight call and refuses new ones.
    ///
    /// The first teardown wins; operations after it observe the original
    /// error.
    fn shutdown(&self, error: Error) {
        let drained: Vec<Completion> = {
            let mut state = self.state.lock().unwrap();
            if state.shutdown.is_some() {
                return;
            }
            state.shutdown = Some(error.clone());
            state.pending.drain().map(|(_, completion)| completion).collect()
        };
        for completion in drained {
            completion.complete(Err(error.clone()));
        }
    }

    fn shutdown_error(&self) -> Option<Error> {
        self.state.lock().unwrap().shutdown.clone()
    }

    async fn send_message(&self, message: &RawMessage) -> Result<()> {
        if let Some(e) = self.shutdown_error() {
            return Err(e);
        }
        let text = message.encode()?;
        self.writer.lock().await.send(&text).await
    }

    async fn wait_response(
        &self,
        id: RequestId,
        rx: oneshot::Receiver<Result<Response>>,
    ) -> Result<Response> {
        let received = match self.options.call_timeout {
            Some(limit) => match time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.rollback(&id);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };
        // The sender only disappears without firing on a teardown race.
        received.unwrap_or(Err(Error::Shutdown))
    }
}

impl Drop for RawClient {
    fn drop(&mut self) {
        // The dispatch loop holds only a weak reference; stop it explicitly
        // so an idle transport does not keep the task parked forever.
        if let Ok(state) = self.state.get_mut() {
            if let Some(task) = state.read_task.take() {
                task.abort();
            }
        }
    }
}

/// Bridges inbound transport text to pending-call resolution.
struct Dispatcher {
    client: Weak<RawClient>,
}

impl Dispatcher {
    async fn run(client: Weak<RawClient>, mut reader: BoxTransportRead) {
        let dispatcher = Self { client };
        let end = dispatcher.read_all(&mut reader).await;
        if let Some(client) = dispatcher.client.upgrade() {
            client.shutdown(match end {
                Ok(()) => Error::Shutdown,
                Err(e) => e,
            });
        }
    }

    async fn read_all(&self, reader: &mut BoxTransportRead) -> Result<()> {
        while let Some(text) = reader.receive().await? {
            let Some(client) = self.client.upgrade() else {
                return Ok(());
            };
            self.dispatch(&client, &text);
        }
        Ok(())
    }

    /// Inbound anomalies cannot be attributed to any caller, so they stop
    /// here: decode failures and non-response traffic are logged and dropped.
    fn dispatch(&self, client: &RawClient, text: &str) {
        match message::decode_response(text) {
            Ok(response) => {
                if let Outcome::Error(error) = &response.outcome {
                    warn!(
                        id = %response.id,
                        code = error.code,
                        "call returned error: {}",
                        error.message
                    );
                }
                client.resolve(response);
            }
            Err(e) => warn!("dropping inbound text that is not a response: {e}"),
        }
    }
}

/// Asynchronous JSON-RPC 2.0 client over a duplex text transport.
///
/// Cheap to clone; clones share one transport and one set of in-flight
/// calls.
#[derive(Clone)]
pub struct Client(Arc<RawClient>);

impl Client {
    /// Starts a client over an already established transport pair.
    ///
    /// The dispatch loop is spawned onto the current tokio runtime, so this
    /// must be called from within one.
    pub fn new(
        reader: impl TransportRead + Send + 'static,
        writer: impl TransportWrite + Send + 'static,
        options: &ClientOptions,
    ) -> Self {
        let raw = Arc::new(RawClient {
            state: Mutex::new(ClientState::new()),
            writer: tokio::sync::Mutex::new(writer.boxed()),
            options: options.clone(),
        });
        let task = spawn(Dispatcher::run(Arc::downgrade(&raw), reader.boxed()));
        raw.state.lock().unwrap().read_task = Some(task);
        Self(raw)
    }

    /// Sends a notification: fire and forget, no id, no response.
    pub async fn notify<P>(&self, method: &str, params: Option<&P>) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        let params = Params::from_serialize(params)?;
        self.0
            .send_message(&RawMessage::notification(method, params))
            .await
    }

    /// Sends a request and waits for the matching response.
    ///
    /// The returned [`Response`] may carry either a result or an error
    /// object; both are ordinary outcomes. `Err` is produced only by the
    /// outbound path itself (serialization, transport, shutdown, timeout),
    /// and a send failure rolls the registration back before surfacing.
    pub async fn call<P>(&self, method: &str, params: Option<&P>) -> Result<Response>
    where
        P: Serialize + ?Sized,
    {
        let params = Params::from_serialize(params)?;
        let (tx, rx) = oneshot::channel();
        let id = self.0.register(Completion::Channel(tx))?;
        let message = RawMessage::request(id.clone(), method, params);
        if let Err(e) = self.0.send_message(&message).await {
            self.0.rollback(&id);
            return Err(e);
        }
        self.0.wait_response(id, rx).await
    }

    /// Sends a request and returns once it is on the wire; `on_response`
    /// fires later, on the dispatch task, when the matching response
    /// arrives.
    ///
    /// Keep the callback short: while it runs, no other response is
    /// dispatched. If the client shuts down with the call in flight, the
    /// callback receives the teardown error instead of never firing.
    pub async fn call_with<P, F>(
        &self,
        method: &str,
        params: Option<&P>,
        on_response: F,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let params = Params::from_serialize(params)?;
        let id = self.0.register(Completion::Callback(Box::new(on_response)))?;
        let message = RawMessage::request(id.clone(), method, params);
        if let Err(e) = self.0.send_message(&message).await {
            self.0.rollback(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Tears the client down: stops dispatch and fails every in-flight call
    /// with [`Error::Shutdown`] instead of leaving it waiting.
    ///
    /// Idempotent. Later operations on any clone fail immediately.
    pub fn close(&self) {
        let task = self.0.state.lock().unwrap().read_task.take();
        if let Some(task) = task {
            task.abort();
        }
        self.0.shutdown(Error::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.0.state.lock().unwrap().shutdown.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use serde_json::Value;

    use super::*;

    fn raw_client() -> RawClient {
        let (near, _far) = tokio::io::duplex(64);
        let (_r, w) = tokio::io::split(near);
        RawClient {
            state: Mutex::new(ClientState::new()),
            writer: tokio::sync::Mutex::new(w.boxed()),
            options: ClientOptions::default(),
        }
    }

    #[test]
    fn register_assigns_distinct_ids() {
        let client = raw_client();
        let mut ids = HashSet::new();
        for _ in 0..32 {
            let (tx, _rx) = oneshot::channel();
            let id = client.register(Completion::Channel(tx)).unwrap();
            assert!(ids.insert(id));
        }
        assert_eq!(client.state.lock().unwrap().pending.len(), 32);
    }

    #[test]
    fn resolve_fires_each_completion_exactly_once() {
        let client = raw_client();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let id = client
            .register(Completion::Callback(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();
        let response = Response {
            id: id.clone(),
            outcome: Outcome::Success(Value::Null),
        };
        client.resolve(response.clone());
        client.resolve(response);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_without_registration_is_a_no_op() {
        let client = raw_client();
        let (tx, _rx) = oneshot::channel();
        client.register(Completion::Channel(tx)).unwrap();
        client.resolve(Response {
            id: RequestId::from("no-such-id"),
            outcome: Outcome::Success(Value::Null),
        });
        assert_eq!(client.state.lock().unwrap().pending.len(), 1);
    }

    #[test]
    fn rollback_removes_the_registration() {
        let client = raw_client();
        let (tx, _rx) = oneshot::channel();
        let id = client.register(Completion::Channel(tx)).unwrap();
        client.rollback(&id);
        assert!(client.state.lock().unwrap().pending.is_empty());
    }

    #[test]
    fn shutdown_fails_pending_and_rejects_new_registrations() {
        let client = raw_client();
        let (tx, mut rx) = oneshot::channel();
        client.register(Completion::Channel(tx)).unwrap();
        client.shutdown(Error::Shutdown);
        assert!(matches!(rx.try_recv(), Ok(Err(Error::Shutdown))));
        let (tx, _rx) = oneshot::channel();
        assert!(matches!(
            client.register(Completion::Channel(tx)),
            Err(Error::Shutdown)
        ));
    }
}
