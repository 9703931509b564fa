//! An in-memory [`Transport`] recording everything the portal client does.

use std::{
    any::Any,
    collections::{HashMap, HashSet, VecDeque},
    fmt::{self, Debug},
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{Stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use zbus::{
    zvariant::{DynamicType, OwnedObjectPath, Type, Value},
    Message,
};

use super::{SignalStream, Transport, REQUEST_INTERFACE};
use crate::{Error, Result};

enum Reply {
    Value(Box<dyn Any + Send>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub interface: &'static str,
    pub method: &'static str,
    pub body: String,
}

#[derive(Default)]
struct State {
    versions: HashMap<&'static str, u32>,
    version_calls: usize,
    calls: Vec<RecordedCall>,
    replies: VecDeque<Reply>,
    subscriptions: Vec<String>,
    senders: HashMap<(String, &'static str), Vec<UnboundedSender<zbus::Result<Message>>>>,
    failing_subscriptions: HashSet<String>,
    closed: Vec<String>,
    fail_close: bool,
    disconnects: usize,
}

pub(crate) struct MockTransport {
    unique_name: Option<String>,
    state: Mutex<State>,
    unsubscriptions: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::with_unique_name(Some(":1.234"))
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("unique_name", &self.unique_name)
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn with_unique_name(unique_name: Option<&str>) -> Self {
        Self {
            unique_name: unique_name.map(ToOwned::to_owned),
            state: Mutex::default(),
            unsubscriptions: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_version(&self, interface: &'static str, version: u32) {
        self.state().versions.insert(interface, version);
    }

    pub fn push_reply<R: Any + Send>(&self, reply: R) {
        self.state().replies.push_back(Reply::Value(Box::new(reply)));
    }

    pub fn push_request_path(&self, path: &str) {
        self.push_reply(OwnedObjectPath::try_from(path).unwrap());
    }

    pub fn push_error(&self, message: &str) {
        self.state().replies.push_back(Reply::Error(message.to_owned()));
    }

    pub fn fail_subscriptions_at(&self, path: &str) {
        self.state().failing_subscriptions.insert(path.to_owned());
    }

    pub fn fail_close(&self) {
        self.state().fail_close = true;
    }

    pub fn version_calls(&self) -> usize {
        self.state().version_calls
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state().subscriptions.clone()
    }

    pub fn unsubscriptions(&self) -> usize {
        self.unsubscriptions.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> Vec<String> {
        self.state().closed.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state().disconnects
    }

    /// Deliver a signal to every live subscription at `path`.
    pub fn emit<B>(&self, path: &str, interface: &'static str, member: &'static str, body: &B)
    where
        B: Serialize + DynamicType,
    {
        let message = Message::signal(path, interface, member)
            .unwrap()
            .build(body)
            .unwrap();
        let state = self.state();
        if let Some(senders) = state.senders.get(&(path.to_owned(), member)) {
            for sender in senders {
                let _ = sender.unbounded_send(Ok(message.clone()));
            }
        }
    }

    /// Deliver a stream error to every live `member` subscription at `path`.
    pub fn fail_signal(&self, path: &str, member: &'static str) {
        let state = self.state();
        if let Some(senders) = state.senders.get(&(path.to_owned(), member)) {
            for sender in senders {
                let _ = sender.unbounded_send(Err(zbus::Error::Failure(
                    "connection reset".to_owned(),
                )));
            }
        }
    }

    /// End every live `member` subscription at `path`.
    pub fn end_signal(&self, path: &str, member: &'static str) {
        self.state().senders.remove(&(path.to_owned(), member));
    }

    /// Deliver a `Response` signal to the request at `path`.
    pub fn respond(&self, path: &str, status: u32, results: HashMap<&str, Value<'_>>) {
        self.emit(path, REQUEST_INTERFACE, "Response", &(status, results));
    }

    /// Wait for a subscription at `path`, then deliver a `Response` signal
    /// to it.
    pub async fn respond_once_subscribed(
        &self,
        path: &str,
        status: u32,
        results: HashMap<&str, Value<'_>>,
    ) {
        while !self.subscriptions().iter().any(|subscribed| subscribed == path) {
            tokio::task::yield_now().await;
        }
        self.respond(path, status, results);
    }
}

struct TrackedStream {
    receiver: UnboundedReceiver<zbus::Result<Message>>,
    unsubscriptions: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = zbus::Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.unsubscriptions.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn unique_name(&self) -> Option<String> {
        self.unique_name.clone()
    }

    async fn version(&self, interface: &'static str) -> Result<u32> {
        let version = {
            let mut state = self.state();
            state.version_calls += 1;
            state.versions.get(interface).copied()
        };
        // Let concurrent callers interleave.
        tokio::task::yield_now().await;
        version.ok_or_else(|| Error::TransportFault(format!("{interface} is not exported")))
    }

    async fn call<R, B>(&self, interface: &'static str, method: &'static str, body: &B) -> Result<R>
    where
        R: DeserializeOwned + Type + Send + 'static,
        B: Serialize + DynamicType + Debug + Sync,
    {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            interface,
            method,
            body: format!("{body:?}"),
        });
        match state.replies.pop_front() {
            Some(Reply::Value(value)) => value
                .downcast::<R>()
                .map(|reply| *reply)
                .map_err(|_| Error::TransportFault(format!("unexpected reply type for {method}"))),
            Some(Reply::Error(message)) => Err(Error::TransportFault(message)),
            None => Err(Error::TransportFault(format!("no reply queued for {method}"))),
        }
    }

    async fn receive_signal(
        &self,
        path: &OwnedObjectPath,
        _interface: &'static str,
        member: &'static str,
    ) -> Result<SignalStream> {
        let mut state = self.state();
        if state.failing_subscriptions.contains(path.as_str()) {
            return Err(Error::TransportFault(format!(
                "cannot subscribe at {}",
                path.as_str()
            )));
        }
        state.subscriptions.push(path.as_str().to_owned());
        let (sender, receiver) = unbounded();
        state
            .senders
            .entry((path.as_str().to_owned(), member))
            .or_default()
            .push(sender);
        Ok(Box::pin(TrackedStream {
            receiver,
            unsubscriptions: self.unsubscriptions.clone(),
        }))
    }

    async fn close_request(&self, path: &OwnedObjectPath) -> Result<()> {
        let mut state = self.state();
        state.closed.push(path.as_str().to_owned());
        if state.fail_close {
            return Err(Error::TransportFault("close failed".to_owned()));
        }
        Ok(())
    }

    fn close_request_detached(&self, path: OwnedObjectPath) {
        self.state().closed.push(path.as_str().to_owned());
    }

    async fn disconnect(&self) -> Result<()> {
        self.state().disconnects += 1;
        Ok(())
    }
}
