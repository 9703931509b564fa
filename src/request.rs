//! The lifecycle of a single portal request.
//!
//! Portal methods that need user interaction return the object path of an
//! `org.freedesktop.portal.Request` right away and deliver the outcome later
//! through its `Response` signal. A [`Request`] subscribes to that signal
//! before the method is called, follows the path the portal actually returned,
//! waits for the outcome or a cancellation, and finally tears everything down.
//!
//! The outcome is written once. Every later call to [`Request::response`]
//! returns the same value without touching the bus again.

use std::{collections::HashMap, fmt, sync::Arc};

use futures_util::{
    future::{select, Either},
    pin_mut, StreamExt,
};
use serde::de::DeserializeOwned;
use serde_repr::{Deserialize_repr, Serialize_repr};
use zbus::{
    zvariant::{OwnedObjectPath, OwnedValue, Type},
    Message,
};

use crate::{
    cancellation::{CancellationRegistration, CancellationToken},
    transport::{SignalStream, Transport, REQUEST_INTERFACE},
    DBusTransport, Error, HandleToken, Result,
};

/// The status code carried by the `Response` signal.
#[derive(Serialize_repr, Deserialize_repr, PartialEq, Eq, Debug, Clone, Copy, Type)]
#[repr(u32)]
pub enum ResponseStatus {
    /// Success, the request is carried out.
    Success = 0,
    /// The user cancelled the interaction.
    UserCancelled = 1,
    /// The user interaction was ended in some other way.
    Aborted = 2,
}

impl TryFrom<u32> for ResponseStatus {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::UserCancelled),
            2 => Ok(Self::Aborted),
            other => Err(Error::Decode(format!("unknown response status {other}"))),
        }
    }
}

/// The outcome of a portal request.
///
/// The results are only available when the status is
/// [`ResponseStatus::Success`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T = ()> {
    status: ResponseStatus,
    results: Option<T>,
}

impl<T> Response<T> {
    pub(crate) fn new(status: ResponseStatus, results: Option<T>) -> Self {
        Self { status, results }
    }

    /// The status the portal answered with.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Whether the request was carried out.
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// The results, if the request succeeded.
    pub fn results(&self) -> Option<&T> {
        self.results.as_ref()
    }

    /// Consume the response, returning the results if the request succeeded.
    pub fn into_results(self) -> Option<T> {
        self.results
    }

    /// Map the results, keeping the status.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            status: self.status,
            results: self.results.map(f),
        }
    }
}

/// Turns the body of a successful `Response` signal into typed results.
pub type Decoder<T> = Box<dyn Fn(&Message) -> Result<T> + Send + Sync>;

/// A decoder deserializing the `a{sv}` results straight into `R`.
pub fn results_decoder<R>() -> Decoder<R>
where
    R: DeserializeOwned + Type + 'static,
{
    Box::new(|message: &Message| decode_results::<R>(message))
}

/// A decoder for requests whose results carry nothing of interest.
pub fn empty_decoder() -> Decoder<()> {
    Box::new(|_: &Message| Ok(()))
}

pub(crate) fn decode_results<R>(message: &Message) -> Result<R>
where
    R: DeserializeOwned + Type,
{
    let (_, results) = message
        .body()
        .deserialize::<(u32, R)>()
        .map_err(|err| Error::Decode(err.to_string()))?;
    Ok(results)
}

#[derive(Debug, Clone)]
enum Outcome<T> {
    Responded(Response<T>),
    Cancelled,
    Faulted(String),
    Undecodable(String),
}

impl<T> Outcome<T> {
    fn into_result(self) -> Result<Response<T>> {
        match self {
            Self::Responded(response) => Ok(response),
            Self::Cancelled => Err(Error::Cancelled),
            Self::Faulted(reason) => Err(Error::TransportFault(reason)),
            Self::Undecodable(reason) => Err(Error::Decode(reason)),
        }
    }
}

/// A single in-flight portal request.
///
/// Created by [`ConnectionManager::create_request`] already subscribed to the
/// `Response` signal at the predicted path. Call [`Request::update`] with the
/// path the portal method returned before awaiting [`Request::response`], and
/// always finish with [`Request::dispose`].
///
/// [`ConnectionManager::create_request`]: crate::ConnectionManager::create_request
#[doc(alias = "org.freedesktop.portal.Request")]
pub struct Request<T, C: Transport = DBusTransport> {
    transport: Arc<C>,
    handle_token: HandleToken,
    path: OwnedObjectPath,
    subscription: Option<SignalStream>,
    cancellation: CancellationToken,
    registrations: Vec<CancellationRegistration>,
    decoder: Decoder<T>,
    outcome: Option<Outcome<T>>,
    delivered: bool,
    disposed: bool,
}

impl<T, C: Transport> Request<T, C> {
    pub(crate) async fn create(
        transport: Arc<C>,
        handle_token: HandleToken,
        path: OwnedObjectPath,
        decoder: Decoder<T>,
        scope: &CancellationToken,
        caller: Option<&CancellationToken>,
    ) -> Result<Self> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Creating request at {}", path.as_str());
        let subscription = transport
            .receive_signal(&path, REQUEST_INTERFACE, "Response")
            .await?;

        let cancellation = CancellationToken::new();
        let registrations = std::iter::once(scope)
            .chain(caller)
            .map(|token| {
                let linked = cancellation.clone();
                token.register(move || linked.cancel())
            })
            .collect();

        Ok(Self {
            transport,
            handle_token,
            path,
            subscription: Some(subscription),
            cancellation,
            registrations,
            decoder,
            outcome: None,
            delivered: false,
            disposed: false,
        })
    }

    /// The object path the request currently listens on.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// The handle token the request path was predicted from.
    pub fn handle_token(&self) -> &HandleToken {
        &self.handle_token
    }

    /// Whether [`Request::dispose`] already ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Follow the object path returned by the portal method.
    ///
    /// Nothing happens if it matches the current path. Otherwise the old
    /// subscription is dropped and a new one is created at `actual`. If that
    /// fails the request completes with [`Error::TransportFault`].
    pub async fn update(&mut self, actual: OwnedObjectPath) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed("request"));
        }
        if actual == self.path {
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Request path changed from {} to {}",
            self.path.as_str(),
            actual.as_str()
        );
        self.subscription.take();
        self.path = actual;
        match self
            .transport
            .receive_signal(&self.path, REQUEST_INTERFACE, "Response")
            .await
        {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to resubscribe at {}: {}", self.path.as_str(), err);
                self.complete(Outcome::Faulted(format!(
                    "failed to subscribe at {}: {err}",
                    self.path.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Wait for the outcome of the request.
    ///
    /// Non-success statuses are returned as a [`Response`] without results.
    /// Cancellation, transport failures and undecodable results are errors.
    /// Once known, the outcome is cached and returned by every later call.
    pub async fn response(&mut self) -> Result<Response<T>>
    where
        T: Clone,
    {
        if self.disposed {
            return Err(Error::Disposed("request"));
        }
        if self.outcome.is_none() {
            let outcome = self.wait().await;
            self.complete(outcome);
        }
        match &self.outcome {
            Some(outcome) => outcome.clone().into_result(),
            None => Err(Error::TransportFault("the request has no outcome".to_owned())),
        }
    }

    async fn wait(&mut self) -> Outcome<T> {
        if self.cancellation.is_cancelled() {
            return Outcome::Cancelled;
        }
        let event = {
            let Some(subscription) = self.subscription.as_mut() else {
                return Outcome::Faulted("no active subscription".to_owned());
            };
            let next = subscription.next();
            let cancelled = self.cancellation.cancelled();
            pin_mut!(cancelled);
            match select(next, cancelled).await {
                Either::Left((item, _)) => Some(item),
                Either::Right(((), _)) => None,
            }
        };

        match event {
            None => {
                #[cfg(feature = "tracing")]
                tracing::info!("Request {} was cancelled", self.path.as_str());
                Outcome::Cancelled
            }
            Some(Some(Ok(message))) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Received signal 'Response' on '{}'", self.path.as_str());
                self.delivered = true;
                self.decode(&message)
            }
            Some(Some(Err(err))) => Outcome::Faulted(err.to_string()),
            Some(None) => Outcome::Faulted("the Response signal stream ended".to_owned()),
        }
    }

    fn decode(&self, message: &Message) -> Outcome<T> {
        let status = match message
            .body()
            .deserialize::<(u32, HashMap<String, OwnedValue>)>()
        {
            Ok((status, _)) => status,
            Err(err) => return Outcome::Faulted(format!("malformed Response signal: {err}")),
        };
        match ResponseStatus::try_from(status) {
            Ok(ResponseStatus::Success) => match (self.decoder)(message) {
                Ok(results) => {
                    Outcome::Responded(Response::new(ResponseStatus::Success, Some(results)))
                }
                Err(Error::Decode(reason)) => Outcome::Undecodable(reason),
                Err(err) => Outcome::Undecodable(err.to_string()),
            },
            Ok(status) => Outcome::Responded(Response::new(status, None)),
            Err(_) => Outcome::Undecodable(format!("unknown response status {status}")),
        }
    }

    fn complete(&mut self, outcome: Outcome<T>) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    /// Tear the request down.
    ///
    /// Drops the signal subscription, then the cancellation registrations,
    /// then closes the remote request object unless the portal already
    /// answered. Failures are logged and ignored. Calling it again does
    /// nothing.
    ///
    /// Dropping a request that was never disposed does the same, with the
    /// close sent in the background.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.subscription.take();
        self.registrations.clear();
        if !self.delivered {
            self.complete(Outcome::Cancelled);
            if let Err(_err) = self.transport.close_request(&self.path).await {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to close request {}: {}", self.path.as_str(), _err);
            }
        }
        self.disposed = true;
    }
}

impl<T, C: Transport> Drop for Request<T, C> {
    fn drop(&mut self) {
        if !self.disposed {
            #[cfg(feature = "tracing")]
            tracing::debug!("Request {} dropped without dispose", self.path.as_str());
            self.subscription.take();
            self.registrations.clear();
            if !self.delivered {
                self.transport.close_request_detached(self.path.clone());
            }
        }
    }
}

impl<T, C: Transport> fmt::Debug for Request<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("handle_token", &self.handle_token)
            .field("path", &self.path.as_str())
            .field("completed", &self.outcome.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use zbus::{
        zvariant::{OwnedObjectPath, Value},
        Message,
    };

    use super::{empty_decoder, Request, Response, ResponseStatus};
    use crate::{
        cancellation::CancellationToken,
        transport::{mock::MockTransport, REQUEST_INTERFACE},
        Error, HandleToken,
    };

    const PREDICTED: &str = "/org/freedesktop/portal/desktop/request/1_234/t1";
    const ACTUAL: &str = "/org/freedesktop/portal/desktop/request/1_234/other";

    async fn request(
        transport: &Arc<MockTransport>,
        scope: &CancellationToken,
        caller: Option<&CancellationToken>,
    ) -> Request<(), MockTransport> {
        Request::create(
            transport.clone(),
            HandleToken::try_from("t1").unwrap(),
            OwnedObjectPath::try_from(PREDICTED).unwrap(),
            empty_decoder(),
            scope,
            caller,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn update_with_same_path_keeps_subscription() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        request
            .update(OwnedObjectPath::try_from(PREDICTED).unwrap())
            .await
            .unwrap();

        assert_eq!(transport.subscriptions(), vec![PREDICTED.to_owned()]);
        assert_eq!(transport.unsubscriptions(), 0);
        request.dispose().await;
    }

    #[tokio::test]
    async fn update_with_new_path_resubscribes_once() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        request
            .update(OwnedObjectPath::try_from(ACTUAL).unwrap())
            .await
            .unwrap();
        assert_eq!(request.path().as_str(), ACTUAL);
        assert_eq!(transport.unsubscriptions(), 1);
        assert_eq!(
            transport.subscriptions(),
            vec![PREDICTED.to_owned(), ACTUAL.to_owned()]
        );

        transport.respond(ACTUAL, 0, HashMap::new());
        let response = request.response().await.unwrap();
        assert_eq!(response.status(), ResponseStatus::Success);

        request.dispose().await;
        assert_eq!(transport.unsubscriptions(), 2);
        assert!(transport.closed().is_empty());
    }

    #[tokio::test]
    async fn failed_resubscription_faults_the_request() {
        let transport = Arc::new(MockTransport::default());
        transport.fail_subscriptions_at(ACTUAL);
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        request
            .update(OwnedObjectPath::try_from(ACTUAL).unwrap())
            .await
            .unwrap();
        assert!(matches!(
            request.response().await,
            Err(Error::TransportFault(_))
        ));
        request.dispose().await;
    }

    #[tokio::test]
    async fn response_is_cached() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.respond(PREDICTED, 1, HashMap::new());
        // A second signal must not replace the first outcome.
        transport.respond(PREDICTED, 0, HashMap::new());

        let first = request.response().await.unwrap();
        let second = request.response().await.unwrap();
        assert_eq!(first, Response::new(ResponseStatus::UserCancelled, None));
        assert_eq!(first, second);
        assert_eq!(transport.subscriptions().len(), 1);
        request.dispose().await;
    }

    #[tokio::test]
    async fn aborted_has_no_results() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        let mut results = HashMap::new();
        results.insert("ignored", Value::from(true));
        transport.respond(PREDICTED, 2, results);

        let response = request.response().await.unwrap();
        assert_eq!(response.status(), ResponseStatus::Aborted);
        assert!(response.results().is_none());
        request.dispose().await;
    }

    #[tokio::test]
    async fn unknown_status_is_a_decode_error() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.respond(PREDICTED, 7, HashMap::new());
        assert!(matches!(request.response().await, Err(Error::Decode(_))));
        request.dispose().await;
        assert!(transport.closed().is_empty());
    }

    #[tokio::test]
    async fn decoder_failure_is_a_decode_error() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = Request::<u32, _>::create(
            transport.clone(),
            HandleToken::try_from("t1").unwrap(),
            OwnedObjectPath::try_from(PREDICTED).unwrap(),
            Box::new(|_: &Message| Err(Error::Decode("missing key".to_owned()))),
            &scope,
            None,
        )
        .await
        .unwrap();

        transport.respond(PREDICTED, 0, HashMap::new());
        assert!(matches!(request.response().await, Err(Error::Decode(_))));
        request.dispose().await;
    }

    #[tokio::test]
    async fn caller_cancellation_before_signal() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let caller = CancellationToken::new();
        let mut request = request(&transport, &scope, Some(&caller)).await;

        caller.cancel();
        assert!(matches!(request.response().await, Err(Error::Cancelled)));
        // A late signal does not change the outcome.
        transport.respond(PREDICTED, 0, HashMap::new());
        assert!(matches!(request.response().await, Err(Error::Cancelled)));

        request.dispose().await;
        assert_eq!(transport.closed(), vec![PREDICTED.to_owned()]);
    }

    #[tokio::test]
    async fn scope_cancellation_wakes_pending_response() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });
        assert!(matches!(request.response().await, Err(Error::Cancelled)));
        request.dispose().await;
    }

    #[tokio::test]
    async fn dispose_after_success_does_not_close() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.respond(PREDICTED, 0, HashMap::new());
        request.response().await.unwrap();
        request.dispose().await;
        request.dispose().await;

        assert!(transport.closed().is_empty());
        assert_eq!(transport.unsubscriptions(), 1);
        assert!(request.is_disposed());
    }

    #[tokio::test]
    async fn dispose_while_pending_closes() {
        let transport = Arc::new(MockTransport::default());
        transport.fail_close();
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        request.dispose().await;
        request.dispose().await;

        assert_eq!(transport.closed(), vec![PREDICTED.to_owned()]);
        assert!(matches!(
            request.response().await,
            Err(Error::Disposed("request"))
        ));
        assert!(matches!(
            request
                .update(OwnedObjectPath::try_from(ACTUAL).unwrap())
                .await,
            Err(Error::Disposed(_))
        ));
    }

    #[tokio::test]
    async fn dispose_unregisters_from_caller_token() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let caller = CancellationToken::new();
        let mut request = request(&transport, &scope, Some(&caller)).await;
        transport.respond(PREDICTED, 0, HashMap::new());
        request.response().await.unwrap();
        request.dispose().await;

        caller.cancel();
        scope.cancel();
        assert!(request.response().await.is_err());
        assert!(transport.closed().is_empty());
    }

    #[tokio::test]
    async fn malformed_response_is_a_transport_fault() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.emit(PREDICTED, REQUEST_INTERFACE, "Response", &("bogus",));
        assert!(matches!(
            request.response().await,
            Err(Error::TransportFault(_))
        ));
        request.dispose().await;
    }

    #[tokio::test]
    async fn signal_stream_error_is_a_transport_fault() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.fail_signal(PREDICTED, "Response");
        assert!(matches!(
            request.response().await,
            Err(Error::TransportFault(_))
        ));
        request.dispose().await;
        assert_eq!(transport.closed(), vec![PREDICTED.to_owned()]);
    }

    #[tokio::test]
    async fn ended_signal_stream_is_a_transport_fault() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.end_signal(PREDICTED, "Response");
        assert!(matches!(
            request.response().await,
            Err(Error::TransportFault(_))
        ));
        request.dispose().await;
    }

    #[tokio::test]
    async fn dropping_a_pending_request_closes_it() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let request = request(&transport, &scope, None).await;

        drop(request);
        assert_eq!(transport.unsubscriptions(), 1);
        assert_eq!(transport.closed(), vec![PREDICTED.to_owned()]);
    }

    #[tokio::test]
    async fn dropping_an_answered_request_does_not_close() {
        let transport = Arc::new(MockTransport::default());
        let scope = CancellationToken::new();
        let mut request = request(&transport, &scope, None).await;

        transport.respond(PREDICTED, 0, HashMap::new());
        request.response().await.unwrap();
        drop(request);
        assert!(transport.closed().is_empty());
    }

    #[test]
    fn response_status_values() {
        assert_eq!(ResponseStatus::try_from(0).unwrap(), ResponseStatus::Success);
        assert_eq!(
            ResponseStatus::try_from(1).unwrap(),
            ResponseStatus::UserCancelled
        );
        assert_eq!(ResponseStatus::try_from(2).unwrap(), ResponseStatus::Aborted);
        assert!(ResponseStatus::try_from(3).is_err());
        assert_eq!(
            serde_json::to_string(&ResponseStatus::UserCancelled).unwrap(),
            "1"
        );
    }

    #[test]
    fn response_map_keeps_status() {
        let response = Response::new(ResponseStatus::Success, Some(2)).map(|v| v * 2);
        assert_eq!(response.status(), ResponseStatus::Success);
        assert_eq!(response.into_results(), Some(4));
    }
}
