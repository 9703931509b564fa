//! The connection manager: one bus connection shared by every portal and
//! request created from it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use linux_desktop_utils::{ConnectionManager, WindowIdentifier};
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .window_identifier(WindowIdentifier::from_xid(0x2a00004))
//!         .build()
//!         .await?;
//!
//!     let trash = manager.trash().await?;
//!     println!("Trash portal version {}", trash.version());
//!
//!     manager.dispose().await;
//!     Ok(())
//! }
//! ```

use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_lock::Mutex;
use zbus::zvariant::OwnedObjectPath;

use crate::{
    cancellation::CancellationToken,
    desktop::{
        account::Account, file_chooser::FileChooser, network_monitor::NetworkMonitor,
        open_uri::OpenUri, screenshot::Screenshot, secret::Secret, trash::Trash,
    },
    request::{Decoder, Request, Response},
    transport::{DBusTransport, Transport, DESKTOP_PATH},
    Error, HandleToken, Result, Sealed, WindowIdentifier,
};

/// Turn a bus unique name such as `:1.42` into the sender element of a request
/// path, `1_42`.
pub(crate) fn sender_name(unique_name: &str) -> String {
    unique_name
        .strip_prefix(':')
        .unwrap_or(unique_name)
        .replace('.', "_")
}

/// The state a [`ConnectionManager`] shares with the portals it hands out.
pub struct PortalConnection<C: Transport> {
    transport: Arc<C>,
    sender_name: String,
    default_window: Option<WindowIdentifier>,
    scope: CancellationToken,
    disposed: AtomicBool,
}

impl<C: Transport> PortalConnection<C> {
    pub(crate) fn transport(&self) -> &C {
        &self.transport
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(Error::Disposed("connection manager"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn request_path(&self, handle_token: &HandleToken) -> Result<OwnedObjectPath> {
        let path = format!("{DESKTOP_PATH}/request/{}/{handle_token}", self.sender_name);
        Ok(OwnedObjectPath::try_from(path)?)
    }

    pub(crate) fn window_identifier(&self, preferred: Option<&WindowIdentifier>) -> String {
        preferred
            .or(self.default_window.as_ref())
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub(crate) async fn create_request<T>(
        &self,
        handle_token: HandleToken,
        decoder: Decoder<T>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Request<T, C>> {
        self.ensure_alive()?;
        let path = self.request_path(&handle_token)?;
        Request::create(
            self.transport.clone(),
            handle_token,
            path,
            decoder,
            &self.scope,
            cancellation,
        )
        .await
    }

    /// Run a request based portal method from start to end.
    ///
    /// `call` issues the method and returns the request path it got back. The
    /// request is disposed on every path out of this function.
    pub(crate) async fn send_request<T, F, Fut>(
        &self,
        handle_token: HandleToken,
        decoder: Decoder<T>,
        cancellation: Option<&CancellationToken>,
        call: F,
    ) -> Result<Response<T>>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<OwnedObjectPath>>,
    {
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        let mut request = self
            .create_request(handle_token, decoder, cancellation)
            .await?;
        let response = async {
            let path = call().await?;
            request.update(path).await?;
            request.response().await
        }
        .await;
        request.dispose().await;
        response
    }
}

impl<C: Transport> fmt::Debug for PortalConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConnection")
            .field("sender_name", &self.sender_name)
            .field("default_window", &self.default_window)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

/// One slot per portal type.
pub struct PortalCache<C: Transport> {
    pub(crate) account: Option<Arc<Account<C>>>,
    pub(crate) file_chooser: Option<Arc<FileChooser<C>>>,
    pub(crate) network_monitor: Option<Arc<NetworkMonitor<C>>>,
    pub(crate) open_uri: Option<Arc<OpenUri<C>>>,
    pub(crate) screenshot: Option<Arc<Screenshot<C>>>,
    pub(crate) secret: Option<Arc<Secret<C>>>,
    pub(crate) trash: Option<Arc<Trash<C>>>,
}

impl<C: Transport> Default for PortalCache<C> {
    fn default() -> Self {
        Self {
            account: None,
            file_chooser: None,
            network_monitor: None,
            open_uri: None,
            screenshot: None,
            secret: None,
            trash: None,
        }
    }
}

/// A portal interface that can be obtained from a [`ConnectionManager`].
///
/// This trait is sealed.
pub trait Portal<C: Transport>: Sealed + Sized + Send + Sync + 'static {
    /// The D-Bus interface name.
    const INTERFACE: &'static str;
    /// A short name used in errors.
    const NAME: &'static str;

    #[doc(hidden)]
    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self;

    #[doc(hidden)]
    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>>;
}

/// Owns the bus connection, the portal instances and the cancellation scope
/// of every request.
///
/// Disposing the manager cancels all outstanding requests and closes the
/// connection.
pub struct ConnectionManager<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    cache: Mutex<PortalCache<C>>,
}

impl ConnectionManager<DBusTransport> {
    /// Creates a new builder-pattern struct instance to construct a
    /// [`ConnectionManager`].
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::default()
    }

    /// Connect to the bus at `address`, or the session bus.
    ///
    /// `window_identifier` is used by every request that does not specify
    /// its own.
    pub async fn connect(
        window_identifier: Option<WindowIdentifier>,
        address: Option<&str>,
    ) -> Result<Self> {
        Self::builder()
            .window_identifier(window_identifier)
            .address(address)
            .build()
            .await
    }
}

impl<C: Transport> ConnectionManager<C> {
    /// Create a manager on top of an already connected transport.
    pub fn with_transport(
        transport: C,
        window_identifier: Option<WindowIdentifier>,
    ) -> Result<Self> {
        let unique_name = transport.unique_name().ok_or_else(|| {
            Error::Connection(zbus::Error::Failure(
                "the connection has no unique name".to_owned(),
            ))
        })?;
        let sender_name = sender_name(&unique_name);
        #[cfg(feature = "tracing")]
        tracing::debug!("Connected as {} (sender {})", unique_name, sender_name);
        Ok(Self {
            connection: Arc::new(PortalConnection {
                transport: Arc::new(transport),
                sender_name,
                default_window: window_identifier,
                scope: CancellationToken::new(),
                disposed: AtomicBool::new(false),
            }),
            cache: Mutex::new(PortalCache::default()),
        })
    }

    /// The sender element of request paths created by this connection.
    pub fn sender_name(&self) -> &str {
        &self.connection.sender_name
    }

    /// The transport the manager talks through.
    pub fn transport(&self) -> &C {
        self.connection.transport()
    }

    /// The object path the portal will use for a request made with
    /// `handle_token`.
    pub fn request_path(&self, handle_token: &HandleToken) -> Result<OwnedObjectPath> {
        self.connection.request_path(handle_token)
    }

    /// The window identifier to send: `preferred`, else the default one, else
    /// an empty string.
    pub fn window_identifier(&self, preferred: Option<&WindowIdentifier>) -> String {
        self.connection.window_identifier(preferred)
    }

    /// Get the portal `P`, creating it on first use.
    ///
    /// Creating a portal reads its `version` property. Concurrent callers get
    /// the same instance; a failed creation is not remembered.
    pub async fn portal<P: Portal<C>>(&self) -> Result<Arc<P>> {
        self.connection.ensure_alive()?;
        let mut cache = self.cache.lock().await;
        if let Some(portal) = P::slot(&mut cache) {
            return Ok(portal.clone());
        }
        let version = self
            .connection
            .transport
            .version(P::INTERFACE)
            .await
            .map_err(|err| Error::PortalUnavailable {
                portal: P::NAME,
                source: Box::new(err),
            })?;
        #[cfg(feature = "tracing")]
        tracing::debug!("{} portal version {}", P::NAME, version);
        let portal = Arc::new(P::new(self.connection.clone(), version));
        *P::slot(&mut cache) = Some(portal.clone());
        Ok(portal)
    }

    /// Get the [`Account`] portal.
    pub async fn account(&self) -> Result<Arc<Account<C>>> {
        self.portal().await
    }

    /// Get the [`FileChooser`] portal.
    pub async fn file_chooser(&self) -> Result<Arc<FileChooser<C>>> {
        self.portal().await
    }

    /// Get the [`NetworkMonitor`] portal.
    pub async fn network_monitor(&self) -> Result<Arc<NetworkMonitor<C>>> {
        self.portal().await
    }

    /// Get the [`OpenUri`] portal.
    pub async fn open_uri(&self) -> Result<Arc<OpenUri<C>>> {
        self.portal().await
    }

    /// Get the [`Screenshot`] portal.
    pub async fn screenshot(&self) -> Result<Arc<Screenshot<C>>> {
        self.portal().await
    }

    /// Get the [`Secret`] portal.
    pub async fn secret(&self) -> Result<Arc<Secret<C>>> {
        self.portal().await
    }

    /// Get the [`Trash`] portal.
    pub async fn trash(&self) -> Result<Arc<Trash<C>>> {
        self.portal().await
    }

    /// Create a request listening at the path predicted from `handle_token`.
    ///
    /// The request is cancelled when `cancellation` or the manager's own
    /// scope is cancelled.
    pub async fn create_request<T>(
        &self,
        handle_token: HandleToken,
        decoder: Decoder<T>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Request<T, C>> {
        self.connection
            .create_request(handle_token, decoder, cancellation)
            .await
    }

    /// Whether [`ConnectionManager::dispose`] was called.
    pub fn is_disposed(&self) -> bool {
        self.connection.disposed.load(Ordering::SeqCst)
    }

    /// Cancel every outstanding request and close the connection.
    ///
    /// Teardown failures are logged and ignored. Calling it again does
    /// nothing.
    pub async fn dispose(&self) {
        if self.connection.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connection.scope.cancel();
        if let Err(_err) = self.connection.transport.disconnect().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to disconnect: {}", _err);
        }
    }
}

impl<C: Transport> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
/// A [builder-pattern] type to construct a [`ConnectionManager`].
///
/// [builder-pattern]: https://doc.rust-lang.org/1.0.0/style/ownership/builders.html
pub struct ConnectionManagerBuilder {
    window_identifier: Option<WindowIdentifier>,
    address: Option<String>,
}

impl ConnectionManagerBuilder {
    #[must_use]
    /// Sets the window identifier used when a request does not provide one.
    pub fn window_identifier(mut self, identifier: impl Into<Option<WindowIdentifier>>) -> Self {
        self.window_identifier = identifier.into();
        self
    }

    #[must_use]
    /// Sets the bus address to connect to instead of the session bus.
    pub fn address<'a>(mut self, address: impl Into<Option<&'a str>>) -> Self {
        self.address = address.into().map(ToOwned::to_owned);
        self
    }

    /// Connect and build the [`ConnectionManager`].
    pub async fn build(self) -> Result<ConnectionManager> {
        let transport = match self.address {
            Some(address) => DBusTransport::with_address(&address).await?,
            None => DBusTransport::session().await?,
        };
        ConnectionManager::with_transport(transport, self.window_identifier)
    }
}
