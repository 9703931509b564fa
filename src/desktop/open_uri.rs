//! # Examples
//!
//! ## Open a file
//!
//! ```rust,no_run
//! use linux_desktop_utils::{
//!     desktop::open_uri::{FileTarget, OpenUriOptions},
//!     ConnectionManager,
//! };
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let target = FileTarget::from("/home/user/adwaita-day.jpg");
//!     manager
//!         .open_uri()
//!         .await?
//!         .open_file(&target, None, OpenUriOptions::default().ask(true), None)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Open a directory
//!
//! ```rust,no_run
//! use linux_desktop_utils::{desktop::open_uri::FileTarget, ConnectionManager};
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let target = FileTarget::from("/home/user/Downloads");
//!     manager
//!         .open_uri()
//!         .await?
//!         .open_directory(&target, None, None, None)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Open a URI
//!
//! ```rust,no_run
//! use linux_desktop_utils::{desktop::open_uri::OpenUriOptions, ConnectionManager};
//! use url::Url;
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let uri = Url::parse("https://flatpak.github.io/xdg-desktop-portal")?;
//!     manager
//!         .open_uri()
//!         .await?
//!         .open_uri(&uri, None, OpenUriOptions::default(), None)
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use url::Url;
use zbus::zvariant::{Fd, OwnedObjectPath, SerializeDict, Type};

use super::require_version;
use crate::{
    cancellation::CancellationToken,
    connection::{Portal, PortalCache, PortalConnection},
    request::{empty_decoder, Response},
    transport::{DBusTransport, Transport},
    Error, HandleToken, Result, Sealed, WindowIdentifier,
};

const INTERFACE: &str = "org.freedesktop.portal.OpenURI";

/// A local file or directory, given either as a path or a `file://` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileTarget {
    /// A path on the local file system.
    Path(PathBuf),
    /// A `file://` URI.
    Uri(Url),
}

impl FileTarget {
    fn to_path(&self) -> Result<PathBuf> {
        match self {
            Self::Path(path) => Ok(path.clone()),
            Self::Uri(uri) if uri.scheme() == "file" => uri
                .to_file_path()
                .map_err(|()| Error::InvalidArgument(format!("{uri} is not a local path"))),
            Self::Uri(uri) => Err(Error::InvalidArgument(format!(
                "{uri} is not a file URI, use OpenUri::open_uri instead"
            ))),
        }
    }

    fn open(&self) -> Result<File> {
        Ok(File::open(self.to_path()?)?)
    }
}

impl From<PathBuf> for FileTarget {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FileTarget {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_owned())
    }
}

impl From<&str> for FileTarget {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Url> for FileTarget {
    fn from(uri: Url) -> Self {
        Self::Uri(uri)
    }
}

/// Specified options for [`OpenUri::open_uri`] and [`OpenUri::open_file`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenUriOptions {
    writable: bool,
    ask: bool,
    activation_token: Option<String>,
}

impl OpenUriOptions {
    /// Whether to allow the chosen application to write to the file.
    ///
    /// Only takes effect for files exported in the document portal when the
    /// chosen application is sandboxed itself.
    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Whether to always ask the user which application to use.
    #[must_use]
    pub fn ask(mut self, ask: bool) -> Self {
        self.ask = ask;
        self
    }

    /// Sets the token used to activate the chosen application.
    #[must_use]
    pub fn activation_token<'a>(mut self, activation_token: impl Into<Option<&'a str>>) -> Self {
        self.activation_token = activation_token.into().map(ToOwned::to_owned);
        self
    }
}

#[derive(SerializeDict, Type, Debug)]
#[zvariant(signature = "dict")]
struct OpenFileRequestOptions {
    handle_token: HandleToken,
    writable: Option<bool>,
    ask: Option<bool>,
    activation_token: Option<String>,
}

impl From<OpenUriOptions> for OpenFileRequestOptions {
    fn from(options: OpenUriOptions) -> Self {
        Self {
            handle_token: HandleToken::default(),
            writable: Some(options.writable),
            ask: Some(options.ask),
            activation_token: options.activation_token,
        }
    }
}

#[derive(SerializeDict, Type, Debug, Default)]
#[zvariant(signature = "dict")]
struct OpenDirectoryOptions {
    handle_token: HandleToken,
    activation_token: Option<String>,
}

/// The interface lets sandboxed applications open URIs
/// (e.g. a http: link to the applications homepage) under the control of the
/// user.
///
/// Wrapper of the DBus interface: [`org.freedesktop.portal.OpenURI`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.OpenURI.html).
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.OpenURI")]
pub struct OpenUri<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> OpenUri<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Asks to open a URI.
    ///
    /// *Note* that `file` uris are explicitly not supported by this method.
    /// Use [`Self::open_file`] or [`Self::open_directory`] instead.
    ///
    /// # Specifications
    ///
    /// See also [`OpenURI`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.OpenURI.html#org-freedesktop-portal-openuri-openuri).
    #[doc(alias = "OpenURI")]
    #[doc(alias = "xdp_portal_open_uri")]
    pub async fn open_uri(
        &self,
        uri: &Url,
        identifier: Option<&WindowIdentifier>,
        options: OpenUriOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response> {
        require_version("OpenURI", 1, self.version)?;
        if uri.scheme() == "file" {
            return Err(Error::InvalidArgument(format!(
                "{uri} is a file URI, use OpenUri::open_file instead"
            )));
        }
        let options = OpenFileRequestOptions::from(options);
        let identifier = self.connection.window_identifier(identifier);
        let body = (identifier, uri.as_str(), &options);
        let body = &body;
        let transport = self.connection.transport();
        self.connection
            .send_request(
                options.handle_token.clone(),
                empty_decoder(),
                cancellation,
                move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, "OpenURI", body)
                        .await
                },
            )
            .await
    }

    /// Asks to open a local file.
    ///
    /// # Specifications
    ///
    /// See also [`OpenFile`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.OpenURI.html#org-freedesktop-portal-openuri-openfile).
    #[doc(alias = "OpenFile")]
    pub async fn open_file(
        &self,
        target: &FileTarget,
        identifier: Option<&WindowIdentifier>,
        options: OpenUriOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response> {
        require_version("OpenFile", 2, self.version)?;
        let file = target.open()?;
        let options = OpenFileRequestOptions::from(options);
        let identifier = self.connection.window_identifier(identifier);
        let body = (identifier, Fd::from(&file), &options);
        let body = &body;
        let transport = self.connection.transport();
        self.connection
            .send_request(
                options.handle_token.clone(),
                empty_decoder(),
                cancellation,
                move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, "OpenFile", body)
                        .await
                },
            )
            .await
    }

    /// Asks to open the directory containing a local file in the file
    /// browser.
    ///
    /// # Arguments
    ///
    /// * `target` - The file whose directory is shown.
    /// * `identifier` - Identifier for the application window.
    /// * `activation_token` - Token used to activate the file browser.
    /// * `cancellation` - Cancels the request while it is pending.
    ///
    /// # Specifications
    ///
    /// See also [`OpenDirectory`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.OpenURI.html#org-freedesktop-portal-openuri-opendirectory).
    #[doc(alias = "OpenDirectory")]
    #[doc(alias = "xdp_portal_open_directory")]
    pub async fn open_directory(
        &self,
        target: &FileTarget,
        identifier: Option<&WindowIdentifier>,
        activation_token: Option<&str>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response> {
        require_version("OpenDirectory", 3, self.version)?;
        let directory = target.open()?;
        let options = OpenDirectoryOptions {
            handle_token: HandleToken::default(),
            activation_token: activation_token.map(ToOwned::to_owned),
        };
        let identifier = self.connection.window_identifier(identifier);
        let body = (identifier, Fd::from(&directory), &options);
        let body = &body;
        let transport = self.connection.transport();
        self.connection
            .send_request(
                options.handle_token.clone(),
                empty_decoder(),
                cancellation,
                move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, "OpenDirectory", body)
                        .await
                },
            )
            .await
    }
}

impl<C: Transport> Sealed for OpenUri<C> {}

impl<C: Transport> Portal<C> for OpenUri<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "OpenURI";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.open_uri
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use url::Url;

    use super::{FileTarget, OpenUriOptions};
    use crate::{
        request::ResponseStatus, transport::mock::MockTransport, ConnectionManager, Error,
    };

    const PATH: &str = "/org/freedesktop/portal/desktop/request/1_234/open_uri";

    fn manager(version: u32) -> ConnectionManager<MockTransport> {
        let transport = MockTransport::default();
        transport.set_version("org.freedesktop.portal.OpenURI", version);
        transport.push_request_path(PATH);
        ConnectionManager::with_transport(transport, None).unwrap()
    }

    #[tokio::test]
    async fn open_uri() {
        let manager = manager(4);
        let open_uri = manager.open_uri().await.unwrap();
        let uri = Url::parse("https://example.org/").unwrap();
        let options = OpenUriOptions::default().ask(true).activation_token("token");

        let (response, ()) = tokio::join!(
            open_uri.open_uri(&uri, None, options, None),
            manager
                .transport()
                .respond_once_subscribed(PATH, 0, HashMap::new())
        );
        assert_eq!(response.unwrap().status(), ResponseStatus::Success);
        let calls = manager.transport().calls();
        assert_eq!(calls[0].method, "OpenURI");
        assert!(calls[0].body.contains("https://example.org/"));
    }

    #[tokio::test]
    async fn file_scheme_is_rejected() {
        let manager = manager(4);
        let open_uri = manager.open_uri().await.unwrap();
        let uri = Url::parse("file:///tmp/a.txt").unwrap();

        assert!(matches!(
            open_uri
                .open_uri(&uri, None, OpenUriOptions::default(), None)
                .await,
            Err(Error::InvalidArgument(_))
        ));

        let target = FileTarget::from(Url::parse("https://example.org/a.txt").unwrap());
        assert!(matches!(
            open_uri
                .open_file(&target, None, OpenUriOptions::default(), None)
                .await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(manager.transport().calls().is_empty());
        assert!(manager.transport().subscriptions().is_empty());
    }

    #[tokio::test]
    async fn open_file_from_uri() {
        let manager = manager(3);
        let open_uri = manager.open_uri().await.unwrap();
        let target = FileTarget::from(Url::from_file_path(std::env::temp_dir()).unwrap());

        let (response, ()) = tokio::join!(
            open_uri.open_file(&target, None, OpenUriOptions::default().writable(true), None),
            manager
                .transport()
                .respond_once_subscribed(PATH, 1, HashMap::new())
        );
        assert_eq!(response.unwrap().status(), ResponseStatus::UserCancelled);
        assert_eq!(manager.transport().calls()[0].method, "OpenFile");
    }

    #[tokio::test]
    async fn open_directory_requires_version_three() {
        let manager = manager(2);
        let open_uri = manager.open_uri().await.unwrap();
        let target = FileTarget::from(std::env::temp_dir());

        assert!(matches!(
            open_uri.open_directory(&target, None, None, None).await,
            Err(Error::RequiresVersion {
                method: "OpenDirectory",
                required: 3,
                available: 2
            })
        ));
        assert!(manager.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn open_directory() {
        let manager = manager(3);
        let open_uri = manager.open_uri().await.unwrap();
        let target = FileTarget::from(std::env::temp_dir());

        let (response, ()) = tokio::join!(
            open_uri.open_directory(&target, None, Some("token"), None),
            manager
                .transport()
                .respond_once_subscribed(PATH, 0, HashMap::new())
        );
        assert!(response.unwrap().is_success());
        assert_eq!(manager.transport().calls()[0].method, "OpenDirectory");
    }

    #[tokio::test]
    async fn missing_file() {
        let manager = manager(3);
        let open_uri = manager.open_uri().await.unwrap();
        let target = FileTarget::from("/nonexistent/ldu/file");

        assert!(matches!(
            open_uri
                .open_file(&target, None, OpenUriOptions::default(), None)
                .await,
            Err(Error::IO(_))
        ));
    }
}
