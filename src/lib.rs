#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
//! A [zbus](https://github.com/dbus2/zbus) client of the XDG desktop portals
//! and a resolver of the XDG base directories.
//!
//! Portal methods that involve the user answer asynchronously: the method
//! returns the object path of a `org.freedesktop.portal.Request` and the
//! results arrive later in its `Response` signal. [`Request`] hides that
//! handshake, including the subscription at the predicted path, the path
//! update, cancellation and cleanup. Every portal is obtained from a
//! [`ConnectionManager`].
//!
//! # Examples
//!
//! Ask the user to pick a file
//!
//! ```rust,no_run
//! use linux_desktop_utils::{desktop::file_chooser::OpenFileOptions, ConnectionManager};
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let response = manager
//!         .file_chooser()
//!         .await?
//!         .open_file("Open a document", None, OpenFileOptions::default(), None)
//!         .await?;
//!     if let Some(files) = response.results() {
//!         println!("{:#?}", files.uris());
//!     }
//!     manager.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Optional features
//!
//! | Feature | Description |
//! | ---     | ----------- |
//! | tokio | Run zbus on the tokio runtime (default) |
//! | async-io | Run zbus on its own async-io executor |
//! | tracing | Log the request lifecycle with [tracing](https://docs.rs/tracing) (default) |
#[cfg(all(all(feature = "tokio", feature = "async-io"), not(doc)))]
compile_error!("You can't enable both async-io & tokio features at once");
#[cfg(all(not(feature = "tokio"), not(feature = "async-io"), not(doc)))]
compile_error!("Either the `async-io` or the `tokio` feature has to be enabled");

/// Alias for a [`Result`] with the error type `linux_desktop_utils::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Resolve the XDG base directories.
pub mod base_directories;
/// Cancel pending requests.
pub mod cancellation;
/// Share one bus connection between portals and requests.
pub mod connection;
/// Interact with the user's desktop such as picking files, opening URIs or
/// taking a screenshot.
pub mod desktop;
mod error;
mod file_path;
mod handle_token;
/// Follow a portal request from its creation to its `Response` signal.
pub mod request;
/// The D-Bus connection underneath the portals.
pub mod transport;
mod window_identifier;

pub use self::{
    cancellation::CancellationToken,
    connection::{ConnectionManager, ConnectionManagerBuilder},
    error::Error,
    file_path::FilePath,
    handle_token::{HandleToken, InvalidHandleToken},
    request::{Request, Response, ResponseStatus},
    transport::{DBusTransport, Transport},
    window_identifier::WindowIdentifier,
};
pub use zbus::{self, zvariant};

mod sealed {
    /// Use as a supertrait for public traits that users should not be able to
    /// implement
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;
