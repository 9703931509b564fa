//! Typed wrappers of the portal interfaces.
//!
//! Every portal is obtained from a [`ConnectionManager`](crate::ConnectionManager)
//! and checks the running portal version before sending anything.

/// Interact with `org.freedesktop.portal.Account` interface.
pub mod account;
/// Interact with `org.freedesktop.portal.FileChooser` interface.
pub mod file_chooser;
/// Interact with `org.freedesktop.portal.NetworkMonitor` interface.
pub mod network_monitor;
/// Interact with `org.freedesktop.portal.OpenURI` interface.
pub mod open_uri;
/// Interact with `org.freedesktop.portal.Screenshot` interface.
pub mod screenshot;
/// Interact with `org.freedesktop.portal.Secret` interface.
pub mod secret;
/// Interact with `org.freedesktop.portal.Trash` interface.
pub mod trash;

use url::Url;

use crate::{Error, Result};

/// Fail with [`Error::RequiresVersion`] if `available` is older than
/// `required`.
pub(crate) fn require_version(method: &'static str, required: u32, available: u32) -> Result<()> {
    if available < required {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            "{} requires version {}, the portal has {}",
            method,
            required,
            available
        );
        return Err(Error::RequiresVersion {
            method,
            required,
            available,
        });
    }
    Ok(())
}

/// Parse a URI returned by a portal, which must use the `file` scheme.
pub(crate) fn parse_file_uri(uri: &str) -> Result<Url> {
    let url = Url::parse(uri).map_err(|err| Error::Decode(format!("invalid URI {uri}: {err}")))?;
    if url.scheme() != "file" {
        return Err(Error::Decode(format!("the portal returned a non-file URI {uri}")));
    }
    Ok(url)
}
