//! # Examples
//!
//! ```rust,no_run
//! use linux_desktop_utils::ConnectionManager;
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let secret = manager.secret().await?.retrieve_secret(None).await?;
//!     if let Some(bytes) = secret.results() {
//!         println!("Got a {} bytes long secret", bytes.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::{io::Read, os::unix::net::UnixStream, sync::Arc};

use zbus::zvariant::{Fd, OwnedObjectPath, SerializeDict, Type};

use super::require_version;
use crate::{
    cancellation::CancellationToken,
    connection::{Portal, PortalCache, PortalConnection},
    request::{empty_decoder, Response, ResponseStatus},
    transport::{DBusTransport, Transport},
    Error, HandleToken, Result, Sealed,
};

const INTERFACE: &str = "org.freedesktop.portal.Secret";

#[derive(SerializeDict, Type, Debug, Default)]
#[zvariant(signature = "dict")]
struct RetrieveOptions {
    handle_token: HandleToken,
    token: Option<String>,
}

/// The interface lets sandboxed applications retrieve a per-application secret.
///
/// The secret can then be used for encrypting confidential data inside the
/// sandbox.
///
/// Wrapper of the DBus interface: [`org.freedesktop.portal.Secret`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Secret.html).
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.Secret")]
pub struct Secret<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> Secret<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Retrieves a master secret for a sandboxed application.
    ///
    /// The secret is transported over a socket pair created for the call.
    /// It is only read if the portal answered with success.
    ///
    /// # Specifications
    ///
    /// See also [`RetrieveSecret`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Secret.html#org-freedesktop-portal-secret-retrievesecret)
    #[doc(alias = "RetrieveSecret")]
    pub async fn retrieve_secret(
        &self,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response<Vec<u8>>> {
        require_version("RetrieveSecret", 1, self.version)?;
        let (reader, writer) = UnixStream::pair()?;
        let options = RetrieveOptions::default();
        let handle_token = options.handle_token.clone();

        let response = {
            let body = (Fd::from(&writer), &options);
            let body = &body;
            let transport = self.connection.transport();
            self.connection
                .send_request(handle_token, empty_decoder(), cancellation, move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, "RetrieveSecret", body)
                        .await
                })
                .await?
        };
        // Our end of the writer has to be closed for the read to finish.
        drop(writer);

        if !response.is_success() {
            return Ok(response.map(|()| Vec::new()));
        }
        let secret = read_secret(reader).await?;
        Ok(Response::new(ResponseStatus::Success, Some(secret)))
    }
}

async fn read_secret(mut reader: UnixStream) -> Result<Vec<u8>> {
    // Read the secret on a blocking thread since it's a small amount of data
    #[cfg(feature = "tokio")]
    let buf = tokio::task::spawn_blocking(move || {
        let mut buf = Vec::with_capacity(64);
        reader.read_to_end(&mut buf)?;
        Ok::<_, std::io::Error>(buf)
    })
    .await
    .map_err(|e| Error::from(std::io::Error::other(e)))??;

    #[cfg(not(feature = "tokio"))]
    let buf = {
        let mut buf = Vec::with_capacity(64);
        reader.read_to_end(&mut buf)?;
        buf
    };

    Ok(buf)
}

impl<C: Transport> Sealed for Secret<C> {}

impl<C: Transport> Portal<C> for Secret<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "Secret";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.secret
    }
}
