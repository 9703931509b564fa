//! # Examples
//!
//! ```rust,no_run
//! use linux_desktop_utils::ConnectionManager;
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let trash = manager.trash().await?;
//!     if !trash.trash_file("/home/user/Downloads/old.iso").await? {
//!         eprintln!("The file could not be moved to the trash");
//!     }
//!     Ok(())
//! }
//! ```

use std::{fs::OpenOptions, os::fd::AsFd, path::Path, sync::Arc};

use zbus::zvariant::Fd;

use super::require_version;
use crate::{
    connection::{Portal, PortalCache, PortalConnection},
    transport::{DBusTransport, Transport},
    Result, Sealed,
};

const INTERFACE: &str = "org.freedesktop.portal.Trash";
const TRASH_SUCCEEDED: u32 = 1;

/// The interface lets sandboxed applications send files to the trashcan.
///
/// Wrapper of the DBus interface: [`org.freedesktop.portal.Trash`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Trash.html).
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.Trash")]
pub struct Trash<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> Trash<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Sends the file at `path` to the trashcan.
    ///
    /// Applications are allowed to trash a file if they can open it in
    /// read/write mode. Returns whether the portal succeeded.
    #[doc(alias = "TrashFile")]
    #[doc(alias = "xdp_portal_trash_file")]
    pub async fn trash_file(&self, path: impl AsRef<Path>) -> Result<bool> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        self.trash_fd(&file).await
    }

    /// Sends the file behind `fd` to the trashcan.
    pub async fn trash_fd(&self, fd: &impl AsFd) -> Result<bool> {
        require_version("TrashFile", 1, self.version)?;
        let status = self
            .connection
            .transport()
            .call::<u32, _>(INTERFACE, "TrashFile", &(Fd::from(fd),))
            .await?;
        Ok(status == TRASH_SUCCEEDED)
    }
}

impl<C: Transport> Sealed for Trash<C> {}

impl<C: Transport> Portal<C> for Trash<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "Trash";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.trash
    }
}
