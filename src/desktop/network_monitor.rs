//! # Examples
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use linux_desktop_utils::ConnectionManager;
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let monitor = manager.network_monitor().await?;
//!
//!     println!("{}", monitor.can_reach("www.example.org", 80).await?);
//!     println!("{}", monitor.available().await?);
//!     println!("{:?}", monitor.connectivity().await?);
//!     println!("{}", monitor.metered().await?);
//!     println!("{:#?}", monitor.status().await?);
//!
//!     let mut changed = monitor.receive_changed().await?;
//!     while changed.next().await.is_some() {
//!         println!("{:#?}", monitor.status().await?);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::{fmt, sync::Arc};

use futures_util::{Stream, StreamExt};
use serde_repr::{Deserialize_repr, Serialize_repr};
use zbus::zvariant::{DeserializeDict, OwnedObjectPath, Type};

use super::require_version;
use crate::{
    connection::{Portal, PortalCache, PortalConnection},
    transport::{DBusTransport, Transport, DESKTOP_PATH},
    Error, Result, Sealed,
};

const INTERFACE: &str = "org.freedesktop.portal.NetworkMonitor";

#[derive(DeserializeDict, Type, Debug)]
#[zvariant(signature = "dict")]
struct NetworkStatusResults {
    available: Option<bool>,
    metered: Option<bool>,
    connectivity: Option<u32>,
}

/// The network status, composed of the availability, metered & connectivity.
///
/// Each value is only set when the portal reported it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct NetworkStatus {
    available: Option<bool>,
    metered: Option<bool>,
    connectivity: Option<Connectivity>,
}

impl NetworkStatus {
    /// Returns whether the network is considered available.
    pub fn is_available(&self) -> Option<bool> {
        self.available
    }

    /// Returns whether the network is considered metered.
    pub fn is_metered(&self) -> Option<bool> {
        self.metered
    }

    /// Returns more detailed information about the host's network
    /// connectivity.
    pub fn connectivity(&self) -> Option<Connectivity> {
        self.connectivity
    }
}

impl TryFrom<NetworkStatusResults> for NetworkStatus {
    type Error = Error;

    fn try_from(results: NetworkStatusResults) -> Result<Self> {
        Ok(Self {
            available: results.available,
            metered: results.metered,
            connectivity: results.connectivity.map(Connectivity::try_from).transpose()?,
        })
    }
}

#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, PartialEq, Eq, Hash, Debug, Type)]
#[repr(u32)]
/// Host's network activity
pub enum Connectivity {
    /// The host is not configured with a route to the internet.
    Local = 1,
    /// The host is connected to a network, but can't reach the full internet.
    Limited = 2,
    /// The host is behind a captive portal and cannot reach the full internet.
    CaptivePortal = 3,
    /// The host connected to a network, and can reach the full internet.
    FullNetwork = 4,
}

impl TryFrom<u32> for Connectivity {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Self::Local),
            2 => Ok(Self::Limited),
            3 => Ok(Self::CaptivePortal),
            4 => Ok(Self::FullNetwork),
            other => Err(Error::Decode(format!("unknown connectivity value {other}"))),
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connectivity = match self {
            Self::Local => "local",
            Self::Limited => "limited",
            Self::CaptivePortal => "captive portal",
            Self::FullNetwork => "full network",
        };
        f.write_str(connectivity)
    }
}

/// The interface provides network status information to sandboxed
/// applications.
///
/// It is not a portal in the strict sense, since it does not involve user
/// interaction. Applications are expected to use this interface indirectly,
/// via a library API such as the GLib `GNetworkMonitor` interface.
///
/// Wrapper of the DBus interface: [`org.freedesktop.portal.NetworkMonitor`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.NetworkMonitor.html).
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.NetworkMonitor")]
pub struct NetworkMonitor<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> NetworkMonitor<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns whether the network is considered available.
    ///
    /// That is, whether the system as a default route for at least one of
    /// IPv4 or IPv6.
    #[doc(alias = "GetAvailable")]
    pub async fn available(&self) -> Result<bool> {
        require_version("GetAvailable", 2, self.version)?;
        self.connection
            .transport()
            .call(INTERFACE, "GetAvailable", &())
            .await
    }

    /// Returns whether the network is considered metered.
    ///
    /// That is, whether the system as traffic flowing through the default
    /// connection that is subject to limitations by service providers.
    #[doc(alias = "GetMetered")]
    pub async fn metered(&self) -> Result<bool> {
        require_version("GetMetered", 2, self.version)?;
        self.connection
            .transport()
            .call(INTERFACE, "GetMetered", &())
            .await
    }

    /// Returns more detailed information about the host's network
    /// connectivity.
    #[doc(alias = "GetConnectivity")]
    pub async fn connectivity(&self) -> Result<Connectivity> {
        require_version("GetConnectivity", 2, self.version)?;
        let connectivity = self
            .connection
            .transport()
            .call::<u32, _>(INTERFACE, "GetConnectivity", &())
            .await?;
        Connectivity::try_from(connectivity)
    }

    /// Returns the three values all at once.
    #[doc(alias = "GetStatus")]
    pub async fn status(&self) -> Result<NetworkStatus> {
        require_version("GetStatus", 3, self.version)?;
        let status = self
            .connection
            .transport()
            .call::<NetworkStatusResults, _>(INTERFACE, "GetStatus", &())
            .await?;
        NetworkStatus::try_from(status)
    }

    /// Returns whether the given hostname is believed to be reachable.
    ///
    /// # Arguments
    ///
    /// * `hostname` - The hostname to reach.
    /// * `port` - The port to reach.
    #[doc(alias = "CanReach")]
    pub async fn can_reach(&self, hostname: &str, port: u32) -> Result<bool> {
        require_version("CanReach", 3, self.version)?;
        self.connection
            .transport()
            .call(INTERFACE, "CanReach", &(hostname, port))
            .await
    }

    /// Emitted when the network configuration changes.
    ///
    /// The subscription ends when the stream is dropped.
    #[doc(alias = "changed")]
    pub async fn receive_changed(&self) -> Result<impl Stream<Item = Result<()>> + Send + Unpin> {
        let path = OwnedObjectPath::try_from(DESKTOP_PATH)?;
        let stream = self
            .connection
            .transport()
            .receive_signal(&path, INTERFACE, "changed")
            .await?;
        Ok(stream.map(|message| message.map(|_| ()).map_err(Error::from)))
    }
}

impl<C: Transport> Sealed for NetworkMonitor<C> {}

impl<C: Transport> Portal<C> for NetworkMonitor<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "NetworkMonitor";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.network_monitor
    }
}
