use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use zbus::zvariant::{DynamicType, OwnedObjectPath, Type};

use super::{SignalStream, Transport, DESKTOP_DESTINATION, DESKTOP_PATH, REQUEST_INTERFACE};
use crate::{Error, Result};

/// A [`Transport`] backed by a [`zbus::Connection`].
#[derive(Debug, Clone)]
pub struct DBusTransport {
    connection: zbus::Connection,
}

impl DBusTransport {
    /// Connect to the session bus.
    pub async fn session() -> Result<Self> {
        let connection = zbus::Connection::session()
            .await
            .map_err(Error::Connection)?;
        Ok(Self { connection })
    }

    /// Connect to the bus at `address`, e.g. `unix:path=/run/user/1000/bus`.
    pub async fn with_address(address: &str) -> Result<Self> {
        let connection = zbus::connection::Builder::address(address)
            .map_err(Error::Connection)?
            .build()
            .await
            .map_err(Error::Connection)?;
        Ok(Self { connection })
    }

    /// Wrap an already established connection.
    pub fn from_connection(connection: zbus::Connection) -> Self {
        Self { connection }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &zbus::Connection {
        &self.connection
    }

    async fn proxy(
        &self,
        path: OwnedObjectPath,
        interface: &'static str,
    ) -> Result<zbus::Proxy<'static>> {
        let proxy = zbus::Proxy::new(
            &self.connection,
            DESKTOP_DESTINATION,
            path.into_inner(),
            interface,
        )
        .await?;
        Ok(proxy)
    }

    async fn desktop_proxy(&self, interface: &'static str) -> Result<zbus::Proxy<'static>> {
        let path = OwnedObjectPath::try_from(DESKTOP_PATH)?;
        self.proxy(path, interface).await
    }
}

#[async_trait]
impl Transport for DBusTransport {
    fn unique_name(&self) -> Option<String> {
        self.connection.unique_name().map(|name| name.to_string())
    }

    async fn version(&self, interface: &'static str) -> Result<u32> {
        let proxy = self.desktop_proxy(interface).await?;
        let version = proxy.get_property::<u32>("version").await?;
        Ok(version)
    }

    async fn call<R, B>(&self, interface: &'static str, method: &'static str, body: &B) -> Result<R>
    where
        R: DeserializeOwned + Type + Send + 'static,
        B: Serialize + DynamicType + Debug + Sync,
    {
        #[cfg(feature = "tracing")]
        {
            tracing::info!("Calling method {}:{}", interface, method);
            tracing::debug!("With body {:#?}", body);
        }
        let proxy = self.desktop_proxy(interface).await?;
        let reply = proxy.call::<_, B, R>(method, body).await?;
        Ok(reply)
    }

    async fn receive_signal(
        &self,
        path: &OwnedObjectPath,
        interface: &'static str,
        member: &'static str,
    ) -> Result<SignalStream> {
        #[cfg(feature = "tracing")]
        tracing::info!("Listening to signal '{}' on '{}'", member, path.as_str());
        let proxy = self.proxy(path.clone(), interface).await?;
        let stream = proxy.receive_signal(member).await?;
        Ok(Box::pin(stream.map(Ok::<_, zbus::Error>)))
    }

    async fn close_request(&self, path: &OwnedObjectPath) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::info!("Closing request {}", path.as_str());
        let proxy = self.proxy(path.clone(), REQUEST_INTERFACE).await?;
        proxy.call::<_, (), ()>("Close", &()).await?;
        Ok(())
    }

    fn close_request_detached(&self, path: OwnedObjectPath) {
        let transport = self.clone();
        self.connection
            .executor()
            .spawn(
                async move {
                    if let Err(_err) = transport.close_request(&path).await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Failed to close request {}: {}", path.as_str(), _err);
                    }
                },
                "close dropped request",
            )
            .detach();
    }

    async fn disconnect(&self) -> Result<()> {
        self.connection.clone().close().await?;
        Ok(())
    }
}
