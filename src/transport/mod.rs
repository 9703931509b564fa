//! The D-Bus seam every portal call goes through.
//!
//! [`DBusTransport`] talks to the session bus with zbus. Anything else
//! implementing [`Transport`] can stand in for it, which is how the request
//! lifecycle is exercised without a running portal.

use std::{fmt::Debug, pin::Pin};

use async_trait::async_trait;
use futures_util::Stream;
use serde::{de::DeserializeOwned, Serialize};
use zbus::{
    zvariant::{DynamicType, OwnedObjectPath, Type},
    Message,
};

use crate::Result;

mod dbus;
#[cfg(test)]
pub(crate) mod mock;

pub use self::dbus::DBusTransport;

pub(crate) const DESKTOP_DESTINATION: &str = "org.freedesktop.portal.Desktop";
pub(crate) const DESKTOP_PATH: &str = "/org/freedesktop/portal/desktop";
pub(crate) const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// A stream of signal messages.
///
/// Dropping the stream ends the subscription.
pub type SignalStream = Pin<Box<dyn Stream<Item = zbus::Result<Message>> + Send>>;

/// The operations the portal client needs from a D-Bus connection.
///
/// Every method targets the `org.freedesktop.portal.Desktop` bus name.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The unique name the bus assigned to this connection, e.g. `:1.42`.
    fn unique_name(&self) -> Option<String>;

    /// Read the `version` property of `interface` on the desktop object.
    async fn version(&self, interface: &'static str) -> Result<u32>;

    /// Call `method` of `interface` on the desktop object and deserialize
    /// the reply.
    async fn call<R, B>(&self, interface: &'static str, method: &'static str, body: &B) -> Result<R>
    where
        R: DeserializeOwned + Type + Send + 'static,
        B: Serialize + DynamicType + Debug + Sync;

    /// Subscribe to the `member` signal of `interface` emitted from `path`.
    async fn receive_signal(
        &self,
        path: &OwnedObjectPath,
        interface: &'static str,
        member: &'static str,
    ) -> Result<SignalStream>;

    /// Call `org.freedesktop.portal.Request.Close` on `path`.
    async fn close_request(&self, path: &OwnedObjectPath) -> Result<()>;

    /// Call `org.freedesktop.portal.Request.Close` on `path` without waiting
    /// for the reply.
    ///
    /// Used from [`Drop`], so failures can only be logged.
    fn close_request_detached(&self, path: OwnedObjectPath);

    /// Close the connection.
    async fn disconnect(&self) -> Result<()>;
}
