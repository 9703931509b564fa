use std::{fmt, str::FromStr};

use serde::{ser::Serializer, Serialize};
use zbus::zvariant::{Signature, Type};

use crate::Error;

/// Identifies the application window a portal dialog should be placed on top
/// of.
///
/// Under X11 it has the form `x11:XID`, the XID of the window in hexadecimal.
/// Under Wayland it has the form `wayland:HANDLE`, a surface handle obtained
/// with the
/// [xdg-foreign](https://gitlab.freedesktop.org/wayland/wayland-protocols/-/blob/main/unstable/xdg-foreign/xdg-foreign-unstable-v2.xml)
/// protocol.
///
/// Requests without a window identifier send an empty string, see
/// [`ConnectionManager::window_identifier`](crate::ConnectionManager::window_identifier).
///
/// See also [Parent window identifiers](https://flatpak.github.io/xdg-desktop-portal/docs/window-identifiers.html).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowIdentifier {
    /// An X11 window.
    X11(std::os::raw::c_ulong),
    /// A Wayland surface exported with xdg-foreign.
    Wayland(String),
}

impl WindowIdentifier {
    /// Create an identifier from an X11 window XID.
    pub fn from_xid(xid: std::os::raw::c_ulong) -> Self {
        Self::X11(xid)
    }

    /// Create an identifier from an exported Wayland surface handle.
    pub fn from_wayland_handle(handle: impl Into<String>) -> Self {
        Self::Wayland(handle.into())
    }
}

impl fmt::Display for WindowIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X11(xid) => write!(f, "x11:0x{xid:x}"),
            Self::Wayland(handle) => write!(f, "wayland:{handle}"),
        }
    }
}

impl FromStr for WindowIdentifier {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Some(xid) = value.strip_prefix("x11:") {
            let digits = xid.trim_start_matches("0x");
            return std::os::raw::c_ulong::from_str_radix(digits, 16)
                .map(Self::X11)
                .map_err(|_| Error::InvalidArgument(format!("invalid X11 window id {xid}")));
        }
        match value.strip_prefix("wayland:") {
            Some(handle) if !handle.is_empty() => Ok(Self::Wayland(handle.to_owned())),
            _ => Err(Error::InvalidArgument(format!(
                "unsupported window identifier {value}"
            ))),
        }
    }
}

impl Type for WindowIdentifier {
    const SIGNATURE: &'static Signature = &Signature::Str;
}

impl Serialize for WindowIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
