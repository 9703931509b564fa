use crate::handle_token::InvalidHandleToken;

#[derive(Debug)]
#[non_exhaustive]
/// The error type for linux-desktop-utils.
pub enum Error {
    /// The bus address could not be parsed or the connection handshake
    /// failed.
    Connection(zbus::Error),
    /// The portal interface could not be reached or its `version` property
    /// could not be read.
    PortalUnavailable {
        /// The portal that failed, e.g. `FileChooser`.
        portal: &'static str,
        /// The underlying failure.
        source: Box<Error>,
    },
    /// The running portal is older than the version the method needs.
    RequiresVersion {
        /// The D-Bus method or property name.
        method: &'static str,
        /// The version the method was introduced in.
        required: u32,
        /// The version the portal advertises.
        available: u32,
    },
    /// The request was cancelled by the caller or by the connection teardown.
    Cancelled,
    /// The `Response` signal subscription failed or delivered a malformed
    /// message.
    TransportFault(String),
    /// The portal answered but the results could not be decoded.
    Decode(String),
    /// The object was used after being disposed.
    Disposed(&'static str),
    /// An argument was rejected before reaching the portal.
    InvalidArgument(String),
    /// A handle token was empty or contained a character outside
    /// `[A-Za-z0-9_]`.
    InvalidHandleToken(InvalidHandleToken),
    /// A zbus specific error.
    Zbus(zbus::Error),
    /// A conversion error.
    Zvariant(zbus::zvariant::Error),
    /// An IO error.
    IO(std::io::Error),
    /// Failed to parse a URL.
    ParseError(url::ParseError),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(e) | Self::Zbus(e) => Some(e),
            Self::PortalUnavailable { source, .. } => Some(source.as_ref()),
            Self::Zvariant(e) => Some(e),
            Self::IO(e) => Some(e),
            Self::ParseError(e) => Some(e),
            Self::InvalidHandleToken(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "Failed to connect to the session bus: {e}"),
            Self::PortalUnavailable { portal, source } => {
                write!(f, "Portal {portal} is unavailable: {source}")
            }
            Self::RequiresVersion {
                method,
                required,
                available,
            } => write!(
                f,
                "{method} requires portal version {required}, the running one is {available}"
            ),
            Self::Cancelled => f.write_str("The request was cancelled"),
            Self::TransportFault(e) => write!(f, "Transport fault: {e}"),
            Self::Decode(e) => write!(f, "Failed to decode the portal response: {e}"),
            Self::Disposed(what) => write!(f, "The {what} was already disposed"),
            Self::InvalidArgument(e) => write!(f, "Invalid argument: {e}"),
            Self::InvalidHandleToken(e) => write!(f, "Invalid handle token: {e}"),
            Self::Zbus(e) => write!(f, "ZBus Error: {e}"),
            Self::Zvariant(e) => write!(f, "ZVariant Error: {e}"),
            Self::IO(e) => write!(f, "IO: {e}"),
            Self::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl From<zbus::Error> for Error {
    fn from(e: zbus::Error) -> Self {
        Self::Zbus(e)
    }
}

impl From<zbus::fdo::Error> for Error {
    fn from(e: zbus::fdo::Error) -> Self {
        Self::Zbus(e.into())
    }
}

impl From<zbus::zvariant::Error> for Error {
    fn from(e: zbus::zvariant::Error) -> Self {
        Self::Zvariant(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IO(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::ParseError(e)
    }
}

impl From<InvalidHandleToken> for Error {
    fn from(e: InvalidHandleToken) -> Self {
        Self::InvalidHandleToken(e)
    }
}
