//! # Examples
//!
//! Taking a screenshot
//!
//! ```rust,no_run
//! use linux_desktop_utils::{desktop::screenshot::ScreenshotOptions, ConnectionManager};
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let response = manager
//!         .screenshot()
//!         .await?
//!         .screenshot(None, ScreenshotOptions::default().interactive(true), None)
//!         .await?;
//!     if let Some(screenshot) = response.results() {
//!         println!("URI: {}", screenshot.uri());
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use url::Url;
use zbus::{
    zvariant::{DeserializeDict, OwnedObjectPath, SerializeDict, Type},
    Message,
};

use super::require_version;
use crate::{
    cancellation::CancellationToken,
    connection::{Portal, PortalCache, PortalConnection},
    request::{decode_results, Response},
    transport::{DBusTransport, Transport},
    Error, HandleToken, Result, Sealed, WindowIdentifier,
};

const INTERFACE: &str = "org.freedesktop.portal.Screenshot";

/// Specified options for a [`Screenshot::screenshot`] request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenshotOptions {
    modal: bool,
    interactive: bool,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            modal: true,
            interactive: false,
        }
    }
}

impl ScreenshotOptions {
    /// Sets whether the dialog should be modal. Defaults to `true`.
    #[must_use]
    pub fn modal(mut self, modal: bool) -> Self {
        self.modal = modal;
        self
    }

    /// Sets whether the dialog should offer customization before taking a
    /// screenshot.
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

#[derive(SerializeDict, Type, Debug)]
#[zvariant(signature = "dict")]
struct ScreenshotRequestOptions {
    handle_token: HandleToken,
    modal: Option<bool>,
    interactive: Option<bool>,
}

impl From<ScreenshotOptions> for ScreenshotRequestOptions {
    fn from(options: ScreenshotOptions) -> Self {
        Self {
            handle_token: HandleToken::default(),
            modal: Some(options.modal),
            interactive: Some(options.interactive),
        }
    }
}

#[derive(DeserializeDict, Type, Debug)]
#[zvariant(signature = "dict")]
struct ScreenshotResults {
    uri: Option<String>,
}

/// The response of a [`Screenshot::screenshot`] request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[doc(alias = "xdp_portal_take_screenshot")]
pub struct ScreenshotFile {
    uri: Url,
}

impl ScreenshotFile {
    /// The screenshot URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }
}

impl TryFrom<ScreenshotResults> for ScreenshotFile {
    type Error = Error;

    fn try_from(results: ScreenshotResults) -> Result<Self> {
        let uri = results
            .uri
            .ok_or_else(|| Error::Decode("the screenshot response has no uri".to_owned()))?;
        let uri = Url::parse(&uri).map_err(|err| Error::Decode(format!("invalid URI {uri}: {err}")))?;
        Ok(Self { uri })
    }
}

/// The interface lets sandboxed applications request a screenshot.
///
/// Wrapper of the DBus interface: [`org.freedesktop.portal.Screenshot`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Screenshot.html).
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.Screenshot")]
pub struct Screenshot<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> Screenshot<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Takes a screenshot.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Identifier for the application window.
    /// * `options` - Whether the dialog is modal and interactive.
    /// * `cancellation` - Cancels the request while it is pending.
    ///
    /// # Specifications
    ///
    /// See also [`Screenshot`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Screenshot.html#org-freedesktop-portal-screenshot-screenshot).
    #[doc(alias = "Screenshot")]
    pub async fn screenshot(
        &self,
        identifier: Option<&WindowIdentifier>,
        options: ScreenshotOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response<ScreenshotFile>> {
        require_version("Screenshot", 1, self.version)?;
        let options = ScreenshotRequestOptions::from(options);
        let identifier = self.connection.window_identifier(identifier);
        let body = (identifier, &options);
        let body = &body;
        let transport = self.connection.transport();
        self.connection
            .send_request(
                options.handle_token.clone(),
                Box::new(|message: &Message| {
                    ScreenshotFile::try_from(decode_results::<ScreenshotResults>(message)?)
                }),
                cancellation,
                move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, "Screenshot", body)
                        .await
                },
            )
            .await
    }
}

impl<C: Transport> Sealed for Screenshot<C> {}

impl<C: Transport> Portal<C> for Screenshot<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "Screenshot";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.screenshot
    }
}
