//! Access to the current logged user information such as the id, name
//! or their avatar uri.
//!
//! Wrapper of the DBus interface: [`org.freedesktop.portal.Account`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Account.html).
//!
//! ### Examples
//!
//! ```rust, no_run
//! use linux_desktop_utils::ConnectionManager;
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let response = manager
//!         .account()
//!         .await?
//!         .user_information(None, Some("App would like to access user information"), None)
//!         .await?;
//!
//!     if let Some(user) = response.results() {
//!         println!("Name: {:?}", user.name());
//!         println!("ID: {:?}", user.id());
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use url::Url;
use zbus::{
    zvariant::{DeserializeDict, OwnedObjectPath, SerializeDict, Type},
    Message,
};

use super::{parse_file_uri, require_version};
use crate::{
    cancellation::CancellationToken,
    connection::{Portal, PortalCache, PortalConnection},
    request::{decode_results, Response},
    transport::{DBusTransport, Transport},
    HandleToken, Result, Sealed, WindowIdentifier,
};

const INTERFACE: &str = "org.freedesktop.portal.Account";

#[derive(SerializeDict, Type, Debug, Default)]
#[zvariant(signature = "dict")]
struct UserInformationOptions {
    handle_token: HandleToken,
    reason: Option<String>,
}

#[derive(DeserializeDict, Type, Debug)]
#[zvariant(signature = "dict")]
struct UserInformationResults {
    id: Option<String>,
    name: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The response of a [`Account::user_information`] request.
pub struct UserInformation {
    id: Option<String>,
    name: Option<String>,
    image: Option<Url>,
}

impl UserInformation {
    /// User identifier.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// User name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// User image uri.
    pub fn image(&self) -> Option<&Url> {
        self.image.as_ref()
    }
}

impl TryFrom<UserInformationResults> for UserInformation {
    type Error = crate::Error;

    fn try_from(results: UserInformationResults) -> Result<Self> {
        // Images that are not absolute URIs are skipped, non-file ones are
        // rejected.
        let image = match results.image.as_deref() {
            Some(image) if Url::parse(image).is_ok() => Some(parse_file_uri(image)?),
            _ => None,
        };
        Ok(Self {
            id: results.id.filter(|id| !id.is_empty()),
            name: results.name.filter(|name| !name.is_empty()),
            image,
        })
    }
}

/// The interface lets sandboxed applications query basic information about
/// the user, like their name and avatar photo.
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.Account")]
pub struct Account<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> Account<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Gets information about the user.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The window the dialog is attached to.
    /// * `reason` - A user-visible reason for the request.
    /// * `cancellation` - Cancels the request while it is pending.
    #[doc(alias = "GetUserInformation")]
    #[doc(alias = "xdp_portal_get_user_information")]
    pub async fn user_information(
        &self,
        identifier: Option<&WindowIdentifier>,
        reason: Option<&str>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response<UserInformation>> {
        require_version("GetUserInformation", 1, self.version)?;
        let options = UserInformationOptions {
            handle_token: HandleToken::default(),
            reason: reason.map(ToOwned::to_owned),
        };
        let identifier = self.connection.window_identifier(identifier);
        let body = (identifier, &options);
        let body = &body;
        let transport = self.connection.transport();
        self.connection
            .send_request(
                options.handle_token.clone(),
                Box::new(|message: &Message| {
                    UserInformation::try_from(decode_results::<UserInformationResults>(message)?)
                }),
                cancellation,
                move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, "GetUserInformation", body)
                        .await
                },
            )
            .await
    }
}

impl<C: Transport> Sealed for Account<C> {}

impl<C: Transport> Portal<C> for Account<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "Account";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.account
    }
}
