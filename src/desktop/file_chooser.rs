//! # Examples
//!
//! Opening a file
//!
//! ```rust,no_run
//! use linux_desktop_utils::{
//!     desktop::file_chooser::{Choice, FileFilter, OpenFileOptions},
//!     ConnectionManager,
//! };
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let options = OpenFileOptions::default()
//!         .accept_label("read")
//!         .modal(true)
//!         .multiple(true)
//!         .choice(
//!             Choice::new("encoding", "Encoding", "latin15")
//!                 .insert("utf8", "Unicode (UTF-8)")
//!                 .insert("latin15", "Western"),
//!         )
//!         .choice(Choice::boolean("re-encode", "Re-encode", false))
//!         .filter(FileFilter::new("SVG Image").mimetype("image/svg+xml"));
//!     let response = manager
//!         .file_chooser()
//!         .await?
//!         .open_file("Open a file to read", None, options, None)
//!         .await?;
//!
//!     if let Some(files) = response.results() {
//!         println!("{:#?}", files.uris());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Ask to save a file
//!
//! ```rust,no_run
//! use linux_desktop_utils::{
//!     desktop::file_chooser::{FileFilter, SaveFileOptions},
//!     ConnectionManager,
//! };
//!
//! async fn run() -> linux_desktop_utils::Result<()> {
//!     let manager = ConnectionManager::connect(None, None).await?;
//!     let options = SaveFileOptions::default()
//!         .accept_label("write")
//!         .current_name("image.jpg")
//!         .current_folder("/home/user/Pictures")?
//!         .filter(FileFilter::new("JPEG Image").glob("*.jpg"));
//!     let response = manager
//!         .file_chooser()
//!         .await?
//!         .save_file("Open a file to write", None, options, None)
//!         .await?;
//!
//!     if let Some(files) = response.results() {
//!         println!("{:#?}", files.uris());
//!     }
//!     Ok(())
//! }
//! ```

use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use url::Url;
use zbus::{
    zvariant::{DeserializeDict, OwnedObjectPath, SerializeDict, Type},
    Message,
};

use super::{parse_file_uri, require_version};
use crate::{
    cancellation::CancellationToken,
    connection::{Portal, PortalCache, PortalConnection},
    file_path::FilePath,
    request::{decode_results, Response},
    transport::{DBusTransport, Transport},
    Error, HandleToken, Result, Sealed, WindowIdentifier,
};

const INTERFACE: &str = "org.freedesktop.portal.FileChooser";

#[derive(Clone, Serialize, Deserialize, Type, Debug, PartialEq, Eq)]
/// A file filter, to limit the available file choices to a mimetype or a glob
/// pattern.
pub struct FileFilter(String, Vec<(FilterType, String)>);

#[derive(Clone, Copy, Serialize_repr, Deserialize_repr, Debug, Type, PartialEq, Eq)]
#[repr(u32)]
enum FilterType {
    GlobPattern = 0,
    MimeType = 1,
}

impl FileFilter {
    /// Create a new file filter
    ///
    /// # Arguments
    ///
    /// * `label` - user-visible name of the file filter.
    pub fn new(label: &str) -> Self {
        Self(label.to_owned(), vec![])
    }

    /// Adds a mime type to the file filter.
    #[must_use]
    pub fn mimetype(mut self, mimetype: &str) -> Self {
        self.1.push((FilterType::MimeType, mimetype.to_owned()));
        self
    }

    /// Adds a glob pattern to the file filter.
    #[must_use]
    pub fn glob(mut self, pattern: &str) -> Self {
        self.1.push((FilterType::GlobPattern, pattern.to_owned()));
        self
    }

    /// The user-visible name of the filter.
    pub fn label(&self) -> &str {
        &self.0
    }

    /// The mime types of the filter.
    pub fn mimetype_filters(&self) -> Vec<&str> {
        self.filters(FilterType::MimeType)
    }

    /// The glob patterns of the filter.
    pub fn pattern_filters(&self) -> Vec<&str> {
        self.filters(FilterType::GlobPattern)
    }

    fn filters(&self, kind: FilterType) -> Vec<&str> {
        self.1
            .iter()
            .filter(|(filter_type, _)| *filter_type == kind)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

#[derive(Clone, Serialize, Deserialize, Type, Debug, PartialEq, Eq)]
/// Presents the user with a choice to select from or as a checkbox.
pub struct Choice(String, String, Vec<(String, String)>, String);

impl Choice {
    /// Creates a checkbox choice.
    ///
    /// # Arguments
    ///
    /// * `id` - A unique identifier of the choice.
    /// * `label` - user-visible name of the choice.
    /// * `state` - the initial state of the checkbox.
    pub fn boolean(id: &str, label: &str, state: bool) -> Self {
        Self::new(id, label, &state.to_string())
    }

    /// Creates a new choice.
    ///
    /// # Arguments
    ///
    /// * `id` - A unique identifier of the choice.
    /// * `label` - user-visible name of the choice.
    /// * `initial_selection` - the initially selected value.
    pub fn new(id: &str, label: &str, initial_selection: &str) -> Self {
        Self(
            id.to_owned(),
            label.to_owned(),
            vec![],
            initial_selection.to_owned(),
        )
    }

    /// Adds a (key, value) as a choice.
    #[must_use]
    pub fn insert(mut self, key: &str, value: &str) -> Self {
        self.2.push((key.to_owned(), value.to_owned()));
        self
    }

    /// The choice's unique id
    pub fn id(&self) -> &str {
        &self.0
    }

    /// The user visible label of the choice.
    pub fn label(&self) -> &str {
        &self.1
    }

    /// Pairs of choices.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.2
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    /// The initially selected value.
    pub fn initial_selection(&self) -> &str {
        &self.3
    }

    /// Whether the choice is rendered as a checkbox.
    pub fn is_boolean(&self) -> bool {
        self.2.is_empty()
    }
}

#[derive(SerializeDict, Type, Debug, Default)]
#[zvariant(signature = "dict")]
/// Specified options for a [`FileChooser::open_file`] request.
pub struct OpenFileOptions {
    handle_token: HandleToken,
    accept_label: Option<String>,
    modal: Option<bool>,
    multiple: Option<bool>,
    directory: Option<bool>,
    filters: Vec<FileFilter>,
    current_filter: Option<FileFilter>,
    choices: Vec<Choice>,
    current_folder: Option<FilePath>,
}

impl OpenFileOptions {
    /// Sets a user-visible string to the "accept" button.
    #[must_use]
    pub fn accept_label(mut self, accept_label: &str) -> Self {
        self.accept_label = Some(accept_label.to_owned());
        self
    }

    /// Sets whether the dialog should be a modal.
    #[must_use]
    pub fn modal(mut self, modal: bool) -> Self {
        self.modal = Some(modal);
        self
    }

    /// Sets whether to allow multiple files selection.
    #[must_use]
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = Some(multiple);
        self
    }

    /// Sets whether to select directories or not.
    #[must_use]
    pub fn directory(mut self, directory: bool) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Adds a files filter.
    #[must_use]
    pub fn filter(mut self, filter: FileFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Specifies the default filter.
    #[must_use]
    pub fn current_filter(mut self, current_filter: FileFilter) -> Self {
        self.current_filter = Some(current_filter);
        self
    }

    /// Adds a choice.
    #[must_use]
    pub fn choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    /// Specifies the current folder path.
    pub fn current_folder(mut self, current_folder: impl AsRef<Path>) -> Result<Self> {
        self.current_folder = Some(FilePath::new(current_folder)?);
        Ok(self)
    }
}

#[derive(SerializeDict, Type, Debug, Default)]
#[zvariant(signature = "dict")]
/// Specified options for a [`FileChooser::save_file`] request.
pub struct SaveFileOptions {
    handle_token: HandleToken,
    accept_label: Option<String>,
    modal: Option<bool>,
    current_name: Option<String>,
    current_folder: Option<FilePath>,
    current_file: Option<FilePath>,
    filters: Vec<FileFilter>,
    current_filter: Option<FileFilter>,
    choices: Vec<Choice>,
}

impl SaveFileOptions {
    /// Sets a user-visible string to the "accept" button.
    #[must_use]
    pub fn accept_label(mut self, accept_label: &str) -> Self {
        self.accept_label = Some(accept_label.to_owned());
        self
    }

    /// Sets the current file name.
    #[must_use]
    pub fn current_name(mut self, current_name: &str) -> Self {
        self.current_name = Some(current_name.to_owned());
        self
    }

    /// Sets the current folder.
    pub fn current_folder(mut self, current_folder: impl AsRef<Path>) -> Result<Self> {
        self.current_folder = Some(FilePath::new(current_folder)?);
        Ok(self)
    }

    /// Sets the absolute path of the file.
    pub fn current_file(mut self, current_file: impl AsRef<Path>) -> Result<Self> {
        self.current_file = Some(FilePath::new(current_file)?);
        Ok(self)
    }

    /// Sets whether the dialog should be a modal.
    #[must_use]
    pub fn modal(mut self, modal: bool) -> Self {
        self.modal = Some(modal);
        self
    }

    /// Adds a files filter.
    #[must_use]
    pub fn filter(mut self, filter: FileFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the default filter.
    #[must_use]
    pub fn current_filter(mut self, current_filter: FileFilter) -> Self {
        self.current_filter = Some(current_filter);
        self
    }

    /// Adds a choice.
    #[must_use]
    pub fn choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }
}

#[derive(DeserializeDict, Type, Debug)]
#[zvariant(signature = "dict")]
struct SelectedFilesResults {
    uris: Option<Vec<String>>,
    choices: Option<Vec<(String, String)>>,
    current_filter: Option<FileFilter>,
}

/// A response to an open/save file request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFiles {
    uris: Vec<Url>,
    choices: Vec<(String, String)>,
    current_filter: Option<FileFilter>,
}

impl SelectedFiles {
    /// The selected files uris.
    pub fn uris(&self) -> &[Url] {
        &self.uris
    }

    /// The selected value of each choice as a tuple of (key, value).
    pub fn choices(&self) -> &[(String, String)] {
        &self.choices
    }

    /// The selected value of the choice with `id`.
    pub fn choice(&self, id: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, value)| value.as_str())
    }

    /// The selected filter.
    pub fn current_filter(&self) -> Option<&FileFilter> {
        self.current_filter.as_ref()
    }

    fn from_results(results: SelectedFilesResults, requested: &[Choice]) -> Result<Self> {
        let uris = results
            .uris
            .unwrap_or_default()
            .iter()
            .map(|uri| parse_file_uri(uri))
            .collect::<Result<Vec<_>>>()?;

        let mut choices = results.choices.unwrap_or_default();
        for (id, value) in &choices {
            let checkbox = requested
                .iter()
                .any(|choice| choice.id() == id && choice.is_boolean());
            if checkbox && value != "true" && value != "false" {
                return Err(Error::Decode(format!(
                    "checkbox {id} has the non-boolean value {value}"
                )));
            }
        }
        // The backend may leave untouched choices out.
        for choice in requested {
            if !choices.iter().any(|(id, _)| id == choice.id()) {
                choices.push((choice.id().to_owned(), choice.initial_selection().to_owned()));
            }
        }

        Ok(Self {
            uris,
            choices,
            current_filter: results.current_filter,
        })
    }
}

/// The interface lets sandboxed applications ask the user for access to files
/// outside the sandbox. The portal backend will present the user with a file
/// chooser dialog.
///
/// Wrapper of the DBus interface: [`org.freedesktop.portal.FileChooser`](https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.FileChooser.html).
#[derive(Debug)]
#[doc(alias = "org.freedesktop.portal.FileChooser")]
pub struct FileChooser<C: Transport = DBusTransport> {
    connection: Arc<PortalConnection<C>>,
    version: u32,
}

impl<C: Transport> FileChooser<C> {
    /// The version of the running portal.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Asks to open one or more files.
    ///
    /// # Arguments
    ///
    /// * `title` - Title for the file chooser dialog.
    /// * `identifier` - Identifier for the application window.
    /// * `options` - [`OpenFileOptions`].
    /// * `cancellation` - Cancels the request while it is pending.
    #[doc(alias = "OpenFile")]
    #[doc(alias = "xdp_portal_open_file")]
    pub async fn open_file(
        &self,
        title: &str,
        identifier: Option<&WindowIdentifier>,
        options: OpenFileOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response<SelectedFiles>> {
        require_version("OpenFile", 1, self.version)?;
        let handle_token = options.handle_token.clone();
        let choices = options.choices.clone();
        self.choose("OpenFile", title, identifier, &options, handle_token, choices, cancellation)
            .await
    }

    /// Asks for a location to save a file.
    ///
    /// # Arguments
    ///
    /// * `title` - Title for the file chooser dialog.
    /// * `identifier` - Identifier for the application window.
    /// * `options` - [`SaveFileOptions`].
    /// * `cancellation` - Cancels the request while it is pending.
    #[doc(alias = "SaveFile")]
    #[doc(alias = "xdp_portal_save_file")]
    pub async fn save_file(
        &self,
        title: &str,
        identifier: Option<&WindowIdentifier>,
        options: SaveFileOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response<SelectedFiles>> {
        require_version("SaveFile", 1, self.version)?;
        let handle_token = options.handle_token.clone();
        let choices = options.choices.clone();
        self.choose("SaveFile", title, identifier, &options, handle_token, choices, cancellation)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn choose<O>(
        &self,
        method: &'static str,
        title: &str,
        identifier: Option<&WindowIdentifier>,
        options: &O,
        handle_token: HandleToken,
        choices: Vec<Choice>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response<SelectedFiles>>
    where
        O: Serialize + Type + std::fmt::Debug + Sync,
    {
        let identifier = self.connection.window_identifier(identifier);
        let body = (identifier, title, options);
        let body = &body;
        let transport = self.connection.transport();
        self.connection
            .send_request(
                handle_token,
                Box::new(move |message: &Message| {
                    SelectedFiles::from_results(
                        decode_results::<SelectedFilesResults>(message)?,
                        &choices,
                    )
                }),
                cancellation,
                move || async move {
                    transport
                        .call::<OwnedObjectPath, _>(INTERFACE, method, body)
                        .await
                },
            )
            .await
    }
}

impl<C: Transport> Sealed for FileChooser<C> {}

impl<C: Transport> Portal<C> for FileChooser<C> {
    const INTERFACE: &'static str = INTERFACE;
    const NAME: &'static str = "FileChooser";

    fn new(connection: Arc<PortalConnection<C>>, version: u32) -> Self {
        Self {
            connection,
            version,
        }
    }

    fn slot(cache: &mut PortalCache<C>) -> &mut Option<Arc<Self>> {
        &mut cache.file_chooser
    }
}
