use std::{
    ffi::{CString, OsStr},
    os::unix::ffi::OsStrExt,
    path::Path,
};

use serde::{Deserialize, Serialize};
use zbus::zvariant::Type;

use crate::Error;

/// A file name sent to a portal, represented as a nul-terminated byte array.
#[derive(Type, Clone, Debug, Default, PartialEq, Eq)]
#[zvariant(signature = "ay")]
pub struct FilePath(CString);

impl AsRef<Path> for FilePath {
    fn as_ref(&self) -> &Path {
        OsStr::from_bytes(self.0.as_bytes()).as_ref()
    }
}

impl FilePath {
    /// Fails with [`Error::InvalidArgument`] if the path contains a nul byte.
    pub(crate) fn new<T: AsRef<Path>>(path: T) -> Result<Self, Error> {
        let path = path.as_ref();
        let c_string = CString::new(path.as_os_str().as_bytes()).map_err(|err| {
            Error::InvalidArgument(format!(
                "{} has a nul byte at {}",
                path.display(),
                err.nul_position()
            ))
        })?;
        Ok(Self(c_string))
    }
}

impl Serialize for FilePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(self.0.as_bytes_with_nul())
    }
}

impl<'de> Deserialize<'de> for FilePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        let c_string = CString::from_vec_with_nul(bytes)
            .map_err(|_| serde::de::Error::custom("Bytes are not nul-terminated"))?;

        Ok(Self(c_string))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::FilePath;
    use crate::Error;

    #[test]
    fn nul_terminated() {
        let path = FilePath::new("/tmp/abc").unwrap();
        assert_eq!(path.as_ref(), Path::new("/tmp/abc"));

        let json = serde_json::to_string(&FilePath::new("abc").unwrap()).unwrap();
        assert_eq!(json, "[97,98,99,0]");
        assert_eq!(
            serde_json::from_str::<FilePath>(&json).unwrap(),
            FilePath::new("abc").unwrap()
        );
        assert!(serde_json::from_str::<FilePath>("[97,98,99]").is_err());
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(
            FilePath::new("a\0b"),
            Err(Error::InvalidArgument(_))
        ));
    }
}
