//! Open options, access modes and creation attributes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a byte channel is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenOption {
    Read,
    Write,
    Append,
    TruncateExisting,
    Create,
    CreateNew,
    DeleteOnClose,
    Sparse,
    Sync,
    Dsync,
}

/// Access checked by [`crate::ProviderRegistry::check_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

/// An attribute requested to be set atomically when a file is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationAttribute {
    pub name: String,
    pub value: String,
}

impl CreationAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Accept only a plain read: no options, or exactly `Read`, and no creation
/// attributes.
pub fn check_read_only_open(options: &[OpenOption], attrs: &[CreationAttribute]) -> Result<()> {
    if !attrs.is_empty() {
        return Err(Error::unsupported(format!(
            "creation attributes on open: {}",
            attrs
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    match options {
        [] | [OpenOption::Read] => Ok(()),
        other => Err(Error::unsupported(format!("open options {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_read_is_accepted() {
        assert!(check_read_only_open(&[], &[]).is_ok());
        assert!(check_read_only_open(&[OpenOption::Read], &[]).is_ok());
    }

    #[test]
    fn write_intents_are_rejected() {
        for options in [
            vec![OpenOption::Write],
            vec![OpenOption::Read, OpenOption::Write],
            vec![OpenOption::Append],
            vec![OpenOption::Create],
            vec![OpenOption::Read, OpenOption::Read],
        ] {
            let err = check_read_only_open(&options, &[]).unwrap_err();
            assert!(matches!(err, Error::Unsupported { .. }), "{:?}", options);
        }
    }

    #[test]
    fn creation_attributes_are_rejected() {
        let err = check_read_only_open(
            &[OpenOption::Read],
            &[CreationAttribute::new("posix:permissions", "rw-r--r--")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("posix:permissions"));
    }
}
