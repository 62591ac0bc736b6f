use super::Error;

/// Error when a query join fetches more than one bag.
///
/// Bags carry no row discriminator, so the cartesian product of two bag
/// fetches cannot be split back into the individual collections.
#[derive(Debug)]
pub(super) struct MultipleBagFetchError {
    roles: Vec<String>,
}

impl std::error::Error for MultipleBagFetchError {}

impl core::fmt::Display for MultipleBagFetchError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "cannot simultaneously fetch multiple bags: [{}]",
            self.roles.join(", ")
        )
    }
}

impl Error {
    /// Creates a multiple bag fetch error listing the offending collection roles.
    pub fn multiple_bag_fetch(roles: Vec<String>) -> Error {
        Error::from(super::ErrorKind::MultipleBagFetch(MultipleBagFetchError {
            roles,
        }))
    }

    /// Returns `true` if this error is a multiple bag fetch error.
    pub fn is_multiple_bag_fetch(&self) -> bool {
        self.any(|kind| matches!(kind, super::ErrorKind::MultipleBagFetch(_)))
    }

    /// Returns the collection roles of a multiple bag fetch error.
    pub fn bag_roles(&self) -> Option<&[String]> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::MultipleBagFetch(err) => Some(&err.roles[..]),
            _ => None,
        })
    }
}
