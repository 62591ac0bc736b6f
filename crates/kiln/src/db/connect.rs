use kiln_core::{
    driver::{Capability, Connection, Driver},
    Error, Result,
};

use url::Url;

/// A driver chosen by the scheme of a connection URL.
#[derive(Debug)]
pub struct Connect {
    url: Url,
    driver: Box<dyn Driver>,
}

impl Connect {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(anyhow::Error::from)?;
        let driver = match url.scheme() {
            "sqlite" => connect_sqlite(&url)?,
            scheme => {
                return Err(Error::from_args(format_args!(
                    "unsupported database; scheme={scheme}; url={url}"
                )))
            }
        };
        Ok(Self { url, driver })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Driver for Connect {
    fn capability(&self) -> &Capability {
        self.driver.capability()
    }

    fn connect(&self) -> Result<Box<dyn Connection>> {
        self.driver.connect()
    }

    fn max_connections(&self) -> Option<usize> {
        self.driver.max_connections()
    }
}

#[cfg(feature = "sqlite")]
fn connect_sqlite(url: &Url) -> Result<Box<dyn Driver>> {
    Ok(Box::new(kiln_driver_sqlite::Sqlite::new(url.as_str())?))
}

#[cfg(not(feature = "sqlite"))]
fn connect_sqlite(_url: &Url) -> Result<Box<dyn Driver>> {
    Err(anyhow::anyhow!("`sqlite` feature not enabled").into())
}
