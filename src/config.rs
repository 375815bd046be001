//! Loading the storage configuration from `config.yml`
//!
//! ```yaml
//! endpoint: eu-central-1.linodeobjects.com
//! accessKey: XXXXXXXXXXXXXXXXXXXX
//! secretKey: XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX
//! useSSL: true
//! ```
//!
//! Every field is optional, and `BUCKETCTL_*` environment variables take precedence over the
//! file.
use std::fs::read_to_string;
use std::path::Path;

use log::{debug, warn};
use serde_derive::Deserialize;

use crate::error::Error;
use crate::storage::UrlStyle;

pub static DEFAULT_CONFIG_FILE: &str = "config.yml";
pub static DEFAULT_ENDPOINT: &str = "us-east-1.linodeobjects.com";
static ENV_PREFIX: &str = "BUCKETCTL_";

/// # The storage configuration
/// - endpoint is the S3 host without scheme, for example us-east-1.linodeobjects.com or
/// 10.1.1.100:7480 for a ceph node
/// - access_key and secret_key are the keys to sign requests, the requests are anonymous if both
/// are empty
/// - use_ssl decides https or http
/// - region is used for signing, it will be looked up from the bucket if not specified
/// - url_style is the request url style, path style works with most S3 compatible services
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default, rename = "accessKey", alias = "accesskey", alias = "access_key")]
    pub access_key: String,
    #[serde(default, rename = "secretKey", alias = "secretkey", alias = "secret_key")]
    pub secret_key: String,
    #[serde(
        default = "default_use_ssl",
        rename = "useSSL",
        alias = "usessl",
        alias = "use_ssl"
    )]
    pub use_ssl: bool,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "urlStyle", alias = "urlstyle", alias = "url_style")]
    pub url_style: UrlStyle,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_use_ssl() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: default_endpoint(),
            access_key: String::new(),
            secret_key: String::new(),
            use_ssl: default_use_ssl(),
            region: None,
            url_style: UrlStyle::default(),
        }
    }
}

impl Config {
    /// Load the config file and apply the environment overrides.
    /// A missing file is not an error, all the defaults are taken.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            debug!("loading config from {}", path.display());
            Self::from_yaml(&read_to_string(path)?)?
        } else {
            warn!("{} not found, using default config", path.display());
            Config::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override fields with `BUCKETCTL_ENDPOINT`, `BUCKETCTL_ACCESS_KEY`,
    /// `BUCKETCTL_SECRET_KEY`, `BUCKETCTL_USE_SSL` and `BUCKETCTL_REGION`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        if let Some(endpoint) = var("ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(access_key) = var("ACCESS_KEY") {
            self.access_key = access_key;
        }
        if let Some(secret_key) = var("SECRET_KEY") {
            self.secret_key = secret_key;
        }
        if let Some(use_ssl) = var("USE_SSL") {
            self.use_ssl = match use_ssl.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(Error::UserError("BUCKETCTL_USE_SSL should be true or false")),
            };
        }
        if let Some(region) = var("REGION") {
            self.region = Some(region);
        }
        Ok(())
    }
}
