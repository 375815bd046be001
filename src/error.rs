//! Error management module

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("load error: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),
    #[error("xml parse error: {0}")]
    XMLParseError(#[from] quick_xml::Error),
    #[error("{0}")]
    UserError(&'static str),
    #[error("invalid endpoint {0:?}: {1}")]
    EndpointError(String, &'static str),
    #[error("request error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("header value error: {0}")]
    HeaderError(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server responded {status}: {code} {message}")]
    ServerError {
        status: u16,
        code: String,
        message: String,
    },
    #[error("{0} is a directory")]
    IsDirectoryError(String),
    #[error("object key {0:?} does not map to a file under the destination")]
    ObjectPathError(String),
}

impl From<&'static str> for Error {
    fn from(s: &'static str) -> Self {
        Error::UserError(s)
    }
}
