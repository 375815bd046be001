use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::prelude::*;
use log::{debug, info, warn};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, Method, Request, Response, Url,
};
use tokio::fs::{create_dir_all, metadata, remove_file, rename, File};
use tokio::io::AsyncWriteExt;

use super::auth::{uri_encode, Authorizer, PublicAuthorizer, V4Authorizer};
use super::xml::{error_xml_parser, list_objects_v2_parser, location_xml_parser};
use super::{ObjectListing, ObjectRecord, ObjectStore, UrlStyle, DEFAULT_REGION};
use crate::config::Config;
use crate::error::Error;

type UTCTime = DateTime<Utc>;

/// The S3 backend of [`ObjectStore`]
#[derive(Clone, Debug)]
pub struct S3Store {
    pub host: String,
    /// To use https or not, please note that integrity is secured by S3 protocol.
    pub secure: bool,
    pub url_style: UrlStyle,
    pub region: String,

    client: Client,

    pub authorizer: Box<dyn Authorizer>,
}

impl S3Store {
    /// An anonymous store, the endpoint is a host with optional port and without scheme
    pub fn new(host: String) -> Result<Self, Error> {
        validate_endpoint(&host)?;
        Ok(S3Store {
            host,
            secure: false,
            url_style: UrlStyle::PATH,
            region: DEFAULT_REGION.to_string(),
            client: Client::builder().build()?,
            authorizer: Box::new(PublicAuthorizer {}),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut store = S3Store::new(config.endpoint.clone())?
            .secure(config.use_ssl)
            .url_style(config.url_style);
        if let Some(region) = &config.region {
            store.region = region.clone();
        }
        if !config.access_key.is_empty() || !config.secret_key.is_empty() {
            store = store.aws_v4(config.access_key.clone(), config.secret_key.clone());
        }
        Ok(store)
    }

    pub fn aws_v4(mut self, access_key: String, secret_key: String) -> Self {
        self.authorizer = Box::new(V4Authorizer::new(
            access_key,
            secret_key,
            self.region.clone(),
        ));
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn url_style(mut self, url_style: UrlStyle) -> Self {
        self.url_style = url_style;
        self
    }

    pub fn set_region(&mut self, region: String) {
        self.authorizer.update_region(region.clone());
        self.region = region;
    }

    /// (url without query, the host header)
    pub fn endpoint_and_virturalhost(&self, bucket: &str, key: Option<&str>) -> (String, String) {
        let scheme = if self.secure { "https" } else { "http" };
        let path = key
            .map(|k| {
                k.split('/')
                    .map(uri_encode)
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();
        match self.url_style {
            UrlStyle::PATH => (
                format!("{}://{}/{}/{}", scheme, self.host, bucket, path),
                self.host.clone(),
            ),
            UrlStyle::HOST => {
                let virtural_host = format!("{}.{}", bucket, self.host);
                (
                    format!("{}://{}/{}", scheme, virtural_host, path),
                    virtural_host,
                )
            }
        }
    }

    pub fn init_headers(&self, headers: &mut HeaderMap, host: &str) -> Result<(), Error> {
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("bucketctl/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(header::HOST, HeaderValue::from_str(host)?);
        Ok(())
    }

    /// Build, sign and send a GET request, non 2xx responses turn into `Error::ServerError`
    async fn get(
        &self,
        bucket: &str,
        key: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Response, Error> {
        let (endpoint, host) = self.endpoint_and_virturalhost(bucket, key);
        let url = if query.is_empty() {
            Url::parse(&endpoint)?
        } else {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            Url::parse(&format!("{}?{}", endpoint, qs))?
        };
        debug!("GET {}", url);

        let mut request = Request::new(Method::GET, url);
        let now: UTCTime = Utc::now();
        self.init_headers(request.headers_mut(), &host)?;
        self.authorizer.authorize(&mut request, &now)?;

        let response = self.client.execute(request).await?;
        debug!("Status: {}", response.status());
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            debug!("Body:\n{}", body);
            let (code, message) = error_xml_parser(&body);
            Err(Error::ServerError {
                status,
                code,
                message,
            })
        }
    }

    /// Look up the region of a bucket with GetBucketLocation
    pub async fn bucket_region(&self, bucket: &str) -> Result<String, Error> {
        let body = self
            .get(bucket, None, &[("location", "")])
            .await?
            .text()
            .await?;
        Ok(location_xml_parser(&body)?.unwrap_or_else(|| DEFAULT_REGION.to_string()))
    }

    async fn stream_to_file(&self, mut response: Response, path: &Path) -> Result<(), Error> {
        let mut file = File::create(path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// The endpoint should be `host[:port]`
fn validate_endpoint(host: &str) -> Result<(), Error> {
    if host.is_empty() {
        return Err(Error::EndpointError(host.to_string(), "endpoint is empty"));
    }
    if host.contains("://") {
        return Err(Error::EndpointError(
            host.to_string(),
            "endpoint should not carry a scheme, use useSSL instead",
        ));
    }
    if host.contains('/') {
        return Err(Error::EndpointError(
            host.to_string(),
            "endpoint should not carry a path",
        ));
    }
    Url::parse(&format!("http://{}/", host))
        .map_err(|_| Error::EndpointError(host.to_string(), "endpoint is not a valid host"))?;
    Ok(())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Box<dyn ObjectListing>, Error> {
        Ok(Box::new(S3Listing {
            store: self.clone(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            recursive,
            objects: Vec::new(),
            continuation_token: None,
            exhausted: false,
        }))
    }

    async fn fget_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), Error> {
        if let Ok(m) = metadata(path).await {
            if m.is_dir() {
                return Err(Error::IsDirectoryError(path.display().to_string()));
            }
        }
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }

        let response = self.get(bucket, Some(key), &[]).await?;

        let mut part_path = path.as_os_str().to_owned();
        part_path.push(".part");
        let part_path = PathBuf::from(part_path);
        if let Err(e) = self.stream_to_file(response, &part_path).await {
            if remove_file(&part_path).await.is_err() {
                warn!("can not clean up {}", part_path.display());
            }
            return Err(e);
        }
        rename(&part_path, path).await?;
        info!("{} saved to {}", key, path.display());
        Ok(())
    }
}

/// A ListObjectsV2 traversal, one page is kept and the next page is requested once it is drained
#[derive(Debug)]
pub struct S3Listing {
    store: S3Store,
    bucket: String,
    prefix: String,
    recursive: bool,

    /// records of the current page in reversed order
    objects: Vec<ObjectRecord>,
    continuation_token: Option<String>,
    exhausted: bool,
}

impl S3Listing {
    async fn fetch_page(&mut self) -> Result<(), Error> {
        let mut query = vec![("list-type", "2"), ("prefix", self.prefix.as_str())];
        if !self.recursive {
            query.push(("delimiter", "/"));
        }
        let token = self.continuation_token.take();
        if let Some(t) = token.as_deref() {
            query.push(("continuation-token", t));
        }
        let body = self
            .store
            .get(&self.bucket, None, &query)
            .await?
            .text()
            .await?;
        let page = list_objects_v2_parser(&body)?;
        debug!(
            "page of {} objects and {} prefixes, truncated: {}",
            page.objects.len(),
            page.common_prefixes.len(),
            page.is_truncated
        );

        if page.is_truncated && page.next_continuation_token.is_none() {
            return Err(Error::UserError(
                "listing is truncated but no continuation token was given",
            ));
        }

        let mut records = page.objects;
        records.extend(
            page.common_prefixes
                .into_iter()
                .map(|p| ObjectRecord::new(p, 0)),
        );
        records.reverse();
        self.objects = records;

        match page.next_continuation_token {
            Some(t) if page.is_truncated => self.continuation_token = Some(t),
            _ => self.exhausted = true,
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectListing for S3Listing {
    async fn next_object(&mut self) -> Result<Option<ObjectRecord>, Error> {
        while self.objects.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            if let Err(e) = self.fetch_page().await {
                self.exhausted = true;
                return Err(e);
            }
        }
        Ok(self.objects.pop())
    }
}
