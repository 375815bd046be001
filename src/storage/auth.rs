//! Request signing
use std::fmt;

use chrono::prelude::*;
use dyn_clone::DynClone;
use hmac::{Hmac, Mac, NewMac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{
    header::{self, HeaderName, HeaderValue},
    Request,
};
use sha2::{Digest, Sha256};

use crate::error::Error;

type UTCTime = DateTime<Utc>;

/// Everything except the unreserved characters `A-Z a-z 0-9 - . _ ~`
pub(crate) const AWS_URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn uri_encode(s: &str) -> String {
    utf8_percent_encode(s, AWS_URI_ENCODE_SET).to_string()
}

pub trait Authorizer: Send + Sync + DynClone + fmt::Debug {
    /// This method will setup the header and put the authorize string
    fn authorize(&self, request: &mut Request, now: &UTCTime) -> Result<(), Error>;

    /// This method will be called once the region of the resource is known
    fn update_region(&mut self, _region: String) {}
}

dyn_clone::clone_trait_object!(Authorizer);

/// Anonymous access for public buckets
#[derive(Clone, Debug)]
pub struct PublicAuthorizer {}

impl Authorizer for PublicAuthorizer {
    fn authorize(&self, _request: &mut Request, _now: &UTCTime) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct V4Authorizer {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub service: String,
    pub action: String,
    pub auth_str: String,
}

impl fmt::Debug for V4Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V4Authorizer")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish()
    }
}

impl V4Authorizer {
    /// new V4 Authorizer for AWS, CEPH and Linode
    pub fn new(access_key: String, secret_key: String, region: String) -> Self {
        V4Authorizer {
            access_key,
            secret_key,
            region,
            service: "s3".to_string(),
            action: "aws4_request".to_string(),
            auth_str: "AWS4-HMAC-SHA256".to_string(),
        }
    }
}

impl Authorizer for V4Authorizer {
    fn authorize(&self, request: &mut Request, now: &UTCTime) -> Result<(), Error> {
        let SignatureInfo {
            signed_headers,
            signature,
        } = request.sign(
            &self.auth_str,
            now,
            &self.secret_key,
            &self.region,
            &self.service,
            &self.action,
        )?;
        let authorize_string = format!(
            "{} Credential={}/{}/{}/{}/{}, SignedHeaders={}, Signature={}",
            self.auth_str,
            self.access_key,
            now.format("%Y%m%d"),
            self.region,
            self.service,
            self.action,
            signed_headers,
            signature
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, authorize_string.parse()?);
        Ok(())
    }
    fn update_region(&mut self, region: String) {
        self.region = region;
    }
}

pub struct SignatureInfo {
    pub signed_headers: String,
    pub signature: String,
}

pub trait Canonical {
    /// (signed headers, canonical headers)
    fn canonical_headers(&self) -> (String, String);
    fn canonical_query_string(&self) -> String;
    /// (signed headers, canonical request)
    fn canonical_request(&self, payload_hash: &str) -> (String, String);
}

impl Canonical for Request {
    fn canonical_headers(&self) -> (String, String) {
        let mut canonical_headers = String::new();
        let mut signed_headers = Vec::new();

        let mut headers: Vec<(String, &str)> = self
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap_or_default()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, value) in headers {
            canonical_headers.push_str(&name);
            canonical_headers.push(':');
            canonical_headers.push_str(value.trim());
            canonical_headers.push('\n');
            signed_headers.push(name);
        }
        (signed_headers.join(";"), canonical_headers)
    }

    fn canonical_query_string(&self) -> String {
        let mut qs: Vec<(String, String)> = self
            .url()
            .query_pairs()
            .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
            .collect();
        qs.sort();
        qs.into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn canonical_request(&self, payload_hash: &str) -> (String, String) {
        let (signed_headers, canonical_headers) = self.canonical_headers();
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method().as_str(),
            self.url().path(),
            self.canonical_query_string(),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        (signed_headers, canonical_request)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub trait V4Signature
where
    Self: Canonical,
{
    /// calculate the payload hash and update header
    fn payload_sha256(&mut self) -> Result<String, Error>;
    fn string_to_sign(
        &mut self,
        auth_str: &str,
        now: &UTCTime,
        region: &str,
        service: &str,
        action: &str,
    ) -> Result<(String, String), Error>;
    fn sign(
        &mut self,
        auth_str: &str,
        now: &UTCTime,
        sign_key: &str,
        region: &str,
        service: &str,
        action: &str,
    ) -> Result<SignatureInfo, Error>;
}

impl V4Signature for Request {
    fn payload_sha256(&mut self) -> Result<String, Error> {
        let payload = self
            .body()
            .and_then(|b| b.as_bytes())
            .unwrap_or_default();
        let payload_hash = hex::encode(Sha256::digest(payload));
        self.headers_mut().insert(
            HeaderName::from_static("x-amz-content-sha256"),
            HeaderValue::from_str(&payload_hash)?,
        );
        Ok(payload_hash)
    }

    fn string_to_sign(
        &mut self,
        auth_str: &str,
        now: &UTCTime,
        region: &str,
        service: &str,
        action: &str,
    ) -> Result<(String, String), Error> {
        let iso_8601_str = now.format("%Y%m%dT%H%M%SZ").to_string();
        self.headers_mut().insert(
            HeaderName::from_static("x-amz-date"),
            HeaderValue::from_str(&iso_8601_str)?,
        );
        let payload_hash = self.payload_sha256()?;
        let (signed_headers, canonical_request) = self.canonical_request(&payload_hash);
        Ok((
            signed_headers,
            format!(
                "{}\n{}\n{}/{}/{}/{}\n{}",
                auth_str,
                iso_8601_str,
                &iso_8601_str[..8],
                region,
                service,
                action,
                hex::encode(Sha256::digest(canonical_request.as_bytes()))
            ),
        ))
    }

    fn sign(
        &mut self,
        auth_str: &str,
        now: &UTCTime,
        sign_key: &str,
        region: &str,
        service: &str,
        action: &str,
    ) -> Result<SignatureInfo, Error> {
        let (signed_headers, string_to_sign) =
            self.string_to_sign(auth_str, now, region, service, action)?;

        let mut key: String = auth_str.split('-').next().unwrap_or_default().to_string();
        key.push_str(sign_key);

        let date_key = hmac_sha256(key.as_bytes(), now.format("%Y%m%d").to_string().as_bytes());
        let region_key = hmac_sha256(&date_key, region.as_bytes());
        let service_key = hmac_sha256(&region_key, service.as_bytes());
        let signing_key = hmac_sha256(&service_key, action.as_bytes());

        Ok(SignatureInfo {
            signed_headers,
            signature: hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())),
        })
    }
}
