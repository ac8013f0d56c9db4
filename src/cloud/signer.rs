//! OCI HTTP request signatures (`rsa-sha256` over a fixed header list).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};

use super::{CloudError, CloudResult};
use crate::oci_config::OciProfile;

pub const JSON_CONTENT_TYPE: &str = "application/json";

const HEADERS_WITHOUT_BODY: &str = "date (request-target) host";
const HEADERS_WITH_BODY: &str =
    "date (request-target) host content-length content-type x-content-sha256";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyHeaders {
    pub content_length: usize,
    pub content_type: &'static str,
    pub content_sha256: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub authorization: String,
    pub body: Option<BodyHeaders>,
}

#[derive(Clone)]
pub struct RequestSigner {
    key_id: String,
    key: SigningKey<Sha256>,
}

impl RequestSigner {
    pub fn from_profile(profile: &OciProfile) -> CloudResult<Self> {
        let pem = std::fs::read_to_string(&profile.key_file).map_err(|err| {
            CloudError::Signing(format!(
                "unable to read key file {}: {err}",
                profile.key_file.display()
            ))
        })?;
        Self::from_pem(profile.key_id(), &pem)
    }

    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> CloudResult<Self> {
        if pem.contains("ENCRYPTED") {
            return Err(CloudError::Signing(
                "encrypted private keys are not supported; export an unencrypted API key".into(),
            ));
        }
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|err| CloudError::Signing(format!("invalid RSA private key: {err}")))?;
        Ok(Self {
            key_id: key_id.into(),
            key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request stamped with the current time.
    pub fn sign(
        &self,
        method: &str,
        host: &str,
        path_and_query: &str,
        body: Option<&[u8]>,
    ) -> SignedHeaders {
        self.sign_at(&http_date(chrono::Utc::now()), method, host, path_and_query, body)
    }

    pub fn sign_at(
        &self,
        date: &str,
        method: &str,
        host: &str,
        path_and_query: &str,
        body: Option<&[u8]>,
    ) -> SignedHeaders {
        let body = body.map(|bytes| BodyHeaders {
            content_length: bytes.len(),
            content_type: JSON_CONTENT_TYPE,
            content_sha256: STANDARD.encode(Sha256::digest(bytes)),
        });
        let plaintext = signing_string(date, method, host, path_and_query, body.as_ref());
        let signature = STANDARD.encode(self.key.sign(plaintext.as_bytes()).to_bytes());
        let headers = if body.is_some() {
            HEADERS_WITH_BODY
        } else {
            HEADERS_WITHOUT_BODY
        };
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{headers}\",signature=\"{signature}\"",
            self.key_id
        );
        SignedHeaders {
            date: date.to_string(),
            authorization,
            body,
        }
    }
}

pub fn signing_string(
    date: &str,
    method: &str,
    host: &str,
    path_and_query: &str,
    body: Option<&BodyHeaders>,
) -> String {
    let mut lines = vec![
        format!("date: {date}"),
        format!(
            "(request-target): {} {path_and_query}",
            method.to_ascii_lowercase()
        ),
        format!("host: {host}"),
    ];
    if let Some(body) = body {
        lines.push(format!("content-length: {}", body.content_length));
        lines.push(format!("content-type: {}", body.content_type));
        lines.push(format!("x-content-sha256: {}", body.content_sha256));
    }
    lines.join("\n")
}

/// RFC 1123 date as required by the `date` header.
pub fn http_date(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
