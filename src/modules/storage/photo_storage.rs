//! S3-compatible storage for report photos
//!
//! Photos are written once under a fresh key and read anonymously through
//! their public URL, so the bucket carries a public-read policy.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::core::config::StorageConfig;
use crate::core::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Object storage that hands back a globally addressable reference
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Store `data` under `key` and return its public URL
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String>;
}

pub struct S3PhotoStorage {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    public_endpoint: String,
    access_key: String,
    secret_key: String,
    region_name: String,
    /// HTTP client for bucket policy operations
    http_client: Client,
}

impl S3PhotoStorage {
    /// Connect to the bucket, creating it and opening it for public reads if needed.
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create storage credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Storage(format!("Failed to open bucket: {}", e)))?;

        // Path-style URLs (http://endpoint/bucket) work for MinIO and hosted S3 alike
        bucket.set_path_style();

        let http_client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let storage = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
            public_endpoint: config.public_endpoint,
            access_key: config.access_key,
            secret_key: config.secret_key,
            region_name: config.region,
            http_client,
        };

        storage.ensure_bucket_exists().await;
        storage.set_public_read_policy().await;

        info!(
            "Photo storage ready: endpoint={}, bucket={}",
            storage.endpoint,
            storage.bucket.name()
        );

        Ok(storage)
    }

    /// Create the bucket unless it is already there
    async fn ensure_bucket_exists(&self) {
        match self.create_bucket().await {
            Ok(_) => info!("Bucket '{}' created", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    // Hosted stores often forbid CreateBucket for anonymous-ish keys
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let response = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        if !response.success() {
            return Err(AppError::Storage(format!(
                "{} - {}",
                response.response_code, response.response_text
            )));
        }

        Ok(())
    }

    /// Allow anonymous `GetObject` on every photo in the bucket
    async fn set_public_read_policy(&self) {
        let bucket_name = self.bucket.name();

        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": {"AWS": "*"},
                    "Action": ["s3:GetObject"],
                    "Resource": [format!("arn:aws:s3:::{bucket_name}/*")]
                }
            ]
        });

        match self
            .put_bucket_policy_with_sigv4(&bucket_name, &policy.to_string())
            .await
        {
            Ok(_) => info!("Public read policy set for '{}'", bucket_name),
            Err(e) => warn!(
                "Failed to set bucket policy for '{}': {}. Photo URLs will not resolve \
                 until the bucket allows anonymous reads.",
                bucket_name, e
            ),
        }
    }

    /// `PUT /<bucket>?policy`, signed with SigV4 since rust-s3 has no policy call
    async fn put_bucket_policy_with_sigv4(&self, bucket_name: &str, policy: &str) -> Result<()> {
        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let endpoint_url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::Storage(format!("Invalid endpoint URL: {}", e)))?;
        let host = match (endpoint_url.host_str(), endpoint_url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(AppError::Storage("Endpoint URL has no host".to_string())),
        };
        let payload_hash = sha256_hex(policy.as_bytes());

        let headers = [
            ("host", host.as_str()),
            ("x-amz-content-sha256", payload_hash.as_str()),
            ("x-amz-date", amz_date.as_str()),
        ];
        let request = canonical_request(
            "PUT",
            &format!("/{}", bucket_name),
            "policy=",
            &headers,
            &payload_hash,
        );
        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region_name);
        let signature = sigv4_signature(
            &self.secret_key,
            &date_stamp,
            &self.region_name,
            &string_to_sign(&amz_date, &scope, &request),
        )?;
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            SIGV4_ALGORITHM,
            self.access_key,
            scope,
            signed_headers(&headers),
            signature
        );

        let response = self
            .http_client
            .put(format!("{}/{}?policy", self.endpoint, bucket_name))
            .header("Host", &host)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header("Authorization", authorization)
            .header("Content-Type", "application/json")
            .body(policy.to_string())
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to send policy request: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Storage(format!(
            "Bucket policy rejected: {} {}",
            status, body
        )))
    }

    /// Direct URL for an object, served through the public endpoint
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_endpoint, self.bucket.name(), key)
    }
}

#[async_trait]
impl PhotoStorage for S3PhotoStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        let size = data.len();
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload '{}': {}", key, e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Storage(format!(
                "Upload of '{}' rejected with status {}",
                key, status
            )));
        }

        debug!(
            "Uploaded '{}' ({} bytes) to bucket '{}'",
            key,
            size,
            self.bucket.name()
        );
        Ok(self.public_url(key))
    }
}

const SIGV4_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// `headers` must be lowercase and sorted by name
fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
) -> String {
    let header_block: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        path,
        query,
        header_block,
        signed_headers(headers),
        payload_hash
    )
}

fn signed_headers(headers: &[(&str, &str)]) -> String {
    headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";")
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        SIGV4_ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    )
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SigV4 signature of `string_to_sign` for the S3 service
fn sigv4_signature(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    string_to_sign: &str,
) -> Result<String> {
    let mut key = format!("AWS4{}", secret_key).into_bytes();
    for part in [date_stamp, region, "s3", "aws4_request"] {
        key = hmac_sha256(&key, part.as_bytes())?;
    }
    Ok(hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    // GET Object example from the AWS S3 SigV4 header-auth documentation
    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";
    const EMPTY_PAYLOAD_HASH: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn example_request() -> String {
        let headers = [
            ("host", "examplebucket.s3.amazonaws.com"),
            ("range", "bytes=0-9"),
            ("x-amz-content-sha256", EMPTY_PAYLOAD_HASH),
            ("x-amz-date", "20130524T000000Z"),
        ];
        canonical_request("GET", "/test.txt", "", &headers, EMPTY_PAYLOAD_HASH)
    }

    #[test]
    fn test_empty_payload_hash() {
        assert_eq!(sha256_hex(b""), EMPTY_PAYLOAD_HASH);
    }

    #[test]
    fn test_canonical_request_matches_aws_example() {
        let request = example_request();
        assert!(request.starts_with("GET\n/test.txt\n\nhost:examplebucket.s3.amazonaws.com\n"));
        assert!(request.contains("\n\nhost;range;x-amz-content-sha256;x-amz-date\n"));
        assert_eq!(
            sha256_hex(request.as_bytes()),
            "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972"
        );
    }

    #[test]
    fn test_signature_matches_aws_example() {
        let to_sign = string_to_sign(
            "20130524T000000Z",
            "20130524/us-east-1/s3/aws4_request",
            &example_request(),
        );
        let signature =
            sigv4_signature(EXAMPLE_SECRET, "20130524", "us-east-1", &to_sign).unwrap();
        assert_eq!(
            signature,
            "f0e8bdb87c964420e857bd35b5d6ed310bd44f0170aba48dd91039c6036bdb41"
        );
    }

    #[test]
    fn test_signature_depends_on_region() {
        let a = sigv4_signature("secret", "20250101", "us-east-1", "payload").unwrap();
        let b = sigv4_signature("secret", "20250101", "eu-west-1", "payload").unwrap();
        assert_ne!(a, b);
    }
}
