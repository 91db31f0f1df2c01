use anyhow::Result;
use object_store::{
    ObjectStore, aws::AmazonS3Builder, azure::MicrosoftAzureBuilder,
    gcp::GoogleCloudStorageBuilder, local::LocalFileSystem, memory::InMemory,
};
use std::sync::Arc;
use url::Url;

use crate::config::StorageConfig;

/// Create an object store from storage configuration
pub fn create_object_store(storage_config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    create_object_store_from_dsn(&storage_config.dsn)
}

/// Create an object store from a DSN string
pub fn create_object_store_from_dsn(dsn: &str) -> Result<Arc<dyn ObjectStore>> {
    let url =
        Url::parse(dsn).map_err(|e| anyhow::anyhow!("Invalid storage DSN '{}': {}", dsn, e))?;

    match url.scheme() {
        "file" => {
            // Extract path from file:// URL
            let path = url.path();
            if path.is_empty() || path == "/" {
                return Err(anyhow::anyhow!(
                    "File DSN must specify a path: file:///path/to/storage"
                ));
            }
            Ok(Arc::new(LocalFileSystem::new_with_prefix(path)?))
        }
        "memory" => Ok(Arc::new(InMemory::new())),
        "s3" => {
            let builder = create_s3_builder_from_dsn(&url)?;
            Ok(Arc::new(builder.build()?))
        }
        "az" => {
            let builder = create_azure_builder_from_dsn(&url)?;
            Ok(Arc::new(builder.build()?))
        }
        "gs" => {
            let builder = create_gcs_builder_from_dsn(&url)?;
            Ok(Arc::new(builder.build()?))
        }
        scheme => Err(anyhow::anyhow!(
            "Unsupported storage scheme: {}. Supported: file, memory, s3, az, gs",
            scheme
        )),
    }
}

/// Create an S3 builder from a DSN
/// DSN format: s3://[access_key:secret_key@]host[:port]/bucket
pub fn create_s3_builder_from_dsn(dsn: &Url) -> Result<AmazonS3Builder> {
    let host = dsn
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Missing S3 host in DSN"))?;
    let port = dsn.port();
    let bucket = dsn.path().trim_start_matches('/');

    if bucket.is_empty() {
        return Err(anyhow::anyhow!(
            "S3 DSN must specify a bucket: s3://host/bucket"
        ));
    }

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region("us-east-1"); // Default region

    // Extract credentials from DSN if present
    let access_key = dsn.username();
    let secret_key = dsn.password().unwrap_or("");

    if !access_key.is_empty() {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);
    }

    // Determine if this is real S3 or S3-compatible (MinIO, etc)
    let endpoint = if host.contains("amazonaws.com") {
        // Real S3 - no custom endpoint needed
        None
    } else {
        // S3-compatible - need custom endpoint
        let scheme = if port == Some(443) { "https" } else { "http" };
        Some(match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        })
    };

    if let Some(endpoint) = endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false); // MinIO requires path-style URLs
    }

    // Check environment for AWS credentials if not in DSN
    if access_key.is_empty() {
        if let Ok(env_key) = std::env::var("AWS_ACCESS_KEY_ID") {
            builder = builder.with_access_key_id(env_key);
        }
        if let Ok(env_secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            builder = builder.with_secret_access_key(env_secret);
        }
        if let Ok(env_region) = std::env::var("AWS_DEFAULT_REGION") {
            builder = builder.with_region(env_region);
        }
    }

    Ok(builder)
}

/// Create an Azure blob builder from a DSN
/// DSN format: az://[account:access_key@]container
pub fn create_azure_builder_from_dsn(dsn: &Url) -> Result<MicrosoftAzureBuilder> {
    let container = dsn
        .host_str()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Azure DSN must specify a container: az://container"))?;

    // AZURE_STORAGE_* environment variables supply anything the DSN omits
    let mut builder = MicrosoftAzureBuilder::from_env().with_container_name(container);

    let account = dsn.username();
    if !account.is_empty() {
        builder = builder.with_account(account);
        if let Some(access_key) = dsn.password() {
            builder = builder.with_access_key(access_key);
        }
    }

    Ok(builder)
}

/// Create a Google Cloud Storage builder from a DSN
/// DSN format: gs://bucket
pub fn create_gcs_builder_from_dsn(dsn: &Url) -> Result<GoogleCloudStorageBuilder> {
    let bucket = dsn
        .host_str()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| anyhow::anyhow!("GCS DSN must specify a bucket: gs://bucket"))?;

    // GOOGLE_SERVICE_ACCOUNT et al. come from the environment
    Ok(GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket))
}
