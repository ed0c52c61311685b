//! JSON payloads exchanged with the store

use serde::{Deserialize, Serialize};

use crate::error::{FdsError, FdsResult};

const GALAXY_ACCESS_KEY_ID: &str = "GalaxyAccessKeyId";
const EXPIRES: &str = "Expires";
const SIGNATURE: &str = "Signature";

/// Body of a successful init call
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct InitMultipartUploadResult {
    pub bucket_name: Option<String>,
    pub object_name: Option<String>,
    pub upload_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadPartResult {
    pub part_number: u32,
    pub part_size: u64,
    pub etag: String,
}

impl UploadPartResult {
    pub fn is_valid(&self) -> bool {
        !self.etag.is_empty() && self.part_size != 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadPartResultList {
    pub upload_part_result_list: Vec<UploadPartResult>,
}

/// Final result of an upload, with the presigned access descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PutObjectResult {
    pub bucket_name: String,
    pub object_name: String,
    pub access_key_id: String,
    pub signature: String,
    pub expires: i64,
    pub fds_service_base_uri: String,
    pub cdn_service_base_uri: String,
}

impl PutObjectResult {
    pub(crate) fn validate(self, bucket: &str, object: &str) -> FdsResult<Self> {
        if self.access_key_id.is_empty() || self.signature.is_empty() || self.expires == 0 {
            return Err(FdsError::Protocol {
                operation: "complete multipart upload",
                bucket: bucket.to_string(),
                object: object.to_string(),
                reason: "missing access key id, signature or expires".to_string(),
            });
        }
        Ok(self)
    }

    pub fn relative_presigned_uri(&self) -> String {
        format!(
            "/{}/{}?{}={}&{}={}&{}={}",
            self.bucket_name,
            self.object_name,
            GALAXY_ACCESS_KEY_ID,
            self.access_key_id,
            EXPIRES,
            self.expires,
            SIGNATURE,
            self.signature
        )
    }

    pub fn absolute_presigned_uri(&self) -> String {
        format!("{}{}", self.fds_service_base_uri, self.relative_presigned_uri())
    }

    pub fn cdn_presigned_uri(&self) -> String {
        format!("{}{}", self.cdn_service_base_uri, self.relative_presigned_uri())
    }
}

/// Short-lived token returned by the OAuth exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageAccessToken {
    pub token: String,
    pub expire_time: i64,
}
