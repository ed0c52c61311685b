//! Object model types and wire payloads

mod metadata;
mod object;
mod param;
mod wire;

pub use metadata::{
    ObjectMetadata, APPLICATION_OCTET_STREAM, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH,
    CONTENT_MD5, CONTENT_TYPE, ESTIMATED_OBJECT_SIZE, LAST_MODIFIED, XIAOMI_HEADER_PREFIX,
    XIAOMI_META_HEADER_PREFIX,
};
pub use object::{FdsObject, ObjectContent};
pub use param::UserParam;
pub use wire::{PutObjectResult, StorageAccessToken, UploadPartResult};

pub(crate) use metadata::format_http_date;
pub(crate) use param::{append_params, is_derived_rendition};
pub(crate) use wire::{InitMultipartUploadResult, UploadPartResultList};
