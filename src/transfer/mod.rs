//! Transfer engine: multipart upload and resumable download

pub(crate) mod download;
mod part;
mod pool;
pub(crate) mod upload;

pub use part::{part_count, split_parts, PartPlan};
pub use upload::TransferSession;

pub(crate) use pool::PartPool;
