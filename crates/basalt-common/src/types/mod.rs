//! Core types for the BasaltDB storage core.

mod codec;
mod ids;

pub use codec::FixedCodec;
pub use ids::{PageId, RecordId};
