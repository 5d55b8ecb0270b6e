pub mod bytes;
pub mod expect_msg;

// Re-export helpers for convenient use as `crate::utils::slice_as_bytes`
pub use bytes::{bytes_to_vec, slice_as_bytes};
