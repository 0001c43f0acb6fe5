//! Image upload module.
//!
//! - `encode`: one-shot JPEG encoding of a selected image
//! - `client`: `UploadClient`, which sends the JPEG as a multipart
//!   `file` part with the session's bearer token

pub mod client;
pub mod encode;

pub use client::{ServerAck, UploadClient, UploadRequest};
pub use encode::{encode_jpeg, load_jpeg, JpegImage};
