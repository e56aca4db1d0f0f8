//! Decoding logic.

pub mod lzbuffer;
pub mod lzma;
pub mod options;
pub mod rangecoder;

#[cfg(feature = "stream")]
pub mod stream;
