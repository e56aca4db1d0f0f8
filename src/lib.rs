//! An incremental LZMA decoder written in pure Rust.
//!
//! The decoder consumes a raw LZMA stream: the mandatory 5-byte property
//! prefix (packed `lc`/`lp`/`pb` byte plus little-endian dictionary size)
//! followed by the range-coded payload. Input and output may be supplied in
//! chunks of any size; the decoder buffers partial symbols internally and
//! reports through [`decompress::Status`] whether it needs more input,
//! reached an output limit, or saw the end-of-stream marker.
//!
//! The decoding core is allocation-only (`no_std` + `alloc`); the
//! `io::Read`/`io::Write` conveniences are gated behind the default `std`
//! feature, and the `stream` feature adds an `io::Write` adapter.
//!
//! # Example
//!
//! ```
//! use lzma_dec::decompress::{FinishMode, LzmaDecoder, LzmaParams, Status};
//!
//! let params = LzmaParams::from_props(&[0x5D, 0x00, 0x10, 0x00, 0x00]).unwrap();
//! let mut decoder = LzmaDecoder::new(params).unwrap();
//! let mut dest = [0u8; 64];
//!
//! // Two bytes of range-coder priming are not enough to decode anything;
//! // the decoder stashes them and asks for the rest.
//! let step = decoder
//!     .decode_to_buf(&mut dest, &[0x00, 0x00], FinishMode::FinishAny)
//!     .unwrap();
//! assert_eq!(step.status, Status::NeedsMoreInput);
//! assert_eq!(step.bytes_read, 2);
//! ```
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[macro_use]
mod macros;

mod decode;
pub mod error;

#[cfg(feature = "std")]
use std::io;

/// Decompression façade: entry points, options and statuses.
pub mod decompress {
    pub use crate::decode::lzma::{
        decode_one_shot, DecodeStep, LzmaDecoder, LzmaParams, LzmaProperties, Status,
    };
    pub use crate::decode::options::{FinishMode, Options};

    #[cfg(feature = "stream")]
    pub use crate::decode::stream::Stream;
}

/// Decompresses an LZMA stream from `input` into `output`.
///
/// The stream must start with the 5-byte property prefix and terminate with
/// the end-of-stream marker; see
/// [`lzma_decompress_with_options`] to accept markerless streams.
#[cfg(feature = "std")]
pub fn lzma_decompress<R: io::BufRead, W: io::Write>(
    input: &mut R,
    output: &mut W,
) -> error::Result<()> {
    lzma_decompress_with_options(input, output, &decompress::Options::default())
}

/// Decompresses an LZMA stream from `input` into `output` with the given
/// options.
#[cfg(feature = "std")]
pub fn lzma_decompress_with_options<R: io::BufRead, W: io::Write>(
    input: &mut R,
    output: &mut W,
    options: &decompress::Options,
) -> error::Result<()> {
    use decompress::{FinishMode, Status};

    let params = decompress::LzmaParams::read_header(input)?;
    let mut decoder = decompress::LzmaDecoder::with_options(params, options)?;
    let mut chunk = [0u8; 4096];

    loop {
        let (step, input_exhausted) = {
            let data = input.fill_buf().map_err(error::Error::Io)?;
            let input_exhausted = data.is_empty();
            let step = decoder.decode_to_buf(&mut chunk, data, FinishMode::FinishAny)?;
            (step, input_exhausted)
        };
        output
            .write_all(&chunk[..step.bytes_written])
            .map_err(error::Error::Io)?;
        input.consume(step.bytes_read);

        match step.status {
            Status::FinishedWithMark => return Ok(()),
            Status::NeedsMoreInput if input_exhausted => {
                return if options.allow_incomplete {
                    Ok(())
                } else {
                    Err(error::Error::Data(
                        "stream ended without an end-of-stream marker",
                    ))
                };
            }
            _ => {}
        }
    }
}
