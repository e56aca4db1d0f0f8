use crate::decode::lzma::{LzmaDecoder, LzmaParams, Status};
use crate::decode::options::{FinishMode, Options};
use crate::error::{self, Error};
use std::io;

const CHUNK_SIZE: usize = 4096;

/// An [`io::Write`] adapter over the incremental decoder.
///
/// Compressed bytes written to the stream are decoded on the fly and the
/// plaintext forwarded to the inner writer; chunks of any size are
/// accepted, including the 5-byte property prefix arriving one byte at a
/// time. Call [`Stream::finish`] to verify termination and recover the
/// inner writer.
pub struct Stream<W>
where
    W: io::Write,
{
    output: Option<W>,
    decoder: Option<LzmaDecoder>,
    header: [u8; 5],
    header_len: usize,
    options: Options,
    status: Status,
}

impl<W> Stream<W>
where
    W: io::Write,
{
    /// Initializes the stream with the default options.
    pub fn new(output: W) -> Stream<W> {
        Stream::with_options(&Options::default(), output)
    }

    pub fn with_options(options: &Options, output: W) -> Stream<W> {
        Stream {
            output: Some(output),
            decoder: None,
            header: [0; 5],
            header_len: 0,
            options: *options,
            status: Status::NotSpecified,
        }
    }

    /// Consumes the stream, verifying that the decoded data terminated
    /// properly, and returns the inner writer.
    pub fn finish(mut self) -> error::Result<W> {
        let output = self.output.take().unwrap();
        match self.status {
            Status::FinishedWithMark | Status::MaybeFinishedWithoutMark => Ok(output),
            _ if self.options.allow_incomplete => Ok(output),
            _ => Err(Error::Data("stream ended without an end-of-stream marker")),
        }
    }

    fn process(&mut self, mut data: &[u8]) -> error::Result<usize> {
        let mut consumed = 0;

        if self.decoder.is_none() {
            while self.header_len < self.header.len() && !data.is_empty() {
                self.header[self.header_len] = data[0];
                self.header_len += 1;
                data = &data[1..];
                consumed += 1;
            }
            if self.header_len < self.header.len() {
                return Ok(consumed);
            }
            let params = LzmaParams::from_props(&self.header)?;
            self.decoder = Some(LzmaDecoder::with_options(params, &self.options)?);
        }

        let decoder = self.decoder.as_mut().unwrap();
        let output = self.output.as_mut().unwrap();
        let mut chunk = [0u8; CHUNK_SIZE];

        while !data.is_empty() {
            if self.status == Status::FinishedWithMark {
                // trailing garbage after the marker is accepted and dropped
                return Ok(consumed + data.len());
            }
            let step = decoder.decode_to_buf(&mut chunk, data, FinishMode::FinishAny)?;
            output.write_all(&chunk[..step.bytes_written]).map_err(Error::Io)?;
            self.status = step.status;
            consumed += step.bytes_read;
            data = &data[step.bytes_read..];

            if step.status == Status::NeedsMoreInput {
                debug_assert!(data.is_empty());
                break;
            }
        }
        Ok(consumed + data.len())
    }
}

impl<W> io::Write for Stream<W>
where
    W: io::Write,
{
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.process(data) {
            Ok(_) => Ok(data.len()),
            Err(Error::Io(error)) => Err(error),
            Err(error) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                error.to_string(),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.output.as_mut() {
            Some(output) => output.flush(),
            None => Ok(()),
        }
    }
}

impl<W> core::fmt::Debug for Stream<W>
where
    W: io::Write,
{
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        fmt.debug_struct("Stream")
            .field("status", &self.status)
            .field("header_len", &self.header_len)
            .finish()
    }
}
