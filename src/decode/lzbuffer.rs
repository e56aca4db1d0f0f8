use crate::error::{self, Error};
use alloc::vec::Vec;

/// Sliding-window dictionary backing the decoder's output.
///
/// The window is a ring of `dic_buf_size` bytes (at least 4 KiB). Storage is
/// claimed lazily as the write cursor advances, so a stream advertising a
/// huge dictionary only costs what it actually touches; `memlimit` caps that
/// growth deterministically.
///
/// `dic_pos` is the next write position. Back-references of distance `d`
/// read from `dic_pos - d`, wrapping to the end of the ring when `d`
/// exceeds `dic_pos`.
pub struct LzCircularBuffer {
    buf: Vec<u8>,
    dic_pos: usize,
    dic_buf_size: usize,
    memlimit: usize,
}

impl LzCircularBuffer {
    pub fn new(dic_buf_size: usize, memlimit: usize) -> Self {
        lzma_info!("Dict size in LZ buffer: {}", dic_buf_size);
        Self {
            buf: Vec::new(),
            dic_pos: 0,
            dic_buf_size,
            memlimit,
        }
    }

    #[inline]
    pub fn dic_pos(&self) -> usize {
        self.dic_pos
    }

    #[inline]
    pub fn dic_buf_size(&self) -> usize {
        self.dic_buf_size
    }

    /// Bytes written so far this lap of the ring.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.buf
    }

    /// Restarts the write cursor at the ring's origin once a lap completes.
    pub fn rewind(&mut self) {
        debug_assert_eq!(self.dic_pos, self.dic_buf_size);
        self.dic_pos = 0;
    }

    /// Forgets the window contents; allocation is kept for reuse.
    pub fn reset(&mut self) {
        self.dic_pos = 0;
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        *self.buf.get(index).unwrap_or(&0)
    }

    fn set(&mut self, index: usize, value: u8) -> error::Result<()> {
        if index >= self.dic_buf_size {
            return Err(Error::Fail("dictionary write past ring capacity"));
        }
        if index == self.buf.len() {
            if self.buf.len() >= self.memlimit {
                return Err(Error::MemLimit {
                    requested: self.buf.len() + 1,
                    limit: self.memlimit,
                });
            }
            self.buf.push(value);
        } else if index < self.buf.len() {
            self.buf[index] = value;
        } else {
            return Err(Error::Fail("non-contiguous dictionary write"));
        }
        Ok(())
    }

    /// Byte most recently written, or `lit` when the window is untouched.
    pub fn last_or(&self, lit: u8) -> u8 {
        if self.buf.is_empty() {
            lit
        } else {
            self.get((self.dic_pos + self.dic_buf_size - 1) % self.dic_buf_size)
        }
    }

    /// Byte at distance `dist` behind the write cursor (`dist >= 1`).
    pub fn last_n(&self, dist: usize) -> error::Result<u8> {
        if dist > self.dic_buf_size {
            return Err(Error::Data("match distance exceeds dictionary size"));
        }
        let offset = if dist > self.dic_pos {
            self.dic_buf_size + self.dic_pos - dist
        } else {
            self.dic_pos - dist
        };
        Ok(self.get(offset))
    }

    /// Appends one literal byte.
    pub fn append_literal(&mut self, lit: u8) -> error::Result<()> {
        self.set(self.dic_pos, lit)?;
        self.dic_pos += 1;
        Ok(())
    }

    /// Copies `len` bytes from distance `dist` behind the cursor.
    ///
    /// The copy is byte-by-byte: when `len` exceeds `dist` the bytes written
    /// earlier in the same copy are read back, which yields the run-length
    /// behaviour overlapping matches rely on.
    pub fn append_lz(&mut self, len: usize, dist: usize) -> error::Result<()> {
        lzma_debug!("LZ {{ len: {}, dist: {} }}", len, dist);
        for _ in 0..len {
            let byte = self.last_n(dist)?;
            self.append_literal(byte)?;
        }
        Ok(())
    }
}
