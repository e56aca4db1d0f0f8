/// Termination requirement for one decoding call.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FinishMode {
    /// The call may stop at the output limit without any proof that the
    /// stream ends there; the caller is expected to continue.
    FinishAny,
    /// Reaching the output limit is only acceptable if the stream can
    /// terminate there, either with an end-of-stream marker or with a
    /// range coder that has run dry.
    FinishEnd,
}

/// Options for decompression.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Upper bound, in bytes, for the dictionary ring allocation.
    ///
    /// The header's dictionary size field is attacker-controlled; setting a
    /// limit turns a hostile 4 GiB declaration into a clean
    /// [`MemLimit`](crate::error::Error::MemLimit) failure instead of an
    /// allocation of that size. `None` bounds the ring only by the header.
    pub memlimit: Option<usize>,
    /// Accept streams that stop without an end-of-stream marker.
    ///
    /// Only consulted by the reader-to-writer helpers and
    /// [`Stream::finish`](crate::decompress::Stream::finish); the
    /// slice-level calls report the distinction through their status
    /// instead.
    pub allow_incomplete: bool,
}
