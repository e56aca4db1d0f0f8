use crate::decode::lzbuffer::LzCircularBuffer;
use crate::decode::options::{FinishMode, Options};
use crate::decode::rangecoder::{BitTree, LenDecoder, RangeDecoder};
use crate::error::{self, Error};
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
#[cfg(feature = "std")]
use std::io;

/// Maximum input data that can be consumed while decoding one symbol.
/// Libhtp uses the following equation to define the maximum number of bits
/// for the worst case scenario:
///   log2((2^11 / 31) ^ 22) + 26 < 134 + 26 = 160
const MAX_REQUIRED_INPUT: usize = 20;

/// Number of bytes that prime the range coder: one zero byte followed by
/// the big-endian initial `code`.
const RC_INIT_SIZE: usize = 5;

/// Smallest length a match can encode.
const MATCH_MIN_LEN: usize = 2;

/// `remain_len` sentinel: the end-of-stream marker has been decoded.
const MATCH_SPEC_LEN_START: usize = MATCH_MIN_LEN + 8 + 8 + 256;

/// `remain_len` sentinels poisoning a failed stream; decoding calls refuse
/// to touch the handle once one of these is set.
const MATCH_SPEC_LEN_ERROR_DATA: usize = 1 << 9;
const MATCH_SPEC_LEN_ERROR_FAIL: usize = MATCH_SPEC_LEN_ERROR_DATA - 1;

/// Smallest initial `code` whose first packet would decode as a rep match,
/// which is impossible on an empty dictionary: with all probabilities at
/// their midpoint the first two bits come out as match + rep exactly when
/// `code >= 0xC0000000 - 0x400`.
const BAD_REP_CODE: u32 = 0xC000_0000 - 0x400;

/// LZMA "lclppb" decompression properties.
#[derive(Debug, Copy, Clone)]
pub struct LzmaProperties {
    /// The number of literal context bits.
    ///
    /// The most `lc` significant bits of the previous byte are part of the
    /// literal context. `lc` must not be greater than 8.
    pub lc: u32, // 0..=8
    /// The number of literal position bits.
    ///
    /// `lp` must not be greater than 4.
    pub lp: u32, // 0..=4
    /// The number of position bits.
    ///
    /// The context for literal/match is plaintext offset modulo `2^pb`.
    /// `pb` must not be greater than 4.
    pub pb: u32, // 0..=4
}

/// LZMA decompression parameters.
#[derive(Debug, Copy, Clone)]
pub struct LzmaParams {
    /// The LZMA "lclppb" decompression properties.
    pub properties: LzmaProperties,
    /// The dictionary size to use when decompressing.
    pub dict_size: u32,
}

impl LzmaParams {
    /// Parses the mandatory 5-byte property prefix: one packed properties
    /// byte followed by the little-endian dictionary size.
    pub fn from_props(props: &[u8]) -> error::Result<LzmaParams> {
        if props.len() < 5 {
            return Err(Error::HeaderTooShort {
                available: props.len(),
            });
        }

        let mut d = u32::from(props[0]);
        if d >= 225 {
            return Err(Error::UnsupportedProperties { packed: props[0] });
        }

        let lc = d % 9;
        d /= 9;
        let lp = d % 5;
        let pb = d / 5;

        lzma_info!("Properties {{ lc: {}, lp: {}, pb: {} }}", lc, lp, pb);

        let dict_size_provided = LittleEndian::read_u32(&props[1..5]);
        let dict_size = if dict_size_provided < 0x1000 {
            0x1000
        } else {
            dict_size_provided
        };

        lzma_info!("Dict size: {}", dict_size);

        Ok(LzmaParams {
            properties: LzmaProperties { lc, lp, pb },
            dict_size,
        })
    }

    /// Reads the 5-byte property prefix from the head of a stream.
    #[cfg(feature = "std")]
    pub fn read_header<R>(input: &mut R) -> error::Result<LzmaParams>
    where
        R: io::Read,
    {
        let mut props = [0u8; 5];
        let mut available = 0;
        while available < props.len() {
            let read = input.read(&mut props[available..]).map_err(Error::Io)?;
            if read == 0 {
                return Err(Error::HeaderTooShort { available });
            }
            available += read;
        }
        LzmaParams::from_props(&props)
    }
}

/// Where the stream stands after a decoding call.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Status {
    /// No claim about the stream can be made yet.
    NotSpecified,
    /// The end-of-stream marker was decoded and the range coder verified.
    FinishedWithMark,
    /// The output limit was reached but the stream continues past it.
    NotFinished,
    /// The next symbol cannot be decoded from the input provided so far;
    /// resume with more bytes.
    NeedsMoreInput,
    /// The output limit was reached with a drained range coder: the stream
    /// may legitimately end here even though no marker was seen.
    MaybeFinishedWithoutMark,
}

/// Progress report for one decoding call.
#[derive(Debug, Copy, Clone)]
pub struct DecodeStep {
    /// Compressed bytes consumed from the caller's input.
    pub bytes_read: usize,
    /// Decompressed bytes produced.
    pub bytes_written: usize,
    /// Stream position after the call.
    pub status: Status,
}

/// Kind of packet recognized by the lookahead parse. The driver lets the
/// decoder run past an output limit only when the next packet is a match,
/// since only a match can carry the end-of-stream marker.
#[derive(Debug, PartialEq, Copy, Clone)]
enum Packet {
    Literal,
    Match,
    Rep,
}

/// Adaptive probability model plus the dictionary it writes into.
struct DecoderState {
    params: LzmaParams,
    output: LzCircularBuffer,
    literal_probs: Vec<u16>,
    pos_slot_decoder: [BitTree<64>; 4],
    align_decoder: BitTree<16>,
    pos_decoders: [u16; 115],
    is_match: [u16; 192], // true = LZ, false = literal
    is_rep: [u16; 12],
    is_rep_g0: [u16; 12],
    is_rep_g1: [u16; 12],
    is_rep_g2: [u16; 12],
    is_rep_0long: [u16; 192],
    state: usize,
    rep: [usize; 4],
    len_decoder: LenDecoder,
    rep_len_decoder: LenDecoder,
    processed_pos: u32,
    check_dic_size: u32,
    remain_len: usize,
}

impl DecoderState {
    fn new(params: LzmaParams, memlimit: usize) -> DecoderState {
        let dic_buf_size = params.dict_size.max(0x1000) as usize;
        let num_literal_contexts = 1 << (params.properties.lc + params.properties.lp);
        DecoderState {
            output: LzCircularBuffer::new(dic_buf_size, memlimit),
            literal_probs: vec![0x400; 0x300 * num_literal_contexts],
            pos_slot_decoder: [BitTree::new(); 4],
            align_decoder: BitTree::new(),
            pos_decoders: [0x400; 115],
            is_match: [0x400; 192],
            is_rep: [0x400; 12],
            is_rep_g0: [0x400; 12],
            is_rep_g1: [0x400; 12],
            is_rep_g2: [0x400; 12],
            is_rep_0long: [0x400; 192],
            state: 0,
            rep: [0; 4],
            len_decoder: LenDecoder::new(),
            rep_len_decoder: LenDecoder::new(),
            processed_pos: 0,
            check_dic_size: 0,
            remain_len: 0,
            params,
        }
    }

    fn reset_state(&mut self) {
        self.literal_probs.iter_mut().for_each(|v| *v = 0x400);
        self.pos_slot_decoder.iter_mut().for_each(|v| v.reset());
        self.align_decoder.reset();
        self.pos_decoders.iter_mut().for_each(|v| *v = 0x400);
        self.is_match.iter_mut().for_each(|v| *v = 0x400);
        self.is_rep.iter_mut().for_each(|v| *v = 0x400);
        self.is_rep_g0.iter_mut().for_each(|v| *v = 0x400);
        self.is_rep_g1.iter_mut().for_each(|v| *v = 0x400);
        self.is_rep_g2.iter_mut().for_each(|v| *v = 0x400);
        self.is_rep_0long.iter_mut().for_each(|v| *v = 0x400);
        self.state = 0;
        self.rep = [0; 4];
        self.len_decoder.reset();
        self.rep_len_decoder.reset();
    }

    /// Decodes one packet, mutating model and dictionary.
    fn process_next(
        &mut self,
        rangecoder: &mut RangeDecoder,
        limit: usize,
    ) -> error::Result<Packet> {
        self.process_next_inner(rangecoder, limit, true)
    }

    /// Classifies the next packet without mutating any state.
    ///
    /// Runs the regular parse with `update = false` over a bounded prefix;
    /// `Error::InputEof` means the prefix does not hold a complete symbol.
    fn try_process_next(&mut self, buf: &[u8], range: u32, code: u32) -> error::Result<Packet> {
        let mut rangecoder = RangeDecoder::from_parts(buf, range, code);
        self.process_next_inner(&mut rangecoder, 0, false)
    }

    fn process_next_inner(
        &mut self,
        rangecoder: &mut RangeDecoder,
        limit: usize,
        update: bool,
    ) -> error::Result<Packet> {
        let pos_state = (self.processed_pos as usize) & ((1 << self.params.properties.pb) - 1);

        // Literal
        if !rangecoder.decode_bit(&mut self.is_match[(self.state << 4) + pos_state], update)? {
            let byte: u8 = self.decode_literal(rangecoder, update)?;

            if update {
                lzma_debug!("Literal: {}", byte);
                self.output.append_literal(byte)?;
                self.processed_pos = self.processed_pos.wrapping_add(1);

                self.state = if self.state < 4 {
                    0
                } else if self.state < 10 {
                    self.state - 3
                } else {
                    self.state - 6
                };
            }
            return Ok(Packet::Literal);
        }

        // LZ
        let len;
        // Distance is repeated from LRU
        if rangecoder.decode_bit(&mut self.is_rep[self.state], update)? {
            // dist = rep[0]
            if !rangecoder.decode_bit(&mut self.is_rep_g0[self.state], update)? {
                // len = 1
                if !rangecoder.decode_bit(
                    &mut self.is_rep_0long[(self.state << 4) + pos_state],
                    update,
                )? {
                    // update state (short rep)
                    if update {
                        self.state = if self.state < 7 { 9 } else { 11 };
                        let byte = self.output.last_n(self.rep[0] + 1)?;
                        self.output.append_literal(byte)?;
                        self.processed_pos = self.processed_pos.wrapping_add(1);
                    }
                    return Ok(Packet::Rep);
                }
            // dist = rep[i]
            } else {
                let idx = if !rangecoder.decode_bit(&mut self.is_rep_g1[self.state], update)? {
                    1
                } else if !rangecoder.decode_bit(&mut self.is_rep_g2[self.state], update)? {
                    2
                } else {
                    3
                };
                if update {
                    // Update LRU
                    let dist = self.rep[idx];
                    for i in (0..idx).rev() {
                        self.rep[i + 1] = self.rep[i];
                    }
                    self.rep[0] = dist;
                }
            }

            len = self.rep_len_decoder.decode(rangecoder, pos_state, update)?;

            if update {
                // update state (rep)
                self.state = if self.state < 7 { 8 } else { 11 };
                self.copy_match(len + MATCH_MIN_LEN, limit)?;
            }
            return Ok(Packet::Rep);
        }

        // New distance
        len = self.len_decoder.decode(rangecoder, pos_state, update)?;
        let dist = self.decode_distance(rangecoder, len, update)?;

        if dist == 0xFFFF_FFFF {
            // End-of-stream marker; the match never commits, so state and
            // rep queue stay as they were.
            if update {
                self.remain_len = MATCH_SPEC_LEN_START;
            }
            return Ok(Packet::Match);
        }

        if update {
            let valid_window = if self.check_dic_size == 0 {
                self.processed_pos
            } else {
                self.check_dic_size
            };
            if dist as u64 >= u64::from(valid_window) {
                return Err(Error::Data("match distance reaches before the stream start"));
            }

            // Update LRU
            self.rep[3] = self.rep[2];
            self.rep[2] = self.rep[1];
            self.rep[1] = self.rep[0];
            self.rep[0] = dist;

            // update state (match)
            self.state = if self.state < 7 { 7 } else { 10 };

            self.copy_match(len + MATCH_MIN_LEN, limit)?;
        }
        Ok(Packet::Match)
    }

    /// Copies a decoded match into the dictionary, clamped to `limit`; a
    /// truncated remainder is parked in `remain_len` for `write_rem`.
    fn copy_match(&mut self, len: usize, limit: usize) -> error::Result<()> {
        let room = limit - self.output.dic_pos();
        let copied = len.min(room);

        if self.check_dic_size == 0
            && (self.params.dict_size - self.processed_pos) as usize <= copied
        {
            self.check_dic_size = self.params.dict_size;
        }
        self.output.append_lz(copied, self.rep[0] + 1)?;
        self.processed_pos = self.processed_pos.wrapping_add(copied as u32);
        self.remain_len = len - copied;
        Ok(())
    }

    /// Continues a match copy that a previous call truncated at its output
    /// limit.
    fn write_rem(&mut self, limit: usize) -> error::Result<()> {
        if self.remain_len == 0 || self.remain_len >= MATCH_SPEC_LEN_START {
            return Ok(());
        }

        let len = self.remain_len.min(limit - self.output.dic_pos());
        if self.check_dic_size == 0
            && (self.params.dict_size - self.processed_pos) as usize <= len
        {
            self.check_dic_size = self.params.dict_size;
        }
        self.output.append_lz(len, self.rep[0] + 1)?;
        self.processed_pos = self.processed_pos.wrapping_add(len as u32);
        self.remain_len -= len;
        Ok(())
    }

    fn decode_literal(
        &mut self,
        rangecoder: &mut RangeDecoder,
        update: bool,
    ) -> error::Result<u8> {
        let lc = self.params.properties.lc;
        let lp = self.params.properties.lp;

        let prev_byte = if self.processed_pos != 0 || self.check_dic_size != 0 {
            self.output.last_or(0) as usize
        } else {
            0
        };

        let mut result: usize = 1;
        let lit_state =
            (((self.processed_pos as usize) & ((1 << lp) - 1)) << lc) + (prev_byte >> (8 - lc));
        let probs = &mut self.literal_probs[0x300 * lit_state..][..0x300];

        if self.state >= 7 {
            let mut match_byte = self.output.last_n(self.rep[0] + 1)? as usize;

            while result < 0x100 {
                let match_bit = (match_byte >> 7) & 1;
                match_byte <<= 1;
                let bit = rangecoder
                    .decode_bit(&mut probs[((1 + match_bit) << 8) + result], update)?
                    as usize;
                result = (result << 1) ^ bit;
                if match_bit != bit {
                    break;
                }
            }
        }

        while result < 0x100 {
            result = (result << 1) ^ (rangecoder.decode_bit(&mut probs[result], update)? as usize);
        }

        Ok((result - 0x100) as u8)
    }

    fn decode_distance(
        &mut self,
        rangecoder: &mut RangeDecoder,
        length: usize,
        update: bool,
    ) -> error::Result<usize> {
        let len_state = if length > 3 { 3 } else { length };

        let pos_slot = self.pos_slot_decoder[len_state].parse(rangecoder, update)? as usize;
        if pos_slot < 4 {
            return Ok(pos_slot);
        }

        let num_direct_bits = (pos_slot >> 1) - 1;
        let mut result = (2 ^ (pos_slot & 1)) << num_direct_bits;

        if pos_slot < 14 {
            result += rangecoder.parse_reverse_bit_tree(
                num_direct_bits,
                &mut self.pos_decoders,
                result - pos_slot,
                update,
            )? as usize;
        } else {
            result += (rangecoder.get(num_direct_bits - 4)? as usize) << 4;
            result += self.align_decoder.parse_reverse(rangecoder, update)? as usize;
        }

        Ok(result)
    }
}

/// An incremental LZMA decoder.
///
/// The handle owns the probability model and the dictionary ring; input and
/// output are pushed through it in chunks of any size, down to single
/// bytes. Partial symbols are spliced across calls through an internal
/// scratch buffer, so no input framing is required from the caller.
pub struct LzmaDecoder {
    inner: DecoderState,
    range: u32,
    code: u32,
    need_flush: bool,
    need_init_state: bool,
    temp: [u8; MAX_REQUIRED_INPUT],
    temp_len: usize,
}

impl LzmaDecoder {
    /// Creates a decoder for the given parameters.
    pub fn new(params: LzmaParams) -> error::Result<LzmaDecoder> {
        LzmaDecoder::with_options(params, &Options::default())
    }

    /// Creates a decoder for the given parameters and options.
    pub fn with_options(params: LzmaParams, options: &Options) -> error::Result<LzmaDecoder> {
        let LzmaProperties { lc, lp, pb } = params.properties;
        if lc > 8 || lp > 4 || pb > 4 {
            return Err(Error::UnsupportedProperties { packed: u8::MAX });
        }

        let mut decoder = LzmaDecoder {
            inner: DecoderState::new(params, options.memlimit.unwrap_or(usize::MAX)),
            range: 0,
            code: 0,
            need_flush: true,
            need_init_state: true,
            temp: [0; MAX_REQUIRED_INPUT],
            temp_len: 0,
        };
        decoder.reset();
        Ok(decoder)
    }

    /// Rewinds the handle to the state of a freshly created decoder.
    pub fn reset(&mut self) {
        self.inner.output.reset();
        self.reset_dic_and_state(true, true);
    }

    /// Prepares the handle for another stream, optionally keeping the
    /// dictionary contents (so the new stream can reference them) or the
    /// probability model.
    pub fn reset_dic_and_state(&mut self, reset_dic: bool, reset_state: bool) {
        self.need_flush = true;
        self.inner.remain_len = 0;
        self.temp_len = 0;

        if reset_dic {
            self.inner.processed_pos = 0;
            self.inner.check_dic_size = 0;
            self.need_init_state = true;
        }
        if reset_state {
            self.need_init_state = true;
        }
    }

    /// Decompression parameters this decoder was created with.
    pub fn params(&self) -> &LzmaParams {
        &self.inner.params
    }

    /// Dictionary bytes written so far this lap of the ring.
    pub fn dic(&self) -> &[u8] {
        self.inner.output.raw()
    }

    /// Current write position inside the dictionary ring.
    pub fn dic_pos(&self) -> usize {
        self.inner.output.dic_pos()
    }

    /// Decodes into the dictionary ring up to the absolute position
    /// `dic_limit`, consuming as much of `src` as needed.
    ///
    /// `bytes_written` of the returned step is the dictionary advance;
    /// callers read the produced bytes through [`LzmaDecoder::dic`]. Most
    /// callers want [`LzmaDecoder::decode_to_buf`] instead, which manages
    /// the ring for them.
    pub fn decode_to_dic(
        &mut self,
        dic_limit: usize,
        src: &[u8],
        finish: FinishMode,
    ) -> error::Result<DecodeStep> {
        match self.inner.remain_len {
            MATCH_SPEC_LEN_ERROR_DATA => return Err(Error::Data("stream already failed")),
            MATCH_SPEC_LEN_ERROR_FAIL => return Err(Error::Fail("decoder already failed")),
            _ => {}
        }

        let dic_pos = self.inner.output.dic_pos();
        let dic_buf_size = self.inner.output.dic_buf_size();
        if dic_limit < dic_pos || dic_limit > dic_buf_size {
            return Err(Error::InvalidLimit {
                dic_limit,
                dic_pos,
                dic_buf_size,
            });
        }

        let result = self.decode_to_dic_inner(dic_limit, src, finish);
        match &result {
            // A poisoned handle refuses further work instead of decoding
            // garbage with half-updated state.
            Err(Error::Data(_)) => self.inner.remain_len = MATCH_SPEC_LEN_ERROR_DATA,
            Err(Error::Fail(_)) => self.inner.remain_len = MATCH_SPEC_LEN_ERROR_FAIL,
            _ => {}
        }
        result
    }

    fn step(&self, dic_pos0: usize, bytes_read: usize, status: Status) -> DecodeStep {
        DecodeStep {
            bytes_read,
            bytes_written: self.inner.output.dic_pos() - dic_pos0,
            status,
        }
    }

    fn decode_to_dic_inner(
        &mut self,
        dic_limit: usize,
        src: &[u8],
        finish: FinishMode,
    ) -> error::Result<DecodeStep> {
        let in_size = src.len();
        let mut src_pos = 0usize;
        let dic_pos0 = self.inner.output.dic_pos();

        self.inner.write_rem(dic_limit)?;

        while self.inner.remain_len != MATCH_SPEC_LEN_START {
            if self.need_flush {
                while src_pos < in_size && self.temp_len < RC_INIT_SIZE {
                    self.temp[self.temp_len] = src[src_pos];
                    self.temp_len += 1;
                    src_pos += 1;
                }
                if self.temp_len < RC_INIT_SIZE {
                    return Ok(self.step(dic_pos0, src_pos, Status::NeedsMoreInput));
                }
                if self.temp[0] != 0 {
                    return Err(Error::Data("range coder initial byte is not zero"));
                }
                self.code = BigEndian::read_u32(&self.temp[1..RC_INIT_SIZE]);
                self.range = 0xFFFF_FFFF;
                self.need_flush = false;
                self.temp_len = 0;

                if self.inner.processed_pos == 0
                    && self.inner.check_dic_size == 0
                    && self.code >= BAD_REP_CODE
                {
                    return Err(Error::Data("first packet would be a rep match"));
                }
            }

            let mut check_end_mark_now = false;
            if self.inner.output.dic_pos() >= dic_limit {
                if self.inner.remain_len == 0 && self.code == 0 {
                    return Ok(self.step(dic_pos0, src_pos, Status::MaybeFinishedWithoutMark));
                }
                if finish == FinishMode::FinishAny {
                    return Ok(self.step(dic_pos0, src_pos, Status::NotFinished));
                }
                if self.inner.remain_len != 0 {
                    return Err(Error::Data("output limit reached inside a match"));
                }
                check_end_mark_now = true;
            }

            if self.need_init_state {
                self.inner.reset_state();
                self.need_init_state = false;
            }

            if self.temp_len == 0 {
                let rest = &src[src_pos..];
                let buf_limit = if rest.len() < MAX_REQUIRED_INPUT || check_end_mark_now {
                    match self.inner.try_process_next(rest, self.range, self.code) {
                        Err(Error::InputEof) => {
                            if rest.len() >= MAX_REQUIRED_INPUT {
                                return Err(Error::Fail("lookahead failed with a full window"));
                            }
                            self.temp[..rest.len()].copy_from_slice(rest);
                            self.temp_len = rest.len();
                            return Ok(self.step(dic_pos0, in_size, Status::NeedsMoreInput));
                        }
                        Err(other) => return Err(other),
                        Ok(packet) => {
                            if check_end_mark_now && packet != Packet::Match {
                                return Err(Error::Data(
                                    "stream continues past the required end position",
                                ));
                            }
                        }
                    }
                    // enough input for exactly the one symbol the lookahead saw
                    0
                } else {
                    rest.len() - MAX_REQUIRED_INPUT
                };
                src_pos += self.decode_real(dic_limit, rest, buf_limit)?;
            } else {
                let mut rem = self.temp_len;
                let mut look_ahead = 0;
                while rem < MAX_REQUIRED_INPUT && src_pos + look_ahead < in_size {
                    self.temp[rem] = src[src_pos + look_ahead];
                    rem += 1;
                    look_ahead += 1;
                }
                self.temp_len = rem;
                let temp = self.temp;

                if rem < MAX_REQUIRED_INPUT || check_end_mark_now {
                    match self
                        .inner
                        .try_process_next(&temp[..rem], self.range, self.code)
                    {
                        Err(Error::InputEof) => {
                            return Ok(self.step(
                                dic_pos0,
                                src_pos + look_ahead,
                                Status::NeedsMoreInput,
                            ));
                        }
                        Err(other) => return Err(other),
                        Ok(packet) => {
                            if check_end_mark_now && packet != Packet::Match {
                                return Err(Error::Data(
                                    "stream continues past the required end position",
                                ));
                            }
                        }
                    }
                }

                let consumed = self.decode_real(dic_limit, &temp[..rem], 0)?;
                if consumed > rem {
                    return Err(Error::Fail("decoded past the spliced lookahead"));
                }
                let leftover = rem - consumed;
                if leftover > look_ahead {
                    return Err(Error::Fail("lookahead byte accounting mismatch"));
                }
                src_pos += look_ahead - leftover;
                self.temp_len = 0;
            }
        }

        if self.code != 0 {
            return Err(Error::Data("range coder not cleared by the end marker"));
        }
        Ok(self.step(dic_pos0, src_pos, Status::FinishedWithMark))
    }

    /// Decodes symbols from `buf` until the dictionary limit is reached,
    /// the marker is seen, or `buf_limit` bytes have been consumed; one
    /// more symbol may complete past `buf_limit` within the lookahead
    /// window. Returns the bytes consumed.
    fn decode_real(
        &mut self,
        dic_limit: usize,
        buf: &[u8],
        buf_limit: usize,
    ) -> error::Result<usize> {
        let mut rangecoder = RangeDecoder::from_parts(buf, self.range, self.code);

        loop {
            // Until the first full dictionary lap, matches may only reach
            // back to the stream start; clamp the limit so the window fills
            // exactly before `check_dic_size` is promoted.
            let mut limit = dic_limit;
            if self.inner.check_dic_size == 0 {
                let rem = (self.inner.params.dict_size - self.inner.processed_pos) as usize;
                if dic_limit - self.inner.output.dic_pos() > rem {
                    limit = self.inner.output.dic_pos() + rem;
                }
            }

            match self.inner.process_next(&mut rangecoder, limit) {
                Ok(_) => {}
                Err(Error::InputEof) => return Err(Error::Fail("lookahead window over-read")),
                Err(other) => return Err(other),
            }

            if self.inner.check_dic_size == 0
                && self.inner.processed_pos >= self.inner.params.dict_size
            {
                self.inner.check_dic_size = self.inner.params.dict_size;
            }
            self.inner.write_rem(dic_limit)?;

            if self.inner.remain_len >= MATCH_SPEC_LEN_START {
                break;
            }
            if !(self.inner.output.dic_pos() < dic_limit && rangecoder.pos() < buf_limit) {
                break;
            }
        }

        self.range = rangecoder.range;
        self.code = rangecoder.code;
        Ok(rangecoder.pos())
    }

    /// Decodes into `dest`, consuming as much of `src` as needed, draining
    /// the dictionary ring and wrapping it transparently.
    pub fn decode_to_buf(
        &mut self,
        dest: &mut [u8],
        src: &[u8],
        finish: FinishMode,
    ) -> error::Result<DecodeStep> {
        let mut bytes_read = 0;
        let mut bytes_written = 0;

        loop {
            if self.inner.output.dic_pos() == self.inner.output.dic_buf_size() {
                self.inner.output.rewind();
            }
            let dic_pos = self.inner.output.dic_pos();
            let out_left = dest.len() - bytes_written;

            // A destination larger than the ring remainder is filled one
            // lap at a time; the finish requirement only applies to the
            // last lap.
            let (dic_limit, cur_finish) =
                if out_left > self.inner.output.dic_buf_size() - dic_pos {
                    (self.inner.output.dic_buf_size(), FinishMode::FinishAny)
                } else {
                    (dic_pos + out_left, finish)
                };

            let result = self.decode_to_dic(dic_limit, &src[bytes_read..], cur_finish);
            let produced = self.inner.output.dic_pos() - dic_pos;
            dest[bytes_written..bytes_written + produced]
                .copy_from_slice(&self.inner.output.raw()[dic_pos..dic_pos + produced]);
            bytes_written += produced;

            let step = result?;
            bytes_read += step.bytes_read;

            if produced == 0 || bytes_written == dest.len() {
                return Ok(DecodeStep {
                    bytes_read,
                    bytes_written,
                    status: step.status,
                });
            }
        }
    }
}

/// Decodes a whole stream in one call.
///
/// `props` holds the 5-byte property prefix; `src` the compressed payload
/// that follows it. Decoding stops when `dest` is full, the end-of-stream
/// marker is hit, or the input runs out; the returned step says which.
pub fn decode_one_shot(
    dest: &mut [u8],
    src: &[u8],
    props: &[u8],
    finish: FinishMode,
) -> error::Result<DecodeStep> {
    let params = LzmaParams::from_props(props)?;
    LzmaDecoder::new(params)?.decode_to_buf(dest, src, finish)
}
