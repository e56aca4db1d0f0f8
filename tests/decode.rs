mod common;

use common::{encode_stream, mixed_packets, Packet};
use lzma_dec::decompress::{
    decode_one_shot, FinishMode, LzmaDecoder, LzmaParams, Options, Status,
};
use lzma_dec::error::Error;

const DICT_4K: u32 = 0x1000;

fn decoder_for(stream: &[u8]) -> LzmaDecoder {
    let params = LzmaParams::from_props(&stream[..5]).unwrap();
    LzmaDecoder::new(params).unwrap()
}

/// One-shot decode with some slack in the destination; asserts the marker
/// was seen and the plaintext matches.
fn assert_roundtrip(stream: &[u8], expected: &[u8]) {
    let mut dest = vec![0u8; expected.len() + 64];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(step.status, Status::FinishedWithMark);
    assert_eq!(&dest[..step.bytes_written], expected);
}

/// Feeds the payload through a fresh decoder in the given chunks and
/// returns the collected plaintext plus the last reported status.
fn feed_chunks(stream: &[u8], chunk_size: usize) -> (Vec<u8>, Status) {
    let mut decoder = decoder_for(stream);
    let payload = &stream[5..];
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    let mut status = Status::NotSpecified;

    for chunk in payload.chunks(chunk_size.max(1)) {
        let mut offset = 0;
        loop {
            let step = decoder
                .decode_to_buf(&mut buf, &chunk[offset..], FinishMode::FinishAny)
                .unwrap();
            out.extend_from_slice(&buf[..step.bytes_written]);
            offset += step.bytes_read;
            status = step.status;
            if status == Status::FinishedWithMark {
                return (out, status);
            }
            if step.bytes_written == 0 {
                break;
            }
        }
    }
    (out, status)
}

#[test]
fn empty_payload_with_marker() {
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &[], true);
    assert!(expected.is_empty());
    assert_roundtrip(&stream, &expected);

    // zero-byte destination under the strict mode still verifies the marker
    let mut dest = [0u8; 0];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishEnd)
        .unwrap();
    assert_eq!(step.status, Status::FinishedWithMark);
    assert_eq!(step.bytes_written, 0);
}

#[test]
fn literal_and_short_rep_chain() {
    let mut packets = vec![Packet::Lit(b'A')];
    packets.extend(std::iter::repeat(Packet::ShortRep).take(8));
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &packets, false);
    assert_eq!(expected.as_slice(), &b"AAAAAAAAA"[..]);

    // markerless stream decoded to its exact size: the range coder runs
    // dry right at the limit
    let mut dest = [0u8; 9];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(step.status, Status::MaybeFinishedWithoutMark);
    assert_eq!(&dest[..], expected.as_slice());

    // the drained-coder check takes precedence over the strict mode
    let mut dest = [0u8; 9];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishEnd)
        .unwrap();
    assert_eq!(step.status, Status::MaybeFinishedWithoutMark);
}

#[test]
fn alternating_pair_via_rep_copy() {
    let packets = [
        Packet::Lit(b'a'),
        Packet::Lit(b'b'),
        Packet::Match { len: 62, dist: 1 },
    ];
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &packets, true);
    assert_eq!(expected.len(), 64);
    assert!(expected.chunks(2).all(|pair| pair == &b"ab"[..]));
    assert_roundtrip(&stream, &expected);

    // destination of exactly 64 bytes: the marker sits right at the limit
    let mut dest = [0u8; 64];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishEnd)
        .unwrap();
    assert_eq!(step.status, Status::FinishedWithMark);
    assert_eq!(&dest[..], expected.as_slice());
}

#[test]
fn resumes_across_two_halves() {
    let (stream, expected) = encode_stream(
        3,
        0,
        2,
        DICT_4K,
        &[
            Packet::Lit(b'a'),
            Packet::Lit(b'b'),
            Packet::Match { len: 62, dist: 1 },
        ],
        true,
    );
    let payload = &stream[5..];
    let mid = payload.len() / 2;

    let mut decoder = decoder_for(&stream);
    let mut dest = vec![0u8; expected.len() + 16];

    let first = decoder
        .decode_to_buf(&mut dest, &payload[..mid], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(first.status, Status::NeedsMoreInput);
    assert_eq!(first.bytes_read, mid);

    let second = decoder
        .decode_to_buf(&mut dest[first.bytes_written..], &payload[mid..], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(second.status, Status::FinishedWithMark);
    assert_eq!(first.bytes_written + second.bytes_written, expected.len());
    assert_eq!(&dest[..expected.len()], expected.as_slice());
}

#[test]
fn truncated_stream_waits_instead_of_failing() {
    let (stream, _) = encode_stream(
        3,
        0,
        2,
        DICT_4K,
        &[
            Packet::Lit(b'a'),
            Packet::Lit(b'b'),
            Packet::Match { len: 62, dist: 1 },
        ],
        true,
    );
    let truncated = &stream[..stream.len() - 3];

    let mut decoder = decoder_for(stream.as_slice());
    let mut dest = [0u8; 128];
    let step = decoder
        .decode_to_buf(&mut dest, &truncated[5..], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(step.status, Status::NeedsMoreInput);

    // handing over the missing tail completes the stream
    let step = decoder
        .decode_to_buf(
            &mut dest[step.bytes_written..],
            &stream[stream.len() - 3..],
            FinishMode::FinishAny,
        )
        .unwrap();
    assert_eq!(step.status, Status::FinishedWithMark);
}

#[test]
fn output_is_identical_for_every_input_split() {
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &mixed_packets(), true);
    let payload = &stream[5..];

    let (reference, reference_status) = feed_chunks(&stream, payload.len());
    assert_eq!(reference_status, Status::FinishedWithMark);
    assert_eq!(reference, expected);

    for split in 0..=payload.len() {
        let mut decoder = decoder_for(&stream);
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        let mut status = Status::NotSpecified;

        for chunk in [&payload[..split], &payload[split..]] {
            let mut offset = 0;
            loop {
                let step = decoder
                    .decode_to_buf(&mut buf, &chunk[offset..], FinishMode::FinishAny)
                    .unwrap();
                out.extend_from_slice(&buf[..step.bytes_written]);
                offset += step.bytes_read;
                status = step.status;
                if status == Status::FinishedWithMark || step.bytes_written == 0 {
                    break;
                }
            }
            if status == Status::FinishedWithMark {
                break;
            }
        }

        assert_eq!(status, reference_status, "split at {}", split);
        assert_eq!(out, reference, "split at {}", split);
    }
}

#[test]
fn single_byte_chunks_match_the_one_shot_result() {
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &mixed_packets(), true);
    let (out, status) = feed_chunks(&stream, 1);
    assert_eq!(status, Status::FinishedWithMark);
    assert_eq!(out, expected);

    for chunk_size in [2, 3, 7, 19] {
        let (out, status) = feed_chunks(&stream, chunk_size);
        assert_eq!(status, Status::FinishedWithMark, "chunk size {}", chunk_size);
        assert_eq!(out, expected, "chunk size {}", chunk_size);
    }
}

#[test]
fn every_property_triple_roundtrips() {
    for lc in 0..=4u32 {
        for lp in 0..=(4 - lc) {
            for pb in 0..=4u32 {
                let (stream, expected) =
                    encode_stream(lc, lp, pb, DICT_4K, &mixed_packets(), true);
                let mut dest = vec![0u8; expected.len() + 64];
                let step = decode_one_shot(
                    &mut dest,
                    &stream[5..],
                    &stream[..5],
                    FinishMode::FinishAny,
                )
                .unwrap();
                assert_eq!(
                    step.status,
                    Status::FinishedWithMark,
                    "lc={} lp={} pb={}",
                    lc,
                    lp,
                    pb
                );
                assert_eq!(
                    &dest[..step.bytes_written],
                    expected.as_slice(),
                    "lc={} lp={} pb={}",
                    lc,
                    lp,
                    pb
                );
            }
        }
    }
}

#[test]
fn dictionary_sizes_from_4k_to_1m() {
    for dict_size in [0x1000, 0x10000, 0x100000] {
        let (stream, expected) = encode_stream(3, 0, 2, dict_size, &mixed_packets(), true);
        assert_roundtrip(&stream, &expected);
    }
}

#[test]
fn distances_across_all_slot_classes() {
    let mut packets = Vec::new();
    for byte in 0..=255u8 {
        packets.push(Packet::Lit(byte));
    }
    // pump the window past 200k so large distances become legal
    for _ in 0..800 {
        packets.push(Packet::Match {
            len: 273,
            dist: 255,
        });
    }
    packets.push(Packet::Match { len: 5, dist: 3 }); // slot < 4
    packets.push(Packet::Match { len: 5, dist: 100 }); // slot tree, reverse bits
    packets.push(Packet::Match { len: 6, dist: 1000 }); // direct bits + align
    packets.push(Packet::Match {
        len: 7,
        dist: 200_000,
    }); // long direct-bit run
    let (stream, expected) = encode_stream(3, 0, 2, 0x100000, &packets, true);
    assert_eq!(expected.len(), 256 + 800 * 273 + 5 + 5 + 6 + 7);
    assert_roundtrip(&stream, &expected);
}

#[test]
fn ring_wraps_and_split_matches_survive_small_outputs() {
    let mut packets = Vec::new();
    for &byte in b"0123456789abcdef" {
        packets.push(Packet::Lit(byte));
    }
    // ~52k of output through a 4k ring: every lap wraps the ring several
    // times and the len-260 copies straddle the chunked output limits
    for _ in 0..200 {
        packets.push(Packet::Match { len: 260, dist: 9 });
    }
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &packets, true);
    assert_eq!(expected.len(), 16 + 200 * 260);

    let mut decoder = decoder_for(&stream);
    let payload = &stream[5..];
    let mut out = Vec::new();
    let mut buf = [0u8; 1000];
    let mut offset = 0;
    loop {
        let step = decoder
            .decode_to_buf(&mut buf, &payload[offset..], FinishMode::FinishAny)
            .unwrap();
        out.extend_from_slice(&buf[..step.bytes_written]);
        offset += step.bytes_read;
        if step.status == Status::FinishedWithMark {
            break;
        }
        assert!(
            step.bytes_read > 0 || step.bytes_written > 0,
            "no progress at offset {}",
            offset
        );
    }
    assert_eq!(out, expected);
}

#[test]
fn strict_finish_requires_a_possible_marker() {
    let packets: Vec<Packet> = b"abcdefghij".iter().map(|&b| Packet::Lit(b)).collect();
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &packets, true);

    // relaxed: stopping mid-stream is reported, not failed
    let mut dest = [0u8; 5];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(step.status, Status::NotFinished);
    assert_eq!(&dest[..], &expected[..5]);

    // strict: the next packet is a literal, so the stream cannot end here
    let mut dest = [0u8; 5];
    assert!(matches!(
        decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishEnd),
        Err(Error::Data(_))
    ));
}

#[test]
fn not_finished_can_be_resumed_with_a_larger_buffer() {
    let packets: Vec<Packet> = b"abcdefghij".iter().map(|&b| Packet::Lit(b)).collect();
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &packets, true);
    let payload = &stream[5..];

    let mut decoder = decoder_for(&stream);
    let mut first = [0u8; 5];
    let step1 = decoder
        .decode_to_buf(&mut first, payload, FinishMode::FinishAny)
        .unwrap();
    assert_eq!(step1.status, Status::NotFinished);
    assert_eq!(&first[..], &expected[..5]);

    let mut rest = [0u8; 32];
    let step2 = decoder
        .decode_to_buf(&mut rest, &payload[step1.bytes_read..], FinishMode::FinishAny)
        .unwrap();
    assert_eq!(step2.status, Status::FinishedWithMark);
    assert_eq!(&rest[..step2.bytes_written], &expected[5..]);
}

#[test]
fn markerless_stream_at_exact_size_may_be_finished() {
    let packets: Vec<Packet> = b"abcdefghij".iter().map(|&b| Packet::Lit(b)).collect();
    let (stream, expected) = encode_stream(3, 0, 2, DICT_4K, &packets, false);

    let mut dest = [0u8; 10];
    let step = decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishEnd)
        .unwrap();
    assert_eq!(step.status, Status::MaybeFinishedWithoutMark);
    assert_eq!(&dest[..], expected.as_slice());

    // stopping short of the end is still a strict-mode failure
    let mut dest = [0u8; 5];
    assert!(matches!(
        decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishEnd),
        Err(Error::Data(_))
    ));
}

#[test]
fn memlimit_is_enforced_while_decoding() {
    let (stream, _) = encode_stream(
        3,
        0,
        2,
        DICT_4K,
        &[
            Packet::Lit(b'a'),
            Packet::Lit(b'b'),
            Packet::Match { len: 62, dist: 1 },
        ],
        true,
    );
    let params = LzmaParams::from_props(&stream[..5]).unwrap();
    let options = Options {
        memlimit: Some(4),
        allow_incomplete: false,
    };
    let mut decoder = LzmaDecoder::with_options(params, &options).unwrap();
    let mut dest = [0u8; 128];
    assert!(matches!(
        decoder.decode_to_buf(&mut dest, &stream[5..], FinishMode::FinishAny),
        Err(Error::MemLimit { limit: 4, .. })
    ));
}

#[test]
fn decode_to_dic_exposes_the_window_directly() {
    let (stream, expected) = encode_stream(
        3,
        0,
        2,
        DICT_4K,
        &[
            Packet::Lit(b'a'),
            Packet::Lit(b'b'),
            Packet::Match { len: 62, dist: 1 },
        ],
        true,
    );
    let mut decoder = decoder_for(&stream);
    let step = decoder
        .decode_to_dic(64, &stream[5..], FinishMode::FinishEnd)
        .unwrap();
    assert_eq!(step.status, Status::FinishedWithMark);
    assert_eq!(step.bytes_written, 64);
    assert_eq!(decoder.dic_pos(), 64);
    assert_eq!(&decoder.dic()[..64], expected.as_slice());
}

#[test]
fn two_decoders_stay_bitwise_identical() {
    let (stream, _) = encode_stream(3, 0, 2, DICT_4K, &mixed_packets(), true);
    let payload = &stream[5..];

    let mut a = decoder_for(&stream);
    let mut b = decoder_for(&stream);
    let mut out_a = [0u8; 512];
    let mut out_b = [0u8; 512];
    let mut pos_a = 0;
    let mut pos_b = 0;

    for chunk in payload.chunks(5) {
        let step_a = a
            .decode_to_buf(&mut out_a[pos_a..], chunk, FinishMode::FinishAny)
            .unwrap();
        let step_b = b
            .decode_to_buf(&mut out_b[pos_b..], chunk, FinishMode::FinishAny)
            .unwrap();
        assert_eq!(step_a.status, step_b.status);
        assert_eq!(step_a.bytes_read, step_b.bytes_read);
        assert_eq!(step_a.bytes_written, step_b.bytes_written);
        pos_a += step_a.bytes_written;
        pos_b += step_b.bytes_written;
    }
    assert_eq!(out_a, out_b);
    assert_eq!(a.dic_pos(), b.dic_pos());
}

#[test]
fn corrupting_the_first_payload_byte_fails_cleanly() {
    let (mut stream, _) = encode_stream(
        3,
        0,
        2,
        DICT_4K,
        &[
            Packet::Lit(b'a'),
            Packet::Lit(b'b'),
            Packet::Match { len: 62, dist: 1 },
        ],
        true,
    );
    stream[5] = 0xFF;
    let mut dest = [0u8; 128];
    assert!(matches!(
        decode_one_shot(&mut dest, &stream[5..], &stream[..5], FinishMode::FinishAny),
        Err(Error::Data("range coder initial byte is not zero"))
    ));
}

#[cfg(feature = "std")]
mod io_facade {
    use super::common::{encode_stream, mixed_packets, Packet};
    use lzma_dec::decompress::Options;
    use lzma_dec::error::Error;
    use std::io::{BufReader, Cursor};

    #[test]
    fn reader_to_writer_decodes_a_whole_stream() {
        let (stream, expected) = encode_stream(3, 0, 2, 0x1000, &mixed_packets(), true);
        let mut input = Cursor::new(stream);
        let mut output = Vec::new();
        lzma_dec::lzma_decompress(&mut input, &mut output).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn tiny_bufreader_windows_are_fine() {
        let (stream, expected) = encode_stream(3, 0, 2, 0x1000, &mixed_packets(), true);
        let mut input = BufReader::with_capacity(7, Cursor::new(stream));
        let mut output = Vec::new();
        lzma_dec::lzma_decompress(&mut input, &mut output).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn truncated_input_is_an_error_unless_incomplete_is_allowed() {
        let (stream, _) = encode_stream(3, 0, 2, 0x1000, &mixed_packets(), true);
        let truncated = &stream[..stream.len() / 2];

        let mut output = Vec::new();
        assert!(matches!(
            lzma_dec::lzma_decompress(&mut Cursor::new(truncated), &mut output),
            Err(Error::Data(_))
        ));

        let options = Options {
            memlimit: None,
            allow_incomplete: true,
        };
        let mut output = Vec::new();
        lzma_dec::lzma_decompress_with_options(
            &mut Cursor::new(truncated),
            &mut output,
            &options,
        )
        .unwrap();
    }

    #[test]
    fn missing_header_is_reported_as_such() {
        let mut output = Vec::new();
        assert!(matches!(
            lzma_dec::lzma_decompress(&mut Cursor::new(&[0x5D, 0x00][..]), &mut output),
            Err(Error::HeaderTooShort { available: 2 })
        ));
    }

    #[test]
    fn literal_runs_of_every_byte_value_roundtrip() {
        let packets: Vec<Packet> = (0..=255u8).cycle().take(700).map(Packet::Lit).collect();
        let (stream, expected) = encode_stream(2, 1, 0, 0x1000, &packets, true);
        let mut output = Vec::new();
        lzma_dec::lzma_decompress(&mut Cursor::new(stream), &mut output).unwrap();
        assert_eq!(output, expected);
    }
}
