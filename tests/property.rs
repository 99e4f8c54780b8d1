//! Property-based tests for the frame codec and the deflate stages.
//!
//! These tests use proptest to fuzz frame serialization and compression and
//! find edge cases.

mod harness;

use harness::MockStream;
use proptest::prelude::*;
use wsproto::extensions::compression::{Deflate, Inflate};
use wsproto::protocol::mask::apply_mask_bytewise;
use wsproto::protocol::{Frame, Framer, MAXIMUM_ALLOWED_FRAME_SIZE, OpCode, apply_mask};

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Continuation),
    ]
}

fn control_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Close), Just(OpCode::Ping), Just(OpCode::Pong),]
}

fn write_then_read(frame: &Frame) -> (usize, Result<Frame, wsproto::Error>) {
    let mut buf = Vec::new();
    frame.write(&mut buf).unwrap();
    let written = buf.len();

    let mut framer = Framer::new(MockStream::with_input(&buf));
    (written, framer.read_frame(MAXIMUM_ALLOWED_FRAME_SIZE))
}

proptest! {
    // =========================================================================
    // Property 1: read(write(frame)) == frame
    // =========================================================================
    #[test]
    fn test_roundtrip(
        fin in any::<bool>(),
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..1000),
        mask in prop::option::of(any::<[u8; 4]>())
    ) {
        let frame = Frame::packed(fin, opcode, mask, &payload).unwrap();
        let (_, parsed) = write_then_read(&frame);
        let parsed = parsed.unwrap();

        prop_assert_eq!(&parsed, &frame);
        prop_assert_eq!(&parsed.unpack()[..], payload.as_slice());
    }

    // =========================================================================
    // Property 2: Masking is reversible (XOR is self-inverse)
    // =========================================================================
    #[test]
    fn test_mask_reversible(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        mask in any::<[u8; 4]>()
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, mask);
        apply_mask(&mut masked, mask);
        prop_assert_eq!(data, masked);
    }

    // =========================================================================
    // Property 3: Word-wise masking matches the bytewise definition
    // =========================================================================
    #[test]
    fn test_mask_matches_bytewise(
        data in prop::collection::vec(any::<u8>(), 0..300),
        mask in any::<[u8; 4]>()
    ) {
        let mut fast = data.clone();
        let mut slow = data;
        apply_mask(&mut fast, mask);
        apply_mask_bytewise(&mut slow, mask);
        prop_assert_eq!(fast, slow);
    }

    // =========================================================================
    // Property 4: Wire size matches the bytes actually written
    // =========================================================================
    #[test]
    fn test_wire_size_accuracy(
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..70000),
        masked in any::<bool>()
    ) {
        let mask = masked.then_some([0x12, 0x34, 0x56, 0x78]);
        let frame = Frame::packed(true, opcode, mask, &payload).unwrap();
        let (written, parsed) = write_then_read(&frame);

        prop_assert_eq!(frame.wire_size(), written as u64);
        prop_assert_eq!(parsed.unwrap().length, payload.len() as u64);
    }

    // =========================================================================
    // Property 5: Oversized control frames never make it onto the wire
    // =========================================================================
    #[test]
    fn test_control_frame_size_limit(
        opcode in control_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..256)
    ) {
        let frame = Frame::packed(true, opcode, None, &payload).unwrap();
        let mut buf = Vec::new();
        let result = frame.write(&mut buf);
        prop_assert_eq!(result.is_ok(), payload.len() <= 125);
    }

    // =========================================================================
    // Property 6: A truncated frame is reported as end of stream
    // =========================================================================
    #[test]
    fn test_truncated_frame_is_eof(
        payload in prop::collection::vec(any::<u8>(), 1..500),
        truncate_by in 1..50usize
    ) {
        let frame = Frame::binary(&payload, Some([1, 2, 3, 4])).unwrap();
        let mut buf = Vec::new();
        frame.write(&mut buf).unwrap();
        buf.truncate(buf.len().saturating_sub(truncate_by).max(1));

        let mut framer = Framer::new(MockStream::with_input(&buf));
        let result = framer.read_any_frame();
        prop_assert!(matches!(result, Err(wsproto::Error::Eof(_))), "{:?}", result);
    }

    // =========================================================================
    // Property 7: inflate(deflate(data)) == data, across messages
    // =========================================================================
    #[test]
    fn test_deflate_inflate(
        messages in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2000), 1..5),
        window_bits in 9u8..=15,
        context_takeover in any::<bool>()
    ) {
        let mut deflate = Deflate::new(window_bits, context_takeover, 6).unwrap();
        let mut inflate = Inflate::new(window_bits, context_takeover).unwrap();

        for message in &messages {
            let compressed = deflate.deflate(message).unwrap();
            prop_assert_eq!(&inflate.inflate(&compressed).unwrap(), message);
        }
    }
}

#[cfg(test)]
mod targeted_tests {
    use super::*;

    /// Each length bucket uses its own encoding.
    #[test]
    fn test_length_encoding_boundaries() {
        for (len, header) in [
            (0usize, 2u64),
            (125, 2),
            (126, 4),
            (65535, 4),
            (65536, 10),
        ] {
            let frame = Frame::binary(&vec![0xAB; len], None).unwrap();
            assert_eq!(frame.wire_size(), header + len as u64);

            let (_, parsed) = write_then_read(&frame);
            assert_eq!(parsed.unwrap().length, len as u64);
        }
    }

    /// Test all zero mask (edge case)
    #[test]
    fn test_zero_mask() {
        let frame = Frame::text(b"test payload", Some([0, 0, 0, 0])).unwrap();
        assert_eq!(&frame.payload[..], b"test payload");

        let (_, parsed) = write_then_read(&frame);
        assert_eq!(&parsed.unwrap().unpack()[..], b"test payload");
    }

    /// Test all 0xFF mask (edge case)
    #[test]
    fn test_ff_mask() {
        let frame = Frame::text(b"test payload", Some([0xFF; 4])).unwrap();
        let (_, parsed) = write_then_read(&frame);
        assert_eq!(&parsed.unwrap().unpack()[..], b"test payload");
    }
}
