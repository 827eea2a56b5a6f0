//! Property based tests for the frame layer.
//!
//! - Any message survives framing and arbitrary chunking
//! - Noise around a frame never produces a phantom message or a panic
//! - Single bit corruption of a header or payload is always caught
//! - Arbitrary input never panics and always terminates

use proptest::prelude::*;
use rfs_serial_link::rfs_checksum::{header_checksum, header_is_valid, payload_crc32};
use rfs_serial_link::rfs_shared::{HEADER_LEN, SOF};
use rfs_serial_link::{LinkConfig, MessageType, ProtocolVariant, RfsLink, encode_message};

fn message_type_strategy() -> impl Strategy<Value = MessageType> {
    prop::sample::select(MessageType::ALL.to_vec())
}

fn variant_strategy() -> impl Strategy<Value = ProtocolVariant> {
    prop_oneof![
        Just(ProtocolVariant::CrcFullPayload),
        Just(ProtocolVariant::CrcBodyOnly),
        Just(ProtocolVariant::NoCrc),
    ]
}

// Noise without the frame marker, so it cannot open a false frame
fn noise_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("not SOF", |b| *b != SOF), 0..max)
}

#[test]
fn prop_message_survives_any_chunking() {
    proptest!(|(
        msg_type in message_type_strategy(),
        seq in any::<u16>(),
        body in prop::collection::vec(any::<u8>(), 0..512),
        variant in variant_strategy(),
        chunk in 1usize..64
    )| {
        let mut link = RfsLink::new(LinkConfig::default().with_variant(variant));
        let frame = encode_message(msg_type, seq, &body, variant).unwrap();

        let mut got = Vec::new();
        for part in frame.chunks(chunk) {
            link.add_data(part);
            if let Some(msg) = link.parse_one_message() {
                got.push(msg);
            }
        }

        prop_assert_eq!(got.len(), 1);
        prop_assert_eq!(got[0].msg_type, msg_type);
        prop_assert_eq!(got[0].sequence_id, seq);
        prop_assert_eq!(&got[0].body, &body);
        prop_assert!(link.buffer().is_empty());
    });
}

#[test]
fn prop_noise_around_frame_yields_exactly_one() {
    proptest!(|(
        before in noise_strategy(2048),
        after in noise_strategy(2048),
        body in prop::collection::vec(any::<u8>(), 0..128)
    )| {
        let mut link = RfsLink::new(LinkConfig::default());
        let frame = encode_message(MessageType::DebugInfo, 7, &body, ProtocolVariant::CrcFullPayload).unwrap();

        link.add_data(&before);
        link.add_data(&frame);
        link.add_data(&after);

        let mut processed = 0;
        for _ in 0..16 {
            processed += link.process_available(10);
        }

        let stats = link.stats();
        prop_assert_eq!(processed, 1);
        prop_assert!(link.buffer().is_empty());
        prop_assert_eq!(stats.bytes_skipped, (before.len() + after.len()) as u64);
        // One count per scan that skipped more than one byte, scans are 4096 wide
        prop_assert!(stats.sync_errors <= 2);
        if before.len() > 1 {
            prop_assert!(stats.sync_errors >= 1);
        }
    });
}

#[test]
fn prop_header_corruption_is_detected() {
    proptest!(|(size in 1u16..=u16::MAX, byte in 0usize..3, bit in 0u8..8)| {
        let le = size.to_le_bytes();
        let mut header = [SOF, le[0], le[1], header_checksum([SOF, le[0], le[1]])];
        prop_assert!(header_is_valid(&header));

        header[byte] ^= 1 << bit;
        prop_assert!(!header_is_valid(&header));
    });
}

#[test]
fn prop_payload_bit_flip_changes_crc() {
    proptest!(|(
        payload in prop::collection::vec(any::<u8>(), 1..1024),
        idx in any::<prop::sample::Index>(),
        bit in 0u8..8
    )| {
        let mut flipped = payload.clone();
        let i = idx.index(payload.len());
        flipped[i] ^= 1 << bit;
        prop_assert_ne!(payload_crc32(&payload), payload_crc32(&flipped));
    });
}

#[test]
fn prop_corrupted_frame_never_delivered() {
    proptest!(|(
        body in prop::collection::vec(any::<u8>(), 0..256),
        idx in any::<prop::sample::Index>(),
        bit in 0u8..8
    )| {
        let mut link = RfsLink::new(LinkConfig::default());
        let mut frame = encode_message(MessageType::EmbeddingData, 1, &body, ProtocolVariant::CrcFullPayload).unwrap();

        // Anything past the header: message header, body or CRC
        let i = HEADER_LEN + idx.index(frame.len() - HEADER_LEN);
        frame[i] ^= 1 << bit;

        link.add_data(&frame);
        let mut delivered = 0;
        for _ in 0..8 {
            delivered += link.process_available(10);
        }

        prop_assert_eq!(delivered, 0);
        prop_assert_eq!(link.stats().crc_errors, 1);
    });
}

#[test]
fn prop_arbitrary_input_terminates() {
    proptest!(|(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 0..16)
    )| {
        let mut link = RfsLink::new(LinkConfig::default().with_buffer_capacity(1024));
        for chunk in &chunks {
            link.add_data(chunk);
            link.process_available(100);
        }

        // Every pass either consumes bytes or leaves the buffer waiting for more
        let mut passes = 0;
        loop {
            let before = link.buffer().available();
            let msg = link.parse_one_message();
            passes += 1;
            if msg.is_none() && link.buffer().available() == before {
                break;
            }
        }
        prop_assert!(passes <= 1024 + 1);
    });
}
