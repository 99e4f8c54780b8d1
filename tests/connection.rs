//! Client and server connections talking to each other over in-memory
//! streams, with and without permessage-deflate.

mod harness;

use harness::{MockStream, encode, init_logging, pump, written_frames};
use wsproto::extensions::compression::Deflate;
use wsproto::extensions::{self, CompressionOptions, PerMessageDeflate, WindowBits};
use wsproto::protocol::{Frame, RSV1};
use wsproto::{Connection, Error, Message, OpCode, WriteOptions};

type Pair = (Connection<MockStream>, Connection<MockStream>);

fn plain_pair() -> Pair {
    (
        Connection::client(MockStream::new()),
        Connection::server(MockStream::new()),
    )
}

/// Negotiate `options` from the client side against a default server and
/// install the result on both connections.
fn deflate_pair(options: CompressionOptions) -> Pair {
    let mut client_extensions =
        extensions::Client::new(vec![Box::new(PerMessageDeflate::new(options))]);
    let mut server_extensions = extensions::Server::default();

    let offer = client_extensions.offer().unwrap();
    let response = server_extensions.accept(&offer).unwrap();
    client_extensions.accept(&response).unwrap();

    let (mut client, mut server) = plain_pair();
    client_extensions.apply(&mut client).unwrap();
    server_extensions.apply(&mut server).unwrap();
    (client, server)
}

fn last_written_flags(conn: &mut Connection<MockStream>) -> u8 {
    conn.framer_mut().get_mut().output[0] & 0b0111_0000
}

// ============================================================================
// Plain connections
// ============================================================================

#[test]
fn test_text_and_binary_exchange() {
    init_logging();
    let (mut client, mut server) = plain_pair();

    client.write_message(&Message::text("Hello World")).unwrap();
    client.write_message(&Message::binary(vec![0u8, 1, 2, 255])).unwrap();
    pump(&mut client, &mut server);

    assert_eq!(server.read_message().unwrap(), Some(Message::text("Hello World")));
    assert_eq!(
        server.read_message().unwrap(),
        Some(Message::binary(vec![0u8, 1, 2, 255]))
    );
    // Nothing more to read: the stream ended between messages.
    assert_eq!(server.read_message().unwrap(), None);
}

#[test]
fn test_client_frames_are_masked() {
    let (mut client, _) = plain_pair();
    client.send_text("masked").unwrap();

    let frames = written_frames(&mut client);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].mask.is_some());
    assert_eq!(&frames[0].unpack()[..], b"masked");
}

#[test]
fn test_close_handshake() {
    init_logging();
    let (client, mut server) = plain_pair();

    let stream = client.close().unwrap();
    server.framer_mut().get_mut().input.extend(stream.output);

    assert_eq!(server.read_message().unwrap(), None);
    assert!(server.is_closed());

    let echoed = written_frames(&mut server);
    assert_eq!(echoed.len(), 1);
    assert_eq!(echoed[0].opcode, OpCode::Close);
    assert_eq!(echoed[0].unpack_close().unwrap().0, Some(1000));
}

#[test]
fn test_abnormal_close_is_an_error() {
    let (mut client, mut server) = plain_pair();
    client.send_close(Some(1001), "going away").unwrap();
    pump(&mut client, &mut server);

    let err = server.read_message().unwrap_err();
    assert!(matches!(err, Error::Closed { code: 1001, .. }));
    assert!(server.is_closed());
}

#[test]
fn test_interleaved_ping_is_answered() {
    let (_, mut server) = plain_pair();
    let mask = Some([1, 2, 3, 4]);
    let input = encode(&[
        Frame::packed(false, OpCode::Text, mask, b"Hello ").unwrap(),
        Frame::ping(b"are you there", mask).unwrap(),
        Frame::continuation(true, b"World", mask).unwrap(),
    ]);
    server.framer_mut().get_mut().input.extend(input);

    assert_eq!(server.read_message().unwrap(), Some(Message::text("Hello World")));

    let replies = written_frames(&mut server);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].opcode, OpCode::Pong);
    assert_eq!(&replies[0].unpack()[..], b"are you there");
}

#[test]
fn test_truncated_stream_inside_message() {
    let (_, mut server) = plain_pair();
    let input = encode(&[Frame::packed(false, OpCode::Binary, None, b"part").unwrap()]);
    server.framer_mut().get_mut().input.extend(input);

    assert!(matches!(server.read_message(), Err(Error::Eof(_))));
}

#[cfg(feature = "json")]
#[test]
fn test_json_messages() {
    use serde::{Deserialize, Serialize};
    use wsproto::Json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Event {
        kind: String,
        id: u64,
    }

    let (mut client, mut server) = plain_pair();
    let event = Event {
        kind: "join".into(),
        id: 42,
    };
    Message::generate(&event, &Json::new())
        .unwrap()
        .send(&mut client)
        .unwrap();
    pump(&mut client, &mut server);

    let message = server.read_message().unwrap().unwrap();
    assert_eq!(message.parse::<Event, _>(&Json::new()).unwrap(), event);
}

// ============================================================================
// permessage-deflate
// ============================================================================

#[test]
fn test_deflate_round_trip_both_directions() {
    init_logging();
    let options = CompressionOptions::new().server_max_window_bits(WindowBits::Bits(9));
    let (mut client, mut server) = deflate_pair(options);
    assert_eq!(client.pipeline().reserved(), RSV1);
    assert_eq!(server.pipeline().reserved(), RSV1);

    client.send_text("Hello World").unwrap();
    assert_eq!(last_written_flags(&mut client), 0b0100_0000);
    pump(&mut client, &mut server);
    assert_eq!(server.read_message().unwrap(), Some(Message::text("Hello World")));

    server.send_text("Hello World").unwrap();
    assert_eq!(last_written_flags(&mut server), 0b0100_0000);
    pump(&mut server, &mut client);
    assert_eq!(client.read_message().unwrap(), Some(Message::text("Hello World")));
}

#[test]
fn test_negotiated_headers() {
    let options = CompressionOptions::new().server_max_window_bits(WindowBits::Bits(9));
    let client = extensions::Client::new(vec![Box::new(PerMessageDeflate::new(options))]);
    let offer = client.offer().unwrap();
    assert_eq!(
        offer,
        vec!["permessage-deflate; client_max_window_bits; server_max_window_bits=9"]
    );

    let mut server = extensions::Server::default();
    let response = server.accept(&offer).unwrap();
    assert_eq!(
        response,
        vec!["permessage-deflate; client_max_window_bits=15; server_max_window_bits=9"]
    );
    assert_eq!(server.accepted(), vec!["permessage-deflate"]);
}

#[test]
fn test_small_window_offer_is_clamped() {
    let options = CompressionOptions::new().server_max_window_bits(WindowBits::Bits(8));
    let (mut client, mut server) = deflate_pair(options);

    for text in ["first message", "second message", "first message"] {
        server.send_text(text).unwrap();
        pump(&mut server, &mut client);
        assert_eq!(client.read_message().unwrap(), Some(Message::text(text)));
    }
}

#[test]
fn test_binary_is_not_compressed_by_default() {
    let (mut client, mut server) = deflate_pair(CompressionOptions::default());

    client.send_binary(b"raw bytes").unwrap();
    assert_eq!(last_written_flags(&mut client), 0);
    pump(&mut client, &mut server);
    assert_eq!(
        server.read_message().unwrap(),
        Some(Message::binary(b"raw bytes".to_vec()))
    );

    client
        .send_binary_with(b"squeezed bytes", WriteOptions::binary().with_compress(true))
        .unwrap();
    assert_eq!(last_written_flags(&mut client), 0b0100_0000);
    pump(&mut client, &mut server);
    assert_eq!(
        server.read_message().unwrap(),
        Some(Message::binary(b"squeezed bytes".to_vec()))
    );
}

#[test]
fn test_uncompressed_text_passes_through() {
    let (mut client, mut server) = deflate_pair(CompressionOptions::default());

    client
        .send_text_with("plain text", WriteOptions::text().with_compress(false))
        .unwrap();
    assert_eq!(last_written_flags(&mut client), 0);
    pump(&mut client, &mut server);
    assert_eq!(server.read_message().unwrap(), Some(Message::text("plain text")));
}

#[test]
fn test_no_context_takeover_session() {
    let options = CompressionOptions::new()
        .client_no_context_takeover(true)
        .server_no_context_takeover(true);
    let (mut client, mut server) = deflate_pair(options);

    let text = "The quick brown fox jumps over the lazy dog";
    let mut sizes = Vec::new();
    for _ in 0..3 {
        client.send_text(text).unwrap();
        sizes.push(client.framer_mut().get_mut().output.len());
        pump(&mut client, &mut server);
        assert_eq!(server.read_message().unwrap(), Some(Message::text(text)));
    }
    // Every message is compressed from scratch.
    assert!(sizes.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_empty_messages_with_shared_context() {
    let (mut client, mut server) = deflate_pair(CompressionOptions::default());

    for text in ["", "a", "", ""] {
        client.send_text(text).unwrap();
        assert_eq!(last_written_flags(&mut client), 0b0100_0000);
        pump(&mut client, &mut server);
        assert_eq!(server.read_message().unwrap(), Some(Message::text(text)));
    }
}

#[test]
fn test_fragmented_compressed_message() {
    let (_, mut server) = deflate_pair(CompressionOptions::default());

    let compressed = Deflate::new(15, true, 6)
        .unwrap()
        .deflate(b"Hello World, in pieces")
        .unwrap();
    let (head, tail) = compressed.split_at(compressed.len() / 2);

    let mask = Some([9, 8, 7, 6]);
    let mut first = Frame::packed(false, OpCode::Text, mask, head).unwrap();
    first.flags = RSV1;
    let last = Frame::continuation(true, tail, mask).unwrap();
    server
        .framer_mut()
        .get_mut()
        .input
        .extend(encode(&[first, last]));

    assert_eq!(
        server.read_message().unwrap(),
        Some(Message::text("Hello World, in pieces"))
    );
}

#[test]
fn test_compressed_frame_without_extension() {
    let (mut client, _) = deflate_pair(CompressionOptions::default());
    let (_, mut plain_server) = plain_pair();

    client.send_text("Hello World").unwrap();
    pump(&mut client, &mut plain_server);

    let err = plain_server.read_message().unwrap_err();
    assert_eq!(err.close_code(), 1002);
    assert!(plain_server.is_closed());

    let frames = written_frames(&mut plain_server);
    assert_eq!(frames[0].opcode, OpCode::Close);
    assert_eq!(frames[0].unpack_close().unwrap().0, Some(1002));
}

#[test]
fn test_corrupt_compressed_payload() {
    let (_, mut server) = deflate_pair(CompressionOptions::default());

    let mut frame = Frame::packed(true, OpCode::Text, Some([1, 1, 1, 1]), &[0xff, 0xff, 0xff])
        .unwrap();
    frame.flags = RSV1;
    server.framer_mut().get_mut().input.extend(encode(&[frame]));

    let err = server.read_message().unwrap_err();
    assert_eq!(err.close_code(), 1007);
    assert!(server.is_closed());
}
