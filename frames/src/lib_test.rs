use super::*;

#[test]
fn text_frame_exposes_text_view() {
    let frame = Frame::text("Hello");
    assert_eq!(frame.kind(), FrameKind::Text);
    assert_eq!(frame.as_text(), Some("Hello"));
    assert_eq!(frame.payload(), b"Hello");
    assert_eq!(frame.len(), 5);
}

#[test]
fn binary_frame_with_utf8_bytes_still_has_text_view() {
    let frame = Frame::binary(b"Hello".to_vec());
    assert_eq!(frame.kind(), FrameKind::Binary);
    assert_eq!(frame.as_text(), Some("Hello"));
}

#[test]
fn binary_frame_with_invalid_utf8_has_no_text_view() {
    let frame = Frame::binary(vec![0xff, 0xfe, 0x00]);
    assert_eq!(frame.as_text(), None);
    assert_eq!(frame.text_lossy(), "\u{fffd}\u{fffd}\u{0}");
}

#[test]
fn empty_frame_is_empty() {
    let frame = Frame::binary(Vec::new());
    assert!(frame.is_empty());
    assert_eq!(frame.as_text(), Some(""));
}

#[test]
fn frames_with_same_bytes_but_different_kind_differ() {
    assert_ne!(Frame::text("abc"), Frame::binary(b"abc".to_vec()));
}

#[test]
fn content_type_parses_mime_and_aliases() {
    assert_eq!("text/plain".parse::<ContentType>().expect("mime"), ContentType::TextPlain);
    assert_eq!("json".parse::<ContentType>().expect("alias"), ContentType::ApplicationJson);
    assert_eq!(
        " Application/Octet-Stream ".parse::<ContentType>().expect("mixed case"),
        ContentType::ApplicationOctetStream
    );
    let err = "image/png".parse::<ContentType>().expect_err("unknown");
    assert!(matches!(err, CodecError::UnknownContentType(ref s) if s == "image/png"));
}

#[test]
fn content_type_maps_to_plain_client_frame_kind() {
    assert_eq!(ContentType::TextPlain.frame_kind(), FrameKind::Text);
    assert_eq!(ContentType::ApplicationJson.frame_kind(), FrameKind::Text);
    assert_eq!(ContentType::ApplicationOctetStream.frame_kind(), FrameKind::Binary);
}

#[test]
fn binary_end_signal_envelope_encodes_exactly() {
    let msg = ServerMessage::from_payload(
        MessageSource::Server,
        None,
        ContentType::ApplicationOctetStream,
        &[5, 1, 1],
    )
    .expect("binary payload");
    assert_eq!(
        encode_envelope(&msg),
        r#"{"type":"message","from":"server","dataType":"binary","data":"BQEB"}"#
    );
}

#[test]
fn text_and_json_envelopes_keep_payload_shape() {
    let text = ServerMessage::from_payload(MessageSource::Server, None, ContentType::TextPlain, b"Hello")
        .expect("text payload");
    assert_eq!(
        encode_envelope(&text),
        r#"{"type":"message","from":"server","dataType":"text","data":"Hello"}"#
    );

    let json = ServerMessage::from_payload(
        MessageSource::Server,
        None,
        ContentType::ApplicationJson,
        br#"{"hello":"world"}"#,
    )
    .expect("json payload");
    assert_eq!(
        encode_envelope(&json),
        r#"{"type":"message","from":"server","dataType":"json","data":{"hello":"world"}}"#
    );
}

#[test]
fn group_envelope_carries_group_before_data_type() {
    let msg = ServerMessage::from_payload(
        MessageSource::Group,
        Some("GroupA".to_owned()),
        ContentType::TextPlain,
        b"hi",
    )
    .expect("text payload");
    assert_eq!(
        encode_envelope(&msg),
        r#"{"type":"message","from":"group","group":"GroupA","dataType":"text","data":"hi"}"#
    );
}

#[test]
fn from_payload_rejects_invalid_text_and_json() {
    let err = ServerMessage::from_payload(MessageSource::Server, None, ContentType::TextPlain, &[0xff])
        .expect_err("invalid utf-8");
    assert!(matches!(err, CodecError::InvalidUtf8(_)));

    let err = ServerMessage::from_payload(MessageSource::Server, None, ContentType::ApplicationJson, b"{nope")
        .expect_err("invalid json");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn payload_bytes_recovers_binary_data() {
    let msg = ServerMessage::from_payload(
        MessageSource::Server,
        None,
        ContentType::ApplicationOctetStream,
        b"Hello",
    )
    .expect("binary payload");
    assert_eq!(msg.payload_bytes().expect("payload"), b"Hello");
}

#[test]
fn payload_bytes_rejects_system_and_mismatched_data() {
    let connected = ServerMessage::connected(Some("user-1".to_owned()), "conn-1");
    assert!(matches!(connected.payload_bytes(), Err(CodecError::NotAMessage)));

    let mismatched = ServerMessage::Message {
        from: MessageSource::Server,
        group: None,
        data_type: DataType::Binary,
        data: serde_json::json!(42),
    };
    assert!(matches!(
        mismatched.payload_bytes(),
        Err(CodecError::UnexpectedData(DataType::Binary))
    ));
}

#[test]
fn decode_envelope_reads_connected_event() {
    let text = r#"{"type":"system","event":"connected","userId":null,"connectionId":"abc"}"#;
    let msg = decode_envelope(text).expect("system envelope");
    assert_eq!(
        msg,
        ServerMessage::System {
            event: SystemEvent::Connected,
            user_id: None,
            connection_id: Some("abc".to_owned()),
            message: None,
        }
    );
}

#[test]
fn decode_envelope_rejects_unknown_type() {
    let err = decode_envelope(r#"{"type":"ack","ackId":1}"#).expect_err("unknown type");
    assert!(matches!(err, CodecError::Json(_)));
}
