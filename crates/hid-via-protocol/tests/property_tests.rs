use huedeck_hid_via_protocol::session::mock::EchoDevice;
use huedeck_hid_via_protocol::{
    RawEvent, Rotation, ViaProtocolError, ViaSession, decode_response, encode_command,
    ids::{FRAME_SIZE, PARAMS_CAPACITY, REPORT_SELECTOR, REPORT_SIZE},
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    /// Any in-capacity parameter slice encodes into a full-size frame with
    /// the parameters placed verbatim and the remainder zero-padded.
    #[test]
    fn prop_encode_pads_and_places_params(
        command in any::<u8>(),
        params in proptest::collection::vec(any::<u8>(), 0..=PARAMS_CAPACITY),
    ) {
        let frame = encode_command(command, &params).expect("in-capacity params must encode");
        prop_assert_eq!(frame.len(), FRAME_SIZE);
        prop_assert_eq!(frame[0], REPORT_SELECTOR);
        prop_assert_eq!(frame[1], command);
        prop_assert_eq!(&frame[2..2 + params.len()], params.as_slice());
        prop_assert!(frame[2 + params.len()..].iter().all(|&b| b == 0));
    }

    /// Over-capacity parameter slices always fail, never truncate.
    #[test]
    fn prop_encode_rejects_over_capacity(
        command in any::<u8>(),
        params in proptest::collection::vec(any::<u8>(), PARAMS_CAPACITY + 1..=2 * PARAMS_CAPACITY),
    ) {
        let err = encode_command(command, &params).expect_err("over-capacity must fail");
        prop_assert!(matches!(err, ViaProtocolError::ParamsTooLarge { .. }));
    }

    /// Decoding succeeds exactly when the first byte echoes the command.
    #[test]
    fn prop_decode_success_iff_echo(
        command in any::<u8>(),
        raw in proptest::collection::vec(any::<u8>(), REPORT_SIZE..=REPORT_SIZE + 8),
    ) {
        let response = decode_response(command, &raw).expect("full-size frames decode");
        prop_assert_eq!(response.success(), raw[0] == command);
    }

    /// Short buffers never decode.
    #[test]
    fn prop_decode_rejects_short_frames(
        command in any::<u8>(),
        raw in proptest::collection::vec(any::<u8>(), 0..REPORT_SIZE),
    ) {
        let err = decode_response(command, &raw).expect_err("short frames must fail");
        prop_assert!(matches!(err, ViaProtocolError::MalformedFrame { .. }));
    }

    /// Against a state-echoing device, a written encoder mapping reads back
    /// unchanged for the same (layer, encoder, direction) key.
    #[test]
    fn prop_encoder_mapping_round_trip(
        layer in 0u8..4,
        encoder in 0u8..3,
        clockwise in any::<bool>(),
        keycode in any::<u16>(),
    ) {
        let mut session = ViaSession::new(EchoDevice::new());
        prop_assert!(session.set_encoder_mapping(layer, encoder, clockwise, keycode).expect("set"));
        prop_assert_eq!(
            session.encoder_mapping(layer, encoder, clockwise).expect("get"),
            Some(keycode)
        );
    }

    /// Report identity parsing keeps the bytes it saw; rotation holds only
    /// for the two sentinel values.
    #[test]
    fn prop_raw_event_identity(
        family in any::<u8>(),
        code in any::<u8>(),
        direction in any::<u8>(),
    ) {
        let mut report = [0u8; 8];
        report[0] = family;
        report[1] = code;
        report[7] = direction;
        let event = RawEvent::parse(&report).expect("8-byte reports parse");
        prop_assert_eq!(event.family, family);
        prop_assert_eq!(event.code, code);
        prop_assert_eq!(event.direction_byte, direction);
        match direction {
            0x20 => prop_assert_eq!(event.rotation(), Some(Rotation::Clockwise)),
            0x40 => prop_assert_eq!(event.rotation(), Some(Rotation::CounterClockwise)),
            _ => prop_assert_eq!(event.rotation(), None),
        }
    }
}
