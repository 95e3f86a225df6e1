use rowsyncrs::protocol::mmc::{self, position_to_order_row, LocateType, MmcCommand};
use rowsyncrs::protocol::{DeviceId, Incoming, ProtocolContext, ProtocolError};

fn decode_mmc(ctx: &ProtocolContext, bytes: &[u8]) -> Result<MmcCommand, ProtocolError> {
    match ctx.decode(bytes)? {
        Incoming::Mmc(msg) => Ok(msg.command),
        Incoming::SysEx(msg) => panic!("expected MMC, got {:?}", msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_round_trip() {
        let ctx = ProtocolContext::default();
        let mut buf = [0u8; 16];
        let len = mmc::build_locate(&mut buf, DeviceId::default(), LocateType::Jump, 12, 40);
        assert_eq!(len, 13);

        match decode_mmc(&ctx, &buf[..len]) {
            Ok(MmcCommand::Locate { kind, position }) => {
                assert_eq!(kind, LocateType::Jump);
                assert_eq!(position_to_order_row(&position), (12, 40));
                assert_eq!(position.seconds, 0);
                assert_eq!(position.frames, 0);
                assert_eq!(position.subframes, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_locate_types() {
        let ctx = ProtocolContext::default();
        for kind in [LocateType::Jump, LocateType::LoopStart, LocateType::LoopEnd] {
            let command = MmcCommand::locate(kind, 2, 32);
            let mut buf = [0u8; 16];
            let len = command.encode(&mut buf, DeviceId::BROADCAST);
            assert_eq!(decode_mmc(&ctx, &buf[..len]), Ok(command));
        }
    }

    #[test]
    fn test_transport_commands() {
        let ctx = ProtocolContext::default();
        let cases: [(fn(&mut [u8], DeviceId) -> usize, MmcCommand); 5] = [
            (mmc::build_stop, MmcCommand::Stop),
            (mmc::build_play, MmcCommand::Play),
            (mmc::build_pause, MmcCommand::Pause),
            (mmc::build_record_strobe, MmcCommand::RecordStrobe),
            (mmc::build_record_exit, MmcCommand::RecordExit),
        ];
        for (build, expected) in cases {
            let mut buf = [0u8; 8];
            let len = build(&mut buf, DeviceId::default());
            assert_eq!(len, 6);
            assert_eq!(buf[4], expected.code());
            assert_eq!(decode_mmc(&ctx, &buf[..len]), Ok(expected));
        }
    }

    #[test]
    fn test_deferred_play_is_play() {
        let ctx = ProtocolContext::default();
        assert_eq!(
            decode_mmc(&ctx, &[0xF0, 0x7F, 0x7F, 0x06, 0x03, 0xF7]),
            Ok(MmcCommand::Play)
        );
    }

    #[test]
    fn test_device_gating() {
        let mut buf = [0u8; 8];
        let len = mmc::build_stop(&mut buf, DeviceId::new(5).unwrap());

        let local_five = ProtocolContext::new(DeviceId::new(5).unwrap());
        assert_eq!(decode_mmc(&local_five, &buf[..len]), Ok(MmcCommand::Stop));

        let local_six = ProtocolContext::new(DeviceId::new(6).unwrap());
        assert!(decode_mmc(&local_six, &buf[..len])
            .unwrap_err()
            .is_address_mismatch());
    }

    #[test]
    fn test_rejects_bad_frames() {
        let ctx = ProtocolContext::default();
        // Below the six-byte minimum
        assert!(decode_mmc(&ctx, &[0xF0, 0x7F, 0x00, 0x06, 0xF7]).is_err());
        // Not an MMC command sub-id
        assert_eq!(
            decode_mmc(&ctx, &[0xF0, 0x7F, 0x00, 0x07, 0x01, 0xF7]),
            Err(ProtocolError::BadFraming)
        );
        // Locate cut short
        assert!(matches!(
            decode_mmc(&ctx, &[0xF0, 0x7F, 0x00, 0x06, 0x44, 0x06, 0x01, 0x02, 0xF7]),
            Err(ProtocolError::Truncated { .. })
        ));
        // Unknown locate type
        assert!(decode_mmc(
            &ctx,
            &[0xF0, 0x7F, 0x00, 0x06, 0x44, 0x06, 0x09, 1, 2, 0, 0, 0, 0xF7]
        )
        .is_err());
        assert_eq!(
            decode_mmc(&ctx, &[0xF0, 0x7F, 0x00, 0x06, 0x52, 0xF7]),
            Err(ProtocolError::UnknownCommand(0x52))
        );
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let ctx = ProtocolContext::default();
        assert_eq!(
            decode_mmc(&ctx, &[0xF0, 0x7F, 0x00, 0x06, 0x01, 0x00, 0xF7]),
            Err(ProtocolError::InvalidPayload("trailing bytes after command"))
        );
        assert_eq!(
            decode_mmc(
                &ctx,
                &[0xF0, 0x7F, 0x00, 0x06, 0x44, 0x06, 0x01, 3, 4, 0, 0, 0, 0x00, 0xF7]
            ),
            Err(ProtocolError::InvalidPayload("trailing bytes after locate"))
        );
    }
}
