use rowsyncrs::control::{ControlRouter, PlaybackControl};
use rowsyncrs::midi::{MidiEngine, MidiMessage, MidiOut, MockMidiEngine};
use rowsyncrs::protocol::mmc;
use rowsyncrs::protocol::snapshot::PlayerStateHeader;
use rowsyncrs::protocol::sysex::{self, LoopRange, SysExCommand};
use rowsyncrs::protocol::{DeviceId, Incoming, PlayerStateSnapshot};

/// Records every call as a short string.
#[derive(Default)]
struct RecordingPlayer {
    calls: Vec<String>,
    state: Option<PlayerStateSnapshot>,
    mirrored: Option<PlayerStateSnapshot>,
}

impl PlaybackControl for RecordingPlayer {
    fn play(&mut self) {
        self.calls.push("play".into());
    }

    fn stop(&mut self) {
        self.calls.push("stop".into());
    }

    fn pause(&mut self) {
        self.calls.push("pause".into());
    }

    fn set_channel_mute(&mut self, channel: u8, muted: bool) {
        self.calls.push(format!("mute {} {}", channel, muted));
    }

    fn jump(&mut self, order: u8, row: u8) {
        self.calls.push(format!("jump {} {}", order, row));
    }

    fn set_loop_range(&mut self, range: LoopRange) {
        self.calls.push(format!(
            "loop {}:{}-{}:{}",
            range.start_order, range.start_row, range.end_order, range.end_row
        ));
    }

    fn set_loop_start(&mut self, order: u8, row: u8) {
        self.calls.push(format!("loop_start {} {}", order, row));
    }

    fn set_tempo(&mut self, bpm: u16) {
        self.calls.push(format!("tempo {}", bpm));
    }

    fn remote_ping(&mut self, sender: u8) {
        self.calls.push(format!("ping {}", sender));
    }

    fn player_state(&self) -> Option<PlayerStateSnapshot> {
        self.state.clone()
    }

    fn mirror_state(&mut self, state: &PlayerStateSnapshot) {
        self.mirrored = Some(state.clone());
    }
}

fn device(id: u8) -> DeviceId {
    DeviceId::new(id).unwrap()
}

fn frame(command: SysExCommand, target: DeviceId) -> Vec<u8> {
    command.to_bytes(target).unwrap()
}

fn router_with_mock(id: u8) -> (ControlRouter, MockMidiEngine) {
    let mock = MockMidiEngine::new();
    let router = ControlRouter::new(device(id), MidiOut::with_device(mock.clone()));
    (router, mock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_respects_device_id() {
        let (router, _mock) = router_with_mock(5);
        let mut player = RecordingPlayer::default();

        router.handle(&frame(SysExCommand::Play, device(5)), &mut player);
        router.handle(&frame(SysExCommand::Stop, DeviceId::BROADCAST), &mut player);
        // Addressed to someone else: dropped without dispatch
        assert!(router
            .handle(&frame(SysExCommand::Pause, device(6)), &mut player)
            .is_none());

        assert_eq!(player.calls, vec!["play", "stop"]);
    }

    #[test]
    fn test_sysex_commands_reach_the_player() {
        let (router, _mock) = router_with_mock(0);
        let mut player = RecordingPlayer::default();
        let target = device(0);

        for command in [
            SysExCommand::Mute {
                channel: 4,
                muted: true,
            },
            SysExCommand::Jump { order: 3, row: 16 },
            SysExCommand::SetLoop(LoopRange {
                start_order: 1,
                start_row: 0,
                end_order: 1,
                end_row: 63,
            }),
            SysExCommand::SetTempo(138),
            SysExCommand::Ping,
        ] {
            router.handle(&frame(command, target), &mut player);
        }

        assert_eq!(
            player.calls,
            vec![
                "mute 4 true",
                "jump 3 16",
                "loop 1:0-1:63",
                "tempo 138",
                "ping 0"
            ]
        );
    }

    #[test]
    fn test_ping_is_not_answered() {
        let (router, mock) = router_with_mock(0);
        let mut player = RecordingPlayer::default();
        router.handle(&frame(SysExCommand::Ping, device(0)), &mut player);
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_mmc_commands_reach_the_player() {
        let (router, _mock) = router_with_mock(0);
        let mut player = RecordingPlayer::default();

        let mut buf = [0u8; 16];
        let len = mmc::build_play(&mut buf, DeviceId::BROADCAST);
        router.handle(&buf[..len], &mut player);

        let len = mmc::build_locate(
            &mut buf,
            device(0),
            mmc::LocateType::Jump,
            12,
            40,
        );
        router.handle(&buf[..len], &mut player);

        let len = mmc::build_locate(
            &mut buf,
            device(0),
            mmc::LocateType::LoopStart,
            2,
            0,
        );
        router.handle(&buf[..len], &mut player);

        assert_eq!(player.calls, vec!["play", "jump 12 40", "loop_start 2 0"]);
    }

    #[test]
    fn test_malformed_input_is_dropped() {
        let (router, mock) = router_with_mock(0);
        let mut player = RecordingPlayer::default();

        assert!(router.handle(&[], &mut player).is_none());
        assert!(router.handle(&[0xF0, 0x7D], &mut player).is_none());
        assert!(router
            .handle(&[0xF0, 0x41, 0x10, 0x42, 0x12, 0xF7], &mut player)
            .is_none());
        assert!(player.calls.is_empty());
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_state_request_is_answered_and_mirrored() {
        let header = PlayerStateHeader {
            order: 7,
            row: 32,
            tempo: 140,
            ..Default::default()
        };
        let snapshot =
            PlayerStateSnapshot::new(header, &[true, false, false, true], &[64; 4], &[32; 4])
                .unwrap();

        let (router, mock) = router_with_mock(1);
        let mut source = RecordingPlayer {
            state: Some(snapshot.clone()),
            ..Default::default()
        };
        router.handle(&frame(SysExCommand::GetPlayerState, device(1)), &mut source);

        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        let response = match &sent[0] {
            MidiMessage::SysEx(bytes) => bytes.clone(),
            other => panic!("expected SysEx, got {:?}", other),
        };
        // Broadcast so any mirroring instance accepts it
        assert_eq!(response[2], 0x7F);

        let (mirror_router, _) = router_with_mock(9);
        let mut mirror = RecordingPlayer::default();
        let decoded = mirror_router.handle(&response, &mut mirror);
        assert!(matches!(decoded, Some(Incoming::SysEx(_))));
        assert_eq!(mirror.mirrored, Some(snapshot));
    }

    #[test]
    fn test_state_request_without_state_sends_nothing() {
        let (router, mock) = router_with_mock(0);
        let mut player = RecordingPlayer::default();
        let mut buf = [0u8; 8];
        let len = sysex::build_get_player_state(&mut buf, DeviceId::BROADCAST);
        router.handle(&buf[..len], &mut player);
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_packets_from_input_queue() {
        let (router, _mock) = router_with_mock(0);
        let mut input = MockMidiEngine::new();
        let mut player = RecordingPlayer::default();

        input.push_incoming(&frame(SysExCommand::Play, device(0)));
        input.push_incoming(&[0xF8]);
        input.push_incoming(&frame(SysExCommand::Jump { order: 1, row: 2 }, device(0)));

        while let Ok(packet) = input.recv() {
            router.handle(&packet, &mut player);
        }

        // Realtime bytes are not control input
        assert_eq!(player.calls, vec!["play", "jump 1 2"]);
        assert!(input.recv().is_err());
    }

    #[test]
    fn test_independent_contexts() {
        let (first, _) = router_with_mock(1);
        let (second, _) = router_with_mock(2);
        let mut a = RecordingPlayer::default();
        let mut b = RecordingPlayer::default();

        let to_two = frame(SysExCommand::Play, device(2));
        first.handle(&to_two, &mut a);
        second.handle(&to_two, &mut b);

        assert!(a.calls.is_empty());
        assert_eq!(b.calls, vec!["play"]);
    }
}
