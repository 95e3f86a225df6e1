use rowsyncrs::state::{TransportState, MAX_SONG_POSITION};
use std::sync::Arc;
use std::thread;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_initialization() {
        let state = TransportState::new();
        assert_eq!(state.tempo(), 125.0);
        assert_eq!(state.song_position(), 0);
        assert!(!state.is_playing());
        assert_eq!(state.take_song_position_request(), None);
    }

    #[test]
    fn test_publish_does_not_request_spp() {
        let state = TransportState::new();
        state.publish(140.0, true, 96);
        assert_eq!(state.tempo(), 140.0);
        assert!(state.is_playing());
        assert_eq!(state.song_position(), 96);
        assert_eq!(state.take_song_position_request(), None);
    }

    #[test]
    fn test_spp_request_is_consumed_once() {
        let state = TransportState::new();
        state.request_song_position(641);
        assert_eq!(state.take_song_position_request(), Some(641));
        assert_eq!(state.take_song_position_request(), None);
    }

    #[test]
    fn test_spp_request_clamps_to_fourteen_bits() {
        let state = TransportState::new();
        state.request_song_position(100_000);
        assert_eq!(
            state.take_song_position_request(),
            Some(MAX_SONG_POSITION as u16)
        );
    }

    #[test]
    fn test_cross_thread_publication() {
        let state = TransportState::shared();

        // The writer never waits on the reader
        let writer_state = Arc::clone(&state);
        let writer = thread::spawn(move || {
            for beat in 0..1000 {
                writer_state.publish(120.0 + f64::from(beat % 10), true, beat);
            }
        });
        writer.join().unwrap();

        assert!(state.is_playing());
        assert_eq!(state.song_position(), 999);
        assert_eq!(state.tempo(), 129.0);
    }
}
