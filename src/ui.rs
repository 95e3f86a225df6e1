// ui.rs

use crate::state::SharedTransport;
use crate::transport::{SharedPlayer, ORDER_COUNT, ROWS_PER_PATTERN};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const REFRESH: Duration = Duration::from_millis(100);

fn bar_style(template: &str, chars: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

fn create_row_progress(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(u64::from(ROWS_PER_PATTERN)));
    pb.set_style(bar_style(
        "{prefix:.bold} [{bar:40.cyan}] {pos:>2}/{len}",
        "⣀⣤⣦⣶⣷⣿ ",
    ));
    pb.set_prefix("Row  ");
    pb
}

fn create_order_progress(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(u64::from(ORDER_COUNT)));
    pb.set_style(bar_style(
        "{prefix:.bold} [{bar:20.white/black}] {pos:>2}/{len}",
        "█▊ ",
    ));
    pb.set_prefix("Order");
    pb
}

fn create_transport_spinner(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("Transport");
    pb
}

/// Terminal status display: row and order bars plus a transport line with
/// the published tempo and song position.
pub struct StatusDisplay {
    transport: SharedTransport,
    player: SharedPlayer,

    #[allow(dead_code)]
    multi_progress: MultiProgress,
    row_pb: ProgressBar,
    order_pb: ProgressBar,
    transport_pb: ProgressBar,
}

impl StatusDisplay {
    pub fn new(transport: SharedTransport, player: SharedPlayer) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let row_pb = create_row_progress(&multi_progress);
        let order_pb = create_order_progress(&multi_progress);
        let transport_pb = create_transport_spinner(&multi_progress);

        StatusDisplay {
            transport,
            player,
            multi_progress,
            row_pb,
            order_pb,
            transport_pb,
        }
    }

    /// Redraws once. Returns false if the player lock is poisoned.
    pub fn refresh(&self) -> bool {
        let (order, row, paused) = match self.player.lock() {
            Ok(player) => (player.order(), player.row(), player.is_paused()),
            Err(_) => return false,
        };

        self.row_pb.set_position(u64::from(row));
        self.order_pb.set_position(u64::from(order));

        let state = if self.transport.is_playing() {
            "playing"
        } else if paused {
            "paused"
        } else {
            "stopped"
        };
        self.transport_pb.set_message(format!(
            "BPM: {:.1}, Song position: {}, Transport: {}",
            self.transport.tempo(),
            self.transport.song_position(),
            state
        ));
        self.transport_pb.tick();
        true
    }

    /// Redraws until `shutdown` is set or the player goes away.
    pub fn run(&self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            thread::sleep(REFRESH);
            if !self.refresh() {
                break;
            }
        }
        self.multi_progress.clear().ok();
    }
}
