use hls_follower::{FollowerEvent, FollowerPhase};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use super::format_bytes;

fn follow_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[derive(Debug, Default)]
struct Totals {
    segments: u64,
    bytes: u64,
    last_sequence: Option<u64>,
}

/// Live summary of saved segments driven by follower events.
#[derive(Clone)]
pub struct ProgressManager {
    bar: Option<ProgressBar>,
    totals: Arc<Mutex<Totals>>,
}

impl ProgressManager {
    pub fn new(multi: MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(follow_style());
        bar.set_prefix("opening");
        bar.enable_steady_tick(Duration::from_millis(250));
        Self {
            bar: Some(bar),
            totals: Arc::new(Mutex::new(Totals::default())),
        }
    }

    pub fn new_disabled() -> Self {
        Self {
            bar: None,
            totals: Arc::new(Mutex::new(Totals::default())),
        }
    }

    pub fn handle_event(&self, event: FollowerEvent) {
        let Some(bar) = &self.bar else {
            return;
        };
        let Ok(mut totals) = self.totals.lock() else {
            return;
        };

        match event {
            FollowerEvent::PhaseChanged(phase) => {
                bar.set_prefix(phase_label(phase));
            }
            FollowerEvent::Opened { url, .. } => {
                bar.println(format!("Following {url}"));
            }
            FollowerEvent::SegmentSaved { sequence, size, .. } => {
                totals.segments += 1;
                totals.bytes += size;
                totals.last_sequence = Some(sequence);
            }
            FollowerEvent::GapDetected { missing } => {
                bar.println(format!(
                    "Missed segments {}..{} ({} lost)",
                    missing.start,
                    missing.end,
                    missing.end - missing.start
                ));
            }
            FollowerEvent::StreamEnded => {
                bar.finish_with_message(summary(&totals));
                return;
            }
            FollowerEvent::SegmentListed { .. } | FollowerEvent::PlaylistRefreshed { .. } => {}
        }
        bar.set_message(summary(&totals));
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }
}

fn phase_label(phase: FollowerPhase) -> &'static str {
    match phase {
        FollowerPhase::Opening => "opening",
        FollowerPhase::Following => "following",
        FollowerPhase::Idle => "idle",
        FollowerPhase::Downloading => "downloading",
        FollowerPhase::Failed => "failed",
        FollowerPhase::Stopped => "stopped",
    }
}

fn summary(totals: &Totals) -> String {
    match totals.last_sequence {
        Some(sequence) => format!(
            "{} segments, {} (last #{sequence})",
            totals.segments,
            format_bytes(totals.bytes)
        ),
        None => "waiting for new segments".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_summary_tracks_saved_segments() {
        let progress = ProgressManager::new(MultiProgress::with_draw_target(
            indicatif::ProgressDrawTarget::hidden(),
        ));
        for sequence in [7, 8] {
            progress.handle_event(FollowerEvent::SegmentSaved {
                sequence,
                uri: format!("s{sequence}.ts"),
                path: PathBuf::from(format!("s{sequence}.ts")),
                size: 1024,
            });
        }

        let totals = progress.totals.lock().unwrap();
        assert_eq!(totals.segments, 2);
        assert_eq!(summary(&totals), "2 segments, 2.00 KB (last #8)");
    }

    #[test]
    fn test_disabled_ignores_events() {
        let progress = ProgressManager::new_disabled();
        progress.handle_event(FollowerEvent::StreamEnded);
        assert_eq!(progress.totals.lock().unwrap().segments, 0);
    }
}
