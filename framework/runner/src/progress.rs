use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use crate::shutdown::HelperThread;

/// Displays a progress bar over the capture window while the load runs, to show the user how
/// much of the window is left.
pub(crate) fn start_progress(capture_window: Duration) -> Option<HelperThread> {
    HelperThread::spawn("progress", move |listener| {
        let start_time = Instant::now();
        let pb = ProgressBar::new(capture_window.as_secs());
        match ProgressStyle::with_template(
            "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {capture_window}]",
        ) {
            Ok(style) => pb.set_style(
                style
                    .with_key("capture_window", {
                        let hours = capture_window.as_secs() / 3600;
                        let minutes = (capture_window.as_secs() % 3600) / 60;
                        let seconds = capture_window.as_secs() % 60;
                        move |_state: &ProgressState, w: &mut dyn Write| {
                            let _ = write!(w, "{hours:02}:{minutes:02}:{seconds:02}");
                        }
                    })
                    .progress_chars("#>-"),
            ),
            Err(e) => log::debug!("Falling back to the default progress style: {e}"),
        }

        loop {
            let new = min(start_time.elapsed().as_secs(), capture_window.as_secs());
            pb.set_position(new);

            if listener.wait(Duration::from_secs(1)) {
                log::trace!("Progress thread shutting down");
                pb.finish_and_clear();
                break;
            }
        }
    })
}
