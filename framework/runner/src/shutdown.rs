use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Handed to a helper thread so it can tell when to stop.
pub(crate) struct StopListener {
    receiver: Receiver<()>,
}

impl StopListener {
    /// Wait up to `timeout` for the stop signal. Returns `true` if the thread should stop.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// A thread that runs alongside the load and is stopped when the load ends.
pub(crate) struct HelperThread {
    name: String,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HelperThread {
    /// Spawn `body` on a named thread.
    ///
    /// A helper is never required for a run to proceed, so failing to spawn one is only logged.
    pub(crate) fn spawn<F>(name: &str, body: F) -> Option<Self>
    where
        F: FnOnce(StopListener) + Send + 'static,
    {
        let (stop, receiver) = mpsc::channel();
        match std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(StopListener { receiver }))
        {
            Ok(handle) => Some(Self {
                name: name.to_string(),
                stop: Some(stop),
                handle: Some(handle),
            }),
            Err(e) => {
                log::warn!("Failed to start {name} thread: {e}");
                None
            }
        }
    }

    /// Signal the thread and wait for it to exit.
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The thread may have exited already
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("The {} thread panicked", self.name);
            }
            log::trace!("{} thread stopped", self.name);
        }
    }
}

impl Drop for HelperThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
