use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

/// Flags the playback thread publishes to the control side. All reads are
/// non-blocking.
#[derive(Debug, Default)]
pub(crate) struct Status {
    thread_running: AtomicBool,
    is_playing: AtomicBool,
    error_happened: AtomicBool,
    error_message: Mutex<Option<String>>,
}

impl Status {
    pub fn set_running(&self, running: bool) {
        self.thread_running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.thread_running.load(Ordering::SeqCst)
    }

    pub fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    pub fn has_error(&self) -> bool {
        self.error_happened.load(Ordering::SeqCst)
    }

    /// Records a fatal error. Playback is reported as stopped from here on.
    pub fn report_error(&self, message: String) {
        self.set_playing(false);
        *self.message() = Some(message);
        self.error_happened.store(true, Ordering::SeqCst);
    }

    pub fn error_message(&self) -> Option<String> {
        self.message().clone()
    }

    fn message(&self) -> MutexGuard<'_, Option<String>> {
        self.error_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
