use crossbeam::channel::Sender;

/// Messages consumed by the playback thread, one per wake-up.
#[derive(Debug)]
pub(crate) enum PlayerCommand {
    /// Restart playback over `[start, end)`; `ack` is answered once the first
    /// buffers are queued.
    Play {
        start: i64,
        end: i64,
        ack: Sender<()>,
    },
    Stop,
    /// Move the end of the playback range.
    SetEnd(i64),
    SetVolume(f32),
    /// A voice finished with (or flushed) the buffer of `slot`.
    BufferConsumed {
        slot: usize,
        buffer: Vec<u8>,
    },
    Terminate,
}

/// Handle a voice uses to hand finished buffers back to the playback thread.
#[derive(Debug, Clone)]
pub struct BufferReturn {
    sender: Sender<PlayerCommand>,
}

impl BufferReturn {
    pub(crate) fn new(sender: Sender<PlayerCommand>) -> Self {
        Self { sender }
    }

    /// Returns `buffer` to `slot`. Silently dropped once the player is gone.
    pub fn give_back(&self, slot: usize, buffer: Vec<u8>) {
        let command = PlayerCommand::BufferConsumed { slot, buffer };
        let _ = self.sender.send(command);
    }
}
