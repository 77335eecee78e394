/// One fixed-capacity buffer of the playback ring.
#[derive(Debug)]
enum Slot {
    Free(Vec<u8>),
    /// The buffer is owned by the voice until it comes back.
    Submitted,
}

/// The playback ring: `len()` slots, each either free (holding its buffer)
/// or submitted to the voice.
#[derive(Debug)]
pub(crate) struct SlotArena {
    slots: Vec<Slot>,
    slot_bytes: usize,
}

impl SlotArena {
    pub fn new(count: usize, slot_bytes: usize) -> Self {
        let slots = (0..count)
            .map(|_| Slot::Free(Vec::with_capacity(slot_bytes)))
            .collect();
        Self { slots, slot_bytes }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_bytes(&self) -> usize {
        self.slot_bytes
    }

    pub fn is_free(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Free(_)))
    }

    pub fn all_free(&self) -> bool {
        self.slots.iter().all(|slot| matches!(slot, Slot::Free(_)))
    }

    /// Takes the buffer out of a free slot and marks it submitted.
    pub fn claim(&mut self, index: usize) -> Option<Vec<u8>> {
        let slot = self.slots.get_mut(index)?;
        match std::mem::replace(slot, Slot::Submitted) {
            Slot::Free(buffer) => Some(buffer),
            Slot::Submitted => None,
        }
    }

    /// Puts a buffer back into a submitted slot. Returns `false` if the slot
    /// does not exist or was not submitted.
    pub fn release(&mut self, index: usize, buffer: Vec<u8>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if matches!(slot, Slot::Submitted) => {
                *slot = Slot::Free(buffer);
                true
            }
            _ => false,
        }
    }
}
