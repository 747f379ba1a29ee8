use crate::ALIGNMENT;

/// Mask for the low bit of a header word, which holds the allocation status.
const STATUS_BIT: usize = 1;

/// Decoded form of a block header word.
///
/// The payload size and the allocation status share one machine word: the
/// payload is always a multiple of 8, so its low bit is free to carry the
/// status. State changes go through `free`/`allocated` and a fresh `encode`,
/// never through bit toggles on a live word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
  pub payload: usize,
  pub allocated: bool,
}

impl Header {
  /// A header describing a free block with the given payload size.
  pub fn free(payload: usize) -> Self {
    debug_assert!(payload % ALIGNMENT == 0, "payload must stay 8-aligned");
    Self { payload, allocated: false }
  }

  /// A header describing an allocated block with the given payload size.
  pub fn allocated(payload: usize) -> Self {
    debug_assert!(payload % ALIGNMENT == 0, "payload must stay 8-aligned");
    Self { payload, allocated: true }
  }

  /// Packs the payload size and status back into one header word.
  pub fn encode(self) -> usize {
    self.payload | self.allocated as usize
  }

  /// Splits a header word into its payload size and status.
  pub fn decode(word: usize) -> Self {
    Self {
      payload: word & !STATUS_BIT,
      allocated: word & STATUS_BIT == 1,
    }
  }
}
