//! CMD53 transfer session bookkeeping.

use ar6k_hw::sdio::MAX_BLOCK_LEN;

/// Direction of a data transfer, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Card to host
    Read,
    /// Host to card
    Write,
}

/// Number of blocks left in a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCount {
    Finite(u32),
    /// Runs until aborted through the CCCR
    Infinite,
}

/// State of one CMD53 session
#[derive(Debug)]
pub struct TransferContext {
    /// Target I/O function
    pub func: u8,
    pub direction: Direction,
    /// Address increment per byte: 0 for a fixed address, 1 for incrementing
    pub step: u32,
    /// Bytes per block (1 in byte mode)
    pub block_len: usize,
    pub blocks: BlockCount,
    /// Register address of the current block
    pub start: u32,
    /// Position within the current block
    pub offset: usize,
    /// Staging buffer for the current block
    pub data: Vec<u8>,
}

impl TransferContext {
    pub fn new(
        func: u8,
        direction: Direction,
        step: u32,
        start: u32,
        block_len: usize,
        blocks: BlockCount,
    ) -> Self {
        debug_assert!((1..=MAX_BLOCK_LEN).contains(&block_len));
        Self {
            func,
            direction,
            step,
            block_len,
            blocks,
            start,
            offset: 0,
            data: vec![0u8; block_len],
        }
    }

    /// Whether the staging buffer has been filled or drained
    pub fn block_full(&self) -> bool {
        self.offset >= self.block_len
    }

    /// Account for one completed block.
    ///
    /// Returns `true` when that was the last block. Otherwise the address
    /// advances by one block (scaled by the step) and the offset rewinds.
    pub fn finish_block(&mut self) -> bool {
        if let BlockCount::Finite(n) = &mut self.blocks {
            *n = n.saturating_sub(1);
            if *n == 0 {
                return true;
            }
        }

        self.start = self
            .start
            .wrapping_add(self.block_len as u32 * self.step);
        self.offset = 0;
        false
    }
}
