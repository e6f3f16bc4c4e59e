//! Card status register and command response encoding.
//!
//! Each response builder reads the status register and then clears its own
//! fixed subset of bits. The subsets differ per response type and are part
//! of what the host driver observes, so they are kept exactly.

use super::CardState;
use crate::config::BusMode;
use ar6k_hw::sdio::card_status as cs;
use bitflags::bitflags;

bitflags! {
    /// SD card status register (32 bits, R1 layout)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CardStatus: u32 {
        const OUT_OF_RANGE = cs::OUT_OF_RANGE;
        const ADDRESS_ERROR = cs::ADDRESS_ERROR;
        const BLOCK_LEN_ERROR = cs::BLOCK_LEN_ERROR;
        const ERASE_SEQ_ERROR = cs::ERASE_SEQ_ERROR;
        const ERASE_PARAM = cs::ERASE_PARAM;
        const WP_VIOLATION = cs::WP_VIOLATION;
        const CARD_IS_LOCKED = cs::CARD_IS_LOCKED;
        const LOCK_UNLOCK_FAILED = cs::LOCK_UNLOCK_FAILED;
        const COM_CRC_ERROR = cs::COM_CRC_ERROR;
        const ILLEGAL_COMMAND = cs::ILLEGAL_COMMAND;
        const CARD_ECC_FAILED = cs::CARD_ECC_FAILED;
        const CC_ERROR = cs::CC_ERROR;
        const SD_ERROR = cs::SD_ERROR;
        const CID_CSD_OVERWRITE = cs::CID_CSD_OVERWRITE;
        const WP_ERASE_SKIP = cs::WP_ERASE_SKIP;
        const CARD_ECC_DISABLED = cs::CARD_ECC_DISABLED;
        const ERASE_RESET = cs::ERASE_RESET;
        const CURRENT_STATE = cs::CURRENT_STATE;
        const READY_FOR_DATA = cs::READY_FOR_DATA;
        const APP_CMD = cs::APP_CMD;
        const AKE_SEQ_ERROR = cs::AKE_SEQ_ERROR;
    }
}

impl CardStatus {
    /// Bits cleared by the next valid command
    pub const CLASS_B: Self = Self::from_bits_retain(cs::CLASS_B);
    /// Bits cleared once read in an R1
    pub const CLASS_C: Self = Self::from_bits_retain(cs::CLASS_C);
    /// Errors that block the data path
    pub const DATA_ERRORS: Self = Self::from_bits_retain(
        cs::ADDRESS_ERROR | cs::OUT_OF_RANGE | cs::SD_ERROR,
    );
    /// Bits an R1 may carry over from before the command (B minus ILLEGAL)
    pub const R1_CARRY_MASK: u32 = cs::CLASS_B ^ cs::ILLEGAL_COMMAND;
    /// Bits summarised by the R5 "error" flag in native mode
    pub const R5_ERROR_MASK: u32 = 0x3738_0003;
    /// Bits summarised by the R5 "error" flag in SPI mode
    pub const R5_SPI_ERROR_MASK: u32 = 0xb738_0003;
    /// Bits cleared after an R5 has been built
    pub const R5_CLEAR_MASK: u32 = 0xf7f8_0003;

    /// Status after a full card reset
    pub const fn reset_value() -> Self {
        Self::from_bits_retain(cs::RESET_VALUE)
    }
}

/// Response type produced by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// No response
    R0,
    /// Normal response
    R1,
    /// Normal response with busy
    R1b,
    /// IO OCR
    R4,
    /// IO direct access
    R5,
    /// Published RCA
    R6,
}

/// Bytes sent back on the command line (at most 4, most significant first)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    kind: ResponseKind,
    data: [u8; 4],
    len: usize,
}

impl Response {
    pub fn none() -> Self {
        Self {
            kind: ResponseKind::R0,
            data: [0; 4],
            len: 0,
        }
    }

    fn new(kind: ResponseKind, data: [u8; 4], len: usize) -> Self {
        Self { kind, data, len }
    }

    /// Response type the command asked for
    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Response payload; empty when no response is sent
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Payload as a big-endian word (zero-padded)
    pub fn word(&self) -> u32 {
        self.bytes()
            .iter()
            .fold(0, |acc, &b| (acc << 8) | u32::from(b))
    }

    /// Drop the payload but keep the type
    pub(crate) fn suppress(&mut self) {
        self.len = 0;
    }
}

/// Build an R1/R1b.
///
/// Only the carry-over subset may come from `last`; everything else is the
/// current status. Class C bits are cleared afterwards.
pub(crate) fn r1(status: &mut CardStatus, last: CardStatus, kind: ResponseKind) -> Response {
    let mask = CardStatus::R1_CARRY_MASK;
    let value = (status.bits() & !mask) | (last.bits() & mask);
    status.remove(CardStatus::CLASS_C);

    Response::new(kind, value.to_be_bytes(), 4)
}

/// Build an R4 carrying the IO OCR, with bit 31 set once the card is ready
pub(crate) fn r4(io_ocr: u32, ready: bool) -> Response {
    let mut data = io_ocr.to_be_bytes();
    if ready {
        data[0] |= 1 << 7;
    }
    Response::new(ResponseKind::R4, data, 4)
}

/// Build an R5 carrying one data byte.
///
/// Clears the R5 status mask afterwards.
pub(crate) fn r5(status: &mut CardStatus, state: CardState, mode: BusMode, data: u8) -> Response {
    let bits = status.bits();
    let state = state.io_state();
    let flag = |mask: u32, shift: u32| -> u8 { u8::from(bits & mask != 0) << shift };

    let response = match mode {
        BusMode::Spi => {
            let flags = flag(CardStatus::R5_SPI_ERROR_MASK, 6)
                | flag(cs::ADDRESS_ERROR, 4)
                | flag(cs::COM_CRC_ERROR, 3)
                | flag(cs::ILLEGAL_COMMAND, 2)
                | u8::from(state == 0);
            Response::new(ResponseKind::R5, [flags, data, 0, 0], 2)
        }
        BusMode::Native => {
            let flags = flag(cs::COM_CRC_ERROR, 7)
                | flag(cs::ILLEGAL_COMMAND, 6)
                | (state << 4)
                | flag(CardStatus::R5_ERROR_MASK, 3)
                | flag(cs::ADDRESS_ERROR, 1)
                | flag(cs::OUT_OF_RANGE, 0);
            Response::new(ResponseKind::R5, [0, 0, flags, data], 4)
        }
    };

    status.remove(CardStatus::from_bits_retain(CardStatus::R5_CLEAR_MASK));
    response
}

/// Build an R6 publishing the RCA with compressed error bits
pub(crate) fn r6(status: CardStatus, rca: u16) -> Response {
    let flags: u16 = (u16::from(status.contains(CardStatus::SD_ERROR)) << 13)
        | (u16::from(status.contains(CardStatus::ILLEGAL_COMMAND)) << 14)
        | (u16::from(status.contains(CardStatus::COM_CRC_ERROR)) << 15);
    let [hi, lo] = rca.to_be_bytes();

    Response::new(ResponseKind::R6, [hi, lo, (flags >> 8) as u8, 0], 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r1_carries_only_class_b_bits_from_last_status() {
        let last = CardStatus::from_bits_retain(0x0000_1e00) | CardStatus::COM_CRC_ERROR;
        let mut status = CardStatus::ILLEGAL_COMMAND | CardStatus::ADDRESS_ERROR;

        let rsp = r1(&mut status, last, ResponseKind::R1);
        let word = u32::from_be_bytes(rsp.bytes().try_into().unwrap());

        assert!(word & cs::COM_CRC_ERROR != 0);
        assert!(word & cs::ILLEGAL_COMMAND != 0);
        assert!(word & cs::ADDRESS_ERROR != 0);
        assert_eq!(word & cs::CURRENT_STATE, 0x1e00);
        // ADDRESS_ERROR is class C and is consumed by the read
        assert_eq!(status, CardStatus::ILLEGAL_COMMAND);
    }

    #[test]
    fn r4_sets_ready_bit() {
        assert_eq!(r4(0x10fe_0000, false).bytes(), &[0x10, 0xfe, 0x00, 0x00]);
        assert_eq!(r4(0x10fe_0000, true).bytes(), &[0x90, 0xfe, 0x00, 0x00]);
    }

    #[test]
    fn r5_native_layout_and_clear() {
        let mut status = CardStatus::ADDRESS_ERROR | CardStatus::reset_value();
        let rsp = r5(&mut status, CardState::Transfer, BusMode::Native, 0xa5);

        // transfer state (2 << 4) and address error (bit 1); ADDRESS_ERROR is
        // not part of the summary flag
        assert_eq!(rsp.bytes(), &[0x00, 0x00, 0x22, 0xa5]);
        assert_eq!(status, CardStatus::reset_value());
    }

    #[test]
    fn r5_spi_is_two_bytes() {
        let mut status = CardStatus::ILLEGAL_COMMAND;
        let rsp = r5(&mut status, CardState::Standby, BusMode::Spi, 0x11);

        assert_eq!(rsp.bytes(), &[0x04 | 0x01, 0x11]);
        assert!(status.is_empty());
    }

    #[test]
    fn r6_compresses_errors() {
        let rsp = r6(CardStatus::ILLEGAL_COMMAND, 0x4567);
        assert_eq!(rsp.bytes(), &[0x45, 0x67, 0x40, 0x00]);
    }

    #[test]
    fn word_reads_big_endian() {
        assert_eq!(r4(0x10fe_0000, true).word(), 0x90fe_0000);
        assert_eq!(Response::none().word(), 0);

        let mut status = CardStatus::empty();
        assert_eq!(r5(&mut status, CardState::Command, BusMode::Spi, 0x7e).word(), 0x007e);
    }
}
