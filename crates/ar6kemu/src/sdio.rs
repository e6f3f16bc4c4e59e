//! SDIO card controller.
//!
//! Implements the card side of the SDIO command protocol: command decode and
//! the card state machine, response encoding, CMD52 direct access and CMD53
//! block transfers. Register accesses are routed through a fixed table of
//! function handlers. Function 0 is the common I/O area owned by the
//! controller; the remaining functions are served by the card model through
//! the [`CardFunctions`] trait.
//!
//! # References
//! - SD Specifications Part E1, SDIO Simplified Specification v2.00
//! - [SD/MMC/SDIO Registers](https://dsibrew.org/wiki/SD/MMC/SDIO_Registers)

pub mod cia;
mod response;
mod transfer;

pub use cia::{Cia, CiaEffect, FunctionInfo};
pub use response::{CardStatus, Response, ResponseKind};
pub use transfer::{BlockCount, Direction, TransferContext};

use crate::config::BusMode;
use ar6k_hw::sdio::{MAX_BLOCK_LEN, MAX_FUNCTIONS, cccr, fbr, io_arg};
use tracing::{debug, info, instrument, trace, warn};

/// Card states as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Initialization,
    Standby,
    Command,
    Transfer,
    Inactive,
}

impl CardState {
    /// Two-bit state field reported in an R5
    pub fn io_state(self) -> u8 {
        match self {
            CardState::Initialization | CardState::Standby | CardState::Inactive => 0,
            CardState::Command => 1,
            CardState::Transfer => 2,
        }
    }
}

/// Register access for the card's own I/O functions.
///
/// `step` is 0 for a fixed address and 1 for an incrementing address.
pub trait CardFunctions {
    /// Called at the end of every full card reset
    fn reset(&mut self);

    fn read(&mut self, func: u8, addr: u32, data: &mut [u8], step: u32);

    fn write(&mut self, func: u8, addr: u32, data: &[u8], step: u32);

    /// Read one byte through the CSA window; `None` reads as zero
    fn csa_read(&mut self, _func: u8, _addr: u32) -> Option<u8> {
        None
    }

    /// Write one byte through the CSA window
    fn csa_write(&mut self, _func: u8, _addr: u32, _value: u8) {}
}

/// Handler bound to a function number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionHandler {
    /// Function 0 register space (CCCR, FBR, CIS)
    Common,
    /// Forwarded to the card model
    Card,
    /// Unimplemented function: accesses are logged, reads return zeros
    Dummy,
}

/// Static description of a card model
#[derive(Debug, Clone)]
pub struct CardConfig {
    /// IO OCR returned by CMD5; bits 28-30 give the number of functions
    pub io_ocr: u32,
    /// CCCR/SDIO revision byte
    pub revision: u8,
    pub bus_mode: BusMode,
    /// Common CIS followed by the function CIS tables
    pub cis: &'static [u8],
    pub functions: [FunctionInfo; 7],
}

/// SDIO card controller state
#[derive(Debug)]
pub struct SdioCard {
    state: CardState,
    io_ocr: u32,
    rca: u16,
    status: CardStatus,
    sdio_ready: bool,
    mode: BusMode,
    current_cmd: u8,
    next_cmd: u8,
    cia: Cia,
    transfer: Option<TransferContext>,
    /// Data byte reported in the next R5
    direct_data: u8,
    handlers: [FunctionHandler; MAX_FUNCTIONS],
    irq: bool,
}

impl SdioCard {
    pub fn new(config: CardConfig) -> Self {
        let num_functions = num_functions(config.io_ocr);
        let mut handlers = [FunctionHandler::Dummy; MAX_FUNCTIONS];
        handlers[0] = FunctionHandler::Common;

        Self {
            state: CardState::Initialization,
            io_ocr: config.io_ocr,
            rca: 0,
            status: CardStatus::reset_value(),
            sdio_ready: false,
            mode: config.bus_mode,
            current_cmd: 0,
            next_cmd: 0,
            cia: Cia::new(config.revision, num_functions, config.functions, config.cis),
            transfer: None,
            direct_data: 0,
            handlers,
            irq: false,
        }
    }

    /// Bind a function number to a handler. Function 0 stays the common I/O area.
    pub fn set_handler(&mut self, func: u8, handler: FunctionHandler) {
        if func == 0 {
            warn!("SDIO: function 0 handler is fixed");
            return;
        }
        self.handlers[func as usize] = handler;
    }

    /// Full card reset, as on power-up or CCCR RES
    pub fn reset<H: CardFunctions + ?Sized>(&mut self, hooks: &mut H) {
        debug!("SDIO card reset");

        self.state = CardState::Initialization;
        self.rca = 0x0000;
        self.sdio_ready = false;
        self.status = CardStatus::reset_value();
        self.current_cmd = 0;
        self.next_cmd = 0;
        self.transfer = None;
        self.direct_data = 0;
        self.cia.reset(num_functions(self.io_ocr));

        hooks.reset();
        self.update_irq();
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn rca(&self) -> u16 {
        self.rca
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn mode(&self) -> BusMode {
        self.mode
    }

    pub fn cia(&self) -> &Cia {
        &self.cia
    }

    /// Whether a CMD53 transfer is in progress
    pub fn data_ready(&self) -> bool {
        self.state == CardState::Transfer
    }

    /// Level of the card interrupt line (DAT1 in native mode)
    pub fn irq_level(&self) -> bool {
        self.irq
    }

    /// Drive the interrupt line of I/O function `line + 1`
    pub fn set_function_irq(&mut self, line: u8, level: bool) {
        self.cia.set_int_pending(line, level);
        self.update_irq();
    }

    // ========================================================================
    // Command path
    // ========================================================================

    /// Execute one command and build its response
    #[instrument(level = "trace", skip(self, hooks))]
    pub fn do_command<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        cmd: u8,
        arg: u32,
    ) -> Response {
        let last_status = self.status;

        if !self.command_crc_valid(cmd, arg) {
            self.status.insert(CardStatus::COM_CRC_ERROR);
            return Response::none();
        }

        self.status
            .remove(CardStatus::COM_CRC_ERROR | CardStatus::ILLEGAL_COMMAND);

        self.next_cmd = cmd;
        let kind = self.normal_command(hooks, cmd, arg);
        self.current_cmd = self.next_cmd;

        let mut response = match kind {
            ResponseKind::R0 => Response::none(),
            ResponseKind::R1 | ResponseKind::R1b => {
                response::r1(&mut self.status, last_status, kind)
            }
            ResponseKind::R4 => response::r4(self.io_ocr, self.sdio_ready),
            ResponseKind::R5 => {
                response::r5(&mut self.status, self.state, self.mode, self.direct_data)
            }
            ResponseKind::R6 => response::r6(self.status, self.rca),
        };

        if self.status.contains(CardStatus::ILLEGAL_COMMAND) {
            response.suppress();
        }

        trace!("CMD{} response: {:02X?}", cmd, response.bytes());
        response
    }

    /// Command CRC check. CRCs are not carried on the emulated bus.
    fn command_crc_valid(&self, _cmd: u8, _arg: u32) -> bool {
        true
    }

    fn normal_command<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        cmd: u8,
        arg: u32,
    ) -> ResponseKind {
        let spi = self.mode == BusMode::Spi;

        match cmd {
            // GO_IDLE_STATE
            0 => {
                debug!("SDIO: CMD0 bus mode switch attempt ignored");
                return ResponseKind::R0;
            }

            // SEND_RELATIVE_ADDR
            3 => {
                if spi || !self.sdio_ready {
                    return self.illegal_command(cmd);
                }
                if matches!(self.state, CardState::Initialization | CardState::Standby) {
                    self.state = CardState::Standby;
                    self.rca = self.rca.wrapping_add(0x4567);
                    debug!("SDIO: published RCA {:#06X}", self.rca);
                    return ResponseKind::R6;
                }
            }

            // IO_SEND_OP_COND
            5 => {
                if self.state == CardState::Initialization {
                    if arg != 0 && !self.sdio_ready {
                        self.sdio_ready = true;
                        info!("SDIO card ready (host OCR {:#X})", arg);
                    }
                    return ResponseKind::R4;
                }
            }

            // SELECT/DESELECT_CARD
            7 => {
                if spi {
                    return self.illegal_command(cmd);
                }
                let rca = (arg >> 16) as u16;
                match self.state {
                    CardState::Standby => {
                        if rca != self.rca {
                            return ResponseKind::R0;
                        }
                        self.state = CardState::Command;
                        debug!("SDIO: card selected");
                        return ResponseKind::R1b;
                    }
                    CardState::Command => {
                        if rca != self.rca {
                            self.state = CardState::Standby;
                            debug!("SDIO: card deselected");
                        }
                        return ResponseKind::R1b;
                    }
                    _ => {}
                }
            }

            // GO_INACTIVE_STATE
            15 => {
                if spi {
                    return self.illegal_command(cmd);
                }
                let rca = (arg >> 16) as u16;
                if matches!(
                    self.state,
                    CardState::Initialization | CardState::Standby | CardState::Command
                ) {
                    if self.rca == 0 || self.rca == rca {
                        self.state = CardState::Inactive;
                        debug!("SDIO: card inactive");
                    }
                    return ResponseKind::R0;
                }
            }

            // IO_RW_DIRECT
            52 => {
                if matches!(self.state, CardState::Command | CardState::Transfer) {
                    // A transfer is running on the data lines, keep it going
                    if self.state == CardState::Transfer {
                        self.next_cmd = self.current_cmd;
                    }
                    self.io_rw_direct(hooks, arg);
                    return ResponseKind::R5;
                }
            }

            // IO_RW_EXTENDED
            53 => {
                if self.state == CardState::Command {
                    return self.io_rw_extended(arg);
                }
            }

            // CRC_ON_OFF
            59 => {
                if !spi {
                    return self.illegal_command(cmd);
                }
                return ResponseKind::R1;
            }

            _ => return self.illegal_command(cmd),
        }

        self.status.insert(CardStatus::ILLEGAL_COMMAND);
        warn!("SDIO: CMD{} in wrong state {:?}", cmd, self.state);
        self.illegal_response()
    }

    fn illegal_command(&mut self, cmd: u8) -> ResponseKind {
        self.status.insert(CardStatus::ILLEGAL_COMMAND);
        warn!("SDIO: unsupported CMD{}", cmd);
        self.illegal_response()
    }

    fn illegal_response(&self) -> ResponseKind {
        match self.mode {
            BusMode::Spi => ResponseKind::R1,
            BusMode::Native => ResponseKind::R0,
        }
    }

    fn io_rw_direct<H: CardFunctions + ?Sized>(&mut self, hooks: &mut H, arg: u32) {
        let func = ((arg >> io_arg::FUNC_SHIFT) & io_arg::FUNC_MASK) as u8;
        let addr = (arg >> io_arg::ADDR_SHIFT) & ar6k_hw::sdio::ADDR_MASK;
        let value = (arg & io_arg::DATA_MASK) as u8;
        let write = (arg >> io_arg::RW_SHIFT) & 1 != 0;
        let raw = (arg >> io_arg::RAW_SHIFT) & 1 != 0;

        self.direct_data = value;

        if func > num_functions(self.io_ocr) {
            warn!("SDIO CMD52: function {} not present", func);
            self.status.insert(CardStatus::ADDRESS_ERROR);
            return;
        }

        if write {
            trace!("CMD52 write: fn={}, addr={:#X}, value={:#X}", func, addr, value);
            self.function_write(hooks, func, addr, &[value], 1);
        }

        if !write || raw {
            let mut data = [0u8; 1];
            self.function_read(hooks, func, addr, &mut data, 1);
            trace!("CMD52 read: fn={}, addr={:#X}, value={:#X}", func, addr, data[0]);
            self.direct_data = data[0];
        }
    }

    fn io_rw_extended(&mut self, arg: u32) -> ResponseKind {
        let func = ((arg >> io_arg::FUNC_SHIFT) & io_arg::FUNC_MASK) as u8;
        let addr = (arg >> io_arg::ADDR_SHIFT) & ar6k_hw::sdio::ADDR_MASK;

        self.direct_data = 0;

        if func > num_functions(self.io_ocr) {
            warn!("SDIO CMD53: function {} not present", func);
            self.status.insert(CardStatus::ADDRESS_ERROR);
            return ResponseKind::R5;
        }

        let direction = if (arg >> io_arg::RW_SHIFT) & 1 != 0 {
            Direction::Write
        } else {
            Direction::Read
        };
        let step = (arg >> io_arg::OP_CODE_SHIFT) & 1;
        let block_mode = (arg >> io_arg::BLOCK_MODE_SHIFT) & 1 != 0;

        let block_len = if block_mode {
            let len = self.cia.block_len(func) as usize;
            if !(1..=MAX_BLOCK_LEN).contains(&len) {
                warn!("SDIO CMD53: function {} block size {} unusable", func, len);
                return ResponseKind::R1;
            }
            len
        } else {
            1
        };

        let blocks = match (arg & io_arg::COUNT_MASK, block_mode) {
            (0, true) => BlockCount::Infinite,
            (0, false) => BlockCount::Finite(512),
            (count, _) => BlockCount::Finite(count),
        };

        debug!(
            "CMD53 {:?}: fn={}, addr={:#X}, step={}, block_len={}, blocks={:?}",
            direction, func, addr, step, block_len, blocks
        );

        self.cia.set_function_select(func);
        self.transfer = Some(TransferContext::new(
            func, direction, step, addr, block_len, blocks,
        ));
        self.state = CardState::Transfer;
        ResponseKind::R5
    }

    // ========================================================================
    // Data path
    // ========================================================================

    fn transfer_ready(&self, op: &str) -> bool {
        if self.state != CardState::Transfer {
            warn!("SDIO data {}: not in Transfer state", op);
            return false;
        }
        if self.status.intersects(CardStatus::DATA_ERRORS) {
            return false;
        }
        if self.current_cmd != 53 {
            warn!("SDIO data {}: no data command (CMD{})", op, self.current_cmd);
            return false;
        }
        true
    }

    /// Accept one byte from the host
    #[instrument(level = "trace", skip(self, hooks))]
    pub fn write_data<H: CardFunctions + ?Sized>(&mut self, hooks: &mut H, value: u8) {
        if !self.transfer_ready("write") {
            return;
        }
        let Some(mut transfer) = self.transfer.take() else {
            return;
        };
        if transfer.direction != Direction::Write {
            warn!("SDIO data write during a read transfer");
            self.transfer = Some(transfer);
            return;
        }

        transfer.data[transfer.offset] = value;
        transfer.offset += 1;

        if transfer.block_full() {
            self.function_write(
                hooks,
                transfer.func,
                transfer.start,
                &transfer.data,
                transfer.step,
            );
            // The block may have reset the card or aborted the transfer
            if self.state != CardState::Transfer {
                return;
            }
            if transfer.finish_block() {
                self.transfer_done();
                return;
            }
        }

        self.transfer = Some(transfer);
    }

    /// Hand one byte to the host
    #[instrument(level = "trace", skip(self, hooks))]
    pub fn read_data<H: CardFunctions + ?Sized>(&mut self, hooks: &mut H) -> u8 {
        if !self.transfer_ready("read") {
            return 0x00;
        }
        let Some(mut transfer) = self.transfer.take() else {
            return 0x00;
        };
        if transfer.direction != Direction::Read {
            warn!("SDIO data read during a write transfer");
            self.transfer = Some(transfer);
            return 0x00;
        }

        if transfer.offset == 0 {
            self.function_read(
                hooks,
                transfer.func,
                transfer.start,
                &mut transfer.data,
                transfer.step,
            );
        }

        let value = transfer.data[transfer.offset];
        transfer.offset += 1;

        if transfer.block_full() && transfer.finish_block() {
            self.transfer_done();
            return value;
        }

        self.transfer = Some(transfer);
        value
    }

    fn transfer_done(&mut self) {
        debug!("SDIO transfer done");
        self.state = CardState::Command;
        self.transfer = None;

        // 4-bit mode interrupt period ends with the transfer
        if self.cia.bus() & cccr::BUS_WIDTH_MASK == cccr::BUS_WIDTH_4BIT {
            self.update_irq();
        }
    }

    fn abort(&mut self, func: u8) {
        if self.state == CardState::Transfer
            && self.cia.function_select() == func
            && self.mode == BusMode::Native
        {
            debug!("SDIO: transfer on function {} aborted", func);
            self.transfer_done();
        } else {
            warn!("SDIO: no transfer to abort for function {}", func);
        }
    }

    // ========================================================================
    // Function dispatch
    // ========================================================================

    fn function_read<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        func: u8,
        addr: u32,
        data: &mut [u8],
        step: u32,
    ) {
        match self.handlers[func as usize] {
            FunctionHandler::Common => self.cia.read(hooks, addr, data, step),
            FunctionHandler::Card => hooks.read(func, addr, data, step),
            FunctionHandler::Dummy => {
                warn!("SDIO fn{}: reading {} bytes at {:#X}", func, data.len(), addr);
                data.fill(0);
            }
        }
    }

    fn function_write<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        func: u8,
        addr: u32,
        data: &[u8],
        step: u32,
    ) {
        match self.handlers[func as usize] {
            FunctionHandler::Common => self.cia_write(hooks, addr, data, step),
            FunctionHandler::Card => hooks.write(func, addr, data, step),
            FunctionHandler::Dummy => {
                warn!("SDIO fn{}: writing {} bytes at {:#X}", func, data.len(), addr);
            }
        }
    }

    fn cia_write<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        addr: u32,
        data: &[u8],
        step: u32,
    ) {
        let mut addr = addr;

        for (i, &value) in data.iter().enumerate() {
            if addr >= fbr::END {
                warn!(
                    "SDIO fn0: bad write at {:#X} ({} bytes)",
                    addr,
                    data.len() - i
                );
                return;
            }

            match self.cia.write_byte(hooks, addr, value) {
                CiaEffect::Nothing => {}
                CiaEffect::UpdateIrq => self.update_irq(),
                CiaEffect::BusControl => {
                    if self.mode == BusMode::Spi {
                        self.update_irq();
                    }
                }
                CiaEffect::Reset => self.reset(hooks),
                CiaEffect::Abort(func) => self.abort(func),
            }

            addr = addr.wrapping_add(step);
        }
    }

    // ========================================================================
    // Interrupts
    // ========================================================================

    fn update_irq(&mut self) {
        let bus = self.cia.bus();
        let int_enable = self.cia.int_enable();

        let masked = int_enable & cccr::INT_ENABLE_MASTER == 0
            || (bus & cccr::BUS_WIDTH_MASK == cccr::BUS_WIDTH_4BIT
                && !self.cia.e4mi()
                && self.state == CardState::Transfer)
            || (self.mode == BusMode::Spi
                && !(bus & cccr::BUS_SCSI != 0 && bus & cccr::BUS_ECSI != 0));

        let level = !masked && (self.cia.int_pending() << 1) & int_enable != 0;

        if level != self.irq {
            trace!("SDIO card interrupt: {}", level);
        }
        self.irq = level;
    }
}

/// Number of I/O functions advertised by an IO OCR
fn num_functions(io_ocr: u32) -> u8 {
    ((io_ocr >> 28) & 7) as u8
}
