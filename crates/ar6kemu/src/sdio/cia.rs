//! Common I/O Area: CCCR, FBR and CIS.
//!
//! Function 0's address space. The CCCR occupies 0x000-0x0FF, the FBR of
//! function `n` occupies `0x100 * n` to `0x100 * n + 0xFF`, the CIS starts at
//! `CIS_START`. Anything in between reads as zero.

use super::CardFunctions;
use ar6k_hw::sdio::{CIS_START, cccr, fbr};
use tracing::{debug, trace, warn};

/// Static description of an I/O function, fixed by the card model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionInfo {
    /// Standard interface code, including the CSA support bit
    pub interface_code: u8,
    /// Extended standard interface code
    pub ext_interface_code: u8,
    /// Offset of the function's tuples within the card CIS
    pub cis_offset: u32,
}

/// Side effect of a CCCR/FBR write the controller has to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiaEffect {
    Nothing,
    /// Interrupt enables changed
    UpdateIrq,
    /// Bus interface control changed
    BusControl,
    /// RES bit written: reset the whole card
    Reset,
    /// ASx written: abort the transfer running on that function
    Abort(u8),
}

#[derive(Debug, Clone, Copy, Default)]
struct Fbr {
    interface_code: u8,
    ext_interface_code: u8,
    csa_addr: u32,
}

/// Register state of function 0
#[derive(Debug)]
pub struct Cia {
    revision: u8,
    num_functions: u8,
    io_enable: u8,
    int_enable: u8,
    int_pending: u8,
    bus: u8,
    e4mi: u8,
    power: u8,
    speed: u8,
    function_select: u8,
    block_len: [u16; 8],
    fbr: [Fbr; 7],
    info: [FunctionInfo; 7],
    cis: &'static [u8],
}

impl Cia {
    pub fn new(
        revision: u8,
        num_functions: u8,
        info: [FunctionInfo; 7],
        cis: &'static [u8],
    ) -> Self {
        let mut cia = Self {
            revision,
            num_functions,
            io_enable: 0,
            int_enable: 0,
            int_pending: 0,
            bus: 0,
            e4mi: 0,
            power: 0,
            speed: 0,
            function_select: 0,
            block_len: [0; 8],
            fbr: [Fbr::default(); 7],
            info,
            cis,
        };
        cia.reset(num_functions);
        cia
    }

    /// Return every writable register to its power-on value
    pub fn reset(&mut self, num_functions: u8) {
        self.num_functions = num_functions;
        self.io_enable = 0;
        self.int_enable = 0;
        self.int_pending = 0;
        self.bus = 0;
        self.e4mi = 0;
        self.power = 0;
        self.speed = 0;
        self.block_len = [0; 8];
        for (fbr, info) in self.fbr.iter_mut().zip(self.info.iter()) {
            *fbr = Fbr {
                interface_code: info.interface_code & fbr::RESET_PRESERVE_MASK,
                ext_interface_code: info.ext_interface_code,
                csa_addr: 0,
            };
        }
    }

    pub fn block_len(&self, func: u8) -> u16 {
        self.block_len[func as usize]
    }

    pub fn int_enable(&self) -> u8 {
        self.int_enable
    }

    /// Per-function interrupt pending bits (bit 0 = function 1)
    pub fn int_pending(&self) -> u8 {
        self.int_pending
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn e4mi(&self) -> bool {
        self.e4mi != 0
    }

    pub fn function_select(&self) -> u8 {
        self.function_select
    }

    pub fn set_function_select(&mut self, func: u8) {
        self.function_select = func;
    }

    /// Drive the interrupt line of function `line + 1`
    pub fn set_int_pending(&mut self, line: u8, level: bool) {
        if level {
            self.int_pending |= 1u8 << line;
        } else {
            self.int_pending &= !(1u8 << line);
        }
    }

    // ========================================================================
    // Multi-byte access
    // ========================================================================

    /// Read `data.len()` bytes starting at `addr`.
    ///
    /// A single access may run across the CCCR, the FBRs, the reserved gap,
    /// the CIS and the zero fill behind it.
    pub fn read<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        addr: u32,
        data: &mut [u8],
        step: u32,
    ) {
        let len = data.len();
        let mut pos = 0;
        let mut addr = addr;

        while pos < len && addr < cccr::END {
            data[pos] = self.cccr_read(addr);
            pos += 1;
            addr = addr.wrapping_add(step);
        }

        while pos < len && addr < fbr::END {
            data[pos] = self.fbr_read(hooks, (addr >> 8) as u8, addr & 0xff);
            pos += 1;
            addr = addr.wrapping_add(step);
        }

        if pos < len && addr < CIS_START {
            let gap = if step != 0 {
                (len - pos).min((CIS_START - addr) as usize)
            } else {
                len - pos
            };
            data[pos..pos + gap].fill(0);
            pos += gap;
            addr = CIS_START;
        }

        if pos < len
            && let Some(offset) = addr.checked_sub(CIS_START)
            && let Some(tail) = self.cis.get(offset as usize..)
            && !tail.is_empty()
        {
            if step == 0 {
                data[pos..].fill(tail[0]);
                pos = len;
            } else {
                let n = (len - pos).min(tail.len());
                data[pos..pos + n].copy_from_slice(&tail[..n]);
                pos += n;
            }
        }

        data[pos..].fill(0);
    }

    /// Write one byte to the CCCR or an FBR
    pub fn write_byte<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        addr: u32,
        value: u8,
    ) -> CiaEffect {
        if addr < cccr::END {
            self.cccr_write(addr, value)
        } else if addr < fbr::END {
            self.fbr_write(hooks, (addr >> 8) as u8, addr & 0xff, value);
            CiaEffect::Nothing
        } else {
            warn!("CIA write outside CCCR/FBR: addr={:#X}, value={:#X}", addr, value);
            CiaEffect::Nothing
        }
    }

    // ========================================================================
    // CCCR
    // ========================================================================

    fn cccr_write(&mut self, offset: u32, value: u8) -> CiaEffect {
        trace!("CCCR write: offset={:#X}, value={:#X}", offset, value);

        match offset {
            cccr::IO_ENABLE => {
                let implemented = ((1u8 << self.num_functions) - 1) << 1;
                self.io_enable = value & implemented;
                debug!("CCCR I/O enable: {:#X}", self.io_enable);
            }
            cccr::INT_ENABLE => {
                self.int_enable = value;
                debug!("CCCR interrupt enable: {:#X}", self.int_enable);
                return CiaEffect::UpdateIrq;
            }
            cccr::IO_ABORT => {
                if value & cccr::ABORT_RES != 0 {
                    debug!("CCCR I/O abort: card reset");
                    return CiaEffect::Reset;
                }
                let func = value & cccr::ABORT_FUNC_MASK;
                if func != 0 {
                    return CiaEffect::Abort(func);
                }
            }
            cccr::BUS_CONTROL => {
                self.bus = (value & cccr::BUS_WRITE_MASK) | cccr::BUS_SCSI;
                if value & 1 != 0 {
                    warn!("CCCR: invalid bus width selected ({:#X})", value);
                }
                debug!("CCCR bus interface control: {:#X}", self.bus);
                return CiaEffect::BusControl;
            }
            cccr::CAPABILITY => {
                self.e4mi = value & cccr::CAPABILITY_E4MI;
            }
            // Suspend/resume is not supported, so function select is read-only
            cccr::READY_FLAGS => {}
            cccr::FN0_BLOCK_SIZE => {
                self.block_len[0] = (self.block_len[0] & 0xff00) | u16::from(value);
            }
            o if o == cccr::FN0_BLOCK_SIZE + 1 => {
                self.block_len[0] = (self.block_len[0] & 0x00ff) | (u16::from(value) << 8);
            }
            cccr::POWER_CONTROL => {
                self.power |= value & cccr::ENABLE_BIT;
            }
            cccr::HIGH_SPEED => {
                self.speed |= value & cccr::ENABLE_BIT;
            }
            _ => {
                warn!(
                    "Unknown CCCR register write: offset={:#X}, value={:#X}",
                    offset, value
                );
            }
        }

        CiaEffect::Nothing
    }

    fn cccr_read(&self, offset: u32) -> u8 {
        trace!("CCCR read: offset={:#X}", offset);

        match offset {
            cccr::REVISION => self.revision,
            cccr::SD_REVISION => cccr::SD_REVISION_2_00,
            cccr::IO_ENABLE | cccr::IO_READY => self.io_enable,
            cccr::INT_ENABLE => self.int_enable,
            cccr::INT_PENDING => self.int_pending << 1,
            cccr::BUS_CONTROL => self.bus,
            cccr::CAPABILITY => cccr::CAPABILITY_FIXED | self.e4mi,
            o @ cccr::CIS_POINTER..=0x0b => cis_pointer_byte(CIS_START, o - cccr::CIS_POINTER),
            cccr::BUS_SUSPEND | cccr::AR6K_BUS_SUSPEND => 0x00,
            cccr::FUNCTION_SELECT | cccr::AR6K_FUNCTION_SELECT => self.function_select,
            cccr::EXEC_FLAGS | cccr::READY_FLAGS => 0x00,
            cccr::FN0_BLOCK_SIZE => self.block_len[0] as u8,
            o if o == cccr::FN0_BLOCK_SIZE + 1 => (self.block_len[0] >> 8) as u8,
            cccr::POWER_CONTROL => self.power | cccr::SUPPORTED_BIT,
            cccr::HIGH_SPEED => self.speed | cccr::SUPPORTED_BIT,
            _ => {
                warn!("Unknown CCCR register read: offset={:#X}", offset);
                0
            }
        }
    }

    // ========================================================================
    // FBR
    // ========================================================================

    fn fbr_write<H: CardFunctions + ?Sized>(
        &mut self,
        hooks: &mut H,
        func: u8,
        offset: u32,
        value: u8,
    ) {
        trace!(
            "FBR{} write: offset={:#X}, value={:#X}",
            func, offset, value
        );
        let regs = &mut self.fbr[func as usize - 1];

        match offset {
            fbr::INTERFACE_CODE => {
                if regs.interface_code & fbr::CSA_SUPPORT != 0 && value & fbr::CSA_ENABLE != 0 {
                    regs.interface_code |= fbr::CSA_ENABLE;
                } else {
                    regs.interface_code &= !fbr::CSA_ENABLE;
                }
            }
            // Power selection lands in the shared CCCR power control
            fbr::POWER_SELECTION => {
                self.power |= value & cccr::ENABLE_BIT;
            }
            o @ fbr::CSA_POINTER..=0x0e => {
                let shift = 8 * (o - fbr::CSA_POINTER);
                regs.csa_addr = (regs.csa_addr & !(0xff << shift)) | (u32::from(value) << shift);
            }
            fbr::CSA_WINDOW if regs.interface_code & fbr::CSA_ENABLE != 0 => {
                hooks.csa_write(func, regs.csa_addr, value);
                regs.csa_addr = (regs.csa_addr + 1) & 0x00ff_ffff;
            }
            fbr::BLOCK_SIZE => {
                let len = &mut self.block_len[func as usize];
                *len = (*len & 0xff00) | u16::from(value);
                debug!("FBR{} block size: {}", func, *len);
            }
            o if o == fbr::BLOCK_SIZE + 1 => {
                let len = &mut self.block_len[func as usize];
                *len = (*len & 0x00ff) | (u16::from(value) << 8);
                debug!("FBR{} block size: {}", func, *len);
            }
            _ => {
                warn!(
                    "Unknown FBR{} register write: offset={:#X}, value={:#X}",
                    func, offset, value
                );
            }
        }
    }

    fn fbr_read<H: CardFunctions + ?Sized>(&mut self, hooks: &mut H, func: u8, offset: u32) -> u8 {
        trace!("FBR{} read: offset={:#X}", func, offset);
        let cis_offset = self.info[func as usize - 1].cis_offset;
        let regs = &mut self.fbr[func as usize - 1];

        match offset {
            fbr::INTERFACE_CODE => regs.interface_code,
            fbr::EXT_INTERFACE_CODE => regs.ext_interface_code,
            fbr::POWER_SELECTION => cccr::SUPPORTED_BIT,
            o @ fbr::CIS_POINTER..=0x0b => {
                cis_pointer_byte(CIS_START + cis_offset, o - fbr::CIS_POINTER)
            }
            o @ fbr::CSA_POINTER..=0x0e => (regs.csa_addr >> (8 * (o - fbr::CSA_POINTER))) as u8,
            fbr::CSA_WINDOW => {
                if regs.interface_code & fbr::CSA_ENABLE == 0 {
                    return 0;
                }
                let value = hooks.csa_read(func, regs.csa_addr).unwrap_or(0);
                regs.csa_addr = (regs.csa_addr + 1) & 0x00ff_ffff;
                value
            }
            fbr::BLOCK_SIZE => self.block_len[func as usize] as u8,
            o if o == fbr::BLOCK_SIZE + 1 => (self.block_len[func as usize] >> 8) as u8,
            _ => {
                warn!("Unknown FBR{} register read: offset={:#X}", func, offset);
                0
            }
        }
    }
}

/// Byte `index` of a 24-bit little-endian CIS pointer
fn cis_pointer_byte(pointer: u32, index: u32) -> u8 {
    (pointer >> (8 * index)) as u8
}
