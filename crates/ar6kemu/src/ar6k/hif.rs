//! AR6000 host interface (function 1 register window).
//!
//! Aggregates the target's interrupt sources into the host interrupt status
//! register, holds the four mailbox windows and the per-mailbox transmit
//! credit counters. The function interrupt line is high while any enabled
//! host status bit is set.

use ar6k_hw::ar6k::{CIS, counter_int, credit, host_int, mbox, registers as reg};
use tracing::{debug, trace, warn};

/// Something the target has to act on after a register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HifEvent {
    None,
    /// The last byte of a mailbox window was written
    MessageComplete { mbox: usize, len: usize },
    /// The host wrote the WLAN interrupt register
    WlanInterrupt(u8),
}

/// HIF register state
#[derive(Debug)]
pub struct Hif {
    host_int_stat: u8,
    cpu_int_stat: u8,
    error_int_stat: u8,
    counter_int_stat: u8,
    mbox_frame: u8,
    rx_lookahead_valid: u8,
    rx_lookahead: [u32; mbox::COUNT],
    int_stat_enable: u8,
    cpu_int_stat_enable: u8,
    error_int_stat_enable: u8,
    counter_int_stat_enable: u8,
    /// Bytes available to the host per mailbox
    available: [u8; mbox::COUNT],
    /// Transmit credits per mailbox
    credits: [u8; mbox::COUNT],
    scratch: [u8; 8],
    wlan_int: u8,
    mbox: Vec<u8>,
    /// Bytes written into each window since the last completed message
    mbox_count: [usize; mbox::COUNT],
}

impl Default for Hif {
    fn default() -> Self {
        Self::new()
    }
}

impl Hif {
    pub fn new() -> Self {
        let mut hif = Self {
            host_int_stat: 0,
            cpu_int_stat: 0,
            error_int_stat: 0,
            counter_int_stat: 0,
            mbox_frame: 0,
            rx_lookahead_valid: 0,
            rx_lookahead: [0; mbox::COUNT],
            int_stat_enable: 0,
            cpu_int_stat_enable: 0,
            error_int_stat_enable: 0,
            counter_int_stat_enable: 0,
            available: [0; mbox::COUNT],
            credits: [credit::FULL; mbox::COUNT],
            scratch: [0; 8],
            wlan_int: 0,
            mbox: vec![0u8; mbox::WINDOW_SIZE * mbox::COUNT],
            mbox_count: [0; mbox::COUNT],
        };
        hif.reset();
        hif
    }

    /// Return the interrupt and credit state to power-on values.
    ///
    /// Mailbox contents, scratch and the WLAN interrupt register are kept.
    pub fn reset(&mut self) {
        debug!("HIF reset");

        self.available = [0; mbox::COUNT];
        self.credits = [credit::FULL; mbox::COUNT];
        self.mbox_count = [0; mbox::COUNT];
        self.rx_lookahead = [0; mbox::COUNT];
        self.rx_lookahead_valid = 0;

        self.host_int_stat = 0;
        self.cpu_int_stat = 0;
        self.error_int_stat = 0;
        self.counter_int_stat = counter_int::RESET_VALUE;
        self.int_stat_enable = 0;
        self.cpu_int_stat_enable = 0;
        self.error_int_stat_enable = 0;
        self.counter_int_stat_enable = 0;

        self.cpu_intr_update();
        self.error_intr_update();
        self.counter_intr_update();
    }

    /// Level of the function 1 interrupt line
    pub fn irq_line(&self) -> bool {
        self.host_int_stat & self.int_stat_enable != 0
    }

    pub fn host_int_status(&self) -> u8 {
        self.host_int_stat
    }

    pub fn counter_int_status(&self) -> u8 {
        self.counter_int_stat
    }

    pub fn credit(&self, mbox: usize) -> u8 {
        self.credits[mbox]
    }

    pub fn available(&self, mbox: usize) -> u8 {
        self.available[mbox]
    }

    pub fn set_available(&mut self, mbox: usize, len: u8) {
        self.available[mbox] = len;
    }

    pub fn rx_lookahead(&self, mbox: usize) -> u32 {
        self.rx_lookahead[mbox]
    }

    pub fn rx_lookahead_valid(&self) -> u8 {
        self.rx_lookahead_valid
    }

    /// Contents of a mailbox window
    pub fn window(&self, mbox: usize) -> &[u8] {
        let start = mbox * mbox::WINDOW_SIZE;
        &self.mbox[start..start + mbox::WINDOW_SIZE]
    }

    pub fn window_mut(&mut self, mbox: usize) -> &mut [u8] {
        let start = mbox * mbox::WINDOW_SIZE;
        &mut self.mbox[start..start + mbox::WINDOW_SIZE]
    }

    // ========================================================================
    // Interrupt aggregation
    // ========================================================================

    fn set_host_bit(&mut self, bit: u8, level: bool) {
        if level {
            self.host_int_stat |= bit;
        } else {
            self.host_int_stat &= !bit;
        }
    }

    fn cpu_intr_update(&mut self) {
        let level = self.cpu_int_stat & self.cpu_int_stat_enable != 0;
        self.set_host_bit(host_int::CPU, level);
    }

    fn error_intr_update(&mut self) {
        let level = self.error_int_stat & self.error_int_stat_enable != 0;
        self.set_host_bit(host_int::ERROR, level);
    }

    /// Re-derive the counter bit of the host status
    pub fn counter_intr_update(&mut self) {
        let level = self.counter_int_stat & self.counter_int_stat_enable != 0;
        self.set_host_bit(host_int::COUNTER, level);
        trace!(
            "HIF counter interrupt: status={:#X}, enable={:#X}",
            self.counter_int_stat, self.counter_int_stat_enable
        );
    }

    /// Raise target CPU interrupt bits
    pub fn raise_cpu_interrupt(&mut self, bits: u8) {
        self.cpu_int_stat |= bits;
        self.cpu_intr_update();
    }

    /// Raise target error interrupt bits
    pub fn raise_error_interrupt(&mut self, bits: u8) {
        self.error_int_stat |= bits;
        self.error_intr_update();
    }

    // ========================================================================
    // Credits
    // ========================================================================

    /// Drop a mailbox's credits after a completed message.
    ///
    /// Returns `true` when a counter interrupt update should be scheduled.
    pub fn credit_reset(&mut self, mbox: usize) -> bool {
        self.credits[mbox] = credit::EMPTY;
        let bit = 1u8 << (mbox as u32 + counter_int::RESET_SHIFT);
        if self.counter_int_stat & bit == 0 {
            self.counter_int_stat |= bit;
            return true;
        }
        false
    }

    /// Restore a mailbox's credits.
    ///
    /// Returns `true` when a counter interrupt update should be scheduled.
    pub fn credit_grant(&mut self, mbox: usize) -> bool {
        self.credits[mbox] = credit::FULL;
        let bit = 1u8 << (mbox as u32 + counter_int::GRANT_SHIFT);
        if self.counter_int_stat & bit == 0 {
            self.counter_int_stat |= bit;
            return true;
        }
        false
    }

    // ========================================================================
    // Inbound frames
    // ========================================================================

    /// Place an HTC frame carrying `payload` at the end of a mailbox window
    /// and flag it to the host.
    pub fn deliver_event(&mut self, mbox: usize, payload: &[u8]) {
        let max = mbox::WINDOW_SIZE - mbox::HTC_HEADER_LEN;
        let payload = if payload.len() > max {
            warn!("HIF: {} byte frame truncated to {}", payload.len(), max);
            &payload[..max]
        } else {
            payload
        };
        let len = payload.len();

        self.rx_lookahead[mbox] = len as u32;
        self.rx_lookahead_valid |= 1u8 << mbox;

        let window = self.window_mut(mbox);
        let start = mbox::WINDOW_SIZE - (len + mbox::HTC_HEADER_LEN);
        window[start..start + mbox::HTC_HEADER_LEN].copy_from_slice(&(len as u16).to_le_bytes());
        window[start + mbox::HTC_HEADER_LEN..].copy_from_slice(payload);

        self.host_int_stat |= 1u8 << mbox;
        debug!("HIF: {} byte frame queued in mailbox {}", len, mbox);
    }

    // ========================================================================
    // Register access
    // ========================================================================

    pub fn write(&mut self, addr: u32, value: u8) -> HifEvent {
        trace!("HIF write: addr={:#X}, value={:#X}", addr, value);

        match addr {
            reg::HOST_INT_STAT => {
                self.host_int_stat &= !value;
            }
            reg::CPU_INT_STAT => {
                self.cpu_int_stat &= !value;
                self.cpu_intr_update();
            }
            reg::ERROR_INT_STAT => {
                self.error_int_stat &= !value;
                self.error_intr_update();
            }
            reg::COUNTER_INT_STAT => {
                self.counter_int_stat &= !value;
                self.counter_intr_update();
            }

            reg::MBOX_FRAME => self.mbox_frame = value,

            reg::INT_STAT_ENABLE => {
                self.int_stat_enable = value;
                debug!("HIF host interrupt enable: {:#X}", value);
            }
            reg::CPU_INT_STAT_ENABLE => {
                self.cpu_int_stat_enable = value;
                self.cpu_intr_update();
            }
            reg::ERROR_STAT_ENABLE => {
                self.error_int_stat_enable = value;
                self.error_intr_update();
            }
            reg::COUNTER_INT_STAT_ENABLE => {
                self.counter_int_stat_enable = value;
                self.counter_intr_update();
            }

            a @ reg::SCRATCH..=0x467 => self.scratch[(a - reg::SCRATCH) as usize] = value,

            reg::INT_WLAN => {
                self.wlan_int = value;
                return HifEvent::WlanInterrupt(value);
            }

            reg::FIFO_TIMEOUT
            | reg::FIFO_TIMEOUT_ENABLE
            | reg::DISABLE_SLEEP
            | reg::LOCAL_BUS_ENDIAN
            | reg::LOCAL_BUS
            | reg::WINDOW_DATA
            | reg::WRITE_ADDR
            | reg::READ_ADDR
            | reg::SPI_CONFIG => {
                warn!("HIF: unsupported register write: addr={:#X}, value={:#X}", addr, value);
            }

            a @ reg::MBOX_BASE..=reg::MBOX_END => {
                let offset = (a - reg::MBOX_BASE) as usize;
                let mbox = offset >> mbox::WINDOW_SHIFT;
                self.mbox[offset] = value;
                self.mbox_count[mbox] += 1;

                if a & mbox::WINDOW_MASK == mbox::WINDOW_MASK {
                    let len = std::mem::take(&mut self.mbox_count[mbox]);
                    debug!("HIF: mailbox {} message complete ({} bytes)", mbox, len);
                    return HifEvent::MessageComplete { mbox, len };
                }
            }

            _ => {
                warn!("Unknown HIF register write: addr={:#X}, value={:#X}", addr, value);
            }
        }

        HifEvent::None
    }

    pub fn read(&mut self, addr: u32) -> u8 {
        trace!("HIF read: addr={:#X}", addr);

        match addr {
            reg::HOST_INT_STAT => self.host_int_stat,
            reg::CPU_INT_STAT => self.cpu_int_stat,
            reg::ERROR_INT_STAT => self.error_int_stat,
            reg::COUNTER_INT_STAT => self.counter_int_stat,

            reg::MBOX_FRAME => self.mbox_frame,
            reg::RX_LOOKAHEAD_VALID => self.rx_lookahead_valid,

            a @ reg::RX_LOOKAHEAD0..=0x417 => {
                let mbox = ((a - reg::RX_LOOKAHEAD0) >> 2) as usize;
                self.rx_lookahead_valid &= !(1u8 << mbox);
                self.host_int_stat &= !(1u8 << mbox);
                (self.rx_lookahead[mbox] >> ((a & 3) << 3)) as u8
            }

            reg::INT_STAT_ENABLE => self.int_stat_enable,
            reg::CPU_INT_STAT_ENABLE => self.cpu_int_stat_enable,
            reg::ERROR_STAT_ENABLE => self.error_int_stat_enable,
            reg::COUNTER_INT_STAT_ENABLE => self.counter_int_stat_enable,

            a @ 0x424..=0x427 => self.available[(a - reg::COUNT - 4) as usize],

            a @ reg::COUNT_RESET..=0x44f if a % reg::COUNTER_STRIDE == 0 => {
                let mbox = ((a - reg::COUNT_RESET) / reg::COUNTER_STRIDE) as usize;
                self.counter_int_stat &= !(1u8 << mbox);
                self.counter_intr_update();
                self.credits[mbox]
            }

            a @ reg::COUNT_DEC..=0x45f if a % reg::COUNTER_STRIDE == 0 => {
                let mbox = ((a - reg::COUNT_DEC) / reg::COUNTER_STRIDE) as usize;
                let value = self.credits[mbox];
                self.credits[mbox] = value.wrapping_sub(1);
                value
            }

            a @ reg::SCRATCH..=0x467 => self.scratch[(a - reg::SCRATCH) as usize],

            reg::INT_WLAN => self.wlan_int,

            a @ reg::CIS_WINDOW..=reg::CIS_WINDOW_END => {
                let offset = (a - reg::CIS_WINDOW) as usize;
                match CIS.get(offset) {
                    Some(&b) => b,
                    None => {
                        warn!("HIF: read past CIS window contents at {:#X}", a);
                        0
                    }
                }
            }

            a @ reg::MBOX_BASE..=reg::MBOX_END => self.mbox[(a - reg::MBOX_BASE) as usize],

            reg::FIFO_TIMEOUT
            | reg::FIFO_TIMEOUT_ENABLE
            | reg::DISABLE_SLEEP
            | reg::LOCAL_BUS_ENDIAN
            | reg::LOCAL_BUS
            | reg::WINDOW_DATA
            | reg::WRITE_ADDR
            | reg::READ_ADDR
            | reg::SPI_CONFIG
            | reg::SPI_STATUS => {
                warn!("HIF: unsupported register read: addr={:#X}", addr);
                0
            }

            _ => {
                warn!("Unknown HIF register read: addr={:#X}", addr);
                0
            }
        }
    }
}
