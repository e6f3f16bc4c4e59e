//! # References
//! - Atheros AR6001 host interface register map (`AR6K_*` offsets as used by
//!   the Linux `ar6000` HIF layer)
//! - BMI and WMI definitions from the AR6K firmware 1.3 host headers

use crate::sdio::{cistpl, fbr};

/// IO OCR advertised by the card: 2.9 - 3.6 V, no memory, one I/O function
pub const IO_OCR: u32 = 0x10fe_0000;

/// Default IO OCR of a bare SDIO core: 2.0 - 3.6 V, no memory, no functions
pub const GENERIC_IO_OCR: u32 = 0x00ff_ff00;

/// Function 1 interface code
pub const FN1_INTERFACE_CODE: u8 = fbr::INTERFACE_NONE;

/// Function 1 extended interface code
pub const FN1_EXT_INTERFACE_CODE: u8 = fbr::EXT_INTERFACE_NONE;

/// HIF register offsets in the function 1 address space
pub mod registers {
    /// Host interrupt status (write 1 to clear)
    pub const HOST_INT_STAT: u32 = 0x400;
    /// Target CPU interrupt status (write 1 to clear)
    pub const CPU_INT_STAT: u32 = 0x401;
    /// Error interrupt status (write 1 to clear)
    pub const ERROR_INT_STAT: u32 = 0x402;
    /// Counter interrupt status (write 1 to clear)
    pub const COUNTER_INT_STAT: u32 = 0x403;
    /// Mailbox frame register
    pub const MBOX_FRAME: u32 = 0x404;
    /// Per-mailbox receive lookahead valid bits
    pub const RX_LOOKAHEAD_VALID: u32 = 0x405;
    /// Receive lookahead for mailbox 0 (4 bytes; mailboxes 1-3 follow)
    pub const RX_LOOKAHEAD0: u32 = 0x408;
    pub const RX_LOOKAHEAD1: u32 = 0x40c;
    pub const RX_LOOKAHEAD2: u32 = 0x410;
    pub const RX_LOOKAHEAD3: u32 = 0x414;
    /// Host interrupt status enable
    pub const INT_STAT_ENABLE: u32 = 0x418;
    /// Target CPU interrupt status enable
    pub const CPU_INT_STAT_ENABLE: u32 = 0x419;
    /// Error interrupt status enable
    pub const ERROR_STAT_ENABLE: u32 = 0x41a;
    /// Counter interrupt status enable
    pub const COUNTER_INT_STAT_ENABLE: u32 = 0x41b;
    /// Counter block; `COUNT + 4 + n` holds mailbox n's available byte count
    pub const COUNT: u32 = 0x420;
    /// Per-mailbox credit reset registers (stride 4)
    pub const COUNT_RESET: u32 = 0x440;
    /// Per-mailbox credit decrement registers (stride 4)
    pub const COUNT_DEC: u32 = 0x450;
    /// Scratch registers (8 bytes)
    pub const SCRATCH: u32 = 0x460;
    pub const FIFO_TIMEOUT: u32 = 0x468;
    pub const FIFO_TIMEOUT_ENABLE: u32 = 0x469;
    pub const DISABLE_SLEEP: u32 = 0x46a;
    pub const LOCAL_BUS_ENDIAN: u32 = 0x46e;
    pub const LOCAL_BUS: u32 = 0x470;
    /// WLAN interrupt, written by the host once the firmware is loaded
    pub const INT_WLAN: u32 = 0x472;
    pub const WINDOW_DATA: u32 = 0x474;
    pub const WRITE_ADDR: u32 = 0x478;
    pub const READ_ADDR: u32 = 0x47c;
    pub const SPI_CONFIG: u32 = 0x480;
    pub const SPI_STATUS: u32 = 0x481;
    /// Read-only window onto the card's CIS
    pub const CIS_WINDOW: u32 = 0x600;
    pub const CIS_WINDOW_END: u32 = 0x7ff;
    /// Mailbox data windows
    pub const MBOX_BASE: u32 = 0x800;
    pub const MBOX0_BASE: u32 = 0x800;
    pub const MBOX1_BASE: u32 = 0x1000;
    pub const MBOX2_BASE: u32 = 0x1800;
    pub const MBOX3_BASE: u32 = 0x2000;
    pub const MBOX_END: u32 = 0x27ff;

    /// Stride between per-mailbox counter registers
    pub const COUNTER_STRIDE: u32 = 4;
}

/// Mailbox layout
pub mod mbox {
    /// Number of mailboxes
    pub const COUNT: usize = 4;
    /// log2 of the mailbox window size
    pub const WINDOW_SHIFT: u32 = 11;
    /// Size of one mailbox window in bytes
    pub const WINDOW_SIZE: usize = 1 << WINDOW_SHIFT;
    /// Offset mask within a mailbox window
    pub const WINDOW_MASK: u32 = (WINDOW_SIZE as u32) - 1;

    /// HTC frame header length (little-endian payload length)
    pub const HTC_HEADER_LEN: usize = 2;

    /// WMI control mailbox
    pub const WMI_CONTROL: usize = 0;
    pub const WMI_BEST_EFFORT: usize = 1;
    pub const WMI_LOW_PRIORITY: usize = 2;
    pub const WMI_HIGH_PRIORITY: usize = 3;
}

/// Host interrupt status bits
pub mod host_int {
    /// Mailbox n has data pending (bits 0-3)
    pub const MBOX_DATA_MASK: u8 = 0x0f;
    pub const COUNTER: u8 = 1 << 4;
    pub const CPU: u8 = 1 << 6;
    pub const ERROR: u8 = 1 << 7;
}

/// Counter interrupt status bits
pub mod counter_int {
    /// Credit reset pending for mailbox n (bits 0-3)
    pub const RESET_SHIFT: u32 = 0;
    /// Credit grant pending for mailbox n (bits 4-7)
    pub const GRANT_SHIFT: u32 = 4;
    /// Counter interrupt status after a reset
    pub const RESET_VALUE: u8 = 0xf0;
}

/// Transmit credit values
pub mod credit {
    /// Credits available after a grant
    pub const FULL: u8 = 0xff;
    /// Credits after a completed transfer
    pub const EMPTY: u8 = 0x00;
}

/// Bootloader Messaging Interface
pub mod bmi {
    pub const NO_COMMAND: u32 = 0;
    /// Host is done using BMI
    pub const DONE: u32 = 1;
    /// Host reads AR6K memory
    pub const READ_MEMORY: u32 = 2;
    /// Host writes AR6K memory
    pub const WRITE_MEMORY: u32 = 3;
    /// Causes AR6K to execute code
    pub const EXECUTE: u32 = 4;
    /// Set target application starting address
    pub const SET_APP_START: u32 = 5;
    /// Read a 32-bit target SOC register
    pub const READ_SOC_REGISTER: u32 = 6;
    /// Write a 32-bit target SOC register
    pub const WRITE_SOC_REGISTER: u32 = 7;
    /// Fetch the 4-byte target information
    pub const GET_TARGET_ID: u32 = 8;
    pub const ROMPATCH_INSTALL: u32 = 9;
    pub const ROMPATCH_UNINSTALL: u32 = 10;
    pub const ROMPATCH_ACTIVATE: u32 = 11;
    pub const ROMPATCH_DEACTIVATE: u32 = 12;

    /// Leading word of the extended target information response
    pub const TARGET_VERSION_SENTINEL: u32 = 0xffff_ffff;
    /// Target version reported by firmware 1.3 silicon
    pub const TARGET_VERSION_ID: u32 = 0x1100_0044;
    pub const TARGET_TYPE_AR6001: u32 = 1;
    pub const TARGET_TYPE_AR6002: u32 = 2;
    /// Byte count field of the extended target information response
    pub const TARGET_INFO_BYTE_COUNT: u32 = 0x0c;
    /// Length of the legacy response (version word only)
    pub const TARGET_ID_LEGACY_LEN: usize = 4;
    /// Length of the extended response (sentinel, count, version, type)
    pub const TARGET_ID_EXTENDED_LEN: usize = 16;
}

/// Wireless Module Interface
pub mod wmi {
    pub const READY_EVENTID: u16 = 0x1001;
    pub const CONNECT_EVENTID: u16 = 0x1002;
    pub const DISCONNECT_EVENTID: u16 = 0x1003;
    pub const BSSINFO_EVENTID: u16 = 0x1004;
    pub const CMDERROR_EVENTID: u16 = 0x1005;
    pub const REGDOMAIN_EVENTID: u16 = 0x1006;

    /// Length of the WMI message id prefix
    pub const ID_LEN: usize = 2;
    /// Largest WMI event payload
    pub const MAX_PAYLOAD: usize = 128;

    pub const CAPABILITY_11A: u8 = 1;
    pub const CAPABILITY_11G: u8 = 2;
    pub const CAPABILITY_11AG: u8 = 3;
}

/// Function 0 CIS tuples
pub const COMMON_CIS: [u8; 23] = [
    cistpl::DEVICE, 3, // Not SDIO standard
    0x00, 0x00, 0x00,
    cistpl::MANFID, 4,
    0x71, 0x02, // SDIO card manufacturer code
    0x0a, 0x01, // Manufacturer information (part no, rev)
    cistpl::FUNCID, 2,
    0x0c, // Card function code: SDIO
    0x00, // System initialization mask
    cistpl::FUNCE, 4,
    0x00,       // Type of extended data: function 0
    0x00, 0x08, // Max block size for fn0: 2048
    0x32,       // Max transfer rate per line: 25 Mb/s
    cistpl::END, 0xff,
];

/// Function 1 CIS tuples
pub const FN1_CIS: [u8; 56] = [
    cistpl::MANFID, 4,
    0x71, 0x02, // SDIO card manufacturer code
    0x0a, 0x01, // Manufacturer information (part no, rev)
    cistpl::FUNCID, 2,
    0x0c, // Card function code: SDIO
    0x00, // System initialization mask
    cistpl::FUNCE, 42,
    0x01,                   // Type of extended data: function 1-7
    0x01,                   // Function information: has wake-up
    0x11,                   // Application specification version
    0x00, 0x00, 0x00, 0x00, // Product serial number: unsupported
    0x00, 0x00, 0x00, 0x00, // CSA space size: no CSA
    0x00,                   // CSA space properties: no CSA
    0x00, 0x08,             // Max block size: 2048
    0x00, 0x00, 0xff, 0x00, // OCR value: 2.8 - 3.6 V
    0x00,                   // Min required current: above 200 mA
    0x00,                   // Average required current: above 200 mA
    0x00,                   // Max required current: above 200 mA
    0x00,                   // Min standby current: none
    0x01,                   // Average standby current: 1 mA
    0x0a,                   // Max standby current: 10 mA
    0x00, 0x00,             // Min transfer bandwidth: no minimum
    0x00, 0x00,             // Optimum transfer bandwidth: no optimum
    0x00, 0x00,             // Ready timeout: none
    0x00, 0x00,             // Average required current: above 200 mA
    0x00, 0x00,             // Max required current: above 200 mA
    0x01, 0x01,             // Average HC-mode current: 256 mA
    0x00, 0x01,             // Max HC-mode current: 256 mA
    0x00, 0x01,             // Average LC-mode current: 256 mA
    0x00, 0x01,             // Max LC-mode current: 256 mA
    cistpl::END, 0xff,
];

/// Offset of the function 1 tuples within the card CIS
pub const FN1_CIS_OFFSET: u32 = COMMON_CIS.len() as u32;

/// Total CIS length
pub const CIS_LEN: usize = COMMON_CIS.len() + FN1_CIS.len();

/// Complete card CIS: function 0 tuples followed by function 1 tuples
pub const CIS: [u8; CIS_LEN] = concat_cis();

const fn concat_cis() -> [u8; CIS_LEN] {
    let mut out = [0u8; CIS_LEN];
    let mut i = 0;
    while i < COMMON_CIS.len() {
        out[i] = COMMON_CIS[i];
        i += 1;
    }
    let mut j = 0;
    while j < FN1_CIS.len() {
        out[COMMON_CIS.len() + j] = FN1_CIS[j];
        j += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_chains_are_well_formed() {
        for table in [&COMMON_CIS[..], &FN1_CIS[..]] {
            let mut pos = 0;
            loop {
                let code = table[pos];
                if code == cistpl::END {
                    assert_eq!(pos + 2, table.len());
                    break;
                }
                pos += 2 + table[pos + 1] as usize;
            }
        }
    }

    #[test]
    fn fn1_tuples_follow_common_tuples() {
        assert_eq!(CIS[FN1_CIS_OFFSET as usize], cistpl::MANFID);
        assert_eq!(&CIS[..COMMON_CIS.len()], &COMMON_CIS[..]);
    }
}
