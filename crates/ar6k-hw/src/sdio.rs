//! # References
//! - SD Specifications Part E1, SDIO Simplified Specification v2.00
//! - SD Specifications Part 1, Physical Layer Simplified Specification v2.00

/// Size of the per-function register address space (17-bit CMD52/CMD53 address)
pub const ADDR_SPACE_SIZE: u32 = 0x20000;

/// Mask applied to the register address field of CMD52/CMD53 arguments
pub const ADDR_MASK: u32 = ADDR_SPACE_SIZE - 1;

/// Start of the Card Information Structure in the function 0 address space
pub const CIS_START: u32 = 0x1000;

/// Number of I/O functions addressable by the function field (0..=7)
pub const MAX_FUNCTIONS: usize = 8;

/// Largest block length a function may be configured with
pub const MAX_BLOCK_LEN: usize = 2048;

/// Card status register bits (R1 response layout)
///
/// Reference: Physical Layer Specification, section 4.10.1
pub mod card_status {
    pub const OUT_OF_RANGE: u32 = 1 << 31;
    pub const ADDRESS_ERROR: u32 = 1 << 30;
    pub const BLOCK_LEN_ERROR: u32 = 1 << 29;
    pub const ERASE_SEQ_ERROR: u32 = 1 << 28;
    pub const ERASE_PARAM: u32 = 1 << 27;
    pub const WP_VIOLATION: u32 = 1 << 26;
    pub const CARD_IS_LOCKED: u32 = 1 << 25;
    pub const LOCK_UNLOCK_FAILED: u32 = 1 << 24;
    pub const COM_CRC_ERROR: u32 = 1 << 23;
    pub const ILLEGAL_COMMAND: u32 = 1 << 22;
    pub const CARD_ECC_FAILED: u32 = 1 << 21;
    pub const CC_ERROR: u32 = 1 << 20;
    pub const SD_ERROR: u32 = 1 << 19;
    pub const CID_CSD_OVERWRITE: u32 = 1 << 16;
    pub const WP_ERASE_SKIP: u32 = 1 << 15;
    pub const CARD_ECC_DISABLED: u32 = 1 << 14;
    pub const ERASE_RESET: u32 = 1 << 13;
    /// Four-bit state field, bits 9-12
    pub const CURRENT_STATE: u32 = 0xf << 9;
    pub const READY_FOR_DATA: u32 = 1 << 8;
    pub const APP_CMD: u32 = 1 << 5;
    pub const AKE_SEQ_ERROR: u32 = 1 << 3;

    /// Clear condition A: bits that reflect the current card state
    pub const CLASS_A: u32 = 0x0200_4100;
    /// Clear condition B: bits cleared by the next valid command
    pub const CLASS_B: u32 = 0x00c0_1e00;
    /// Clear condition C: bits cleared once they have been read
    pub const CLASS_C: u32 = 0xfd39_a028;

    /// Value of the status register after a full reset
    pub const RESET_VALUE: u32 = 0x0000_1e00;
}

/// Bits of the CMD52/CMD53 argument
pub mod io_arg {
    /// Read/write flag (1 = write)
    pub const RW_SHIFT: u32 = 31;
    /// Function number field
    pub const FUNC_SHIFT: u32 = 28;
    pub const FUNC_MASK: u32 = 0x7;
    /// CMD52 read-after-write flag
    pub const RAW_SHIFT: u32 = 27;
    /// CMD53 block mode flag
    pub const BLOCK_MODE_SHIFT: u32 = 27;
    /// CMD53 OP code (1 = incrementing address)
    pub const OP_CODE_SHIFT: u32 = 26;
    /// Register address field
    pub const ADDR_SHIFT: u32 = 9;
    /// CMD53 byte/block count field
    pub const COUNT_MASK: u32 = 0x1ff;
    /// CMD52 write data field
    pub const DATA_MASK: u32 = 0xff;
}

/// Card Common Control Register offsets (function 0, 0x00-0xFF)
///
/// Reference: SDIO Specification, section 6.9
pub mod cccr {
    /// CCCR/SDIO revision
    pub const REVISION: u32 = 0x00;
    /// SD physical specification revision
    pub const SD_REVISION: u32 = 0x01;
    /// I/O enable (IOEx)
    pub const IO_ENABLE: u32 = 0x02;
    /// I/O ready (IORx)
    pub const IO_READY: u32 = 0x03;
    /// Interrupt enable (IENM + IENx)
    pub const INT_ENABLE: u32 = 0x04;
    /// Interrupt pending (INTx)
    pub const INT_PENDING: u32 = 0x05;
    /// I/O abort (ASx, RES)
    pub const IO_ABORT: u32 = 0x06;
    /// Bus interface control
    pub const BUS_CONTROL: u32 = 0x07;
    /// Card capability
    pub const CAPABILITY: u32 = 0x08;
    /// Common CIS pointer (3 bytes, little-endian)
    pub const CIS_POINTER: u32 = 0x09;
    /// Bus suspend
    pub const BUS_SUSPEND: u32 = 0x0c;
    /// Function select
    pub const FUNCTION_SELECT: u32 = 0x0d;
    /// Exec flags
    pub const EXEC_FLAGS: u32 = 0x0e;
    /// Ready flags
    pub const READY_FLAGS: u32 = 0x0f;
    /// Function 0 block size (2 bytes, little-endian)
    pub const FN0_BLOCK_SIZE: u32 = 0x10;
    /// Power control
    pub const POWER_CONTROL: u32 = 0x12;
    /// High-speed
    pub const HIGH_SPEED: u32 = 0x13;
    /// Bus suspend, as placed by the AR6K register map
    pub const AR6K_BUS_SUSPEND: u32 = 0x1c;
    /// Function select, as placed by the AR6K register map
    pub const AR6K_FUNCTION_SELECT: u32 = 0x1d;

    /// End of the CCCR region (exclusive)
    pub const END: u32 = 0x100;

    /// SD Physical Specification Version 2.00
    pub const SD_REVISION_2_00: u8 = 0x02;
    /// SDIO Specification Version 2.00, CCCR/FBR Version 1.20
    pub const REVISION_SDIO_2_00: u8 = 0x32;
    /// SDIO Specification Version 1.10, CCCR/FBR Version 1.10
    pub const REVISION_SDIO_1_10: u8 = 0x11;

    /// I/O abort: reset all functions
    pub const ABORT_RES: u8 = 1 << 3;
    /// I/O abort: function select mask
    pub const ABORT_FUNC_MASK: u8 = 0x07;

    /// Bus control: bus width mask
    pub const BUS_WIDTH_MASK: u8 = 0x03;
    /// Bus control: 4-bit bus width
    pub const BUS_WIDTH_4BIT: u8 = 0x02;
    /// Bus control: write mask for the supported bits
    pub const BUS_WRITE_MASK: u8 = 0xe3;
    /// Bus control: SPI continuous interrupt support (always set)
    pub const BUS_SCSI: u8 = 1 << 6;
    /// Bus control: enable SPI continuous interrupt
    pub const BUS_ECSI: u8 = 1 << 5;

    /// Capability: SDC | SMB | S4MI | Full-Speed
    pub const CAPABILITY_FIXED: u8 = 0x13;
    /// Capability: enable 4-bit multi-block interrupt
    pub const CAPABILITY_E4MI: u8 = 0x20;

    /// Interrupt enable: master enable
    pub const INT_ENABLE_MASTER: u8 = 1 << 0;

    /// Power control / high-speed: enable bit
    pub const ENABLE_BIT: u8 = 0x02;
    /// Power control / high-speed: supported bit (read-only)
    pub const SUPPORTED_BIT: u8 = 0x01;
}

/// Function Basic Register offsets (relative to `0x100 * function`)
///
/// Reference: SDIO Specification, section 6.10
pub mod fbr {
    /// Standard SDIO function interface code, CSA support/enable
    pub const INTERFACE_CODE: u32 = 0x00;
    /// Extended standard SDIO function interface code
    pub const EXT_INTERFACE_CODE: u32 = 0x01;
    /// Power selection
    pub const POWER_SELECTION: u32 = 0x02;
    /// Function CIS pointer (3 bytes, little-endian)
    pub const CIS_POINTER: u32 = 0x09;
    /// Function CSA pointer (3 bytes, little-endian)
    pub const CSA_POINTER: u32 = 0x0c;
    /// Data access window to the function's CSA
    pub const CSA_WINDOW: u32 = 0x0f;
    /// I/O block size (2 bytes, little-endian)
    pub const BLOCK_SIZE: u32 = 0x10;

    /// End of the FBR region (exclusive)
    pub const END: u32 = 0x800;

    /// Interface code: function supports a CSA
    pub const CSA_SUPPORT: u8 = 1 << 6;
    /// Interface code: CSA enabled
    pub const CSA_ENABLE: u8 = 1 << 7;
    /// Interface code bits preserved across a reset
    pub const RESET_PRESERVE_MASK: u8 = 0x4f;

    /// No standard SDIO function interface
    pub const INTERFACE_NONE: u8 = 0x00;
    /// No extended standard SDIO function interface
    pub const EXT_INTERFACE_NONE: u8 = 0x00;
}

/// CIS tuple codes
///
/// Reference: SDIO Specification, section 16
pub mod cistpl {
    pub const NULL: u8 = 0x00;
    pub const DEVICE: u8 = 0x01;
    pub const MANFID: u8 = 0x20;
    pub const FUNCID: u8 = 0x21;
    pub const FUNCE: u8 = 0x22;
    pub const END: u8 = 0xff;
}
