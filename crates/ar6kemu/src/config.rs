//! Card configuration.
//!
//! Everything here is fixed at attach time. The register-level constants
//! (offsets, CIS tuples) live in `ar6k-hw`; this covers the knobs a board
//! model may want to change.

use crate::ar6k::bmi::TargetInfoForm;
use ar6k_hw::ar6k::wmi;
use std::fmt;

/// Virtual clock ticks per emulated second (nanosecond resolution)
pub const TICKS_PER_SEC: u64 = 1_000_000_000;

/// Delay between the firmware handoff and the WMI READY event (2 s)
pub const DEFAULT_ALIVE_DELAY: u64 = TICKS_PER_SEC << 1;

/// Debounce applied to counter interrupt updates and credit grants (1/64 s)
pub const DEFAULT_CREDIT_DEBOUNCE: u64 = TICKS_PER_SEC >> 6;

/// Default station address (Atheros OUI)
pub const DEFAULT_MAC_ADDRESS: [u8; 6] = [0x00, 0x03, 0x7f, 0x00, 0x00, 0x01];

/// Physical bus protocol the card is attached with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusMode {
    /// SD 1-bit/4-bit native mode
    #[default]
    Native,
    /// SPI mode (byte-wide responses)
    Spi,
}

/// Configuration for an emulated AR600x card
#[derive(Debug, Clone)]
pub struct Ar6kConfig {
    /// Station address reported in the WMI READY event
    pub mac_address: [u8; 6],
    /// PHY capability reported in the WMI READY event
    pub phy_capability: u8,
    /// Bus protocol the host talks
    pub bus_mode: BusMode,
    /// Layout of the BMI get-target-id response
    pub target_info: TargetInfoForm,
    /// Ticks from firmware handoff to the WMI READY event
    pub alive_delay: u64,
    /// Ticks before a counter interrupt update or credit grant takes effect
    pub credit_debounce: u64,
}

impl Default for Ar6kConfig {
    fn default() -> Self {
        Self {
            mac_address: DEFAULT_MAC_ADDRESS,
            phy_capability: wmi::CAPABILITY_11AG,
            bus_mode: BusMode::Native,
            target_info: TargetInfoForm::Legacy,
            alive_delay: DEFAULT_ALIVE_DELAY,
            credit_debounce: DEFAULT_CREDIT_DEBOUNCE,
        }
    }
}

impl Ar6kConfig {
    /// Validate that the configuration describes a card a driver can bind to
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mac_address[0] & 0x01 != 0 {
            return Err(ConfigError::MulticastMacAddress(self.mac_address));
        }
        if !(wmi::CAPABILITY_11A..=wmi::CAPABILITY_11AG).contains(&self.phy_capability) {
            return Err(ConfigError::InvalidPhyCapability(self.phy_capability));
        }
        if self.alive_delay == 0 {
            return Err(ConfigError::ZeroDelay("alive_delay"));
        }
        if self.credit_debounce == 0 {
            return Err(ConfigError::ZeroDelay("credit_debounce"));
        }
        Ok(())
    }
}

/// Errors that can occur when validating an `Ar6kConfig`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The station address has the group bit set
    MulticastMacAddress([u8; 6]),
    /// PHY capability is not one of 11A, 11G or 11AG
    InvalidPhyCapability(u8),
    /// A timer delay is zero; the event would fire inside the bus call
    ZeroDelay(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MulticastMacAddress(mac) => write!(
                f,
                "station address {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} is a group address",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
            ConfigError::InvalidPhyCapability(cap) => {
                write!(f, "unknown PHY capability {cap}")
            }
            ConfigError::ZeroDelay(name) => write!(f, "{name} must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}
