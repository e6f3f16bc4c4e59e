//! Atheros AR600x SDIO wireless card.
//!
//! The chip is an [`SdioCard`] with one I/O function. Function 1 is the
//! host interface of the target: interrupt aggregation, four mailboxes and
//! transmit credits. Messages the host writes to mailbox 0 drive the BMI
//! bootstrap until the host hands over to the firmware, after which the WMI
//! transport takes over and announces the target with a READY event.

pub mod bmi;
pub mod hif;
pub mod wmi;

use crate::clock::{TimerEvent, VirtualClock};
use crate::config::{Ar6kConfig, ConfigError};
use crate::sdio::{
    CardConfig, CardFunctions, CardState, CardStatus, FunctionHandler, FunctionInfo, Response,
    SdioCard,
};
use ar6k_hw::ar6k::{self as hw, mbox};
use ar6k_hw::sdio::cccr;
use bmi::BmiSession;
use hif::{Hif, HifEvent};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use wmi::{WmiBackend, WmiTransport};

/// Chip shared between a bus thread and a timer thread
pub type SharedAr6k = Arc<spin::Mutex<Ar6k>>;

/// Target side of the card: everything behind function 1
struct Target {
    config: Ar6kConfig,
    hif: Hif,
    bmi: BmiSession,
    wmi: Option<WmiTransport>,
    backend: Box<dyn WmiBackend>,
    clock: VirtualClock,
}

impl Target {
    fn new(config: Ar6kConfig, backend: Box<dyn WmiBackend>) -> Self {
        Self {
            bmi: BmiSession::new(config.target_info),
            config,
            hif: Hif::new(),
            wmi: None,
            backend,
            clock: VirtualClock::new(),
        }
    }

    fn schedule_counter_update(&mut self) {
        self.clock
            .schedule_after(self.config.credit_debounce, TimerEvent::CounterIrqUpdate);
    }

    fn handle_event(&mut self, event: HifEvent) {
        match event {
            HifEvent::None => {}
            HifEvent::MessageComplete { mbox, len } => self.message_complete(mbox, len),
            HifEvent::WlanInterrupt(value) => {
                if value != 0 && self.wmi.is_none() {
                    debug!("WLAN interrupt {:#X}: firmware handoff", value);
                    self.wmi = Some(WmiTransport::new(
                        self.config.mac_address,
                        self.config.phy_capability,
                    ));
                    self.clock
                        .schedule_after(self.config.alive_delay, TimerEvent::WmiAlive);
                }
            }
        }
    }

    fn message_complete(&mut self, mbox: usize, len: usize) {
        if self.hif.credit_reset(mbox) {
            self.schedule_counter_update();
        }

        if mbox == mbox::WMI_CONTROL && !self.bmi.is_done() {
            if let Some(rlen) = self.bmi.handle(self.hif.window_mut(mbox), len) {
                self.hif.set_available(mbox, rlen);
            }
        } else if mbox == mbox::WMI_CONTROL
            && let Some(wmi) = self.wmi.as_mut()
        {
            wmi.host_message(self.hif.window(mbox), len);
        } else {
            warn!("HIF: unhandled {} byte message on mailbox {}", len, mbox);
        }

        self.clock
            .schedule_after(self.config.credit_debounce, TimerEvent::CreditGrant(mbox));
    }

    fn fire(&mut self, event: TimerEvent) {
        debug!("timer fired: {:?}", event);

        match event {
            TimerEvent::CounterIrqUpdate => self.hif.counter_intr_update(),
            TimerEvent::CreditGrant(mbox) => {
                if self.hif.credit_grant(mbox) {
                    self.schedule_counter_update();
                }
            }
            TimerEvent::WmiAlive => {
                if let Some(wmi) = self.wmi.as_mut()
                    && let Some(frame) = wmi.on_alive(self.backend.as_mut())
                {
                    self.hif.deliver_event(mbox::WMI_CONTROL, &frame);
                }
            }
        }
    }
}

impl CardFunctions for Target {
    fn reset(&mut self) {
        self.hif.reset();
        self.bmi.reset();
        self.wmi = None;
        self.clock.bump_epoch();
    }

    fn read(&mut self, _func: u8, addr: u32, data: &mut [u8], step: u32) {
        let mut addr = addr;
        for byte in data.iter_mut() {
            *byte = self.hif.read(addr);
            addr = addr.wrapping_add(step);
        }
    }

    fn write(&mut self, _func: u8, addr: u32, data: &[u8], step: u32) {
        let mut addr = addr;
        for &value in data {
            let event = self.hif.write(addr, value);
            self.handle_event(event);
            addr = addr.wrapping_add(step);
        }
    }
}

/// Emulated AR600x card as seen from the SDIO bus
pub struct Ar6k {
    card: SdioCard,
    target: Target,
}

impl std::fmt::Debug for Ar6k {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ar6k")
            .field("card", &self.card)
            .field("hif", &self.target.hif)
            .field("bmi", &self.target.bmi)
            .field("wmi", &self.target.wmi)
            .field("now", &self.target.clock.now())
            .finish_non_exhaustive()
    }
}

impl Ar6k {
    /// Attach a card. `backend` receives every WMI event the target emits.
    pub fn new(config: Ar6kConfig, backend: Box<dyn WmiBackend>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut functions = [FunctionInfo::default(); 7];
        functions[0] = FunctionInfo {
            interface_code: hw::FN1_INTERFACE_CODE,
            ext_interface_code: hw::FN1_EXT_INTERFACE_CODE,
            cis_offset: hw::FN1_CIS_OFFSET,
        };

        let mut card = SdioCard::new(CardConfig {
            io_ocr: hw::IO_OCR,
            revision: cccr::REVISION_SDIO_1_10,
            bus_mode: config.bus_mode,
            cis: &hw::CIS,
            functions,
        });
        card.set_handler(1, FunctionHandler::Card);

        let mut chip = Self {
            card,
            target: Target::new(config, backend),
        };
        chip.reset();
        Ok(chip)
    }

    pub fn into_shared(self) -> SharedAr6k {
        Arc::new(spin::Mutex::new(self))
    }

    /// Full card reset. Timers armed before the reset never fire.
    pub fn reset(&mut self) {
        self.card.reset(&mut self.target);
        self.sync_irq();
    }

    fn sync_irq(&mut self) {
        let level = self.target.hif.irq_line();
        self.card.set_function_irq(0, level);
    }

    #[instrument(level = "trace", skip(self))]
    pub fn do_command(&mut self, cmd: u8, arg: u32) -> Response {
        let response = self.card.do_command(&mut self.target, cmd, arg);
        self.sync_irq();
        response
    }

    #[instrument(level = "trace", skip(self))]
    pub fn write_data(&mut self, value: u8) {
        self.card.write_data(&mut self.target, value);
        self.sync_irq();
    }

    #[instrument(level = "trace", skip(self))]
    pub fn read_data(&mut self) -> u8 {
        let value = self.card.read_data(&mut self.target);
        self.sync_irq();
        value
    }

    pub fn data_ready(&self) -> bool {
        self.card.data_ready()
    }

    /// Level of the card interrupt line
    pub fn irq_level(&self) -> bool {
        self.card.irq_level()
    }

    /// Current virtual time in ticks
    pub fn now(&self) -> u64 {
        self.target.clock.now()
    }

    /// Advance virtual time, firing every timer that comes due
    pub fn advance(&mut self, ticks: u64) {
        let until = self.target.clock.now().saturating_add(ticks);
        while let Some(event) = self.target.clock.pop_due(until) {
            self.target.fire(event);
            self.sync_irq();
        }
        self.target.clock.advance_to(until);
    }

    /// Raise target CPU interrupt bits, as the firmware would
    pub fn raise_cpu_interrupt(&mut self, bits: u8) {
        self.target.hif.raise_cpu_interrupt(bits);
        self.sync_irq();
    }

    /// Raise target error interrupt bits
    pub fn raise_error_interrupt(&mut self, bits: u8) {
        self.target.hif.raise_error_interrupt(bits);
        self.sync_irq();
    }

    pub fn state(&self) -> CardState {
        self.card.state()
    }

    pub fn rca(&self) -> u16 {
        self.card.rca()
    }

    pub fn card_status(&self) -> CardStatus {
        self.card.status()
    }

    pub fn bmi_done(&self) -> bool {
        self.target.bmi.is_done()
    }

    /// Whether the WMI transport has been created
    pub fn wmi_active(&self) -> bool {
        self.target.wmi.is_some()
    }

    /// WMI host commands received and not acted on
    pub fn wmi_unhandled_commands(&self) -> u64 {
        self.target
            .wmi
            .as_ref()
            .map_or(0, WmiTransport::unhandled_commands)
    }

    pub fn hif(&self) -> &Hif {
        &self.target.hif
    }
}
