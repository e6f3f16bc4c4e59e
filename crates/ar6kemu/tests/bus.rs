//! End-to-end tests driving the card through its bus interface, the way a
//! host controller model would.

use ar6k_hw::ar6k::{mbox, registers as reg};
use ar6k_hw::sdio::cccr;
use ar6kemu::ar6k::bmi::TargetInfoForm;
use ar6kemu::config::{DEFAULT_ALIVE_DELAY, DEFAULT_CREDIT_DEBOUNCE};
use ar6kemu::{Ar6k, Ar6kConfig, CardState, CardStatus, Response, ResponseKind, WmiBackend};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keeps every WMI frame the target sends
#[derive(Clone, Default)]
struct Recorder(Arc<spin::Mutex<Vec<Vec<u8>>>>);

impl Recorder {
    fn frames(&self) -> Vec<Vec<u8>> {
        self.0.lock().clone()
    }
}

impl WmiBackend for Recorder {
    fn send(&mut self, frame: &[u8]) {
        self.0.lock().push(frame.to_vec());
    }
}

struct Host {
    chip: Ar6k,
    recorder: Recorder,
}

impl Host {
    fn attach(config: Ar6kConfig) -> Self {
        init_tracing();
        let recorder = Recorder::default();
        let chip = Ar6k::new(config, Box::new(recorder.clone())).expect("valid config");
        Self { chip, recorder }
    }

    fn new() -> Self {
        Self::attach(Ar6kConfig::default())
    }

    /// CMD5 probe, CMD5 with a voltage window, CMD3, CMD7
    fn enumerate(&mut self) {
        self.chip.do_command(5, 0);
        self.chip.do_command(5, 0x00ff_8000);
        let r6 = self.chip.do_command(3, 0);
        let rca = u32::from(u16::from_be_bytes([r6.bytes()[0], r6.bytes()[1]]));
        self.chip.do_command(7, rca << 16);
        assert_eq!(self.chip.state(), CardState::Command);
    }

    fn write_reg(&mut self, func: u32, addr: u32, value: u8) -> Response {
        let arg = (1 << 31) | (func << 28) | (addr << 9) | u32::from(value);
        self.chip.do_command(52, arg)
    }

    fn read_reg(&mut self, func: u32, addr: u32) -> u8 {
        let arg = (func << 28) | (addr << 9);
        self.chip.do_command(52, arg).bytes()[3]
    }

    fn set_block_len(&mut self, func: u32, len: u16) {
        let [lo, hi] = len.to_le_bytes();
        self.write_reg(0, 0x100 * func + 0x10, lo);
        self.write_reg(0, 0x100 * func + 0x11, hi);
    }

    fn cmd53(&mut self, write: bool, func: u32, block: bool, addr: u32, count: u32) -> Response {
        let arg = (u32::from(write) << 31)
            | (func << 28)
            | (u32::from(block) << 27)
            | (1 << 26)
            | (addr << 9)
            | (count & 0x1ff);
        self.chip.do_command(53, arg)
    }

    /// Byte-mode CMD53 write with an incrementing address
    fn write_bytes(&mut self, func: u32, addr: u32, data: &[u8]) {
        self.cmd53(true, func, false, addr, data.len() as u32);
        for &b in data {
            self.chip.write_data(b);
        }
        assert!(!self.chip.data_ready());
    }

    /// Byte-mode CMD53 read with an incrementing address
    fn read_bytes(&mut self, func: u32, addr: u32, len: usize) -> Vec<u8> {
        self.cmd53(false, func, false, addr, len as u32);
        let data = (0..len).map(|_| self.chip.read_data()).collect();
        assert!(!self.chip.data_ready());
        data
    }

    /// Write a message so that it ends on the last byte of a mailbox window
    fn send_message(&mut self, index: usize, payload: &[u8]) {
        let end = reg::MBOX_BASE + ((index as u32 + 1) << mbox::WINDOW_SHIFT);
        self.write_bytes(1, end - payload.len() as u32, payload);
    }

    /// Read the last `len` bytes of a mailbox window
    fn read_window_tail(&mut self, index: usize, len: usize) -> Vec<u8> {
        let end = reg::MBOX_BASE + ((index as u32 + 1) << mbox::WINDOW_SHIFT);
        self.read_bytes(1, end - len as u32, len)
    }

    fn enable_card_interrupts(&mut self) {
        self.write_reg(0, cccr::INT_ENABLE, 0x03);
    }

    fn finish_bmi(&mut self) {
        self.send_message(0, &1u32.to_le_bytes());
        assert!(self.chip.bmi_done());
    }
}

#[test]
fn sequential_cmd3_advances_rca() {
    let mut host = Host::new();
    host.chip.do_command(5, 1);

    let first = host.chip.do_command(3, 0);
    let second = host.chip.do_command(3, 0);
    assert_eq!(first.kind(), ResponseKind::R6);
    assert_eq!(&first.bytes()[..2], &[0x45, 0x67]);
    assert_eq!(&second.bytes()[..2], &[0x8a, 0xce]);
}

#[test]
fn wrong_state_commands_set_illegal_and_keep_state() {
    let mut host = Host::new();

    // (command, argument) pairs that are invalid in Initialization
    for (cmd, arg) in [(7, 0), (52, 0), (53, 0), (3, 0), (17, 0), (59, 0)] {
        let response = host.chip.do_command(cmd, arg);
        assert!(response.bytes().is_empty(), "CMD{cmd}");
        assert_eq!(host.chip.state(), CardState::Initialization, "CMD{cmd}");
        assert!(host.chip.card_status().contains(CardStatus::ILLEGAL_COMMAND));
    }

    host.enumerate();
    for (cmd, arg) in [(5, 1), (3, 0), (24, 0)] {
        let response = host.chip.do_command(cmd, arg);
        assert!(response.bytes().is_empty(), "CMD{cmd}");
        assert_eq!(host.chip.state(), CardState::Command, "CMD{cmd}");
        assert!(host.chip.card_status().contains(CardStatus::ILLEGAL_COMMAND));
    }

    host.cmd53(true, 1, false, reg::SCRATCH, 2);
    for (cmd, arg) in [(53, 0), (7, 0), (15, 0)] {
        host.chip.do_command(cmd, arg);
        assert_eq!(host.chip.state(), CardState::Transfer, "CMD{cmd}");
        assert!(host.chip.card_status().contains(CardStatus::ILLEGAL_COMMAND));
    }
}

#[test]
fn block_mode_rejects_unusable_block_lengths() {
    let mut host = Host::new();
    host.enumerate();

    let response = host.cmd53(true, 1, true, reg::MBOX_BASE, 1);
    assert_eq!(response.kind(), ResponseKind::R1);
    assert_eq!(host.chip.state(), CardState::Command);

    host.set_block_len(1, 2049);
    let response = host.cmd53(true, 1, true, reg::MBOX_BASE, 1);
    assert_eq!(response.kind(), ResponseKind::R1);
    assert_eq!(host.chip.state(), CardState::Command);

    host.set_block_len(1, 2048);
    let response = host.cmd53(true, 1, true, reg::MBOX_BASE, 1);
    assert_eq!(response.kind(), ResponseKind::R5);
    assert_eq!(host.chip.state(), CardState::Transfer);
}

#[test]
fn block_mode_message_reaches_bmi() {
    let mut host = Host::new();
    host.enumerate();
    host.set_block_len(1, 2048);

    host.cmd53(true, 1, true, reg::MBOX_BASE, 1);
    // The command word leads the message, arguments follow
    for i in 0..2048 {
        let value = if i == 0 { 1 } else { 0 };
        host.chip.write_data(value);
    }
    assert_eq!(host.chip.state(), CardState::Command);
    assert!(host.chip.bmi_done());
}

#[test]
fn bmi_done_then_messages_bypass_bmi() {
    let mut host = Host::new();
    host.enumerate();

    // No-op command publishes an empty response
    host.send_message(0, &0u32.to_le_bytes());
    assert!(!host.chip.bmi_done());

    host.finish_bmi();
    assert_eq!(host.read_reg(1, reg::COUNT + 4), 0);

    // Get-target-id after DONE is not interpreted
    host.send_message(0, &8u32.to_le_bytes());
    assert_eq!(host.read_reg(1, reg::COUNT + 4), 0);
    assert_eq!(host.read_window_tail(0, 4), vec![8, 0, 0, 0]);
}

#[test]
fn get_target_id_legacy() {
    let mut host = Host::new();
    host.enumerate();

    host.send_message(0, &8u32.to_le_bytes());
    assert_eq!(host.read_reg(1, reg::COUNT + 4), 4);
    assert_eq!(host.read_window_tail(0, 4), 0x1100_0044u32.to_le_bytes().to_vec());
}

#[test]
fn get_target_id_extended() {
    let mut host = Host::attach(Ar6kConfig {
        target_info: TargetInfoForm::Extended,
        ..Ar6kConfig::default()
    });
    host.enumerate();

    host.send_message(0, &8u32.to_le_bytes());
    assert_eq!(host.read_reg(1, reg::COUNT + 4), 16);

    let response = host.read_window_tail(0, 16);
    assert_eq!(&response[..4], &[0xff; 4]);
    assert_eq!(&response[4..8], &0x0cu32.to_le_bytes());
    assert_eq!(&response[8..12], &0x1100_0044u32.to_le_bytes());
    assert_eq!(&response[12..], &1u32.to_le_bytes());
}

#[test]
fn ready_event_after_alive_delay() {
    let mut host = Host::attach(Ar6kConfig {
        mac_address: [0x00, 0x03, 0x7f, 0xaa, 0xbb, 0xcc],
        ..Ar6kConfig::default()
    });
    host.enumerate();
    host.enable_card_interrupts();
    host.write_reg(1, reg::INT_STAT_ENABLE, 0x01);
    host.finish_bmi();

    host.write_reg(1, reg::INT_WLAN, 0x01);
    assert!(host.chip.wmi_active());
    assert!(!host.chip.irq_level());

    host.chip.advance(DEFAULT_ALIVE_DELAY - 1);
    assert!(host.recorder.frames().is_empty());
    assert!(!host.chip.irq_level());

    host.chip.advance(1);
    let ready = vec![0x01, 0x10, 0x00, 0x03, 0x7f, 0xaa, 0xbb, 0xcc, 0x03];
    assert_eq!(host.recorder.frames(), vec![ready.clone()]);
    assert!(host.chip.irq_level());
    assert_eq!(host.read_reg(1, reg::HOST_INT_STAT) & 0x01, 0x01);
    assert_eq!(host.read_reg(1, reg::RX_LOOKAHEAD_VALID), 0x01);

    // Later ticks and a second handoff do not repeat it
    host.write_reg(1, reg::INT_WLAN, 0x01);
    host.chip.advance(DEFAULT_ALIVE_DELAY * 4);
    assert_eq!(host.recorder.frames().len(), 1);

    // Consuming the lookahead drops the line
    assert_eq!(host.read_reg(1, reg::RX_LOOKAHEAD0), 9);
    assert!(!host.chip.irq_level());

    let mut frame = vec![9, 0];
    frame.extend_from_slice(&ready);
    assert_eq!(host.read_window_tail(0, frame.len()), frame);
}

#[test]
fn reset_cancels_pending_ready_event() {
    let mut host = Host::new();
    host.enumerate();
    host.write_reg(1, reg::INT_WLAN, 0x01);

    host.write_reg(0, cccr::IO_ABORT, cccr::ABORT_RES);
    assert_eq!(host.chip.state(), CardState::Initialization);
    assert!(!host.chip.wmi_active());

    host.chip.advance(DEFAULT_ALIVE_DELAY * 2);
    assert!(host.recorder.frames().is_empty());
    assert_eq!(host.chip.hif().rx_lookahead_valid(), 0);
}

#[test]
fn byte_mode_round_trip_through_scratch() {
    let mut host = Host::new();
    host.enumerate();

    let data = [0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe];
    host.write_bytes(1, reg::SCRATCH, &data);
    assert_eq!(host.read_bytes(1, reg::SCRATCH, data.len()), data.to_vec());
}

#[test]
fn byte_mode_round_trip_through_mailbox() {
    let mut host = Host::new();
    host.enumerate();

    let data: Vec<u8> = (0..100).map(|i| (i * 7) as u8).collect();
    host.write_bytes(1, reg::MBOX1_BASE, &data);
    assert_eq!(host.read_bytes(1, reg::MBOX1_BASE, data.len()), data);
}

#[test]
fn interrupt_sources_drive_the_line() {
    let mut host = Host::new();
    host.enumerate();
    host.enable_card_interrupts();
    host.write_reg(1, reg::COUNTER_INT_STAT, 0xff);
    host.write_reg(1, reg::INT_STAT_ENABLE, 0xd0);
    assert!(!host.chip.irq_level());

    // cpu
    host.chip.raise_cpu_interrupt(0x01);
    assert!(!host.chip.irq_level());
    host.write_reg(1, reg::CPU_INT_STAT_ENABLE, 0x01);
    assert_eq!(host.read_reg(1, reg::HOST_INT_STAT), 0x40);
    assert!(host.chip.irq_level());
    host.write_reg(1, reg::CPU_INT_STAT, 0x01);
    assert!(!host.chip.irq_level());

    // error
    host.write_reg(1, reg::ERROR_STAT_ENABLE, 0x02);
    host.chip.raise_error_interrupt(0x02);
    assert_eq!(host.read_reg(1, reg::HOST_INT_STAT), 0x80);
    assert!(host.chip.irq_level());
    host.write_reg(1, reg::ERROR_INT_STAT, 0x02);
    assert!(!host.chip.irq_level());

    // counter
    host.send_message(2, &[0xaa]);
    host.write_reg(1, reg::COUNTER_INT_STAT_ENABLE, 0x04);
    assert_eq!(host.read_reg(1, reg::HOST_INT_STAT), 0x10);
    assert!(host.chip.irq_level());

    // all three at once, then clear all three
    host.chip.raise_cpu_interrupt(0x01);
    host.chip.raise_error_interrupt(0x02);
    assert_eq!(host.read_reg(1, reg::HOST_INT_STAT), 0xd0);
    host.write_reg(1, reg::CPU_INT_STAT, 0xff);
    host.write_reg(1, reg::ERROR_INT_STAT, 0xff);
    host.write_reg(1, reg::COUNTER_INT_STAT, 0xff);
    assert_eq!(host.read_reg(1, reg::HOST_INT_STAT), 0x00);
    assert!(!host.chip.irq_level());
}

#[test]
fn credits_are_granted_after_debounce() {
    let mut host = Host::new();
    host.enumerate();
    host.enable_card_interrupts();
    host.write_reg(1, reg::COUNTER_INT_STAT, 0xff);
    host.write_reg(1, reg::COUNTER_INT_STAT_ENABLE, 0x22);
    host.write_reg(1, reg::INT_STAT_ENABLE, 0x10);

    host.send_message(1, &[1, 2, 3]);
    assert_eq!(host.chip.hif().credit(1), 0x00);
    assert_eq!(host.read_reg(1, reg::COUNTER_INT_STAT), 0x02);
    // The counter bit reaches the host status only after the debounce
    assert!(!host.chip.irq_level());

    host.chip.advance(DEFAULT_CREDIT_DEBOUNCE);
    assert_eq!(host.chip.hif().credit(1), 0xff);
    assert_eq!(host.read_reg(1, reg::COUNTER_INT_STAT), 0x22);
    assert!(host.chip.irq_level());

    // Reading the credit reset register acknowledges the reset bit
    assert_eq!(host.read_reg(1, reg::COUNT_RESET + 4), 0xff);
    assert_eq!(host.read_reg(1, reg::COUNTER_INT_STAT), 0x20);

    // Decrement reads count down
    assert_eq!(host.read_reg(1, reg::COUNT_DEC + 4), 0xff);
    assert_eq!(host.read_reg(1, reg::COUNT_DEC + 4), 0xfe);
}

#[test]
fn infinite_transfer_stops_on_abort() {
    let mut host = Host::new();
    host.enumerate();
    host.set_block_len(1, 4);

    host.cmd53(true, 1, true, reg::MBOX2_BASE, 0);
    for i in 0..64 {
        host.chip.write_data(i);
    }
    assert!(host.chip.data_ready());
    assert_eq!(host.read_reg(0, cccr::AR6K_FUNCTION_SELECT), 1);

    host.write_reg(0, cccr::IO_ABORT, 0x01);
    assert!(!host.chip.data_ready());
    assert_eq!(host.chip.state(), CardState::Command);
    // Sixteen blocks went out, each one advancing the address
    assert_eq!(host.read_bytes(1, reg::MBOX2_BASE + 60, 4), vec![60, 61, 62, 63]);
}

#[test]
fn function_cis_is_readable() {
    let mut host = Host::new();
    host.enumerate();

    let pointer = u32::from_le_bytes([
        host.read_reg(0, 0x109),
        host.read_reg(0, 0x10a),
        host.read_reg(0, 0x10b),
        0,
    ]);
    assert_eq!(pointer, 0x1017);

    let tuples = host.read_bytes(0, pointer, 4);
    assert_eq!(tuples, vec![0x20, 0x04, 0x71, 0x02]);
    assert_eq!(host.read_reg(1, reg::CIS_WINDOW + 0x17), 0x20);
}

#[test]
fn shared_chip_is_usable_across_threads() {
    init_tracing();
    let shared = Ar6k::new(Ar6kConfig::default(), Box::new(ar6kemu::NullBackend))
        .expect("valid config")
        .into_shared();

    let timer = {
        let shared = shared.clone();
        std::thread::spawn(move || {
            for _ in 0..16 {
                shared.lock().advance(DEFAULT_CREDIT_DEBOUNCE);
            }
        })
    };
    shared.lock().do_command(5, 1);
    timer.join().expect("timer thread");

    let chip = shared.lock();
    assert_eq!(chip.now(), DEFAULT_CREDIT_DEBOUNCE * 16);
    assert_eq!(chip.state(), CardState::Initialization);
}
