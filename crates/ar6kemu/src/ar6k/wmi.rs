//! Wireless Module Interface transport.
//!
//! Created when the host signals the firmware handoff. After the alive delay
//! the target reports itself with a READY event carrying the station address
//! and PHY capability. Events are framed as a little-endian WMI id followed by
//! the payload; the chip wraps them in an HTC header and queues them in the
//! control mailbox.

use ar6k_hw::ar6k::{mbox, wmi};
use tracing::{debug, info, warn};

/// Receives every WMI event frame the target emits
pub trait WmiBackend: Send {
    fn send(&mut self, frame: &[u8]);
}

/// Backend that drops every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl WmiBackend for NullBackend {
    fn send(&mut self, _frame: &[u8]) {}
}

/// Build an event frame: WMI id (LE16) followed by the payload
pub fn make_event(id: u16, payload: &[u8]) -> Vec<u8> {
    let payload = if payload.len() > wmi::MAX_PAYLOAD {
        warn!(
            "WMI: event {:#06X} payload truncated from {} bytes",
            id,
            payload.len()
        );
        &payload[..wmi::MAX_PAYLOAD]
    } else {
        payload
    };

    let mut frame = Vec::with_capacity(wmi::ID_LEN + payload.len());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Runtime WMI endpoint of the target
#[derive(Debug)]
pub struct WmiTransport {
    mac_address: [u8; 6],
    phy_capability: u8,
    alive: bool,
    unhandled_commands: u64,
}

impl WmiTransport {
    pub fn new(mac_address: [u8; 6], phy_capability: u8) -> Self {
        debug!("WMI transport created");
        Self {
            mac_address,
            phy_capability,
            alive: false,
            unhandled_commands: 0,
        }
    }

    /// Whether the READY event has been sent
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Host commands received and not acted on
    pub fn unhandled_commands(&self) -> u64 {
        self.unhandled_commands
    }

    /// Alive timer expiry. Sends the READY event once and returns the frame
    /// to queue for the host.
    pub fn on_alive(&mut self, backend: &mut dyn WmiBackend) -> Option<Vec<u8>> {
        if self.alive {
            return None;
        }
        self.alive = true;

        let mut ready = [0u8; 7];
        ready[..6].copy_from_slice(&self.mac_address);
        ready[6] = self.phy_capability;

        let frame = make_event(wmi::READY_EVENTID, &ready);
        info!(
            "WMI ready: mac={:02x?}, phy capability={}",
            self.mac_address, self.phy_capability
        );
        backend.send(&frame);
        Some(frame)
    }

    /// Decode a host message that ends at the end of the control window.
    ///
    /// Layout: HTC header (payload length, LE16) then the WMI command id.
    pub fn host_message(&mut self, window: &[u8], len: usize) {
        if len < mbox::HTC_HEADER_LEN + wmi::ID_LEN {
            warn!("WMI: short host message ({} bytes)", len);
            return;
        }
        let len = len.min(mbox::WINDOW_SIZE);
        let start = mbox::WINDOW_SIZE - len;

        let htc_len = u16::from_le_bytes([window[start], window[start + 1]]);
        let id = u16::from_le_bytes([window[start + 2], window[start + 3]]);

        self.unhandled_commands += 1;
        warn!(
            "WMI: unhandled command {:#06X} (HTC length {}, {} bytes written)",
            id, htc_len, len
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(Vec<Vec<u8>>);

    impl WmiBackend for Capture {
        fn send(&mut self, frame: &[u8]) {
            self.0.push(frame.to_vec());
        }
    }

    #[test]
    fn ready_event_fires_once() {
        let mac = [0x00, 0x03, 0x7f, 0x12, 0x34, 0x56];
        let mut transport = WmiTransport::new(mac, wmi::CAPABILITY_11AG);
        let mut backend = Capture::default();

        let frame = transport.on_alive(&mut backend);
        assert_eq!(
            frame.as_deref(),
            Some(&[0x01, 0x10, 0x00, 0x03, 0x7f, 0x12, 0x34, 0x56, 0x03][..])
        );
        assert_eq!(backend.0.len(), 1);
        assert!(transport.is_alive());

        assert_eq!(transport.on_alive(&mut backend), None);
        assert_eq!(backend.0.len(), 1);
    }

    #[test]
    fn event_payload_is_capped() {
        let frame = make_event(wmi::CMDERROR_EVENTID, &[0u8; 200]);
        assert_eq!(frame.len(), wmi::ID_LEN + wmi::MAX_PAYLOAD);
        assert_eq!(&frame[..2], &[0x05, 0x10]);
    }

    #[test]
    fn host_commands_are_counted() {
        let mut transport = WmiTransport::new([0; 6], wmi::CAPABILITY_11G);
        let mut window = vec![0u8; mbox::WINDOW_SIZE];
        window[mbox::WINDOW_SIZE - 6..].copy_from_slice(&[0x04, 0x00, 0x01, 0x00, 0xaa, 0xbb]);

        transport.host_message(&window, 6);
        assert_eq!(transport.unhandled_commands(), 1);

        transport.host_message(&window, 3);
        assert_eq!(transport.unhandled_commands(), 1);
    }
}
