//! Bootloader Messaging Interface.
//!
//! Before the firmware is running, mailbox 0 carries BMI commands: a
//! little-endian command word followed by its arguments, written so that the
//! message ends at the last byte of the window. Responses are placed the same
//! way and their length is published in the mailbox's available-bytes
//! counter.

use ar6k_hw::ar6k::{bmi, mbox};
use tracing::{debug, info, warn};

/// Layout of the get-target-id response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetInfoForm {
    /// Version word only (older host drivers)
    #[default]
    Legacy,
    /// Sentinel, byte count, version and target type
    Extended,
}

/// BMI state of the target
#[derive(Debug, Default)]
pub struct BmiSession {
    done: bool,
    target_info: TargetInfoForm,
}

impl BmiSession {
    pub fn new(target_info: TargetInfoForm) -> Self {
        Self {
            done: false,
            target_info,
        }
    }

    pub fn reset(&mut self) {
        self.done = false;
    }

    /// Whether the host has finished with BMI and handed over to the firmware
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Execute the `len`-byte command at the end of `window`.
    ///
    /// Returns the response length for the available-bytes counter, or `None`
    /// if the command was ignored.
    pub fn handle(&mut self, window: &mut [u8], len: usize) -> Option<u8> {
        if len < 4 {
            warn!("BMI: short command ({} bytes)", len);
            return None;
        }
        let len = len.min(mbox::WINDOW_SIZE);
        let cmd = read_le32(window, mbox::WINDOW_SIZE - len);

        match cmd {
            bmi::NO_COMMAND => Some(0),
            bmi::DONE => {
                self.done = true;
                info!("BMI done, target firmware running");
                Some(0)
            }
            bmi::GET_TARGET_ID => {
                let rlen = match self.target_info {
                    TargetInfoForm::Legacy => {
                        let at = mbox::WINDOW_SIZE - bmi::TARGET_ID_LEGACY_LEN;
                        write_le32(window, at, bmi::TARGET_VERSION_ID);
                        bmi::TARGET_ID_LEGACY_LEN
                    }
                    TargetInfoForm::Extended => {
                        let at = mbox::WINDOW_SIZE - bmi::TARGET_ID_EXTENDED_LEN;
                        let words = [
                            bmi::TARGET_VERSION_SENTINEL,
                            bmi::TARGET_INFO_BYTE_COUNT,
                            bmi::TARGET_VERSION_ID,
                            bmi::TARGET_TYPE_AR6001,
                        ];
                        for (i, word) in words.into_iter().enumerate() {
                            write_le32(window, at + 4 * i, word);
                        }
                        bmi::TARGET_ID_EXTENDED_LEN
                    }
                };
                debug!("BMI get target id ({:?}, {} bytes)", self.target_info, rlen);
                Some(rlen as u8)
            }
            _ => {
                match command_name(cmd) {
                    Some(name) => warn!("BMI: unsupported command {}", name),
                    None => warn!("BMI: bad command ({})", cmd),
                }
                None
            }
        }
    }
}

fn command_name(cmd: u32) -> Option<&'static str> {
    Some(match cmd {
        bmi::READ_MEMORY => "READ_MEMORY",
        bmi::WRITE_MEMORY => "WRITE_MEMORY",
        bmi::EXECUTE => "EXECUTE",
        bmi::SET_APP_START => "SET_APP_START",
        bmi::READ_SOC_REGISTER => "READ_SOC_REGISTER",
        bmi::WRITE_SOC_REGISTER => "WRITE_SOC_REGISTER",
        bmi::ROMPATCH_INSTALL => "ROMPATCH_INSTALL",
        bmi::ROMPATCH_UNINSTALL => "ROMPATCH_UNINSTALL",
        bmi::ROMPATCH_ACTIVATE => "ROMPATCH_ACTIVATE",
        bmi::ROMPATCH_DEACTIVATE => "ROMPATCH_DEACTIVATE",
        _ => return None,
    })
}

fn read_le32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn write_le32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(cmd: &[u8]) -> Vec<u8> {
        let mut window = vec![0u8; mbox::WINDOW_SIZE];
        let start = mbox::WINDOW_SIZE - cmd.len();
        window[start..].copy_from_slice(cmd);
        window
    }

    #[test]
    fn done_ends_the_session() {
        let mut session = BmiSession::default();
        let mut window = window_with(&[1, 0, 0, 0]);
        assert_eq!(session.handle(&mut window, 4), Some(0));
        assert!(session.is_done());

        session.reset();
        assert!(!session.is_done());
    }

    #[test]
    fn command_word_leads_the_message() {
        let mut session = BmiSession::default();
        // DONE followed by four argument bytes
        let mut window = window_with(&[1, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(session.handle(&mut window, 8), Some(0));
        assert!(session.is_done());
    }

    #[test]
    fn legacy_target_id() {
        let mut session = BmiSession::new(TargetInfoForm::Legacy);
        let mut window = window_with(&[8, 0, 0, 0]);
        assert_eq!(session.handle(&mut window, 4), Some(4));
        assert_eq!(&window[0x7fc..], &[0x44, 0x00, 0x00, 0x11]);
    }

    #[test]
    fn extended_target_id() {
        let mut session = BmiSession::new(TargetInfoForm::Extended);
        let mut window = window_with(&[8, 0, 0, 0]);
        assert_eq!(session.handle(&mut window, 4), Some(16));
        assert_eq!(
            &window[0x7f0..],
            &[
                0xff, 0xff, 0xff, 0xff, 0x0c, 0x00, 0x00, 0x00, 0x44, 0x00, 0x00, 0x11, 0x01,
                0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn short_and_unsupported_commands_are_ignored() {
        let mut session = BmiSession::default();
        let mut window = window_with(&[1, 0]);
        assert_eq!(session.handle(&mut window, 2), None);
        assert!(!session.is_done());

        let mut window = window_with(&[4, 0, 0, 0]);
        assert_eq!(session.handle(&mut window, 4), None);

        let mut window = window_with(&[0x42, 0, 0, 0]);
        assert_eq!(session.handle(&mut window, 4), None);
        assert!(!session.is_done());
    }

    #[test]
    fn oversized_count_is_clamped_to_the_window() {
        let mut session = BmiSession::default();
        let mut window = vec![0u8; mbox::WINDOW_SIZE];
        window[0] = 1;
        assert_eq!(session.handle(&mut window, 5000), Some(0));
        assert!(session.is_done());
    }
}
