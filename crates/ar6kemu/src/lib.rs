pub mod ar6k;
pub mod clock;
pub mod config;
pub mod sdio;

// Re-export commonly used types
pub use ar6k::wmi::{NullBackend, WmiBackend};
pub use ar6k::{Ar6k, SharedAr6k};
pub use clock::{TimerEvent, VirtualClock};
pub use config::{Ar6kConfig, BusMode, ConfigError};
pub use sdio::{CardState, CardStatus, Response, ResponseKind};
