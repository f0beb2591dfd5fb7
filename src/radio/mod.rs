//! Radio hardware abstraction layer
//!
//! The transceiver driver is supplied by the application through [`Radio`].

pub mod dio;
pub mod traits;

pub use dio::{Dio0Error, Dio0Radio};
pub use traits::{ModulationParams, Radio, RadioMode, RxConfig, RxPacket, TxConfig};
