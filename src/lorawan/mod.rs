//! LoRaWAN protocol implementation
//!
//! This module contains the core LoRaWAN protocol implementation, including:
//! - Frame codec and MAC layer state
//! - PHY layer operations and receive window timing
//! - Regional parameters
//! - Channel selection

/// Channel hopping and datarate policy
pub mod channel;

/// MAC layer implementation
pub mod mac;

/// PHY layer operations
pub mod phy;

/// Regional parameters and configurations
pub mod region;

pub use channel::{ChannelMode, ChannelSelector, MULTI};
pub use mac::{Downlink, MType, MacError, MacLayer, MessageMetadata, MAX_PAYLOAD_SIZE};
pub use phy::{PhyLayer, RadioSettings, RxTiming};
pub use region::{DataRate, Region, RegionId};
