//! Device and network configuration
//!
//! This module contains the identity and session store of the device:
//! - Identity (DevEUI, AppEUI, AppKey)
//! - Join material (DevNonce, AppNonce, NetID)
//! - Session state (DevAddr, session keys, frame counters)

/// Device configuration and session state
pub mod device;

pub use device::{
    AESKey, ActivationState, ConfigError, DevAddr, DeviceClass, DeviceConfig, Identity,
    JoinMaterial, SessionState, EUI64,
};
