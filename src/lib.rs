//! LoRaWAN end-device MAC engine in Rust
//!
//! This crate implements the device side of LoRaWAN 1.0: OTAA and ABP
//! activation, the Class A transmit/receive cycle with its two receive
//! windows, Class C continuous reception, frame counter bookkeeping and
//! channel hopping. The radio transceiver, the clock and (optionally) the
//! AES engine are supplied by the application through traits.
//!
//! # Features
//! - OTAA join (blocking or polled with `nb`) and ABP
//! - Class A and C device support
//! - Runtime selected regions (EU868, US915, AU915, AS923, IN865)
//! - Software AES-128/CMAC through [`crypto::DefaultCrypto`]
//! - `no_std`, no allocation
//! - `defmt` logging behind the `defmt` feature
//!
//! # Example
//! ```no_run
//! use lorawan_node::device::LoRaWANDevice;
//! use lorawan_node::lorawan::region::Region;
//! # use lorawan_node::radio::traits::{Radio, RadioMode, RxPacket, TxConfig};
//! # use lorawan_node::timer::Timer;
//! # struct MyRadio;
//! # impl Radio for MyRadio {
//! #     type Error = ();
//! #     fn init(&mut self) -> Result<(), ()> { Ok(()) }
//! #     fn set_mode(&mut self, _: RadioMode) -> Result<(), ()> { Ok(()) }
//! #     fn transmit(&mut self, _: &[u8], _: &TxConfig) -> Result<(), ()> { Ok(()) }
//! #     fn rx_done(&mut self) -> Result<bool, ()> { Ok(false) }
//! #     fn receive(&mut self, _: &mut [u8]) -> Result<RxPacket, ()> { Ok(RxPacket::default()) }
//! #     fn rssi_raw(&mut self) -> Result<u8, ()> { Ok(0) }
//! # }
//! # struct MyClock(u64);
//! # impl embedded_hal::blocking::delay::DelayMs<u32> for MyClock {
//! #     fn delay_ms(&mut self, ms: u32) { self.0 += ms as u64 }
//! # }
//! # impl Timer for MyClock { fn now_ms(&mut self) -> u64 { self.0 } }
//! # let (radio, clock) = (MyRadio, MyClock(0));
//!
//! let mut device = LoRaWANDevice::new(radio, clock, Region::eu868())
//!     .on_message(|payload: &[u8], confirmed: bool, port: u8| {
//!         let _ = (payload, confirmed, port);
//!     });
//! device.init(0x5EED).unwrap();
//!
//! device.set_dev_eui("70B3D57ED0001234").unwrap();
//! device.set_app_eui("70B3D57ED0000000").unwrap();
//! device.set_app_key("2B7E151628AED2A6ABF7158809CF4F3C").unwrap();
//!
//! if device.join().is_ok() {
//!     device.send_uplink(b"Hello, LoRaWAN!", false, 1).unwrap();
//!     loop {
//!         device.update().unwrap();
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

/// Device class implementations (A, C)
pub mod class;

/// Device and network configuration
pub mod config;

/// Cryptographic functions
pub mod crypto;

/// High-level device interface
pub mod device;

/// LoRaWAN protocol implementation
pub mod lorawan;

/// Radio hardware abstraction layer
pub mod radio;

/// Clock abstraction
pub mod timer;

pub use device::{DeviceError, LoRaWANDevice, MessageHandler};
