//! High-level LoRaWAN device interface
//!
//! This module provides the main device interface for LoRaWAN communication.
//! It handles device configuration, activation, and message handling.
//!
//! The device is driven by the application: configuration calls and
//! [`send_uplink`](LoRaWANDevice::send_uplink) only record state, and
//! [`update`](LoRaWANDevice::update) performs at most one transmit/receive
//! cycle per call. Pending payloads are single slot; a second
//! `send_uplink` before the next `update` replaces the first.

use heapless::Vec;

use crate::{
    class::{class_a, class_c, ClassController, Command, RxWindow},
    config::device::{
        AESKey, ConfigError, DevAddr, DeviceClass, DeviceConfig, Identity, JoinMaterial,
        SessionState, EUI64,
    },
    crypto::{Crypto, DefaultCrypto},
    lorawan::{
        channel::{ChannelMode, ChannelSelector},
        mac::{MacError, MacLayer, MessageMetadata, PayloadBuffer, Uplink, MAX_PAYLOAD_SIZE},
        phy::{RxTiming, DEFAULT_JOIN_TIMEOUT_MS},
        region::Region,
    },
    radio::traits::Radio,
    timer::{Timer, POLL_INTERVAL_MS},
};

/// Offset between the raw RSSI register and dBm
const RSSI_OFFSET: i16 = 157;

/// Highest application port; larger values and port 0 fall back to [`DEFAULT_PORT`]
const MAX_APP_PORT: u8 = 223;

/// Port used when the application passes an invalid one
const DEFAULT_PORT: u8 = 1;

/// LoRaWAN device error type
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError<E> {
    /// MAC layer error
    Mac(MacError<E>),
    /// Radio did not come up
    InitFailure(E),
    /// No valid join accept within the wait budget
    JoinTimeout,
    /// Payload exceeds [`MAX_PAYLOAD_SIZE`]
    PayloadTooLarge,
    /// The uplink counter has run out; reset counters or keys first
    FrameCounterExhausted,
    /// Invalid state for operation
    InvalidState,
}

impl<E> From<MacError<E>> for DeviceError<E> {
    fn from(error: MacError<E>) -> Self {
        DeviceError::Mac(error)
    }
}

/// Progress of the OTAA join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinState {
    /// No join attempted since init
    Idle,
    /// Join request transmitted, waiting for the accept
    Sent,
    /// Session established from a join accept
    Accepted,
    /// Last attempt ran out of time
    TimedOut,
}

/// Receiver of decoded downlinks.
///
/// Called synchronously from [`LoRaWANDevice::update`]; implementations must
/// return quickly and must not call back into the device.
pub trait MessageHandler {
    /// A downlink with a non-empty payload was accepted
    fn on_message(&mut self, payload: &[u8], confirmed: bool, port: u8);
}

impl<F> MessageHandler for F
where
    F: FnMut(&[u8], bool, u8),
{
    fn on_message(&mut self, payload: &[u8], confirmed: bool, port: u8) {
        self(payload, confirmed, port)
    }
}

/// Handler that discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHandler;

impl MessageHandler for NoHandler {
    fn on_message(&mut self, _payload: &[u8], _confirmed: bool, _port: u8) {}
}

/// LoRaWAN device implementation
pub struct LoRaWANDevice<R, T, C = DefaultCrypto, H = NoHandler>
where
    R: Radio,
    T: Timer,
    C: Crypto,
    H: MessageHandler,
{
    mac: MacLayer<R, C>,
    timer: T,
    channels: ChannelSelector,
    classes: ClassController,
    command: Command,
    join_state: JoinState,
    join_deadline: u64,
    tx_buffer: PayloadBuffer,
    rx_buffer: PayloadBuffer,
    rx_window: Option<RxWindow>,
    new_rx: bool,
    new_ack: bool,
    handler: H,
}

impl<R: Radio, T: Timer> LoRaWANDevice<R, T> {
    /// Create a device using the software crypto implementation
    pub fn new(radio: R, timer: T, region: Region) -> Self {
        Self::with_crypto(radio, timer, region, DefaultCrypto)
    }
}

impl<R: Radio, T: Timer, C: Crypto> LoRaWANDevice<R, T, C> {
    /// Create a device with a custom crypto implementation
    pub fn with_crypto(radio: R, timer: T, region: Region, crypto: C) -> Self {
        Self {
            mac: MacLayer::new(radio, crypto, region),
            timer,
            channels: ChannelSelector::new(0),
            classes: ClassController::new(),
            command: Command::None,
            join_state: JoinState::Idle,
            join_deadline: 0,
            tx_buffer: Vec::new(),
            rx_buffer: Vec::new(),
            rx_window: None,
            new_rx: false,
            new_ack: false,
            handler: NoHandler,
        }
    }
}

impl<R, T, C, H> LoRaWANDevice<R, T, C, H>
where
    R: Radio,
    T: Timer,
    C: Crypto,
    H: MessageHandler,
{
    /// Register the downlink callback, replacing any previous one
    pub fn on_message<H2: MessageHandler>(self, handler: H2) -> LoRaWANDevice<R, T, C, H2> {
        LoRaWANDevice {
            mac: self.mac,
            timer: self.timer,
            channels: self.channels,
            classes: self.classes,
            command: self.command,
            join_state: self.join_state,
            join_deadline: self.join_deadline,
            tx_buffer: self.tx_buffer,
            rx_buffer: self.rx_buffer,
            rx_window: self.rx_window,
            new_rx: self.new_rx,
            new_ack: self.new_ack,
            handler,
        }
    }

    /// Reset all state to region defaults and bring up the radio.
    ///
    /// `seed` drives channel hopping; the same seed repeats the same channel
    /// sequence.
    pub fn init(&mut self, seed: u64) -> Result<(), DeviceError<R::Error>> {
        self.channels.reseed(seed);
        self.classes = ClassController::new();
        self.command = Command::None;
        self.join_state = JoinState::Idle;
        self.tx_buffer.clear();
        self.rx_buffer.clear();
        self.rx_window = None;
        self.new_rx = false;
        self.new_ack = false;

        self.mac.init().map_err(DeviceError::InitFailure)?;
        info!("radio initialized");
        Ok(())
    }

    fn identity_changed(&mut self) {
        self.mac.session.reset_counters();
        self.command = Command::None;
    }

    /// Set the device EUI from 16 hex digits
    pub fn set_dev_eui(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.set_dev_eui_bytes(EUI64::from_hex(hex)?);
        Ok(())
    }

    /// Set the application EUI from 16 hex digits
    pub fn set_app_eui(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.set_app_eui_bytes(EUI64::from_hex(hex)?);
        Ok(())
    }

    /// Set the application key from 32 hex digits
    pub fn set_app_key(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.set_app_key_bytes(AESKey::from_hex(hex)?);
        Ok(())
    }

    /// Set the network session key from 32 hex digits
    pub fn set_nwk_skey(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.set_nwk_skey_bytes(AESKey::from_hex(hex)?);
        Ok(())
    }

    /// Set the application session key from 32 hex digits
    pub fn set_app_skey(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.set_app_skey_bytes(AESKey::from_hex(hex)?);
        Ok(())
    }

    /// Set the device address from 8 hex digits
    pub fn set_dev_addr(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.set_dev_addr_bytes(DevAddr::from_hex(hex)?);
        Ok(())
    }

    /// Set the device EUI
    pub fn set_dev_eui_bytes(&mut self, eui: EUI64) {
        self.mac.identity.dev_eui = eui;
        self.identity_changed();
    }

    /// Set the application EUI
    pub fn set_app_eui_bytes(&mut self, eui: EUI64) {
        self.mac.identity.app_eui = eui;
        self.identity_changed();
    }

    /// Set the application key
    pub fn set_app_key_bytes(&mut self, key: AESKey) {
        self.mac.identity.app_key = key;
        self.identity_changed();
    }

    /// Set the network session key (ABP)
    pub fn set_nwk_skey_bytes(&mut self, key: AESKey) {
        self.mac.session.nwk_skey = key;
        self.mac.mark_abp();
        self.identity_changed();
    }

    /// Set the application session key (ABP)
    pub fn set_app_skey_bytes(&mut self, key: AESKey) {
        self.mac.session.app_skey = key;
        self.mac.mark_abp();
        self.identity_changed();
    }

    /// Set the device address (ABP)
    pub fn set_dev_addr_bytes(&mut self, dev_addr: DevAddr) {
        self.mac.session.dev_addr = dev_addr;
        self.mac.mark_abp();
        self.identity_changed();
    }

    /// Apply a complete configuration; ABP if address and both session keys are given
    pub fn configure(&mut self, config: &DeviceConfig) {
        self.mac.identity = config.identity();
        if let (Some(dev_addr), Some(nwk_skey), Some(app_skey)) =
            (config.dev_addr, config.nwk_skey, config.app_skey)
        {
            self.mac.session = SessionState::new_abp(dev_addr, nwk_skey, app_skey);
        }
        self.identity_changed();
    }

    /// Transmit power in dBm
    pub fn set_tx_power(&mut self, dbm: i8) {
        self.mac.settings.tx_power = dbm;
    }

    /// Uplink datarate index; values above the region maximum are ignored
    pub fn set_data_rate(&mut self, data_rate: u8) {
        let mac = &mut self.mac;
        self.channels
            .set_data_rate(&mac.region, &mut mac.settings, data_rate);
    }

    /// Current uplink datarate index
    pub fn data_rate(&self) -> u8 {
        self.mac.settings.tx_data_rate
    }

    /// Fix the channel, or pass [`MULTI`](crate::lorawan::channel::MULTI) to hop.
    /// Channels outside the region plan are ignored.
    pub fn set_channel(&mut self, channel: u8) {
        let mac = &mut self.mac;
        self.channels
            .set_channel(&mac.region, &mut mac.settings, channel);
    }

    /// Channel used by the last or next transmission
    pub fn channel(&self) -> u8 {
        self.mac.settings.tx_channel
    }

    /// Fixed channel or hopping
    pub fn channel_mode(&self) -> ChannelMode {
        self.channels.mode()
    }

    /// RX1 delay in milliseconds after the end of transmission
    pub fn set_rx1_delay(&mut self, ms: u32) {
        self.mac.timing.set_rx1_delay(ms);
    }

    /// RX1 listening time in milliseconds
    pub fn set_rx1_window(&mut self, ms: u32) {
        self.mac.timing.set_rx1_window(ms);
    }

    /// RX2 delay in milliseconds; never earlier than the end of RX1
    pub fn set_rx2_delay(&mut self, ms: u32) {
        self.mac.timing.set_rx2_delay(ms);
    }

    /// RX2 listening time in milliseconds
    pub fn set_rx2_window(&mut self, ms: u32) {
        self.mac.timing.set_rx2_window(ms);
    }

    /// Receive window timing
    pub fn rx_timing(&self) -> RxTiming {
        self.mac.timing
    }

    /// Request a device class; takes effect on the next [`update`](Self::update)
    pub fn set_device_class(&mut self, class: DeviceClass) {
        self.classes.set_desired(class);
    }

    /// Class requested by the application
    pub fn device_class(&self) -> DeviceClass {
        self.classes.desired()
    }

    /// Class the radio is currently operated in
    pub fn running_class(&self) -> DeviceClass {
        self.classes.running()
    }

    /// Transmit a join request and start listening for the accept.
    ///
    /// Completion is reported by [`poll_join`](Self::poll_join).
    pub fn start_join(&mut self, timeout_ms: u32) -> Result<(), DeviceError<R::Error>> {
        self.classes.force_a();
        self.mac.phy.standby().map_err(MacError::Radio)?;

        let mac = &mut self.mac;
        self.channels.prepare(&mac.region, &mut mac.settings);
        let rx = mac.rx1_config()?;

        mac.send_join_request()?;
        self.join_deadline = self.timer.now_ms() + timeout_ms as u64;
        self.join_state = JoinState::Sent;
        self.mac.phy.listen(rx).map_err(MacError::Radio)?;
        Ok(())
    }

    /// Check for the join accept without blocking
    pub fn poll_join(&mut self) -> nb::Result<(), DeviceError<R::Error>> {
        if self.join_state != JoinState::Sent {
            return Err(nb::Error::Other(DeviceError::InvalidState));
        }

        let rx_done = self
            .mac
            .phy
            .rx_done()
            .map_err(|e| nb::Error::Other(DeviceError::Mac(MacError::Radio(e))))?;
        if rx_done {
            let accepted = self
                .mac
                .accept_join()
                .map_err(|e| nb::Error::Other(DeviceError::Mac(e)))?;
            if accepted.is_some() {
                self.join_state = JoinState::Accepted;
                self.command = Command::None;
                self.mac
                    .phy
                    .standby()
                    .map_err(|e| nb::Error::Other(DeviceError::Mac(MacError::Radio(e))))?;
                info!("join accepted");
                return Ok(());
            }
        }

        if self.timer.now_ms() >= self.join_deadline {
            self.join_state = JoinState::TimedOut;
            self.mac
                .phy
                .standby()
                .map_err(|e| nb::Error::Other(DeviceError::Mac(MacError::Radio(e))))?;
            warn!("join timed out");
            return Err(nb::Error::Other(DeviceError::JoinTimeout));
        }
        Err(nb::Error::WouldBlock)
    }

    /// Join with the default wait budget, blocking until done
    pub fn join(&mut self) -> Result<(), DeviceError<R::Error>> {
        self.join_with_timeout(DEFAULT_JOIN_TIMEOUT_MS)
    }

    /// Join, blocking for at most `timeout_ms` after the request is sent
    pub fn join_with_timeout(&mut self, timeout_ms: u32) -> Result<(), DeviceError<R::Error>> {
        self.start_join(timeout_ms)?;
        loop {
            match self.poll_join() {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => self.timer.delay_ms(POLL_INTERVAL_MS),
            }
        }
    }

    /// Progress of the last join
    pub fn join_state(&self) -> JoinState {
        self.join_state
    }

    /// Put the radio to sleep
    pub fn sleep(&mut self) -> Result<(), DeviceError<R::Error>> {
        self.mac.phy.sleep().map_err(MacError::Radio)?;
        Ok(())
    }

    /// Wake the radio, resuming continuous receive when running class C
    pub fn wake_up(&mut self) -> Result<(), DeviceError<R::Error>> {
        self.mac.phy.standby().map_err(MacError::Radio)?;
        if self.classes.running() == DeviceClass::C {
            class_c::enter(&mut self.mac)?;
        }
        Ok(())
    }

    /// Queue an uplink for the next [`update`](Self::update).
    ///
    /// Port 0 and ports above 223 are replaced with port 1.
    pub fn send_uplink(
        &mut self,
        payload: &[u8],
        confirm: bool,
        port: u8,
    ) -> Result<(), DeviceError<R::Error>> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(DeviceError::PayloadTooLarge);
        }
        if self.mac.session.fcnt_up_exhausted {
            return Err(DeviceError::FrameCounterExhausted);
        }
        self.tx_buffer.clear();
        if self.tx_buffer.extend_from_slice(payload).is_err() {
            return Err(DeviceError::PayloadTooLarge);
        }
        self.mac.settings.confirm = confirm;
        self.mac.settings.port = if port == 0 || port > MAX_APP_PORT {
            DEFAULT_PORT
        } else {
            port
        };
        self.command = Command::Uplink;
        self.classes.force_a();
        Ok(())
    }

    /// Queue an empty uplink with the ACK bit set
    pub fn send_ack(&mut self) -> Result<(), DeviceError<R::Error>> {
        if self.mac.session.fcnt_up_exhausted {
            return Err(DeviceError::FrameCounterExhausted);
        }
        self.tx_buffer.clear();
        self.command = Command::Ack;
        self.classes.force_a();
        Ok(())
    }

    /// Copy the last received payload into `buffer`, once.
    ///
    /// Returns the number of bytes copied, 0 if nothing new arrived.
    pub fn read_data(&mut self, buffer: &mut [u8]) -> usize {
        if !self.new_rx {
            return 0;
        }
        self.new_rx = false;
        let len = self.rx_buffer.len().min(buffer.len());
        buffer[..len].copy_from_slice(&self.rx_buffer[..len]);
        len
    }

    /// Whether an acknowledgement arrived since the last call
    pub fn read_ack(&mut self) -> bool {
        core::mem::take(&mut self.new_ack)
    }

    /// Channel RSSI in dBm
    pub fn rssi(&mut self) -> Result<i16, DeviceError<R::Error>> {
        let raw = self.mac.phy.rssi_raw().map_err(MacError::Radio)?;
        Ok(raw as i16 - RSSI_OFFSET)
    }

    /// Counter the next uplink will carry
    pub fn frame_counter_tx(&self) -> u16 {
        self.mac.session.fcnt_up
    }

    /// Restore the uplink counter
    pub fn set_frame_counter_tx(&mut self, fcnt: u16) {
        self.mac.session.set_fcnt_up(fcnt);
    }

    /// Last accepted downlink counter
    pub fn frame_counter_rx(&self) -> u16 {
        self.mac.session.fcnt_down
    }

    /// Restore the downlink counter; later downlinks must carry a higher one
    pub fn set_frame_counter_rx(&mut self, fcnt: u16) {
        self.mac.session.set_fcnt_down(fcnt);
    }

    /// Current device address
    pub fn dev_addr(&self) -> DevAddr {
        self.mac.session.dev_addr
    }

    /// Session state
    pub fn session(&self) -> &SessionState {
        &self.mac.session
    }

    /// Identity used for joining
    pub fn identity(&self) -> &Identity {
        &self.mac.identity
    }

    /// Nonces of the last join
    pub fn join_material(&self) -> &JoinMaterial {
        &self.mac.join
    }

    /// DevNonce for the next join request. Uniqueness is up to the caller.
    pub fn set_dev_nonce(&mut self, dev_nonce: u16) {
        self.mac.join.dev_nonce = dev_nonce;
    }

    /// DevNonce of the next join request
    pub fn dev_nonce(&self) -> u16 {
        self.mac.join.dev_nonce
    }

    /// Header of the last accepted downlink
    pub fn last_rx_metadata(&self) -> Option<MessageMetadata> {
        self.mac.last_rx
    }

    /// Receive window that delivered a downlink in the last Class A cycle
    pub fn last_rx_window(&self) -> Option<RxWindow> {
        self.rx_window
    }

    /// Region in use
    pub fn region(&self) -> &Region {
        &self.mac.region
    }

    /// Radio driver
    pub fn radio(&self) -> &R {
        &self.mac.phy.radio
    }

    /// Radio driver, mutable
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.mac.phy.radio
    }

    /// Clock
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Drive the engine; call at least as often as the shortest window.
    ///
    /// Runs the Class A cycle for a pending command, polls continuous
    /// reception in class C, then applies any pending class change.
    pub fn update(&mut self) -> Result<(), DeviceError<R::Error>> {
        if self.command != Command::None && self.classes.running() == DeviceClass::A {
            self.run_command()?;
        }

        if self.classes.running() == DeviceClass::C {
            if let Some(downlink) = class_c::poll(&mut self.mac)? {
                if !downlink.payload.is_empty() {
                    debug!("class C downlink dispatched");
                    self.handler.on_message(
                        &downlink.payload,
                        downlink.is_confirmed(),
                        downlink.f_port.unwrap_or(0),
                    );
                }
                self.rx_buffer.clear();
            }
        }

        self.command = Command::None;

        match self.classes.pending_transition() {
            Some(DeviceClass::C) => {
                class_c::enter(&mut self.mac)?;
                self.classes.set_running(DeviceClass::C);
                info!("switched to class C");
            }
            Some(DeviceClass::A) => {
                class_c::leave(&mut self.mac)?;
                self.classes.set_running(DeviceClass::A);
                info!("switched to class A");
            }
            None => {}
        }
        Ok(())
    }

    fn run_command(&mut self) -> Result<(), DeviceError<R::Error>> {
        let command = core::mem::replace(&mut self.command, Command::None);

        let mac = &mut self.mac;
        self.channels.prepare(&mac.region, &mut mac.settings);
        let uplink = match command {
            Command::Ack => Uplink {
                confirmed: false,
                ack: true,
                f_port: None,
                payload: &[],
            },
            _ => Uplink {
                confirmed: mac.settings.confirm,
                ack: false,
                f_port: Some(mac.settings.port),
                payload: &self.tx_buffer,
            },
        };

        self.rx_window = None;
        let downlink = match class_a::run_cycle(mac, &mut self.timer, &uplink)? {
            Some((window, downlink)) => {
                self.rx_window = Some(window);
                downlink
            }
            None => return Ok(()),
        };

        if downlink.f_ctrl.ack {
            self.new_ack = true;
            info!("ack received");
        }
        if !downlink.payload.is_empty() {
            self.rx_buffer = downlink.payload.clone();
            self.new_rx = true;
            self.handler.on_message(
                &self.rx_buffer,
                downlink.is_confirmed(),
                downlink.f_port.unwrap_or(0),
            );
        }
        Ok(())
    }
}
