use super::region::{DataRate, Region};
use crate::radio::traits::{ModulationParams, Radio, RadioMode, RxConfig, RxPacket, TxConfig};

/// LoRaWAN always uses coding rate 4/5
const CODING_RATE_4_5: u8 = 5;

/// Default delay from end of transmission to RX1 opening
pub const DEFAULT_RX1_DELAY_MS: u32 = 5000;
/// Default RX1 listening time
pub const DEFAULT_RX1_WINDOW_MS: u32 = 1000;
/// Default RX2 listening time
pub const DEFAULT_RX2_WINDOW_MS: u32 = 1000;
/// Default time budget for a join accept
pub const DEFAULT_JOIN_TIMEOUT_MS: u32 = 6000;

/// Receive window timing parameters, in milliseconds from end of transmission.
///
/// Every setter keeps `rx2_delay >= rx1_delay + rx1_window`, whatever the
/// call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxTiming {
    rx1_delay: u32,
    rx1_window: u32,
    rx2_delay: u32,
    rx2_window: u32,
}

impl Default for RxTiming {
    fn default() -> Self {
        Self {
            rx1_delay: DEFAULT_RX1_DELAY_MS,
            rx1_window: DEFAULT_RX1_WINDOW_MS,
            rx2_delay: DEFAULT_RX1_DELAY_MS + DEFAULT_RX1_WINDOW_MS,
            rx2_window: DEFAULT_RX2_WINDOW_MS,
        }
    }
}

impl RxTiming {
    /// RX1 delay
    pub fn rx1_delay(&self) -> u32 {
        self.rx1_delay
    }

    /// RX1 window duration
    pub fn rx1_window(&self) -> u32 {
        self.rx1_window
    }

    /// RX2 delay
    pub fn rx2_delay(&self) -> u32 {
        self.rx2_delay
    }

    /// RX2 window duration
    pub fn rx2_window(&self) -> u32 {
        self.rx2_window
    }

    /// Set RX1 delay, pushing RX2 back if the windows would overlap
    pub fn set_rx1_delay(&mut self, ms: u32) {
        self.rx1_delay = ms;
        self.rx2_delay = self.rx2_delay.max(self.rx1_end());
    }

    /// Set RX1 window, pushing RX2 back if the windows would overlap
    pub fn set_rx1_window(&mut self, ms: u32) {
        self.rx1_window = ms;
        self.rx2_delay = self.rx2_delay.max(self.rx1_end());
    }

    /// Set RX2 delay; values before the end of RX1 are raised to it
    pub fn set_rx2_delay(&mut self, ms: u32) {
        self.rx2_delay = ms.max(self.rx1_end());
    }

    /// Set RX2 window
    pub fn set_rx2_window(&mut self, ms: u32) {
        self.rx2_window = ms;
    }

    fn rx1_end(&self) -> u32 {
        self.rx1_delay.saturating_add(self.rx1_window)
    }
}

/// Channel, datarate and power used for the next transmission and its RX1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioSettings {
    /// Uplink channel index
    pub tx_channel: u8,
    /// RX1 channel index
    pub rx_channel: u8,
    /// Uplink datarate index
    pub tx_data_rate: u8,
    /// RX1 datarate index
    pub rx_data_rate: u8,
    /// Transmit power in dBm
    pub tx_power: i8,
    /// Send the next uplink as confirmed
    pub confirm: bool,
    /// FPort of the next uplink
    pub port: u8,
}

impl RadioSettings {
    /// Defaults after init for a region
    pub fn for_region(region: &Region) -> Self {
        let tx_data_rate = region.default_data_rate();
        Self {
            tx_channel: 0,
            rx_channel: 0,
            tx_data_rate,
            rx_data_rate: region.rx1_data_rate(tx_data_rate),
            tx_power: region.default_tx_power(),
            confirm: false,
            port: 1,
        }
    }
}

fn modulation(data_rate: DataRate) -> ModulationParams {
    ModulationParams {
        spreading_factor: data_rate.spreading_factor(),
        bandwidth: data_rate.bandwidth(),
        coding_rate: CODING_RATE_4_5,
    }
}

/// Transmit parameters for the current settings
pub fn tx_config(region: &Region, settings: &RadioSettings) -> Option<TxConfig> {
    Some(TxConfig {
        power: settings.tx_power,
        frequency: region.uplink_frequency(settings.tx_channel)?,
        modulation: modulation(region.data_rate(settings.tx_data_rate)?),
    })
}

/// RX1 parameters for the current settings
pub fn rx1_config(region: &Region, settings: &RadioSettings) -> Option<RxConfig> {
    Some(RxConfig {
        frequency: region.rx1_frequency(settings.rx_channel)?,
        modulation: modulation(region.data_rate(settings.rx_data_rate)?),
        invert_iq: true,
    })
}

/// RX2 (and Class C) parameters of a region
pub fn rx2_config(region: &Region) -> Option<RxConfig> {
    let (frequency, data_rate) = region.rx2();
    Some(RxConfig {
        frequency,
        modulation: modulation(region.data_rate(data_rate)?),
        invert_iq: true,
    })
}

/// PHY layer
pub struct PhyLayer<R: Radio> {
    /// Radio driver
    pub radio: R,
}

impl<R: Radio> PhyLayer<R> {
    /// Create new PHY layer
    pub fn new(radio: R) -> Self {
        Self { radio }
    }

    /// Initialize radio
    pub fn init(&mut self) -> Result<(), R::Error> {
        self.radio.init()
    }

    /// Transmit data
    pub fn transmit(&mut self, config: &TxConfig, data: &[u8]) -> Result<(), R::Error> {
        self.radio.transmit(data, config)
    }

    /// Start receiving with the given parameters
    pub fn listen(&mut self, config: RxConfig) -> Result<(), R::Error> {
        self.radio.set_mode(RadioMode::Receive(config))
    }

    /// Put the radio in standby
    pub fn standby(&mut self) -> Result<(), R::Error> {
        self.radio.set_mode(RadioMode::Standby)
    }

    /// Put the radio to sleep
    pub fn sleep(&mut self) -> Result<(), R::Error> {
        self.radio.set_mode(RadioMode::Sleep)
    }

    /// Whether a frame is waiting
    pub fn rx_done(&mut self) -> Result<bool, R::Error> {
        self.radio.rx_done()
    }

    /// Receive data
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<RxPacket, R::Error> {
        self.radio.receive(buffer)
    }

    /// Get raw RSSI
    pub fn rssi_raw(&mut self) -> Result<u8, R::Error> {
        self.radio.rssi_raw()
    }
}
