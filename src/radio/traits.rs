/// Radio modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModulationParams {
    /// Spreading factor (SF7-SF12)
    pub spreading_factor: u8,
    /// Bandwidth in Hz
    pub bandwidth: u32,
    /// Coding rate denominator (5 to 8 for 4/5 to 4/8)
    pub coding_rate: u8,
}

/// Radio transmission parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxConfig {
    /// Transmission power in dBm
    pub power: i8,
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
}

/// Radio receive parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxConfig {
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
    /// Receive with inverted IQ, as used by LoRaWAN downlinks
    pub invert_iq: bool,
}

/// Operating mode requested from the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioMode {
    /// Lowest power, configuration may be lost
    Sleep,
    /// Oscillator running, ready to transmit or receive
    Standby,
    /// Continuous reception with the given parameters
    Receive(RxConfig),
}

/// Metadata of a packet read from the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxPacket {
    /// Number of bytes written into the caller's buffer
    pub len: usize,
    /// Packet RSSI in dBm
    pub rssi: i16,
    /// Packet SNR in dB
    pub snr: i8,
}

/// Generic radio interface trait
///
/// All calls are blocking. `transmit` returns once the packet is on air and
/// leaves the radio in standby.
pub trait Radio {
    /// Error type for radio operations
    type Error;

    /// Initialize the radio; fails if the transceiver does not respond
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Switch operating mode
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error>;

    /// Transmit data
    fn transmit(&mut self, buffer: &[u8], config: &TxConfig) -> Result<(), Self::Error>;

    /// Whether a received frame is waiting to be read
    fn rx_done(&mut self) -> Result<bool, Self::Error>;

    /// Read the pending frame into the provided buffer
    fn receive(&mut self, buffer: &mut [u8]) -> Result<RxPacket, Self::Error>;

    /// Raw RSSI register value of the current channel
    fn rssi_raw(&mut self) -> Result<u8, Self::Error>;
}
