//! Regional parameters
//!
//! A [`Region`] is plain data selected at runtime. The channel plans follow the
//! common network-server defaults for each band (sub-band 2 for the 915 MHz
//! plans).

/// Highest downlink datarate index defined by any supported region
const MAX_RX_DATA_RATE: u8 = 13;

/// Data rate identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum DataRate {
    SF12BW125,
    SF11BW125,
    SF10BW125,
    SF9BW125,
    SF8BW125,
    SF7BW125,
    SF7BW250,
    SF12BW500,
    SF11BW500,
    SF10BW500,
    SF9BW500,
    SF8BW500,
    SF7BW500,
}

impl DataRate {
    /// Get spreading factor
    pub fn spreading_factor(&self) -> u8 {
        match self {
            DataRate::SF12BW125 | DataRate::SF12BW500 => 12,
            DataRate::SF11BW125 | DataRate::SF11BW500 => 11,
            DataRate::SF10BW125 | DataRate::SF10BW500 => 10,
            DataRate::SF9BW125 | DataRate::SF9BW500 => 9,
            DataRate::SF8BW125 | DataRate::SF8BW500 => 8,
            DataRate::SF7BW125 | DataRate::SF7BW250 | DataRate::SF7BW500 => 7,
        }
    }

    /// Get bandwidth in Hz
    pub fn bandwidth(&self) -> u32 {
        match self {
            DataRate::SF7BW250 => 250_000,
            DataRate::SF12BW500
            | DataRate::SF11BW500
            | DataRate::SF10BW500
            | DataRate::SF9BW500
            | DataRate::SF8BW500
            | DataRate::SF7BW500 => 500_000,
            _ => 125_000,
        }
    }
}

/// Supported regional parameter variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(non_camel_case_types, missing_docs)]
pub enum RegionId {
    EU868,
    US915,
    AU915,
    AS923,
    AS923_2,
    IN865,
}

use DataRate::*;

const DR_TABLE_125: [Option<DataRate>; 7] = [
    Some(SF12BW125),
    Some(SF11BW125),
    Some(SF10BW125),
    Some(SF9BW125),
    Some(SF8BW125),
    Some(SF7BW125),
    Some(SF7BW250),
];

const DR_TABLE_US915: [Option<DataRate>; 14] = [
    Some(SF10BW125),
    Some(SF9BW125),
    Some(SF8BW125),
    Some(SF7BW125),
    Some(SF8BW500),
    None,
    None,
    None,
    Some(SF12BW500),
    Some(SF11BW500),
    Some(SF10BW500),
    Some(SF9BW500),
    Some(SF8BW500),
    Some(SF7BW500),
];

const DR_TABLE_AU915: [Option<DataRate>; 14] = [
    Some(SF12BW125),
    Some(SF11BW125),
    Some(SF10BW125),
    Some(SF9BW125),
    Some(SF8BW125),
    Some(SF7BW125),
    Some(SF8BW500),
    None,
    Some(SF12BW500),
    Some(SF11BW500),
    Some(SF10BW500),
    Some(SF9BW500),
    Some(SF8BW500),
    Some(SF7BW500),
];

const EU868_CHANNELS: [u32; 8] = [
    868_100_000,
    868_300_000,
    868_500_000,
    867_100_000,
    867_300_000,
    867_500_000,
    867_700_000,
    867_900_000,
];

const US915_UPLINK: [u32; 8] = [
    903_900_000,
    904_100_000,
    904_300_000,
    904_500_000,
    904_700_000,
    904_900_000,
    905_100_000,
    905_300_000,
];

const AU915_UPLINK: [u32; 8] = [
    916_800_000,
    917_000_000,
    917_200_000,
    917_400_000,
    917_600_000,
    917_800_000,
    918_000_000,
    918_200_000,
];

// Shared by US915 and AU915
const DOWNLINK_915: [u32; 8] = [
    923_300_000,
    923_900_000,
    924_500_000,
    925_100_000,
    925_700_000,
    926_300_000,
    926_900_000,
    927_500_000,
];

const AS923_CHANNELS: [u32; 8] = [
    923_200_000,
    923_400_000,
    922_200_000,
    922_400_000,
    922_600_000,
    922_800_000,
    923_000_000,
    922_000_000,
];

const AS923_2_CHANNELS: [u32; 8] = [
    921_400_000,
    921_600_000,
    920_400_000,
    920_600_000,
    920_800_000,
    921_000_000,
    921_200_000,
    920_200_000,
];

const IN865_CHANNELS: [u32; 3] = [865_062_500, 865_402_500, 865_985_000];

/// Regional parameter table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    id: RegionId,
    uplink_channels: &'static [u32],
    rx1_channels: &'static [u32],
    rx2_frequency: u32,
    rx2_data_rate: u8,
    data_rates: &'static [Option<DataRate>],
    max_tx_data_rate: u8,
    rx1_dr_offset: u8,
    default_data_rate: u8,
    default_tx_power: i8,
}

impl Region {
    /// EU 863-870 MHz
    pub const fn eu868() -> Self {
        Self {
            id: RegionId::EU868,
            uplink_channels: &EU868_CHANNELS,
            rx1_channels: &EU868_CHANNELS,
            rx2_frequency: 869_525_000,
            rx2_data_rate: 3,
            data_rates: &DR_TABLE_125,
            max_tx_data_rate: 6,
            rx1_dr_offset: 0,
            default_data_rate: 0,
            default_tx_power: 14,
        }
    }

    /// US 902-928 MHz, sub-band 2
    pub const fn us915() -> Self {
        Self {
            id: RegionId::US915,
            uplink_channels: &US915_UPLINK,
            rx1_channels: &DOWNLINK_915,
            rx2_frequency: 923_300_000,
            rx2_data_rate: 8,
            data_rates: &DR_TABLE_US915,
            max_tx_data_rate: 4,
            rx1_dr_offset: 10,
            default_data_rate: 2,
            default_tx_power: 20,
        }
    }

    /// Australia 915-928 MHz, sub-band 2
    pub const fn au915() -> Self {
        Self {
            id: RegionId::AU915,
            uplink_channels: &AU915_UPLINK,
            rx1_channels: &DOWNLINK_915,
            rx2_frequency: 923_300_000,
            rx2_data_rate: 8,
            data_rates: &DR_TABLE_AU915,
            max_tx_data_rate: 4,
            rx1_dr_offset: 8,
            default_data_rate: 2,
            default_tx_power: 20,
        }
    }

    /// AS923 group 1
    pub const fn as923() -> Self {
        Self {
            id: RegionId::AS923,
            uplink_channels: &AS923_CHANNELS,
            rx1_channels: &AS923_CHANNELS,
            rx2_frequency: 923_200_000,
            rx2_data_rate: 2,
            data_rates: &DR_TABLE_125,
            max_tx_data_rate: 6,
            rx1_dr_offset: 0,
            default_data_rate: 0,
            default_tx_power: 14,
        }
    }

    /// AS923 group 2 (1.8 MHz below group 1)
    pub const fn as923_2() -> Self {
        Self {
            id: RegionId::AS923_2,
            uplink_channels: &AS923_2_CHANNELS,
            rx1_channels: &AS923_2_CHANNELS,
            rx2_frequency: 921_400_000,
            rx2_data_rate: 2,
            data_rates: &DR_TABLE_125,
            max_tx_data_rate: 6,
            rx1_dr_offset: 0,
            default_data_rate: 0,
            default_tx_power: 14,
        }
    }

    /// India 865-867 MHz
    pub const fn in865() -> Self {
        Self {
            id: RegionId::IN865,
            uplink_channels: &IN865_CHANNELS,
            rx1_channels: &IN865_CHANNELS,
            rx2_frequency: 866_550_000,
            rx2_data_rate: 2,
            data_rates: &DR_TABLE_125,
            max_tx_data_rate: 6,
            rx1_dr_offset: 0,
            default_data_rate: 0,
            default_tx_power: 14,
        }
    }

    /// Look up a region by id
    pub const fn from_id(id: RegionId) -> Self {
        match id {
            RegionId::EU868 => Self::eu868(),
            RegionId::US915 => Self::us915(),
            RegionId::AU915 => Self::au915(),
            RegionId::AS923 => Self::as923(),
            RegionId::AS923_2 => Self::as923_2(),
            RegionId::IN865 => Self::in865(),
        }
    }

    /// Region identifier
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Number of uplink channels available for hopping
    pub fn channel_count(&self) -> u8 {
        self.uplink_channels.len() as u8
    }

    /// Uplink frequency of a channel index
    pub fn uplink_frequency(&self, channel: u8) -> Option<u32> {
        self.uplink_channels.get(channel as usize).copied()
    }

    /// RX1 frequency of a receive channel index
    pub fn rx1_frequency(&self, rx_channel: u8) -> Option<u32> {
        self.rx1_channels.get(rx_channel as usize).copied()
    }

    /// RX2 frequency and datarate index, also used for Class C
    pub fn rx2(&self) -> (u32, u8) {
        (self.rx2_frequency, self.rx2_data_rate)
    }

    /// Modulation of a datarate index
    pub fn data_rate(&self, index: u8) -> Option<DataRate> {
        self.data_rates.get(index as usize).copied().flatten()
    }

    /// Highest datarate index accepted for uplinks
    pub fn max_tx_data_rate(&self) -> u8 {
        self.max_tx_data_rate
    }

    /// Datarate index the device listens on in RX1 after transmitting at `tx`
    pub fn rx1_data_rate(&self, tx: u8) -> u8 {
        if self.rx1_dr_offset == 0 {
            tx
        } else {
            (tx + self.rx1_dr_offset).min(MAX_RX_DATA_RATE)
        }
    }

    /// Uplink datarate after init
    pub fn default_data_rate(&self) -> u8 {
        self.default_data_rate
    }

    /// Transmit power after init, in dBm
    pub fn default_tx_power(&self) -> i8 {
        self.default_tx_power
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::eu868()
    }
}
