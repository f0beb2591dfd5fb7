use core::fmt;

/// Error returned by the string-based configuration setters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Input was not exactly the expected number of ASCII hex digits
    InvalidHex,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidHex => f.write_str("invalid hex string"),
        }
    }
}

fn decode_hex<const N: usize>(input: &str) -> Result<[u8; N], ConfigError> {
    let mut out = [0u8; N];
    hex::decode_to_slice(input, &mut out).map_err(|_| ConfigError::InvalidHex)?;
    Ok(out)
}

macro_rules! byte_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name([u8; $len]);

        impl $name {
            /// Wrap raw bytes, most significant byte first
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Parse from a hex string of exactly twice the byte length
            pub fn from_hex(input: &str) -> Result<Self, ConfigError> {
                decode_hex::<$len>(input).map(Self)
            }

            /// Raw bytes, most significant byte first
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Bytes in over-the-air order
            pub fn to_wire(&self) -> [u8; $len] {
                let mut out = self.0;
                out.reverse();
                out
            }

            /// Build from bytes in over-the-air order
            pub fn from_wire(wire: &[u8; $len]) -> Self {
                let mut bytes = *wire;
                bytes.reverse();
                Self(bytes)
            }

            /// All bytes zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                for b in self.0.iter() {
                    write!(f, "{:02X}", b)?;
                }
                f.write_str(")")
            }
        }
    };
}

byte_newtype!(
    /// EUI-64 (8 bytes)
    EUI64,
    8
);
byte_newtype!(
    /// Device Address (4 bytes)
    DevAddr,
    4
);

/// AES-128 key (16 bytes)
///
/// Keys are used in the order they are written; unlike EUIs they are never
/// reversed on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AESKey([u8; 16]);

impl AESKey {
    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse from a 32 digit hex string
    pub fn from_hex(input: &str) -> Result<Self, ConfigError> {
        decode_hex::<16>(input).map(Self)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for AESKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AESKey(..)")
    }
}

/// LoRaWAN device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceClass {
    /// Class A: Uplink followed by two receive windows
    A,
    /// Class C: Continuously listening except when transmitting
    C,
}

/// Device activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationState {
    /// Device is not activated
    Idle,
    /// Device is activated through OTAA
    OTAAActivated,
    /// Device is activated through ABP
    ABPActivated,
}

/// Device identity used for OTAA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identity {
    /// Device EUI (unique device identifier)
    pub dev_eui: EUI64,
    /// Application EUI
    pub app_eui: EUI64,
    /// Application key
    pub app_key: AESKey,
}

/// Nonces and network id exchanged during a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinMaterial {
    /// Device nonce sent in the join request
    pub dev_nonce: u16,
    /// Application nonce from the join accept, wire order
    pub app_nonce: [u8; 3],
    /// Network id from the join accept, wire order
    pub net_id: [u8; 3],
}

/// Device configuration for both OTAA and ABP activation
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device EUI (unique device identifier)
    pub dev_eui: EUI64,
    /// Application EUI
    pub app_eui: EUI64,
    /// Application key (used for OTAA)
    pub app_key: AESKey,
    /// Device address (used for ABP)
    pub dev_addr: Option<DevAddr>,
    /// Network session key (used for ABP)
    pub nwk_skey: Option<AESKey>,
    /// Application session key (used for ABP)
    pub app_skey: Option<AESKey>,
}

impl DeviceConfig {
    /// Create a new OTAA device configuration
    pub fn new_otaa(dev_eui: EUI64, app_eui: EUI64, app_key: AESKey) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key,
            dev_addr: None,
            nwk_skey: None,
            app_skey: None,
        }
    }

    /// Create a new ABP device configuration
    pub fn new_abp(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            dev_eui: EUI64::default(),
            app_eui: EUI64::default(),
            app_key: AESKey::default(), // Not used in ABP
            dev_addr: Some(dev_addr),
            nwk_skey: Some(nwk_skey),
            app_skey: Some(app_skey),
        }
    }

    /// Identity part of this configuration
    pub fn identity(&self) -> Identity {
        Identity {
            dev_eui: self.dev_eui,
            app_eui: self.app_eui,
            app_key: self.app_key,
        }
    }
}

/// Session state for an activated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current activation state
    pub activation_state: ActivationState,
    /// Device address (assigned during activation)
    pub dev_addr: DevAddr,
    /// Network session key
    pub nwk_skey: AESKey,
    /// Application session key
    pub app_skey: AESKey,
    /// Uplink frame counter, the value the next uplink will carry
    pub fcnt_up: u16,
    /// Highest accepted downlink frame counter
    pub fcnt_down: u16,
    /// `fcnt_down` holds a counter that was actually accepted
    pub fcnt_down_valid: bool,
    /// Every 16-bit uplink counter value has been used
    pub fcnt_up_exhausted: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Create an empty session with zero keys and counters
    pub const fn new() -> Self {
        Self {
            activation_state: ActivationState::Idle,
            dev_addr: DevAddr::new([0; 4]),
            nwk_skey: AESKey::new([0; 16]),
            app_skey: AESKey::new([0; 16]),
            fcnt_up: 0,
            fcnt_down: 0,
            fcnt_down_valid: false,
            fcnt_up_exhausted: false,
        }
    }

    /// Create a new session state for ABP activation
    pub fn new_abp(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            activation_state: ActivationState::ABPActivated,
            dev_addr,
            nwk_skey,
            app_skey,
            ..Self::new()
        }
    }

    /// Create a new session state for OTAA activation
    pub fn new_otaa(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            activation_state: ActivationState::OTAAActivated,
            dev_addr,
            nwk_skey,
            app_skey,
            ..Self::new()
        }
    }

    /// Zero both frame counters
    pub fn reset_counters(&mut self) {
        self.fcnt_up = 0;
        self.fcnt_down = 0;
        self.fcnt_down_valid = false;
        self.fcnt_up_exhausted = false;
    }

    /// Move past the uplink counter that was just transmitted.
    ///
    /// The counter never wraps: after 0xFFFF has been sent the session is
    /// marked exhausted instead.
    pub fn increment_fcnt_up(&mut self) {
        match self.fcnt_up.checked_add(1) {
            Some(next) => self.fcnt_up = next,
            None => self.fcnt_up_exhausted = true,
        }
    }

    /// Overwrite the uplink counter, e.g. when restoring persisted state
    pub fn set_fcnt_up(&mut self, fcnt: u16) {
        self.fcnt_up = fcnt;
        self.fcnt_up_exhausted = false;
    }

    /// Overwrite the downlink counter. Zero means nothing accepted yet.
    pub fn set_fcnt_down(&mut self, fcnt: u16) {
        self.fcnt_down = fcnt;
        self.fcnt_down_valid = fcnt != 0;
    }

    /// Record `fcnt` as the last accepted downlink counter
    pub fn commit_fcnt_down(&mut self, fcnt: u16) {
        self.fcnt_down = fcnt;
        self.fcnt_down_valid = true;
    }

    /// Whether a downlink carrying `fcnt` may be accepted.
    ///
    /// The first downlink of a session may carry any counter, every later one
    /// must be strictly greater than the last accepted.
    pub fn accepts_fcnt_down(&self, fcnt: u16) -> bool {
        !self.fcnt_down_valid || fcnt > self.fcnt_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_case_insensitive() {
        let upper = EUI64::from_hex("70B3D57ED0001234").unwrap();
        let lower = EUI64::from_hex("70b3d57ed0001234").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(
            upper.as_bytes(),
            &[0x70, 0xB3, 0xD5, 0x7E, 0xD0, 0x00, 0x12, 0x34]
        );
    }

    #[test]
    fn hex_rejects_bad_digits_and_lengths() {
        assert_eq!(DevAddr::from_hex("2601ZZ01"), Err(ConfigError::InvalidHex));
        assert_eq!(DevAddr::from_hex("260101"), Err(ConfigError::InvalidHex));
        assert_eq!(DevAddr::from_hex("260101010"), Err(ConfigError::InvalidHex));
        assert!(AESKey::from_hex("").is_err());
    }

    #[test]
    fn wire_order_is_reversed() {
        let addr = DevAddr::from_hex("26011BDA").unwrap();
        assert_eq!(addr.to_wire(), [0xDA, 0x1B, 0x01, 0x26]);
        assert_eq!(DevAddr::from_wire(&[0xDA, 0x1B, 0x01, 0x26]), addr);
    }

    #[test]
    fn uplink_counter_never_wraps() {
        let mut session = SessionState::new();
        session.set_fcnt_up(u16::MAX - 1);
        session.increment_fcnt_up();
        assert_eq!(session.fcnt_up, u16::MAX);
        assert!(!session.fcnt_up_exhausted);
        session.increment_fcnt_up();
        assert_eq!(session.fcnt_up, u16::MAX);
        assert!(session.fcnt_up_exhausted);

        session.reset_counters();
        assert_eq!(session.fcnt_up, 0);
        assert!(!session.fcnt_up_exhausted);
    }

    #[test]
    fn downlink_counter_must_increase() {
        let mut session = SessionState::new();
        assert!(session.accepts_fcnt_down(0));
        session.commit_fcnt_down(0);
        assert!(!session.accepts_fcnt_down(0));
        assert!(session.accepts_fcnt_down(1));

        session.set_fcnt_down(10);
        assert!(!session.accepts_fcnt_down(10));
        assert!(session.accepts_fcnt_down(11));
        assert!(!session.accepts_fcnt_down(9));

        session.reset_counters();
        assert!(session.accepts_fcnt_down(0));
    }

    #[test]
    fn key_debug_hides_material() {
        let key = AESKey::new([0xAB; 16]);
        let mut out = heapless::String::<32>::new();
        core::fmt::write(&mut out, format_args!("{:?}", key)).unwrap();
        assert_eq!(out.as_str(), "AESKey(..)");
    }
}
