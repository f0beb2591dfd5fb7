use heapless::Vec;

use super::phy::{self, PhyLayer, RadioSettings, RxTiming};
use super::region::Region;
use crate::config::device::{
    AESKey, ActivationState, DevAddr, Identity, JoinMaterial, SessionState,
};
use crate::crypto::{Crypto, Direction, MIC_SIZE};
use crate::radio::traits::{Radio, RxConfig, RxPacket, TxConfig};

/// Maximum PHY payload handled by the codec
pub const MAX_FRAME_SIZE: usize = 256;

/// Maximum application payload of an uplink or downlink
pub const MAX_PAYLOAD_SIZE: usize = 222;

/// Length of a join request on air
pub const JOIN_REQUEST_SIZE: usize = 23;

/// MHDR + FHDR without options + MIC
const MIN_DATA_FRAME_SIZE: usize = 1 + 7 + MIC_SIZE;

/// Join accept without and with CFList
const JOIN_ACCEPT_SIZE: usize = 17;
const JOIN_ACCEPT_CFLIST_SIZE: usize = 33;

/// Raw frame buffer
pub type FrameBuffer = Vec<u8, MAX_FRAME_SIZE>;

/// Application payload buffer
pub type PayloadBuffer = Vec<u8, MAX_PAYLOAD_SIZE>;

/// MAC header types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum MType {
    JoinRequest = 0x00,
    JoinAccept = 0x20,
    UnconfirmedDataUp = 0x40,
    UnconfirmedDataDown = 0x60,
    ConfirmedDataUp = 0x80,
    ConfirmedDataDown = 0xA0,
    RejoinRequest = 0xC0,
    Proprietary = 0xE0,
}

impl MType {
    /// Decode the message type bits of an MHDR
    pub fn from_mhdr(mhdr: u8) -> Self {
        match mhdr & 0xE0 {
            0x00 => MType::JoinRequest,
            0x20 => MType::JoinAccept,
            0x40 => MType::UnconfirmedDataUp,
            0x60 => MType::UnconfirmedDataDown,
            0x80 => MType::ConfirmedDataUp,
            0xA0 => MType::ConfirmedDataDown,
            0xC0 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }

    /// MHDR byte for this type, LoRaWAN R1 major version
    pub fn mhdr(self) -> u8 {
        self as u8
    }
}

/// Frame header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FCtrl {
    /// Adaptive datarate enabled
    pub adr: bool,
    /// ADR acknowledgement requested (uplink) or RFU (downlink)
    pub adr_ack_req: bool,
    /// Acknowledges the last confirmed frame
    pub ack: bool,
    /// More downlink data pending (downlink) or class B (uplink)
    pub f_pending: bool,
    /// Length of FOpts
    pub f_opts_len: u8,
}

impl FCtrl {
    /// Encode to the FCtrl byte
    pub fn to_byte(&self) -> u8 {
        let mut byte = self.f_opts_len & 0x0F;
        if self.adr {
            byte |= 0x80;
        }
        if self.adr_ack_req {
            byte |= 0x40;
        }
        if self.ack {
            byte |= 0x20;
        }
        if self.f_pending {
            byte |= 0x10;
        }
        byte
    }

    /// Decode an FCtrl byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            adr: (byte & 0x80) != 0,
            adr_ack_req: (byte & 0x40) != 0,
            ack: (byte & 0x20) != 0,
            f_pending: (byte & 0x10) != 0,
            f_opts_len: byte & 0x0F,
        }
    }
}

/// Frame header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FHDR {
    /// Device address
    pub dev_addr: DevAddr,
    /// Frame control
    pub f_ctrl: FCtrl,
    /// Low 16 bits of the frame counter
    pub f_cnt: u16,
    /// Piggybacked MAC commands
    pub f_opts: Vec<u8, 15>,
}

impl FHDR {
    fn serialize(&self, buffer: &mut FrameBuffer) -> Result<(), Overflow> {
        let mut f_ctrl = self.f_ctrl;
        f_ctrl.f_opts_len = self.f_opts.len() as u8;
        extend(buffer, &self.dev_addr.to_wire())?;
        push(buffer, f_ctrl.to_byte())?;
        extend(buffer, &self.f_cnt.to_le_bytes())?;
        extend(buffer, &self.f_opts)
    }
}

/// MAC layer error
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacError<E> {
    /// Radio error
    Radio(E),
    /// Invalid MIC
    InvalidMic,
    /// Buffer too small
    BufferTooSmall,
    /// Invalid frame
    InvalidFrame,
    /// Frame addressed to another device
    AddressMismatch,
    /// Downlink counter lower than the last accepted one
    StaleFrameCounter,
    /// Every uplink counter value of this session has been used
    FrameCounterExhausted,
    /// Channel or datarate not defined by the region
    InvalidChannel,
}

/// A frame did not fit its buffer
struct Overflow;

impl<E> From<Overflow> for MacError<E> {
    fn from(_: Overflow) -> Self {
        MacError::BufferTooSmall
    }
}

fn push(buffer: &mut FrameBuffer, byte: u8) -> Result<(), Overflow> {
    buffer.push(byte).map_err(|_| Overflow)
}

fn extend(buffer: &mut FrameBuffer, data: &[u8]) -> Result<(), Overflow> {
    buffer.extend_from_slice(data).map_err(|_| Overflow)
}

/// Uplink data frame to encode
#[derive(Debug, Clone, Copy)]
pub struct Uplink<'a> {
    /// Confirmed or unconfirmed
    pub confirmed: bool,
    /// Acknowledge the last confirmed downlink
    pub ack: bool,
    /// FPort, absent for an empty frame
    pub f_port: Option<u8>,
    /// Plain application payload
    pub payload: &'a [u8],
}

/// Decoded downlink data frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downlink {
    /// Message type, unconfirmed or confirmed data down
    pub mtype: MType,
    /// Frame control
    pub f_ctrl: FCtrl,
    /// Frame counter
    pub f_cnt: u16,
    /// FPort if a payload is present
    pub f_port: Option<u8>,
    /// Decrypted payload
    pub payload: PayloadBuffer,
}

impl Downlink {
    /// Whether the network asked for an acknowledgement
    pub fn is_confirmed(&self) -> bool {
        self.mtype == MType::ConfirmedDataDown
    }
}

/// Frame direction of a [`MessageMetadata`]
pub use crate::crypto::Direction as MessageDirection;

/// Header information of the last decoded message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageMetadata {
    /// Up or down
    pub direction: MessageDirection,
    /// Raw MAC header
    pub mhdr: u8,
    /// Frame control
    pub f_ctrl: FCtrl,
    /// FPort, 0 if absent
    pub f_port: u8,
    /// Packet RSSI in dBm
    pub rssi: i16,
    /// Packet SNR in dB
    pub snr: i8,
}

/// Decoded join accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAccept {
    /// Application nonce, wire order
    pub app_nonce: [u8; 3],
    /// Network id, wire order
    pub net_id: [u8; 3],
    /// Assigned device address
    pub dev_addr: DevAddr,
    /// RX1 datarate offset and RX2 datarate
    pub dl_settings: u8,
    /// RX1 delay in seconds (0 means 1)
    pub rx_delay: u8,
    /// Optional channel list
    pub cf_list: Option<[u8; 16]>,
}

/// Encode a join request
pub fn build_join_request<C: Crypto, E>(
    crypto: &C,
    identity: &Identity,
    dev_nonce: u16,
) -> Result<FrameBuffer, MacError<E>> {
    let mut buffer = FrameBuffer::new();
    push(&mut buffer, MType::JoinRequest.mhdr())?;
    extend(&mut buffer, &identity.app_eui.to_wire())?;
    extend(&mut buffer, &identity.dev_eui.to_wire())?;
    extend(&mut buffer, &dev_nonce.to_le_bytes())?;
    let mic = crypto.join_mic(&identity.app_key, &buffer);
    extend(&mut buffer, &mic)?;
    Ok(buffer)
}

/// Decrypt, authenticate and decode a join accept
pub fn parse_join_accept<C: Crypto, E>(
    crypto: &C,
    app_key: &AESKey,
    frame: &[u8],
) -> Result<JoinAccept, MacError<E>> {
    if frame.len() != JOIN_ACCEPT_SIZE && frame.len() != JOIN_ACCEPT_CFLIST_SIZE {
        return Err(MacError::InvalidFrame);
    }
    if MType::from_mhdr(frame[0]) != MType::JoinAccept {
        return Err(MacError::InvalidFrame);
    }

    let mut message = FrameBuffer::new();
    extend(&mut message, frame)?;
    crypto.decrypt_join_accept(app_key, &mut message[1..]);

    let mic_start = message.len() - MIC_SIZE;
    let expected = crypto.join_mic(app_key, &message[..mic_start]);
    if expected[..] != message[mic_start..] {
        return Err(MacError::InvalidMic);
    }

    let fields = &message[1..mic_start];
    let mut app_nonce = [0u8; 3];
    let mut net_id = [0u8; 3];
    let mut dev_addr = [0u8; 4];
    app_nonce.copy_from_slice(&fields[0..3]);
    net_id.copy_from_slice(&fields[3..6]);
    dev_addr.copy_from_slice(&fields[6..10]);
    let cf_list = if fields.len() == 28 {
        let mut list = [0u8; 16];
        list.copy_from_slice(&fields[12..28]);
        Some(list)
    } else {
        None
    };

    Ok(JoinAccept {
        app_nonce,
        net_id,
        dev_addr: DevAddr::from_wire(&dev_addr),
        dl_settings: fields[10],
        rx_delay: fields[11],
        cf_list,
    })
}

/// Encode an uplink data frame with the session's current uplink counter
pub fn build_data_up<C: Crypto, E>(
    crypto: &C,
    session: &SessionState,
    uplink: &Uplink<'_>,
) -> Result<FrameBuffer, MacError<E>> {
    if uplink.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(MacError::BufferTooSmall);
    }
    let mtype = if uplink.confirmed {
        MType::ConfirmedDataUp
    } else {
        MType::UnconfirmedDataUp
    };
    let fcnt = session.fcnt_up;

    let mut buffer = FrameBuffer::new();
    push(&mut buffer, mtype.mhdr())?;
    FHDR {
        dev_addr: session.dev_addr,
        f_ctrl: FCtrl {
            ack: uplink.ack,
            ..FCtrl::default()
        },
        f_cnt: fcnt,
        f_opts: Vec::new(),
    }
    .serialize(&mut buffer)?;

    if let Some(port) = uplink.f_port {
        push(&mut buffer, port)?;
        let start = buffer.len();
        extend(&mut buffer, uplink.payload)?;
        let key = if port == 0 {
            &session.nwk_skey
        } else {
            &session.app_skey
        };
        crypto.encrypt_payload(
            key,
            &session.dev_addr,
            fcnt as u32,
            Direction::Up,
            &mut buffer[start..],
        );
    }

    let mic = crypto.compute_mic(
        &session.nwk_skey,
        &session.dev_addr,
        fcnt as u32,
        Direction::Up,
        &buffer,
    );
    extend(&mut buffer, &mic)?;
    Ok(buffer)
}

/// Authenticate and decode a downlink data frame addressed to this session
pub fn parse_data_down<C: Crypto, E>(
    crypto: &C,
    session: &SessionState,
    frame: &[u8],
) -> Result<Downlink, MacError<E>> {
    if frame.len() < MIN_DATA_FRAME_SIZE {
        return Err(MacError::InvalidFrame);
    }
    let mtype = MType::from_mhdr(frame[0]);
    if mtype != MType::UnconfirmedDataDown && mtype != MType::ConfirmedDataDown {
        return Err(MacError::InvalidFrame);
    }

    let mut addr = [0u8; 4];
    addr.copy_from_slice(&frame[1..5]);
    if DevAddr::from_wire(&addr) != session.dev_addr {
        return Err(MacError::AddressMismatch);
    }
    let f_ctrl = FCtrl::from_byte(frame[5]);
    let f_cnt = u16::from_le_bytes([frame[6], frame[7]]);

    let mic_start = frame.len() - MIC_SIZE;
    let header_end = 8 + f_ctrl.f_opts_len as usize;
    if header_end > mic_start {
        return Err(MacError::InvalidFrame);
    }
    if !crypto.verify_mic(
        &session.nwk_skey,
        &session.dev_addr,
        f_cnt as u32,
        Direction::Down,
        &frame[..mic_start],
        &frame[mic_start..],
    ) {
        return Err(MacError::InvalidMic);
    }
    if !session.accepts_fcnt_down(f_cnt) {
        return Err(MacError::StaleFrameCounter);
    }

    let mut payload = PayloadBuffer::new();
    let f_port = if header_end < mic_start {
        let port = frame[header_end];
        payload
            .extend_from_slice(&frame[header_end + 1..mic_start])
            .map_err(|_| Overflow)?;
        let key = if port == 0 {
            &session.nwk_skey
        } else {
            &session.app_skey
        };
        crypto.encrypt_payload(
            key,
            &session.dev_addr,
            f_cnt as u32,
            Direction::Down,
            &mut payload,
        );
        Some(port)
    } else {
        None
    };

    Ok(Downlink {
        mtype,
        f_ctrl,
        f_cnt,
        f_port,
        payload,
    })
}

/// MAC layer state
pub struct MacLayer<R: Radio, C: Crypto> {
    /// PHY layer
    pub(crate) phy: PhyLayer<R>,
    /// Crypto services
    pub(crate) crypto: C,
    /// Region configuration
    pub(crate) region: Region,
    /// Device identity
    pub(crate) identity: Identity,
    /// Join nonces
    pub(crate) join: JoinMaterial,
    /// Session state
    pub(crate) session: SessionState,
    /// Channel, datarate and power
    pub(crate) settings: RadioSettings,
    /// Receive window timing
    pub(crate) timing: RxTiming,
    /// Header of the last accepted downlink
    pub(crate) last_rx: Option<MessageMetadata>,
}

impl<R: Radio, C: Crypto> MacLayer<R, C> {
    /// Create a new MAC layer
    pub fn new(radio: R, crypto: C, region: Region) -> Self {
        Self {
            phy: PhyLayer::new(radio),
            crypto,
            settings: RadioSettings::for_region(&region),
            region,
            identity: Identity::default(),
            join: JoinMaterial::default(),
            session: SessionState::new(),
            timing: RxTiming::default(),
            last_rx: None,
        }
    }

    /// Forget identity, session and settings
    pub fn reset(&mut self) {
        self.identity = Identity::default();
        self.join = JoinMaterial::default();
        self.session = SessionState::new();
        self.settings = RadioSettings::for_region(&self.region);
        self.timing = RxTiming::default();
        self.last_rx = None;
    }

    /// Forget all state and bring the radio up in standby
    pub fn init(&mut self) -> Result<(), R::Error> {
        self.reset();
        self.phy.init()?;
        self.phy.standby()
    }

    fn tx_config(&self) -> Result<TxConfig, MacError<R::Error>> {
        phy::tx_config(&self.region, &self.settings).ok_or(MacError::InvalidChannel)
    }

    /// RX1 parameters for the current channel and datarate
    pub fn rx1_config(&self) -> Result<RxConfig, MacError<R::Error>> {
        phy::rx1_config(&self.region, &self.settings).ok_or(MacError::InvalidChannel)
    }

    /// RX2 and class C parameters of the region
    pub fn rx2_config(&self) -> Result<RxConfig, MacError<R::Error>> {
        phy::rx2_config(&self.region).ok_or(MacError::InvalidChannel)
    }

    /// Transmit a join request on the current channel
    pub fn send_join_request(&mut self) -> Result<(), MacError<R::Error>> {
        let config = self.tx_config()?;
        let frame =
            build_join_request::<C, R::Error>(&self.crypto, &self.identity, self.join.dev_nonce)?;
        self.phy.transmit(&config, &frame).map_err(MacError::Radio)?;
        info!(
            "join request sent on channel {=u8} dr {=u8}",
            self.settings.tx_channel,
            self.settings.tx_data_rate
        );
        Ok(())
    }

    /// Read the pending frame and try it as a join accept.
    ///
    /// Nothing is modified unless the whole frame checks out.
    pub fn accept_join(&mut self) -> Result<Option<JoinAccept>, MacError<R::Error>> {
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let packet = self.phy.receive(&mut frame).map_err(MacError::Radio)?;
        let len = packet.len.min(MAX_FRAME_SIZE);

        let accept = match parse_join_accept::<C, R::Error>(
            &self.crypto,
            &self.identity.app_key,
            &frame[..len],
        ) {
            Ok(accept) => accept,
            Err(_) => {
                debug!("ignoring frame that is not a valid join accept");
                return Ok(None);
            }
        };

        let (nwk_skey, app_skey) = self.crypto.derive_session_keys(
            &self.identity.app_key,
            &accept.app_nonce,
            &accept.net_id,
            self.join.dev_nonce,
        );
        self.join.app_nonce = accept.app_nonce;
        self.join.net_id = accept.net_id;
        self.session = SessionState::new_otaa(accept.dev_addr, nwk_skey, app_skey);
        Ok(Some(accept))
    }

    /// Encode and transmit an uplink, then advance the uplink counter
    pub fn send_data(&mut self, uplink: &Uplink<'_>) -> Result<(), MacError<R::Error>> {
        if self.session.fcnt_up_exhausted {
            warn!("uplink counter exhausted, refusing to transmit");
            return Err(MacError::FrameCounterExhausted);
        }
        let config = self.tx_config()?;
        let frame = build_data_up::<C, R::Error>(&self.crypto, &self.session, uplink)?;
        self.phy.transmit(&config, &frame).map_err(MacError::Radio)?;
        info!(
            "uplink fcnt {=u16} sent on channel {=u8} dr {=u8}",
            self.session.fcnt_up,
            self.settings.tx_channel,
            self.settings.tx_data_rate
        );
        self.session.increment_fcnt_up();
        Ok(())
    }

    /// Read the pending frame and try it as a downlink for this session.
    ///
    /// Frames that fail any check yield `Ok(None)`; only radio failures are
    /// errors.
    pub fn receive_downlink(&mut self) -> Result<Option<Downlink>, MacError<R::Error>> {
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let packet: RxPacket = self.phy.receive(&mut frame).map_err(MacError::Radio)?;
        let len = packet.len.min(MAX_FRAME_SIZE);

        match parse_data_down::<C, R::Error>(&self.crypto, &self.session, &frame[..len]) {
            Ok(downlink) => {
                self.session.commit_fcnt_down(downlink.f_cnt);
                self.last_rx = Some(MessageMetadata {
                    direction: Direction::Down,
                    mhdr: frame[0],
                    f_ctrl: downlink.f_ctrl,
                    f_port: downlink.f_port.unwrap_or(0),
                    rssi: packet.rssi,
                    snr: packet.snr,
                });
                debug!("downlink fcnt {=u16} accepted", downlink.f_cnt);
                Ok(Some(downlink))
            }
            Err(MacError::AddressMismatch) => {
                debug!("dropping frame for another device");
                Ok(None)
            }
            Err(MacError::InvalidMic) => {
                warn!("dropping downlink with invalid MIC");
                Ok(None)
            }
            Err(MacError::StaleFrameCounter) => {
                warn!("dropping downlink with stale counter");
                Ok(None)
            }
            Err(_) => {
                debug!("dropping malformed frame");
                Ok(None)
            }
        }
    }

    /// Mark the session as personalised after ABP keys or address change
    pub(crate) fn mark_abp(&mut self) {
        self.session.activation_state = ActivationState::ABPActivated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DefaultCrypto;

    type Error = MacError<()>;

    fn abp_session() -> SessionState {
        SessionState::new_abp(
            DevAddr::new([0x26, 0x01, 0x1B, 0xDA]),
            AESKey::new([0x11; 16]),
            AESKey::new([0x22; 16]),
        )
    }

    #[test]
    fn fctrl_bits() {
        let f_ctrl = FCtrl {
            adr: true,
            ack: true,
            f_opts_len: 3,
            ..FCtrl::default()
        };
        assert_eq!(f_ctrl.to_byte(), 0xA3);
        assert_eq!(FCtrl::from_byte(0xA3), f_ctrl);
        assert!(FCtrl::from_byte(0x20).ack);
    }

    #[test]
    fn join_request_layout() {
        let identity = Identity {
            dev_eui: crate::config::device::EUI64::new([1, 2, 3, 4, 5, 6, 7, 8]),
            app_eui: crate::config::device::EUI64::new([9, 10, 11, 12, 13, 14, 15, 16]),
            app_key: AESKey::new([0x33; 16]),
        };
        let frame = build_join_request::<_, ()>(&DefaultCrypto, &identity, 0x0102).unwrap();
        assert_eq!(frame.len(), JOIN_REQUEST_SIZE);
        assert_eq!(frame[0], 0x00);
        assert_eq!(&frame[1..9], &[16, 15, 14, 13, 12, 11, 10, 9]);
        assert_eq!(&frame[9..17], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&frame[17..19], &[0x02, 0x01]);
        let mic = DefaultCrypto.join_mic(&identity.app_key, &frame[..19]);
        assert_eq!(&frame[19..], &mic);
    }

    #[test]
    fn uplink_layout() {
        let mut session = abp_session();
        session.fcnt_up = 0x0102;
        let uplink = Uplink {
            confirmed: true,
            ack: false,
            f_port: Some(5),
            payload: b"AB",
        };
        let frame = build_data_up::<_, ()>(&DefaultCrypto, &session, &uplink).unwrap();

        assert_eq!(frame.len(), 1 + 7 + 1 + 2 + 4);
        assert_eq!(frame[0], 0x80);
        assert_eq!(&frame[1..5], &[0xDA, 0x1B, 0x01, 0x26]);
        assert_eq!(frame[5], 0x00);
        assert_eq!(&frame[6..8], &[0x02, 0x01]);
        assert_eq!(frame[8], 5);

        let mut payload = [frame[9], frame[10]];
        DefaultCrypto.encrypt_payload(
            &session.app_skey,
            &session.dev_addr,
            0x0102,
            Direction::Up,
            &mut payload,
        );
        assert_eq!(&payload, b"AB");
        assert!(DefaultCrypto.verify_mic(
            &session.nwk_skey,
            &session.dev_addr,
            0x0102,
            Direction::Up,
            &frame[..11],
            &frame[11..],
        ));
    }

    #[test]
    fn empty_ack_uplink_has_no_port() {
        let session = abp_session();
        let uplink = Uplink {
            confirmed: false,
            ack: true,
            f_port: None,
            payload: &[],
        };
        let frame = build_data_up::<_, ()>(&DefaultCrypto, &session, &uplink).unwrap();
        assert_eq!(frame.len(), MIN_DATA_FRAME_SIZE);
        assert_eq!(frame[0], 0x40);
        assert_eq!(frame[5], 0x20);
    }

    fn downlink_frame(
        session: &SessionState,
        mhdr: u8,
        f_ctrl: u8,
        fcnt: u16,
        body: &[u8],
    ) -> FrameBuffer {
        let mut frame = FrameBuffer::new();
        frame.push(mhdr).unwrap();
        frame.extend_from_slice(&session.dev_addr.to_wire()).unwrap();
        frame.push(f_ctrl).unwrap();
        frame.extend_from_slice(&fcnt.to_le_bytes()).unwrap();
        frame.extend_from_slice(body).unwrap();
        let mic = DefaultCrypto.compute_mic(
            &session.nwk_skey,
            &session.dev_addr,
            fcnt as u32,
            Direction::Down,
            &frame,
        );
        frame.extend_from_slice(&mic).unwrap();
        frame
    }

    #[test]
    fn downlink_with_options_and_payload() {
        let session = abp_session();
        let mut body: Vec<u8, 16> = Vec::new();
        // Two FOpts bytes, port 9, then encrypted "hi"
        body.extend_from_slice(&[0x02, 0x00, 9]).unwrap();
        let mut data = *b"hi";
        DefaultCrypto.encrypt_payload(
            &session.app_skey,
            &session.dev_addr,
            4,
            Direction::Down,
            &mut data,
        );
        body.extend_from_slice(&data).unwrap();

        let frame = downlink_frame(&session, 0xA0, 0x22, 4, &body);
        let downlink = parse_data_down::<_, ()>(&DefaultCrypto, &session, &frame).unwrap();
        assert!(downlink.is_confirmed());
        assert!(downlink.f_ctrl.ack);
        assert_eq!(downlink.f_cnt, 4);
        assert_eq!(downlink.f_port, Some(9));
        assert_eq!(&downlink.payload[..], b"hi");
    }

    #[test]
    fn downlink_rejections() {
        let session = abp_session();
        let frame = downlink_frame(&session, 0x60, 0x20, 3, &[]);
        let ok = parse_data_down::<_, ()>(&DefaultCrypto, &session, &frame).unwrap();
        assert_eq!(ok.f_port, None);
        assert!(ok.payload.is_empty());

        let mut tampered = frame.clone();
        tampered[5] ^= 0x10;
        assert_eq!(
            parse_data_down::<_, ()>(&DefaultCrypto, &session, &tampered),
            Err(Error::InvalidMic)
        );

        let mut other = session.clone();
        other.dev_addr = DevAddr::new([0, 0, 0, 1]);
        assert_eq!(
            parse_data_down::<_, ()>(&DefaultCrypto, &other, &frame),
            Err(Error::AddressMismatch)
        );

        let mut ahead = session.clone();
        ahead.set_fcnt_down(4);
        assert_eq!(
            parse_data_down::<_, ()>(&DefaultCrypto, &ahead, &frame),
            Err(Error::StaleFrameCounter)
        );

        let mut replayed = session.clone();
        replayed.commit_fcnt_down(3);
        assert_eq!(
            parse_data_down::<_, ()>(&DefaultCrypto, &replayed, &frame),
            Err(Error::StaleFrameCounter)
        );

        let uplink_type = downlink_frame(&session, 0x40, 0x00, 3, &[]);
        assert_eq!(
            parse_data_down::<_, ()>(&DefaultCrypto, &session, &uplink_type),
            Err(Error::InvalidFrame)
        );
        assert_eq!(
            parse_data_down::<_, ()>(&DefaultCrypto, &session, &frame[..8]),
            Err(Error::InvalidFrame)
        );
    }

    #[test]
    fn join_accept_rejects_wrong_length_and_type() {
        let key = AESKey::new([0x33; 16]);
        assert_eq!(
            parse_join_accept::<_, ()>(&DefaultCrypto, &key, &[0x20; 20]),
            Err(Error::InvalidFrame)
        );
        assert_eq!(
            parse_join_accept::<_, ()>(&DefaultCrypto, &key, &[0x60; 17]),
            Err(Error::InvalidFrame)
        );
        assert_eq!(
            parse_join_accept::<_, ()>(&DefaultCrypto, &key, &[0x20; 17]),
            Err(Error::InvalidMic)
        );
    }
}
