use crate::crypto::Crypto;
use crate::lorawan::mac::{Downlink, MacError, MacLayer};
use crate::radio::traits::Radio;

/// Put the radio in continuous receive on the RX2 channel and datarate
pub fn enter<R: Radio, C: Crypto>(mac: &mut MacLayer<R, C>) -> Result<(), MacError<R::Error>> {
    let config = mac.rx2_config()?;
    mac.phy.listen(config).map_err(MacError::Radio)
}

/// Stop continuous receive
pub fn leave<R: Radio, C: Crypto>(mac: &mut MacLayer<R, C>) -> Result<(), MacError<R::Error>> {
    mac.phy.standby().map_err(MacError::Radio)
}

/// Check for a received frame and decode it.
///
/// Continuous receive is re-armed after every frame, accepted or not.
pub fn poll<R: Radio, C: Crypto>(
    mac: &mut MacLayer<R, C>,
) -> Result<Option<Downlink>, MacError<R::Error>> {
    if !mac.phy.rx_done().map_err(MacError::Radio)? {
        return Ok(None);
    }
    let downlink = mac.receive_downlink()?;
    enter(mac)?;
    Ok(downlink)
}
