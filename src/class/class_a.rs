use crate::crypto::Crypto;
use crate::lorawan::mac::{Downlink, MacError, MacLayer, Uplink};
use crate::radio::traits::{Radio, RxConfig};
use crate::timer::{wait_until, Timer, POLL_INTERVAL_MS};

/// Receive window a downlink arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxWindow {
    /// First window, on the uplink channel
    Rx1,
    /// Second window, on the region's fixed channel
    Rx2,
}

/// Run one transmit/receive cycle.
///
/// Transmits `uplink`, then opens RX1 and, if RX1 stays empty, RX2 at the
/// offsets configured in the MAC layer's [`RxTiming`](crate::lorawan::phy::RxTiming).
/// Blocks until a downlink is accepted or RX2 closes. The radio is left in
/// standby.
pub fn run_cycle<R, C, T>(
    mac: &mut MacLayer<R, C>,
    timer: &mut T,
    uplink: &Uplink<'_>,
) -> Result<Option<(RxWindow, Downlink)>, MacError<R::Error>>
where
    R: Radio,
    C: Crypto,
    T: Timer,
{
    let rx1 = mac.rx1_config()?;
    let rx2 = mac.rx2_config()?;

    mac.phy.standby().map_err(MacError::Radio)?;
    mac.send_data(uplink)?;
    let tx_end = timer.now_ms();
    let timing = mac.timing;

    let rx1_open = tx_end + timing.rx1_delay() as u64;
    if let Some(downlink) = window(
        mac,
        timer,
        rx1,
        rx1_open,
        rx1_open + timing.rx1_window() as u64,
    )? {
        debug!("downlink received in RX1");
        mac.phy.standby().map_err(MacError::Radio)?;
        return Ok(Some((RxWindow::Rx1, downlink)));
    }

    let rx2_open = tx_end + timing.rx2_delay() as u64;
    let result = window(
        mac,
        timer,
        rx2,
        rx2_open,
        rx2_open + timing.rx2_window() as u64,
    )?;
    mac.phy.standby().map_err(MacError::Radio)?;
    match result {
        Some(downlink) => {
            debug!("downlink received in RX2");
            Ok(Some((RxWindow::Rx2, downlink)))
        }
        None => {
            trace!("no downlink in either window");
            Ok(None)
        }
    }
}

/// Listen from `open` until `close`, returning the first accepted downlink.
/// Rejected frames are dropped and listening continues.
fn window<R, C, T>(
    mac: &mut MacLayer<R, C>,
    timer: &mut T,
    config: RxConfig,
    open: u64,
    close: u64,
) -> Result<Option<Downlink>, MacError<R::Error>>
where
    R: Radio,
    C: Crypto,
    T: Timer,
{
    wait_until(timer, open);
    mac.phy.listen(config).map_err(MacError::Radio)?;
    trace!("window open at {=u32} Hz", config.frequency);

    loop {
        if mac.phy.rx_done().map_err(MacError::Radio)? {
            if let Some(downlink) = mac.receive_downlink()? {
                return Ok(Some(downlink));
            }
        }
        if timer.now_ms() >= close {
            return Ok(None);
        }
        timer.delay_ms(POLL_INTERVAL_MS);
    }
}
