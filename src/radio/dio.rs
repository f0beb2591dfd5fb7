use embedded_hal::digital::v2::InputPin;

use super::traits::{Radio, RadioMode, RxPacket, TxConfig};

/// Error of a [`Dio0Radio`]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dio0Error<E, P> {
    /// Error from the wrapped radio
    Radio(E),
    /// Error reading the DIO0 pin
    Pin(P),
}

/// Radio whose receive-done signal is read from its DIO0 interrupt line
/// instead of a driver status query
pub struct Dio0Radio<R, P> {
    radio: R,
    dio0: P,
}

impl<R, P> Dio0Radio<R, P>
where
    R: Radio,
    P: InputPin,
{
    /// Wrap a radio and its DIO0 pin
    pub fn new(radio: R, dio0: P) -> Self {
        Self { radio, dio0 }
    }

    /// Wrapped radio
    pub fn inner(&self) -> &R {
        &self.radio
    }

    /// Wrapped radio, mutably
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Give back the radio and pin
    pub fn release(self) -> (R, P) {
        (self.radio, self.dio0)
    }
}

impl<R, P> Radio for Dio0Radio<R, P>
where
    R: Radio,
    P: InputPin,
{
    type Error = Dio0Error<R::Error, P::Error>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.radio.init().map_err(Dio0Error::Radio)
    }

    fn set_mode(&mut self, mode: RadioMode) -> Result<(), Self::Error> {
        self.radio.set_mode(mode).map_err(Dio0Error::Radio)
    }

    fn transmit(&mut self, buffer: &[u8], config: &TxConfig) -> Result<(), Self::Error> {
        self.radio.transmit(buffer, config).map_err(Dio0Error::Radio)
    }

    fn rx_done(&mut self) -> Result<bool, Self::Error> {
        self.dio0.is_high().map_err(Dio0Error::Pin)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<RxPacket, Self::Error> {
        self.radio.receive(buffer).map_err(Dio0Error::Radio)
    }

    fn rssi_raw(&mut self) -> Result<u8, Self::Error> {
        self.radio.rssi_raw().map_err(Dio0Error::Radio)
    }
}
