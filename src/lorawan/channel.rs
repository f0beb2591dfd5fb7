//! Channel hopping and datarate bounds

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::phy::RadioSettings;
use super::region::Region;

/// Channel number that selects hopping mode in [`ChannelSelector::set_channel`]
pub const MULTI: u8 = 8;

/// How the uplink channel is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelMode {
    /// Always transmit on this channel index
    Fixed(u8),
    /// Draw a random channel before every transmission
    Multi,
}

/// Channel and datarate policy
#[derive(Debug, Clone)]
pub struct ChannelSelector {
    rng: SmallRng,
    mode: ChannelMode,
}

impl ChannelSelector {
    /// Hopping selector seeded with `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            mode: ChannelMode::Multi,
        }
    }

    /// Restart the random sequence and resume hopping
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        self.mode = ChannelMode::Multi;
    }

    /// Current mode
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Whether channel hopping is active
    pub fn is_hopping(&self) -> bool {
        self.mode == ChannelMode::Multi
    }

    /// Fix a channel or restore hopping with [`MULTI`].
    ///
    /// Channel numbers outside the region's plan are ignored and `false` is
    /// returned.
    pub fn set_channel(
        &mut self,
        region: &Region,
        settings: &mut RadioSettings,
        channel: u8,
    ) -> bool {
        if channel == MULTI {
            self.mode = ChannelMode::Multi;
            return true;
        }
        if channel >= region.channel_count() {
            warn!("ignoring channel {=u8} outside region plan", channel);
            return false;
        }
        self.mode = ChannelMode::Fixed(channel);
        settings.tx_channel = channel;
        settings.rx_channel = channel;
        true
    }

    /// Pick a uniformly random channel of the region for TX and RX1
    pub fn random_channel(&mut self, region: &Region, settings: &mut RadioSettings) {
        let channel = self.rng.gen_range(0..region.channel_count());
        settings.tx_channel = channel;
        settings.rx_channel = channel;
    }

    /// Draw a new channel if hopping; called once before every transmission
    pub fn prepare(&mut self, region: &Region, settings: &mut RadioSettings) {
        if self.is_hopping() {
            self.random_channel(region, settings);
        }
    }

    /// Apply an uplink datarate.
    ///
    /// Rates above the region's maximum leave the previous rate in effect and
    /// return `false`.
    pub fn set_data_rate(
        &self,
        region: &Region,
        settings: &mut RadioSettings,
        data_rate: u8,
    ) -> bool {
        if data_rate > region.max_tx_data_rate() {
            warn!("ignoring datarate {=u8} above region maximum", data_rate);
            return false;
        }
        settings.tx_data_rate = data_rate;
        settings.rx_data_rate = region.rx1_data_rate(data_rate);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hopping_stays_within_plan() {
        let region = Region::in865();
        let mut settings = RadioSettings::for_region(&region);
        let mut selector = ChannelSelector::new(42);
        let mut seen = [false; 3];
        for _ in 0..200 {
            selector.prepare(&region, &mut settings);
            assert!(settings.tx_channel < 3);
            assert_eq!(settings.rx_channel, settings.tx_channel);
            seen[settings.tx_channel as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn same_seed_same_sequence() {
        let region = Region::eu868();
        let mut a = RadioSettings::for_region(&region);
        let mut b = a;
        let mut sa = ChannelSelector::new(7);
        let mut sb = ChannelSelector::new(7);
        for _ in 0..32 {
            sa.random_channel(&region, &mut a);
            sb.random_channel(&region, &mut b);
            assert_eq!(a.tx_channel, b.tx_channel);
        }
    }

    #[test]
    fn reseed_restarts_sequence_and_hopping() {
        let region = Region::eu868();
        let mut settings = RadioSettings::for_region(&region);
        let mut fresh = ChannelSelector::new(9);
        let first: [u8; 8] = core::array::from_fn(|_| {
            fresh.random_channel(&region, &mut settings);
            settings.tx_channel
        });

        let mut selector = ChannelSelector::new(1);
        selector.set_channel(&region, &mut settings, 2);
        selector.reseed(9);
        assert!(selector.is_hopping());
        for channel in first {
            selector.random_channel(&region, &mut settings);
            assert_eq!(settings.tx_channel, channel);
        }
    }

    #[test]
    fn fixed_channel_is_not_changed_by_prepare() {
        let region = Region::eu868();
        let mut settings = RadioSettings::for_region(&region);
        let mut selector = ChannelSelector::new(1);
        assert!(selector.set_channel(&region, &mut settings, 5));
        for _ in 0..10 {
            selector.prepare(&region, &mut settings);
            assert_eq!(settings.tx_channel, 5);
        }
        assert_eq!(selector.mode(), ChannelMode::Fixed(5));

        assert!(selector.set_channel(&region, &mut settings, MULTI));
        assert!(selector.is_hopping());
    }

    #[test]
    fn out_of_plan_channel_is_ignored() {
        let region = Region::in865();
        let mut settings = RadioSettings::for_region(&region);
        let mut selector = ChannelSelector::new(1);
        selector.set_channel(&region, &mut settings, 1);
        assert!(!selector.set_channel(&region, &mut settings, 4));
        assert!(!selector.set_channel(&region, &mut settings, 9));
        assert_eq!(settings.tx_channel, 1);
        assert_eq!(selector.mode(), ChannelMode::Fixed(1));
    }

    #[test]
    fn datarate_above_maximum_is_ignored() {
        let region = Region::us915();
        let mut settings = RadioSettings::for_region(&region);
        let selector = ChannelSelector::new(1);

        assert!(selector.set_data_rate(&region, &mut settings, 3));
        assert_eq!(settings.tx_data_rate, 3);
        assert_eq!(settings.rx_data_rate, 13);

        assert!(!selector.set_data_rate(&region, &mut settings, 5));
        assert_eq!(settings.tx_data_rate, 3);
        assert_eq!(settings.rx_data_rate, 13);
    }
}
