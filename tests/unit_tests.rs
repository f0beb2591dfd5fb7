use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lorawan_node::{
    config::device::{AESKey, ConfigError, DevAddr, DeviceConfig, EUI64},
    device::LoRaWANDevice,
    lorawan::{
        channel::{ChannelMode, MULTI},
        region::Region,
    },
};

use mock::{MockRadio, MockTimer, Sim};

const EU868_UPLINK: [u32; 8] = [
    868_100_000,
    868_300_000,
    868_500_000,
    867_100_000,
    867_300_000,
    867_500_000,
    867_700_000,
    867_900_000,
];

fn abp_device(region: Region, seed: u64) -> (LoRaWANDevice<MockRadio, MockTimer>, Sim) {
    let (radio, timer, sim) = mock::setup();
    let mut device = LoRaWANDevice::new(radio, timer, region);
    device.init(seed).unwrap();
    device.set_dev_addr("26011BDA").unwrap();
    device.set_nwk_skey("000102030405060708090A0B0C0D0E0F").unwrap();
    device.set_app_skey("F0E0D0C0B0A090807060504030201000").unwrap();
    // Keep cycles short
    device.set_rx1_delay(10);
    device.set_rx1_window(10);
    device.set_rx2_delay(20);
    device.set_rx2_window(10);
    (device, sim)
}

#[test]
fn test_hex_setters_round_trip() {
    let (mut device, _sim) = abp_device(Region::eu868(), 0);

    device.set_dev_eui("70B3D57ED0001234").unwrap();
    device.set_app_eui("70b3d57ed00000ff").unwrap();
    device.set_app_key("2B7E151628AED2A6ABF7158809CF4F3C").unwrap();
    device.set_dev_addr("26011bda").unwrap();

    let identity = device.identity();
    assert_eq!(hex::encode_upper(identity.dev_eui.as_bytes()), "70B3D57ED0001234");
    assert_eq!(hex::encode(identity.app_eui.as_bytes()), "70b3d57ed00000ff");
    assert_eq!(
        hex::encode_upper(identity.app_key.as_bytes()),
        "2B7E151628AED2A6ABF7158809CF4F3C"
    );
    assert_eq!(hex::encode_upper(device.dev_addr().as_bytes()), "26011BDA");
}

#[test]
fn test_random_hex_round_trip() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let bytes: [u8; 16] = rng.gen();
        let upper = hex::encode_upper(bytes);
        let lower = hex::encode(bytes);
        assert_eq!(AESKey::from_hex(&upper).unwrap().as_bytes(), &bytes);
        assert_eq!(AESKey::from_hex(&lower).unwrap().as_bytes(), &bytes);

        let eui: [u8; 8] = rng.gen();
        let parsed = EUI64::from_hex(&hex::encode(eui)).unwrap();
        assert_eq!(parsed.as_bytes(), &eui);
    }
}

#[test]
fn test_identity_change_resets_counters_and_command() {
    let (mut device, sim) = abp_device(Region::eu868(), 0);

    type Setter = fn(&mut LoRaWANDevice<MockRadio, MockTimer>) -> Result<(), ConfigError>;
    let setters: [Setter; 6] = [
        |d| d.set_dev_eui("0000000000000001"),
        |d| d.set_app_eui("0000000000000002"),
        |d| d.set_app_key("000102030405060708090A0B0C0D0E0F"),
        |d| d.set_nwk_skey("000102030405060708090A0B0C0D0E0F"),
        |d| d.set_app_skey("F0E0D0C0B0A090807060504030201000"),
        |d| d.set_dev_addr("26011BDA"),
    ];

    for setter in setters {
        device.set_frame_counter_tx(10);
        device.set_frame_counter_rx(3);
        device.send_uplink(b"pending", false, 1).unwrap();

        setter(&mut device).unwrap();
        assert_eq!(device.frame_counter_tx(), 0);
        assert_eq!(device.frame_counter_rx(), 0);

        let sent = sim.transmissions().len();
        device.update().unwrap();
        assert_eq!(sim.transmissions().len(), sent);
    }
}

#[test]
fn test_invalid_hex_is_rejected_without_side_effects() {
    let (mut device, _sim) = abp_device(Region::eu868(), 0);
    device.set_frame_counter_tx(10);
    let addr = device.dev_addr();

    assert_eq!(device.set_dev_eui("70B3D57ED00012"), Err(ConfigError::InvalidHex));
    assert_eq!(
        device.set_app_key("Z2B7E151628AED2A6ABF7158809CF4F3"),
        Err(ConfigError::InvalidHex)
    );
    assert_eq!(device.set_dev_addr("26011BDA00"), Err(ConfigError::InvalidHex));
    assert_eq!(device.set_dev_addr("2601 BDA"), Err(ConfigError::InvalidHex));

    assert_eq!(device.frame_counter_tx(), 10);
    assert_eq!(device.dev_addr(), addr);
}

#[test]
fn test_rx2_never_overlaps_rx1() {
    let (mut device, _sim) = abp_device(Region::eu868(), 0);
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..2000 {
        let value = rng.gen_range(0..20_000);
        match rng.gen_range(0..4) {
            0 => device.set_rx1_delay(value),
            1 => device.set_rx1_window(value),
            2 => device.set_rx2_delay(value),
            _ => device.set_rx2_window(value),
        }
        let timing = device.rx_timing();
        assert!(timing.rx2_delay() >= timing.rx1_delay() + timing.rx1_window());
    }
}

#[test]
fn test_datarate_above_region_maximum_is_ignored() {
    let (mut device, _sim) = abp_device(Region::us915(), 0);
    device.set_data_rate(3);
    assert_eq!(device.data_rate(), 3);
    device.set_data_rate(5);
    assert_eq!(device.data_rate(), 3);
    device.set_data_rate(4);
    assert_eq!(device.data_rate(), 4);

    let (mut device, _sim) = abp_device(Region::eu868(), 0);
    device.set_data_rate(6);
    assert_eq!(device.data_rate(), 6);
    device.set_data_rate(7);
    assert_eq!(device.data_rate(), 6);
}

#[test]
fn test_multi_hops_within_region_channels() {
    let (mut device, sim) = abp_device(Region::eu868(), 1234);
    device.set_channel(3);
    device.set_channel(MULTI);
    assert_eq!(device.channel_mode(), ChannelMode::Multi);

    let mut used = HashSet::new();
    for _ in 0..30 {
        device.send_uplink(b"hop", false, 1).unwrap();
        device.update().unwrap();
        let frequency = sim.last_tx().unwrap().config.frequency;
        assert!(EU868_UPLINK.contains(&frequency));
        assert_eq!(frequency, EU868_UPLINK[device.channel() as usize]);
        used.insert(frequency);
    }
    assert!(used.len() > 1);
}

#[test]
fn test_fixed_channel() {
    let (mut device, sim) = abp_device(Region::eu868(), 99);
    device.set_channel(3);
    device.set_channel(9);
    assert_eq!(device.channel_mode(), ChannelMode::Fixed(3));

    for _ in 0..5 {
        device.send_uplink(b"fix", false, 1).unwrap();
        device.update().unwrap();
        assert_eq!(sim.last_tx().unwrap().config.frequency, 867_100_000);
    }
    assert_eq!(device.channel(), 3);
}

#[test]
fn test_init_restores_hopping() {
    let (mut device, _sim) = abp_device(Region::eu868(), 4);
    device.set_channel(3);
    assert_eq!(device.channel_mode(), ChannelMode::Fixed(3));
    device.init(4).unwrap();
    assert_eq!(device.channel_mode(), ChannelMode::Multi);
}

#[test]
fn test_same_seed_same_channel_sequence() {
    let sequence = |seed: u64| {
        let (mut device, sim) = abp_device(Region::eu868(), seed);
        for _ in 0..10 {
            device.send_uplink(b"seq", false, 1).unwrap();
            device.update().unwrap();
        }
        sim.transmissions()
            .iter()
            .map(|tx| tx.config.frequency)
            .collect::<Vec<_>>()
    };
    assert_eq!(sequence(5), sequence(5));
}

#[test]
fn test_tx_power_is_used() {
    let (mut device, sim) = abp_device(Region::eu868(), 0);
    device.set_tx_power(5);
    device.send_uplink(b"pwr", false, 1).unwrap();
    device.update().unwrap();
    assert_eq!(sim.last_tx().unwrap().config.power, 5);
}

#[test]
fn test_configure_abp_from_device_config() {
    let (radio, timer, _sim) = mock::setup();
    let mut device = LoRaWANDevice::new(radio, timer, Region::eu868());
    device.init(0).unwrap();

    let config = DeviceConfig::new_abp(
        DevAddr::new([0x26, 0x01, 0x1B, 0xDA]),
        AESKey::new([0x11; 16]),
        AESKey::new([0x22; 16]),
    );
    device.configure(&config);
    assert_eq!(device.dev_addr(), DevAddr::new([0x26, 0x01, 0x1B, 0xDA]));
    assert_eq!(device.session().app_skey, AESKey::new([0x22; 16]));
    assert_eq!(device.frame_counter_tx(), 0);
}
