//! Station tests
//!
//! Device lifecycle, queued station commands and the receive pipeline,
//! observed through the scripted firmware and a recording station engine.

use bwfm_driver::backends::sim::{SimBus, SIM_MAC};
use bwfm_driver::device::Band;
use bwfm_driver::event::{
    build_bss_info, build_escan_results, build_event, ev, status, EventMsg, ETHERTYPE_PAE,
};
use bwfm_driver::fwvar::cmd;
use bwfm_driver::net80211::{Akm, Cipher, JoinTarget, RsnConfig, RsnProto};
use bwfm_driver::wire::{self, band, crypto_algo, wpa_auth, wsec, EventMask};
use bwfm_driver::{
    BwfmDevice, BwfmError, DriverConfig, KeyInfo, RecordingStation, StationState,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Device = BwfmDevice<SimBus, RecordingStation>;

const BSSID: [u8; 6] = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
const RSN_IE: [u8; 22] = [
    0x30, 0x14, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01,
    0x00, 0x00, 0x0f, 0xac, 0x02, 0x00, 0x00,
];

fn config() -> DriverConfig {
    DriverConfig::default().with_ctl_timeout(Duration::from_millis(200))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bwfm_driver=debug")
        .with_test_writer()
        .try_init();
}

fn device_with(station: RecordingStation) -> Device {
    init_tracing();
    BwfmDevice::new(SimBus::bcm4345(), station, config())
}

fn device() -> Device {
    device_with(RecordingStation::default())
}

fn open_target(ssid: &[u8]) -> JoinTarget {
    JoinTarget {
        ssid: ssid.to_vec(),
        bssid: BSSID,
        rsn: None,
    }
}

fn wpa2_target() -> JoinTarget {
    JoinTarget {
        rsn: Some(RsnConfig {
            ie: RSN_IE.to_vec(),
            protocols: vec![RsnProto::Rsn],
            akms: vec![Akm::Psk],
            pairwise: vec![Cipher::Ccmp],
            group: Cipher::Ccmp,
        }),
        ..open_target(b"lab")
    }
}

fn fw_var(dev: &Device, name: &str) -> Option<Vec<u8>> {
    dev.bus().firmware().var(name).map(<[u8]>::to_vec)
}

fn fw_int(dev: &Device, name: &str) -> Option<u32> {
    dev.bus().firmware().var_int(name)
}

fn event(event_type: u32, st: u32, reason: u32, data: &[u8]) -> Vec<u8> {
    build_event(&EventMsg::new(event_type, st, reason), data).to_vec()
}

fn ether_frame(ethertype: u16, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&SIM_MAC);
    frame.extend_from_slice(&BSSID);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

fn le32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(raw[at..at + 4].try_into().unwrap())
}

// ── Attach / init / stop ─────────────────────────────────────────────────────

#[test]
fn test_attach_reads_identity_and_bands() {
    let mut dev = device();
    let fw = dev.attach().expect("attach").clone();
    assert_eq!(fw.io_type, 1);
    assert_eq!(fw.mac, SIM_MAC);
    assert_eq!(fw.nmode, 1);
    assert_eq!(fw.vhtmode, 0);
    assert_eq!(fw.channels.len(), wire::CHANNELS_2GHZ.len() + wire::CHANNELS_5GHZ.len());
    assert_eq!(fw.channels.iter().filter(|c| c.band == Band::Ghz2).count(), 13);
    assert!(fw.channels.iter().all(|c| c.ht));
    assert_eq!(dev.firmware(), Some(&fw));
}

#[test]
fn test_attach_defaults_missing_modes_to_zero() {
    let mut dev = device();
    dev.bus_mut().firmware_mut().remove_var("nmode");
    dev.bus_mut().firmware_mut().fail_var("vhtmode", -1);
    let fw = dev.attach().expect("attach");
    assert_eq!(fw.nmode, 0);
    assert_eq!(fw.vhtmode, 0);
    assert!(fw.channels.iter().all(|c| !c.ht));
}

#[test]
fn test_attach_skips_unknown_band_and_caps_list() {
    let mut dev = device();
    let mut bands = Vec::new();
    for word in [4, 7, band::BAND_2G, band::BAND_5G] {
        bands.extend_from_slice(&u32::to_le_bytes(word));
    }
    dev.bus_mut().firmware_mut().set_cmd(cmd::GET_BANDLIST, &bands);
    let fw = dev.attach().expect("attach");
    // Only two entries fit; the unknown one is dropped.
    assert_eq!(fw.channels.len(), 13);
    assert!(fw.channels.iter().all(|c| c.band == Band::Ghz2));
}

#[test]
fn test_attach_requires_mac_address() {
    let mut dev = device();
    dev.bus_mut().firmware_mut().remove_var("cur_etheraddr");
    assert!(dev.attach().is_err());
    assert!(dev.firmware().is_none());
}

#[test]
fn test_init_programs_firmware_then_scans() {
    let mut dev = device();
    dev.init().expect("init");

    assert_eq!(fw_int(&dev, "mpc"), Some(1));
    assert_eq!(fw_var(&dev, "join_pref"), Some(wire::join_pref_params().to_vec()));

    let raw: [u8; 18] = fw_var(&dev, "event_msgs").unwrap().try_into().unwrap();
    let mask = EventMask::from_bytes(raw);
    for e in [ev::IF, ev::LINK, ev::ASSOC, ev::SET_SSID, ev::ESCAN_RESULT] {
        assert!(mask.is_enabled(e), "event {e}");
    }
    assert!(!mask.is_enabled(1));

    let fw = dev.bus().firmware();
    assert_eq!(fw.cmd_int(cmd::SET_SCAN_CHANNEL_TIME), Some(40));
    assert_eq!(fw.cmd_int(cmd::SET_SCAN_UNASSOC_TIME), Some(40));
    assert_eq!(fw.cmd_int(cmd::SET_SCAN_PASSIVE_TIME), Some(120));
    assert_eq!(fw.cmd_int(cmd::SET_PM), Some(2));
    assert_eq!(fw.cmd_int(cmd::UP), Some(0));
    assert_eq!(fw.cmd_int(cmd::SET_INFRA), Some(1));
    assert_eq!(fw.cmd_int(cmd::SET_AP), Some(0));
    for var in ["arp_ol", "arpoe", "ndoe", "toe", "sup_wpa"] {
        assert_eq!(fw.var_int(var), Some(0), "{var}");
    }
    assert_eq!(fw.var_int("txbf"), Some(1));
    assert!(dev.is_running());

    // SCAN is queued, not run inline.
    assert!(fw_var(&dev, "escan").is_none());
    assert_eq!(dev.queue().len(), 1);
    assert_eq!(dev.run_pending(), 1);
    assert_eq!(dev.state(), StationState::Scan);
    assert_eq!(fw_var(&dev, "escan"), Some(wire::escan_params().to_vec()));
    assert_eq!(
        dev.station().transitions,
        vec![(StationState::Init, StationState::Scan)]
    );
}

#[test]
fn test_init_stops_on_mandatory_failure() {
    let mut dev = device();
    dev.bus_mut().firmware_mut().fail_cmd(cmd::SET_PM, -1);
    let err = dev.init().unwrap_err();
    assert!(matches!(err, BwfmError::Firmware { cmd: c, .. } if c == cmd::SET_PM), "{err}");
    assert!(fw_int(&dev, "txbf").is_none());
    assert!(dev.queue().is_empty());
    assert!(!dev.is_running());
}

#[test]
fn test_init_tolerates_best_effort_failures() {
    let mut dev = device();
    dev.bus_mut().firmware_mut().fail_var("txbf", -23);
    dev.bus_mut().firmware_mut().fail_cmd(cmd::UP, -1);
    dev.bus_mut().firmware_mut().fail_var("toe", -23);
    dev.init().expect("init");
    assert_eq!(fw_int(&dev, "sup_wpa"), Some(0));
    assert_eq!(dev.queue().len(), 1);
}

#[test]
fn test_init_keeps_offloads_when_configured() {
    let config = DriverConfig {
        disable_offloads: false,
        ..config()
    };
    let mut dev = BwfmDevice::new(SimBus::bcm4345(), RecordingStation::default(), config);
    dev.init().expect("init");
    assert!(fw_int(&dev, "arp_ol").is_none());
    assert!(fw_int(&dev, "toe").is_none());
}

#[test]
fn test_stop_brings_interface_down() {
    let mut dev = device();
    dev.init().expect("init");
    dev.run_pending();
    dev.stop().expect("stop");
    assert!(!dev.is_running());
    assert_eq!(dev.bus().firmware().cmd_int(cmd::DOWN), Some(1));
    assert_eq!(dev.bus().firmware().cmd_int(cmd::SET_PM), Some(0));
    dev.run_pending();
    assert_eq!(dev.state(), StationState::Init);
    assert_eq!(
        dev.station().transitions.last(),
        Some(&(StationState::Scan, StationState::Init))
    );
}

#[test]
fn test_stop_ignores_firmware_errors() {
    let mut dev = device();
    dev.bus_mut().firmware_mut().fail_cmd(cmd::DOWN, -1);
    dev.stop().expect("stop");
    assert_eq!(dev.queue().len(), 1);
}

// ── Connect / scan ───────────────────────────────────────────────────────────

#[test]
fn test_connect_open_network() {
    let mut dev = device_with(RecordingStation::with_target(open_target(b"lab")));
    dev.new_state(StationState::Auth, 0).expect("queue");
    dev.run_pending();

    assert_eq!(fw_int(&dev, "wpa_auth"), Some(wpa_auth::DISABLED));
    assert_eq!(fw_int(&dev, "wsec"), Some(wsec::NONE));
    assert_eq!(fw_int(&dev, "auth"), Some(wire::AUTH_OPEN));
    assert_eq!(fw_int(&dev, "mfp"), Some(wire::MFP_NONE));
    assert!(fw_var(&dev, "wpaie").is_none());

    let join = fw_var(&dev, "join").expect("join");
    assert_eq!(join.len(), wire::EXT_JOIN_PARAMS_LEN);
    assert_eq!(join, wire::ext_join_params(b"lab", &BSSID).to_vec());
    assert_eq!(le32(&join, 0), 3);
    assert_eq!(&join[4..7], b"lab");
    assert!(dev.bus().firmware().cmd_value(cmd::SET_SSID).is_none());
    assert_eq!(dev.state(), StationState::Auth);
}

#[test]
fn test_connect_wpa2_programs_security() {
    let mut dev = device_with(RecordingStation::with_target(wpa2_target()));
    dev.connect().expect("connect");
    assert_eq!(fw_var(&dev, "wpaie"), Some(RSN_IE.to_vec()));
    assert_eq!(fw_int(&dev, "wpa_auth"), Some(wpa_auth::WPA2_PSK));
    assert_eq!(fw_int(&dev, "wsec"), Some(wsec::AES));
    assert_eq!(fw_int(&dev, "auth"), Some(0));
    assert_eq!(fw_int(&dev, "mfp"), Some(0));

    let names = dev.bus().firmware().set_var_names();
    assert_eq!(names, vec!["wpaie", "wpa_auth", "wsec", "auth", "mfp", "join"]);
}

#[test]
fn test_connect_falls_back_to_set_ssid() {
    let mut dev = device_with(RecordingStation::with_target(open_target(b"fallback")));
    dev.bus_mut().firmware_mut().fail_var("join", -23);
    dev.connect().expect("connect");
    let params = dev.bus().firmware().cmd_value(cmd::SET_SSID).expect("SET_SSID");
    assert_eq!(params.len(), wire::JOIN_PARAMS_LEN);
    assert_eq!(params, &wire::join_params(b"fallback", &BSSID)[..]);
    assert_eq!(&params[36..42], &BSSID);
}

#[test]
fn test_connect_skips_join_for_unusable_ssid() {
    for ssid in [&[][..], &[b'x'; 32][..]] {
        let mut dev = device_with(RecordingStation::with_target(open_target(ssid)));
        dev.connect().expect("connect");
        assert_eq!(fw_int(&dev, "mfp"), Some(0));
        assert!(fw_var(&dev, "join").is_none());
        assert!(dev.bus().firmware().cmd_value(cmd::SET_SSID).is_none());
    }
}

#[test]
fn test_connect_without_target() {
    let mut dev = device();
    let err = dev.connect().unwrap_err();
    assert!(matches!(err, BwfmError::InvalidState { .. }), "{err}");
}

#[test]
fn test_failed_connect_still_changes_state() {
    let mut dev = device_with(RecordingStation::with_target(open_target(b"lab")));
    dev.bus_mut().firmware_mut().fail_var("auth", -1);
    dev.new_state(StationState::Auth, 0).unwrap();
    dev.run_pending();
    assert_eq!(dev.state(), StationState::Auth);
    assert!(fw_var(&dev, "join").is_none());
}

#[test]
fn test_scan_request_parameters() {
    let mut dev = device();
    dev.scan().expect("scan");
    let params = fw_var(&dev, "escan").expect("escan");
    assert_eq!(params.len(), wire::ESCAN_PARAMS_LEN);
    assert_eq!(le32(&params, 0), wire::ESCAN_REQ_VERSION);
    assert_eq!(&params[44..50], &wire::ETHER_BROADCAST);
}

// ── Keys ─────────────────────────────────────────────────────────────────────

fn key(id: u8, cipher: Cipher, group: bool, peer: [u8; 6]) -> KeyInfo {
    KeyInfo {
        id,
        cipher,
        key: vec![0xaa; 16],
        group,
        peer,
    }
}

#[test]
fn test_pairwise_key_installed_from_worker_context() {
    let mut dev = device();
    dev.set_key(key(0, Cipher::Ccmp, false, BSSID)).expect("queue");
    assert!(fw_var(&dev, "wsec_key").is_none());
    assert_eq!(dev.run_pending(), 1);

    let rec = fw_var(&dev, "wsec_key").expect("wsec_key");
    assert_eq!(rec.len(), wire::WSEC_KEY_LEN);
    assert_eq!(le32(&rec, 0), 0);
    assert_eq!(le32(&rec, 4), 16);
    assert_eq!(&rec[8..24], &[0xaa; 16]);
    assert_eq!(le32(&rec, 112), crypto_algo::AES_CCM);
    assert_eq!(le32(&rec, 116), 0);
    assert_eq!(&rec[156..162], &BSSID);
    assert_eq!(fw_int(&dev, "wsec"), Some(wsec::AES));
}

#[test]
fn test_group_key_is_primary_without_address() {
    let mut dev = device();
    dev.bus_mut().firmware_mut().set_var_int("wsec", wsec::AES);
    dev.set_key(key(1, Cipher::Tkip, true, BSSID)).unwrap();
    dev.run_pending();

    let rec = fw_var(&dev, "wsec_key").unwrap();
    assert_eq!(le32(&rec, 0), 1);
    assert_eq!(le32(&rec, 112), crypto_algo::TKIP);
    assert_eq!(le32(&rec, 116), wire::WSEC_PRIMARY_KEY);
    assert_eq!(&rec[156..162], &[0; 6]);
    assert_eq!(fw_int(&dev, "wsec"), Some(wsec::AES | wsec::TKIP));
}

#[test]
fn test_wep_key_is_primary() {
    let mut dev = device();
    dev.set_key(key(2, Cipher::Wep104, false, BSSID)).unwrap();
    dev.run_pending();
    let rec = fw_var(&dev, "wsec_key").unwrap();
    assert_eq!(le32(&rec, 112), crypto_algo::WEP128);
    assert_eq!(le32(&rec, 116), wire::WSEC_PRIMARY_KEY);
    assert_eq!(&rec[156..162], &[0; 6]);
    assert_eq!(fw_int(&dev, "wsec"), Some(wsec::WEP));
}

#[test]
fn test_pairwise_key_for_multicast_peer_has_no_address() {
    let mut dev = device();
    dev.set_key(key(0, Cipher::Ccmp, false, [0x01, 0, 0x5e, 0, 0, 1])).unwrap();
    dev.run_pending();
    let rec = fw_var(&dev, "wsec_key").unwrap();
    assert_eq!(le32(&rec, 116), 0);
    assert_eq!(&rec[156..162], &[0; 6]);
}

#[test]
fn test_unsupported_cipher_is_skipped() {
    let mut dev = device();
    dev.set_key(key(4, Cipher::Bip, true, BSSID)).unwrap();
    assert_eq!(dev.run_pending(), 1);
    assert!(fw_var(&dev, "wsec_key").is_none());
    assert!(dev.bus().firmware().var_writes("wsec").is_empty());
}

#[test]
fn test_delete_key_clears_slot() {
    let mut dev = device();
    dev.delete_key(key(2, Cipher::Ccmp, true, BSSID)).unwrap();
    dev.run_pending();
    let rec = fw_var(&dev, "wsec_key").unwrap();
    assert_eq!(le32(&rec, 0), 2);
    assert_eq!(le32(&rec, 4), 0);
    assert_eq!(le32(&rec, 112), 0);
    assert_eq!(le32(&rec, 116), wire::WSEC_PRIMARY_KEY);
}

#[test]
fn test_full_ring_rejects_commands() {
    let config = config().with_cmd_ring_capacity(2);
    let dev = BwfmDevice::new(SimBus::bcm4345(), RecordingStation::default(), config);
    dev.set_key(key(0, Cipher::Ccmp, false, BSSID)).unwrap();
    dev.new_state(StationState::Scan, 0).unwrap();
    let err = dev.delete_key(key(0, Cipher::Ccmp, false, BSSID)).unwrap_err();
    assert!(matches!(err, BwfmError::QueueFull { capacity: 2 }), "{err}");
}

#[test]
fn test_commands_run_in_order() {
    let mut dev = device_with(RecordingStation::with_target(open_target(b"lab")));
    dev.new_state(StationState::Scan, 0).unwrap();
    dev.new_state(StationState::Auth, 0).unwrap();
    dev.new_state(StationState::Run, 0).unwrap();
    assert_eq!(dev.run_pending(), 3);
    assert_eq!(
        dev.station().transitions,
        vec![
            (StationState::Init, StationState::Scan),
            (StationState::Scan, StationState::Auth),
            (StationState::Auth, StationState::Run),
        ]
    );
}

// ── Receive path ─────────────────────────────────────────────────────────────

#[test]
fn test_escan_results_become_beacons() {
    let ie = [0x00, 0x03, b'o', b'n', b'e'];
    let first = build_bss_info(BSSID, b"one", -42, &ie);
    let second = build_bss_info([0x02, 0, 0, 0, 0, 2], b"two", -70, &[]);
    let data = build_escan_results(&[first, second]);

    let mut dev = device();
    dev.rx(&event(ev::ESCAN_RESULT, status::PARTIAL, 0, &data));

    let beacons = &dev.station().beacons;
    assert_eq!(beacons.len(), 2);
    let (frame, rssi) = &beacons[0];
    assert_eq!(*rssi, -42);
    assert_eq!(frame[0], 0x80);
    assert_eq!(&frame[4..10], &[0xff; 6]);
    assert_eq!(&frame[10..16], &BSSID);
    assert_eq!(&frame[16..22], &BSSID);
    assert_eq!(u16::from_le_bytes([frame[32], frame[33]]), 100);
    assert_eq!(&frame[36..], &ie);
    assert_eq!(beacons[1].1, -70);
    assert_eq!(beacons[1].0.len(), 36);
    assert_eq!(dev.station().scans_done, 0);

    dev.rx(&event(ev::ESCAN_RESULT, status::SUCCESS, 0, &[]));
    assert_eq!(dev.station().scans_done, 1);
}

#[test]
fn test_escan_with_overlong_buflen_is_dropped() {
    let data = build_escan_results(&[build_bss_info(BSSID, b"one", -42, &[])]);
    let mut data = data.to_vec();
    let bogus = u32::try_from(data.len() + 1).unwrap();
    data[..4].copy_from_slice(&bogus.to_le_bytes());

    let mut dev = device();
    dev.rx(&event(ev::ESCAN_RESULT, status::PARTIAL, 0, &data));
    assert!(dev.station().beacons.is_empty());
    assert_eq!(dev.station().scans_done, 0);
}

#[test]
fn test_escan_record_with_bad_ies_is_skipped() {
    let mut bad = build_bss_info(BSSID, b"one", -42, &[0; 4]).to_vec();
    // IE length runs past the record.
    bad[120..124].copy_from_slice(&64u32.to_le_bytes());
    let good = build_bss_info([0x02, 0, 0, 0, 0, 2], b"two", -60, &[]);
    let data = build_escan_results(&[bad.as_slice().into(), good]);

    let mut dev = device();
    dev.rx(&event(ev::ESCAN_RESULT, status::PARTIAL, 0, &data));
    assert_eq!(dev.station().beacons.len(), 1);
    assert_eq!(dev.station().beacons[0].1, -60);
}

#[test]
fn test_events_drive_state_machine() {
    let cases = [
        (ev::SET_SSID, status::SUCCESS, 0, Some(StationState::Run)),
        (ev::SET_SSID, 1, 0, Some(StationState::Scan)),
        (ev::ASSOC, status::SUCCESS, 0, Some(StationState::Assoc)),
        (ev::ASSOC, 3, 0, Some(StationState::Scan)),
        (ev::LINK, status::SUCCESS, 0, None),
        (ev::LINK, status::SUCCESS, 1, Some(StationState::Scan)),
        (ev::LINK, 1, 0, Some(StationState::Scan)),
        (ev::IF, status::SUCCESS, 0, None),
    ];
    for (event_type, st, reason, expect) in cases {
        let mut dev = device();
        dev.rx(&event(event_type, st, reason, &[]));
        dev.run_pending();
        let got = dev.station().state();
        assert_eq!(got, expect, "event {event_type} status {st} reason {reason}");
    }
}

#[test]
fn test_failed_join_triggers_rescan() {
    let mut dev = device();
    dev.rx(&event(ev::SET_SSID, 1, 0, &[]));
    dev.run_pending();
    assert_eq!(dev.bus().firmware().var_writes("escan").len(), 1);
}

#[test]
fn test_out_of_range_event_ignored() {
    let mut dev = device();
    dev.rx(&event(200, status::SUCCESS, 0, &[]));
    assert!(dev.queue().is_empty());
    assert!(dev.station().data.is_empty());
}

#[test]
fn test_truncated_event_dropped() {
    let mut dev = device();
    let frame = event(ev::SET_SSID, status::SUCCESS, 0, &[]);
    dev.rx(&frame[..40]);
    assert!(dev.queue().is_empty());
    assert!(dev.station().data.is_empty());
}

#[test]
fn test_eapol_routed_only_when_rsn_active() {
    let eapol = ether_frame(ETHERTYPE_PAE, &[0x02, 0x03, 0x00, 0x5f]);
    let ip = ether_frame(0x0800, &[0x45, 0x00]);

    let mut dev = device_with(RecordingStation::with_target(wpa2_target()));
    dev.rx(&eapol);
    dev.rx(&ip);
    assert_eq!(dev.station().eapol, vec![eapol.clone()]);
    assert_eq!(dev.station().data, vec![ip.clone()]);

    let mut dev = device_with(RecordingStation::with_target(open_target(b"lab")));
    dev.rx(&eapol);
    assert!(dev.station().eapol.is_empty());
    assert_eq!(dev.station().data, vec![eapol]);
}

#[test]
fn test_events_never_reach_data_path() {
    let mut dev = device();
    dev.rx(&event(ev::IF, status::SUCCESS, 0, &[]));
    dev.rx(&event(ev::ESCAN_RESULT, status::SUCCESS, 0, &[]));
    assert!(dev.station().data.is_empty());
}

// ── Worker ───────────────────────────────────────────────────────────────────

#[test]
fn test_worker_runs_queued_commands() {
    let dev = Arc::new(Mutex::new(device()));
    let worker = Device::spawn_worker(&dev).expect("spawn");

    dev.lock()
        .unwrap()
        .set_key(key(0, Cipher::Ccmp, false, BSSID))
        .expect("queue");

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if fw_var(&dev.lock().unwrap(), "wsec_key").is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "worker never ran the command");
        std::thread::sleep(Duration::from_millis(5));
    }
    drop(worker);
    assert!(dev.lock().unwrap().queue().is_empty());
}

#[test]
fn test_dropping_worker_while_device_locked_returns() {
    let dev = Arc::new(Mutex::new(device()));
    let worker = Device::spawn_worker(&dev).expect("spawn");

    let guard = dev.lock().unwrap();
    guard
        .set_key(key(0, Cipher::Ccmp, false, BSSID))
        .expect("queue");
    // The worker is now waiting for the device lock held here.
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        drop(worker);
        let _ = tx.send(());
    });
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    drop(guard);
}

#[test]
fn test_worker_join_after_release() {
    let dev = Arc::new(Mutex::new(device()));
    let worker = Device::spawn_worker(&dev).expect("spawn");
    dev.lock()
        .unwrap()
        .new_state(StationState::Init, -1)
        .expect("queue");
    worker.join().expect("join");
    assert!(!dev.lock().unwrap().queue().wait_for_work());
}
