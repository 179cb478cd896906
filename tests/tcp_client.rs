use heatmiser_lib::protocol::frame::{build_frame, READ_ACK};
use heatmiser_lib::protocol::{DeviceModel, RunMode, ScheduleMode, WriteIntent};
use heatmiser_lib::tcp::Thermostat;
use heatmiser_lib::Error;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

const PIN: u16 = 1234;

const READ_REQUEST: [u8; 11] = [0x93, 0x0B, 0x00, 0xD2, 0x04, 0x00, 0x00, 0xFF, 0xFF, 0x28, 0xB4];
const FROST_REQUEST: [u8; 12] = [
    0xA3, 0x0C, 0x00, 0xD2, 0x04, 0x01, 0x17, 0x00, 0x01, 0x01, 0x38, 0xDC,
];

/// DCB of a PRT-E in 7-day mode; `run_mode` lands at offset 23.
fn dcb(run_mode: u8) -> Vec<u8> {
    let mut dcb = vec![0u8; 64];
    dcb[0..2].copy_from_slice(&64u16.to_le_bytes());
    dcb[3] = 12;
    dcb[4] = 3;
    dcb[16] = 1;
    dcb[18] = 20;
    dcb[23] = run_mode;
    dcb[33..35].copy_from_slice(&0xFFFFu16.to_le_bytes());
    dcb[35..37].copy_from_slice(&0xFFFFu16.to_le_bytes());
    dcb[37..39].copy_from_slice(&198u16.to_le_bytes());
    dcb[41..48].copy_from_slice(&[13, 12, 25, 3, 19, 38, 1]);
    dcb
}

fn response(dcb: &[u8]) -> Vec<u8> {
    let mut payload = (dcb.len() as u16).to_le_bytes().to_vec();
    payload.extend_from_slice(dcb);
    build_frame(READ_ACK, 0, &payload).unwrap()
}

/// Accepts one connection per scripted reply and returns the requests it received.
fn mock_device(replies: Vec<Option<Vec<u8>>>) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let mut requests = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().unwrap();
            let mut prefix = [0u8; 3];
            stream.read_exact(&mut prefix).unwrap();
            let length = usize::from(u16::from_le_bytes([prefix[1], prefix[2]]));
            let mut request = vec![0u8; length];
            request[..3].copy_from_slice(&prefix);
            stream.read_exact(&mut request[3..]).unwrap();
            requests.push(request);
            match reply {
                Some(bytes) => stream.write_all(&bytes).unwrap(),
                // hold the connection open without answering
                None => std::thread::sleep(Duration::from_millis(500)),
            }
        }
        requests
    });
    (port, handle)
}

fn thermostat(port: u16) -> Thermostat {
    let mut thermostat = Thermostat::new("127.0.0.1", PIN);
    thermostat.set_port(port);
    thermostat.set_timeout(Duration::from_millis(200));
    thermostat
}

#[test]
fn read_device_decodes_status() {
    let (port, server) = mock_device(vec![Some(response(&dcb(0)))]);
    let mut thermostat = thermostat(port);

    let state = thermostat.read_device().unwrap();
    assert_eq!(state.model, DeviceModel::PrtE);
    assert_eq!(state.set_room_target, 20);
    assert_eq!(state.built_in_air_temperature, Some(19.8));
    assert_eq!(state.remote_air_temperature, None);
    assert_eq!(state.run_mode, RunMode::Heating);
    assert_eq!(thermostat.profile().unwrap().schedule_mode, ScheduleMode::SevenDay);

    assert_eq!(server.join().unwrap(), vec![READ_REQUEST.to_vec()]);
}

#[test]
fn write_device_reads_model_first() {
    let (port, server) = mock_device(vec![
        Some(response(&dcb(0))),
        Some(response(&dcb(1))),
    ]);
    let mut thermostat = thermostat(port);

    let intent: WriteIntent = r#"{"runmode": "frost_protection"}"#.parse().unwrap();
    let state = thermostat.write_device(&intent).unwrap();
    assert_eq!(state.run_mode, RunMode::FrostProtection);

    assert_eq!(
        server.join().unwrap(),
        vec![READ_REQUEST.to_vec(), FROST_REQUEST.to_vec()]
    );
}

#[test]
fn rejected_intent_sends_nothing() {
    let (port, server) = mock_device(vec![Some(response(&dcb(0)))]);
    let mut thermostat = thermostat(port);
    thermostat.read_device().unwrap();

    let intent: WriteIntent = r#"{"hotwater": {"on": true}}"#.parse().unwrap();
    assert!(matches!(
        thermostat.write_device(&intent),
        Err(Error::NotSupportedByModel { field: "hotwater", .. })
    ));
    assert_eq!(server.join().unwrap().len(), 1);
}

#[test]
fn empty_write_never_connects() {
    let (port, server) = mock_device(vec![]);
    let mut thermostat = thermostat(port);

    assert!(matches!(
        thermostat.write_device(&WriteIntent::default()),
        Err(Error::UnsupportedValue { .. })
    ));
    assert!(server.join().unwrap().is_empty());
    assert_eq!(thermostat.profile(), None);
}

#[test]
fn mistyped_intent_member_is_rejected() {
    let result = r#"{"heating": {"temp": 20}}"#.parse::<WriteIntent>();
    assert!(matches!(result, Err(Error::UnsupportedField(key)) if key == "heating.temp"));
}

#[test]
fn corrupted_response_is_rejected() {
    let mut reply = response(&dcb(0));
    reply[30] ^= 0xFF;
    let (port, server) = mock_device(vec![Some(reply)]);
    let mut thermostat = thermostat(port);

    assert!(matches!(
        thermostat.read_device(),
        Err(Error::ChecksumMismatch { .. })
    ));
    assert_eq!(thermostat.profile(), None);
    server.join().unwrap();
}

#[test]
fn silent_device_times_out() {
    let (port, server) = mock_device(vec![None]);
    let mut thermostat = thermostat(port);

    assert!(matches!(thermostat.read_device(), Err(Error::Timeout)));
    server.join().unwrap();
}

#[test]
fn refused_connection_is_reported() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut thermostat = thermostat(port);

    assert!(matches!(
        thermostat.read_device(),
        Err(Error::Connection(_))
    ));
}

#[cfg(feature = "tokio-tcp-async")]
mod tokio_client {
    use super::*;
    use heatmiser_lib::tokio_tcp_async;

    fn thermostat(port: u16) -> tokio_tcp_async::Thermostat {
        let mut thermostat = tokio_tcp_async::Thermostat::new("127.0.0.1", PIN);
        thermostat.set_port(port);
        thermostat.set_timeout(Duration::from_millis(200));
        thermostat
    }

    #[tokio::test]
    async fn set_run_mode_reads_then_writes() {
        let (port, server) = mock_device(vec![
            Some(response(&dcb(0))),
            Some(response(&dcb(1))),
        ]);
        let mut thermostat = thermostat(port);

        let state = thermostat
            .set_run_mode(RunMode::FrostProtection)
            .await
            .unwrap();
        assert_eq!(state.run_mode, RunMode::FrostProtection);
        assert_eq!(
            server.join().unwrap(),
            vec![READ_REQUEST.to_vec(), FROST_REQUEST.to_vec()]
        );
    }

    #[tokio::test]
    async fn retries_after_bad_reply() {
        let mut bad = response(&dcb(0));
        bad[0] = 0x00;
        let (port, server) = mock_device(vec![Some(bad), Some(response(&dcb(0)))]);
        let mut thermostat = thermostat(port);
        thermostat.set_retry(1);

        let state = thermostat.read_device().await.unwrap();
        assert_eq!(state.model, DeviceModel::PrtE);
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_write_never_connects() {
        let (port, server) = mock_device(vec![]);
        let mut thermostat = thermostat(port);

        assert!(matches!(
            thermostat.write_changes(&[]).await,
            Err(Error::UnsupportedValue { .. })
        ));
        assert!(server.join().unwrap().is_empty());
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let (port, server) = mock_device(vec![None]);
        let mut thermostat = thermostat(port);

        assert!(matches!(
            thermostat.read_device().await,
            Err(Error::Timeout)
        ));
        server.join().unwrap();
    }
}
