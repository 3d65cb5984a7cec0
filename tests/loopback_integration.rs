//! ---
//! snp_section: "05-testing"
//! snp_subsection: "integration-tests"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Loopback UDP tests driving emitters against the station."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use snp_common::config::{DecodeMode, RequestCycle};
use snp_harness::{
    EmitterState, Endpoint, EndpointStats, Reading, RequestEmitter, SensorEmitter, SensorStation,
    SharedStation, StationRequestPort, StationSensorPort, StopReason,
};
use snp_wire::{QueryType, RequestPacket, SensorPacket, Value, ValueType};
use tokio::net::UdpSocket;
use tokio::sync::watch;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn stopped(rx: &watch::Receiver<bool>) -> impl std::future::Future<Output = ()> {
    let mut rx = rx.clone();
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

struct StationPorts {
    station: SharedStation,
    sensor_addr: SocketAddr,
    request_addr: SocketAddr,
    sensor_stats: Arc<EndpointStats>,
    sensors: Endpoint<StationSensorPort>,
    requests: Endpoint<StationRequestPort>,
}

async fn bind_station(station: SensorStation) -> StationPorts {
    let station = station.into_shared();
    let sensors = Endpoint::bind(loopback(), StationSensorPort::new(station.clone()))
        .await
        .expect("bind sensor port");
    let requests = Endpoint::bind(loopback(), StationRequestPort::new(station.clone()))
        .await
        .expect("bind request port");
    StationPorts {
        station,
        sensor_addr: sensors.local_addr().expect("sensor addr"),
        request_addr: requests.local_addr().expect("request addr"),
        sensor_stats: sensors.stats(),
        sensors,
        requests,
    }
}

async fn query(client: &UdpSocket, station: SocketAddr, query: QueryType) -> SensorPacket {
    client
        .send_to(&RequestPacket::for_query(1, query).encode(), station)
        .await
        .expect("send request");
    let mut buf = [0u8; 64];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
        .await
        .expect("reply in time")
        .expect("recv reply");
    assert_eq!(len, 10);
    SensorPacket::decode(&buf[..len])
}

#[tokio::test]
async fn counter_burst_lands_in_station_history() {
    let ports = bind_station(SensorStation::new(10)).await;
    let emitter = Endpoint::bind(loopback(), SensorEmitter::counter(ports.sensor_addr, 1, 10))
        .await
        .expect("bind emitter");
    let (stop_tx, stop_rx) = watch::channel(false);

    let station = ports.station.clone();
    let sensor_addr = ports.sensor_addr;
    let request_addr = ports.request_addr;
    let sensor_stats = ports.sensor_stats.clone();
    let checks = async move {
        wait_until("ten readings", || {
            station.lock().history(1).map(|h| h.count()) == Some(10)
        })
        .await;

        let client = UdpSocket::bind(loopback()).await.expect("client");
        let last = query(&client, request_addr, QueryType::LastValue).await;
        assert_eq!(last, SensorPacket::new(1, Value::Int32(9)));
        let recent = query(&client, request_addr, QueryType::MeanLast10).await;
        assert_eq!(recent.read_as(ValueType::Double), Value::Double(4.5));
        let all = query(&client, request_addr, QueryType::MeanAll).await;
        assert_eq!(all.read_as(ValueType::Double), Value::Double(4.5));

        // wrong-sized datagrams are received but dropped
        client
            .send_to(&[1, 3, 0, 0], sensor_addr)
            .await
            .expect("send short packet");
        wait_until("short packet", || sensor_stats.snapshot().received == 11).await;
        assert_eq!(station.lock().history(1).map(|h| h.count()), Some(10));
        assert_eq!(sensor_stats.snapshot().failed, 0);

        let _ = stop_tx.send(true);
    };

    let (emitter, sensors, requests, ()) = tokio::join!(
        emitter.run(stopped(&stop_rx)),
        ports.sensors.run(stopped(&stop_rx)),
        ports.requests.run(stopped(&stop_rx)),
        checks,
    );
    emitter.expect("emitter run");
    sensors.expect("sensor port run");
    requests.expect("request port run");
}

#[tokio::test]
async fn request_emitter_walks_queries_and_stops() {
    let mut seeded = SensorStation::new(10);
    for value in [2.0f64, 4.0] {
        seeded
            .record(&SensorPacket::new(1, Value::Double(value)))
            .expect("seed reading");
    }
    let ports = bind_station(seeded).await;

    let period = Duration::from_millis(20);
    let emitter = Endpoint::bind(
        loopback(),
        RequestEmitter::new(ports.request_addr, 1, period, RequestCycle::Once, DecodeMode::Typed),
    )
    .await
    .expect("bind request emitter");
    let emitter_stats = emitter.stats();
    let (stop_tx, stop_rx) = watch::channel(false);

    let waiter = async move {
        wait_until("three replies", || emitter_stats.snapshot().received == 3).await;
        // leave room for the exhausting tick
        tokio::time::sleep(period * 3).await;
        assert_eq!(emitter_stats.snapshot().sent, 3);
        let _ = stop_tx.send(true);
    };

    let (emitter, sensors, requests, ()) = tokio::join!(
        emitter.run(stopped(&stop_rx)),
        ports.sensors.run(stopped(&stop_rx)),
        ports.requests.run(stopped(&stop_rx)),
        waiter,
    );
    let emitter = emitter.expect("emitter run");
    sensors.expect("sensor port run");
    requests.expect("request port run");

    assert_eq!(
        emitter.state(),
        EmitterState::Stopped(StopReason::SequenceExhausted)
    );
    assert_eq!(emitter.readings(), 3);
    // the MEAN_ALL reply arrives last; raw u64 reinterpretation of the doubles
    let expected = (2.0f64.to_bits() as f64 + 4.0f64.to_bits() as f64) / 2.0;
    assert_eq!(
        emitter.last_reading(),
        Some((1, Reading::Typed(Value::Double(expected))))
    );
}

#[tokio::test]
async fn unknown_sensor_gets_emergency_reply() {
    let ports = bind_station(SensorStation::new(10)).await;
    let (stop_tx, stop_rx) = watch::channel(false);
    let request_addr = ports.request_addr;

    let checks = async move {
        let client = UdpSocket::bind(loopback()).await.expect("client");
        let reply = query(&client, request_addr, QueryType::MeanAll).await;
        assert_eq!(reply.value(), Ok(Value::Emcy));
        let _ = stop_tx.send(true);
    };

    let (sensors, requests, ()) = tokio::join!(
        ports.sensors.run(stopped(&stop_rx)),
        ports.requests.run(stopped(&stop_rx)),
        checks,
    );
    sensors.expect("sensor port run");
    requests.expect("request port run");
}
