//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snp_common::config::{SensorBurstMode, SensorEmitterConfig};
use snp_wire::{SensorPacket, Value, ValueType, SENSOR_PACKET_LEN};
use tracing::{debug, info};

use crate::endpoint::DatagramHandler;
use crate::transport::Transport;
use crate::Result;

/// Sensor ids drawn in randomized mode.
pub const NR_SENSORS: u8 = 10;

/// `(type, max value)` pairs drawn in randomized mode.
pub const RANDOM_VALUE_SELECTION: [(ValueType, u64); 3] = [
    (ValueType::Int8, i8::MAX as u64),
    (ValueType::Int32, i32::MAX as u64),
    (ValueType::UInt64, u64::MAX),
];

enum BurstSource {
    Counter { sensor_id: u8 },
    Randomized(StdRng),
}

/// Sends one burst of sensor packets as soon as its socket is ready.
pub struct SensorEmitter {
    destination: SocketAddr,
    burst_len: u32,
    source: BurstSource,
}

impl SensorEmitter {
    /// Counter burst: `burst_len` packets of `FIELD_INT32` values `0..burst_len`.
    ///
    /// The count stops at `i32::MAX` rather than wrapping negative.
    pub fn counter(destination: SocketAddr, sensor_id: u8, burst_len: u32) -> Self {
        Self {
            destination,
            burst_len,
            source: BurstSource::Counter { sensor_id },
        }
    }

    /// Randomized burst seeded for reproducibility.
    pub fn randomized(destination: SocketAddr, burst_len: u32, seed: u64) -> Self {
        Self {
            destination,
            burst_len,
            source: BurstSource::Randomized(StdRng::seed_from_u64(seed)),
        }
    }

    /// Build the emitter described by `config`.
    pub fn from_config(config: &SensorEmitterConfig) -> Self {
        match config.mode {
            SensorBurstMode::Counter => {
                Self::counter(config.destination, config.sensor_id, config.burst_len)
            }
            SensorBurstMode::Randomized => {
                Self::randomized(config.destination, config.burst_len, config.seed)
            }
        }
    }

    /// Where packets are sent.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Produce the next burst of packets.
    pub fn burst(&mut self) -> Vec<SensorPacket> {
        let burst_len = self.burst_len;
        match &mut self.source {
            BurstSource::Counter { sensor_id } => (0..burst_len)
                .map_while(|n| i32::try_from(n).ok())
                .map(|n| SensorPacket::new(*sensor_id, Value::Int32(n)))
                .collect(),
            BurstSource::Randomized(rng) => (0..burst_len).map(|_| random_packet(rng)).collect(),
        }
    }
}

fn random_packet(rng: &mut StdRng) -> SensorPacket {
    let sensor_id = rng.gen_range(0..NR_SENSORS);
    let (value_type, max) = RANDOM_VALUE_SELECTION[rng.gen_range(0..RANDOM_VALUE_SELECTION.len())];
    let raw = rng.gen_range(0..=max);
    let value = match value_type {
        ValueType::Int8 => Value::Int8(raw as i8),
        ValueType::Int32 => Value::Int32(raw as i32),
        _ => Value::UInt64(raw),
    };
    SensorPacket::new(sensor_id, value)
}

impl DatagramHandler for SensorEmitter {
    fn name(&self) -> &'static str {
        "sensor_emitter"
    }

    fn on_ready(&mut self, transport: &dyn Transport) -> Result<Option<Duration>> {
        let packets = self.burst();
        for packet in &packets {
            debug!(len = SENSOR_PACKET_LEN, %packet, "sending sensor packet");
            transport.send_to(&packet.encode(), self.destination)?;
        }
        info!(count = packets.len(), destination = %self.destination, "sensor burst sent");
        Ok(None)
    }

    fn on_datagram(
        &mut self,
        payload: &[u8],
        source: SocketAddr,
        _transport: &dyn Transport,
    ) -> Result<()> {
        debug!(len = payload.len(), %source, "received data on sensor socket, discarding");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use crate::HarnessError;

    fn destination() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    #[test]
    fn ready_sends_ten_int32_packets_in_order() {
        let transport = InMemoryTransport::new();
        let mut emitter = SensorEmitter::counter(destination(), 1, 10);

        let next = emitter.on_ready(&transport).expect("burst sent");
        assert_eq!(next, None, "burst is one-shot");

        let sent = transport.sent();
        assert_eq!(sent.len(), 10);
        for (n, datagram) in sent.iter().enumerate() {
            assert_eq!(datagram.destination, destination());
            assert_eq!(datagram.payload.len(), SENSOR_PACKET_LEN);
            let packet = SensorPacket::decode(&datagram.payload);
            assert_eq!(packet.sensor_id, 1);
            assert_eq!(packet.value_type, ValueType::Int32.code());
            assert_eq!(packet.read_as(ValueType::Int32), Value::Int32(n as i32));
        }
    }

    #[test]
    fn send_failure_propagates_to_caller() {
        let transport = InMemoryTransport::new();
        transport.set_failing(true);
        let mut emitter = SensorEmitter::counter(destination(), 1, 10);
        assert!(matches!(
            emitter.on_ready(&transport),
            Err(HarnessError::TransportUnavailable(_))
        ));
    }

    #[test]
    fn inbound_datagrams_are_discarded() {
        let transport = InMemoryTransport::new();
        let mut emitter = SensorEmitter::counter(destination(), 1, 10);
        emitter
            .on_datagram(&[1, 2, 3], destination(), &transport)
            .expect("discard");
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn randomized_burst_stays_within_selection() {
        let mut emitter = SensorEmitter::randomized(destination(), 64, 7);
        let burst = emitter.burst();
        assert_eq!(burst.len(), 64);
        for packet in &burst {
            assert!(packet.sensor_id < NR_SENSORS);
            let value = packet.value().expect("known type");
            match value {
                Value::Int8(v) => assert!(v >= 0),
                Value::Int32(v) => assert!(v >= 0),
                Value::UInt64(_) => {}
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn randomized_bursts_are_reproducible_per_seed() {
        let a = SensorEmitter::randomized(destination(), 16, 99).burst();
        let b = SensorEmitter::randomized(destination(), 16, 99).burst();
        assert_eq!(a, b);
    }

    #[test]
    fn config_selects_burst_mode() {
        let config = SensorEmitterConfig {
            burst_len: 3,
            ..SensorEmitterConfig::default()
        };
        let mut emitter = SensorEmitter::from_config(&config);
        assert_eq!(emitter.destination(), destination());
        let values: Vec<Value> = emitter
            .burst()
            .iter()
            .map(|p| p.read_as(ValueType::Int32))
            .collect();
        assert_eq!(values, vec![Value::Int32(0), Value::Int32(1), Value::Int32(2)]);
    }
}
