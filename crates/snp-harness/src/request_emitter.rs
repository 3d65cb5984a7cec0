//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! Periodic query sender that also decodes the readings sent back.
//!
//! ```text
//! Idle --ready--> Scheduled --tick ok--> Scheduled
//!                     |
//!                     +--exhausted / send failed--> Stopped
//! ```
//! Inbound decoding is independent of the schedule state.
use std::net::SocketAddr;
use std::time::Duration;

use snp_common::config::{DecodeMode, RequestCycle, RequestEmitterConfig};
use snp_wire::{QueryType, RequestPacket, SensorPacket, Value, ValueType, REQUEST_PACKET_LEN};
use strum::{EnumCount, IntoEnumIterator};
use tracing::{debug, info, warn};

use crate::endpoint::DatagramHandler;
use crate::transport::Transport;
use crate::Result;

/// Why the request schedule stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A one-shot query sequence ran out.
    SequenceExhausted,
    /// The transport refused a request.
    SendFailed,
}

/// Schedule state of a [`RequestEmitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Waiting for the socket.
    Idle,
    /// A tick is armed.
    Scheduled,
    /// No further ticks will be armed.
    Stopped(StopReason),
}

/// Query types in wire order, once or cycling.
#[derive(Debug, Clone)]
pub struct QuerySequence {
    cycle: RequestCycle,
    position: usize,
}

impl QuerySequence {
    /// Start a sequence at `LAST_VALUE`.
    pub fn new(cycle: RequestCycle) -> Self {
        Self { cycle, position: 0 }
    }
}

impl Iterator for QuerySequence {
    type Item = QueryType;

    fn next(&mut self) -> Option<QueryType> {
        let index = match self.cycle {
            RequestCycle::Once if self.position >= QueryType::COUNT => return None,
            RequestCycle::Once => self.position,
            RequestCycle::Repeat => self.position % QueryType::COUNT,
        };
        self.position = self.position.saturating_add(1);
        QueryType::iter().nth(index)
    }
}

/// Interpretation of an inbound sensor packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Value bytes read as `u64` (legacy path, any type other than `FIELD_DOUBLE`).
    Unsigned(u64),
    /// Value bytes read as `f64` (legacy path, `FIELD_DOUBLE`).
    Double(f64),
    /// Checked dispatch on the packet type.
    Typed(Value),
    /// Typed mode met a code outside the protocol table.
    UnknownType(u8),
}

impl Reading {
    /// Interpret `packet` according to `mode`.
    pub fn interpret(packet: &SensorPacket, mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Legacy if packet.value_type == ValueType::Double.code() => {
                Reading::Double(packet.raw_f64())
            }
            DecodeMode::Legacy => Reading::Unsigned(packet.raw_u64()),
            DecodeMode::Typed => match packet.value() {
                Ok(value) => Reading::Typed(value),
                Err(_) => Reading::UnknownType(packet.value_type),
            },
        }
    }
}

/// Sends one query per period and logs every sensor packet received.
pub struct RequestEmitter {
    destination: SocketAddr,
    sensor_id: u8,
    period: Duration,
    decode: DecodeMode,
    sequence: QuerySequence,
    state: EmitterState,
    last_reading: Option<(u8, Reading)>,
    readings: u64,
}

impl RequestEmitter {
    /// Emitter querying `sensor_id` at `destination` once per `period`.
    pub fn new(
        destination: SocketAddr,
        sensor_id: u8,
        period: Duration,
        cycle: RequestCycle,
        decode: DecodeMode,
    ) -> Self {
        Self {
            destination,
            sensor_id,
            period,
            decode,
            sequence: QuerySequence::new(cycle),
            state: EmitterState::Idle,
            last_reading: None,
            readings: 0,
        }
    }

    /// Build the emitter described by `config`.
    pub fn from_config(config: &RequestEmitterConfig) -> Self {
        Self::new(
            config.destination,
            config.sensor_id,
            config.period,
            config.cycle,
            config.decode,
        )
    }

    /// Current schedule state.
    pub fn state(&self) -> EmitterState {
        self.state
    }

    /// Sensor id and interpretation of the most recent inbound packet.
    pub fn last_reading(&self) -> Option<(u8, Reading)> {
        self.last_reading
    }

    /// Number of inbound packets decoded.
    pub fn readings(&self) -> u64 {
        self.readings
    }

    fn stop(&mut self, reason: StopReason) {
        self.state = EmitterState::Stopped(reason);
        info!(reason = ?reason, "request schedule stopped");
    }
}

impl DatagramHandler for RequestEmitter {
    fn name(&self) -> &'static str {
        "request_emitter"
    }

    fn on_ready(&mut self, _transport: &dyn Transport) -> Result<Option<Duration>> {
        self.state = EmitterState::Scheduled;
        debug!(period_ms = self.period.as_millis() as u64, "request schedule armed");
        Ok(Some(self.period))
    }

    fn on_timer(&mut self, transport: &dyn Transport) -> Result<Option<Duration>> {
        if self.state != EmitterState::Scheduled {
            return Ok(None);
        }
        let Some(query) = self.sequence.next() else {
            self.stop(StopReason::SequenceExhausted);
            return Ok(None);
        };

        let packet = RequestPacket::for_query(self.sensor_id, query);
        debug!(len = REQUEST_PACKET_LEN, %packet, query = %query, "sending request packet");
        if let Err(err) = transport.send_to(&packet.encode(), self.destination) {
            warn!(error = %err, destination = %self.destination, "request send failed");
            self.stop(StopReason::SendFailed);
            return Ok(None);
        }
        Ok(Some(self.period))
    }

    fn on_datagram(
        &mut self,
        payload: &[u8],
        source: SocketAddr,
        _transport: &dyn Transport,
    ) -> Result<()> {
        debug!(len = payload.len(), %source, "received sensor data");
        let packet = SensorPacket::decode(payload);
        let reading = Reading::interpret(&packet, self.decode);
        match reading {
            Reading::Unsigned(value) => {
                debug!(sensor = packet.sensor_id, value_type = packet.value_type, data = value, "sensor reading")
            }
            Reading::Double(value) => {
                debug!(sensor = packet.sensor_id, value_type = packet.value_type, data = value, "sensor reading")
            }
            Reading::Typed(value) => {
                debug!(sensor = packet.sensor_id, value_type = %value.value_type(), data = %value, "sensor reading")
            }
            Reading::UnknownType(code) => {
                warn!(sensor = packet.sensor_id, value_type = code, "sensor reading with unknown type")
            }
        }
        self.last_reading = Some((packet.sensor_id, reading));
        self.readings += 1;
        Ok(())
    }
}
