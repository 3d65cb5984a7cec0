//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! Device-side reference peer.
//!
//! The sensor port records readings; the request port answers queries
//! about them. Both ports share one [`SensorStation`].
use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use snp_common::config::StationConfig;
use snp_wire::{QueryType, RequestPacket, SensorPacket, Value, ValueType, VALUE_LEN};
use tracing::{debug, info, warn};

use crate::endpoint::DatagramHandler;
use crate::transport::Transport;
use crate::Result;

/// Station state shared by both ports.
pub type SharedStation = Arc<Mutex<SensorStation>>;

/// Readings retained for one sensor.
#[derive(Debug, Clone)]
pub struct SensorHistory {
    capacity: usize,
    recent: VecDeque<u64>,
    last_type: u8,
    last_storage: [u8; VALUE_LEN],
    count: u64,
    mean: f64,
}

impl SensorHistory {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
            last_type: ValueType::None.code(),
            last_storage: [0; VALUE_LEN],
            count: 0,
            mean: 0.0,
        }
    }

    fn ingest(&mut self, packet: &SensorPacket) {
        let data = packet.raw_u64();
        self.count += 1;
        self.recent.push_back(data);
        if self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
        self.last_type = packet.value_type;
        self.last_storage = *packet.raw_value();
        self.mean += (data as f64 - self.mean) / self.count as f64;
    }

    /// Readings seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean over every reading.
    pub fn mean_all(&self) -> f64 {
        self.mean
    }

    /// Mean over the retained readings, zero when none are retained.
    pub fn mean_recent(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        self.recent.iter().map(|v| *v as f64).sum::<f64>() / self.recent.len() as f64
    }

    /// Retained readings, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = u64> + '_ {
        self.recent.iter().copied()
    }
}

#[derive(Debug, Serialize)]
struct CsvRecord {
    timestamp: i64,
    sensor: u8,
    data: u64,
}

/// Per-sensor reading store answering [`QueryType`] requests.
pub struct SensorStation {
    history_len: usize,
    sensors: BTreeMap<u8, SensorHistory>,
    csv: Option<csv::Writer<File>>,
}

impl SensorStation {
    /// Station keeping the last `history_len` readings per sensor.
    pub fn new(history_len: usize) -> Self {
        Self {
            history_len,
            sensors: BTreeMap::new(),
            csv: None,
        }
    }

    /// Append every recorded reading to the CSV file at `path`.
    pub fn with_csv_log(mut self, path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.csv = Some(
            csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file),
        );
        Ok(self)
    }

    /// Build the station described by `config`.
    pub fn from_config(config: &StationConfig) -> Result<Self> {
        let station = Self::new(config.history_len);
        match &config.csv_log {
            Some(path) => station.with_csv_log(path),
            None => Ok(station),
        }
    }

    /// Wrap the station for sharing between its two ports.
    pub fn into_shared(self) -> SharedStation {
        Arc::new(Mutex::new(self))
    }

    /// Store one reading, then append it to the CSV log.
    ///
    /// The history is updated even when the log write fails; the write error
    /// is still returned.
    pub fn record(&mut self, packet: &SensorPacket) -> Result<()> {
        let history_len = self.history_len;
        self.sensors
            .entry(packet.sensor_id)
            .or_insert_with(|| SensorHistory::new(history_len))
            .ingest(packet);

        if let Some(writer) = self.csv.as_mut() {
            writer.serialize(CsvRecord {
                timestamp: Utc::now().timestamp(),
                sensor: packet.sensor_id,
                data: packet.raw_u64(),
            })?;
            writer.flush()?;
        }
        Ok(())
    }

    /// History for `sensor_id`, if it has reported.
    pub fn history(&self, sensor_id: u8) -> Option<&SensorHistory> {
        self.sensors.get(&sensor_id)
    }

    /// Answer a query.
    ///
    /// Sensors without readings answer `FIELD_EMCY`; unknown query codes
    /// answer `NONE`.
    pub fn respond(&self, request: &RequestPacket) -> SensorPacket {
        let sensor_id = request.sensor_id;
        let Some(history) = self.sensors.get(&sensor_id).filter(|h| h.count > 0) else {
            return SensorPacket::new(sensor_id, Value::Emcy);
        };
        match request.query_type() {
            Ok(QueryType::LastValue) => {
                SensorPacket::from_raw(sensor_id, history.last_type, history.last_storage)
            }
            Ok(QueryType::MeanLast10) => {
                SensorPacket::new(sensor_id, Value::Double(history.mean_recent()))
            }
            Ok(QueryType::MeanAll) => SensorPacket::new(sensor_id, Value::Double(history.mean_all())),
            Err(_) => SensorPacket::new(sensor_id, Value::None),
        }
    }
}

/// Port receiving sensor readings.
pub struct StationSensorPort {
    station: SharedStation,
}

impl StationSensorPort {
    /// Attach to a shared station.
    pub fn new(station: SharedStation) -> Self {
        Self { station }
    }
}

impl DatagramHandler for StationSensorPort {
    fn name(&self) -> &'static str {
        "station_sensors"
    }

    fn on_ready(&mut self, _transport: &dyn Transport) -> Result<Option<Duration>> {
        info!("station accepting sensor readings");
        Ok(None)
    }

    fn on_datagram(
        &mut self,
        payload: &[u8],
        source: SocketAddr,
        _transport: &dyn Transport,
    ) -> Result<()> {
        let packet = match SensorPacket::decode_exact(payload) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%source, error = %err, "malformed packet from sensors");
                return Ok(());
            }
        };
        debug!(%source, %packet, "sensor reading recorded");
        self.station.lock().record(&packet)
    }
}

/// Port answering reading requests.
pub struct StationRequestPort {
    station: SharedStation,
}

impl StationRequestPort {
    /// Attach to a shared station.
    pub fn new(station: SharedStation) -> Self {
        Self { station }
    }
}

impl DatagramHandler for StationRequestPort {
    fn name(&self) -> &'static str {
        "station_requests"
    }

    fn on_ready(&mut self, _transport: &dyn Transport) -> Result<Option<Duration>> {
        info!("station accepting requests");
        Ok(None)
    }

    fn on_datagram(
        &mut self,
        payload: &[u8],
        source: SocketAddr,
        transport: &dyn Transport,
    ) -> Result<()> {
        let request = match RequestPacket::decode_exact(payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(%source, error = %err, "malformed data request");
                return Ok(());
            }
        };
        let response = self.station.lock().respond(&request);
        debug!(%source, %request, %response, "answering request");
        transport.send_to(&response.encode(), source)
    }
}
