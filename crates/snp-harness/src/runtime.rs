//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! Binds the configured endpoints and drives them together on one task.
use std::future::Future;
use std::net::SocketAddr;

use snp_common::config::AppConfig;
use strum::{Display, EnumIter};
use tokio::sync::watch;
use tracing::info;

use crate::endpoint::{DatagramHandler, Endpoint, EndpointStatsSnapshot};
use crate::request_emitter::{EmitterState, RequestEmitter};
use crate::sensor_emitter::SensorEmitter;
use crate::station::{SensorStation, StationRequestPort, StationSensorPort};
use crate::{HarnessError, Result};

/// Harness roles that can share one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// One burst of sensor packets.
    SensorEmitter,
    /// Periodic queries plus decoding of the replies.
    RequestEmitter,
    /// Device-side peer on both protocol ports.
    Station,
}

/// Counters for one endpoint after shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    /// Handler name.
    pub name: &'static str,
    /// Bound socket address.
    pub local_addr: SocketAddr,
    /// Final counters.
    pub stats: EndpointStatsSnapshot,
}

/// Outcome of [`HarnessRuntime::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per endpoint that ran.
    pub endpoints: Vec<EndpointReport>,
    /// Final schedule state when the request emitter ran.
    pub request_state: Option<EmitterState>,
}

impl RunReport {
    /// Report for the endpoint named `name`.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|report| report.name == name)
    }
}

/// Owns the configuration shared by every role.
pub struct HarnessRuntime {
    config: AppConfig,
}

impl HarnessRuntime {
    /// Runtime over `config`.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run `roles` until `shutdown` resolves.
    ///
    /// Binding failures abort before any endpoint starts.
    pub async fn run<F>(&self, roles: &[Role], shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let wants = |role: Role| roles.contains(&role);

        let sensor = if wants(Role::SensorEmitter) {
            let config = &self.config.sensor_emitter;
            Some(Endpoint::bind(config.bind, SensorEmitter::from_config(config)).await?)
        } else {
            None
        };
        let request = if wants(Role::RequestEmitter) {
            let config = &self.config.request_emitter;
            Some(Endpoint::bind(config.bind, RequestEmitter::from_config(config)).await?)
        } else {
            None
        };
        let (station_sensors, station_requests) = if wants(Role::Station) {
            let config = &self.config.station;
            let station = SensorStation::from_config(config)?.into_shared();
            (
                Some(
                    Endpoint::bind(config.sensor_listen, StationSensorPort::new(station.clone()))
                        .await?,
                ),
                Some(Endpoint::bind(config.request_listen, StationRequestPort::new(station)).await?),
            )
        } else {
            (None, None)
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let signal = async move {
            shutdown.await;
            info!("shutdown requested; stopping endpoints");
            let _ = stop_tx.send(true);
            Ok::<(), HarnessError>(())
        };

        let (_, sensor, request, station_sensors, station_requests) = tokio::try_join!(
            signal,
            run_optional(sensor, stop_rx.clone()),
            run_optional(request, stop_rx.clone()),
            run_optional(station_sensors, stop_rx.clone()),
            run_optional(station_requests, stop_rx),
        )?;

        let mut report = RunReport {
            request_state: request.as_ref().map(|(emitter, _)| emitter.state()),
            ..RunReport::default()
        };
        report.endpoints.extend(sensor.map(|(_, r)| r));
        report.endpoints.extend(request.map(|(_, r)| r));
        report.endpoints.extend(station_sensors.map(|(_, r)| r));
        report.endpoints.extend(station_requests.map(|(_, r)| r));

        for endpoint in &report.endpoints {
            info!(
                endpoint = endpoint.name,
                local_addr = %endpoint.local_addr,
                sent = endpoint.stats.sent,
                received = endpoint.stats.received,
                failed = endpoint.stats.failed,
                "endpoint stopped"
            );
        }
        Ok(report)
    }
}

async fn run_optional<H: DatagramHandler>(
    endpoint: Option<Endpoint<H>>,
    mut stop: watch::Receiver<bool>,
) -> Result<Option<(H, EndpointReport)>> {
    let Some(endpoint) = endpoint else {
        return Ok(None);
    };
    let local_addr = endpoint.local_addr()?;
    let stats = endpoint.stats();
    let handler = endpoint
        .run(async move {
            let _ = stop.wait_for(|stopped| *stopped).await;
        })
        .await?;
    let report = EndpointReport {
        name: handler.name(),
        local_addr,
        stats: stats.snapshot(),
    };
    Ok(Some((handler, report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snp_wire::{SensorPacket, Value, ValueType};
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn sensor_role_delivers_one_burst() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.expect("receiver");
        let mut config = AppConfig::default();
        config.sensor_emitter.bind = "127.0.0.1:0".parse().unwrap();
        config.sensor_emitter.destination = receiver.local_addr().expect("addr");
        config.sensor_emitter.burst_len = 4;

        let runtime = HarnessRuntime::new(config);
        let collect = async {
            let mut buf = [0u8; 64];
            let mut values = Vec::new();
            while values.len() < 4 {
                let (len, _) = receiver.recv_from(&mut buf).await.expect("recv");
                values.push(SensorPacket::decode(&buf[..len]).read_as(ValueType::Int32));
            }
            values
        };
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let run = runtime.run(&[Role::SensorEmitter], async {
            let _ = stop_rx.await;
        });
        let collect_then_stop = async {
            let values = collect.await;
            let _ = stop_tx.send(());
            values
        };
        let (report, values) = tokio::join!(run, collect_then_stop);

        assert_eq!(values, (0..4).map(Value::Int32).collect::<Vec<_>>());
        let report = report.expect("run");
        assert_eq!(report.request_state, None);
        let sensor = report.endpoint("sensor_emitter").expect("sensor report");
        assert_eq!(sensor.stats.sent, 4);
        assert_eq!(report.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn no_roles_returns_when_shutdown_resolves() {
        let runtime = HarnessRuntime::new(AppConfig::default());
        let report = runtime.run(&[], async {}).await.expect("run");
        assert!(report.endpoints.is_empty());
    }

    #[test]
    fn roles_render_snake_case() {
        assert_eq!(Role::RequestEmitter.to_string(), "request_emitter");
    }
}
