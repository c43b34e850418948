//! Built-in plugin and report sinks wired up by `acserverctl run`.

use std::path::PathBuf;

use anyhow::Context;
use openracing_acserver_client::{PluginContext, ReportSink, SessionEvent, SessionPlugin};
use openracing_acserver_session::SessionReport;
use tracing::{debug, info};

/// Logs session lifecycle events.
#[derive(Debug, Default)]
pub struct LoggingPlugin;

impl SessionPlugin for LoggingPlugin {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_event(&self, event: &SessionEvent, ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        match event {
            SessionEvent::NewSession(session) => info!(
                server = %session.server_name,
                track = %session.track_name,
                session = %session.session_name,
                session_type = ?session.session_type,
                "New session"
            ),
            SessionEvent::NewConnection(driver) => info!(
                car_id = driver.car_id,
                driver = %driver.driver_name,
                car = %driver.car_model,
                "Driver joined"
            ),
            SessionEvent::ConnectionClosed(driver) => info!(
                car_id = driver.car_id,
                driver = %driver.driver_name,
                "Driver left"
            ),
            SessionEvent::LapCompleted { driver, lap } => info!(
                driver = %driver.driver_name,
                lap = lap.lap_no,
                lap_time_ms = lap.lap_time_ms,
                cuts = lap.cuts,
                position = lap.position,
                "Lap completed"
            ),
            SessionEvent::Collision(incident) => info!(
                kind = ?incident.kind,
                connection_id = incident.connection_id,
                other = ?incident.other_connection_id,
                impact_speed = incident.impact_speed,
                "Collision"
            ),
            SessionEvent::Chat { car_id, message } => {
                debug!(car_id, %message, "Chat");
            }
            SessionEvent::ServerTimeout => info!("Server is not responding"),
            SessionEvent::ServerAlive => debug!("Server answered the keep-alive probe"),
            SessionEvent::BulkCarUpdateFinished => debug!(
                drivers = ctx.session.drivers.len(),
                "Realtime update burst finished"
            ),
            other => debug!(event = other.name(), "Session event"),
        }
        Ok(())
    }
}

/// Logs a one-line summary per finished session.
#[derive(Debug, Default)]
pub struct LoggingReportSink;

impl ReportSink for LoggingReportSink {
    fn name(&self) -> &str {
        "log"
    }

    fn accept(&self, report: &SessionReport) -> anyhow::Result<()> {
        let session = &report.session;
        let winner = session
            .standings()
            .first()
            .map(|driver| driver.driver_name.clone())
            .unwrap_or_default();
        info!(
            session = %session.session_name,
            session_type = ?session.session_type,
            drivers = session.drivers.len(),
            laps = session.laps.len(),
            incidents = session.incidents.len(),
            %winner,
            "Session finished"
        );
        Ok(())
    }
}

/// Writes each finished session as a pretty-printed JSON file.
#[derive(Debug)]
pub struct JsonReportSink {
    directory: PathBuf,
}

impl JsonReportSink {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn file_name(report: &SessionReport) -> String {
        let stamp = report.finalized_at.format("%Y%m%d-%H%M%S");
        let session: String = report
            .session
            .session_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{stamp}-{}-{session}.json", report.session.session_index)
    }
}

impl ReportSink for JsonReportSink {
    fn name(&self) -> &str {
        "json-file"
    }

    fn accept(&self, report: &SessionReport) -> anyhow::Result<()> {
        let path = self.directory.join(Self::file_name(report));
        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, content)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!(path = %path.display(), "Session report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use openracing_acserver_session::{DriverInfo, SessionInfo};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn report() -> Result<SessionReport, Box<dyn std::error::Error>> {
        let finalized_at: DateTime<Utc> = Utc
            .with_ymd_and_hms(2024, 3, 9, 21, 15, 0)
            .single()
            .ok_or("invalid time")?;
        let mut session = SessionInfo::new(finalized_at, 1000, 24);
        session.session_name = "Race 1".to_string();
        session.session_index = 2;
        let mut driver = DriverInfo::new(0, 0);
        driver.driver_name = "Alice".to_string();
        driver.position = 1;
        session.drivers.push(driver);
        Ok(SessionReport {
            session,
            finalized_at,
        })
    }

    #[test]
    fn test_json_sink_writes_report() -> TestResult {
        let dir = tempfile::tempdir()?;
        let sink = JsonReportSink::new(dir.path().to_path_buf());
        let report = report()?;

        sink.accept(&report)?;

        let path = dir.path().join("20240309-211500-2-race_1.json");
        let parsed: SessionReport = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed, report);
        Ok(())
    }

    #[test]
    fn test_json_sink_reports_missing_directory() -> TestResult {
        let dir = tempfile::tempdir()?;
        let sink = JsonReportSink::new(dir.path().join("missing"));
        assert!(matches!(sink.accept(&report()?), Err(_)));
        Ok(())
    }

    #[test]
    fn test_logging_sink_accepts_any_report() -> TestResult {
        LoggingReportSink.accept(&report()?)?;
        Ok(())
    }
}
