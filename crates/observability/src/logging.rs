//! Structured Logging Setup via tracing-subscriber
//!
//! Quellen in absteigender Prioritaet:
//! 1. `RL_LOG_LEVEL` / `RL_LOG_FORMAT` aus der Umgebung
//! 2. `[logging]` aus der Konfigurationsdatei
//! 3. `info` / `text`
//!
//! Ein reiner Level wie `debug` gilt fuer die ruflink-Crates; die
//! HTTP- und WebSocket-Schicht bleibt dann auf `warn`, damit Pings und
//! Upgrades das Log nicht fluten. Volle Filter-Direktiven
//! (`ruflink_signaling=trace,hyper=debug`) werden unveraendert uebernommen.

use anyhow::Result;
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer die Filter-Direktive
pub const ENV_LOG_LEVEL: &str = "RL_LOG_LEVEL";
/// Umgebungsvariable fuer das Ausgabeformat
pub const ENV_LOG_FORMAT: &str = "RL_LOG_FORMAT";

/// Crates, die bei einem reinen Level auf `warn` gedrosselt werden
const LAUTE_CRATES: &[&str] = &["hyper", "tungstenite", "tokio_tungstenite"];

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Menschenlesbar (Entwicklung)
    Text,
    /// Eine JSON-Zeile pro Event (Log-Aggregation)
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => anyhow::bail!("Unbekanntes Log-Format '{anderes}' (erlaubt: text, json)"),
        }
    }
}

/// Aufgeloeste Logging-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEinstellungen {
    pub direktive: String,
    pub format: LogFormat,
}

impl LogEinstellungen {
    /// Loest Konfigurationswerte und Umgebung zu fertigen Einstellungen auf
    ///
    /// `umgebung` liefert den Wert einer Umgebungsvariable (austauschbar
    /// fuer Tests). Ein ungueltiges Format faellt auf `text` zurueck.
    pub fn aufloesen<F>(level: &str, format: &str, umgebung: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = umgebung(ENV_LOG_LEVEL).unwrap_or_else(|| level.to_string());
        let format = umgebung(ENV_LOG_FORMAT).unwrap_or_else(|| format.to_string());

        Self {
            direktive: filter_direktive(&level),
            format: format.parse().unwrap_or(LogFormat::Text),
        }
    }
}

/// Baut aus einem Level oder einer Direktive den EnvFilter-String
fn filter_direktive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return "info".to_string();
    }
    if !log_level_gueltig(level) {
        return level.to_string();
    }

    let mut direktive = level.to_string();
    for krate in LAUTE_CRATES {
        direktive.push_str(&format!(",{krate}=warn"));
    }
    direktive
}

/// Initialisiert das Logging-System.
///
/// Darf pro Prozess genau einmal erfolgreich aufgerufen werden; ein zweiter
/// Aufruf liefert einen Fehler statt zu paniken.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<LogEinstellungen> {
    let einstellungen = LogEinstellungen::aufloesen(level, format, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&einstellungen.direktive)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match einstellungen.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow::anyhow!("Logging-Initialisierung fehlgeschlagen: {e}"))?;

    Ok(einstellungen)
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    format.parse::<LogFormat>().is_ok()
}
