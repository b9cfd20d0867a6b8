//! Run reports written as JSON, gzip-compressed when the path ends in `.gz`.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ludus_core::config::{ConfigWarning, ModelConfig};
use ludus_core::statistics::FixationStats;
use ludus_core::{ConvergenceState, PopulationSnapshot, RunMetrics, TraitFlip};
use ludus_data::DemeCounts;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use uuid::Uuid;

const REPORT_VERSION: u32 = 1;

/// Trait composition at one point of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CountsSample {
    pub time: f64,
    pub events: u64,
    pub state: ConvergenceState,
    pub trait_counts: Vec<usize>,
    pub deme_counts: Option<DemeCounts>,
}

impl From<&PopulationSnapshot> for CountsSample {
    fn from(snapshot: &PopulationSnapshot) -> Self {
        Self {
            time: snapshot.time,
            events: snapshot.events,
            state: snapshot.state,
            trait_counts: snapshot.trait_counts.clone(),
            deme_counts: snapshot.deme_counts.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpeciesReport {
    pub name: String,
    pub game: String,
    pub trait_names: Vec<String>,
    pub state: ConvergenceState,
    pub time: f64,
    pub events: u64,
    pub trait_counts: Vec<usize>,
    pub metrics: RunMetrics,
    #[serde(default)]
    pub samples: Vec<CountsSample>,
    #[serde(default)]
    pub flips: Option<Vec<TraitFlip>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatisticsReport {
    pub name: String,
    pub stats: FixationStats,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunReport {
    pub version: u32,
    pub id: Uuid,
    pub started_at: String,
    pub fingerprint: String,
    pub config: ModelConfig,
    pub warnings: Vec<ConfigWarning>,
    pub stop_reason: String,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub species: Vec<SpeciesReport>,
    #[serde(default)]
    pub statistics: Vec<StatisticsReport>,
}

impl RunReport {
    #[must_use]
    pub fn new(config: &ModelConfig, warnings: Vec<ConfigWarning>) -> Self {
        Self {
            version: REPORT_VERSION,
            id: Uuid::new_v4(),
            started_at: chrono::Utc::now().to_rfc3339(),
            fingerprint: config.fingerprint(),
            config: config.clone(),
            warnings,
            stop_reason: String::new(),
            elapsed_ms: 0,
            species: Vec::new(),
            statistics: Vec::new(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize report")?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?;
        } else {
            let mut writer = BufWriter::new(file);
            writer.write_all(&json)?;
            writer.flush()?;
        }
        tracing::info!(path = %path.display(), "Report written");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut data = Vec::new();
        File::open(path)
            .with_context(|| format!("Failed to open report {}", path.display()))?
            .read_to_end(&mut data)?;
        let mut decoded = Vec::new();
        let json = if GzDecoder::new(data.as_slice())
            .read_to_end(&mut decoded)
            .is_ok()
        {
            decoded
        } else {
            data
        };
        let report: Self = serde_json::from_slice(&json).context("Failed to parse report")?;
        if report.version > REPORT_VERSION {
            anyhow::bail!(
                "Report version {} is newer than supported version {}",
                report.version,
                REPORT_VERSION
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_round_trip_gz_and_plain() {
        let dir = std::env::temp_dir().join(format!("ludus-report-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let report = RunReport::new(&ModelConfig::default(), Vec::new());
        for name in ["report.json", "report.json.gz"] {
            let path = dir.join(name);
            report.save(&path).unwrap();
            assert_eq!(RunReport::load(&path).unwrap(), report);
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = std::env::temp_dir().join(format!("ludus-report-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut report = RunReport::new(&ModelConfig::default(), Vec::new());
        report.version = REPORT_VERSION + 1;
        let path = dir.join("future.json");
        report.save(&path).unwrap();
        assert!(RunReport::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
