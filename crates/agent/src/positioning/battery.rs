//! Best-effort battery level probes.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

/// Reads the device battery percentage.
///
/// Devices without a readable battery simply have no probe; a probe that
/// fails to read returns an error the caller is expected to swallow.
#[async_trait]
pub trait BatteryProbe: Send + Sync {
    async fn battery_level(&self) -> anyhow::Result<i32>;
}

/// Linux power-supply class battery (`/sys/class/power_supply/BAT*`).
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    capacity_path: PathBuf,
}

impl SysfsBattery {
    const POWER_SUPPLY_DIR: &'static str = "/sys/class/power_supply";

    /// Finds the first battery exposing a capacity file, if any.
    pub fn detect() -> Option<Self> {
        Self::detect_in(Path::new(Self::POWER_SUPPLY_DIR))
    }

    fn detect_in(dir: &Path) -> Option<Self> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
            .map(|entry| entry.path().join("capacity"))
            .filter(|path| path.is_file())
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .map(|capacity_path| Self { capacity_path })
    }
}

#[async_trait]
impl BatteryProbe for SysfsBattery {
    async fn battery_level(&self) -> anyhow::Result<i32> {
        let raw = tokio::fs::read_to_string(&self.capacity_path)
            .await
            .with_context(|| format!("reading {}", self.capacity_path.display()))?;
        let level: i32 = raw
            .trim()
            .parse()
            .with_context(|| format!("parsing battery capacity {:?}", raw.trim()))?;
        Ok(level.clamp(0, 100))
    }
}
