//! JSON exporter for ceremony reports.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// One resolved draw in a ceremony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawEvent {
    /// Virtual time at resolution, in seconds
    pub time_sec: f64,

    pub roll_id: u64,
    pub tier: String,
    pub ordinal: u32,
    pub winner: String,

    /// True if the winner came from a rigged slot
    pub rigged: bool,

    /// Rolling display updates shown before resolution
    pub visual_ticks: u64,
}

/// Outcome for one planned tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    pub tier: String,
    pub quota: u32,
    pub drawn: u32,

    /// True if the pool ran dry before the quota was met
    pub exhausted: bool,
}

/// Complete ceremony export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeremonyReport {
    /// Seed used
    pub seed: u64,

    /// Virtual duration in seconds
    pub duration_sec: f64,

    /// All draws, in order
    pub draws: Vec<DrawEvent>,

    pub tiers: Vec<TierSummary>,

    /// Controller rebuilds from storage during the run
    pub restarts: u64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl CeremonyReport {
    /// Creates a new report container.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            duration_sec: 0.0,
            draws: Vec::new(),
            tiers: Vec::new(),
            restarts: 0,
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a draw.
    pub fn add_draw(&mut self, draw: DrawEvent) {
        self.duration_sec = draw.time_sec;
        self.draws.push(draw);
    }

    pub fn add_tier(&mut self, summary: TierSummary) {
        self.tiers.push(summary);
    }

    /// Winners in draw order.
    pub fn winners(&self) -> Vec<&str> {
        self.draws.iter().map(|d| d.winner.as_str()).collect()
    }

    pub fn visual_ticks(&self) -> u64 {
        self.draws.iter().map(|d| d.visual_ticks).sum()
    }

    /// Marks the report failed with a reason. The first failure wins.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.passed = false;
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason.into());
        }
    }

    /// Finalizes the report: passed unless a failure was recorded.
    pub fn finalize(&mut self) {
        self.passed = self.failure_reason.is_none();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(winner: &str, time_sec: f64) -> DrawEvent {
        DrawEvent {
            time_sec,
            roll_id: 1,
            tier: "参与奖".to_string(),
            ordinal: 1,
            winner: winner.to_string(),
            rigged: false,
            visual_ticks: 39,
        }
    }

    #[test]
    fn test_first_failure_is_kept() {
        let mut report = CeremonyReport::new(7);
        report.fail("first");
        report.fail("second");
        report.finalize();

        assert!(!report.passed);
        assert_eq!(report.failure_reason.as_deref(), Some("first"));
    }

    #[test]
    fn test_write_and_read_back() {
        let mut report = CeremonyReport::new(7);
        report.add_draw(draw("A", 2.0));
        report.add_draw(draw("B", 4.0));
        report.finalize();

        let path = std::env::temp_dir().join(format!("letto-report-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        report.write_to_file(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: CeremonyReport = serde_json::from_str(&raw).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(parsed, report);
        assert_eq!(parsed.winners(), vec!["A", "B"]);
        assert_eq!(parsed.duration_sec, 4.0);
        assert_eq!(parsed.visual_ticks(), 78);
        assert!(!raw.contains("failure_reason"));
    }
}
