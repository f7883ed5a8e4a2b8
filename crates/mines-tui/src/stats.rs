use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Lifetime numbers for one board preset.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PresetStats {
    pub played: u32,
    pub won: u32,
    /// Fastest win in whole seconds.
    pub best_time_secs: Option<u64>,
}

/// Persisted play statistics, keyed by preset name.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    pub presets: HashMap<String, PresetStats>,
}

impl Stats {
    fn path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("mines-tui").join("stats.json"))
    }

    /// Load from disk; any problem just yields empty stats.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Best-effort save; the game never fails over stats I/O.
    pub fn save(&self) {
        let Some(path) = Self::path() else { return };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }

    /// Update the counters; the caller decides when to [`save`](Self::save).
    pub fn record(&mut self, preset: &str, won: bool, secs: u64) {
        let entry = self.presets.entry(preset.to_string()).or_default();
        entry.played += 1;
        if won {
            entry.won += 1;
            entry.best_time_secs = Some(match entry.best_time_secs {
                Some(best) => best.min(secs),
                None => secs,
            });
        }
    }

    pub fn get(&self, preset: &str) -> PresetStats {
        self.presets.get(preset).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_wins_and_best_time() {
        let mut stats = Stats::default();
        stats.record("Beginner", false, 30);
        stats.record("Beginner", true, 90);
        stats.record("Beginner", true, 45);

        let s = stats.get("Beginner");
        assert_eq!(s.played, 3);
        assert_eq!(s.won, 2);
        assert_eq!(s.best_time_secs, Some(45));
        assert_eq!(stats.get("Expert").played, 0);
    }
}
