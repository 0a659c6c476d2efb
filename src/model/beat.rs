use serde::{Deserialize, Serialize};

/// Musical boundary a bar position can be snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantize {
    /// No snapping.
    #[default]
    None,
    /// Nearest beat.
    Beat,
    /// Nearest half bar.
    HalfBar,
    /// Nearest downbeat.
    Bar,
}

/// A tempo change taking effect at a bar position. Bars before the first
/// mark run at the grid's base tempo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TempoMark {
    pub bar: f64,
    pub bpm: f64,
}

/// The musical time base for one song: tempo, meter, and the bar → ms
/// mapping. Either constant-tempo or a piecewise-constant tempo map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BeatGridRaw")]
pub struct BeatGrid {
    bpm: f64,
    beats_per_bar: u32,
    tempo_map: Vec<TempoMark>,
}

#[derive(Deserialize)]
struct BeatGridRaw {
    bpm: f64,
    beats_per_bar: u32,
    #[serde(default)]
    tempo_map: Vec<TempoMark>,
}

impl TryFrom<BeatGridRaw> for BeatGrid {
    type Error = String;
    fn try_from(raw: BeatGridRaw) -> Result<Self, String> {
        BeatGrid::with_tempo_map(raw.bpm, raw.beats_per_bar, raw.tempo_map).ok_or_else(|| {
            format!(
                "Invalid BeatGrid: bpm={}, beats_per_bar={}",
                raw.bpm, raw.beats_per_bar
            )
        })
    }
}

impl BeatGrid {
    /// Constant-tempo grid. Returns None unless bpm and meter are positive.
    pub fn constant(bpm: f64, beats_per_bar: u32) -> Option<Self> {
        Self::with_tempo_map(bpm, beats_per_bar, Vec::new())
    }

    /// Grid with tempo changes. Marks are sorted by bar; every tempo must
    /// be positive and mark positions non-negative.
    pub fn with_tempo_map(bpm: f64, beats_per_bar: u32, mut marks: Vec<TempoMark>) -> Option<Self> {
        if !(bpm > 0.0) || beats_per_bar == 0 {
            return None;
        }
        if marks.iter().any(|m| !(m.bpm > 0.0) || m.bar < 0.0) {
            return None;
        }
        marks.sort_by(|a, b| a.bar.partial_cmp(&b.bar).unwrap_or(std::cmp::Ordering::Equal));
        Some(Self {
            bpm,
            beats_per_bar,
            tempo_map: marks,
        })
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    fn ms_per_bar_for(&self, bpm: f64) -> f64 {
        f64::from(self.beats_per_bar) * 60_000.0 / bpm
    }

    /// Tempo in effect at a bar position.
    pub fn bpm_at(&self, bar: f64) -> f64 {
        self.tempo_map
            .iter()
            .take_while(|m| m.bar <= bar)
            .last()
            .map_or(self.bpm, |m| m.bpm)
    }

    /// Milliseconds one bar lasts at the given position.
    pub fn ms_per_bar_at(&self, bar: f64) -> f64 {
        self.ms_per_bar_for(self.bpm_at(bar))
    }

    /// Absolute millisecond position of a bar. Bar 0.0 is 0 ms.
    /// Integrates across tempo marks for time-varying grids.
    pub fn bar_to_ms(&self, bar: f64) -> f64 {
        let bar = bar.max(0.0);
        let mut ms = 0.0;
        let mut cursor = 0.0;
        let mut bpm = self.bpm;
        for mark in &self.tempo_map {
            if mark.bar >= bar {
                break;
            }
            if mark.bar > cursor {
                ms += (mark.bar - cursor) * self.ms_per_bar_for(bpm);
                cursor = mark.bar;
            }
            bpm = mark.bpm;
        }
        ms + (bar - cursor) * self.ms_per_bar_for(bpm)
    }

    /// Inverse of `bar_to_ms`.
    pub fn ms_to_bar(&self, ms: f64) -> f64 {
        let ms = ms.max(0.0);
        let mut elapsed = 0.0;
        let mut cursor = 0.0;
        let mut bpm = self.bpm;
        for mark in &self.tempo_map {
            if mark.bar <= cursor {
                bpm = mark.bpm;
                continue;
            }
            let segment = (mark.bar - cursor) * self.ms_per_bar_for(bpm);
            if elapsed + segment >= ms {
                return cursor + (ms - elapsed) / self.ms_per_bar_for(bpm);
            }
            elapsed += segment;
            cursor = mark.bar;
            bpm = mark.bpm;
        }
        cursor + (ms - elapsed) / self.ms_per_bar_for(bpm)
    }

    /// Snap a bar position to the nearest musical boundary.
    pub fn quantize(&self, bar: f64, q: Quantize) -> f64 {
        let snapped = match q {
            Quantize::None => bar,
            Quantize::Bar => bar.round(),
            Quantize::HalfBar => (bar * 2.0).round() / 2.0,
            Quantize::Beat => {
                let beats = f64::from(self.beats_per_bar);
                (bar * beats).round() / beats
            }
        };
        snapped.max(0.0)
    }
}
