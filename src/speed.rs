//! Speed sources
//!
//! The driver asks one [`SpeedSource`] per tick for the subject's commanded
//! speed. Sources differ only in where the number comes from: a local
//! selection, a fixed script, or an external decision process.

use crate::bridge::DecisionBridge;
use crate::error::Error;
use crate::sim::Observation;

/// Supplies the commanded subject speed each tick
pub trait SpeedSource {
    fn commanded_speed(&mut self, observation: &Observation) -> Result<f64, Error>;

    /// Called when a new trial starts
    fn reset(&mut self) {}

    fn name(&self) -> &'static str;
}

/// Speed picked from a fixed list, one entry at a time.
///
/// Entry `n` (0-based) corresponds to digit key `n + 1`; only the first nine
/// entries are reachable by key. Starts at the slowest speed.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualSpeed {
    speeds: Vec<f64>,
    selected: f64,
}

impl ManualSpeed {
    pub fn new(speeds: Vec<f64>) -> Self {
        let selected = slowest(&speeds);
        Self { speeds, selected }
    }

    /// Select by list position; out-of-range indices are ignored
    pub fn select(&mut self, index: usize) -> bool {
        match self.speeds.get(index) {
            Some(&speed) => {
                self.selected = speed;
                true
            }
            None => false,
        }
    }

    /// Select by digit key ('1'..='9')
    pub fn press_key(&mut self, key: char) -> bool {
        match key.to_digit(10) {
            Some(digit @ 1..=9) => self.select(digit as usize - 1),
            _ => false,
        }
    }

    pub fn selected(&self) -> f64 {
        self.selected
    }
}

impl SpeedSource for ManualSpeed {
    fn commanded_speed(&mut self, _observation: &Observation) -> Result<f64, Error> {
        Ok(self.selected)
    }

    fn reset(&mut self) {
        self.selected = slowest(&self.speeds);
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

fn slowest(speeds: &[f64]) -> f64 {
    speeds.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

/// Pre-scripted speeds, one per tick; the last entry holds once the script runs out
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedSpeed {
    script: Vec<f64>,
    cursor: usize,
}

impl ScriptedSpeed {
    pub fn new(script: Vec<f64>) -> Self {
        Self { script, cursor: 0 }
    }

    pub fn constant(speed: f64) -> Self {
        Self::new(vec![speed])
    }
}

impl SpeedSource for ScriptedSpeed {
    fn commanded_speed(&mut self, _observation: &Observation) -> Result<f64, Error> {
        let speed = self
            .script
            .get(self.cursor)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(0.0);
        self.cursor = self.cursor.saturating_add(1);
        Ok(speed)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

impl SpeedSource for DecisionBridge {
    fn commanded_speed(&mut self, observation: &Observation) -> Result<f64, Error> {
        Ok(self.decide(observation)?)
    }

    fn name(&self) -> &'static str {
        "decision process"
    }
}
