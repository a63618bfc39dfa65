//! Prediction horizons
//!
//! The set of horizons is closed: every model bundle carries exactly one
//! cluster model per horizon, and reports always list all three.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Time window a risk score refers to, ordered by window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "30-day")]
    Days30,
    #[serde(rename = "60-day")]
    Days60,
    #[serde(rename = "90-day")]
    Days90,
}

impl Horizon {
    /// All horizons in ascending window order
    pub const ALL: [Horizon; 3] = [Horizon::Days30, Horizon::Days60, Horizon::Days90];

    /// Horizon used for the anchor cluster, attribution, and the intervention decision
    pub const PRIMARY: Horizon = Horizon::Days90;

    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Days30 => "30-day",
            Horizon::Days60 => "60-day",
            Horizon::Days90 => "90-day",
        }
    }

    /// Position of this horizon in [`Horizon::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Horizon::Days30 => 0,
            Horizon::Days60 => 1,
            Horizon::Days90 => 2,
        }
    }

    /// Parse a horizon label; accepts `30-day`, `30_day`, `30d` and `30`
    pub fn parse(label: &str) -> Option<Horizon> {
        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = &label[digits.len()..];
        if !matches!(rest, "" | "d" | "-day" | "_day") {
            return None;
        }
        match digits.as_str() {
            "30" => Some(Horizon::Days30),
            "60" => Some(Horizon::Days60),
            "90" => Some(Horizon::Days90),
            _ => None,
        }
    }

    /// Fixed clinical narrative attached to every report for this horizon
    pub fn narrative(&self) -> &'static str {
        match self {
            Horizon::Days30 => "Acute utilization spike—likely inpatient or pharmacy driven.",
            Horizon::Days60 => "Sustained multi-claim activity and diagnostic complexity.",
            Horizon::Days90 => "Chronic burden and systemic fragmentation—long-term deterioration.",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per horizon, indexed by [`Horizon`]
#[derive(Debug, Clone, PartialEq)]
pub struct PerHorizon<T> {
    values: [T; 3],
}

impl<T> PerHorizon<T> {
    pub fn new(days30: T, days60: T, days90: T) -> Self {
        PerHorizon {
            values: [days30, days60, days90],
        }
    }

    /// Build by calling `f` once per horizon, in ascending order
    pub fn from_fn(mut f: impl FnMut(Horizon) -> T) -> Self {
        PerHorizon {
            values: Horizon::ALL.map(&mut f),
        }
    }

    /// Fallible [`PerHorizon::from_fn`]; stops at the first error
    pub fn try_from_fn<E>(mut f: impl FnMut(Horizon) -> Result<T, E>) -> Result<Self, E> {
        let [d30, d60, d90] = Horizon::ALL;
        Ok(PerHorizon::new(f(d30)?, f(d60)?, f(d90)?))
    }

    pub fn get(&self, horizon: Horizon) -> &T {
        &self.values[horizon.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Horizon, &T)> {
        Horizon::ALL.into_iter().zip(self.values.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Horizon, &T) -> U) -> PerHorizon<U> {
        PerHorizon::from_fn(|h| f(h, self.get(h)))
    }
}

impl<T> std::ops::Index<Horizon> for PerHorizon<T> {
    type Output = T;

    fn index(&self, horizon: Horizon) -> &T {
        self.get(horizon)
    }
}

/// Serializes as a map keyed by horizon label, in window order
impl<T: Serialize> Serialize for PerHorizon<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        for (horizon, value) in self.iter() {
            map.serialize_entry(horizon.as_str(), value)?;
        }
        map.end()
    }
}
