//! Rollup calculations over the readings of one day or hour

use serde::{Deserialize, Serialize};

/// How the readings of one bucket collapse into a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Min,
    Max,
    Mean,
    /// Latest reading in storage order
    Last,
}

/// Collects the readings of one bucket
///
/// Readings are kept in arrival order so `Last` follows storage order
/// for equal timestamps. Duplicates are kept and weigh into `Mean`.
#[derive(Debug, Clone)]
pub struct Accumulator {
    kind: AggregateType,
    values: Vec<f64>,
}

impl Accumulator {
    pub fn new(kind: AggregateType) -> Self {
        Self {
            kind,
            values: Vec::new(),
        }
    }

    pub fn add(&mut self, value: f64) {
        self.values.push(value);
    }

    /// `None` until a reading was added
    pub fn result(&self) -> Option<f64> {
        let values = self.values.iter().copied();
        match self.kind {
            AggregateType::Min => values.reduce(f64::min),
            AggregateType::Max => values.reduce(f64::max),
            AggregateType::Mean => values
                .reduce(|a, b| a + b)
                .map(|sum| sum / self.values.len() as f64),
            AggregateType::Last => self.values.last().copied(),
        }
    }

    /// Number of readings added, duplicates included
    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn kind(&self) -> AggregateType {
        self.kind
    }
}

/// Lowest and highest reading of a channel within one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// Min/max of the given values, `None` when there are none
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut min = Accumulator::new(AggregateType::Min);
        let mut max = Accumulator::new(AggregateType::Max);
        for value in values {
            min.add(value);
            max.add(value);
        }
        Some(Self {
            min: min.result()?,
            max: max.result()?,
        })
    }
}
