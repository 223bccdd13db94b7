//! Row types for the four experiment logs and their CSV encoding.
//!
//! Numbers are written with Rust's shortest round-trip formatting, so a
//! row read back yields bit-identical genes and scores. Genes always
//! occupy the trailing columns.

use chrono::{DateTime, Utc};
use evovibe_link::Candidate;

/// File name of the population log.
pub const POPULATION_LOG: &str = "population.csv";
/// File name of the per-trial evaluation log.
pub const EVALUATION_LOG: &str = "evaluation.csv";
/// File name of the per-candidate reduced fitness log.
pub const PARTIAL_LOG: &str = "partial.csv";
/// File name of the per-generation fitness log.
pub const FITNESS_LOG: &str = "fitness.csv";

/// A row in one of the CSV logs.
pub trait LogRecord: Sized + Clone + Send + Sync {
    /// Header line, without trailing newline.
    const HEADER: &'static str;
    /// File the record lives in.
    const FILE: &'static str;

    fn to_row(&self) -> String;

    fn from_row(row: &str) -> Result<Self, String>;
}

fn push_genes(row: &mut String, genes: &Candidate) {
    for gene in genes.genes() {
        row.push(',');
        row.push_str(&gene.to_string());
    }
}

fn parse_u32(field: Option<&str>, name: &str) -> Result<u32, String> {
    let field = field.ok_or_else(|| format!("missing {name}"))?;
    field
        .trim()
        .parse()
        .map_err(|_| format!("{name}: not an unsigned integer: {field:?}"))
}

fn parse_f64(field: Option<&str>, name: &str) -> Result<f64, String> {
    let field = field.ok_or_else(|| format!("missing {name}"))?;
    field
        .trim()
        .parse()
        .map_err(|_| format!("{name}: not a number: {field:?}"))
}

fn parse_genes<'a>(fields: impl Iterator<Item = &'a str>) -> Result<Candidate, String> {
    let genes = fields
        .map(|f| {
            f.trim()
                .parse::<f64>()
                .map_err(|_| format!("gene: not a number: {f:?}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if genes.is_empty() {
        return Err("row has no genes".to_string());
    }
    Ok(Candidate::new(genes))
}

// ---------------------------------------------------------------------------
// PopulationRecord
// ---------------------------------------------------------------------------

/// One member of a freshly generated population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub generation: u32,
    pub episode: u32,
    pub genes: Candidate,
}

impl LogRecord for PopulationRecord {
    const HEADER: &'static str = "generation,episode,genes";
    const FILE: &'static str = POPULATION_LOG;

    fn to_row(&self) -> String {
        let mut row = format!("{},{}", self.generation, self.episode);
        push_genes(&mut row, &self.genes);
        row
    }

    fn from_row(row: &str) -> Result<Self, String> {
        let mut fields = row.split(',');
        Ok(Self {
            generation: parse_u32(fields.next(), "generation")?,
            episode: parse_u32(fields.next(), "episode")?,
            genes: parse_genes(fields)?,
        })
    }
}

// ---------------------------------------------------------------------------
// EvaluationRecord
// ---------------------------------------------------------------------------

/// One completed trial. The durable source of truth for resume.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub generation: u32,
    pub episode: u32,
    /// Position of the trial within its episode, starting at 1
    pub evaluation: u32,
    /// Index of the arena the trial ran in
    pub arena: usize,
    /// Device id of the active member
    pub active_casu: u32,
    /// When the active device started its stimulus, if it reported it
    pub started_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub genes: Candidate,
}

impl LogRecord for EvaluationRecord {
    const HEADER: &'static str =
        "generation,episode,evaluation,arena,active_casu,started_at,score,genes";
    const FILE: &'static str = EVALUATION_LOG;

    fn to_row(&self) -> String {
        let started_at = self
            .started_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        let mut row = format!(
            "{},{},{},{},{},{},{}",
            self.generation,
            self.episode,
            self.evaluation,
            self.arena,
            self.active_casu,
            started_at,
            self.score
        );
        push_genes(&mut row, &self.genes);
        row
    }

    fn from_row(row: &str) -> Result<Self, String> {
        let mut fields = row.split(',');
        let generation = parse_u32(fields.next(), "generation")?;
        let episode = parse_u32(fields.next(), "episode")?;
        let evaluation = parse_u32(fields.next(), "evaluation")?;
        let arena = parse_u32(fields.next(), "arena")? as usize;
        let active_casu = parse_u32(fields.next(), "active_casu")?;
        let started_at = match fields.next().map(str::trim) {
            None => return Err("missing started_at".to_string()),
            Some("") => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| format!("started_at: {e}"))?
                    .with_timezone(&Utc),
            ),
        };
        let score = parse_f64(fields.next(), "score")?;
        Ok(Self {
            generation,
            episode,
            evaluation,
            arena,
            active_casu,
            started_at,
            score,
            genes: parse_genes(fields)?,
        })
    }
}

// ---------------------------------------------------------------------------
// PartialRecord
// ---------------------------------------------------------------------------

/// Reduced fitness of one candidate after all its trials.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
    pub generation: u32,
    pub episode: u32,
    pub fitness: f64,
    pub genes: Candidate,
}

impl LogRecord for PartialRecord {
    const HEADER: &'static str = "generation,episode,fitness,genes";
    const FILE: &'static str = PARTIAL_LOG;

    fn to_row(&self) -> String {
        let mut row = format!("{},{},{}", self.generation, self.episode, self.fitness);
        push_genes(&mut row, &self.genes);
        row
    }

    fn from_row(row: &str) -> Result<Self, String> {
        let mut fields = row.split(',');
        Ok(Self {
            generation: parse_u32(fields.next(), "generation")?,
            episode: parse_u32(fields.next(), "episode")?,
            fitness: parse_f64(fields.next(), "fitness")?,
            genes: parse_genes(fields)?,
        })
    }
}

// ---------------------------------------------------------------------------
// FitnessRecord
// ---------------------------------------------------------------------------

/// One individual of the surviving population after a generation.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessRecord {
    pub generation: u32,
    pub fitness: f64,
    pub genes: Candidate,
}

impl LogRecord for FitnessRecord {
    const HEADER: &'static str = "generation,fitness,genes";
    const FILE: &'static str = FITNESS_LOG;

    fn to_row(&self) -> String {
        let mut row = format!("{},{}", self.generation, self.fitness);
        push_genes(&mut row, &self.genes);
        row
    }

    fn from_row(row: &str) -> Result<Self, String> {
        let mut fields = row.split(',');
        Ok(Self {
            generation: parse_u32(fields.next(), "generation")?,
            fitness: parse_f64(fields.next(), "fitness")?,
            genes: parse_genes(fields)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn evaluation_row_layout() {
        let rec = EvaluationRecord {
            generation: 2,
            episode: 1,
            evaluation: 3,
            arena: 0,
            active_casu: 12,
            started_at: None,
            score: 17.5,
            genes: Candidate::new(vec![440.0, 0.1]),
        };
        assert_eq!(rec.to_row(), "2,1,3,0,12,,17.5,440,0.1");
        assert_eq!(EvaluationRecord::from_row(&rec.to_row()).unwrap(), rec);
    }

    #[test]
    fn evaluation_row_keeps_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let rec = EvaluationRecord {
            generation: 0,
            episode: 0,
            evaluation: 1,
            arena: 1,
            active_casu: 3,
            started_at: Some(at),
            score: 0.0,
            genes: Candidate::new(vec![310.0]),
        };
        let back = EvaluationRecord::from_row(&rec.to_row()).unwrap();
        assert_eq!(back.started_at, Some(at));
    }

    #[test]
    fn awkward_floats_survive() {
        let rec = PartialRecord {
            generation: 0,
            episode: 4,
            fitness: 1.0 / 3.0,
            genes: Candidate::new(vec![0.1 + 0.2, 1e-7, 123456789.125]),
        };
        let back = PartialRecord::from_row(&rec.to_row()).unwrap();
        assert_eq!(back.fitness.to_bits(), rec.fitness.to_bits());
        assert_eq!(back.genes, rec.genes);
    }

    #[test]
    fn malformed_rows_are_reported() {
        assert!(PopulationRecord::from_row("x,0,1").is_err());
        assert!(PopulationRecord::from_row("0,0").is_err());
        assert!(FitnessRecord::from_row("1,abc,2").is_err());
        assert!(EvaluationRecord::from_row("0,0,1,0,1,not-a-date,1,2").is_err());
    }
}
