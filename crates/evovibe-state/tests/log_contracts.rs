//! Contract tests for `ExperimentLog`.
//!
//! Every test runs against both the CSV implementation and the in-memory
//! fake; any conforming implementation must pass them.

use chrono::{TimeZone, Utc};
use evovibe_link::Candidate;
use evovibe_state::fakes::MemoryExperimentLog;
use evovibe_state::*;

fn evaluation(generation: u32, evaluation: u32, score: f64) -> EvaluationRecord {
    EvaluationRecord {
        generation,
        episode: 0,
        evaluation,
        arena: 1,
        active_casu: 7,
        started_at: Some(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, evaluation).unwrap()),
        score,
        genes: Candidate::new(vec![440.0, 1000.0, 0.25]),
    }
}

async fn appends_come_back_in_order(log: &dyn ExperimentLog) {
    log.append_evaluation(&evaluation(0, 1, 3.5)).await.unwrap();
    log.append_evaluation(&evaluation(0, 2, 12.0)).await.unwrap();
    log.append_evaluation(&evaluation(1, 3, 0.0)).await.unwrap();

    let rows = log.evaluations().await.unwrap();
    let scores: Vec<f64> = rows.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![3.5, 12.0, 0.0]);
    assert_eq!(rows[2].generation, 1);
}

async fn evaluation_round_trip_is_exact(log: &dyn ExperimentLog) {
    let rec = EvaluationRecord {
        score: 0.1 + 0.7,
        genes: Candidate::new(vec![1.0 / 7.0, 310.0, 2.5e-3]),
        ..evaluation(4, 9, 0.0)
    };
    log.append_evaluation(&rec).await.unwrap();
    let back = log.evaluations().await.unwrap().pop().unwrap();
    assert_eq!(back.score.to_bits(), rec.score.to_bits());
    let bits = |c: &Candidate| c.genes().iter().map(|g| g.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&back.genes), bits(&rec.genes));
    assert_eq!(back, rec);
}

async fn populations_and_partials(log: &dyn ExperimentLog) {
    let pop: Vec<PopulationRecord> = (0..3)
        .map(|i| PopulationRecord {
            generation: 0,
            episode: 0,
            genes: Candidate::new(vec![100.0 + f64::from(i)]),
        })
        .collect();
    log.append_population(&pop).await.unwrap();
    log.append_partial(&PartialRecord {
        generation: 0,
        episode: 0,
        fitness: 9.25,
        genes: pop[0].genes.clone(),
    })
    .await
    .unwrap();
    log.append_fitness(&[FitnessRecord {
        generation: 1,
        fitness: 9.25,
        genes: pop[0].genes.clone(),
    }])
    .await
    .unwrap();

    assert_eq!(log.populations().await.unwrap(), pop);
    assert_eq!(log.partials().await.unwrap().len(), 1);
    assert_eq!(log.fitness().await.unwrap()[0].generation, 1);
}

async fn empty_logs_read_empty(log: &dyn ExperimentLog) {
    assert!(log.populations().await.unwrap().is_empty());
    assert!(log.evaluations().await.unwrap().is_empty());
    assert!(log.partials().await.unwrap().is_empty());
    assert!(log.fitness().await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_log_contracts() {
    empty_logs_read_empty(&MemoryExperimentLog::new()).await;
    appends_come_back_in_order(&MemoryExperimentLog::new()).await;
    evaluation_round_trip_is_exact(&MemoryExperimentLog::new()).await;
    populations_and_partials(&MemoryExperimentLog::new()).await;
}

#[tokio::test]
async fn csv_log_contracts() {
    let dirs: Vec<_> = (0..4).map(|_| tempfile::tempdir().unwrap()).collect();
    empty_logs_read_empty(&CsvExperimentLog::create(dirs[0].path()).await.unwrap()).await;
    appends_come_back_in_order(&CsvExperimentLog::create(dirs[1].path()).await.unwrap()).await;
    evaluation_round_trip_is_exact(&CsvExperimentLog::create(dirs[2].path()).await.unwrap())
        .await;
    populations_and_partials(&CsvExperimentLog::create(dirs[3].path()).await.unwrap()).await;
}

#[tokio::test]
async fn csv_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let log = CsvExperimentLog::create(dir.path()).await.unwrap();
        log.append_evaluation(&evaluation(0, 1, 5.0)).await.unwrap();
    }
    let reopened = CsvExperimentLog::open(dir.path()).await.unwrap();
    reopened
        .append_evaluation(&evaluation(0, 2, 6.0))
        .await
        .unwrap();
    let rows = reopened.evaluations().await.unwrap();
    assert_eq!(rows.len(), 2);

    let text = std::fs::read_to_string(dir.path().join(EVALUATION_LOG)).unwrap();
    assert!(text.starts_with(EvaluationRecord::HEADER));
}
