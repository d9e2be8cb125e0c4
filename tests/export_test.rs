//! Export and ranking over completed runs

use std::sync::Arc;

use gridlab::events::ChannelBroadcaster;
use gridlab::experiment::{ExperimentRecord, MemoryRepository, Repository};
use gridlab::export::{collect_all_rows, collect_rows, to_csv, to_json, ExportRow};
use gridlab::generation::MockGateway;
use gridlab::grid::GridSpec;
use gridlab::rank::best_responses;
use gridlab::orchestrator::RunOrchestrator;
use gridlab::Error;

async fn completed_runs(runs: usize) -> (Arc<MemoryRepository>, Vec<String>) {
    let repository = Arc::new(MemoryRepository::new());
    let grid = GridSpec {
        temperature: Some(vec![0.1, 0.5, 0.9]),
        top_p: Some(vec![0.9]),
        max_tokens: Some(vec![300]),
        samples: Some(1),
        ..GridSpec::default()
    };
    repository
        .create_experiment(
            ExperimentRecord::builder(
                "exp-1",
                "Settlement",
                "Explain card settlement, chargebacks and refunds",
                "mock",
            )
            .grid_spec(grid)
            .build(),
        )
        .await
        .unwrap();

    let orchestrator = RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(MockGateway::new()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .master_seed(11)
    .build();

    let mut ids = Vec::new();
    for _ in 0..runs {
        let run = orchestrator.start("exp-1", None).await.unwrap();
        ids.push(run.run_id().to_string());
    }
    (repository, ids)
}

#[tokio::test]
async fn test_collect_rows_covers_every_response() {
    let (repository, run_ids) = completed_runs(2).await;
    let rows = collect_rows(repository.as_ref(), "exp-1").await.unwrap();

    assert_eq!(rows.len(), 6);
    for (run_id, chunk) in run_ids.iter().zip(rows.chunks(3)) {
        let sequences: Vec<usize> = chunk.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(chunk.iter().all(|r| &r.run_id == run_id));
    }
    for row in &rows {
        assert_eq!(row.run_status, "COMPLETED");
        assert_eq!(row.max_tokens, 300);
        assert!(row.seed.is_some());
        assert!(row.presence_penalty.is_some());
        assert!(row.overall_quality.is_some_and(|q| (0.0..=1.0).contains(&q)));
        assert_eq!(row.fallback, Some(false));
    }
}

#[tokio::test]
async fn test_csv_shape() {
    let (repository, _) = completed_runs(1).await;
    let rows = collect_rows(repository.as_ref(), "exp-1").await.unwrap();
    let csv = to_csv(&rows).unwrap();

    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 34);
    assert_eq!(&headers[0], "experiment_id");
    assert_eq!(&headers[1], "experiment_title");
    assert_eq!(&headers[headers.len() - 1], "response_text");
    assert!(headers.iter().any(|h| h == "readability"));
    assert!(headers.iter().any(|h| h == "run_completed_at"));

    let records: Vec<csv::StringRecord> = reader.records().collect::<csv::Result<_>>().unwrap();
    assert_eq!(records.len(), 3);
    for (record, row) in records.iter().zip(&rows) {
        assert_eq!(record.len(), headers.len());
        assert_eq!(&record[0], "exp-1");
        assert_eq!(&record[1], "Settlement");
        assert_eq!(&record[headers.len() - 1], row.response_text);
        assert!(!record[4].is_empty());
    }
    assert!(rows.iter().any(|r| r.response_text.contains('\n')));
}

#[tokio::test]
async fn test_rows_carry_context_and_sub_scores() {
    let (repository, _) = completed_runs(1).await;
    let rows = collect_rows(repository.as_ref(), "exp-1").await.unwrap();

    for row in &rows {
        assert_eq!(row.experiment_title, "Settlement");
        assert_eq!(row.experiment_model, "mock");
        assert!(row.experiment_prompt.starts_with("Explain card settlement"));
        assert!(row.run_completed_at.is_some_and(|at| at >= row.run_started_at));
        assert!(row.response_created_at >= row.run_started_at);
        for score in [
            row.completeness,
            row.structure,
            row.coherence,
            row.redundancy,
            row.lexical_diversity,
            row.length_adequacy,
            row.readability,
        ] {
            assert!(score.is_some_and(|s| (0.0..=1.0).contains(&s)));
        }
        assert!(row.scorer_version.is_some());
        let details: serde_json::Value = serde_json::from_str(&row.details).unwrap();
        assert_eq!(details["fallback"], false);
        assert!(!row.response_text.is_empty());
    }
}

#[tokio::test]
async fn test_collect_all_rows_walks_every_experiment() {
    let (repository, _) = completed_runs(1).await;
    repository
        .create_experiment(
            ExperimentRecord::builder("exp-2", "Refunds", "Explain refunds", "mock")
                .grid_spec(GridSpec {
                    temperature: Some(vec![0.3]),
                    max_tokens: Some(vec![200]),
                    samples: Some(2),
                    ..GridSpec::default()
                })
                .build(),
        )
        .await
        .unwrap();
    // An experiment without runs contributes no rows.
    repository
        .create_experiment(ExperimentRecord::new("exp-3", "Idle", "Nothing", "mock"))
        .await
        .unwrap();
    RunOrchestrator::builder(
        Arc::clone(&repository),
        Arc::new(MockGateway::new()),
        Arc::new(ChannelBroadcaster::default()),
    )
    .build()
    .start("exp-2", None)
    .await
    .unwrap();

    let rows = collect_all_rows(repository.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows[..3].iter().all(|r| r.experiment_id == "exp-1"));
    assert!(rows[3..].iter().all(|r| r.experiment_id == "exp-2"));
    assert!(rows[3..].iter().all(|r| r.experiment_title == "Refunds"));
}

#[tokio::test]
async fn test_empty_repository_exports_nothing() {
    let repository = MemoryRepository::new();
    let rows = collect_all_rows(&repository).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(to_csv(&rows).unwrap(), "");
}

#[tokio::test]
async fn test_json_export_parses_back() {
    let (repository, _) = completed_runs(1).await;
    let rows = collect_rows(repository.as_ref(), "exp-1").await.unwrap();

    let parsed: Vec<ExportRow> = serde_json::from_str(&to_json(&rows).unwrap()).unwrap();
    assert_eq!(parsed.len(), rows.len());
    for (parsed, row) in parsed.iter().zip(&rows) {
        assert_eq!(parsed.response_id, row.response_id);
        assert_eq!(parsed.response_text, row.response_text);
        assert_eq!(parsed.details, row.details);
        assert_eq!(parsed.seed, row.seed);
        let quality = parsed.overall_quality.unwrap() - row.overall_quality.unwrap();
        assert!(quality.abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_export_unknown_experiment() {
    let repository = MemoryRepository::new();
    let err = collect_rows(&repository, "nope").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "experiment", .. }));
}

#[tokio::test]
async fn test_best_responses_ranked() {
    let (repository, run_ids) = completed_runs(1).await;

    let best = best_responses(repository.as_ref(), &run_ids[0], 2).await.unwrap();
    assert_eq!(best.len(), 2);
    assert!(best[0].overall_quality() >= best[1].overall_quality());

    let all = best_responses(repository.as_ref(), &run_ids[0], 10).await.unwrap();
    assert_eq!(all.len(), 3);
    let top = all
        .iter()
        .map(|r| r.overall_quality())
        .fold(f64::MIN, f64::max);
    assert!((best[0].overall_quality() - top).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_best_responses_unknown_run() {
    let repository = MemoryRepository::new();
    let err = best_responses(&repository, "nope", 3).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
