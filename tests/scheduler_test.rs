//! Batch scheduler behavior: slice dispatch, admission gating, resume, and
//! the concurrency bound.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{record, MockAdmission, MockFactory, MockSolver, SessionScript};
use sei_process_search::{
    BatchScheduler, Config, JobStatus, ProcessJob, ResultStore,
};
use tokio::sync::Mutex;
use tokio::time::timeout;

fn test_config(results_file: &std::path::Path) -> Config {
    Config {
        max_concurrent: 3,
        max_retries: 2,
        challenge_attempts: 3,
        retry_backoff_ms: 1,
        results_file: results_file.to_string_lossy().into_owned(),
        ..Config::default()
    }
}

fn scheduler_with(
    config: Config,
    factory: Arc<MockFactory>,
    solver: Arc<MockSolver>,
    admission: Arc<MockAdmission>,
) -> BatchScheduler {
    let store = ResultStore::load(&config.results_file).unwrap();
    BatchScheduler::new(
        config,
        factory,
        solver,
        admission,
        Arc::new(Mutex::new(store)),
    )
}

#[tokio::test]
async fn every_submitted_identifier_gets_exactly_one_terminal_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("resultados.json"));

    let factory = Arc::new(MockFactory::with_default(SessionScript::default()));
    factory.script_for(
        "com-resultados",
        SessionScript::with_pages(vec![vec![record("a"), record("b")]]),
    );
    factory.script_for(
        "sempre-falha",
        SessionScript {
            navigate_failures: usize::MAX,
            ..SessionScript::default()
        },
    );

    let scheduler = scheduler_with(
        config,
        factory,
        Arc::new(MockSolver::new("x7kp2a")),
        Arc::new(MockAdmission::allowing()),
    );

    let identifiers = vec![
        "com-resultados".to_string(),
        "sem-resultados".to_string(),
        "sempre-falha".to_string(),
    ];
    let reports = scheduler.run(identifiers.clone(), None).await.unwrap();

    assert_eq!(reports.len(), 3);
    let by_identifier: Vec<_> = reports.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(by_identifier, identifiers);
    assert_eq!(reports[0].status, JobStatus::Success);
    assert_eq!(reports[0].results.len(), 2);
    assert_eq!(reports[1].status, JobStatus::NoResults);
    assert_eq!(reports[2].status, JobStatus::Error);
    assert!(reports
        .iter()
        .all(|r| r.status.is_terminal()));
}

#[tokio::test]
async fn completed_identifiers_are_not_redispatched_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resultados.json");

    // Persist X as completed, as a previous run would have
    let mut store = ResultStore::load(&path).unwrap();
    store.record(ProcessJob::new("ja-concluido").succeed(vec![record("antigo")]));
    store.checkpoint().unwrap();

    let config = test_config(&path);
    let factory = Arc::new(MockFactory::with_default(SessionScript::default()));
    let scheduler = scheduler_with(
        config,
        factory.clone(),
        Arc::new(MockSolver::new("x7kp2a")),
        Arc::new(MockAdmission::allowing()),
    );

    let reports = scheduler
        .run(
            vec!["ja-concluido".to_string(), "novo".to_string()],
            None,
        )
        .await
        .unwrap();

    // X answered from the store, never re-dispatched
    let opened = factory.opened_identifiers.lock().unwrap().clone();
    assert_eq!(opened, vec!["novo"]);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].identifier, "ja-concluido");
    assert_eq!(reports[0].status, JobStatus::Success);
    assert_eq!(reports[0].results[0].title, "antigo");
}

#[tokio::test]
async fn live_sessions_never_exceed_max_concurrent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("resultados.json"));

    let factory = Arc::new(MockFactory::with_default(SessionScript {
        navigate_delay: Duration::from_millis(20),
        pages: vec![vec![record("r")]],
        ..SessionScript::default()
    }));
    let scheduler = scheduler_with(
        config,
        factory.clone(),
        Arc::new(MockSolver::new("x7kp2a")),
        Arc::new(MockAdmission::allowing()),
    );

    let identifiers: Vec<String> = (1..=7).map(|i| format!("processo-{}", i)).collect();
    let reports = scheduler.run(identifiers, None).await.unwrap();

    assert_eq!(reports.len(), 7);
    assert!(
        factory.peak_sessions() <= 3,
        "peak {} exceeded the bound",
        factory.peak_sessions()
    );
    assert_eq!(factory.opens(), 7);
    assert_eq!(
        factory
            .shared
            .closes
            .load(std::sync::atomic::Ordering::SeqCst),
        7
    );
}

#[tokio::test(start_paused = true)]
async fn denied_admission_dispatches_nothing_and_polls_at_the_fixed_interval() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("resultados.json"));
    let poll_secs = config.admission_poll_secs;
    assert_eq!(poll_secs, 5);

    let factory = Arc::new(MockFactory::with_default(SessionScript::default()));
    let admission = Arc::new(MockAdmission::denying());
    let scheduler = scheduler_with(
        config,
        factory.clone(),
        Arc::new(MockSolver::new("x7kp2a")),
        admission.clone(),
    );

    // The scheduler keeps waiting on the first slice for the whole minute
    let run = scheduler.run(vec!["processo-1".to_string()], None);
    let outcome = timeout(Duration::from_secs(61), run).await;
    assert!(outcome.is_err(), "the batch must still be waiting");

    // Zero slices dispatched
    assert_eq!(factory.opens(), 0);

    // Checks arrive at the fixed interval, not in a busy loop: one check at
    // t=0 and one every 5s after
    let polls = admission.poll_count();
    assert!(
        (12..=14).contains(&polls),
        "expected ~13 polls over 61s, got {}",
        polls
    );
}

#[tokio::test]
async fn terminal_records_are_checkpointed_to_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resultados.json");
    let config = test_config(&path);

    let factory = Arc::new(MockFactory::with_default(SessionScript::default()));
    factory.script_for(
        "sempre-falha",
        SessionScript {
            navigate_failures: usize::MAX,
            ..SessionScript::default()
        },
    );
    let scheduler = scheduler_with(
        config,
        factory,
        Arc::new(MockSolver::new("x7kp2a")),
        Arc::new(MockAdmission::allowing()),
    );

    scheduler
        .run(
            vec!["processo-1".to_string(), "sempre-falha".to_string()],
            None,
        )
        .await
        .unwrap();

    // The overwritten document holds every terminal record, errors included
    let reloaded = ResultStore::load(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.is_completed("processo-1"));
    assert!(!reloaded.is_completed("sempre-falha"));
    assert_eq!(
        reloaded.report_for("sempre-falha").unwrap().status,
        JobStatus::Error
    );
}
