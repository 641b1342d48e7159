mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use validator_worker::artifacts::StandardWriters;
use validator_worker::storage::InMemoryObjectStore;

fn run_job(rows: usize, issues: usize, merge: bool) -> (validator_worker::RunReport, Arc<InMemoryObjectStore>, usize) {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(UPLOADS, "input.csv", csv_with_rows(rows));

    let mut engine = FixtureEngine::new().with_issues(issues);
    if merge {
        engine = engine.with_merge(0, 1);
    }
    let orchestrator = orchestrator(
        root.path(),
        store.clone(),
        Arc::new(engine),
        Arc::new(StandardWriters::new()),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let report = runtime
        .block_on(orchestrator.process_message(&job_payload("input.csv", None)))
        .unwrap();
    (report, store, workspace_entries(root.path()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the summary reports input rows and issue count exactly
    #[test]
    fn summary_counts_match_input(rows in 0usize..200, issues in 0usize..20) {
        let (report, store, leftover) = run_job(rows, issues, false);

        prop_assert_eq!(report.summary.total_rows_checked, rows);
        prop_assert_eq!(report.summary.total_issues, issues.min(rows));
        prop_assert_eq!(leftover, 0);

        let summary = String::from_utf8(
            store.object(OUTPUTS, &format!("{}/Summary.txt", report.run_id)).unwrap(),
        ).unwrap();
        let rows_line = format!("total_rows_checked={rows}");
        prop_assert!(summary.lines().any(|line| line == rows_line));
    }

    /// Property: the merge map is published exactly when rows were merged
    #[test]
    fn merge_map_published_only_for_merges(rows in 2usize..50, merge in any::<bool>()) {
        let (report, store, _) = run_job(rows, 0, merge);

        prop_assert_eq!(report.has_merge_map(), merge);
        prop_assert_eq!(report.published.len(), if merge { 5 } else { 4 });

        let merged = store
            .object(OUTPUTS, &format!("{}/merged_dataset.csv", report.run_id))
            .unwrap();
        let merged_rows = String::from_utf8(merged).unwrap().lines().count() - 1;
        prop_assert_eq!(merged_rows, if merge { rows - 1 } else { rows });
    }
}
