use worksheet_ingest::ingest::MergeSummary;
use worksheet_ingest::{FileOutcome, InstrumentFile};

use crate::utils::{Harness, PARAMETER_SET, csv_export};

fn failed_error(outcome: &FileOutcome) -> &str {
    match outcome {
        FileOutcome::Failed { error, .. } => error,
        FileOutcome::Completed(summary) => panic!("expected a failure, got {summary:?}"),
    }
}

#[tokio::test]
async fn failed_test_update_does_not_stop_other_samples() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.add_test("b1", 102, 2, false);
    h.lab.fail_update(101);

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1", "102_A,2,2"]));
    let report = h.pipeline().run(&[file]).await;
    assert!(report.succeeded());

    let FileOutcome::Completed(summary) = &report.outcomes[0] else {
        panic!("file failed");
    };
    assert_eq!(
        summary.merge,
        MergeSummary {
            written: 1,
            failed: 1,
            skipped_qc: 0,
        }
    );
    assert_eq!(h.lab.updates(), vec![(102, true)]);
    assert_eq!(h.lab.batch_patches("b1").len(), 1);
    assert!(h.console.contains("Error updating test worksheet for sample 1"));
}

#[tokio::test]
async fn rejected_batch_patch_fails_only_that_file() {
    let h = Harness::new();
    for batch in ["b1", "b2"] {
        h.add_batch(batch);
    }
    h.add_test("b1", 101, 1, false);
    h.add_test("b2", 201, 2, false);
    h.lab.fail_patch("b1");

    let files = [
        InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1"])),
        InstrumentFile::in_memory("b2.csv", csv_export(&["201_A,2,2"])),
    ];
    let report = h.pipeline().run(&files).await;

    assert!(!report.succeeded());
    assert_eq!(report.failed(), 1);
    assert!(failed_error(&report.outcomes[0]).starts_with("Persistence error"));
    assert!(report.outcomes[1].is_success());

    // test worksheets written before the rejected patch stay written
    assert_eq!(h.lab.updates(), vec![(101, true), (201, true)]);
    assert_eq!(h.lab.batch_patches("b2").len(), 1);
    assert!(h.console.contains("Finished with 1 of 2 files failed"));
}

#[tokio::test]
async fn unknown_batch_aborts_only_that_file() {
    let h = Harness::new();
    h.add_batch("b2");
    h.add_test("b2", 201, 2, false);

    let files = [
        InstrumentFile::in_memory("missing.csv", csv_export(&["101_A,1,1"])),
        InstrumentFile::in_memory("b2.csv", csv_export(&["201_A,2,2"])),
    ];
    let report = h.pipeline().run(&files).await;

    assert!(failed_error(&report.outcomes[0]).contains("Error fetching batch missing"));
    assert!(report.outcomes[1].is_success());
    assert!(h.lab.batch_patches("missing").is_empty());
    assert!(h.console.contains("Error processing file missing.csv"));
}

#[tokio::test]
async fn failed_parameter_fetch_aborts_before_any_write() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.lab.fail_parameters(PARAMETER_SET);

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1"]));
    let report = h.pipeline().run(&[file]).await;

    assert!(failed_error(&report.outcomes[0]).starts_with("Lookup error"));
    assert!(h.lab.list_calls().is_empty());
    assert!(h.lab.updates().is_empty());
    assert!(h.lab.batch_patches("b1").is_empty());
}

#[tokio::test]
async fn failed_test_listing_aborts_the_file() {
    let h = Harness::new();
    h.add_batch("b1");
    h.lab.fail_listing("b1");

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1"]));
    let report = h.pipeline().run(&[file]).await;

    assert!(failed_error(&report.outcomes[0]).contains("tests page 1"));
    assert!(h.lab.batch_patches("b1").is_empty());
}

#[tokio::test]
async fn unreadable_file_is_reported() {
    let h = Harness::new();
    let file = InstrumentFile::from_path("/nonexistent/worksheet-ingest/b9.txt");
    let report = h.pipeline().run(&[file]).await;

    assert!(failed_error(&report.outcomes[0]).starts_with("Parse error in b9.txt"));
    assert!(h.lab.parameter_fetches().is_empty());
}

#[tokio::test]
async fn unavailable_sample_is_treated_as_normal() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, true);
    h.lab.fail_sample(1);

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1"]));
    let report = h.pipeline().run(&[file]).await;
    assert!(report.succeeded());

    assert_eq!(h.lab.sample_fetches(), vec![1]);
    assert_eq!(h.lab.updates(), vec![(101, true)]);
    assert!(h.console.contains("Could not fetch sample 1"));
}
