use serde_json::{Value, json};
use worksheet_ingest::ingest::pipeline::milestones;
use worksheet_ingest::services::memory::InMemoryLab;
use worksheet_ingest::{FileOutcome, IngestConfig, IngestPipeline, InstrumentFile};

use crate::utils::{Harness, csv_export, scratch_dir, tab_export};

fn decode(encoded: &str) -> Value {
    serde_json::from_str(encoded).expect("valid JSON")
}

#[tokio::test]
async fn normal_row_reaches_both_worksheets() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);

    let file = InstrumentFile::in_memory("B1.csv", csv_export(&["101_A,1.23400,0.5"]));
    let report = h.pipeline().run(&[file]).await;
    assert!(report.succeeded());

    let patches = h.lab.batch_patches("b1");
    assert_eq!(patches.len(), 1);
    assert_eq!(decode(&patches[0].testing_file_order), json!([101]));
    assert_eq!(decode(&patches[0].control_data), json!({}));

    let results = h.lab.instrument_results(101);
    assert_eq!(results.get("cbd", 101), Some(1.234));
    assert_eq!(results.get("thc", 101), Some(0.5));
    assert!(!results.0.contains_key("total_cannabinoids"));
    assert_eq!(h.lab.updates(), vec![(101, true)]);
    assert!(h.console.contains("All files processed successfully!"));
}

#[tokio::test]
async fn spiked_qc_sample_is_recorded_as_control_data() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 205, 2, true);

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["205-spk_B,3.1,0.2"]));
    let report = h.pipeline().run(&[file]).await;
    assert!(report.succeeded());

    let patch = &h.lab.batch_patches("b1")[0];
    assert_eq!(decode(&patch.testing_file_order), json!(["matrix_spike_205"]));
    assert_eq!(
        decode(&patch.control_data),
        json!({
            "matrix_spike_205": {
                "qc_type": "matrix_spike",
                "sample_id": 2,
                "test_id": 205,
                "cbd_raw": 3.1,
                "thc_raw": 0.2
            }
        })
    );
    assert!(h.lab.updates().is_empty());
    assert!(h.console.contains("Adding matrix_spike (test 205, sample 2)"));
}

#[tokio::test]
async fn named_qc_rows_are_counted_per_type() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);

    let file = InstrumentFile::in_memory(
        "b1.csv",
        csv_export(&[
            "CCV-1_0815,10,11",
            "101_A,1,2",
            "ccv_late,9,9",
            "MB_x,0,0",
            "mystery_q,1,1",
        ]),
    );
    let report = h.pipeline().run(&[file]).await;

    let FileOutcome::Completed(summary) = &report.outcomes[0] else {
        panic!("file failed: {:?}", report.outcomes[0]);
    };
    assert_eq!(summary.rows_recorded, 4);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.qc_entries, 3);

    let patch = &h.lab.batch_patches("b1")[0];
    assert_eq!(
        decode(&patch.testing_file_order),
        json!(["ccv_1", 101, "ccv_2", "mb_1"])
    );
    let control = decode(&patch.control_data);
    assert_eq!(control["ccv_1"], json!({"qc_type": "ccv", "cbd_raw": 10, "thc_raw": 11}));
    assert_eq!(control["ccv_2"]["cbd_raw"], json!(9));
    assert!(h.console.contains("Skipping unrecognized sample: mystery"));
}

#[tokio::test]
async fn every_listing_page_is_fetched() {
    let h = Harness::with_lab(InMemoryLab::new().with_page_size(2));
    h.add_batch("b1");
    for id in 101..=105 {
        h.add_test("b1", id, id, false);
    }

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["105_A,4,5"]));
    let report = h.pipeline().run(&[file]).await;
    assert!(report.succeeded());

    let pages: Vec<u32> = h.lab.list_calls().into_iter().map(|(_, page)| page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    assert_eq!(decode(&h.lab.batch_patches("b1")[0].testing_file_order), json!([105]));
}

#[tokio::test]
async fn sample_readings_are_stored_on_its_first_test() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.add_test("b1", 102, 1, false);

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["102_A,7.5,1"]));
    h.pipeline().run(&[file]).await;

    assert_eq!(h.lab.updates(), vec![(101, true)]);
    assert_eq!(h.lab.instrument_results(101).get("cbd", 102), Some(7.5));
    assert!(h.lab.worksheet(102).is_none());
}

#[tokio::test]
async fn tab_export_is_read_from_disk() {
    let h = Harness::new();
    h.add_batch("b2");
    h.add_test("b2", 101, 1, false);
    h.add_test("b2", 102, 2, false);

    let dir = scratch_dir("tab-export");
    let path = dir.join("B2.txt");
    std::fs::write(
        &path,
        tab_export(&["1\t101_A\t2.5\t0.1", "\t\t\t", "2\t102_B\t3\t"]),
    )
    .expect("write export");

    let report = h.pipeline().run(&[InstrumentFile::from_path(&path)]).await;
    assert!(report.succeeded());
    assert_eq!(
        decode(&h.lab.batch_patches("b2")[0].testing_file_order),
        json!([101, 102])
    );
    assert_eq!(h.lab.instrument_results(101).get("cbd", 101), Some(2.5));
    assert_eq!(h.lab.instrument_results(102).get("thc", 102), Some(0.0));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn forced_format_overrides_the_extension() {
    let h = Harness::new();
    h.add_batch("b3");
    h.add_test("b3", 101, 1, false);

    let config = IngestConfig {
        format: Some(worksheet_ingest::FileFormat::TabExport),
        run_worksheet_calculations: false,
        ..IngestConfig::default()
    };
    let mut pipeline = IngestPipeline::new(h.services(), config);
    let file = InstrumentFile::in_memory("b3.csv", tab_export(&["1\t101_A\t1\t2"]));
    assert!(pipeline.run(&[file]).await.succeeded());
    assert_eq!(h.lab.updates(), vec![(101, false)]);
}

#[tokio::test]
async fn progress_walks_every_milestone() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1"]));
    h.pipeline().run(&[file]).await;

    assert_eq!(
        h.progress.percentages(),
        vec![
            0,
            milestones::FILE_READ,
            milestones::BATCH_FETCHED,
            milestones::PARAMETERS_FETCHED,
            milestones::TESTS_LISTED,
            milestones::ROWS_CLASSIFIED,
            milestones::TESTS_MERGED,
            milestones::DONE,
        ]
    );
}

#[tokio::test]
async fn parameters_are_shared_across_files() {
    let h = Harness::new();
    for batch in ["b1", "b2"] {
        h.add_batch(batch);
    }
    h.add_test("b1", 101, 1, false);
    h.add_test("b2", 201, 2, false);

    let files = [
        InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1,1"])),
        InstrumentFile::in_memory("b2.csv", csv_export(&["201_A,2,2"])),
    ];
    let mut pipeline = h.pipeline();
    assert!(pipeline.run(&files).await.succeeded());

    assert_eq!(h.lab.parameter_fetches().len(), 1);
    assert_eq!(pipeline.parameter_cache().len(), 1);
    assert!(h.console.contains("Using cached parameters for Assay 7"));
}
