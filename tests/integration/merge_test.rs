use serde_json::{Map, Value, json};
use worksheet_ingest::InstrumentFile;

use crate::utils::{Harness, csv_export};

fn document(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[tokio::test]
async fn merge_keeps_everything_the_file_does_not_mention() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.lab.set_worksheet(
        101,
        document(json!({
            "analyst": "kv",
            "ws_instrument_results": {
                "value": r#"{"cbd":{"101":1.0,"999":9.9},"legacy":{"101":4.2}}"#
            }
        })),
    );

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1.5,0.25"]));
    assert!(h.pipeline().run(&[file]).await.succeeded());

    let stored = h.lab.worksheet(101).expect("worksheet written");
    assert_eq!(stored["analyst"], json!("kv"));

    let results = h.lab.instrument_results(101);
    assert_eq!(results.get("cbd", 101), Some(1.5));
    assert_eq!(results.get("cbd", 999), Some(9.9));
    assert_eq!(results.get("thc", 101), Some(0.25));
    assert_eq!(results.get("legacy", 101), Some(4.2));
}

#[tokio::test]
async fn merge_keeps_stored_values_that_are_not_numbers() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.lab.set_worksheet(
        101,
        document(json!({
            "ws_instrument_results": {
                "value": r#"{"cbd":{"100":9.9,"103":null},"thc":{"100":"ND"}}"#
            }
        })),
    );

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,1.5,2"]));
    assert!(h.pipeline().run(&[file]).await.succeeded());

    let results = h.lab.instrument_results(101);
    assert_eq!(results.get("cbd", 100), Some(9.9));
    assert_eq!(results.raw("cbd", 103), Some(&Value::Null));
    assert_eq!(results.raw("thc", 100), Some(&json!("ND")));
    assert_eq!(results.get("cbd", 101), Some(1.5));

    let stored = h.lab.worksheet(101).expect("worksheet written");
    let encoded = stored["ws_instrument_results"]["value"]
        .as_str()
        .expect("encoded results");
    assert!(encoded.contains(r#""101":2"#), "{encoded}");
    assert!(!encoded.contains(r#""101":2.0"#), "{encoded}");
}

#[tokio::test]
async fn bare_encoded_results_are_accepted() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.lab.set_worksheet(
        101,
        document(json!({ "ws_instrument_results": r#"{"thc":{"100":3.0}}"# })),
    );

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,2,1"]));
    assert!(h.pipeline().run(&[file]).await.succeeded());

    let stored = h.lab.worksheet(101).expect("worksheet written");
    assert!(stored["ws_instrument_results"]["value"].is_string());
    let results = h.lab.instrument_results(101);
    assert_eq!(results.get("thc", 100), Some(3.0));
    assert_eq!(results.get("thc", 101), Some(1.0));
}

#[tokio::test]
async fn unparseable_results_start_over() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.lab.set_worksheet(
        101,
        document(json!({ "ws_instrument_results": { "value": "{not json" } })),
    );

    let file = InstrumentFile::in_memory("b1.csv", csv_export(&["101_A,2,1"]));
    assert!(h.pipeline().run(&[file]).await.succeeded());
    assert_eq!(h.lab.instrument_results(101).get("cbd", 101), Some(2.0));
}

#[tokio::test]
async fn ingesting_twice_changes_nothing() {
    let h = Harness::new();
    h.add_batch("b1");
    h.add_test("b1", 101, 1, false);
    h.add_test("b1", 205, 2, true);
    h.lab.set_worksheet(101, document(json!({ "analyst": "kv" })));

    let file = InstrumentFile::in_memory(
        "b1.csv",
        csv_export(&["101_A,1.23456789,0.5", "205-spk_B,3.1,0.2", "ccv_x,1,1"]),
    );

    let mut pipeline = h.pipeline();
    assert!(pipeline.run(std::slice::from_ref(&file)).await.succeeded());
    let first = h.lab.worksheet(101);
    assert!(pipeline.run(&[file]).await.succeeded());
    let second = h.lab.worksheet(101);

    assert_eq!(first, second);
    let patches = h.lab.batch_patches("b1");
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[0], patches[1]);
    assert_eq!(h.lab.instrument_results(101).get("cbd", 101), Some(1.2346));
}
