use scraper::Html;

use super::*;
use crate::commands::StageOutcome;
use crate::config::PipelineConfig;
use crate::document::fakes::StaticSource;
use crate::model::{ClassStageRecord, EntityRecord, EntityStageRecord, LoadType};
use crate::store::RecordStore;

const FEE_TABLE: &str = "<table>\
    <tr><td></td><td>Class A</td><td>Class C</td><td>Class I</td></tr>\
    <tr><td>Maximum Sales Charge (Load) Imposed on Purchases</td><td>5.75%</td><td>None</td><td>None</td></tr>\
    <tr><td>Maximum Deferred Sales Charge (Load)</td><td>None</td><td>1.00%</td><td>None</td></tr>\
    </table>";

const UNRELATED_TABLE: &str = "<table><tr><td>Year</td><td>Return</td></tr></table>";

fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[test]
fn fee_tables_are_tables_mentioning_maximum() {
    let html = Html::parse_document(&format!("{UNRELATED_TABLE}{FEE_TABLE}"));
    let tables = extract_fee_tables(&html).expect("tables");

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0][0], vec!["", "Class A", "Class C", "Class I"]);
}

#[test]
fn clean_cell_collapses_breaks_and_backslashes() {
    assert_eq!(clean_cell(" 5.75%\r\n \\ "), "5.75%");
    assert_eq!(clean_cell("Class\nA"), "Class A");
}

#[test]
fn read_class_loads_maps_front_and_back_charges_per_class() {
    let table = rows(&[
        &["Class:", "Class A", "Class C", "Class I"],
        &["Maximum Sales Charge (Load) Imposed on Purchases", "5.75%", "None", "None"],
        &["Maximum Deferred Sales Charge (Load)", "None", "1.00%", "None"],
    ]);

    let reading = read_class_loads(&table);
    assert_eq!(reading.classes, vec!["Class A", "Class C", "Class I"]);

    let loads = classify_loads(&reading);
    assert_eq!(loads["Class A"], LoadType::Frontend);
    assert_eq!(loads["Class C"], LoadType::Backend);
    assert_eq!(loads["Class I"], LoadType::None);
}

#[test]
fn deferred_row_never_counts_as_front_load() {
    let table = rows(&[
        &["", "Class B"],
        &["Maximum Deferred Sales Charge", "5%"],
        &["Maximum Sales Charge Imposed on Purchases", "None"],
    ]);

    let loads = classify_loads(&read_class_loads(&table));
    assert_eq!(loads["Class B"], LoadType::Backend);
}

#[test]
fn back_charge_without_percent_is_skipped_and_class_dropped() {
    let table = rows(&[
        &["", "Class A", "Class C"],
        &["Maximum Sales Charge", "None", "None"],
        &["Maximum Deferred Sales Charge", "None", "1"],
    ]);

    let reading = read_class_loads(&table);
    assert_eq!(reading.back.get("Class A"), Some(&false));
    assert!(!reading.back.contains_key("Class C"));

    let loads = classify_loads(&reading);
    assert_eq!(loads.len(), 1);
    assert_eq!(loads["Class A"], LoadType::None);
}

#[test]
fn field_lists_follow_load_type() {
    let settings = PipelineConfig::default().pipeline;

    let both = field_list_for(LoadType::Both, &settings);
    assert_eq!(&both[..3], &["NONDIVERSIFIED", "INCOME_FREQUENCY", "AUDITOR"]);
    assert!(both.iter().any(|field| field == "INITPURCHASE_AMOUNT"));
    assert!(both.iter().any(|field| field == "NAV_REINSTATEMENT_ALLOWED"));
    assert!(both.iter().any(|field| field == "OBJECT_GOAL_TYPE"));

    let front = field_list_for(LoadType::Frontend, &settings);
    assert!(front.iter().any(|field| field == "SUBPURCHASE_AMOUNT"));
    assert!(!front.iter().any(|field| field == "NAV_REINSTATEMENT_ALLOWED"));

    let back = field_list_for(LoadType::Backend, &settings);
    assert!(back.iter().any(|field| field == "NAV_REINSTATEMENT_ALLOWED"));
    assert!(!back.iter().any(|field| field == "INITPURCHASE_AMOUNT"));

    assert_eq!(field_list_for(LoadType::None, &settings), settings.fund_level_fields);
}

#[test]
fn classify_document_pairs_tables_in_order_and_warns_on_mismatch() {
    let settings = PipelineConfig::default().pipeline;
    let html = Html::parse_document(FEE_TABLE);
    let entities = vec!["Alpha Fund".to_string(), "Beta Fund".to_string()];

    let records = classify_document("1234567", &html, &entities, &settings).expect("classify");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity, "Alpha Fund");
    assert_eq!(records[0].table_index, 0);
    assert_eq!(records[0].load_type.len(), 3);
    assert_eq!(records[0].field_list["Class I"], settings.fund_level_fields);
    assert_eq!(records[0].warnings.len(), 1);
}

#[test]
fn classifier_requires_entity_record_then_stores_per_fund() {
    let config = PipelineConfig::default();
    let store = RecordStore::open_in_memory().expect("store");
    let source = StaticSource::default().with(
        "1234567",
        &format!("<html><body><p>Alpha Fund</p>{FEE_TABLE}</body></html>"),
    );
    let classifier = LoadClassifier {
        config: &config,
        store: &store,
        source: &source,
    };

    assert_eq!(
        classifier.classify("1234567", false).expect("classify"),
        StageOutcome::Empty
    );

    let entities = EntityStageRecord {
        document_id: "1234567".to_string(),
        source_hash: String::new(),
        created_at: String::new(),
        entities: vec![EntityRecord {
            name: "Alpha Fund".to_string(),
            ordinal: 0,
            text_offset: 0,
            markup_offset: 0,
        }],
    };
    store
        .insert_one(&config.store.entities_collection, "1234567", &entities)
        .expect("insert");

    assert_eq!(
        classifier.classify("1234567", false).expect("classify"),
        StageOutcome::Stored
    );
    let records: Vec<ClassStageRecord> = store
        .find_all(&config.store.classes_collection, "1234567")
        .expect("records");
    assert_eq!(records.len(), 1);
    assert!(records[0].warnings.is_empty());
    assert_eq!(records[0].load_type["Class A"], LoadType::Frontend);

    assert_eq!(
        classifier.classify("1234567", false).expect("classify"),
        StageOutcome::AlreadyPresent
    );
}

fn located(name: &str, ordinal: usize, text_offset: i64) -> EntityRecord {
    EntityRecord {
        name: name.to_string(),
        ordinal,
        text_offset,
        markup_offset: text_offset,
    }
}

#[test]
fn unlocated_entities_are_paired_after_located_ones() {
    let record = EntityStageRecord {
        document_id: "1234567".to_string(),
        source_hash: String::new(),
        created_at: String::new(),
        entities: vec![
            located("Delta Fund", 0, -1),
            located("Alpha Fund", 1, 100),
            located("Beta Fund", 2, -1),
            located("Gamma Fund", 3, 900),
        ],
    };
    let ordered = record.ordered_names();
    assert_eq!(ordered, vec!["Alpha Fund", "Gamma Fund", "Delta Fund", "Beta Fund"]);

    let back_only = FEE_TABLE.replace("5.75%", "None");
    let html = Html::parse_document(&format!("{FEE_TABLE}{back_only}"));
    let settings = PipelineConfig::default().pipeline;
    let records = classify_document("1234567", &html, &ordered, &settings).expect("classify");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].entity, "Alpha Fund");
    assert_eq!(records[0].load_type["Class A"], LoadType::Frontend);
    assert_eq!(records[1].entity, "Gamma Fund");
    assert_eq!(records[1].load_type["Class A"], LoadType::None);
}
