use super::*;
use crate::commands::StageOutcome;
use crate::config::PipelineConfig;
use crate::document::Document;
use crate::document::fakes::StaticSource;
use crate::model::{EntityStageRecord, NOT_LOCATED};
use crate::services::ChatMessage;
use crate::services::fakes::{FailingGenerator, ScriptedGenerator};
use crate::store::RecordStore;

const PROSPECTUS: &str = "<html><body>\
    <p>Prospectus for the Alpha Fund and the Beta Fund</p>\
    <p>Alpha Fund</p><p>Investment Objective</p><p>The fund seeks growth.</p>\
    <p>Beta Fund</p><p>Investment Objective</p><p>The fund seeks income.</p>\
    </body></html>";

#[test]
fn parse_entity_names_strips_prefix_and_deduplicates() {
    let names = parse_entity_names("Fund Name: Alpha Fund, Beta Fund, Alpha Fund, ");
    assert_eq!(names, vec!["Alpha Fund", "Beta Fund"]);

    let trailing = parse_entity_names("Fund Name: Alpha Fund., Beta Fund, Alpha Fund,");
    assert_eq!(trailing, vec!["Alpha Fund", "Beta Fund"]);

    assert!(parse_entity_names("   ").is_empty());
}

#[test]
fn build_discovery_messages_appends_excerpt_after_primer() {
    let primer = vec![
        ChatMessage::system("List the funds."),
        ChatMessage::assistant("Fund Name: Example Fund"),
    ];
    let messages = build_discovery_messages(&primer, "Cover page text");

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].role, "user");
    assert_eq!(messages[2].content, "Cover page text\nFund Name: ");
}

#[test]
fn text_offset_skips_mentions_without_a_nearby_header() {
    let locator = OffsetLocator::new().expect("locator");
    let padding = " x".repeat(200);
    let visible = format!("Alpha Fund{padding}Alpha Fund Investment Objective: growth.");

    let offset = locator
        .locate_text_offset(&visible, "Alpha Fund")
        .expect("offset");
    assert_eq!(offset, 410);
}

#[test]
fn text_offset_rejects_header_followed_by_fees() {
    let locator = OffsetLocator::new().expect("locator");
    let visible = "Alpha Fund Investment Objective Fees and Expenses table. \
                   Alpha Fund Investment Objective The fund seeks growth.";
    let expected = visible.rfind("Alpha Fund").expect("second mention") as i64;

    let offset = locator
        .locate_text_offset(visible, "alpha fund")
        .expect("offset");
    assert_eq!(offset, expected);
}

#[test]
fn text_offset_windows_count_characters_not_bytes() {
    let locator = OffsetLocator::new().expect("locator");

    let near = format!("Alpha Fund{}Investment Objective", "\u{a0}".repeat(150));
    assert_eq!(
        locator.locate_text_offset(&near, "Alpha Fund").expect("offset"),
        0
    );

    let far = format!("Alpha Fund{}Investment Objective", "\u{a0}".repeat(300));
    assert_eq!(
        locator.locate_text_offset(&far, "Alpha Fund").expect("offset"),
        NOT_LOCATED
    );

    let fees_close = format!("Alpha Fund Investment Objective{}fees", "\u{2019}".repeat(20));
    assert_eq!(
        locator.locate_text_offset(&fees_close, "Alpha Fund").expect("offset"),
        NOT_LOCATED
    );
}

#[test]
fn markup_window_counts_characters_not_bytes() {
    let raw = format!(
        "<p>Alpha Fund</p>{}<h2>Investment Objective</h2>",
        "\u{2019}".repeat(1000)
    );
    assert_eq!(
        locate_markup_offset(&raw, "Alpha Fund").expect("offset"),
        3
    );
}

#[test]
fn text_offset_of_missing_name_is_not_located() {
    let locator = OffsetLocator::new().expect("locator");
    let offset = locator
        .locate_text_offset("Alpha Fund Investment Objective", "Gamma Fund")
        .expect("offset");
    assert_eq!(offset, NOT_LOCATED);
}

#[test]
fn markup_offset_prefers_context_then_third_occurrence() {
    let with_context = "<p>Alpha Fund</p><p>Alpha Fund</p><h2>Fees and Expenses</h2>";
    assert_eq!(
        locate_markup_offset(with_context, "Alpha Fund").expect("offset"),
        3
    );

    let without_context = "<p>Alpha Fund</p><p>Alpha Fund</p><p>Alpha Fund</p><p>Alpha Fund</p>";
    let third = without_context
        .match_indices("Alpha Fund")
        .nth(2)
        .map(|(index, _)| index as i64)
        .expect("third mention");
    assert_eq!(
        locate_markup_offset(without_context, "Alpha Fund").expect("offset"),
        third
    );

    assert_eq!(
        locate_markup_offset("<p>Alpha Fund</p>", "Alpha Fund").expect("offset"),
        NOT_LOCATED
    );
}

#[test]
fn single_entity_owns_the_whole_document() {
    let locator = OffsetLocator::new().expect("locator");
    let document = Document::from_markup("1234567", "<p>No mention here</p>".to_string());

    let entities =
        locate_entities(&locator, &document, &["Solo Fund".to_string()]).expect("entities");
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].text_offset, 0);
    assert_eq!(entities[0].markup_offset, 0);
}

#[test]
fn resolver_stores_located_entities_once() {
    let config = PipelineConfig::default();
    let store = RecordStore::open_in_memory().expect("store");
    let source = StaticSource::default().with("1234567", PROSPECTUS);
    let generator = ScriptedGenerator::new(&["Fund Name: Alpha Fund, Beta Fund"]);
    let primer = load_entity_prompt(None).expect("primer");
    let locator = OffsetLocator::new().expect("locator");
    let resolver = EntityResolver {
        config: &config,
        store: &store,
        source: &source,
        generator: &generator,
        primer: &primer,
        locator: &locator,
    };

    let outcome = resolver.resolve("1234567", false).expect("resolve");
    assert_eq!(outcome, StageOutcome::Stored);

    let record: EntityStageRecord = store
        .find_one(&config.store.entities_collection, "1234567")
        .expect("query")
        .expect("record");
    assert_eq!(record.entities.len(), 2);
    assert!(record.entities.iter().all(|entity| entity.is_located()));
    assert!(record.entities[0].text_offset < record.entities[1].text_offset);
    assert_eq!(record.ordered_names(), vec!["Alpha Fund", "Beta Fund"]);

    let again = resolver.resolve("1234567", false).expect("resolve");
    assert_eq!(again, StageOutcome::AlreadyPresent);
    assert_eq!(generator.calls.borrow().len(), 1);
}

#[test]
fn resolver_degrades_when_generation_or_retrieval_fails() {
    let config = PipelineConfig::default();
    let store = RecordStore::open_in_memory().expect("store");
    let source = StaticSource::default().with("1234567", PROSPECTUS);
    let generator = FailingGenerator;
    let primer = load_entity_prompt(None).expect("primer");
    let locator = OffsetLocator::new().expect("locator");
    let resolver = EntityResolver {
        config: &config,
        store: &store,
        source: &source,
        generator: &generator,
        primer: &primer,
        locator: &locator,
    };

    assert_eq!(
        resolver.resolve("1234567", false).expect("resolve"),
        StageOutcome::Empty
    );
    assert_eq!(
        resolver.resolve("7654321", false).expect("resolve"),
        StageOutcome::Empty
    );
    assert!(
        !store
            .exists(&config.store.entities_collection, "1234567")
            .expect("exists")
    );
}
