use std::collections::BTreeMap;

use crate::config::PipelineSection;
use crate::model::LoadType;

const FRONT_LOAD_LABEL: &str = "maximum sales charge";
const BACK_LOAD_LABEL: &str = "deferred sales charge";
const HEADER_PLACEHOLDER: &str = "Class:";
const ABSENT_MARKER: &str = "none";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassLoadReading {
    pub classes: Vec<String>,
    pub front: BTreeMap<String, bool>,
    pub back: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChargeKind {
    Front,
    Back,
}

pub fn read_class_loads(table: &[Vec<String>]) -> ClassLoadReading {
    let mut reading = ClassLoadReading::default();

    for row in table {
        if reading.classes.is_empty() {
            let headers = row
                .iter()
                .filter(|cell| !cell.is_empty() && cell.as_str() != HEADER_PLACEHOLDER)
                .cloned()
                .collect::<Vec<String>>();
            if !headers.is_empty() {
                reading.classes = headers;
            }
        }
        if reading.classes.is_empty() {
            continue;
        }

        if reading.front.is_empty() {
            read_charge_row(row, ChargeKind::Front, &reading.classes, &mut reading.front);
        }
        if reading.back.is_empty() {
            read_charge_row(row, ChargeKind::Back, &reading.classes, &mut reading.back);
        }
        if !reading.front.is_empty() && !reading.back.is_empty() {
            break;
        }
    }

    reading
}

fn read_charge_row(
    row: &[String],
    kind: ChargeKind,
    classes: &[String],
    flags: &mut BTreeMap<String, bool>,
) {
    let Some(label_index) = row.iter().position(|cell| is_charge_label(cell, kind)) else {
        return;
    };

    let mut class_index = 0;
    for cell in &row[label_index + 1..] {
        if class_index >= classes.len() {
            break;
        }
        let Some(present) = charge_present(cell, kind) else {
            continue;
        };
        flags.insert(classes[class_index].clone(), present);
        class_index += 1;
    }
}

fn is_charge_label(cell: &str, kind: ChargeKind) -> bool {
    let lowered = cell.to_lowercase();
    match kind {
        ChargeKind::Front => {
            contains_every_word(&lowered, FRONT_LOAD_LABEL) && !lowered.contains("deferred")
        }
        ChargeKind::Back => contains_every_word(&lowered, BACK_LOAD_LABEL),
    }
}

fn contains_every_word(text: &str, phrase: &str) -> bool {
    phrase.split(' ').all(|word| text.contains(word))
}

fn charge_present(cell: &str, kind: ChargeKind) -> Option<bool> {
    if cell.to_lowercase().contains(ABSENT_MARKER) {
        return Some(false);
    }
    let has_number = cell.chars().any(|character| character.is_ascii_digit());
    let counts = match kind {
        ChargeKind::Front => has_number,
        ChargeKind::Back => has_number && cell.contains('%'),
    };
    counts.then_some(true)
}

pub fn classify_loads(reading: &ClassLoadReading) -> BTreeMap<String, LoadType> {
    reading
        .classes
        .iter()
        .filter_map(|class| {
            let front = reading.front.get(class)?;
            let back = reading.back.get(class)?;
            Some((class.clone(), LoadType::from_flags(*front, *back)))
        })
        .collect()
}

pub fn field_list_for(load_type: LoadType, settings: &PipelineSection) -> Vec<String> {
    let mut fields = settings.fund_level_fields.clone();
    match load_type {
        LoadType::Both => {
            fields.extend(settings.both_load_fields.iter().cloned());
            fields.extend(settings.frontend_load_fields.iter().cloned());
            fields.extend(settings.backend_load_fields.iter().cloned());
        }
        LoadType::Frontend => {
            fields.extend(settings.frontend_load_fields.iter().cloned());
            fields.extend(settings.both_load_fields.iter().cloned());
        }
        LoadType::Backend => {
            fields.extend(settings.backend_load_fields.iter().cloned());
            fields.extend(settings.both_load_fields.iter().cloned());
        }
        LoadType::None => {}
    }
    fields
}
