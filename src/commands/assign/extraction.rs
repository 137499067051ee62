use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::model::NONE_ANSWER;
use crate::services::{ChatMessage, TextGenerator};

pub const MAX_PROMPT_EXAMPLES: usize = 20;

const BULLETS: &[char] = &['•', '‣', '◦', '⁃', '∙', '·', '▪', '■', '●', '○'];

const INCOME_FREQUENCY_INSTRUCTION: &str = "Your task is to extract the frequency that a fund \
intends to make income payments (dividends or interest) from given paragraphs. Provide the \
extracted frequency, or respond 'None' if no such frequency is found.";

const AUDITOR_INSTRUCTION: &str = "Your task is to identify the name of the company acting as \
the independent accountant for the fund and auditing the fund's financial statements. Provide \
the company name, or respond 'None' if no such name is found.";

pub fn clean_paragraph(text: &str) -> String {
    text.nfkd()
        .filter(|character| !BULLETS.contains(character))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn system_prompt(field: &str, class_name: &str, examples: &[String]) -> String {
    match field {
        "INCOME_FREQUENCY" => return INCOME_FREQUENCY_INSTRUCTION.to_string(),
        "AUDITOR" => return AUDITOR_INSTRUCTION.to_string(),
        _ => {}
    }

    let target = if class_name.to_lowercase().contains("class") {
        class_name.to_string()
    } else {
        format!("Class {class_name}")
    };
    let mut prompt = format!(
        "Extract a value from the paragraph for {target} that is similar to the given examples. \
         Answer with only the value and no other information. If there is no such value in the \
         paragraph, return \"None\". Here are the example sentences:"
    );
    for example in examples {
        prompt.push_str(&format!("\n- \"{}\"", example.trim()));
    }
    prompt
}

pub fn build_extraction_messages(
    field: &str,
    class_name: &str,
    examples: &[String],
    paragraph: &str,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(field, class_name, examples)),
        ChatMessage::user(clean_paragraph(paragraph)),
    ]
}

pub fn normalize_answer(answer: &str) -> String {
    answer
        .trim()
        .trim_matches(|character| character == '"' || character == '\'')
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_string()
}

pub fn extract_answers(
    generator: &dyn TextGenerator,
    paragraphs: &[String],
    field: &str,
    class_name: &str,
    examples: &[String],
) -> Vec<String> {
    let mut answers = Vec::<String>::new();

    for paragraph in paragraphs {
        let messages = build_extraction_messages(field, class_name, examples, paragraph);
        let answer = match generator.generate(&messages) {
            Ok(raw) => normalize_answer(&raw),
            Err(err) => {
                warn!(field, class = class_name, error = %err, "value extraction failed");
                continue;
            }
        };
        if answer.is_empty() || answer == NONE_ANSWER || answers.contains(&answer) {
            continue;
        }
        answers.push(answer);
    }

    debug!(field, class = class_name, answers = answers.len(), "answers extracted");
    if answers.is_empty() {
        answers.push(NONE_ANSWER.to_string());
    }
    answers
}
