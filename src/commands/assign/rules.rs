use crate::model::{NONE_ANSWER, NOT_VALID};
use crate::util::letters_only_lowercase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePolicy {
    Keyword(KeywordRule),
    AnswerAsValue,
    Amount,
    NearestCanonical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordRule {
    Nondiversified,
    IncomeFrequency,
}

pub fn policy_for(field: &str) -> ValuePolicy {
    match field {
        "NONDIVERSIFIED" => ValuePolicy::Keyword(KeywordRule::Nondiversified),
        "INCOME_FREQUENCY" => ValuePolicy::Keyword(KeywordRule::IncomeFrequency),
        "AUDITOR" => ValuePolicy::AnswerAsValue,
        "INITPURCHASE_AMOUNT" | "SUBPURCHASE_AMOUNT" => ValuePolicy::Amount,
        _ => ValuePolicy::NearestCanonical,
    }
}

const PAYMENT_FREQUENCIES: &[(&str, u32)] = &[
    ("monthly", 12),
    ("yearly", 1),
    ("semiannually", 2),
    ("annually", 1),
    ("onceayear", 1),
    ("quarterly", 4),
    ("eachmonth", 1),
    ("annual", 1),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub value: String,
    pub evidence: String,
}

impl RuleOutcome {
    fn not_valid() -> Self {
        Self {
            value: NOT_VALID.to_string(),
            evidence: String::new(),
        }
    }
}

pub fn apply_keyword_rule(rule: KeywordRule, paragraphs: &[String]) -> RuleOutcome {
    for paragraph in paragraphs {
        let letters = letters_only_lowercase(paragraph);
        match rule {
            KeywordRule::Nondiversified => {
                if letters.contains("nondiversified") {
                    return RuleOutcome {
                        value: "1".to_string(),
                        evidence: "non-diversified".to_string(),
                    };
                }
            }
            KeywordRule::IncomeFrequency => {
                if let Some((keyword, per_year)) = PAYMENT_FREQUENCIES
                    .iter()
                    .find(|(keyword, _)| letters.contains(keyword))
                {
                    return RuleOutcome {
                        value: per_year.to_string(),
                        evidence: keyword.to_string(),
                    };
                }
            }
        }
    }
    RuleOutcome::not_valid()
}

pub fn parse_amount(answer: &str) -> String {
    if answer == NONE_ANSWER {
        return NOT_VALID.to_string();
    }
    let digits = answer
        .trim()
        .trim_end_matches(".00")
        .chars()
        .filter(|character| !matches!(character, '$' | ',' | ' '))
        .collect::<String>();
    match digits.parse::<u64>() {
        Ok(amount) => amount.to_string(),
        Err(_) => NOT_VALID.to_string(),
    }
}
