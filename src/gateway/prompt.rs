//! Prompt composition for summaries and ratings.
//!
//! Prompt bodies live in `prompts/` and are compiled in; `{name}` markers are
//! substituted here.
use crate::session::{category_averages, Assessment, Row};
use regex::{Captures, Regex};
use std::sync::OnceLock;

const SUMMARY_INSTRUCTION: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/summary.md"));
const RATING: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/rating.md"));
const ASSESSMENT_SUMMARY: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/assessment_summary.md"
));
const ASSESSMENT_INSTRUCTION: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/assessment_instruction.md"
));

/// Instruction followed by the newline-joined row contents.
pub fn summary_prompt(instruction: Option<&str>, rows: &[Row]) -> String {
    let instruction = instruction.unwrap_or(SUMMARY_INSTRUCTION).trim();
    let body = rows
        .iter()
        .map(|row| row.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{instruction}\n\n{body}")
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("marker regex"))
}

/// Replace `{name}` markers in one pass; inserted values are never rescanned.
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    marker_regex()
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}

pub fn rating_prompt(assessment: &Assessment, answer: &str) -> String {
    substitute(
        RATING,
        &[
            ("category", assessment.category.as_str()),
            ("question", assessment.question.as_str()),
            ("answer", answer),
        ],
    )
}

/// Summary prompt for rated rows: category averages, the detail table, then
/// the instruction.
pub fn assessment_summary_prompt(instruction: Option<&str>, rows: &[Row]) -> String {
    let averages = category_averages(rows)
        .into_iter()
        .map(|(category, average)| format!("{category}: {average:.2}"))
        .collect::<Vec<_>>()
        .join("\n");
    let details = rows
        .iter()
        .filter_map(|row| row.assessment.as_ref().map(|assessment| (row, assessment)))
        .map(|(row, assessment)| {
            let rating = assessment
                .rating
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{} | {} | {} | {}",
                assessment.category, assessment.question, row.content, rating
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    substitute(
        ASSESSMENT_SUMMARY,
        &[
            ("averages", averages.as_str()),
            ("details", details.as_str()),
            ("instruction", instruction.unwrap_or(ASSESSMENT_INSTRUCTION).trim()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, content: &str) -> Row {
        Row {
            index,
            content: content.to_string(),
            locked: false,
            assessment: None,
        }
    }

    #[test]
    fn summary_prompt_joins_rows_after_instruction() {
        let rows = vec![row(0, "first"), row(1, "second")];
        let prompt = summary_prompt(Some("Summarize:"), &rows);
        assert_eq!(prompt, "Summarize:\n\nfirst\nsecond");
    }

    #[test]
    fn summary_prompt_defaults_to_builtin_instruction() {
        let prompt = summary_prompt(None, &[row(0, "only")]);
        assert!(prompt.starts_with("Write a concise executive summary"));
        assert!(prompt.ends_with("\n\nonly"));
    }

    #[test]
    fn rating_prompt_names_category_question_and_answer() {
        let assessment = Assessment {
            category: "Strategy".to_string(),
            question: "Is there a plan?".to_string(),
            rating: None,
        };
        let prompt = rating_prompt(&assessment, "Yes, reviewed yearly.");
        assert!(prompt.contains("Category: Strategy"));
        assert!(prompt.contains("Question: Is there a plan?"));
        assert!(prompt.contains("Answer: Yes, reviewed yearly."));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn assessment_summary_prompt_lists_averages_and_details() {
        let mut rated = row(0, "We do.");
        rated.assessment = Some(Assessment {
            category: "Ops".to_string(),
            question: "Processes?".to_string(),
            rating: Some(4),
        });
        let prompt = assessment_summary_prompt(Some("Be brief."), &[rated]);
        assert!(prompt.contains("Ops: 4.00"));
        assert!(prompt.contains("Ops | Processes? | We do. | 4"));
        assert!(prompt.trim_end().ends_with("Be brief."));
    }

    #[test]
    fn braces_in_answers_are_kept_literally() {
        let assessment = Assessment {
            category: "Ops {answer}".to_string(),
            question: "Say {question}?".to_string(),
            rating: Some(2),
        };
        let prompt = rating_prompt(&assessment, "see {instruction} and {category}");
        assert!(prompt.contains("Category: Ops {answer}"));
        assert!(prompt.contains("Question: Say {question}?"));
        assert!(prompt.contains("Answer: see {instruction} and {category}"));

        let mut rated = row(0, "literal {instruction} text");
        rated.assessment = Some(assessment);
        let prompt = assessment_summary_prompt(Some("Be brief."), &[rated]);
        assert!(prompt.contains("literal {instruction} text"));
        assert_eq!(prompt.matches("Be brief.").count(), 1);
    }

    #[test]
    fn unknown_markers_are_left_alone() {
        assert_eq!(substitute("{a} {zzz} {a}", &[("a", "x")]), "x {zzz} x");
    }
}
