//! Row codec: bidirectional mapping between the flat Questions /
//! WritingPrompts rows and the hierarchical content tree. Pure functions,
//! no store access.
//!
//! Decoding is lenient by policy: rows with missing ordinals are dropped and
//! corrupted options JSON degrades to an empty list, because stored content
//! must stay renderable no matter what a past writer left behind.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::model::{Question, Section, WritingPrompt};
use crate::workbook::Row;

fn parse_ordinal(field: Option<&String>) -> Option<u32> {
    let s = field?.trim();
    match s.parse::<u32>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

/// Questions rows -> dense section tree.
///
/// Rows arrive in arbitrary order. Questions land at `ordinal - 1` inside
/// their section, padding any gap with placeholder questions; sections emit
/// sorted by numeric ordinal (a string sort would misplace ordinal 10).
pub fn decode_sections(rows: &[Row]) -> Vec<Section> {
    let mut sections: BTreeMap<u32, Section> = BTreeMap::new();

    for row in rows {
        let (Some(section_ord), Some(question_ord)) =
            (parse_ordinal(row.get(1)), parse_ordinal(row.get(4)))
        else {
            debug!(?row, "dropping question row with missing ordinal");
            continue;
        };
        if row.len() < 9 {
            debug!(len = row.len(), "dropping short question row");
            continue;
        }

        // First row seen for a section fixes its title and passage content.
        let section = sections.entry(section_ord).or_insert_with(|| Section {
            title: row[2].clone(),
            content: row[3].clone(),
            questions: Vec::new(),
        });

        let options: Vec<String> = match serde_json::from_str(&row[6]) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    section = section_ord,
                    question = question_ord,
                    error = %e,
                    "malformed options JSON, substituting empty list"
                );
                Vec::new()
            }
        };

        let slot = (question_ord - 1) as usize;
        while section.questions.len() <= slot {
            section.questions.push(Question::placeholder());
        }
        section.questions[slot] = Question {
            text: row[5].clone(),
            options,
            correct_answer: row[7].clone(),
            points: row[8].trim().parse().unwrap_or(0),
        };
    }

    sections.into_values().collect()
}

/// Section tree -> Questions rows, one row per question. Ordinals are always
/// re-derived from array position so an editor reorder renumbers everything
/// consistently on save.
pub fn encode_sections(test_id: &str, sections: &[Section]) -> Vec<Row> {
    sections
        .iter()
        .enumerate()
        .flat_map(|(s_idx, section)| {
            section.questions.iter().enumerate().map(move |(q_idx, q)| {
                vec![
                    test_id.to_string(),
                    (s_idx + 1).to_string(),
                    section.title.clone(),
                    section.content.clone(),
                    (q_idx + 1).to_string(),
                    q.text.clone(),
                    serde_json::to_string(&q.options).unwrap_or_else(|_| "[]".to_string()),
                    q.correct_answer.clone(),
                    q.points.to_string(),
                ]
            })
        })
        .collect()
}

/// WritingPrompts rows -> prompts, in stored ordinal order.
pub fn decode_prompts(rows: &[Row]) -> Vec<WritingPrompt> {
    let mut ordered: Vec<(u32, WritingPrompt)> = rows
        .iter()
        .filter_map(|row| {
            let ord = parse_ordinal(row.get(1))?;
            let field = |i: usize| row.get(i).cloned().unwrap_or_default();
            Some((
                ord,
                WritingPrompt {
                    prompt_type: field(2),
                    text: field(3),
                    word_limit: field(4).trim().parse().unwrap_or(0),
                },
            ))
        })
        .collect();
    ordered.sort_by_key(|(ord, _)| *ord);
    ordered.into_iter().map(|(_, p)| p).collect()
}

pub fn encode_prompts(test_id: &str, prompts: &[WritingPrompt]) -> Vec<Row> {
    prompts
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            vec![
                test_id.to_string(),
                (idx + 1).to_string(),
                p.prompt_type.clone(),
                p.text.clone(),
                p.word_limit.to_string(),
            ]
        })
        .collect()
}
