//! Validation layer: point-total and scheduling invariants. Pure functions;
//! `now` is always a parameter so the window checks stay testable.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde_json::json;

use crate::error::StoreError;
use crate::model::{
    Section, TestContent, TestType, WritingPrompt, MAX_WRITING_PROMPTS, PROMPT_TYPES,
    WRITING_TOTAL_POINTS,
};

/// Tests may be scheduled at most this many days out.
pub const SCHEDULING_WINDOW_DAYS: u64 = 21;

/// Sum of question points across all sections.
pub fn calculated_total(sections: &[Section]) -> i64 {
    sections
        .iter()
        .map(|s| s.questions.iter().map(|q| q.points).sum::<i64>())
        .sum()
}

/// The total a test must carry for the given content: summed question points
/// for sections, the fixed writing constant for prompts.
pub fn required_total(content: &TestContent) -> i64 {
    match content {
        TestContent::Sections(sections) => calculated_total(sections),
        TestContent::Prompts(_) => WRITING_TOTAL_POINTS,
    }
}

fn validate_sections(sections: &[Section], total_points: i64) -> Result<(), StoreError> {
    if sections.is_empty() || sections.iter().any(|s| s.questions.is_empty()) {
        return Err(StoreError::validation(
            "invalid_questions",
            "each section must contain at least one question",
        ));
    }

    for (s_idx, section) in sections.iter().enumerate() {
        for (q_idx, question) in section.questions.iter().enumerate() {
            if question.points < 1 {
                return Err(StoreError::validation_with(
                    "invalid_question_points",
                    format!(
                        "invalid points ({}) for question {} in section {}",
                        question.points,
                        q_idx + 1,
                        s_idx + 1
                    ),
                    json!({ "section": s_idx + 1, "question": q_idx + 1 }),
                ));
            }
        }
    }

    let calculated = calculated_total(sections);
    if calculated != total_points {
        return Err(StoreError::validation_with(
            "point_total_mismatch",
            format!(
                "point total mismatch: stored {}, calculated {}",
                total_points, calculated
            ),
            json!({ "stored": total_points, "calculated": calculated }),
        ));
    }
    Ok(())
}

fn validate_prompts(prompts: &[WritingPrompt], total_points: i64) -> Result<(), StoreError> {
    if prompts.is_empty() {
        return Err(StoreError::validation(
            "invalid_questions",
            "a writing test must contain at least one prompt",
        ));
    }
    if prompts.len() > MAX_WRITING_PROMPTS {
        return Err(StoreError::validation_with(
            "too_many_prompts",
            format!(
                "writing test cannot have more than {} prompts",
                MAX_WRITING_PROMPTS
            ),
            json!({ "count": prompts.len() }),
        ));
    }
    for (idx, prompt) in prompts.iter().enumerate() {
        if !PROMPT_TYPES.contains(&prompt.prompt_type.as_str()) {
            return Err(StoreError::validation_with(
                "invalid_prompt_type",
                format!(
                    "prompt {} has unknown type {:?}; expected one of {:?}",
                    idx + 1,
                    prompt.prompt_type,
                    PROMPT_TYPES
                ),
                json!({ "prompt": idx + 1 }),
            ));
        }
    }
    if total_points != WRITING_TOTAL_POINTS {
        return Err(StoreError::validation(
            "point_total_mismatch",
            format!("writing tests must be exactly {} points", WRITING_TOTAL_POINTS),
        ));
    }
    Ok(())
}

/// Point-total invariant (hard failure, never auto-corrected) plus content
/// shape checks. Content kind must match the test type.
pub fn validate_points(
    test_type: TestType,
    total_points: i64,
    content: &TestContent,
) -> Result<(), StoreError> {
    match (test_type, content) {
        (TestType::Reading | TestType::Listening, TestContent::Sections(sections)) => {
            validate_sections(sections, total_points)
        }
        (TestType::Writing, TestContent::Prompts(prompts)) => {
            validate_prompts(prompts, total_points)
        }
        (TestType::Writing, TestContent::Sections(_)) => Err(StoreError::validation(
            "invalid_questions",
            "writing tests take prompts, not sections",
        )),
        (_, TestContent::Prompts(_)) => Err(StoreError::validation(
            "invalid_questions",
            "reading and listening tests take sections, not prompts",
        )),
    }
}

pub fn parse_test_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        StoreError::validation_with(
            "invalid_date_format",
            "test date must be YYYY-MM-DD",
            json!({ "received": raw }),
        )
    })
}

/// Scheduling invariants: strictly in the future, within the three-week
/// window, and on a Friday. Each failure keeps its own code so the caller
/// can show a specific message.
pub fn validate_scheduling(test_date: NaiveDate, today: NaiveDate) -> Result<(), StoreError> {
    if test_date <= today {
        return Err(StoreError::validation(
            "invalid_date",
            "test date must be in the future",
        ));
    }
    let window_end = today
        .checked_add_days(Days::new(SCHEDULING_WINDOW_DAYS))
        .unwrap_or(test_date);
    if test_date > window_end {
        return Err(StoreError::validation(
            "date_too_far",
            "test date must be within three weeks",
        ));
    }
    if test_date.weekday() != Weekday::Fri {
        return Err(StoreError::validation(
            "invalid_day",
            "tests must be scheduled on Fridays",
        ));
    }
    Ok(())
}
