use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const WRITING_TOTAL_POINTS: i64 = 50;
pub const MAX_WRITING_PROMPTS: usize = 3;

pub const PROMPT_TYPES: [&str; 3] = ["argumentative", "persuasive", "reflective"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Reading,
    Listening,
    Writing,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Reading => "reading",
            TestType::Listening => "listening",
            TestType::Writing => "writing",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "reading" => Ok(TestType::Reading),
            "listening" => Ok(TestType::Listening),
            "writing" => Ok(TestType::Writing),
            other => Err(StoreError::validation(
                "invalid_test_type",
                format!("test type must be reading, listening, or writing (got {:?})", other),
            )),
        }
    }

    pub fn has_sections(&self) -> bool {
        matches!(self, TestType::Reading | TestType::Listening)
    }
}

/// One derivation of `{type}_{YYYYMMDD}` shared by create, duplicate, lookup
/// and delivery. Zero-padding lives here and nowhere else.
pub fn derive_test_id(test_type: TestType, test_date: NaiveDate) -> String {
    format!("{}_{}", test_type.as_str(), test_date.format("%Y%m%d"))
}

/// A row of the Tests table, materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub test_id: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub test_date: String,
    pub total_points: i64,
    pub submission_count: i64,
}

impl TestRecord {
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.test_id.clone(),
            self.test_type.as_str().to_string(),
            self.title.clone(),
            self.description.clone(),
            self.created_at.clone(),
            self.test_date.clone(),
            self.total_points.to_string(),
            self.submission_count.to_string(),
        ]
    }

    /// Lenient materialization: short rows and unparseable numerics degrade
    /// to defaults rather than failing the whole table read. A row whose
    /// type field is unrecognized is unusable and yields None.
    pub fn from_row(row: &[String]) -> Option<Self> {
        let field = |i: usize| row.get(i).cloned().unwrap_or_default();
        let test_type = TestType::parse(row.get(1)?.as_str()).ok()?;
        Some(TestRecord {
            test_id: field(0),
            test_type,
            title: field(2),
            description: field(3),
            created_at: field(4),
            test_date: field(5),
            total_points: field(6).parse().unwrap_or(0),
            submission_count: field(7).parse().unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub points: i64,
}

impl Question {
    /// The gap filler used when decoded ordinals are sparse.
    pub fn placeholder() -> Self {
        Question {
            text: String::new(),
            options: Vec::new(),
            correct_answer: String::new(),
            points: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingPrompt {
    #[serde(rename = "type")]
    pub prompt_type: String,
    pub text: String,
    #[serde(default)]
    pub word_limit: i64,
}

/// Hierarchical content of a test: sections with questions for
/// reading/listening, prompts for writing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestContent {
    Sections(Vec<Section>),
    Prompts(Vec<WritingPrompt>),
}

impl TestContent {
    pub fn sections(&self) -> Option<&[Section]> {
        match self {
            TestContent::Sections(s) => Some(s),
            TestContent::Prompts(_) => None,
        }
    }

    pub fn prompts(&self) -> Option<&[WritingPrompt]> {
        match self {
            TestContent::Prompts(p) => Some(p),
            TestContent::Sections(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub test_id: String,
    pub student_id: String,
    pub score: i64,
    pub completed: bool,
    pub responses: Vec<serde_json::Value>,
    pub submitted_at: String,
}

impl Submission {
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.test_id.clone(),
            self.student_id.clone(),
            self.score.to_string(),
            self.completed.to_string(),
            serde_json::to_string(&self.responses).unwrap_or_else(|_| "[]".to_string()),
            self.submitted_at.clone(),
        ]
    }

    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 2 {
            return None;
        }
        let field = |i: usize| row.get(i).cloned().unwrap_or_default();
        let responses = serde_json::from_str(&field(4)).unwrap_or_default();
        Some(Submission {
            test_id: field(0),
            student_id: field(1),
            score: field(2).parse().unwrap_or(0),
            completed: field(3) == "true",
            responses,
            submitted_at: field(5),
        })
    }
}
