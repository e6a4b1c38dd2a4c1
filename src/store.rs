//! Content store: test CRUD, cascading delete and duplicate-with-new-id on
//! top of the `RowStore` contract, plus the conflict scan that gates
//! scheduling.
//!
//! The backing store has no transactions, so every multi-table mutation here
//! is an explicit sequence of independent calls. The failure modes that
//! leaves behind (e.g. a Test row whose content append failed) are accepted:
//! re-running create against the same derived id is rejected as a duplicate,
//! which is the repair path.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::codec;
use crate::error::{ConflictingTest, StoreError};
use crate::model::{derive_test_id, Submission, TestContent, TestRecord, TestType};
use crate::validate::{parse_test_date, required_total, validate_points, validate_scheduling};
use crate::workbook::{
    Row, RowStore, QUESTIONS_TABLE, SUBMISSIONS_TABLE, TESTS_TABLE, WRITING_PROMPTS_TABLE,
};

fn content_table(test_type: TestType) -> &'static str {
    if test_type.has_sections() {
        QUESTIONS_TABLE
    } else {
        WRITING_PROMPTS_TABLE
    }
}

fn row_id(row: &Row) -> Option<&str> {
    row.first().map(String::as_str)
}

#[derive(Debug, Clone)]
pub struct NewTestMetadata {
    pub title: String,
    pub description: String,
    pub test_date: String,
}

#[derive(Debug, Clone)]
pub struct ReplaceTest {
    pub test_type: TestType,
    pub title: String,
    pub description: String,
    pub test_date: String,
    pub content: TestContent,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub test_id: String,
    pub student_id: String,
    pub score: i64,
    pub completed: bool,
    pub responses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct DeliveryPayload {
    pub record: TestRecord,
    pub content: TestContent,
}

pub struct ContentStore<S: RowStore> {
    store: S,
}

impl<S: RowStore> ContentStore<S> {
    pub fn new(store: S) -> Self {
        ContentStore { store }
    }

    pub fn list(&self) -> Result<Vec<TestRecord>, StoreError> {
        let rows = self.store.get_rows(TESTS_TABLE)?;
        Ok(rows.iter().filter_map(|r| TestRecord::from_row(r)).collect())
    }

    fn find_test(&self, test_id: &str) -> Result<TestRecord, StoreError> {
        let rows = self.store.get_rows(TESTS_TABLE)?;
        rows.iter()
            .find(|r| row_id(r) == Some(test_id))
            .and_then(|r| TestRecord::from_row(r))
            .ok_or_else(|| StoreError::NotFound {
                test_id: test_id.to_string(),
            })
    }

    /// Scheduling oracle: linear scan of the Tests table for another test
    /// sharing both date and type. Runs before any write on create.
    pub fn check_conflicts(&self, test_date: &str, test_type: TestType) -> Result<(), StoreError> {
        let rows = self.store.get_rows(TESTS_TABLE)?;
        let conflicts: Vec<ConflictingTest> = rows
            .iter()
            .filter(|r| {
                r.get(5).map(String::as_str) == Some(test_date)
                    && r.get(1).map(String::as_str) == Some(test_type.as_str())
            })
            .map(|r| ConflictingTest {
                test_id: r.first().cloned().unwrap_or_default(),
                test_type: r.get(1).cloned().unwrap_or_default(),
                title: r.get(2).cloned().unwrap_or_default(),
            })
            .collect();
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Conflict { conflicts })
        }
    }

    fn encode_content(test_id: &str, content: &TestContent) -> Vec<Row> {
        match content {
            TestContent::Sections(sections) => codec::encode_sections(test_id, sections),
            TestContent::Prompts(prompts) => codec::encode_prompts(test_id, prompts),
        }
    }

    fn read_content(&self, record: &TestRecord) -> Result<TestContent, StoreError> {
        let rows = self.store.get_rows(content_table(record.test_type))?;
        let own: Vec<Row> = rows
            .into_iter()
            .filter(|r| row_id(r) == Some(record.test_id.as_str()))
            .collect();
        Ok(if record.test_type.has_sections() {
            TestContent::Sections(codec::decode_sections(&own))
        } else {
            TestContent::Prompts(codec::decode_prompts(&own))
        })
    }

    pub fn create(
        &mut self,
        test_type: TestType,
        metadata: NewTestMetadata,
        content: TestContent,
        now: DateTime<Utc>,
    ) -> Result<TestRecord, StoreError> {
        let total_points = required_total(&content);
        validate_points(test_type, total_points, &content)?;

        let date = parse_test_date(&metadata.test_date)?;
        validate_scheduling(date, now.date_naive())?;

        // The derived id is the uniqueness constraint, so an exact re-create
        // reports the colliding id; the conflict scan still catches rows
        // occupying the slot under some other id (hand-entered data).
        let test_id = derive_test_id(test_type, date);
        let tests = self.store.get_rows(TESTS_TABLE)?;
        if tests.iter().any(|r| row_id(r) == Some(test_id.as_str())) {
            return Err(StoreError::Duplicate { test_id });
        }
        self.check_conflicts(&metadata.test_date, test_type)?;

        let record = TestRecord {
            test_id: test_id.clone(),
            test_type,
            title: metadata.title,
            description: metadata.description,
            created_at: now.to_rfc3339(),
            test_date: metadata.test_date,
            total_points,
            submission_count: 0,
        };

        // Two independent appends; a failure between them leaves an orphaned
        // Test row. The duplicate-id check above is what makes a retry safe
        // to reject rather than double-write.
        self.store
            .append_rows(TESTS_TABLE, vec![record.to_row()])?;
        self.store.append_rows(
            content_table(test_type),
            Self::encode_content(&test_id, &content),
        )?;

        info!(test_id = %record.test_id, "created test");
        Ok(record)
    }

    pub fn get(&self, test_id: &str) -> Result<(TestRecord, TestContent), StoreError> {
        let record = self.find_test(test_id)?;
        let content = self.read_content(&record)?;
        Ok((record, content))
    }

    /// Full-content replace: the Test row is rewritten in place (keeping the
    /// original createdAt) and the content table gets one clear-and-rewrite
    /// carrying every other test's rows through untouched.
    pub fn replace(&mut self, test_id: &str, update: ReplaceTest) -> Result<TestRecord, StoreError> {
        let total_points = required_total(&update.content);
        validate_points(update.test_type, total_points, &update.content)?;
        parse_test_date(&update.test_date)?;

        let mut tests = self.store.get_rows(TESTS_TABLE)?;
        let idx = tests
            .iter()
            .position(|r| row_id(r) == Some(test_id))
            .ok_or_else(|| StoreError::NotFound {
                test_id: test_id.to_string(),
            })?;

        let created_at = tests[idx].get(4).cloned().unwrap_or_default();
        let submission_count = tests[idx]
            .get(7)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let record = TestRecord {
            test_id: test_id.to_string(),
            test_type: update.test_type,
            title: update.title,
            description: update.description,
            created_at,
            test_date: update.test_date,
            total_points,
            submission_count,
        };
        tests[idx] = record.to_row();
        self.store.clear_and_rewrite(TESTS_TABLE, tests)?;

        let table = content_table(update.test_type);
        let mut rows: Vec<Row> = self
            .store
            .get_rows(table)?
            .into_iter()
            .filter(|r| row_id(r) != Some(test_id))
            .collect();
        rows.extend(Self::encode_content(test_id, &update.content));
        self.store.clear_and_rewrite(table, rows)?;

        info!(test_id = %record.test_id, "replaced test content");
        Ok(record)
    }

    /// Cascading delete: the Test row and its content rows go; Submissions
    /// for the id stay behind (see DESIGN.md on orphaned submissions).
    pub fn delete(&mut self, test_id: &str) -> Result<(), StoreError> {
        let record = self.find_test(test_id)?;

        let tests: Vec<Row> = self
            .store
            .get_rows(TESTS_TABLE)?
            .into_iter()
            .filter(|r| row_id(r) != Some(test_id))
            .collect();
        self.store.clear_and_rewrite(TESTS_TABLE, tests)?;

        let table = content_table(record.test_type);
        let rows: Vec<Row> = self
            .store
            .get_rows(table)?
            .into_iter()
            .filter(|r| row_id(r) != Some(test_id))
            .collect();
        self.store.clear_and_rewrite(table, rows)?;

        info!(test_id, "deleted test");
        Ok(())
    }

    /// Copy a test's metadata and content rows under a freshly derived id on
    /// a new date. Content rows are copied verbatim apart from the leading id
    /// field; stored ordinals are trusted as already well-formed.
    pub fn duplicate(
        &mut self,
        source_test_id: &str,
        new_test_date: &str,
        now: DateTime<Utc>,
    ) -> Result<TestRecord, StoreError> {
        let date = parse_test_date(new_test_date)?;
        let source = self.find_test(source_test_id)?;

        let new_id = derive_test_id(source.test_type, date);
        let tests = self.store.get_rows(TESTS_TABLE)?;
        if tests.iter().any(|r| row_id(r) == Some(new_id.as_str())) {
            return Err(StoreError::Duplicate { test_id: new_id });
        }

        let record = TestRecord {
            test_id: new_id.clone(),
            test_type: source.test_type,
            title: source.title,
            description: source.description,
            created_at: now.to_rfc3339(),
            test_date: new_test_date.to_string(),
            total_points: source.total_points,
            submission_count: 0,
        };
        self.store
            .append_rows(TESTS_TABLE, vec![record.to_row()])?;

        let table = content_table(source.test_type);
        let copied: Vec<Row> = self
            .store
            .get_rows(table)?
            .into_iter()
            .filter(|r| row_id(r) == Some(source_test_id))
            .map(|mut row| {
                if !row.is_empty() {
                    row[0] = new_id.clone();
                }
                row
            })
            .collect();
        self.store.append_rows(table, copied)?;

        info!(source = source_test_id, new_id = %record.test_id, "duplicated test");
        Ok(record)
    }

    pub fn submissions_for(&self, test_id: &str) -> Result<Vec<Submission>, StoreError> {
        let rows = self.store.get_rows(SUBMISSIONS_TABLE)?;
        Ok(rows
            .iter()
            .filter(|r| row_id(r) == Some(test_id))
            .filter_map(|r| Submission::from_row(r))
            .collect())
    }

    /// Append a submission row, then refresh the owning test's submission
    /// count. The count refresh is best-effort: the submission itself is
    /// already durable, so a failure there is logged and swallowed.
    pub fn record_submission(
        &mut self,
        new: NewSubmission,
        now: DateTime<Utc>,
    ) -> Result<Submission, StoreError> {
        let submission = Submission {
            test_id: new.test_id,
            student_id: new.student_id,
            score: new.score,
            completed: new.completed,
            responses: new.responses,
            submitted_at: now.to_rfc3339(),
        };
        self.store
            .append_rows(SUBMISSIONS_TABLE, vec![submission.to_row()])?;

        if let Err(e) = self.refresh_submission_count(&submission.test_id) {
            warn!(test_id = %submission.test_id, error = %e, "failed to refresh submission count");
        }
        Ok(submission)
    }

    fn refresh_submission_count(&mut self, test_id: &str) -> Result<(), StoreError> {
        let count = self
            .store
            .get_rows(SUBMISSIONS_TABLE)?
            .iter()
            .filter(|r| row_id(r) == Some(test_id))
            .count();

        let mut tests = self.store.get_rows(TESTS_TABLE)?;
        let Some(row) = tests.iter_mut().find(|r| row_id(r) == Some(test_id)) else {
            // Orphaned submission (test deleted); nothing to refresh.
            return Ok(());
        };
        while row.len() < 8 {
            row.push(String::new());
        }
        row[7] = count.to_string();
        self.store.clear_and_rewrite(TESTS_TABLE, tests)
    }

    /// Resolve a test by (date, type) for delivery, refusing students who
    /// have already submitted it.
    pub fn fetch_for_delivery(
        &self,
        date: &str,
        test_type: TestType,
        student_id: &str,
    ) -> Result<DeliveryPayload, StoreError> {
        let parsed = parse_test_date(date)?;
        let test_id = derive_test_id(test_type, parsed);
        let record = self.find_test(&test_id)?;

        let submissions = self.store.get_rows(SUBMISSIONS_TABLE)?;
        let already = submissions
            .iter()
            .any(|r| row_id(r) == Some(test_id.as_str()) && r.get(1).map(String::as_str) == Some(student_id));
        if already {
            return Err(StoreError::AlreadySubmitted {
                test_id,
                student_id: student_id.to_string(),
            });
        }

        let content = self.read_content(&record)?;
        Ok(DeliveryPayload { record, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, Section, WritingPrompt};
    use crate::workbook::MemoryStore;
    use chrono::TimeZone;

    // 2024-12-16 is a Monday; 2025-01-03 and 2024-12-20 are Fridays inside
    // the three-week window from it.
    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 16, 12, 0, 0).unwrap()
    }

    fn reading_content(points: &[i64]) -> TestContent {
        TestContent::Sections(vec![Section {
            title: "Passage".to_string(),
            content: "Text.".to_string(),
            questions: points
                .iter()
                .enumerate()
                .map(|(i, p)| Question {
                    text: format!("q{}", i + 1),
                    options: vec!["A".to_string(), "B".to_string()],
                    correct_answer: "A".to_string(),
                    points: *p,
                })
                .collect(),
        }])
    }

    fn metadata(date: &str) -> NewTestMetadata {
        NewTestMetadata {
            title: "Unit test".to_string(),
            description: String::new(),
            test_date: date.to_string(),
        }
    }

    fn store() -> ContentStore<MemoryStore> {
        ContentStore::new(MemoryStore::new())
    }

    #[test]
    fn recreating_the_same_slot_reports_the_derived_id() {
        let mut cs = store();
        let rec = cs
            .create(
                TestType::Reading,
                metadata("2025-01-03"),
                reading_content(&[2, 3]),
                test_now(),
            )
            .expect("create");
        assert_eq!(rec.test_id, "reading_20250103");
        assert_eq!(rec.total_points, 5);

        let err = cs
            .create(
                TestType::Reading,
                metadata("2025-01-03"),
                reading_content(&[1]),
                test_now(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_test");
        match err {
            StoreError::Duplicate { test_id } => assert_eq!(test_id, "reading_20250103"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn foreign_row_in_the_slot_is_a_schedule_conflict() {
        let mut cs = store();
        // A hand-entered row occupying the slot under a non-derived id.
        cs.store
            .append_rows(
                TESTS_TABLE,
                vec![vec![
                    "legacy-friday-quiz".to_string(),
                    "reading".to_string(),
                    "Imported quiz".to_string(),
                    String::new(),
                    "2024-11-01T00:00:00Z".to_string(),
                    "2025-01-03".to_string(),
                    "10".to_string(),
                    "0".to_string(),
                ]],
            )
            .expect("seed");

        let err = cs
            .create(
                TestType::Reading,
                metadata("2025-01-03"),
                reading_content(&[2]),
                test_now(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "schedule_conflict");
        match err {
            StoreError::Conflict { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].test_id, "legacy-friday-quiz");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn duplicate_id_check_rejects_colliding_derived_id() {
        let mut cs = store();
        cs.create(
            TestType::Reading,
            metadata("2025-01-03"),
            reading_content(&[2]),
            test_now(),
        )
        .expect("create");

        // Duplicating onto the source's own date derives the same id.
        let err = cs.duplicate("reading_20250103", "2025-01-03", test_now());
        assert_eq!(err.unwrap_err().code(), "duplicate_test");
    }

    #[test]
    fn get_roundtrips_created_content() {
        let mut cs = store();
        let content = reading_content(&[2, 3]);
        cs.create(TestType::Reading, metadata("2025-01-03"), content.clone(), test_now())
            .expect("create");
        let (rec, back) = cs.get("reading_20250103").expect("get");
        assert_eq!(rec.test_date, "2025-01-03");
        assert_eq!(back, content);
    }

    #[test]
    fn missing_test_is_not_found() {
        let cs = store();
        let err = cs.get("reading_20990101").unwrap_err();
        assert_eq!(err.code(), "test_not_found");
    }

    #[test]
    fn replace_preserves_created_at_and_other_tests_rows() {
        let mut cs = store();
        let created = cs
            .create(
                TestType::Reading,
                metadata("2025-01-03"),
                reading_content(&[2, 3]),
                test_now(),
            )
            .expect("create a");
        cs.create(
            TestType::Listening,
            metadata("2024-12-20"),
            reading_content(&[4]),
            test_now(),
        )
        .expect("create b");

        let rec = cs
            .replace(
                "reading_20250103",
                ReplaceTest {
                    test_type: TestType::Reading,
                    title: "Revised".to_string(),
                    description: "v2".to_string(),
                    test_date: "2025-01-03".to_string(),
                    content: reading_content(&[1, 1, 1]),
                },
            )
            .expect("replace");
        assert_eq!(rec.created_at, created.created_at);
        assert_eq!(rec.total_points, 3);

        let (_, a) = cs.get("reading_20250103").expect("get a");
        assert_eq!(a.sections().unwrap()[0].questions.len(), 3);
        let (b_rec, b) = cs.get("listening_20241220").expect("get b");
        assert_eq!(b_rec.total_points, 4);
        assert_eq!(b.sections().unwrap()[0].questions.len(), 1);
    }

    #[test]
    fn delete_cascades_to_own_content_rows_only() {
        let mut cs = store();
        cs.create(
            TestType::Reading,
            metadata("2025-01-03"),
            reading_content(&[2, 3]),
            test_now(),
        )
        .expect("create a");
        cs.create(
            TestType::Listening,
            metadata("2024-12-20"),
            reading_content(&[4, 1]),
            test_now(),
        )
        .expect("create b");

        cs.delete("reading_20250103").expect("delete");

        assert_eq!(
            cs.get("reading_20250103").unwrap_err().code(),
            "test_not_found"
        );
        let rows = cs.store.get_rows(QUESTIONS_TABLE).expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r[0] == "listening_20241220"));
    }

    #[test]
    fn delete_leaves_submissions_orphaned() {
        let mut cs = store();
        cs.create(
            TestType::Reading,
            metadata("2025-01-03"),
            reading_content(&[2]),
            test_now(),
        )
        .expect("create");
        cs.record_submission(
            NewSubmission {
                test_id: "reading_20250103".to_string(),
                student_id: "s-1".to_string(),
                score: 2,
                completed: true,
                responses: vec![serde_json::json!("A")],
            },
            test_now(),
        )
        .expect("submit");

        cs.delete("reading_20250103").expect("delete");

        // Lenient-by-design: the submission row stays behind.
        let subs = cs.submissions_for("reading_20250103").expect("subs");
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn duplicate_copies_content_under_new_id() {
        let mut cs = store();
        cs.create(
            TestType::Writing,
            metadata("2025-01-03"),
            TestContent::Prompts(vec![WritingPrompt {
                prompt_type: "argumentative".to_string(),
                text: "Agree or disagree".to_string(),
                word_limit: 300,
            }]),
            test_now(),
        )
        .expect("create");

        let rec = cs
            .duplicate("writing_20250103", "2025-02-07", test_now())
            .expect("duplicate");
        assert_eq!(rec.test_id, "writing_20250207");
        assert_eq!(rec.total_points, 50);
        assert_eq!(rec.submission_count, 0);

        let (_, content) = cs.get("writing_20250207").expect("get copy");
        assert_eq!(content.prompts().unwrap()[0].text, "Agree or disagree");
        // The source is untouched.
        let (_, original) = cs.get("writing_20250103").expect("get original");
        assert_eq!(original.prompts().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_of_missing_source_is_not_found() {
        let mut cs = store();
        let err = cs.duplicate("reading_20990101", "2025-01-03", test_now());
        assert_eq!(err.unwrap_err().code(), "test_not_found");
    }

    #[test]
    fn submission_count_refreshes_on_record() {
        let mut cs = store();
        cs.create(
            TestType::Reading,
            metadata("2025-01-03"),
            reading_content(&[2]),
            test_now(),
        )
        .expect("create");

        for i in 0..2 {
            cs.record_submission(
                NewSubmission {
                    test_id: "reading_20250103".to_string(),
                    student_id: format!("s-{}", i),
                    score: 2,
                    completed: true,
                    responses: vec![],
                },
                test_now(),
            )
            .expect("submit");
        }

        let (rec, _) = cs.get("reading_20250103").expect("get");
        assert_eq!(rec.submission_count, 2);
    }

    #[test]
    fn delivery_refuses_repeat_students() {
        let mut cs = store();
        cs.create(
            TestType::Reading,
            metadata("2025-01-03"),
            reading_content(&[2]),
            test_now(),
        )
        .expect("create");

        let payload = cs
            .fetch_for_delivery("2025-01-03", TestType::Reading, "s-1")
            .expect("first fetch");
        assert_eq!(payload.record.test_id, "reading_20250103");

        cs.record_submission(
            NewSubmission {
                test_id: "reading_20250103".to_string(),
                student_id: "s-1".to_string(),
                score: 2,
                completed: true,
                responses: vec![],
            },
            test_now(),
        )
        .expect("submit");

        let err = cs
            .fetch_for_delivery("2025-01-03", TestType::Reading, "s-1")
            .unwrap_err();
        assert_eq!(err.code(), "already_submitted");

        // A different student still gets the test.
        assert!(cs
            .fetch_for_delivery("2025-01-03", TestType::Reading, "s-2")
            .is_ok());
    }
}
