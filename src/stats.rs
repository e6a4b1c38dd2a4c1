//! Pure aggregation over submissions for the stats surface. No store access.

use serde::Serialize;

use crate::model::Submission;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreRanges {
    #[serde(rename = "90-100")]
    pub r90_100: i64,
    #[serde(rename = "80-89")]
    pub r80_89: i64,
    #[serde(rename = "70-79")]
    pub r70_79: i64,
    #[serde(rename = "60-69")]
    pub r60_69: i64,
    #[serde(rename = "below-60")]
    pub below_60: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub text: String,
    pub correct_percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStats {
    pub total_submissions: i64,
    pub average_score: i64,
    pub completion_rate: i64,
    pub score_ranges: ScoreRanges,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_stats: Option<Vec<QuestionStat>>,
}

fn percent(part: usize, whole: usize) -> i64 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as i64
}

/// Score distribution as percentages of all submissions.
pub fn score_ranges(scores: &[i64]) -> ScoreRanges {
    let mut counts = [0usize; 5];
    for &score in scores {
        let bucket = match score {
            s if s >= 90 => 0,
            s if s >= 80 => 1,
            s if s >= 70 => 2,
            s if s >= 60 => 3,
            _ => 4,
        };
        counts[bucket] += 1;
    }
    let n = scores.len();
    ScoreRanges {
        r90_100: percent(counts[0], n),
        r80_89: percent(counts[1], n),
        r70_79: percent(counts[2], n),
        r60_69: percent(counts[3], n),
        below_60: percent(counts[4], n),
    }
}

/// Per-question correctness over completed submissions, index-aligning each
/// submission's responses with the dense question order.
pub fn question_stats(
    questions: &[(String, String)],
    submissions: &[Submission],
) -> Vec<QuestionStat> {
    let completed: Vec<&Submission> = submissions.iter().filter(|s| s.completed).collect();
    questions
        .iter()
        .enumerate()
        .map(|(idx, (text, correct_answer))| {
            let correct = completed
                .iter()
                .filter(|s| {
                    s.responses
                        .get(idx)
                        .and_then(|v| v.as_str())
                        .map(|r| r == correct_answer)
                        .unwrap_or(false)
                })
                .count();
            QuestionStat {
                text: text.clone(),
                correct_percentage: percent(correct, completed.len()),
            }
        })
        .collect()
}

/// Roll up a test's submissions. `questions` is Some for reading/listening
/// (text, correctAnswer pairs in dense order) and None for writing.
pub fn summarize(submissions: &[Submission], questions: Option<&[(String, String)]>) -> TestStats {
    let scores: Vec<i64> = submissions.iter().map(|s| s.score).collect();
    let completed = submissions.iter().filter(|s| s.completed).count();

    let average_score = if scores.is_empty() {
        0
    } else {
        (scores.iter().sum::<i64>() as f64 / scores.len() as f64).round() as i64
    };

    TestStats {
        total_submissions: submissions.len() as i64,
        average_score,
        completion_rate: percent(completed, submissions.len()),
        score_ranges: score_ranges(&scores),
        question_stats: questions.map(|qs| question_stats(qs, submissions)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(score: i64, completed: bool, responses: Vec<&str>) -> Submission {
        Submission {
            test_id: "reading_20250103".to_string(),
            student_id: format!("student-{}", score),
            score,
            completed,
            responses: responses.into_iter().map(|r| json!(r)).collect(),
            submitted_at: "2025-01-03T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn score_ranges_are_percentages() {
        let ranges = score_ranges(&[95, 85, 85, 40]);
        assert_eq!(ranges.r90_100, 25);
        assert_eq!(ranges.r80_89, 50);
        assert_eq!(ranges.below_60, 25);
        assert_eq!(ranges.r70_79, 0);
    }

    #[test]
    fn empty_submissions_summarize_to_zeroes() {
        let stats = summarize(&[], None);
        assert_eq!(stats.total_submissions, 0);
        assert_eq!(stats.average_score, 0);
        assert_eq!(stats.completion_rate, 0);
        assert_eq!(stats.score_ranges, ScoreRanges::default());
    }

    #[test]
    fn question_stats_only_count_completed() {
        let questions = vec![
            ("q1".to_string(), "A".to_string()),
            ("q2".to_string(), "B".to_string()),
        ];
        let subs = vec![
            submission(80, true, vec!["A", "B"]),
            submission(50, true, vec!["A", "C"]),
            // Incomplete submission must not count either way.
            submission(0, false, vec!["A", "B"]),
        ];
        let stats = question_stats(&questions, &subs);
        assert_eq!(stats[0].correct_percentage, 100);
        assert_eq!(stats[1].correct_percentage, 50);
    }

    #[test]
    fn short_response_arrays_read_as_wrong() {
        let questions = vec![
            ("q1".to_string(), "A".to_string()),
            ("q2".to_string(), "B".to_string()),
        ];
        let subs = vec![submission(50, true, vec!["A"])];
        let stats = question_stats(&questions, &subs);
        assert_eq!(stats[0].correct_percentage, 100);
        assert_eq!(stats[1].correct_percentage, 0);
    }

    #[test]
    fn average_and_completion_rate_round() {
        let subs = vec![
            submission(70, true, vec![]),
            submission(75, false, vec![]),
            submission(81, true, vec![]),
        ];
        let stats = summarize(&subs, None);
        assert_eq!(stats.average_score, 75);
        assert_eq!(stats.completion_rate, 67);
    }
}
