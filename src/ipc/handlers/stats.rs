use serde_json::json;

use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::TestContent;
use crate::stats;

fn handle_stats_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(test_id) = req.params.get("testId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing testId", None);
    };

    let (record, content) = match store.get(test_id) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e),
    };
    let submissions = match store.submissions_for(test_id) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e),
    };

    // Flattened dense question order is what responsesJson indexes against.
    let questions: Option<Vec<(String, String)>> = match &content {
        TestContent::Sections(sections) => Some(
            sections
                .iter()
                .flat_map(|s| s.questions.iter())
                .map(|q| (q.text.clone(), q.correct_answer.clone()))
                .collect(),
        ),
        TestContent::Prompts(_) => None,
    };

    let summary = stats::summarize(&submissions, questions.as_deref());
    ok(&req.id, json!({ "testId": record.test_id, "stats": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.get" => Some(handle_stats_get(state, req)),
        _ => None,
    }
}
