use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::NewSubmission;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordParams {
    test_id: String,
    student_id: String,
    score: i64,
    completed: bool,
    #[serde(default)]
    responses: Vec<serde_json::Value>,
}

fn handle_submissions_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let params: RecordParams = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let new = NewSubmission {
        test_id: params.test_id,
        student_id: params.student_id,
        score: params.score,
        completed: params.completed,
        responses: params.responses,
    };
    match store.record_submission(new, Utc::now()) {
        Ok(submission) => ok(&req.id, json!({ "submission": submission })),
        Err(e) => fail(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.record" => Some(handle_submissions_record(state, req)),
        _ => None,
    }
}
