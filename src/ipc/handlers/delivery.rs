use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::TestType;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchParams {
    date: String,
    #[serde(rename = "type")]
    test_type: String,
    student_id: String,
}

fn handle_delivery_fetch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let params: FetchParams = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let test_type = match TestType::parse(&params.test_type) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e),
    };

    match store.fetch_for_delivery(&params.date, test_type, &params.student_id) {
        Ok(payload) => ok(
            &req.id,
            json!({
                "testId": payload.record.test_id,
                "type": payload.record.test_type,
                "totalPoints": payload.record.total_points,
                "content": payload.content
            }),
        ),
        Err(e) => fail(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "delivery.fetch" => Some(handle_delivery_fetch(state, req)),
        _ => None,
    }
}
