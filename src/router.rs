use crate::features::subscriptions::handlers;
use crate::shared::http::{error_response, json_response, method_not_allowed, not_found};
use crate::AppState;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// HTTPリクエストを各ハンドラーに振り分ける
///
/// # ルーティング
/// - `GET /health`
/// - `GET|POST /subscriptions`
/// - `GET /subscriptions/cost`
/// - `GET|PUT|DELETE /subscriptions/{id}`
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<String>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    log::debug!("リクエストを受信: {} {}", req.method(), req.uri());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let service = &state.subscriptions;

    let result = match segments.as_slice() {
        ["health"] => match method {
            Method::GET => Ok(json_response(StatusCode::OK, &HealthResponse { status: "ok" })),
            _ => Ok(method_not_allowed("GET")),
        },
        ["subscriptions"] => match method {
            Method::GET => handlers::list_subscriptions(query.as_deref(), service).await,
            Method::POST => handlers::create_subscription(req.into_body(), service).await,
            _ => Ok(method_not_allowed("GET, POST")),
        },
        ["subscriptions", "cost"] => match method {
            Method::GET => handlers::calculate_total_cost(query.as_deref(), service).await,
            _ => Ok(method_not_allowed("GET")),
        },
        ["subscriptions", id] => match method {
            Method::GET => handlers::get_subscription(id, service).await,
            Method::PUT => handlers::update_subscription(id, req.into_body(), service).await,
            Method::DELETE => handlers::delete_subscription(id, service).await,
            _ => Ok(method_not_allowed("GET, PUT, DELETE")),
        },
        _ => {
            log::debug!("未対応のリクエスト: {method} {path}");
            Ok(not_found())
        }
    };

    Ok(result.unwrap_or_else(|e| error_response(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::create_tables;
    use http_body_util::Full;
    use rusqlite::Connection;
    use serde_json::{json, Value};

    const ALICE: &str = "60601fee-2bf1-4721-ae6f-7636e79a0cba";
    const BOB: &str = "0b7e6f3a-5d4c-4a8e-9f1b-2c3d4e5f6a7b";

    fn test_state() -> Arc<AppState> {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        Arc::new(AppState::new(conn))
    }

    async fn send(state: &Arc<AppState>, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|v| v.to_string()).unwrap_or_default();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body)))
            .unwrap();

        let response = handle_request(req, Arc::clone(state)).await.unwrap();
        let status = response.status();
        let json = serde_json::from_str(response.body()).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create(state: &Arc<AppState>, body: Value) -> Value {
        let (status, json) = send(state, Method::POST, "/subscriptions", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "作成に失敗: {json}");
        json
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();
        let (status, json) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let state = test_state();

        let created = create(
            &state,
            json!({
                "service_name": "Yandex Plus",
                "price": 400,
                "user_id": ALICE,
                "start_date": "07-2025"
            }),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["start_date"], "07-2025");
        assert_eq!(created["is_deleted"], false);
        assert!(created.get("end_date").is_none());

        let (status, fetched) = send(&state, Method::GET, &format!("/subscriptions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, updated) = send(
            &state,
            Method::PUT,
            &format!("/subscriptions/{id}"),
            Some(json!({
                "service_name": "Yandex Plus",
                "price": 500,
                "user_id": ALICE,
                "start_date": "07-2025",
                "end_date": "12-2025"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["price"], 500);
        assert_eq!(updated["end_date"], "12-2025");

        let (status, deleted) = send(&state, Method::DELETE, &format!("/subscriptions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted, json!({"message": "subscription deleted"}));

        // 2回目の削除も成功する
        let (status, _) = send(&state, Method::DELETE, &format!("/subscriptions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, listed) = send(&state, Method::GET, "/subscriptions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let state = test_state();
        for (name, user) in [("Netflix", ALICE), ("Spotify", ALICE), ("Netflix", BOB)] {
            create(
                &state,
                json!({"service_name": name, "price": 100, "user_id": user, "start_date": "01-2024"}),
            )
            .await;
        }

        let (_, all) = send(&state, Method::GET, "/subscriptions", None).await;
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, alice) = send(&state, Method::GET, &format!("/subscriptions?user_id={ALICE}"), None).await;
        assert_eq!(alice.as_array().unwrap().len(), 2);

        let (_, netflix) = send(
            &state,
            Method::GET,
            &format!("/subscriptions?user_id={BOB}&service_name=Netflix"),
            None,
        )
        .await;
        let netflix = netflix.as_array().unwrap();
        assert_eq!(netflix.len(), 1);
        assert_eq!(netflix[0]["user_id"], BOB);

        // 空の値は指定なしとして扱う
        let (_, empty_filter) = send(&state, Method::GET, "/subscriptions?user_id=&service_name=", None).await;
        assert_eq!(empty_filter.as_array().unwrap().len(), 3);

        let (status, error) = send(&state, Method::GET, "/subscriptions?user_id=nope", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, json!({"error": "invalid user_id"}));
    }

    #[tokio::test]
    async fn test_total_cost() {
        let state = test_state();
        create(
            &state,
            json!({"service_name": "Netflix", "price": 100, "user_id": ALICE,
                   "start_date": "01-2024", "end_date": "06-2024"}),
        )
        .await;
        create(
            &state,
            json!({"service_name": "Spotify", "price": 50, "user_id": BOB, "start_date": "01-2024"}),
        )
        .await;
        let deleted = create(
            &state,
            json!({"service_name": "Netflix", "price": 10000, "user_id": ALICE, "start_date": "01-2024"}),
        )
        .await;
        let deleted_id = deleted["id"].as_str().unwrap();
        send(&state, Method::DELETE, &format!("/subscriptions/{deleted_id}"), None).await;

        let (status, cost) = send(&state, Method::GET, "/subscriptions/cost?from=03-2024&to=12-2024", None).await;
        assert_eq!(status, StatusCode::OK);
        // Netflix: 4か月 * 100, Spotify: 10か月 * 50
        assert_eq!(cost, json!({"total_cost": 900}));

        let (_, alice) = send(
            &state,
            Method::GET,
            &format!("/subscriptions/cost?from=03-2024&to=12-2024&user_id={ALICE}&service_name=Netflix"),
            None,
        )
        .await;
        assert_eq!(alice, json!({"total_cost": 400}));

        let (_, spotify) = send(
            &state,
            Method::GET,
            "/subscriptions/cost?from=01-2024&to=03-2024&service_name=Spotify",
            None,
        )
        .await;
        assert_eq!(spotify, json!({"total_cost": 150}));

        let (_, before) = send(&state, Method::GET, "/subscriptions/cost?from=01-2023&to=12-2023", None).await;
        assert_eq!(before, json!({"total_cost": 0}));
    }

    #[tokio::test]
    async fn test_total_cost_requires_window() {
        let state = test_state();

        let (status, error) = send(&state, Method::GET, "/subscriptions/cost?from=01-2024", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            error,
            json!({"error": "'from' and 'to' query parameters required, format MM-YYYY"})
        );

        let (status, _) = send(&state, Method::GET, "/subscriptions/cost?from=2024-01&to=12-2024", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, Method::GET, "/subscriptions/cost?from=12-2024&to=01-2024", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let state = test_state();

        let (status, error) = send(&state, Method::GET, "/subscriptions/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, json!({"error": "invalid subscription id"}));

        let missing = "/subscriptions/8a1f0f3e-8c61-4e0b-9a57-3f4b0e6d2c11";
        let (status, error) = send(&state, Method::GET, missing, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error, json!({"error": "subscription not found"}));

        let (status, _) = send(&state, Method::DELETE, missing, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &state,
            Method::PUT,
            missing,
            Some(json!({"service_name": "Netflix", "price": 1, "user_id": ALICE, "start_date": "01-2024"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, error) = send(
            &state,
            Method::POST,
            "/subscriptions",
            Some(json!({"service_name": "Netflix", "price": 1, "user_id": ALICE, "start_date": "2024-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, json!({"error": "invalid date format, use MM-YYYY"}));

        let (status, _) = send(
            &state,
            Method::POST,
            "/subscriptions",
            Some(json!({"service_name": "Netflix", "price": 1, "user_id": ALICE,
                        "start_date": "05-2024", "end_date": "01-2024"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, Method::POST, "/subscriptions", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_routes() {
        let state = test_state();

        let (status, _) = send(&state, Method::GET, "/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, Method::PATCH, "/subscriptions", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = send(&state, Method::POST, "/subscriptions/cost", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
