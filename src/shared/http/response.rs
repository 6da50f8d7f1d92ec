use crate::shared::errors::{AppError, AppResult, ErrorSeverity};
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// リクエストボディの上限サイズ
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// エラーレスポンスのボディ
#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
    pub error: &'a str,
}

/// JSONレスポンスを作成する
///
/// # 引数
/// * `status` - HTTPステータスコード
/// * `value` - シリアライズする値
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<String> {
    match serde_json::to_string(value) {
        Ok(body) => with_json_body(status, body),
        Err(e) => {
            log::error!("レスポンスのシリアライズに失敗しました: {e}");
            with_json_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"failed to encode response"}"#.to_string(),
            )
        }
    }
}

fn with_json_body(status: StatusCode, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// エラーレスポンスを作成する
///
/// 重要度に応じたログレベルで詳細を記録し、クライアントには`user_message`のみを返す。
pub fn error_response(error: &AppError) -> Response<String> {
    match error.severity() {
        ErrorSeverity::Low => log::info!("リクエストを拒否しました: {}", error.details()),
        ErrorSeverity::Medium => log::warn!("リクエスト処理でエラーが発生しました: {}", error.details()),
        ErrorSeverity::High | ErrorSeverity::Critical => {
            log::error!("リクエスト処理でエラーが発生しました: {}", error.details())
        }
    }

    json_response(
        error.status_code(),
        &ErrorResponse {
            error: error.user_message(),
        },
    )
}

/// 404レスポンス
pub fn not_found() -> Response<String> {
    json_response(StatusCode::NOT_FOUND, &ErrorResponse { error: "not found" })
}

/// 405レスポンス
///
/// # 引数
/// * `allowed` - 許可されたメソッド（Allowヘッダーの値）
pub fn method_not_allowed(allowed: &'static str) -> Response<String> {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse {
            error: "method not allowed",
        },
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allowed));
    response
}

/// リクエストボディをJSONとして読み込む
///
/// 上限サイズを超えた場合や不正なJSONの場合はバリデーションエラー。
pub async fn read_json_body<T, B>(body: B) -> AppResult<T>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| AppError::validation(format!("failed to read request body: {e}")))?
        .to_bytes();

    if bytes.is_empty() {
        return Err(AppError::validation("request body is required"));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::validation(format!("invalid request body: {e}")))
}

/// クエリ文字列を解析する
///
/// 空文字列の値は指定なしとして扱う。同じキーが複数ある場合は最初の値を使う。
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        if value.is_empty() {
            continue;
        }
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        name: String,
    }

    #[test]
    fn test_parse_query() {
        let params = parse_query(Some("user_id=abc&service_name=Yandex%20Plus&from=&to=12-2024&to=01-2025"));

        assert_eq!(params.get("user_id").map(String::as_str), Some("abc"));
        assert_eq!(params.get("service_name").map(String::as_str), Some("Yandex Plus"));
        assert!(!params.contains_key("from"));
        assert_eq!(params.get("to").map(String::as_str), Some("12-2024"));

        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_error_response_hides_internal_details() {
        let response = error_response(&AppError::Database("disk I/O error".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.body().contains("disk"));
        assert_eq!(response.body(), r#"{"error":"internal database error"}"#);
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = method_not_allowed("GET, POST");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST");
    }

    #[tokio::test]
    async fn test_read_json_body() {
        let probe: Probe = read_json_body(Full::new(Bytes::from(r#"{"name":"ok"}"#)))
            .await
            .unwrap();
        assert_eq!(probe.name, "ok");

        let empty = read_json_body::<Probe, _>(Full::new(Bytes::new())).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let broken = read_json_body::<Probe, _>(Full::new(Bytes::from("{"))).await;
        assert!(matches!(broken, Err(AppError::Validation(_))));

        let oversized = Bytes::from(vec![b' '; MAX_BODY_BYTES + 1]);
        let too_large = read_json_body::<Probe, _>(Full::new(oversized)).await;
        assert!(matches!(too_large, Err(AppError::Validation(_))));
    }
}
