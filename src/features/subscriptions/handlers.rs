use super::models::{
    BillingMonth, CostQuery, CostResponse, ListFilter, MessageResponse, SubscriptionCommand,
    SubscriptionPayload,
};
use super::service::SubscriptionService;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::http::{json_response, parse_query, read_json_body};
use hyper::body::{Body, Bytes};
use hyper::{Response, StatusCode};
use std::collections::HashMap;
use uuid::Uuid;

/// サービス名の最大文字数
const MAX_SERVICE_NAME_CHARS: usize = 100;

/// サービスの同期処理をブロッキング用スレッドで実行する
async fn run_blocking<T, F>(service: &SubscriptionService, task: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&SubscriptionService) -> AppResult<T> + Send + 'static,
{
    let service = service.clone();
    tokio::task::spawn_blocking(move || task(&service))
        .await
        .map_err(|e| AppError::concurrency(format!("ブロッキングタスクの実行に失敗: {e}")))?
}

/// サブスクリプションを作成する（POST /subscriptions）
///
/// # 引数
/// * `body` - JSONリクエストボディ
/// * `service` - サブスクリプションサービス
///
/// # 戻り値
/// 201と作成されたサブスクリプション、または失敗時はエラー
pub async fn create_subscription<B>(
    body: B,
    service: &SubscriptionService,
) -> AppResult<Response<String>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    log::info!("サブスクリプション作成リクエストを受信しました");

    let payload: SubscriptionPayload = read_json_body(body).await?;
    let command = validate_subscription_payload(payload)?;

    let subscription = run_blocking(service, move |service| service.create(command)).await?;

    log::info!("サブスクリプションを作成しました: id={}", subscription.id);
    Ok(json_response(StatusCode::CREATED, &subscription))
}

/// IDでサブスクリプションを取得する（GET /subscriptions/{id}）
pub async fn get_subscription(
    id: &str,
    service: &SubscriptionService,
) -> AppResult<Response<String>> {
    log::info!("サブスクリプションを取得します: id={id}");

    let id = parse_subscription_id(id)?;
    let subscription = run_blocking(service, move |service| service.get(&id)).await?;

    Ok(json_response(StatusCode::OK, &subscription))
}

/// サブスクリプションを更新する（PUT /subscriptions/{id}）
///
/// # 引数
/// * `id` - パスから取り出したサブスクリプションID
/// * `body` - JSONリクエストボディ（作成時と同じ形式）
/// * `service` - サブスクリプションサービス
pub async fn update_subscription<B>(
    id: &str,
    body: B,
    service: &SubscriptionService,
) -> AppResult<Response<String>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    log::info!("サブスクリプションを更新します: id={id}");

    let id = parse_subscription_id(id)?;
    let payload: SubscriptionPayload = read_json_body(body).await?;
    let command = validate_subscription_payload(payload)?;

    let subscription = run_blocking(service, move |service| service.update(&id, command)).await?;

    log::info!("サブスクリプションを更新しました: id={id}");
    Ok(json_response(StatusCode::OK, &subscription))
}

/// サブスクリプションを論理削除する（DELETE /subscriptions/{id}）
pub async fn delete_subscription(
    id: &str,
    service: &SubscriptionService,
) -> AppResult<Response<String>> {
    log::info!("サブスクリプションを削除します: id={id}");

    let id = parse_subscription_id(id)?;
    run_blocking(service, move |service| service.delete(&id)).await?;

    log::info!("サブスクリプションを削除しました: id={id}");
    Ok(json_response(
        StatusCode::OK,
        &MessageResponse {
            message: "subscription deleted".to_string(),
        },
    ))
}

/// サブスクリプション一覧を取得する（GET /subscriptions）
///
/// `user_id` と `service_name` で絞り込める。
pub async fn list_subscriptions(
    query: Option<&str>,
    service: &SubscriptionService,
) -> AppResult<Response<String>> {
    let params = parse_query(query);
    log::info!(
        "サブスクリプション一覧を取得します: user_id={:?}, service_name={:?}",
        params.get("user_id"),
        params.get("service_name")
    );

    let filter = ListFilter {
        user_id: parse_user_id_filter(&params)?,
        service_name: params.get("service_name").cloned(),
    };

    let subscriptions = run_blocking(service, move |service| service.list(&filter)).await?;

    log::info!("{}件のサブスクリプションを返却します", subscriptions.len());
    Ok(json_response(StatusCode::OK, &subscriptions))
}

/// 集計期間の合計金額を計算する（GET /subscriptions/cost）
///
/// `from`・`to` は必須（MM-YYYY）。`user_id` と `service_name` は任意。
pub async fn calculate_total_cost(
    query: Option<&str>,
    service: &SubscriptionService,
) -> AppResult<Response<String>> {
    let params = parse_query(query);
    log::info!(
        "合計金額を計算します: user_id={:?}, service_name={:?}, from={:?}, to={:?}",
        params.get("user_id"),
        params.get("service_name"),
        params.get("from"),
        params.get("to")
    );

    let cost_query = parse_cost_query(&params)?;
    let total_cost = run_blocking(service, move |service| service.total_cost(&cost_query)).await?;

    log::info!("合計金額: {total_cost}");
    Ok(json_response(StatusCode::OK, &CostResponse { total_cost }))
}

/// パスのIDを解析する
fn parse_subscription_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::validation("invalid subscription id"))
}

/// クエリの user_id を解析する（未指定の場合はNone）
fn parse_user_id_filter(params: &HashMap<String, String>) -> AppResult<Option<Uuid>> {
    params
        .get("user_id")
        .map(|raw| Uuid::parse_str(raw).map_err(|_| AppError::validation("invalid user_id")))
        .transpose()
}

/// 合計金額計算のクエリを解析する
fn parse_cost_query(params: &HashMap<String, String>) -> AppResult<CostQuery> {
    let (from, to) = match (params.get("from"), params.get("to")) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            return Err(AppError::validation(
                "'from' and 'to' query parameters required, format MM-YYYY",
            ))
        }
    };

    let from: BillingMonth = from
        .parse()
        .map_err(|_| AppError::validation("invalid 'from' date format, use MM-YYYY"))?;
    let to: BillingMonth = to
        .parse()
        .map_err(|_| AppError::validation("invalid 'to' date format, use MM-YYYY"))?;

    if from > to {
        return Err(AppError::validation("'from' must not be after 'to'"));
    }

    Ok(CostQuery {
        user_id: parse_user_id_filter(params)?,
        service_name: params.get("service_name").cloned(),
        from,
        to,
    })
}

/// 作成・更新リクエストのバリデーション
///
/// # 引数
/// * `payload` - リクエストボディ
///
/// # 戻り値
/// 検証済みのコマンド、または失敗時はバリデーションエラー
fn validate_subscription_payload(payload: SubscriptionPayload) -> AppResult<SubscriptionCommand> {
    let non_blank = |value: &String| !value.trim().is_empty();

    // バリデーション: サービス名は必須かつ100文字以内
    let service_name = payload
        .service_name
        .filter(non_blank)
        .ok_or_else(|| AppError::validation("service_name is required"))?;
    if service_name.chars().count() > MAX_SERVICE_NAME_CHARS {
        return Err(AppError::validation(format!(
            "service_name must be at most {MAX_SERVICE_NAME_CHARS} characters"
        )));
    }

    // バリデーション: 価格は正の整数
    let price = payload
        .price
        .ok_or_else(|| AppError::validation("price is required"))?;
    if price <= 0 {
        return Err(AppError::validation("price must be a positive integer"));
    }

    let user_id = payload
        .user_id
        .filter(non_blank)
        .ok_or_else(|| AppError::validation("user_id is required"))?;
    let user_id = Uuid::parse_str(user_id.trim()).map_err(|_| AppError::validation("invalid user_id"))?;

    // バリデーション: 日付はMM-YYYY形式
    let start_date: BillingMonth = payload
        .start_date
        .filter(non_blank)
        .ok_or_else(|| AppError::validation("start_date is required"))?
        .parse()?;
    let end_date = payload
        .end_date
        .filter(non_blank)
        .map(|raw| raw.parse::<BillingMonth>())
        .transpose()?;

    // バリデーション: 終了月は開始月以降
    if let Some(end_date) = end_date {
        if end_date < start_date {
            return Err(AppError::validation("end_date must not precede start_date"));
        }
    }

    Ok(SubscriptionCommand {
        service_name,
        price,
        user_id,
        start_date,
        end_date,
    })
}
