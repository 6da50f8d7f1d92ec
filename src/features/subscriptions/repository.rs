use super::models::{CostQuery, ListFilter, Subscription, SubscriptionCommand};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str =
    "SELECT id, service_name, price, user_id, start_date, end_date, is_deleted FROM subscriptions";

/// 行をサブスクリプションに変換する
fn map_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: parse_uuid_column(row, 0)?,
        service_name: row.get(1)?,
        price: row.get(2)?,
        user_id: parse_uuid_column(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        is_deleted: row.get::<_, i64>(6)? != 0,
    })
}

/// TEXTで保存したUUIDを読み出す
fn parse_uuid_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(index)?;
    Uuid::parse_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn subscription_not_found() -> AppError {
    AppError::not_found("subscription")
}

/// ユーザーとサービス名の等価条件を追加する
///
/// ユーザー条件を常にサービス名条件より先に置く。
fn push_equality_filters(
    sql: &mut String,
    args: &mut Vec<Box<dyn ToSql>>,
    user_id: Option<&Uuid>,
    service_name: Option<&String>,
) {
    if let Some(user_id) = user_id {
        args.push(Box::new(user_id.to_string()));
        sql.push_str(&format!(" AND user_id = ?{}", args.len()));
    }
    if let Some(service_name) = service_name {
        args.push(Box::new(service_name.clone()));
        sql.push_str(&format!(" AND service_name = ?{}", args.len()));
    }
}

/// 組み立てたクエリを実行して全行を取得する
fn query_subscriptions(
    conn: &Connection,
    sql: &str,
    args: &[Box<dyn ToSql>],
) -> AppResult<Vec<Subscription>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), map_row)?;

    let subscriptions = rows.collect::<Result<Vec<_>, _>>()?;

    Ok(subscriptions)
}

/// サブスクリプションを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `command` - 検証済みの作成コマンド
///
/// # 戻り値
/// 新しいIDが割り当てられたサブスクリプション、または失敗時はエラー
pub fn create(conn: &Connection, command: SubscriptionCommand) -> AppResult<Subscription> {
    let id = Uuid::new_v4();

    conn.execute(
        "INSERT INTO subscriptions (id, service_name, price, user_id, start_date, end_date, is_deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![
            id.to_string(),
            command.service_name,
            command.price,
            command.user_id.to_string(),
            command.start_date,
            command.end_date,
        ],
    )?;

    find_by_id(conn, &id)
}

/// IDでサブスクリプションを取得する
///
/// 論理削除済みのレコードも返す。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// サブスクリプション、存在しない場合はNotFound
pub fn find_by_id(conn: &Connection, id: &Uuid) -> AppResult<Subscription> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
        params![id.to_string()],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => subscription_not_found(),
        _ => AppError::Database(e.to_string()),
    })
}

/// 論理削除されていないサブスクリプション一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `filter` - ユーザーIDとサービス名の任意条件
///
/// # 戻り値
/// サービス名・開始月順のサブスクリプションのリスト
pub fn find_all(conn: &Connection, filter: &ListFilter) -> AppResult<Vec<Subscription>> {
    let mut sql = format!("{SELECT_COLUMNS} WHERE is_deleted = 0");
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    push_equality_filters(
        &mut sql,
        &mut args,
        filter.user_id.as_ref(),
        filter.service_name.as_ref(),
    );
    sql.push_str(" ORDER BY service_name, start_date, id");

    query_subscriptions(conn, &sql, &args)
}

/// 集計期間と重なる論理削除されていないサブスクリプションを取得する
///
/// 開始月が期間の終了月以前で、終了月が未設定または期間の開始月以降のものが対象。
///
/// # 引数
/// * `conn` - データベース接続
/// * `query` - 期間と任意のフィルター条件
///
/// # 戻り値
/// 条件に一致するサブスクリプションのリスト
pub fn find_overlapping(conn: &Connection, query: &CostQuery) -> AppResult<Vec<Subscription>> {
    let mut sql = format!(
        "{SELECT_COLUMNS} WHERE is_deleted = 0 AND start_date <= ?1 AND (end_date IS NULL OR end_date >= ?2)"
    );
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    args.push(Box::new(query.to));
    args.push(Box::new(query.from));

    push_equality_filters(
        &mut sql,
        &mut args,
        query.user_id.as_ref(),
        query.service_name.as_ref(),
    );

    query_subscriptions(conn, &sql, &args)
}

/// サブスクリプションを更新する
///
/// IDと削除フラグ以外の全項目を置き換える。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `command` - 検証済みの更新コマンド
///
/// # 戻り値
/// 更新後のサブスクリプション、存在しない場合はNotFound
pub fn update(conn: &Connection, id: &Uuid, command: SubscriptionCommand) -> AppResult<Subscription> {
    let rows_affected = conn.execute(
        "UPDATE subscriptions
         SET service_name = ?1, price = ?2, user_id = ?3, start_date = ?4, end_date = ?5
         WHERE id = ?6",
        params![
            command.service_name,
            command.price,
            command.user_id.to_string(),
            command.start_date,
            command.end_date,
            id.to_string(),
        ],
    )?;

    if rows_affected == 0 {
        return Err(subscription_not_found());
    }

    find_by_id(conn, id)
}

/// サブスクリプションを論理削除する
///
/// 削除済みのレコードに対しても成功する。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// 成功時はOk(())、存在しない場合はNotFound
pub fn soft_delete(conn: &Connection, id: &Uuid) -> AppResult<()> {
    let rows_affected = conn.execute(
        "UPDATE subscriptions SET is_deleted = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;

    if rows_affected == 0 {
        return Err(subscription_not_found());
    }

    Ok(())
}
