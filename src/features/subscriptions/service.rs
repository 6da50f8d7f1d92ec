use super::cost;
use super::models::{CostQuery, ListFilter, Subscription, SubscriptionCommand};
use super::repository;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// サブスクリプションのユースケースをまとめたサービス
///
/// データベース接続は呼び出し側から注入される。各メソッドは同期的にSQLiteへアクセスするため、
/// 非同期コンテキストからは`spawn_blocking`経由で呼び出すこと。
#[derive(Clone)]
pub struct SubscriptionService {
    db: Arc<Mutex<Connection>>,
}

impl SubscriptionService {
    /// 新しいサービスを作成する
    ///
    /// # 引数
    /// * `db` - 共有データベース接続
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// データベース接続のロックを取得する
    fn connection(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロックエラー: {e}")))
    }

    /// サブスクリプションを作成する
    pub fn create(&self, command: SubscriptionCommand) -> AppResult<Subscription> {
        let conn = self.connection()?;
        let subscription = repository::create(&conn, command)?;
        log::debug!("サブスクリプションを作成しました: id={}", subscription.id);
        Ok(subscription)
    }

    /// IDでサブスクリプションを取得する
    pub fn get(&self, id: &Uuid) -> AppResult<Subscription> {
        let conn = self.connection()?;
        repository::find_by_id(&conn, id)
    }

    /// サブスクリプションの内容を置き換える
    pub fn update(&self, id: &Uuid, command: SubscriptionCommand) -> AppResult<Subscription> {
        let conn = self.connection()?;
        repository::update(&conn, id, command)
    }

    /// サブスクリプションを論理削除する
    ///
    /// 存在確認と削除フラグの更新は同じロックの中で行う。
    /// 削除済みのレコードを再度削除しても状態は変わらない。
    ///
    /// # 戻り値
    /// 成功時はOk(())、存在しない場合はNotFound
    pub fn delete(&self, id: &Uuid) -> AppResult<()> {
        let conn = self.connection()?;

        let existing = repository::find_by_id(&conn, id)?;
        if existing.is_deleted {
            log::debug!("既に論理削除済みのサブスクリプションです: id={id}");
            return Ok(());
        }

        repository::soft_delete(&conn, id)
    }

    /// 論理削除されていないサブスクリプション一覧を取得する
    pub fn list(&self, filter: &ListFilter) -> AppResult<Vec<Subscription>> {
        let conn = self.connection()?;
        repository::find_all(&conn, filter)
    }

    /// 集計期間内の合計金額を計算する
    ///
    /// # 引数
    /// * `query` - 集計期間と任意のフィルター条件
    ///
    /// # 戻り値
    /// 合計金額（最小通貨単位）
    pub fn total_cost(&self, query: &CostQuery) -> AppResult<i64> {
        let candidates = {
            let conn = self.connection()?;
            repository::find_overlapping(&conn, query)?
        };

        let total = cost::total_cost(&candidates, query.from, query.to);
        log::debug!(
            "合計金額を計算しました: candidates={}, total={total}",
            candidates.len()
        );
        Ok(total)
    }
}
