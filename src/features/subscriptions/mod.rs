/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連するすべての機能を提供します：
/// - サブスクリプションの作成、取得、更新、論理削除
/// - 条件付きの一覧取得
/// - 集計期間に対する合計金額の計算
pub mod cost;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

// 公開インターフェース
pub use models::{
    BillingMonth, CostQuery, ListFilter, Subscription, SubscriptionCommand, SubscriptionPayload,
};

pub use service::SubscriptionService;
