use crate::shared::errors::AppError;
use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 日付形式エラーの共通メッセージ
pub const DATE_FORMAT_MESSAGE: &str = "invalid date format, use MM-YYYY";

/// 課金月（年と月のみ、日は常に1日に切り詰める）
///
/// 通信上は `MM-YYYY`、データベース上は月初日の `YYYY-MM-DD` で表現する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingMonth(NaiveDate);

impl BillingMonth {
    /// 年と月から課金月を作成する
    ///
    /// # 戻り値
    /// 課金月、または月が範囲外の場合はNone
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// 日付の日部分を切り捨てて課金月に変換する
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// `self` から `end` までの課金月数（両端を含む）
    ///
    /// `end` が `self` より前の場合は0以下になる。
    pub fn months_through(&self, end: BillingMonth) -> i64 {
        let years = i64::from(end.year()) - i64::from(self.year());
        let months = i64::from(end.month()) - i64::from(self.month());
        years * 12 + months + 1
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%m-%Y"))
    }
}

impl FromStr for BillingMonth {
    type Err = AppError;

    /// `MM-YYYY` 形式（月2桁・年4桁）を解析する
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::validation(DATE_FORMAT_MESSAGE);

        let (month, year) = value.trim().split_once('-').ok_or_else(invalid)?;
        let is_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(month, 2) || !is_digits(year, 4) {
            return Err(invalid());
        }

        let month: u32 = month.parse().map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;

        BillingMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for BillingMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for BillingMonth {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.format("%Y-%m-%d").to_string()))
    }
}

impl FromSql for BillingMonth {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(BillingMonth::from_date)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// サブスクリプションデータモデル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub service_name: String,
    /// 1課金月あたりの価格（最小通貨単位）
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: BillingMonth,
    /// 最終課金月（含む）。Noneは終了日未定
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<BillingMonth>,
    pub is_deleted: bool,
}

/// サブスクリプション作成・更新リクエストのボディ
///
/// 必須項目の欠落も独自のメッセージで返すため、全項目をOptionで受け取る。
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionPayload {
    pub service_name: Option<String>,
    pub price: Option<i64>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// 検証済みの作成・更新コマンド
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionCommand {
    pub service_name: String,
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: BillingMonth,
    pub end_date: Option<BillingMonth>,
}

/// 一覧取得のフィルター条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}

/// 合計金額計算の条件
#[derive(Debug, Clone, PartialEq)]
pub struct CostQuery {
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
    /// 集計期間の開始月
    pub from: BillingMonth,
    /// 集計期間の終了月（含む）
    pub to: BillingMonth,
}

/// 合計金額レスポンス
#[derive(Debug, Serialize)]
pub struct CostResponse {
    pub total_cost: i64,
}

/// メッセージレスポンス
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
