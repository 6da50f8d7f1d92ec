//! 集計期間に対するサブスクリプション費用の計算
//!
//! 課金は月単位で行い、月の一部でも有効であればその月全体を課金する。

use super::models::{BillingMonth, Subscription};

/// 集計期間内の課金月数を計算する
///
/// # 引数
/// * `start` - サブスクリプションの開始月
/// * `end` - サブスクリプションの終了月（含む）。Noneは無期限
/// * `from` - 集計期間の開始月
/// * `to` - 集計期間の終了月（含む）
///
/// # 戻り値
/// 有効期間と集計期間が重なる月数。重ならない場合は0
pub fn billed_months(
    start: BillingMonth,
    end: Option<BillingMonth>,
    from: BillingMonth,
    to: BillingMonth,
) -> i64 {
    let effective_start = start.max(from);
    let effective_end = end.map_or(to, |end| end.min(to));

    if effective_end < effective_start {
        return 0;
    }

    effective_start.months_through(effective_end)
}

/// 1件のサブスクリプションが集計期間に支払う金額
///
/// 削除済みのサブスクリプションは0を返す。
pub fn subscription_cost(subscription: &Subscription, from: BillingMonth, to: BillingMonth) -> i64 {
    if subscription.is_deleted {
        return 0;
    }

    let months = billed_months(subscription.start_date, subscription.end_date, from, to);
    subscription.price.saturating_mul(months)
}

/// 複数のサブスクリプションの合計金額を計算する
///
/// # 引数
/// * `subscriptions` - 集計対象の候補
/// * `from` - 集計期間の開始月
/// * `to` - 集計期間の終了月（含む）
///
/// # 戻り値
/// 合計金額（最小通貨単位）
pub fn total_cost<'a, I>(subscriptions: I, from: BillingMonth, to: BillingMonth) -> i64
where
    I: IntoIterator<Item = &'a Subscription>,
{
    subscriptions
        .into_iter()
        .map(|subscription| subscription_cost(subscription, from, to))
        .fold(0i64, i64::saturating_add)
}
