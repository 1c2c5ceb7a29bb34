//! 账单数据模型
//!
//! 账单条目与账单信息一经构造即不可变，所有字段在规整阶段一次性确定。

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// 处理状态
///
/// 单张图片结果使用 success / failure；
/// 批量聚合状态使用 success / partial / error。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Success,
    Partial,
    Error,
    Failure,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::Partial => "partial",
            ProcessingStatus::Error => "error",
            ProcessingStatus::Failure => "failure",
        }
    }
}

/// 账单上的单个条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// 条目名称（去除首尾空白后非空）
    pub name: String,
    /// 单价（非负，保留两位小数）
    pub price: f64,
    /// 数量（正整数，默认 1）
    pub quantity: u32,
}

impl LineItem {
    pub fn new(name: impl Into<String>, price: f64, quantity: u32) -> Self {
        Self {
            name: name.into(),
            price: round2(price),
            quantity,
        }
    }

    /// 条目小计 = 单价 × 数量
    pub fn amount(&self) -> f64 {
        round2(self.price * self.quantity as f64)
    }
}

/// 提取出的账单信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// ISO 4217 货币代码，默认 USD
    pub currency: String,
    /// 规整阶段记录的警告（对账偏差、字段降级等）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Default for BillInfo {
    fn default() -> Self {
        Self {
            restaurant_name: None,
            date: None,
            time: None,
            items: Vec::new(),
            subtotal: None,
            tax: None,
            tip: None,
            total: None,
            currency: "USD".to_string(),
            warnings: Vec::new(),
        }
    }
}

impl BillInfo {
    /// 所有条目的小计之和
    pub fn items_total(&self) -> f64 {
        round2(self.items.iter().map(|item| item.amount()).sum())
    }
}

/// 金额取整到分
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_rounds_price() {
        let item = LineItem::new("Latte", 4.999, 2);
        assert_eq!(item.price, 5.0);
        assert_eq!(item.amount(), 10.0);
    }

    #[test]
    fn test_items_total() {
        let bill = BillInfo {
            items: vec![
                LineItem::new("Pizza", 18.0, 1),
                LineItem::new("Cola", 2.5, 2),
            ],
            ..Default::default()
        };
        assert_eq!(bill.items_total(), 23.0);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Partial).unwrap(),
            "\"partial\""
        );
        assert_eq!(ProcessingStatus::Failure.as_str(), "failure");
    }

    #[test]
    fn test_bill_info_skips_absent_fields() {
        let bill = BillInfo {
            total: Some(18.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&bill).unwrap();
        assert!(json.get("subtotal").is_none());
        assert!(json.get("warnings").is_none());
        assert_eq!(json["currency"], "USD");
    }
}
