//! 账单规整器 - 业务能力层
//!
//! 把远程模型输出的半结构化 JSON 整形为规范的 [`BillInfo`]。
//!
//! 规整原则：全量容错。模型输出是不可信的噪声源，可恢复的异常一律
//! 降级并记入警告，绝不抛出；只有"完全无可用字段"（没有条目也没有
//! 总额）才宣告整体失败。对账检查在构造成功之后运行，只追加警告，
//! 永远不会把成功翻转为失败。

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::bill::{round2, BillInfo, LineItem};

/// 单个字段的规整结局
///
/// 每一次字段规整都归于三种结局之一，调用方据此决定取值与记警告，
/// 规整过程本身永不失败。
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Coerced<T> {
    /// 原值可用
    Value(T),
    /// 降级为替代值，附带警告
    Defaulted(T, String),
    /// 无法使用，附带警告
    Unusable(String),
}

/// 单张账单的条目数量上限，超出部分丢弃并记警告
const MAX_ITEMS: usize = 100;

/// 已知的 ISO 4217 货币代码
static KNOWN_CURRENCIES: phf::Set<&'static str> = phf::phf_set! {
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "SEK", "NZD",
};

/// 把原始模型输出规整为账单信息
///
/// # 参数
/// - `raw_text`: 模型输出的完整文本（仅用于失败时的上下文判断）
/// - `structured`: 从文本中恢复出的 JSON 负载
pub fn normalize(raw_text: &str, structured: Option<&JsonValue>) -> PipelineResult<BillInfo> {
    let Some(payload) = structured else {
        let message = if raw_text.trim().is_empty() {
            "模型没有返回任何文本"
        } else {
            "模型输出中没有 JSON 负载"
        };
        return Err(PipelineError::schema_extraction_failed(message));
    };

    let Some(fields) = payload.as_object() else {
        return Err(PipelineError::schema_extraction_failed(
            "JSON 负载不是对象",
        ));
    };

    let mut warnings = Vec::new();

    let restaurant_name = coerce_text(fields.get("restaurant_name"));
    let date = coerce_date(fields.get("date"), &mut warnings);
    let time = coerce_time(fields.get("time"), &mut warnings);
    let items = coerce_items(fields.get("items"), &mut warnings);
    let subtotal = resolve(coerce_amount(fields.get("subtotal"), "subtotal"), &mut warnings);
    let tax = resolve(coerce_amount(fields.get("tax"), "tax"), &mut warnings);
    let tip = resolve(coerce_amount(fields.get("tip"), "tip"), &mut warnings);
    let total = resolve(coerce_amount(fields.get("total"), "total"), &mut warnings);
    let currency = coerce_currency(fields.get("currency"), &mut warnings);

    // 没有条目也没有总额的账单毫无用处，按整体失败处理而不是空成功
    if items.is_empty() && total.is_none() {
        return Err(PipelineError::schema_extraction_failed(
            "未提取到任何条目或总额",
        ));
    }

    let mut bill = BillInfo {
        restaurant_name,
        date,
        time,
        items,
        subtotal,
        tax,
        tip,
        total,
        currency,
        warnings,
    };

    reconcile(&mut bill);

    debug!(
        "规整完成: {} 个条目, 总额 {:?}, {} 条警告",
        bill.items.len(),
        bill.total,
        bill.warnings.len()
    );

    Ok(bill)
}

/// 把规整结局落成取值，警告归档
fn resolve<T>(outcome: Coerced<Option<T>>, warnings: &mut Vec<String>) -> Option<T> {
    match outcome {
        Coerced::Value(value) => value,
        Coerced::Defaulted(value, warning) => {
            warnings.push(warning);
            value
        }
        Coerced::Unusable(warning) => {
            warnings.push(warning);
            None
        }
    }
}

/// 可选文本：去除首尾空白，空串视为缺失
fn coerce_text(value: Option<&JsonValue>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// 金额字段：接受 JSON 数字或携带货币符号/千位分隔符的字符串
fn coerce_amount(value: Option<&JsonValue>, field: &str) -> Coerced<Option<f64>> {
    let Some(value) = value else {
        return Coerced::Value(None);
    };
    if value.is_null() {
        return Coerced::Value(None);
    }

    match coerce_money_value(value) {
        Some(amount) if amount >= 0.0 => Coerced::Value(Some(round2(amount))),
        Some(amount) => Coerced::Unusable(format!("金额字段 {} 为负数 ({})，已忽略", field, amount)),
        None => Coerced::Unusable(format!("金额字段 {} 无法解析: {}", field, value)),
    }
}

/// 金额取值：数字直接取，字符串先剥离货币噪声再解析
fn coerce_money_value(value: &JsonValue) -> Option<f64> {
    if let Some(number) = value.as_f64() {
        return number.is_finite().then_some(number);
    }
    value.as_str().and_then(parse_money_str)
}

/// 解析带货币符号/千位分隔符的金额字符串，例如 `"$1,234.56"`
fn parse_money_str(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let number: f64 = cleaned.parse().ok()?;
    number.is_finite().then_some(number)
}

/// 条目列表：非数组降级为空序列，不因此否决整张账单
fn coerce_items(value: Option<&JsonValue>, warnings: &mut Vec<String>) -> Vec<LineItem> {
    let array = match value {
        None => return Vec::new(),
        Some(JsonValue::Null) => return Vec::new(),
        Some(JsonValue::Array(array)) => array,
        Some(other) => {
            warnings.push(format!("items 字段不是数组 ({})，按无条目处理", other));
            return Vec::new();
        }
    };

    let mut items = Vec::new();
    for (index, raw) in array.iter().enumerate() {
        if items.len() == MAX_ITEMS {
            warnings.push(format!(
                "条目数量超过上限 {}，其余 {} 条已丢弃",
                MAX_ITEMS,
                array.len() - index
            ));
            break;
        }
        match coerce_item(raw, index) {
            Coerced::Value(item) => items.push(item),
            Coerced::Defaulted(item, warning) => {
                warnings.push(warning);
                items.push(item);
            }
            Coerced::Unusable(warning) => warnings.push(warning),
        }
    }
    items
}

/// 单个条目：名称缺失或价格不可用时丢弃该条目，绝不中止整张账单
fn coerce_item(raw: &JsonValue, index: usize) -> Coerced<LineItem> {
    let name = raw
        .get("name")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() {
        return Coerced::Unusable(format!("第 {} 个条目缺少名称，已丢弃", index + 1));
    }

    let price = match raw.get("price") {
        Some(value) if !value.is_null() => coerce_money_value(value),
        _ => None,
    };
    let price = match price {
        Some(price) if price >= 0.0 => price,
        Some(_) => {
            return Coerced::Unusable(format!("条目 \"{}\" 价格为负，已丢弃", name));
        }
        None => {
            return Coerced::Unusable(format!("条目 \"{}\" 价格缺失或无法解析，已丢弃", name));
        }
    };

    match coerce_quantity(raw.get("quantity"), name) {
        Coerced::Value(quantity) => Coerced::Value(LineItem::new(name, price, quantity)),
        Coerced::Defaulted(quantity, warning) => {
            Coerced::Defaulted(LineItem::new(name, price, quantity), warning)
        }
        Coerced::Unusable(warning) => Coerced::Unusable(warning),
    }
}

/// 数量：缺失默认 1；0 视为 OCR 误读改为 1 并记警告；
/// 负数、小数或无法解析的值同样降级为 1
fn coerce_quantity(value: Option<&JsonValue>, name: &str) -> Coerced<u32> {
    let Some(value) = value else {
        return Coerced::Value(1);
    };
    if value.is_null() {
        return Coerced::Value(1);
    }

    let parsed = if let Some(number) = value.as_u64() {
        Some(number)
    } else if let Some(number) = value.as_f64() {
        (number.fract() == 0.0 && number >= 0.0).then_some(number as u64)
    } else {
        value.as_str().and_then(|s| s.trim().parse::<u64>().ok())
    };

    match parsed {
        Some(0) => Coerced::Defaulted(
            1,
            format!("条目 \"{}\" 数量为 0，视为 OCR 误读，已改为 1", name),
        ),
        Some(quantity) => Coerced::Value(quantity.min(u32::MAX as u64) as u32),
        None => Coerced::Defaulted(
            1,
            format!("条目 \"{}\" 数量无法解析 ({})，已改为 1", name, value),
        ),
    }
}

/// 日期：逐个尝试常见格式，全部失败降级为缺失
fn coerce_date(value: Option<&JsonValue>, warnings: &mut Vec<String>) -> Option<NaiveDate> {
    let text = coerce_text(value)?;
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y"];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Some(date);
        }
    }
    warnings.push(format!("日期无法解析: {}", text));
    None
}

/// 时间：逐个尝试常见格式，全部失败降级为缺失
fn coerce_time(value: Option<&JsonValue>, warnings: &mut Vec<String>) -> Option<NaiveTime> {
    let text = coerce_text(value)?;
    const FORMATS: [&str; 3] = ["%H:%M", "%H:%M:%S", "%I:%M %p"];
    for format in FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&text, format) {
            return Some(time);
        }
    }
    warnings.push(format!("时间无法解析: {}", text));
    None
}

/// 货币：规整为 3 位大写代码，未知代码回退 USD
fn coerce_currency(value: Option<&JsonValue>, warnings: &mut Vec<String>) -> String {
    let Some(text) = coerce_text(value) else {
        return "USD".to_string();
    };
    let code = text.to_ascii_uppercase();
    if KNOWN_CURRENCIES.contains(code.as_str()) {
        code
    } else {
        warnings.push(format!("未知货币代码 {}，已回退为 USD", text));
        "USD".to_string()
    }
}

/// 对账检查：条目合计与小计在"每条一分钱"的容差内一致
///
/// OCR 来源天然有噪声，偏差只记警告，不否决账单。
fn reconcile(bill: &mut BillInfo) {
    if bill.items.is_empty() {
        return;
    }
    let Some(subtotal) = bill.subtotal else {
        return;
    };

    let sum = bill.items_total();
    let tolerance = 0.01 * bill.items.len() as f64;
    if (sum - subtotal).abs() > tolerance + 1e-9 {
        bill.warnings.push(format!(
            "条目合计 {:.2} 与小计 {:.2} 不一致",
            sum, subtotal
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_bill_round_trips() {
        let payload = json!({
            "items": [{"name": "Pizza", "price": 18.00, "quantity": 1}],
            "total": 18.00
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.items, vec![LineItem::new("Pizza", 18.0, 1)]);
        assert_eq!(bill.total, Some(18.0));
        assert!(bill.warnings.is_empty());
    }

    #[test]
    fn test_empty_items_and_null_total_fail_closed() {
        let payload = json!({"items": [], "total": null});
        let err = normalize("raw", Some(&payload)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SchemaExtractionFailed);
    }

    #[test]
    fn test_missing_payload_fails_closed() {
        let err = normalize("free-form text without json", None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SchemaExtractionFailed);
    }

    #[test]
    fn test_non_object_payload_fails_closed() {
        let payload = json!([1, 2, 3]);
        assert!(normalize("", Some(&payload)).is_err());
    }

    #[test]
    fn test_full_bill_with_metadata() {
        let payload = json!({
            "restaurant_name": "  Luigi's  ",
            "date": "2026-08-06",
            "time": "19:42",
            "items": [
                {"name": "Pizza", "price": 18.00, "quantity": 2},
                {"name": "Tiramisu", "price": 7.50}
            ],
            "subtotal": 43.50,
            "tax": 3.80,
            "tip": 8.00,
            "total": 55.30,
            "currency": "eur"
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.restaurant_name.as_deref(), Some("Luigi's"));
        assert_eq!(bill.date, NaiveDate::from_ymd_opt(2026, 8, 6));
        assert_eq!(bill.time, NaiveTime::from_hms_opt(19, 42, 0));
        assert_eq!(bill.items.len(), 2);
        assert_eq!(bill.items[1].quantity, 1);
        assert_eq!(bill.currency, "EUR");
        assert!(bill.warnings.is_empty());
    }

    #[test]
    fn test_quantity_zero_coerced_to_one_with_warning() {
        let payload = json!({
            "items": [{"name": "Cola", "price": 2.50, "quantity": 0}],
            "total": 2.50
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.items[0].quantity, 1);
        assert_eq!(bill.warnings.len(), 1);
        assert!(bill.warnings[0].contains("数量为 0"));
    }

    #[test]
    fn test_negative_price_drops_item_with_warning() {
        let payload = json!({
            "items": [
                {"name": "Discount", "price": -3.00, "quantity": 1},
                {"name": "Burger", "price": 9.90, "quantity": 1}
            ],
            "total": 9.90
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.items.len(), 1);
        assert_eq!(bill.items[0].name, "Burger");
        assert!(bill.warnings.iter().any(|w| w.contains("价格为负")));
    }

    #[test]
    fn test_money_strings_with_symbols_and_separators() {
        let payload = json!({
            "items": [{"name": "Banquet", "price": "$1,234.56", "quantity": "2"}],
            "subtotal": "€2,469.12",
            "total": "2,469.12"
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.items[0].price, 1234.56);
        assert_eq!(bill.items[0].quantity, 2);
        assert_eq!(bill.subtotal, Some(2469.12));
        assert_eq!(bill.total, Some(2469.12));
        assert!(bill.warnings.is_empty());
    }

    #[test]
    fn test_negative_amount_field_degrades_to_absent() {
        let payload = json!({
            "items": [{"name": "Tea", "price": 3.00}],
            "tip": -2.00,
            "total": 3.00
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.tip, None);
        assert!(bill.warnings.iter().any(|w| w.contains("tip")));
    }

    #[test]
    fn test_non_array_items_degrade_to_empty() {
        let payload = json!({"items": "unreadable", "total": 12.00});
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert!(bill.items.is_empty());
        assert_eq!(bill.total, Some(12.0));
        assert!(bill.warnings.iter().any(|w| w.contains("items")));
    }

    #[test]
    fn test_unknown_currency_falls_back_to_usd() {
        let payload = json!({
            "items": [{"name": "Tea", "price": 3.00}],
            "total": 3.00,
            "currency": "XYZ"
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.currency, "USD");
        assert!(bill.warnings.iter().any(|w| w.contains("XYZ")));
    }

    #[test]
    fn test_reconciliation_warns_on_mismatch() {
        let payload = json!({
            "items": [{"name": "Pizza", "price": 18.00, "quantity": 1}],
            "subtotal": 25.00,
            "total": 27.50
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert!(bill.warnings.iter().any(|w| w.contains("不一致")));
    }

    #[test]
    fn test_reconciliation_accepts_per_line_rounding() {
        // 每条一分钱的容差内不应告警
        let payload = json!({
            "items": [
                {"name": "A", "price": 1.005, "quantity": 1},
                {"name": "B", "price": 2.004, "quantity": 1}
            ],
            "subtotal": 3.01,
            "total": 3.01
        });
        let bill = normalize("{}", Some(&payload)).unwrap();
        assert!(bill.warnings.is_empty());
    }

    #[test]
    fn test_dates_in_us_and_eu_order() {
        let payload = json!({
            "items": [{"name": "Tea", "price": 3.00}],
            "total": 3.00,
            "date": "25/12/2023"
        });
        let bill = normalize("{}", Some(&payload)).unwrap();
        assert_eq!(bill.date, NaiveDate::from_ymd_opt(2023, 12, 25));
    }

    #[test]
    fn test_unparseable_date_degrades_with_warning() {
        let payload = json!({
            "items": [{"name": "Tea", "price": 3.00}],
            "total": 3.00,
            "date": "yesterday evening"
        });
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.date, None);
        assert!(bill.warnings.iter().any(|w| w.contains("日期")));
    }

    #[test]
    fn test_twelve_hour_time() {
        let payload = json!({
            "items": [{"name": "Tea", "price": 3.00}],
            "total": 3.00,
            "time": "7:30 PM"
        });
        let bill = normalize("{}", Some(&payload)).unwrap();
        assert_eq!(bill.time, NaiveTime::from_hms_opt(19, 30, 0));
    }

    #[test]
    fn test_parse_money_str() {
        assert_eq!(parse_money_str("$1,234.56"), Some(1234.56));
        assert_eq!(parse_money_str("￥ 88"), Some(88.0));
        assert_eq!(parse_money_str("12.50"), Some(12.5));
        assert_eq!(parse_money_str("-5.00"), Some(-5.0));
        assert_eq!(parse_money_str("n/a"), None);
        assert_eq!(parse_money_str(""), None);
    }

    #[test]
    fn test_items_capped_with_warning() {
        let items: Vec<_> = (0..120)
            .map(|i| json!({"name": format!("item-{}", i), "price": 1.00}))
            .collect();
        let payload = json!({"items": items, "total": 120.00});
        let bill = normalize("{}", Some(&payload)).unwrap();

        assert_eq!(bill.items.len(), 100);
        assert!(bill.warnings.iter().any(|w| w.contains("上限")));
    }
}
