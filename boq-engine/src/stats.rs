use std::collections::BTreeMap;

/// 中位数：偶数个取中间两值的均值，空集为 0。
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// 把一个参数值桶归约为代表字符串。
///
/// 至少一半的值可解析为数字时取数值中位数；否则取出现次数最多的值，
/// 次数相同按字典序取最小者。
pub fn reduce_bucket(values: &[String]) -> String {
    let trimmed = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    if trimmed.is_empty() {
        return String::new();
    }

    let numeric = trimmed
        .iter()
        .filter_map(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .collect::<Vec<_>>();
    if numeric.len() * 2 >= trimmed.len() {
        return format_decimal(median(&numeric));
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in trimmed.iter().copied() {
        *counts.entry(value).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}

/// 十进制字符串：最多 4 位小数，去掉尾随零，不使用科学计数法；0 与非有限值输出 `0`。
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    let mut text = format!("{value:.4}");
    if text.contains('.') {
        let trimmed_len = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed_len);
    }
    if text == "-0" {
        return "0".to_string();
    }
    text
}

/// `name=value` 按名称排序，以 `"; "` 连接；空值跳过。
pub fn config_string(reduced: &BTreeMap<String, String>) -> String {
    reduced
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
