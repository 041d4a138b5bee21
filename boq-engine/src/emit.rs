use std::cmp::Ordering;
use std::collections::BTreeMap;

use boq_config::EngineConfig;
use serde::{Serialize, Serializer};

use crate::aggregate::{EntityClass, FinalizedGroup, ZoneTally, fold_case};
use crate::solver::solve_rectangle;
use crate::stats::format_decimal;

/// 输出记录。数值字段序列化为十进制字符串（见 [`format_decimal`]）。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub entity_type: EntityClass,
    pub type_name: String,
    pub zone_name: String,
    pub category: String,
    pub visibility: String,
    pub quantity: u64,
    #[serde(serialize_with = "decimal")]
    pub length_ft: f64,
    #[serde(serialize_with = "decimal")]
    pub width_ft: f64,
    #[serde(serialize_with = "decimal")]
    pub perimeter_ft: f64,
    #[serde(serialize_with = "decimal")]
    pub area_ft2: f64,
    #[serde(serialize_with = "decimal")]
    pub total_length_ft: f64,
    #[serde(serialize_with = "decimal")]
    pub total_perimeter_ft: f64,
    #[serde(serialize_with = "decimal")]
    pub total_area_ft2: f64,
    pub seat_count: u64,
    pub config_string: String,
    pub description: String,
    #[serde(serialize_with = "decimal_map")]
    pub distances: BTreeMap<String, f64>,
    pub image_ref: String,
    /// 图层主色（十六进制），由渲染端回填。
    pub color_ref: String,
    pub remarks: String,
}

fn decimal<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_decimal(*value))
}

fn decimal_map<S: Serializer>(
    values: &BTreeMap<String, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        values
            .iter()
            .map(|(name, value)| (name, format_decimal(*value))),
    )
}

/// 空字符串与未分区哨兵名（不区分大小写）视为同一个"未分区"。
pub fn is_unassigned_zone(zone: &str, sentinel: &str) -> bool {
    let trimmed = zone.trim();
    trimmed.is_empty() || fold_case(trimmed) == fold_case(sentinel)
}

/// 记录的长宽：包围盒中位数优先；否则由周长与面积反解矩形；再否则取开放长度、宽为 0。
fn dimensions(group: &FinalizedGroup) -> (f64, f64) {
    let metrics = &group.metrics;
    if metrics.bbox_length_ft > 0.0 || metrics.bbox_width_ft > 0.0 {
        return (metrics.bbox_length_ft, metrics.bbox_width_ft);
    }
    if metrics.perimeter_ft > 0.0 && metrics.area_ft2 > 0.0 {
        return solve_rectangle(metrics.perimeter_ft, metrics.area_ft2);
    }
    (metrics.open_length_ft, 0.0)
}

fn record(group: &FinalizedGroup, zone_name: &str, tally: &ZoneTally) -> OutputRecord {
    let (length_ft, width_ft) = dimensions(group);
    OutputRecord {
        entity_type: group.class,
        type_name: group.type_name.clone(),
        zone_name: zone_name.to_string(),
        category: group.category.clone(),
        visibility: group.visibility.clone(),
        quantity: tally.count,
        length_ft,
        width_ft,
        perimeter_ft: group.metrics.perimeter_ft,
        area_ft2: group.metrics.area_ft2,
        total_length_ft: tally.totals.open_length_ft,
        total_perimeter_ft: tally.totals.perimeter_ft,
        total_area_ft2: tally.totals.area_ft2,
        seat_count: tally.seats,
        config_string: group.config_string.clone(),
        description: group.description.clone(),
        distances: group.distances.clone(),
        image_ref: String::new(),
        color_ref: String::new(),
        remarks: String::new(),
    }
}

/// 每个分组按观测到的区域各输出一条记录；未分区的部分合并为一条哨兵区域记录。
/// 结果按 (类型名, 区域名) 不区分大小写升序排列。
pub fn emit_records(groups: &[FinalizedGroup], config: &EngineConfig) -> Vec<OutputRecord> {
    let sentinel = config.unassigned_zone.as_str();
    let mut records = Vec::new();

    for group in groups {
        let mut unassigned = group.unzoned.clone();
        for tally in &group.zones {
            if is_unassigned_zone(&tally.name, sentinel) {
                unassigned.count += tally.count;
                unassigned.seats += tally.seats;
                unassigned.totals.open_length_ft += tally.totals.open_length_ft;
                unassigned.totals.perimeter_ft += tally.totals.perimeter_ft;
                unassigned.totals.area_ft2 += tally.totals.area_ft2;
                continue;
            }
            records.push(record(group, &tally.name, tally));
        }
        if unassigned.count > 0 {
            records.push(record(group, sentinel, &unassigned));
        }
    }

    records.sort_by(compare_records);
    records
}

fn compare_records(left: &OutputRecord, right: &OutputRecord) -> Ordering {
    fold_case(&left.type_name)
        .cmp(&fold_case(&right.type_name))
        .then_with(|| fold_case(&left.zone_name).cmp(&fold_case(&right.zone_name)))
        .then_with(|| left.entity_type.cmp(&right.entity_type))
        .then_with(|| left.type_name.cmp(&right.type_name))
        .then_with(|| left.zone_name.cmp(&right.zone_name))
        .then_with(|| left.visibility.cmp(&right.visibility))
}
