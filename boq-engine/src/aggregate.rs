use std::collections::{BTreeMap, HashMap};

use boq_config::GroupBy;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::measure::Measurement;
use crate::stats::{config_string, median, reduce_bucket};

static STANDALONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\b").expect("valid seat pattern"));
static PREFIXED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:C|CH|S)(\d{1,2})\b").expect("valid seat pattern"));

/// 从可见性状态中解析座位数：先取独立的 1–2 位数字，再取 `C`/`CH`/`S` 前缀数字。
pub fn seat_count_from_visibility(state: &str) -> Option<u32> {
    let upper = state.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }
    STANDALONE_NUMBER
        .captures(&upper)
        .or_else(|| PREFIXED_NUMBER.captures(&upper))
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// 大小写折叠，分组键与区域键都经由此比较。
#[inline]
pub fn fold_case(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Placement,
    Geometry,
}

impl EntityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityClass::Placement => "placement",
            EntityClass::Geometry => "geometry",
        }
    }
}

/// 分组键：类别 + 折叠后的类型名 + 折叠后的区域名或可见性状态。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub class: EntityClass,
    pub type_key: String,
    pub bucket_key: String,
}

impl GroupKey {
    pub fn new(class: EntityClass, type_name: &str, bucket: &str) -> Self {
        Self {
            class,
            type_key: fold_case(type_name),
            bucket_key: fold_case(bucket),
        }
    }
}

/// 一次观测：一个已测量、已解析区域的实体。
#[derive(Debug, Clone)]
pub struct Observation {
    pub class: EntityClass,
    pub type_name: String,
    pub layer: String,
    /// `None` 表示未落入任何区域。
    pub zone: Option<String>,
    pub visibility: Option<String>,
    pub measurement: Measurement,
    /// 非距离类参数的文本值。
    pub parameters: Vec<(String, String)>,
    pub description: Option<String>,
}

impl Observation {
    pub fn new(class: EntityClass, type_name: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            class,
            type_name: type_name.into(),
            layer: layer.into(),
            zone: None,
            visibility: None,
            measurement: Measurement::default(),
            parameters: Vec::new(),
            description: None,
        }
    }

    pub fn in_zone(mut self, zone: Option<&str>) -> Self {
        self.zone = zone.map(str::to_string);
        self
    }

    pub fn with_measurement(mut self, measurement: Measurement) -> Self {
        self.measurement = measurement;
        self
    }

    pub fn with_visibility(mut self, visibility: Option<&str>) -> Self {
        self.visibility = visibility
            .map(str::trim)
            .filter(|state| !state.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = description.map(str::to_string);
        self
    }
}

/// 长度、周长、面积的累加值（求和而非中位数）。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub open_length_ft: f64,
    pub perimeter_ft: f64,
    pub area_ft2: f64,
}

impl Totals {
    fn add(&mut self, measurement: &Measurement) {
        self.open_length_ft += measurement.open_length_ft;
        self.perimeter_ft += measurement.closed_perimeter_ft;
        self.area_ft2 += measurement.closed_area_ft2;
    }
}

/// 某一区域内的计数与累加值；`name` 为首次出现时的写法。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneTally {
    pub name: String,
    pub count: u64,
    pub seats: u64,
    pub totals: Totals,
}

impl ZoneTally {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn absorb(&mut self, measurement: &Measurement, seats: u64) {
        self.count += 1;
        self.seats += seats;
        self.totals.add(measurement);
    }
}

#[derive(Debug, Clone, Default)]
struct SampleLists {
    open_length: Vec<f64>,
    perimeter: Vec<f64>,
    area: Vec<f64>,
    bbox_length: Vec<f64>,
    bbox_width: Vec<f64>,
}

impl SampleLists {
    fn push(&mut self, measurement: &Measurement) {
        push_positive(&mut self.open_length, measurement.open_length_ft);
        push_positive(&mut self.perimeter, measurement.closed_perimeter_ft);
        push_positive(&mut self.area, measurement.closed_area_ft2);
        push_positive(&mut self.bbox_length, measurement.bounding_length_ft);
        push_positive(&mut self.bbox_width, measurement.bounding_width_ft);
    }
}

#[inline]
fn push_positive(samples: &mut Vec<f64>, value: f64) {
    if value.is_finite() && value > 0.0 {
        samples.push(value);
    }
}

/// 归约后的尺寸指标，均为中位数。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReducedMetrics {
    pub open_length_ft: f64,
    pub perimeter_ft: f64,
    pub area_ft2: f64,
    pub bbox_length_ft: f64,
    pub bbox_width_ft: f64,
}

/// 按折叠名累积的样本，显示名取首次出现的拼写。
#[derive(Debug, Clone)]
struct FoldedSamples<T> {
    entries: BTreeMap<String, (String, Vec<T>)>,
}

impl<T> Default for FoldedSamples<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> FoldedSamples<T> {
    fn push(&mut self, name: &str, value: T) {
        self.entries
            .entry(fold_case(name))
            .or_insert_with(|| (name.trim().to_string(), Vec::new()))
            .1
            .push(value);
    }

    fn reduce<R>(&self, reducer: impl Fn(&[T]) -> R) -> BTreeMap<String, R> {
        self.entries
            .values()
            .map(|(name, samples)| (name.clone(), reducer(samples)))
            .collect()
    }
}

/// 累加中的分组。
#[derive(Debug, Clone)]
pub struct AggregateGroup {
    key: GroupKey,
    type_name: String,
    category: String,
    count: u64,
    zones: Vec<ZoneTally>,
    zone_index: HashMap<String, usize>,
    unzoned: ZoneTally,
    samples: SampleLists,
    distances: FoldedSamples<f64>,
    buckets: FoldedSamples<String>,
    visibility: Vec<String>,
    description: Option<String>,
}

impl AggregateGroup {
    fn new(key: GroupKey, observation: &Observation) -> Self {
        Self {
            key,
            type_name: observation.type_name.trim().to_string(),
            category: observation.layer.clone(),
            count: 0,
            zones: Vec::new(),
            zone_index: HashMap::new(),
            unzoned: ZoneTally::default(),
            samples: SampleLists::default(),
            distances: FoldedSamples::default(),
            buckets: FoldedSamples::default(),
            visibility: Vec::new(),
            description: None,
        }
    }

    #[inline]
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    fn absorb(&mut self, observation: Observation) {
        let seats = observation
            .visibility
            .as_deref()
            .and_then(seat_count_from_visibility)
            .map(u64::from)
            .unwrap_or(0);

        self.count += 1;
        let measurement = &observation.measurement;
        match observation.zone.as_deref().map(str::trim).filter(|zone| !zone.is_empty()) {
            Some(zone) => {
                let folded = fold_case(zone);
                let index = match self.zone_index.get(&folded) {
                    Some(index) => *index,
                    None => {
                        self.zones.push(ZoneTally::named(zone));
                        self.zone_index.insert(folded, self.zones.len() - 1);
                        self.zones.len() - 1
                    }
                };
                self.zones[index].absorb(measurement, seats);
            }
            None => self.unzoned.absorb(measurement, seats),
        }

        self.samples.push(measurement);
        for (name, value) in &measurement.distances_ft {
            if value.is_finite() && *value > 0.0 {
                self.distances.push(name, *value);
            }
        }
        for (name, value) in observation.parameters {
            self.buckets.push(&name, value);
        }
        if let Some(state) = observation.visibility {
            self.visibility.push(state);
        }
        if self.description.is_none() {
            self.description = observation
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
        }
    }

    /// 把样本归约为中位数、参数桶归约为代表值，消耗分组。
    pub fn finalize(self) -> FinalizedGroup {
        let metrics = ReducedMetrics {
            open_length_ft: median(&self.samples.open_length),
            perimeter_ft: median(&self.samples.perimeter),
            area_ft2: median(&self.samples.area),
            bbox_length_ft: median(&self.samples.bbox_length),
            bbox_width_ft: median(&self.samples.bbox_width),
        };
        let distances = self.distances.reduce(median);
        let reduced = self.buckets.reduce(reduce_bucket);

        FinalizedGroup {
            class: self.key.class,
            type_name: self.type_name,
            category: self.category,
            visibility: reduce_bucket(&self.visibility),
            description: self.description.unwrap_or_default(),
            count: self.count,
            zones: self.zones,
            unzoned: self.unzoned,
            metrics,
            distances,
            config_string: config_string(&reduced),
        }
    }
}

/// 完成归约的分组，供记录输出使用。
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedGroup {
    pub class: EntityClass,
    pub type_name: String,
    pub category: String,
    pub visibility: String,
    pub description: String,
    pub count: u64,
    /// 按首次出现顺序排列的区域计数。
    pub zones: Vec<ZoneTally>,
    pub unzoned: ZoneTally,
    pub metrics: ReducedMetrics,
    pub distances: BTreeMap<String, f64>,
    pub config_string: String,
}

/// 单次遍历的分组累加器。分组按首次出现顺序保存。
#[derive(Debug, Clone)]
pub struct Aggregator {
    group_by: GroupBy,
    groups: Vec<AggregateGroup>,
    index: HashMap<GroupKey, usize>,
}

impl Aggregator {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[inline]
    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[AggregateGroup] {
        &self.groups
    }

    /// 由观测计算分组键。
    pub fn key_for(&self, observation: &Observation) -> GroupKey {
        let bucket = match self.group_by {
            GroupBy::Zone => observation.zone.as_deref(),
            GroupBy::Visibility => observation.visibility.as_deref(),
        };
        GroupKey::new(
            observation.class,
            &observation.type_name,
            bucket.unwrap_or_default(),
        )
    }

    pub fn observe(&mut self, observation: Observation) {
        let key = self.key_for(&observation);
        let index = match self.index.get(&key) {
            Some(index) => *index,
            None => {
                trace!(
                    class = observation.class.as_str(),
                    type_name = %observation.type_name,
                    "新建分组"
                );
                self.groups
                    .push(AggregateGroup::new(key.clone(), &observation));
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[index].absorb(observation);
    }

    /// 归约全部分组并清空累加器；每个分组只归约一次。
    pub fn finalize(&mut self) -> Vec<FinalizedGroup> {
        self.index.clear();
        std::mem::take(&mut self.groups)
            .into_iter()
            .map(AggregateGroup::finalize)
            .collect()
    }

    /// 丢弃所有累加状态，保留分组方式。
    pub fn reset(&mut self) {
        self.groups.clear();
        self.index.clear();
    }
}
