use std::collections::BTreeMap;
use std::f64::consts::PI;

use boq_config::EngineConfig;
use boq_core::document::{Entity, Hatch, Placement, Polyline};
use boq_core::geometry::{BulgeArc, Point2};
use glam::DVec2;
use tracing::trace;

use crate::units::UnitScale;

/// 单个实体的测量结果，均已换算为英尺 / 平方英尺。0 表示未知或不适用。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub open_length_ft: f64,
    pub closed_perimeter_ft: f64,
    pub closed_area_ft2: f64,
    pub bounding_length_ft: f64,
    pub bounding_width_ft: f64,
    /// 距离类动态参数（参数名 → 英尺）。
    pub distances_ft: BTreeMap<String, f64>,
}

impl Measurement {
    fn open(length: f64, scale: &UnitScale) -> Self {
        Self {
            open_length_ft: sanitize(scale.to_feet(length)),
            ..Self::default()
        }
    }

    fn closed(perimeter: f64, area: f64, scale: &UnitScale) -> Self {
        Self {
            closed_perimeter_ft: sanitize(scale.to_feet(perimeter)),
            closed_area_ft2: sanitize(scale.to_square_feet(area)),
            ..Self::default()
        }
    }

    /// 所有测量值均为 0。
    pub fn is_empty(&self) -> bool {
        self.open_length_ft == 0.0
            && self.closed_perimeter_ft == 0.0
            && self.closed_area_ft2 == 0.0
            && self.bounding_length_ft == 0.0
            && self.bounding_width_ft == 0.0
            && self.distances_ft.is_empty()
    }
}

/// 非正数或非有限值统一归零。
#[inline]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// 顶点序列的折线长度；`closed` 时包含收尾段。
pub fn path_length(points: &[Point2], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut length = points
        .windows(2)
        .map(|pair| pair[0].distance(pair[1]))
        .sum::<f64>();
    if closed {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            length += last.distance(*first);
        }
    }
    length
}

/// 鞋带公式的有符号面积，逆时针为正。
pub fn signed_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (index, current) in points.iter().enumerate() {
        let next = points[(index + 1) % points.len()];
        twice += current.x() * next.y() - next.x() * current.y();
    }
    twice * 0.5
}

#[inline]
pub fn polygon_area(points: &[Point2]) -> f64 {
    signed_area(points).abs()
}

/// 多段线的路径长度与（闭合时的）面积，bulge 段按精确圆弧计算。
pub fn polyline_metrics(polyline: &Polyline) -> (f64, f64) {
    let mut length = 0.0;
    let mut arc_area = 0.0;
    for (start, end, bulge) in polyline.segments() {
        match BulgeArc::from_segment(start.position, end.position, bulge) {
            Some(arc) => {
                length += arc.length();
                arc_area += arc.segment_area();
            }
            None => length += start.position.distance(end.position),
        }
    }
    if !polyline.is_closed {
        return (length, 0.0);
    }
    let points = polyline
        .vertices
        .iter()
        .map(|vertex| vertex.position)
        .collect::<Vec<_>>();
    let area = (signed_area(&points) + arc_area).abs();
    (length, area)
}

/// 填充面积：外边界之和减去内孤岛之和，不小于 0。
pub fn hatch_area(hatch: &Hatch) -> f64 {
    let mut external = 0.0;
    let mut inner = 0.0;
    for loop_path in &hatch.loops {
        let area = polygon_area(&loop_path.vertices);
        if loop_path.is_external {
            external += area;
        } else {
            inner += area;
        }
    }
    (external - inner).max(0.0)
}

/// 块参照在自身定义空间内的尺寸（已乘 |缩放|，未换算单位），返回 `(长, 宽)`，长 ≥ 宽。
///
/// `inherited` 为外层嵌套块累积的缩放，顶层调用传入 `DVec2::ONE`。
pub fn placement_extent(placement: &Placement, inherited: DVec2) -> Option<(f64, f64)> {
    let local = placement.local_extents()?;
    let scale = (placement.scale.as_vec2() * inherited).abs();
    let along_x = local.width() * scale.x;
    let along_y = local.height() * scale.y;
    Some((along_x.max(along_y), along_x.min(along_y)))
}

/// 测量块参照：范围尺寸与距离类参数。
pub fn measure_placement(
    placement: &Placement,
    scale: &UnitScale,
    config: &EngineConfig,
    inherited: DVec2,
) -> Measurement {
    let mut measurement = Measurement::default();
    if let Some((length, width)) = placement_extent(placement, inherited) {
        measurement.bounding_length_ft = sanitize(scale.to_feet(length));
        measurement.bounding_width_ft = sanitize(scale.to_feet(width));
    } else {
        trace!(block = placement.type_name(), "块定义没有可测量的子几何");
    }

    for (name, value) in &placement.parameters {
        if !config.is_distance_parameter(name) {
            continue;
        }
        let Some(raw) = value.as_number() else {
            continue;
        };
        let feet = sanitize(scale.to_feet(raw.abs()));
        if feet > 0.0 {
            measurement.distances_ft.insert(name.clone(), feet);
        }
    }
    measurement
}

/// 按实体类型计算测量值。
pub fn measure_entity(entity: &Entity, scale: &UnitScale, config: &EngineConfig) -> Measurement {
    match entity {
        Entity::Line(line) => Measurement::open(line.start.distance(line.end), scale),
        Entity::Arc(arc) => Measurement::open((arc.radius * arc.sweep()).abs(), scale),
        Entity::Circle(circle) => {
            let radius = circle.radius.abs();
            Measurement::closed(2.0 * PI * radius, PI * radius * radius, scale)
        }
        Entity::Polyline(polyline) => {
            let (length, area) = polyline_metrics(polyline);
            if polyline.is_closed {
                Measurement::closed(length, area, scale)
            } else {
                Measurement::open(length, scale)
            }
        }
        Entity::Polyline3d(polyline) => {
            let points = polyline
                .vertices
                .iter()
                .map(|vertex| vertex.to_plane())
                .collect::<Vec<_>>();
            if polyline.is_closed {
                Measurement::closed(
                    path_length(&points, true),
                    polygon_area(&points),
                    scale,
                )
            } else {
                Measurement::open(path_length(&points, false), scale)
            }
        }
        Entity::Hatch(hatch) => Measurement {
            closed_area_ft2: sanitize(scale.to_square_feet(hatch_area(hatch))),
            ..Measurement::default()
        },
        Entity::Placement(placement) => measure_placement(placement, scale, config, DVec2::ONE),
    }
}
