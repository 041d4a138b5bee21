use std::collections::HashSet;

use boq_config::EngineConfig;
use boq_core::document::{Drawing, Entity, Label, Placement};
use boq_core::geometry::{BulgeArc, Point2};
use tracing::{debug, trace, warn};

const LOOP_TOLERANCE: f64 = 1e-9;
const RAY_EPSILON: f64 = 1e-12;
/// 闭合边界中每段 bulge 圆弧至少采样的段数。
const MIN_ARC_STEPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    PlacementBounds,
    ClosedLoop,
}

/// 命名的闭合区域多边形，构造后只读。
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePolygon {
    name: String,
    vertices: Vec<Point2>,
    source: ZoneSource,
}

impl ZonePolygon {
    /// 规范化顶点环；不足 3 个不同顶点时返回 None。
    pub fn new(name: impl Into<String>, vertices: &[Point2], source: ZoneSource) -> Option<Self> {
        let vertices = normalize_loop(vertices);
        if vertices.len() < 3 {
            return None;
        }
        Some(Self {
            name: name.into(),
            vertices,
            source,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn vertices(&self) -> &[Point2] {
        &self.vertices
    }

    #[inline]
    pub fn source(&self) -> ZoneSource {
        self.source
    }

    #[inline]
    pub fn contains(&self, point: Point2) -> bool {
        point_in_polygon(point, &self.vertices)
    }

    /// 顶点算术平均值，用于就近匹配文字标签。
    pub fn centroid(&self) -> Point2 {
        let sum = self
            .vertices
            .iter()
            .fold(glam::DVec2::ZERO, |acc, vertex| acc + vertex.as_vec2());
        Point2::from_vec(sum / self.vertices.len() as f64)
    }

    /// 去重签名：名称与逐位顶点坐标。
    fn signature(&self) -> (String, Vec<(u64, u64)>) {
        (
            self.name.clone(),
            self.vertices
                .iter()
                .map(|vertex| (vertex.x().to_bits(), vertex.y().to_bits()))
                .collect(),
        )
    }
}

/// 按构建顺序排列的区域集合；解析时先匹配者胜出。
#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    zones: Vec<ZonePolygon>,
}

impl ZoneSet {
    pub fn new(zones: Vec<ZonePolygon>) -> Self {
        Self { zones }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZonePolygon> {
        self.zones.iter()
    }

    /// 返回第一个包含该点的区域。
    pub fn zone_at(&self, point: Point2) -> Option<&ZonePolygon> {
        self.zones.iter().find(|zone| zone.contains(point))
    }
}

/// 折叠连续重复顶点（容差 1e-9），并去掉与首点重合的收尾顶点。
pub fn normalize_loop(points: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for point in points {
        if !point.x().is_finite() || !point.y().is_finite() {
            continue;
        }
        if out
            .last()
            .is_some_and(|last| last.coincides(*point, LOOP_TOLERANCE))
        {
            continue;
        }
        out.push(*point);
    }
    if out.len() > 2 {
        if let (Some(first), Some(last)) = (out.first(), out.last()) {
            if first.coincides(*last, LOOP_TOLERANCE) {
                out.pop();
            }
        }
    }
    out
}

/// 偶奇射线法判断点是否在多边形内；少于 3 个顶点一律视为不包含。
pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (x, y) = (point.x(), point.y());
    let mut inside = false;
    let mut previous = polygon[polygon.len() - 1];
    for current in polygon {
        let (x1, y1) = (previous.x(), previous.y());
        let (x2, y2) = (current.x(), current.y());
        if (y1 > y) != (y2 > y) && x < (x2 - x1) * (y - y1) / (y2 - y1 + RAY_EPSILON) + x1 {
            inside = !inside;
        }
        previous = *current;
    }
    inside
}

/// 实体的首选代表点：块参照取插入点，直线取中点，圆弧与圆取圆心。
pub fn primary_point(entity: &Entity) -> Option<Point2> {
    match entity {
        Entity::Placement(placement) => Some(placement.insert),
        Entity::Line(line) => Some(line.start.midpoint(line.end)),
        Entity::Arc(arc) => Some(arc.center),
        Entity::Circle(circle) => Some(circle.center),
        Entity::Polyline(_) | Entity::Polyline3d(_) | Entity::Hatch(_) => None,
    }
}

/// 解析实体所属区域：先试首选代表点，再试包围盒中心。
pub fn resolve_entity<'a>(zones: &'a ZoneSet, entity: &Entity) -> Option<&'a ZonePolygon> {
    if zones.is_empty() {
        return None;
    }
    if let Some(zone) = primary_point(entity).and_then(|point| zones.zone_at(point)) {
        return Some(zone);
    }
    entity
        .bounds()
        .and_then(|bounds| zones.zone_at(bounds.center()))
}

/// 从规划层证据构建区域：块参照矩形、闭合边界、文字标签命名，最后按 (名称, 顶点) 去重。
pub fn build_zones(drawing: &Drawing, config: &EngineConfig) -> ZoneSet {
    let mut zones = Vec::new();

    for (id, entity) in drawing.entities() {
        let Entity::Placement(placement) = entity else {
            continue;
        };
        if !config.is_planner_layer(&placement.layer) {
            continue;
        }
        match placement_zone(placement, config) {
            Some(zone) => zones.push(zone),
            None => warn!(entity = id.get(), "规划层块参照没有有效范围，忽略"),
        }
    }

    let loops = collect_loops(drawing, config);
    zones.extend(name_loops(loops, drawing.labels()));

    let before = zones.len();
    let mut seen = HashSet::new();
    zones.retain(|zone| seen.insert(zone.signature()));
    debug!(zones = zones.len(), duplicates = before - zones.len(), "区域构建完成");
    ZoneSet::new(zones)
}

fn placement_zone(placement: &Placement, config: &EngineConfig) -> Option<ZonePolygon> {
    let bounds = placement.world_bounds()?;
    let name = placement
        .attribute_text(config.zone_name_tags.as_slice())
        .map(str::to_string)
        .or_else(|| {
            let type_name = placement.type_name();
            (!type_name.is_empty()).then(|| type_name.to_string())
        })
        .unwrap_or_else(|| "Zone".to_string());
    ZonePolygon::new(name, &bounds.corners(), ZoneSource::PlacementBounds)
}

/// 规划层上的闭合多段线顶点环（bulge 段已加密）。
fn collect_loops(drawing: &Drawing, config: &EngineConfig) -> Vec<Vec<Point2>> {
    let mut loops = Vec::new();
    for (id, entity) in drawing.entities() {
        if !config.is_planner_layer(entity.layer_name()) {
            continue;
        }
        let points = match entity {
            Entity::Polyline(polyline) if polyline.is_closed => {
                let mut points = Vec::with_capacity(polyline.vertices.len());
                for (start, end, bulge) in polyline.segments() {
                    match BulgeArc::from_segment(start.position, end.position, bulge) {
                        Some(arc) => {
                            let samples = arc.sample(MIN_ARC_STEPS);
                            points.extend(&samples[..samples.len().saturating_sub(1)]);
                        }
                        None => points.push(start.position),
                    }
                }
                points
            }
            Entity::Polyline3d(polyline) if polyline.is_closed => {
                polyline.vertices.iter().map(|vertex| vertex.to_plane()).collect()
            }
            _ => continue,
        };
        if normalize_loop(&points).len() < 3 {
            trace!(entity = id.get(), "闭合边界顶点不足，跳过");
            continue;
        }
        loops.push(points);
    }
    loops
}

/// 为闭合边界命名：先找落在环内的未用标签，再找离形心最近的未用标签，否则按序号合成。
fn name_loops(loops: Vec<Vec<Point2>>, labels: &[Label]) -> Vec<ZonePolygon> {
    let mut used = vec![false; labels.len()];
    let mut named = Vec::with_capacity(loops.len());

    for (ordinal, points) in loops.into_iter().enumerate() {
        let Some(unnamed) = ZonePolygon::new("", &points, ZoneSource::ClosedLoop) else {
            continue;
        };
        let available = |index: usize| !used[index] && !labels[index].content.is_empty();

        let mut chosen = (0..labels.len())
            .find(|&index| available(index) && unnamed.contains(labels[index].anchor));

        if chosen.is_none() {
            let centroid = unnamed.centroid();
            let mut best: Option<(f64, usize)> = None;
            for index in (0..labels.len()).filter(|&index| available(index)) {
                let distance = labels[index].anchor.distance_squared(centroid);
                if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                    best = Some((distance, index));
                }
            }
            chosen = best.map(|(_, index)| index);
        }

        let name = match chosen {
            Some(index) => {
                used[index] = true;
                labels[index].content.clone()
            }
            None => format!("Zone {:02}", ordinal + 1),
        };
        named.push(ZonePolygon { name, ..unnamed });
    }
    named
}

#[cfg(test)]
mod tests {
    use super::*;
    use boq_core::document::{LinearUnit, Line, PolylineVertex, TypeDescriptor};

    fn unit_square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    fn room_block(width: f64, height: f64) -> Vec<Entity> {
        vec![Entity::Line(Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(width, height),
            layer: "0".to_string(),
        })]
    }

    #[test]
    fn unit_square_containment() {
        let square = unit_square();
        assert!(point_in_polygon(Point2::new(0.5, 0.5), &square));
        assert!(!point_in_polygon(Point2::new(1.5, 0.5), &square));
        // 边界上的点结果稳定
        let edge = Point2::new(0.0, 0.5);
        let first = point_in_polygon(edge, &square);
        assert_eq!(first, point_in_polygon(edge, &square));
    }

    #[test]
    fn degenerate_polygon_never_matches() {
        let segment = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        assert!(!point_in_polygon(Point2::new(0.5, 0.5), &segment));
        assert!(ZonePolygon::new("Bad", &segment, ZoneSource::ClosedLoop).is_none());
    }

    #[test]
    fn normalize_collapses_duplicates_and_closing_vertex() {
        let raw = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0 + 1e-12),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 0.0),
        ];
        let normalized = normalize_loop(&raw);
        assert_eq!(normalized.len(), 3);
        assert_ne!(normalized.first(), normalized.last());

        // 两点环不删除收尾点
        let pair = [Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)];
        assert_eq!(normalize_loop(&pair).len(), 1);
    }

    #[test]
    fn planner_placements_become_named_rectangles() {
        let mut drawing = Drawing::new(LinearUnit::Feet);
        drawing.add_placement(
            Placement::new(TypeDescriptor::plain("ROOM"), Point2::new(0.0, 0.0), "planner")
                .with_definition(room_block(10.0, 8.0))
                .with_attribute("ROOM", "Conference"),
        );
        drawing.add_placement(
            Placement::new(TypeDescriptor::plain("AREA"), Point2::new(20.0, 0.0), "PLANNER")
                .with_definition(room_block(5.0, 5.0)),
        );
        drawing.add_placement(
            Placement::new(TypeDescriptor::plain("Chair"), Point2::new(1.0, 1.0), "FURN")
                .with_definition(room_block(1.0, 1.0)),
        );

        let zones = build_zones(&drawing, &EngineConfig::default());
        let names = zones.iter().map(ZonePolygon::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Conference", "AREA"]);
        assert!(zones.iter().all(|zone| zone.source() == ZoneSource::PlacementBounds));
        assert_eq!(
            zones.zone_at(Point2::new(4.0, 4.0)).map(ZonePolygon::name),
            Some("Conference")
        );
    }

    #[test]
    fn loops_are_named_from_labels_then_ordinals() {
        let mut drawing = Drawing::new(LinearUnit::Feet);
        drawing.add_polyline(rect(0.0, 0.0, 10.0, 10.0), true, "PLANNER");
        drawing.add_polyline(rect(20.0, 0.0, 30.0, 10.0), true, "PLANNER");
        drawing.add_polyline(rect(40.0, 0.0, 50.0, 10.0), true, "PLANNER");
        drawing.add_polyline(rect(60.0, 0.0, 70.0, 10.0), false, "PLANNER");
        // 落在第一个环内
        drawing.add_label(Point2::new(5.0, 5.0), "Office");
        // 都不在环内，离第二个环形心最近
        drawing.add_label(Point2::new(25.0, 15.0), "Storage\nextra");
        drawing.add_label(Point2::new(100.0, 100.0), "   ");

        let zones = build_zones(&drawing, &EngineConfig::default());
        let names = zones.iter().map(ZonePolygon::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Office", "Storage", "Zone 03"]);
    }

    #[test]
    fn identical_zones_are_deduplicated() {
        let mut drawing = Drawing::new(LinearUnit::Feet);
        drawing.add_polyline(rect(0.0, 0.0, 4.0, 4.0), true, "PLANNER");
        drawing.add_polyline(rect(0.0, 0.0, 4.0, 4.0), true, "PLANNER");
        drawing.add_label(Point2::new(1.0, 1.0), "Kitchen");
        drawing.add_label(Point2::new(2.0, 2.0), "Kitchen");
        let zones = build_zones(&drawing, &EngineConfig::default());
        assert_eq!(zones.len(), 1);
    }

    #[test]
    fn bulged_boundary_is_densified() {
        let mut drawing = Drawing::new(LinearUnit::Feet);
        drawing.add_polyline_with_vertices(
            vec![
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(2.0, 0.0)),
                PolylineVertex::new(Point2::new(2.0, 2.0)),
                PolylineVertex::new(Point2::new(0.0, 2.0)),
            ],
            true,
            "PLANNER",
        );
        let zones = build_zones(&drawing, &EngineConfig::default());
        let zone = zones.iter().next().expect("one zone");
        assert!(zone.vertices().len() > 8);
        // 半圆凸出部分也在区域内
        assert!(zone.contains(Point2::new(1.0, -0.5)));
        assert_eq!(zone.name(), "Zone 01");
    }

    #[test]
    fn resolver_falls_back_to_bounds_center() {
        let zones = ZoneSet::new(vec![
            ZonePolygon::new("Z", &rect(10.0, 10.0, 20.0, 20.0), ZoneSource::ClosedLoop)
                .expect("zone"),
        ]);
        // 插入点在区域外，但包围盒中心在区域内
        let placement = Placement::new(TypeDescriptor::plain("Sofa"), Point2::new(0.0, 0.0), "FURN")
            .with_definition(room_block(30.0, 30.0));
        let entity = Entity::Placement(placement);
        assert!(zones.zone_at(Point2::origin()).is_none());
        assert_eq!(resolve_entity(&zones, &entity).map(ZonePolygon::name), Some("Z"));

        let far = Entity::Line(Line {
            start: Point2::new(100.0, 100.0),
            end: Point2::new(110.0, 100.0),
            layer: "WALL".to_string(),
        });
        assert!(resolve_entity(&zones, &far).is_none());
    }

    #[test]
    fn first_zone_wins_on_overlap() {
        let zones = ZoneSet::new(vec![
            ZonePolygon::new("A", &rect(0.0, 0.0, 10.0, 10.0), ZoneSource::ClosedLoop)
                .expect("zone"),
            ZonePolygon::new("B", &rect(5.0, 5.0, 15.0, 15.0), ZoneSource::ClosedLoop)
                .expect("zone"),
        ]);
        assert_eq!(zones.zone_at(Point2::new(7.0, 7.0)).map(ZonePolygon::name), Some("A"));
        assert_eq!(zones.zone_at(Point2::new(12.0, 12.0)).map(ZonePolygon::name), Some("B"));
    }
}
