pub mod geometry {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，所有平面计算均使用双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn origin() -> Self {
            Self(DVec2::ZERO)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn distance_squared(self, other: Point2) -> f64 {
            self.0.distance_squared(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        /// 两点在容差内重合（逐分量比较）。
        #[inline]
        pub fn coincides(self, other: Point2, tolerance: f64) -> bool {
            (self.x() - other.x()).abs() <= tolerance && (self.y() - other.y()).abs() <= tolerance
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 二维向量，块参照的缩放因子也以此表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn one() -> Self {
            Self(DVec2::ONE)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 三维点，供 3D 多段线顶点使用；平面计算只取 XY 分量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        /// 投影到绘图平面。
        #[inline]
        pub fn to_plane(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }
    }

    /// 轴对齐边界框，用于估算实体范围与区域矩形。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        pub fn include_point(&mut self, point: Point2) {
            if !point.x().is_finite() || !point.y().is_finite() {
                return;
            }
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 逆时针顺序的四个角点，从最小角开始。
        pub fn corners(&self) -> [Point2; 4] {
            [
                self.min,
                Point2::new(self.max.x(), self.min.y()),
                self.max,
                Point2::new(self.min.x(), self.max.y()),
            ]
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 由 bulge 值描述的圆弧段。`sweep` 带符号，正值为逆时针。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct BulgeArc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub sweep: f64,
    }

    impl BulgeArc {
        /// 由弦端点与 bulge（圆心角四分之一的正切）重建圆弧；直线段或退化弦返回 None。
        pub fn from_segment(start: Point2, end: Point2, bulge: f64) -> Option<Self> {
            if !bulge.is_finite() || bulge.abs() <= 1e-9 {
                return None;
            }
            let chord = end.as_vec2() - start.as_vec2();
            let chord_len = chord.length();
            if chord_len <= f64::EPSILON {
                return None;
            }
            let sweep = 4.0 * bulge.atan();
            let half = sweep / 2.0;
            let sin_half = half.sin();
            if sin_half.abs() <= 1e-12 {
                return None;
            }
            let radius = (chord_len / (2.0 * sin_half)).abs();
            let left = DVec2::new(-chord.y, chord.x) / chord_len;
            let offset = (chord_len / 2.0) / half.tan();
            let center = start.midpoint(end).as_vec2() + left * offset;
            let start_dir = start.as_vec2() - center;
            Some(Self {
                center: Point2::from_vec(center),
                radius,
                start_angle: start_dir.y.atan2(start_dir.x),
                sweep,
            })
        }

        #[inline]
        pub fn length(&self) -> f64 {
            (self.radius * self.sweep).abs()
        }

        /// 弓形面积，符号与 `sweep` 相同，可直接叠加到鞋带公式的有符号面积上。
        pub fn segment_area(&self) -> f64 {
            let theta = self.sweep.abs();
            let area = 0.5 * self.radius * self.radius * (theta - theta.sin());
            area.copysign(self.sweep)
        }

        #[inline]
        pub fn point_at(&self, t: f64) -> Point2 {
            arc_point(self.center, self.radius, self.start_angle + self.sweep * t)
        }

        /// 按角度步长采样，至少 `min_steps` 段；返回值包含起点与终点。
        pub fn sample(&self, min_steps: usize) -> Vec<Point2> {
            let steps = ((self.sweep.abs() / (TAU / 64.0)).ceil() as usize).max(min_steps.max(1));
            (0..=steps)
                .map(|i| self.point_at(i as f64 / steps as f64))
                .collect()
        }

        pub fn include_bounds(&self, bounds: &mut Bounds2D) {
            let (start, end) = if self.sweep >= 0.0 {
                (self.start_angle, self.start_angle + self.sweep)
            } else {
                (self.start_angle + self.sweep, self.start_angle)
            };
            include_arc_bounds(self.center, self.radius, start, end, bounds);
        }
    }

    pub fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    pub fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
        let offset = Vector2::new(radius * angle.cos(), radius * angle.sin());
        center.translate(offset)
    }

    /// 逆时针从 `start` 扫到 `end` 的圆弧范围，包含经过的象限极值点。
    pub fn include_arc_bounds(
        center: Point2,
        radius: f64,
        start: f64,
        end: f64,
        bounds: &mut Bounds2D,
    ) {
        let radius = radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(center);
            return;
        }

        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        bounds.include_point(arc_point(center, radius, start));
        bounds.include_point(arc_point(center, radius, end));

        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include_point(arc_point(center, radius, candidate));
            }
        }
    }

}

pub mod document {
    use std::collections::BTreeMap;
    use std::f64::consts::TAU;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    use crate::geometry::{BulgeArc, Bounds2D, Point2, Point3, Vector2, include_arc_bounds};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 图纸声明的线性单位，对应 DXF `$INSUNITS`。
    ///
    /// 反序列化时既接受单位名称（如 `"feet"`、`"mm"`），也接受 `$INSUNITS` 整数编码；
    /// 无法识别的值一律视为 [`LinearUnit::Unitless`]。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "UnitRepr", into = "String")]
    pub enum LinearUnit {
        Unitless,
        Inches,
        Feet,
        Miles,
        Millimeters,
        Centimeters,
        Meters,
        Kilometers,
        Yards,
    }

    impl LinearUnit {
        pub fn from_insunits(code: i64) -> Self {
            match code {
                1 => LinearUnit::Inches,
                2 => LinearUnit::Feet,
                3 => LinearUnit::Miles,
                4 => LinearUnit::Millimeters,
                5 => LinearUnit::Centimeters,
                6 => LinearUnit::Meters,
                7 => LinearUnit::Kilometers,
                10 => LinearUnit::Yards,
                _ => LinearUnit::Unitless,
            }
        }

        pub fn parse(raw: &str) -> Self {
            let lowered = raw.trim().to_ascii_lowercase();
            if let Ok(code) = lowered.parse::<i64>() {
                return Self::from_insunits(code);
            }
            match lowered.as_str() {
                "in" | "inch" | "inches" => LinearUnit::Inches,
                "ft" | "foot" | "feet" => LinearUnit::Feet,
                "mi" | "mile" | "miles" => LinearUnit::Miles,
                "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => {
                    LinearUnit::Millimeters
                }
                "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => {
                    LinearUnit::Centimeters
                }
                "m" | "meter" | "meters" | "metre" | "metres" => LinearUnit::Meters,
                "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                    LinearUnit::Kilometers
                }
                "yd" | "yard" | "yards" => LinearUnit::Yards,
                _ => LinearUnit::Unitless,
            }
        }

        pub fn name(self) -> &'static str {
            match self {
                LinearUnit::Unitless => "unitless",
                LinearUnit::Inches => "inches",
                LinearUnit::Feet => "feet",
                LinearUnit::Miles => "miles",
                LinearUnit::Millimeters => "millimeters",
                LinearUnit::Centimeters => "centimeters",
                LinearUnit::Meters => "meters",
                LinearUnit::Kilometers => "kilometers",
                LinearUnit::Yards => "yards",
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UnitRepr {
        Code(i64),
        Name(String),
    }

    impl From<UnitRepr> for LinearUnit {
        fn from(value: UnitRepr) -> Self {
            match value {
                UnitRepr::Code(code) => LinearUnit::from_insunits(code),
                UnitRepr::Name(name) => LinearUnit::parse(&name),
            }
        }
    }

    impl From<LinearUnit> for String {
        fn from(value: LinearUnit) -> Self {
            value.name().to_string()
        }
    }

    /// 块类型描述：原始块名与宿主解析后的规范名（动态块匿名名 → 基础块名）。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TypeDescriptor {
        pub raw_name: String,
        #[serde(default)]
        pub canonical_name: String,
    }

    impl TypeDescriptor {
        pub fn new(raw_name: impl Into<String>, canonical_name: impl Into<String>) -> Self {
            Self {
                raw_name: raw_name.into(),
                canonical_name: canonical_name.into(),
            }
        }

        /// 非动态块：原始名即规范名。
        pub fn plain(name: impl Into<String>) -> Self {
            let name = name.into();
            Self {
                canonical_name: name.clone(),
                raw_name: name,
            }
        }

        /// 规范名优先，缺失时回退原始名。
        pub fn name(&self) -> &str {
            let canonical = self.canonical_name.trim();
            if canonical.is_empty() {
                self.raw_name.trim()
            } else {
                canonical
            }
        }

        /// 外部参照块名形如 `xref|block`。
        pub fn is_xref(&self) -> bool {
            self.name().contains('|')
        }
    }

    /// 动态块参数值：数值或字符串。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum ParamValue {
        Number(f64),
        Text(String),
    }

    impl ParamValue {
        /// 数值参数直接返回；字符串参数尝试按十进制解析。
        pub fn as_number(&self) -> Option<f64> {
            match self {
                ParamValue::Number(value) => value.is_finite().then_some(*value),
                ParamValue::Text(text) => text
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite()),
            }
        }

        /// 参数的文本形式，空字符串表示无值。
        pub fn to_text(&self) -> String {
            match self {
                ParamValue::Number(value) if value.is_finite() => value.to_string(),
                ParamValue::Number(_) => String::new(),
                ParamValue::Text(text) => text.trim().to_string(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Attribute {
        pub tag: String,
        pub text: String,
    }

    impl Attribute {
        pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
            Self {
                tag: tag.into(),
                text: text.into(),
            }
        }
    }

    /// 文字标签：仅用于给闭合区域命名。快照中的文字在反序列化时同样经过 [`Label::from_text`]。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(from = "RawLabel")]
    pub struct Label {
        pub anchor: Point2,
        pub content: String,
    }

    #[derive(Deserialize)]
    struct RawLabel {
        anchor: Point2,
        content: String,
    }

    impl From<RawLabel> for Label {
        fn from(raw: RawLabel) -> Self {
            Label::from_text(raw.anchor, &raw.content)
        }
    }

    impl Label {
        /// 多行文字只取首行并去掉首尾空白，与 MText 标签的处理一致。
        pub fn from_text(anchor: Point2, raw: &str) -> Self {
            let first_line = raw.trim().lines().next().unwrap_or_default().trim();
            Self {
                anchor,
                content: first_line.to_string(),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum Entity {
        Line(Line),
        Arc(Arc),
        Circle(Circle),
        Polyline(Polyline),
        Polyline3d(Polyline3d),
        Hatch(Hatch),
        Placement(Placement),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Polyline3d(polyline) => &polyline.layer,
                Entity::Hatch(hatch) => &hatch.layer,
                Entity::Placement(placement) => &placement.layer,
            }
        }

        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "line",
                Entity::Arc(_) => "arc",
                Entity::Circle(_) => "circle",
                Entity::Polyline(_) => "polyline",
                Entity::Polyline3d(_) => "polyline3d",
                Entity::Hatch(_) => "hatch",
                Entity::Placement(_) => "placement",
            }
        }

        #[inline]
        pub fn as_placement(&self) -> Option<&Placement> {
            match self {
                Entity::Placement(placement) => Some(placement),
                _ => None,
            }
        }

        /// 计算实体的 2D 轴对齐范围；块参照按插入变换后的定义范围计算。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Entity::Arc(arc) => {
                    include_arc_bounds(
                        arc.center,
                        arc.radius,
                        arc.start_angle,
                        arc.end_angle,
                        &mut bounds,
                    );
                }
                Entity::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Entity::Polyline(polyline) => {
                    for (start, end, bulge) in polyline.segments() {
                        bounds.include_point(start.position);
                        bounds.include_point(end.position);
                        if let Some(arc) = BulgeArc::from_segment(start.position, end.position, bulge)
                        {
                            arc.include_bounds(&mut bounds);
                        }
                    }
                    if let Some(first) = polyline.vertices.first() {
                        bounds.include_point(first.position);
                    }
                }
                Entity::Polyline3d(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.to_plane());
                    }
                }
                Entity::Hatch(hatch) => {
                    for loop_path in &hatch.loops {
                        for vertex in &loop_path.vertices {
                            bounds.include_point(*vertex);
                        }
                    }
                }
                Entity::Placement(placement) => {
                    if let Some(world) = placement.world_bounds() {
                        bounds.include_bounds(&world);
                    } else {
                        bounds.include_point(placement.insert);
                    }
                }
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    impl Arc {
        /// 逆时针扫角，规整到 `[0, 2π)`；起止角相同视为零扫角。
        pub fn sweep(&self) -> f64 {
            normalize_sweep(self.end_angle - self.start_angle)
        }
    }

    fn normalize_sweep(delta: f64) -> f64 {
        let result = delta % TAU;
        if result < 0.0 { result + TAU } else { result }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        #[serde(default)]
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        #[serde(default)]
        pub is_closed: bool,
        pub layer: String,
    }

    impl Polyline {
        /// 按绘制顺序枚举线段 `(起点, 终点, 起点 bulge)`；闭合多段线包含收尾段。
        pub fn segments(&self) -> impl Iterator<Item = (&PolylineVertex, &PolylineVertex, f64)> {
            let count = self.vertices.len();
            let segment_count = match count {
                0 | 1 => 0,
                _ if self.is_closed => count,
                _ => count - 1,
            };
            (0..segment_count).map(move |index| {
                let start = &self.vertices[index];
                let end = &self.vertices[(index + 1) % count];
                (start, end, start.bulge)
            })
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline3d {
        pub vertices: Vec<Point3>,
        #[serde(default)]
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HatchLoop {
        pub vertices: Vec<Point2>,
        /// 外边界为 true，内部孤岛为 false。
        #[serde(default = "default_true")]
        pub is_external: bool,
    }

    fn default_true() -> bool {
        true
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Hatch {
        pub loops: Vec<HatchLoop>,
        pub layer: String,
    }

    /// 块参照（放置实例）。`definition` 为块定义内的子实体，坐标位于块的局部空间。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Placement {
        pub block: TypeDescriptor,
        pub insert: Point2,
        #[serde(default = "Vector2::one")]
        pub scale: Vector2,
        #[serde(default)]
        pub rotation: f64,
        #[serde(default = "Point2::origin")]
        pub base_point: Point2,
        #[serde(default)]
        pub definition: Vec<Entity>,
        #[serde(default)]
        pub attributes: Vec<Attribute>,
        #[serde(default)]
        pub parameters: BTreeMap<String, ParamValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub visibility_state: Option<String>,
        pub layer: String,
    }

    impl Placement {
        pub fn new(block: TypeDescriptor, insert: Point2, layer: impl Into<String>) -> Self {
            Self {
                block,
                insert,
                scale: Vector2::one(),
                rotation: 0.0,
                base_point: Point2::origin(),
                definition: Vec::new(),
                attributes: Vec::new(),
                parameters: BTreeMap::new(),
                visibility_state: None,
                layer: layer.into(),
            }
        }

        pub fn with_scale(mut self, scale: Vector2) -> Self {
            self.scale = scale;
            self
        }

        pub fn with_rotation(mut self, rotation: f64) -> Self {
            self.rotation = rotation;
            self
        }

        pub fn with_definition(mut self, definition: Vec<Entity>) -> Self {
            self.definition = definition;
            self
        }

        pub fn with_attribute(mut self, tag: impl Into<String>, text: impl Into<String>) -> Self {
            self.attributes.push(Attribute::new(tag, text));
            self
        }

        pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
            self.parameters.insert(name.into(), value);
            self
        }

        pub fn with_visibility(mut self, state: impl Into<String>) -> Self {
            self.visibility_state = Some(state.into());
            self
        }

        #[inline]
        pub fn type_name(&self) -> &str {
            self.block.name()
        }

        /// 按候选标签的优先顺序查找第一个非空属性值，标签比较不区分大小写。
        pub fn attribute_text<'a, S: AsRef<str>>(&'a self, candidates: &[S]) -> Option<&'a str> {
            candidates.iter().find_map(|candidate| {
                self.attributes.iter().find_map(|attribute| {
                    let text = attribute.text.trim();
                    (attribute.tag.trim().eq_ignore_ascii_case(candidate.as_ref())
                        && !text.is_empty())
                    .then_some(text)
                })
            })
        }

        /// 块定义内子几何在局部空间中的范围并集（未应用缩放与旋转）。
        pub fn local_extents(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for child in &self.definition {
                if let Some(child_bounds) = child.bounds() {
                    bounds.include_bounds(&child_bounds);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        /// 局部坐标 → 世界坐标：先减基点，再缩放、旋转，最后平移到插入点。
        pub fn to_world(&self, local: Point2) -> Point2 {
            let relative = local.as_vec2() - self.base_point.as_vec2();
            let scaled = relative * self.scale.as_vec2();
            let rotated = DVec2::from_angle(self.rotation).rotate(scaled);
            Point2::from_vec(self.insert.as_vec2() + rotated)
        }

        /// 世界坐标下的轴对齐范围：局部范围四角经插入变换后的包围盒。
        pub fn world_bounds(&self) -> Option<Bounds2D> {
            let local = self.local_extents()?;
            let mut bounds = Bounds2D::empty();
            for corner in local.corners() {
                bounds.include_point(self.to_world(corner));
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        /// 定义内直接嵌套的块参照。
        pub fn nested_placements(&self) -> impl Iterator<Item = &Placement> {
            self.definition.iter().filter_map(Entity::as_placement)
        }
    }

    /// 一次计算所需的输入快照：实体列表、声明单位与文字标签。
    ///
    /// `unit` 与 `entities` 为 `None` 表示宿主未提供，引擎会显式报错；
    /// 空列表则是合法输入。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Drawing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<LinearUnit>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entities: Option<Vec<Entity>>,
        #[serde(default)]
        labels: Vec<Label>,
    }

    impl Drawing {
        pub fn new(unit: LinearUnit) -> Self {
            Self {
                unit: Some(unit),
                entities: Some(Vec::new()),
                labels: Vec::new(),
            }
        }

        #[inline]
        pub fn unit(&self) -> Option<LinearUnit> {
            self.unit
        }

        #[inline]
        pub fn set_unit(&mut self, unit: LinearUnit) {
            self.unit = Some(unit);
        }

        #[inline]
        pub fn entity_list(&self) -> Option<&[Entity]> {
            self.entities.as_deref()
        }

        /// 按宿主枚举顺序返回实体及其序号 ID。
        pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
            self.entities
                .iter()
                .flatten()
                .enumerate()
                .map(|(index, entity)| (EntityId::new(index as u64), entity))
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities.as_ref()?.get(id.get() as usize)
        }

        #[inline]
        pub fn labels(&self) -> &[Label] {
            &self.labels
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let entities = self.entities.get_or_insert_with(Vec::new);
            let id = EntityId::new(entities.len() as u64);
            entities.push(entity);
            id
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> EntityId {
            self.add_entity(Entity::Line(Line {
                start,
                end,
                layer: layer.into(),
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer: layer.into(),
            }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer: layer.into(),
            }))
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            self.add_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_polyline3d<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point3>,
        {
            self.add_entity(Entity::Polyline3d(Polyline3d {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_hatch(&mut self, loops: Vec<HatchLoop>, layer: impl Into<String>) -> EntityId {
            self.add_entity(Entity::Hatch(Hatch {
                loops,
                layer: layer.into(),
            }))
        }

        pub fn add_placement(&mut self, placement: Placement) -> EntityId {
            self.add_entity(Entity::Placement(placement))
        }

        pub fn add_label(&mut self, anchor: Point2, content: &str) {
            self.labels.push(Label::from_text(anchor, content));
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in self.entities() {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::{FRAC_PI_2, PI};

        fn unit_square_block() -> Vec<Entity> {
            vec![Entity::Polyline(Polyline {
                vertices: vec![
                    PolylineVertex::new(Point2::new(0.0, 0.0)),
                    PolylineVertex::new(Point2::new(4.0, 0.0)),
                    PolylineVertex::new(Point2::new(4.0, 2.0)),
                    PolylineVertex::new(Point2::new(0.0, 2.0)),
                ],
                is_closed: true,
                layer: "0".to_string(),
            })]
        }

        #[test]
        fn drawing_stores_entities_in_order() {
            let mut drawing = Drawing::new(LinearUnit::Feet);
            let line = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "WALL");
            let arc = drawing.add_arc(Point2::new(5.0, 0.0), 3.5, 0.0, FRAC_PI_2, "DOOR");
            let circle = drawing.add_circle(Point2::new(5.0, 5.0), 2.0, "COLUMN");
            drawing.add_label(Point2::new(1.0, 1.0), "  Lobby \nsecond line");

            assert_eq!(line.get(), 0);
            assert_eq!(arc.get(), 1);
            assert_eq!(circle.get(), 2);
            assert_eq!(drawing.entities().count(), 3);
            assert_eq!(drawing.labels()[0].content, "Lobby");

            match drawing.entity(arc) {
                Some(Entity::Arc(arc)) => {
                    assert_eq!(arc.layer, "DOOR");
                    assert!((arc.sweep() - FRAC_PI_2).abs() < 1e-12);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }

            let bounds = drawing.bounds().expect("drawing bounds should exist");
            assert!((bounds.min().x() - 0.0).abs() < 1e-9);
            assert!((bounds.max().x() - 10.0).abs() < 1e-9);
            assert!((bounds.max().y() - 7.0).abs() < 1e-9);
        }

        #[test]
        fn arc_sweep_wraps_negative_interval() {
            let arc = Arc {
                center: Point2::origin(),
                radius: 1.0,
                start_angle: 3.0 * FRAC_PI_2,
                end_angle: FRAC_PI_2,
                layer: String::new(),
            };
            assert!((arc.sweep() - PI).abs() < 1e-12);
        }

        #[test]
        fn placement_world_bounds_apply_scale_and_rotation() {
            let placement = Placement::new(
                TypeDescriptor::plain("Desk"),
                Point2::new(10.0, 10.0),
                "FURN",
            )
            .with_definition(unit_square_block())
            .with_scale(Vector2::new(2.0, 1.0))
            .with_rotation(FRAC_PI_2);

            let local = placement.local_extents().expect("local extents");
            assert!((local.width() - 4.0).abs() < 1e-12);
            assert!((local.height() - 2.0).abs() < 1e-12);

            let world = placement.world_bounds().expect("world bounds");
            assert!((world.width() - 2.0).abs() < 1e-9);
            assert!((world.height() - 8.0).abs() < 1e-9);
            assert!((world.min().x() - 8.0).abs() < 1e-9);
            assert!((world.min().y() - 10.0).abs() < 1e-9);
        }

        #[test]
        fn attribute_lookup_follows_candidate_priority() {
            let placement = Placement::new(TypeDescriptor::plain("ROOM-TAG"), Point2::origin(), "PLANNER")
                .with_attribute("title", "Ignored title")
                .with_attribute("NAME", "  ")
                .with_attribute("Room", "Pantry");
            assert_eq!(
                placement.attribute_text(&["NAME", "ROOM", "TITLE"]),
                Some("Pantry")
            );
            assert_eq!(placement.attribute_text(&["ZONE"]), None);
        }

        #[test]
        fn type_descriptor_prefers_canonical_name() {
            let dynamic = TypeDescriptor::new("*U12", "Table-Round");
            assert_eq!(dynamic.name(), "Table-Round");
            let anonymous = TypeDescriptor::new("*U13", "");
            assert_eq!(anonymous.name(), "*U13");
            assert!(TypeDescriptor::plain("SITE|Tree").is_xref());
        }

        #[test]
        fn parameter_values_parse_numbers_leniently() {
            assert_eq!(ParamValue::Number(2.5).as_number(), Some(2.5));
            assert_eq!(ParamValue::Text(" 12 ".to_string()).as_number(), Some(12.0));
            assert_eq!(ParamValue::Text("8 CHAIRS".to_string()).as_number(), None);
            assert_eq!(ParamValue::Number(f64::NAN).to_text(), "");
        }

        #[test]
        fn unit_accepts_names_and_insunits_codes() {
            assert_eq!(LinearUnit::from_insunits(4), LinearUnit::Millimeters);
            assert_eq!(LinearUnit::from_insunits(99), LinearUnit::Unitless);
            assert_eq!(LinearUnit::parse("Metres"), LinearUnit::Meters);
            assert_eq!(LinearUnit::parse("furlong"), LinearUnit::Unitless);

            let from_code: LinearUnit = serde_json::from_str("2").expect("code");
            assert_eq!(from_code, LinearUnit::Feet);
            let from_name: LinearUnit = serde_json::from_str("\"yd\"").expect("name");
            assert_eq!(from_name, LinearUnit::Yards);
            assert_eq!(
                serde_json::to_string(&LinearUnit::Kilometers).expect("encode"),
                "\"kilometers\""
            );
        }

        #[test]
        fn drawing_snapshot_deserializes_tagged_entities() {
            let json = r#"{
                "unit": "mm",
                "entities": [
                    {"kind": "line", "start": [0, 0], "end": [3, 4], "layer": "WALL"},
                    {"kind": "placement", "block": {"raw_name": "*U7", "canonical_name": "Chair"},
                     "insert": [1, 2], "layer": "FURN",
                     "parameters": {"distance1": 450, "Visibility1": "ARMLESS"}}
                ],
                "labels": [{"anchor": [5, 5], "content": "Office"}]
            }"#;
            let drawing: Drawing = serde_json::from_str(json).expect("decode drawing");
            assert_eq!(drawing.unit(), Some(LinearUnit::Millimeters));
            assert_eq!(drawing.entities().count(), 2);
            let placement = drawing
                .entities()
                .find_map(|(_, entity)| entity.as_placement())
                .expect("placement");
            assert_eq!(placement.type_name(), "Chair");
            assert_eq!(placement.scale, Vector2::one());
            assert_eq!(
                placement.parameters.get("distance1"),
                Some(&ParamValue::Number(450.0))
            );

            let missing: Drawing = serde_json::from_str("{}").expect("decode empty");
            assert!(missing.unit().is_none());
            assert!(missing.entity_list().is_none());
        }
    }
}
