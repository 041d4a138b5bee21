pub mod aggregate;
pub mod emit;
pub mod measure;
pub mod solver;
pub mod stats;
pub mod units;
pub mod zones;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("drawing has no entity list")]
        MissingEntities,
        #[error("drawing does not declare a linear unit")]
        MissingUnit,
    }
}

pub mod engine {
    use boq_config::EngineConfig;
    use boq_core::document::{Drawing, Entity, Placement};
    use glam::DVec2;
    use tracing::{debug, info, trace};

    use crate::aggregate::{Aggregator, EntityClass, Observation};
    use crate::emit::{OutputRecord, emit_records, is_unassigned_zone};
    use crate::errors::EngineError;
    use crate::measure::{measure_entity, measure_placement};
    use crate::units::UnitScale;
    use crate::zones::{ZoneSet, build_zones, resolve_entity};

    const MISC_TYPE: &str = "misc";

    /// 区域解析与工程量汇总引擎。
    ///
    /// 每次 [`Engine::run`] 都从快照重新计算，不保留上一次的结果。
    #[derive(Debug, Clone, Default)]
    pub struct Engine {
        config: EngineConfig,
    }

    /// 块参照在嵌套展开时从外层继承的上下文。
    struct Inherited<'a> {
        zone: Option<&'a str>,
        layer: Option<&'a str>,
        scale: DVec2,
        depth: usize,
    }

    impl Engine {
        pub fn new(config: EngineConfig) -> Self {
            Self { config }
        }

        #[inline]
        pub fn config(&self) -> &EngineConfig {
            &self.config
        }

        /// 对一份图纸快照执行完整计算，返回排序后的输出记录。
        ///
        /// 只有实体列表或单位完全缺失时才返回错误；其余异常输入都降级为 0 或未分区。
        pub fn run(&self, drawing: &Drawing) -> Result<Vec<OutputRecord>, EngineError> {
            let entities = drawing.entity_list().ok_or(EngineError::MissingEntities)?;
            let unit = drawing.unit().ok_or(EngineError::MissingUnit)?;
            let scale = UnitScale::new(unit);
            debug!(
                entities = entities.len(),
                unit = unit.name(),
                factor = scale.linear(),
                "开始计算"
            );

            let zones = build_zones(drawing, &self.config);
            let mut aggregator = Aggregator::new(self.config.group_by);

            for (id, entity) in drawing.entities() {
                let zone = self.zone_name(&zones, entity);
                match entity {
                    Entity::Placement(placement) => {
                        let inherited = Inherited {
                            zone,
                            layer: None,
                            scale: DVec2::ONE,
                            depth: 0,
                        };
                        self.observe_placement(&mut aggregator, placement, &scale, &inherited);
                    }
                    _ => {
                        let measurement = measure_entity(entity, &scale, &self.config);
                        if measurement.is_empty() {
                            trace!(entity = id.get(), kind = entity.kind_name(), "实体不可测量");
                        }
                        let layer = entity.layer_name().trim();
                        let type_name = if layer.is_empty() { MISC_TYPE } else { layer };
                        aggregator.observe(
                            Observation::new(EntityClass::Geometry, type_name, layer)
                                .in_zone(zone)
                                .with_measurement(measurement),
                        );
                    }
                }
            }

            let groups = aggregator.finalize();
            let records = emit_records(&groups, &self.config);
            info!(
                zones = zones.len(),
                groups = groups.len(),
                records = records.len(),
                "计算完成"
            );
            Ok(records)
        }

        fn zone_name<'z>(&self, zones: &'z ZoneSet, entity: &Entity) -> Option<&'z str> {
            resolve_entity(zones, entity)
                .map(|zone| zone.name())
                .filter(|name| !is_unassigned_zone(name, &self.config.unassigned_zone))
        }

        fn observe_placement(
            &self,
            aggregator: &mut Aggregator,
            placement: &Placement,
            scale: &UnitScale,
            inherited: &Inherited<'_>,
        ) {
            if self.config.is_planner_layer(&placement.layer) {
                trace!(block = placement.type_name(), "规划层块参照只作为区域证据");
                return;
            }
            if placement.block.is_xref() && !self.config.include_xrefs {
                trace!(block = placement.type_name(), "跳过外部参照");
                return;
            }

            let own_layer = placement.layer.trim();
            let layer = match inherited.layer {
                Some(parent) if own_layer.is_empty() || own_layer == "0" => parent,
                _ => own_layer,
            };

            let measurement = measure_placement(placement, scale, &self.config, inherited.scale);
            let mut observation =
                Observation::new(EntityClass::Placement, placement.type_name(), layer)
                    .in_zone(inherited.zone)
                    .with_measurement(measurement)
                    .with_visibility(placement.visibility_state.as_deref())
                    .with_description(
                        placement.attribute_text(self.config.description_tags.as_slice()),
                    );
            for (name, value) in &placement.parameters {
                if self.config.is_distance_parameter(name) {
                    continue;
                }
                let text = value.to_text();
                if !text.is_empty() {
                    observation = observation.with_parameter(name.clone(), text);
                }
            }
            aggregator.observe(observation);

            if inherited.depth >= self.config.nested_depth {
                return;
            }
            let nested = Inherited {
                zone: inherited.zone,
                layer: Some(layer),
                scale: inherited.scale * placement.scale.as_vec2(),
                depth: inherited.depth + 1,
            };
            for child in placement.nested_placements() {
                self.observe_placement(aggregator, child, scale, &nested);
            }
        }
    }

}

pub use engine::Engine;
