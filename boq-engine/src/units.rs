use boq_core::document::LinearUnit;

/// 线性单位 → 英尺的换算系数；无单位图纸按 1.0 处理。
pub fn feet_per_unit(unit: LinearUnit) -> f64 {
    match unit {
        LinearUnit::Feet => 1.0,
        LinearUnit::Inches => 1.0 / 12.0,
        LinearUnit::Millimeters => 1.0 / 304.8,
        LinearUnit::Centimeters => 1.0 / 30.48,
        LinearUnit::Meters => 1.0 / 0.3048,
        LinearUnit::Kilometers => 1000.0 / 0.3048,
        LinearUnit::Yards => 3.0,
        LinearUnit::Miles => 5280.0,
        LinearUnit::Unitless => 1.0,
    }
}

#[inline]
pub fn square_feet_per_unit(unit: LinearUnit) -> f64 {
    let linear = feet_per_unit(unit);
    linear * linear
}

/// 一次计算内固定的单位换算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    unit: LinearUnit,
    linear: f64,
}

impl UnitScale {
    pub fn new(unit: LinearUnit) -> Self {
        Self {
            unit,
            linear: feet_per_unit(unit),
        }
    }

    #[inline]
    pub fn unit(&self) -> LinearUnit {
        self.unit
    }

    #[inline]
    pub fn linear(&self) -> f64 {
        self.linear
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.linear * self.linear
    }

    #[inline]
    pub fn to_feet(&self, value: f64) -> f64 {
        value * self.linear
    }

    #[inline]
    pub fn to_square_feet(&self, value: f64) -> f64 {
        value * self.area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_factors_per_unit() {
        let expected = [
            (LinearUnit::Feet, 1.0),
            (LinearUnit::Inches, 1.0 / 12.0),
            (LinearUnit::Millimeters, 1.0 / 304.8),
            (LinearUnit::Centimeters, 1.0 / 30.48),
            (LinearUnit::Meters, 1.0 / 0.3048),
            (LinearUnit::Kilometers, 1000.0 / 0.3048),
            (LinearUnit::Yards, 3.0),
            (LinearUnit::Miles, 5280.0),
            (LinearUnit::Unitless, 1.0),
        ];
        for (unit, factor) in expected {
            assert!(
                (feet_per_unit(unit) - factor).abs() < 1e-12,
                "factor mismatch for {}",
                unit.name()
            );
            assert!((square_feet_per_unit(unit) - factor * factor).abs() < 1e-6);
        }
    }

    #[test]
    fn unknown_unit_maps_to_one() {
        assert_eq!(feet_per_unit(LinearUnit::parse("cubits")), 1.0);
        assert_eq!(feet_per_unit(LinearUnit::from_insunits(14)), 1.0);
    }

    #[test]
    fn scale_converts_lengths_and_areas() {
        let scale = UnitScale::new(LinearUnit::Inches);
        assert!((scale.to_feet(24.0) - 2.0).abs() < 1e-12);
        assert!((scale.to_square_feet(144.0) - 1.0).abs() < 1e-12);
        assert_eq!(scale.unit(), LinearUnit::Inches);
    }
}
