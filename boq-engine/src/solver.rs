/// 由周长与面积反解矩形长宽，返回 `(长, 宽)`，长 ≥ 宽。
///
/// 半周长 `S = P/2`，判别式 `D = S² − 4A`。`D` 明显为负（形状不可能是矩形）、
/// 输入非正或任一根非正时返回 `(0, 0)`；微小的负判别式视为 0（正方形）。
pub fn solve_rectangle(perimeter: f64, area: f64) -> (f64, f64) {
    if !perimeter.is_finite() || !area.is_finite() || perimeter <= 0.0 || area <= 0.0 {
        return (0.0, 0.0);
    }
    let half = perimeter / 2.0;
    let discriminant = half * half - 4.0 * area;
    if discriminant < -1e-9 * (half * half).max(1.0) {
        return (0.0, 0.0);
    }
    let root = discriminant.max(0.0).sqrt();
    let length = (half + root) / 2.0;
    let width = (half - root) / 2.0;
    if length <= 0.0 || width <= 0.0 {
        return (0.0, 0.0);
    }
    (length, width)
}
