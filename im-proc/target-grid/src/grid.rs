use nalgebra::Point2;

use crate::TargetGridConfig;

/// One grid cell in unit-square coordinates, `(0,0)` at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub corners: [Point2<f64>; 4],
}

/// Cells in column-major order: the first column top to bottom, then the
/// next column.
pub fn make_grid(cfg: &TargetGridConfig) -> Vec<UnitCell> {
    let n_cols = cfg.n_cols.max(1) as f64;
    let n_rows = cfg.n_rows.max(1) as f64;
    let centre = |k: u32, n: f64, lo: f64, hi: f64| (2 * k + 1) as f64 * (1.0 - lo - hi) / (2.0 * n) + lo;
    let hx = cfg.horizontal_fill / n_cols / 2.0;
    let hy = cfg.vertical_fill / n_rows / 2.0;

    let mut cells = Vec::with_capacity((cfg.n_cols * cfg.n_rows) as usize);
    for col in 0..cfg.n_cols {
        let x = centre(col, n_cols, cfg.left_margin, cfg.right_margin);
        for row in 0..cfg.n_rows {
            let y = centre(row, n_rows, cfg.top_margin, cfg.bottom_margin);
            cells.push(UnitCell {
                corners: [
                    Point2::new(x - hx, y - hy),
                    Point2::new(x + hx, y - hy),
                    Point2::new(x + hx, y + hy),
                    Point2::new(x - hx, y + hy),
                ],
            });
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cells_are_column_major() {
        let cfg = TargetGridConfig {
            n_rows: 3,
            n_cols: 2,
            horizontal_fill: 1.0,
            vertical_fill: 1.0,
            ..Default::default()
        };
        let cells = make_grid(&cfg);
        assert_eq!(cells.len(), 6);
        // first column, top to bottom
        assert_relative_eq!(cells[0].corners[0].x, 0.0);
        assert_relative_eq!(cells[0].corners[0].y, 0.0);
        assert_relative_eq!(cells[1].corners[0].y, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cells[2].corners[2].y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(cells[3].corners[0].x, 0.5);
        assert_relative_eq!(cells[5].corners[2].x, 1.0);
    }

    #[test]
    fn margins_shrink_the_grid() {
        let cfg = TargetGridConfig {
            n_rows: 1,
            n_cols: 1,
            top_margin: 0.1,
            bottom_margin: 0.3,
            horizontal_fill: 1.0,
            vertical_fill: 0.5,
            ..Default::default()
        };
        let cell = make_grid(&cfg)[0];
        // centre at 0.1 + 0.6 / 2
        assert_relative_eq!(cell.corners[0].y, 0.4 - 0.25, epsilon = 1e-12);
        assert_relative_eq!(cell.corners[2].y, 0.4 + 0.25, epsilon = 1e-12);
    }
}
