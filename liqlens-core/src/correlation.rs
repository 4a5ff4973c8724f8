//! Pearson correlation of panel columns against one target column.

use serde::{Deserialize, Serialize};

use crate::align::AlignedPanel;

/// One row of a correlation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub name: String,
    pub coefficient: f64,
    /// Rows where both columns were defined.
    pub pairs: usize,
}

/// Pearson correlation over index positions where both inputs are defined.
///
/// `None` with fewer than two pairs or when either side has zero variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<(f64, usize)> {
    let paired: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if paired.len() < 2 {
        return None;
    }

    let n = paired.len() as f64;
    let mean_x = paired.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = paired.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &paired {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    // Clamp rounding overshoot
    let r = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    Some((r, paired.len()))
}

/// Correlation of every column with `target`, strongest first.
///
/// The target itself leads the table at 1.0. Columns that cannot be
/// correlated (too few pairs, constant values) are left out. Returns `None`
/// when `target` is not in the panel or is itself constant.
pub fn correlation_table(panel: &AlignedPanel, target: &str) -> Option<Vec<Correlation>> {
    let target_col = panel.column(target)?;
    let (_, target_pairs) = pearson(target_col, target_col)?;

    let mut rows: Vec<Correlation> = panel
        .names()
        .iter()
        .filter(|name| name.as_str() != target)
        .filter_map(|name| {
            let col = panel.column(name)?;
            let (coefficient, pairs) = pearson(col, target_col)?;
            Some(Correlation {
                name: name.clone(),
                coefficient,
                pairs,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));

    rows.insert(
        0,
        Correlation {
            name: target.to_string(),
            coefficient: 1.0,
            pairs: target_pairs,
        },
    );
    Some(rows)
}

/// Like [`correlation_table`], restricted to rows where every column is
/// defined, so all coefficients share one sample.
pub fn complete_correlation_table(panel: &AlignedPanel, target: &str) -> Option<Vec<Correlation>> {
    correlation_table(&panel.select_rows(&panel.complete_rows()), target)
}
