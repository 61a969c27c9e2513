// src/render/mod.rs
//! Renderer step: text tables and shaded grid maps.

use crate::error::{Error, Result};
use crate::grid::GridVariable;
use crate::table::Table;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL_CONDENSED};
use std::io::{self, Write};

/// Shades from low to high; missing cells print as a blank.
const SHADES: &[u8] = b".:-=+*#%@";

/// Write `table` as a boxed text table, at most `max_rows` data rows.
pub fn render_table<W: Write>(out: &mut W, table: &Table, max_rows: usize) -> io::Result<()> {
    let shown = &table.rows()[..table.row_count().min(max_rows)];
    let mut view = comfy_table::Table::new();
    view.load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(table.columns());
    for row in shown {
        view.add_row(row);
    }

    writeln!(out, "{}", view)?;
    if table.row_count() > shown.len() {
        writeln!(out, "… {} more rows", table.row_count() - shown.len())?;
    }
    Ok(())
}

/// Shade a 2-D variable: first dimension down, second across.
pub fn render_grid<W: Write>(out: &mut W, variable: &GridVariable) -> Result<()> {
    if variable.values.ndim() != 2 {
        return Err(Error::length_mismatch(
            format!("dimensions of {} for a map", variable.name),
            2,
            variable.values.ndim(),
        ));
    }
    let summary = variable.summary();
    let (rows, cols) = (variable.shape()[0], variable.shape()[1]);
    let io_err = |e: io::Error| Error::Recipe(format!("rendering {}: {}", variable.name, e));

    writeln!(
        out,
        "{} [{}] ({} x {})",
        variable.name,
        variable.units.as_deref().unwrap_or("-"),
        variable.dimensions[0],
        variable.dimensions[1]
    )
    .map_err(io_err)?;

    for r in 0..rows {
        let mut line = String::with_capacity(cols);
        for c in 0..cols {
            let ch = match (variable.value(&[r, c]), summary.min, summary.max) {
                (Some(v), Some(lo), Some(hi)) => {
                    let t = if hi > lo { (v - lo) / (hi - lo) } else { 0.0 };
                    let i = ((t * (SHADES.len() - 1) as f64).round() as usize).min(SHADES.len() - 1);
                    SHADES[i] as char
                }
                _ => ' ',
            };
            line.push(ch);
        }
        writeln!(out, "{}", line.trim_end()).map_err(io_err)?;
    }
    if let (Some(lo), Some(hi)) = (summary.min, summary.max) {
        writeln!(out, "min {:.3}  max {:.3}  missing {}", lo, hi, summary.missing).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn boxes_rows_and_truncates() {
        let table = Table::new(
            vec!["gebiet".into(), "n".into()],
            vec![
                vec!["Kiel".into(), "2300".into()],
                vec!["Flensburg".into(), "1".into()],
                vec!["Lübeck".into(), "7".into()],
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        render_table(&mut buf, &table, 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with('╭'));
        assert!(lines[1].contains("gebiet") && lines[1].contains(" n "));
        let kiel = lines.iter().find(|l| l.contains("Kiel")).unwrap();
        assert!(kiel.contains("2300"));
        assert!(lines.iter().any(|l| l.contains("Flensburg")));
        assert!(!text.contains("Lübeck"));
        assert_eq!(lines.last(), Some(&"… 1 more rows"));
        assert!(lines[lines.len() - 2].starts_with('╰'));
    }

    #[test]
    fn short_table_has_no_truncation_line() {
        let table = Table::new(vec!["a".into()], vec![vec!["1".into()]]).unwrap();
        let mut buf = Vec::new();
        render_table(&mut buf, &table, 10).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("more rows"));
        assert!(text.trim_end().ends_with('╯'));
    }

    #[test]
    fn shades_grid_with_gaps() {
        let var = GridVariable {
            name: "tas".into(),
            dimensions: vec!["y".into(), "x".into()],
            values: ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.0, f64::NAN, 5.0, 10.0]).unwrap(),
            units: Some("degC".into()),
        };
        let mut buf = Vec::new();
        render_grid(&mut buf, &var).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "tas [degC] (y x x)");
        assert_eq!(lines[1], ".");
        assert_eq!(lines[2], "+@");
        assert_eq!(lines[3], "min 0.000  max 10.000  missing 1");
    }

    #[test]
    fn grid_must_be_two_dimensional() {
        let var = GridVariable {
            name: "t".into(),
            dimensions: vec!["t".into()],
            values: ArrayD::zeros(IxDyn(&[3])),
            units: None,
        };
        assert!(render_grid(&mut Vec::new(), &var).is_err());
    }
}
