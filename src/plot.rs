//! SVG charts for run reports

use crate::fuzz::FuzzReport;
use crate::price::Grid;
use crate::report::LadderRow;
use crate::state::PoolState;
use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

/// Bin price against bin id.
pub fn plot_price_ladder(rows: &[LadderRow], out_path: &Path) -> Result<()> {
    let root = SVGBackend::new(out_path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let pts: Vec<(f64, f64)> = rows.iter().map(|r| (r.bin as f64, r.price_decimal)).collect();
    let x_min = pts.first().map(|(x, _)| *x).unwrap_or(0.0);
    let x_max = pts.last().map(|(x, _)| *x).unwrap_or(1.0).max(x_min + 1.0);
    let y_max = pts.iter().map(|(_, y)| *y).fold(0.0, f64::max).max(1e-12);
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Bin price ladder", ("sans-serif", 28))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..(y_max * 1.05))?;
    chart.configure_mesh().x_desc("bin id").y_desc("price").draw()?;
    chart.draw_series(LineSeries::new(pts, &BLACK))?;
    root.present()?;
    Ok(())
}

/// Float reference minus actual output for every executed swap.
///
/// Points below zero would be overpayments.
pub fn plot_rounding_slack(report: &FuzzReport, out_path: &Path) -> Result<()> {
    let root = SVGBackend::new(out_path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let pts: Vec<(f64, f64)> = report
        .records
        .iter()
        .filter_map(|r| r.slack.map(|s| (r.index as f64, s)))
        .collect();
    let x_max = (report.executed as f64).max(1.0);
    let y_max = pts.iter().map(|(_, y)| *y).fold(1.0, f64::max);
    let y_min = pts.iter().map(|(_, y)| *y).fold(0.0, f64::min);
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Rounding slack per swap", ("sans-serif", 28))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, (y_min * 1.05)..(y_max * 1.05))?;
    chart.configure_mesh().x_desc("transaction").y_desc("reference - actual").draw()?;
    chart.draw_series(LineSeries::new([(0.0, 0.0), (x_max, 0.0)], &RED))?;
    chart.draw_series(pts.into_iter().map(|p| Circle::new(p, 2, BLACK.filled())))?;
    root.present()?;
    Ok(())
}

/// Liquidity per bin, both assets valued in Y.
pub fn plot_liquidity(pool: &PoolState, grid: &Grid<'_>, out_path: &Path) -> Result<()> {
    let root = SVGBackend::new(out_path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (&id, bin) in &pool.bins {
        let price = grid.price_of_bin(id)? as f64 / 1e8;
        xs.push((id as f64, bin.reserve_x as f64 * price));
        ys.push((id as f64, bin.reserve_y as f64));
    }
    let x_min = xs.first().map(|(x, _)| *x).unwrap_or(-1.0);
    let x_max = xs.last().map(|(x, _)| *x).unwrap_or(1.0).max(x_min + 1.0);
    let y_max = xs.iter().chain(ys.iter()).map(|(_, y)| *y).fold(1.0, f64::max);
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Liquidity per bin (in Y)", ("sans-serif", 28))
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, 0.0..(y_max * 1.05))?;
    chart.configure_mesh().x_desc("bin id").draw()?;
    chart
        .draw_series(LineSeries::new(xs, &BLUE))?
        .label("X")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(ys, &RED))?
        .label("Y")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart.configure_series_labels().background_style(WHITE.mix(0.8)).border_style(BLACK).draw()?;
    root.present()?;
    Ok(())
}
