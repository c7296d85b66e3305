use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets};

/// Summary of a completed solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverStats {
    /// Coordinate-descent sweeps performed.
    pub sweeps: usize,
    /// Times the exclusion test re-admitted predictors.
    pub readmission_rounds: usize,
    /// Size of the final active set.
    pub active: usize,
    /// Largest coefficient change in the last sweep.
    pub max_change: f64,
}

#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep: usize,
    pub active: usize,
    pub nonactive: usize,
    pub max_change: f64,
    pub pruned: usize,
    pub readmitted: usize,
    pub converged: bool,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

pub trait Reporter {
    fn on_sweep(&mut self, report: &SweepReport);
    fn on_finish(&mut self) {}
}

/// Collects sweep reports and prints them as a table when the solve ends.
pub struct StdoutReporter {
    rows: Vec<SweepReport>,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }
}

impl Default for StdoutReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for StdoutReporter {
    fn on_sweep(&mut self, report: &SweepReport) {
        self.rows.push(report.clone());
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if !log::log_enabled!(log::Level::Info) {
            println!();
        }
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("sweep").set_alignment(CellAlignment::Right),
            Cell::new("active").set_alignment(CellAlignment::Right),
            Cell::new("excluded").set_alignment(CellAlignment::Right),
            Cell::new("max change").set_alignment(CellAlignment::Right),
            Cell::new("pruned").set_alignment(CellAlignment::Right),
            Cell::new("readmitted").set_alignment(CellAlignment::Right),
            Cell::new("converged"),
        ]);
        for row in &self.rows {
            table.add_row(vec![
                Cell::new(row.sweep).set_alignment(CellAlignment::Right),
                Cell::new(row.active).set_alignment(CellAlignment::Right),
                Cell::new(row.nonactive).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.3e}", row.max_change)).set_alignment(CellAlignment::Right),
                Cell::new(row.pruned).set_alignment(CellAlignment::Right),
                Cell::new(row.readmitted).set_alignment(CellAlignment::Right),
                Cell::new(if row.converged { "yes" } else { "no" }),
            ]);
        }

        for line in table.to_string().lines() {
            emit_line(line);
        }
        self.rows.clear();
    }
}
