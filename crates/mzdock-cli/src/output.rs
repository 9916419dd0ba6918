use mzdock_workspace::{RecordingReporter, Reporter, SummaryTable};
use serde_json::Value;

/// Plain-text reporter for interactive use.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    pub problems: usize,
}

impl Reporter for ConsoleReporter {
    fn info(&mut self, message: &str) {
        println!("{}", message);
    }

    fn success(&mut self, message: &str) {
        println!("{}", message);
    }

    fn warning(&mut self, message: &str) {
        self.problems += 1;
        eprintln!("warning: {}", message);
    }

    fn error(&mut self, message: &str) {
        self.problems += 1;
        eprintln!("error: {}", message);
    }

    fn table(&mut self, table: &SummaryTable) {
        print_table(table);
    }

    fn progress_started(&mut self, label: &str) {
        eprintln!("{}", label);
    }
}

pub enum Output {
    Console(ConsoleReporter),
    Json(RecordingReporter),
}

impl Output {
    pub fn new(json: bool) -> Self {
        if json {
            Output::Json(RecordingReporter::default())
        } else {
            Output::Console(ConsoleReporter::default())
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Output::Json(_))
    }

    pub fn reporter(&mut self) -> &mut dyn Reporter {
        match self {
            Output::Console(r) => r,
            Output::Json(r) => r,
        }
    }

    /// Whether the user already saw a warning or error message.
    pub fn reported_problems(&self) -> bool {
        match self {
            Output::Console(r) => r.problems > 0,
            Output::Json(r) => !r.errors().is_empty(),
        }
    }

    pub fn events(&self) -> Value {
        match self {
            Output::Console(_) => Value::Array(Vec::new()),
            Output::Json(r) => serde_json::to_value(&r.events).unwrap_or(Value::Null),
        }
    }
}

fn print_table(table: &SummaryTable) {
    let header = ["Experiment Name", "Deconvolved Files", "Annotated Files"];
    let mut widths = header.map(str::len);
    for row in table.rows() {
        widths[0] = widths[0].max(row.experiment.len());
        widths[1] = widths[1].max(row.deconvolved.len());
        widths[2] = widths[2].max(row.annotated.len());
    }
    println!("Uploaded experiments in current workspace");
    println!(
        "{:<w0$}  {:<w1$}  {:<w2$}",
        header[0],
        header[1],
        header[2],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2]
    );
    for row in table.rows() {
        println!(
            "{:<w0$}  {:<w1$}  {:<w2$}",
            row.experiment,
            row.deconvolved,
            row.annotated,
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        );
    }
}
