// Entry point: one-shot subcommands and an interactive menu.
//
// Tables go to stdout, log lines to stderr. Every command reads its periods
// from the CSV store in the configured data directory.
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kpi_report::config::Config;
use kpi_report::loader;
use kpi_report::output;
use kpi_report::reports::{self, ReportTable};
use kpi_report::session::{CommitOutcome, Session};
use kpi_report::store::{CsvStore, DataStore};
use kpi_report::types::{KpiRow, RawRow};
use kpi_report::util::{format_int, parse_date};
use kpi_report::validate::{validate, ValidationReport};
use kpi_report::{KpiError, PeriodId};

#[derive(Parser, Debug)]
#[command(name = "kpi-report", version, about = "Daily KPI entry and reporting per site and month")]
struct Cli {
    /// Configuration file (default: kpi_report.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `data_dir` from the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored periods
    Periods,
    /// Create a period seeded with one empty row per weekday and site
    Create {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
    },
    /// Delete a period that holds no KPI values
    Delete {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
    },
    /// Print the rows of a period
    Show {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Check a period file without saving it
    Validate { file: PathBuf },
    /// Replace a period with the rows of a CSV file
    Import {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
        file: PathBuf,
    },
    /// Latest reported day compared with the day before
    Daily {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Week-over-week comparison within a period
    Weekly {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Monthly KPIs of two periods side by side
    Compare {
        #[arg(value_parser = parse_period)]
        first: PeriodId,
        #[arg(value_parser = parse_period)]
        second: PeriodId,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Month-over-month trend over several periods
    Trend {
        #[arg(required = true, value_parser = parse_period)]
        periods: Vec<PeriodId>,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Rows of one site over a period
    Site {
        #[arg(value_parser = parse_period)]
        period: PeriodId,
        site: String,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Menu-driven entry, editing and reports
    Interactive,
}

fn parse_period(s: &str) -> std::result::Result<PeriodId, String> {
    s.parse::<PeriodId>().map_err(|e| e.to_string())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to read configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    init_tracing(&config.log_level);

    let mut store = CsvStore::open(&config.data_dir)
        .with_context(|| format!("cannot open data directory {}", config.data_dir.display()))?;

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Periods => {
            let periods = store.list_periods()?;
            if periods.is_empty() {
                println!("No periods in {}.", store.dir().display());
            }
            for id in periods {
                println!("{}", id);
            }
        }
        Command::Create { period } => create(&mut store, &config, period)?,
        Command::Delete { period } => delete(&mut store, period)?,
        Command::Show { period, export } => {
            let rows = load(&store, period)?;
            let table = reports::rows_table(&format!("Rows {}", period), &rows);
            emit(&table, export.as_deref(), config.preview_rows)?;
        }
        Command::Validate { file } => {
            let (raw, parse_errors) = loader::read_raw_file(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let report = validate(&raw);
            print_report(&report);
            if parse_errors > 0 {
                println!("{} records could not be read.", format_int(parse_errors as u64));
            }
            if !report.is_ok() {
                bail!("{} has {} validation errors", file.display(), report.errors.len());
            }
            println!("{}: {} rows OK.", file.display(), format_int(raw.len() as u64));
        }
        Command::Import { period, file } => {
            if !store.exists(period)? {
                store.save(period, &[])?;
            }
            let mut session = Session::open(store, period, config.history_capacity)?;
            import(&mut session, &file)?;
        }
        Command::Daily { period, export } => {
            let rows = load(&store, period)?;
            daily(&rows, export.as_deref(), config.preview_rows)?;
        }
        Command::Weekly { period, export } => {
            let rows = load(&store, period)?;
            let table = reports::weekly_table(
                &format!("Weekly comparison {}", period),
                &reports::weekly_report(&rows),
            );
            emit(&table, export.as_deref(), config.preview_rows)?;
        }
        Command::Compare { first, second, export } => {
            let a = load(&store, first)?;
            let b = load(&store, second)?;
            let cmp = reports::compare_months((first, &a), (second, &b));
            emit(&reports::comparison_table(&cmp), export.as_deref(), config.preview_rows)?;
        }
        Command::Trend { periods, export } => {
            let loaded = periods
                .iter()
                .map(|id| load(&store, *id).map(|rows| (*id, rows)))
                .collect::<Result<Vec<_>>>()?;
            let trend = reports::monthly_trend(&loaded);
            emit(&reports::trend_table(&trend), export.as_deref(), config.preview_rows)?;
        }
        Command::Site { period, site, export } => {
            let rows = load(&store, period)?;
            emit(&reports::site_history(&rows, &site), export.as_deref(), config.preview_rows)?;
        }
        Command::Interactive => interactive(store, config)?,
    }
    Ok(())
}

fn load(store: &CsvStore, id: PeriodId) -> Result<Vec<KpiRow>> {
    store
        .load(id)
        .with_context(|| format!("cannot load period {}", id))
}

fn create(store: &mut CsvStore, config: &Config, id: PeriodId) -> Result<()> {
    let sites = config.sites_for(id);
    store.create_period(id, &sites)?;
    println!(
        "Created {} with {} rows ({} weekdays x {} sites).",
        id,
        format_int((id.weekdays().len() * sites.len()) as u64),
        id.weekdays().len(),
        sites.len()
    );
    Ok(())
}

fn delete(store: &mut CsvStore, id: PeriodId) -> Result<()> {
    if store.delete_period(id)? {
        println!("Deleted {}.", id);
        Ok(())
    } else {
        Err(KpiError::PeriodNotEmpty(id).into())
    }
}

/// Print a preview and export when a path is given.
fn emit(table: &ReportTable, export: Option<&Path>, preview_rows: usize) -> Result<()> {
    output::preview_table(table, preview_rows);
    if let Some(path) = export {
        output::export(path, table).with_context(|| format!("export to {} failed", path.display()))?;
        println!("(Full table exported to {})\n", path.display());
    }
    Ok(())
}

fn daily(rows: &[KpiRow], export: Option<&Path>, preview_rows: usize) -> Result<()> {
    let Some(report) = reports::daily_report(rows) else {
        println!("No reported data yet.\n");
        return Ok(());
    };
    emit(&report.summary_table(), export, preview_rows)?;
    println!("Top 5 (lowest stop cost)\n");
    output::preview_table_rows(&report.ranking(5, true), 5);
    println!("Bottom 5 (highest stop cost)\n");
    output::preview_table_rows(&report.ranking(5, false), 5);
    Ok(())
}

fn print_report(report: &ValidationReport) {
    for e in &report.errors {
        println!("Error: {}", e);
    }
    for w in &report.warnings {
        println!("Warning: {}", w);
    }
}

fn print_outcome(outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::Saved { rows, warnings } => {
            for w in warnings {
                println!("Warning: {}", w);
            }
            println!("Saved ({} rows).\n", format_int(*rows as u64));
        }
        CommitOutcome::Rejected(report) => {
            print_report(report);
            println!("Nothing saved.\n");
        }
    }
}

fn import<S: DataStore>(session: &mut Session<S>, file: &Path) -> Result<()> {
    let (raw, parse_errors) =
        loader::read_raw_file(file).with_context(|| format!("cannot read {}", file.display()))?;
    if parse_errors > 0 {
        warn!(file = %file.display(), parse_errors, "unreadable records ignored");
    }
    let id = session.period().id;
    let outcome = session.commit(&raw)?;
    if outcome.is_saved() {
        info!(period = %id, file = %file.display(), "imported");
    }
    print_outcome(&outcome);
    Ok(())
}

// ---------------------------------------------------------------- menu

/// One trimmed line, or `None` once the input is closed.
fn read_line_from<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Read a single line of input after printing `label`.
fn prompt(label: &str) -> Option<String> {
    print!("{}: ", label);
    let _ = io::stdout().flush();
    read_line_from(&mut io::stdin().lock())
}

/// Like [`prompt`], with closed input read as an empty answer.
fn ask(label: &str) -> String {
    prompt(label).unwrap_or_default()
}

fn read_choice() -> Option<String> {
    prompt("Enter choice")
}

fn optional(label: &str) -> Option<String> {
    Some(ask(label)).filter(|s| !s.is_empty())
}

fn prompt_period(label: &str) -> Option<PeriodId> {
    let s = ask(label);
    match s.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            println!("{}\n", e);
            None
        }
    }
}

struct Menu {
    config: Config,
    session: Session<CsvStore>,
}

fn interactive(mut store: CsvStore, config: Config) -> Result<()> {
    let today = PeriodId::of(Local::now().date_naive());
    let id = match store.list_periods()?.last() {
        Some(id) => *id,
        None => {
            create(&mut store, &config, today)?;
            today
        }
    };
    let session = Session::open(store, id, config.history_capacity)?;
    let mut menu = Menu { config, session };
    loop {
        menu.print();
        let Some(choice) = read_choice() else {
            println!("\nExiting the program.");
            break;
        };
        println!();
        let result = match choice.as_str() {
            "1" => menu.select(),
            "2" => menu.create(),
            "3" => menu.delete(),
            "4" => menu.show(),
            "5" => menu.edit_row(),
            "6" => menu.remove_row(),
            "7" => menu.import(),
            "8" => menu.undo(),
            "9" => menu.redo(),
            "10" => menu.daily(),
            "11" => menu.weekly(),
            "12" => menu.compare(),
            "13" => menu.trend(),
            "14" => menu.site(),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 0-14.\n");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {:#}\n", e);
        }
    }
    Ok(())
}

impl Menu {
    fn print(&self) {
        let h = self.session.history();
        println!(
            "Period {} ({} rows, history {}/{})",
            self.session.period().id,
            self.session.period().len(),
            h.position(),
            h.len()
        );
        println!("[1] Select period      [2] Create period     [3] Delete period");
        println!("[4] Show rows          [5] Enter/update row  [6] Remove row");
        println!("[7] Import CSV         [8] Undo              [9] Redo");
        println!("[10] Daily report      [11] Weekly report    [12] Compare months");
        println!("[13] Trend             [14] Site history     [0] Exit\n");
    }

    fn rows(&self) -> &[KpiRow] {
        self.session.period().rows()
    }

    fn export_path(&self) -> Option<PathBuf> {
        optional("Export to (.csv/.json/.xlsx, empty to skip)").map(PathBuf::from)
    }

    fn emit(&self, table: &ReportTable) -> Result<()> {
        emit(table, self.export_path().as_deref(), self.config.preview_rows)
    }

    fn select(&mut self) -> Result<()> {
        let periods = self.session.store().list_periods()?;
        let list: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        println!("Periods: {}\n", list.join(", "));
        let Some(id) = prompt_period("Period (YYYY-MM)") else {
            return Ok(());
        };
        self.session.switch(id)?;
        println!("Switched to {}.\n", id);
        Ok(())
    }

    fn create(&mut self) -> Result<()> {
        let Some(id) = prompt_period("New period (YYYY-MM)") else {
            return Ok(());
        };
        create(self.session.store_mut(), &self.config, id)?;
        self.session.switch(id)?;
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        let Some(id) = prompt_period("Delete period (YYYY-MM)") else {
            return Ok(());
        };
        if id == self.session.period().id {
            println!("Switch to another period before deleting {}.\n", id);
            return Ok(());
        }
        delete(self.session.store_mut(), id)
    }

    fn show(&mut self) -> Result<()> {
        let table = reports::rows_table(&format!("Rows {}", self.session.period().id), self.rows());
        self.emit(&table)
    }

    fn edit_row(&mut self) -> Result<()> {
        let raw = RawRow {
            date: optional("Date (DD.MM.YYYY)"),
            site: optional("Site"),
            dispatcher: optional("Dispatcher"),
            vehicles: optional("Vehicles"),
            stops: optional("Stops"),
            unplanned_stops: optional("Unplanned stops"),
            fleet_cost: optional("Fleet cost"),
            ..Default::default()
        };
        let report = validate(std::slice::from_ref(&raw));
        if !report.is_ok() {
            print_report(&report);
            println!();
            return Ok(());
        }
        let Some(row) = KpiRow::from_raw(&raw) else {
            return Ok(());
        };
        let outcome = self.session.upsert_row(row)?;
        print_outcome(&outcome);
        Ok(())
    }

    fn remove_row(&mut self) -> Result<()> {
        let Some(date) = parse_date(&ask("Date (DD.MM.YYYY)")) else {
            println!("Invalid date.\n");
            return Ok(());
        };
        let site = ask("Site");
        match self.session.remove_row(date, &site)? {
            Some(outcome) => print_outcome(&outcome),
            None => println!("No row for {} at {}.\n", site, date),
        }
        Ok(())
    }

    fn import(&mut self) -> Result<()> {
        let file = PathBuf::from(ask("CSV file"));
        import(&mut self.session, &file)
    }

    fn undo(&mut self) -> Result<()> {
        if self.session.undo()? {
            println!("Undone.\n");
        } else {
            println!("Nothing to undo.\n");
        }
        Ok(())
    }

    fn redo(&mut self) -> Result<()> {
        if self.session.redo()? {
            println!("Redone.\n");
        } else {
            println!("Nothing to redo.\n");
        }
        Ok(())
    }

    fn daily(&mut self) -> Result<()> {
        let export = self.export_path();
        daily(self.rows(), export.as_deref(), self.config.preview_rows)
    }

    fn weekly(&mut self) -> Result<()> {
        let title = format!("Weekly comparison {}", self.session.period().id);
        let table = reports::weekly_table(&title, &reports::weekly_report(self.rows()));
        self.emit(&table)
    }

    fn compare(&mut self) -> Result<()> {
        let (Some(first), Some(second)) = (
            prompt_period("First period (YYYY-MM)"),
            prompt_period("Second period (YYYY-MM)"),
        ) else {
            return Ok(());
        };
        let store = self.session.store();
        let a = load(store, first)?;
        let b = load(store, second)?;
        let cmp = reports::compare_months((first, &a), (second, &b));
        self.emit(&reports::comparison_table(&cmp))
    }

    fn trend(&mut self) -> Result<()> {
        let input = ask("Periods (YYYY-MM, separated by spaces)");
        let mut loaded = Vec::new();
        for s in input.split_whitespace() {
            let id: PeriodId = s.parse()?;
            loaded.push((id, load(self.session.store(), id)?));
        }
        if loaded.is_empty() {
            println!("No periods given.\n");
            return Ok(());
        }
        let trend = reports::monthly_trend(&loaded);
        self.emit(&reports::trend_table(&trend))
    }

    fn site(&mut self) -> Result<()> {
        let site = ask("Site");
        let table = reports::site_history(self.rows(), &site);
        self.emit(&table)
    }
}
