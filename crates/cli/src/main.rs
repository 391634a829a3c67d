// sheetmerge CLI - unify heterogeneous spreadsheets into one table

mod exit_codes;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use sheetmerge_config::{resolve_ai, AiStatus, ResolvedAiConfig, Settings};
use sheetmerge_oracle::{GeminiOptions, GeminiOracle, DEFAULT_ENDPOINT};
use sheetmerge_recon::{
    unify, FieldExtractor, InputLayout, LookupTables, OracleChain, OutputFormat, RawTable,
    RunReport, SchemaReconciler, SimilarityOracle, UnifyOptions,
};

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_NO_INPUT, EXIT_OUTPUT, EXIT_SUCCESS, EXIT_USAGE};

const DEFAULT_OUTPUT: &str = "unified.xlsx";

const SUPPORTED_INPUTS: &str = ".csv .tsv .txt .xlsx .xlsm .xls .xlsb .ods";

#[derive(Parser)]
#[command(name = "sheetmerge")]
#[command(about = "Unify spreadsheets with drifting column names into one table")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/sheetmerge/settings.json)
    #[arg(long, global = true, value_name = "FILE", env = "SHEETMERGE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge input tables into one canonical table
    #[command(after_help = "\
Examples:
  sheetmerge unify 춘천.xlsx 원주.xlsx -o 강원.xlsx
  sheetmerge unify a.csv b.csv --format generic -k 이름,학교 -o merged.csv
  sheetmerge unify orders/*.xlsx --ai --report run.json")]
    Unify {
        /// Input files (CSV/TSV or Excel workbooks; every sheet is read)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file; `.xlsx` writes a workbook, anything else CSV
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,

        /// Dedup key columns (comma-separated or repeated)
        #[arg(long = "key", short = 'k', value_delimiter = ',', value_name = "COLUMN")]
        keys: Vec<String>,

        /// Output shape
        #[arg(long)]
        format: Option<FormatArg>,

        /// How input columns are addressed
        #[arg(long)]
        layout: Option<LayoutArg>,

        /// Also write the run report to FILE (`.json` for JSON, else text)
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Print the run report as JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Show how the input columns group into canonical columns
    Columns {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Resolve a free-text unit reference to (authority, school)
    #[command(after_help = "\
Examples:
  sheetmerge school '춘천 남산초'
  sheetmerge school '강원특별자치도원주교육지원청 (단구초)' --json")]
    School {
        /// Unit text as it appears in a personnel sheet
        text: String,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Edit-distance verdict threshold, 0-100
    #[arg(long, short = 't', value_parser = clap::value_parser!(u8).range(0..=100))]
    threshold: Option<u8>,

    /// Lookup tables (TOML) replacing the built-in reference data
    #[arg(long, value_name = "FILE")]
    lookup: Option<PathBuf>,

    /// Use the Gemini oracle (needs SHEETMERGE_GEMINI_KEY or GEMINI_API_KEY)
    #[arg(long)]
    ai: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// The twelve KFTA personnel columns
    Kfta,
    /// Canonical column names in first-seen order
    Generic,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Kfta => OutputFormat::Kfta,
            FormatArg::Generic => OutputFormat::Generic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Auto,
    Named,
    Positional,
}

impl From<LayoutArg> for InputLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Auto => InputLayout::Auto,
            LayoutArg::Named => InputLayout::Named,
            LayoutArg::Positional => InputLayout::Positional,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  sheetmerge-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = load_settings(cli.settings.as_deref()).and_then(|settings| match cli.command {
        Commands::Unify {
            files,
            output,
            keys,
            format,
            layout,
            report,
            json,
            engine,
        } => cmd_unify(
            &settings,
            UnifyArgs {
                files,
                output,
                keys,
                format,
                layout,
                report,
                json,
            },
            &engine,
        ),
        Commands::Columns {
            files,
            json,
            engine,
        } => cmd_columns(&settings, &files, json, &engine),
        Commands::School { text, json, engine } => cmd_school(&settings, &text, json, &engine),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = e.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => Settings::load_from(path).map_err(|e| {
            CliError::config(e.to_string()).with_hint("fix or remove the settings file")
        }),
        None => Ok(Settings::load()),
    }
}

// ============================================================================
// Engine setup
// ============================================================================

/// Everything a command needs to run the reconciliation engine.
struct Engine {
    tables: LookupTables,
    oracle: OracleChain,
    confidence_floor: u8,
}

fn build_engine(settings: &Settings, args: &EngineArgs) -> Result<Engine, CliError> {
    let tables = load_lookup(args.lookup.as_deref().or(settings.lookup.as_deref()))?;
    let threshold = args.threshold.unwrap_or(settings.threshold);
    let ai = resolve_ai(&settings.ai, args.ai);
    let oracle = build_oracle(threshold, &ai, args.ai)?;
    log::debug!(
        "lookup tables {}, threshold {}, oracle {}",
        tables.version(),
        threshold,
        if oracle.has_semantic() { "gemini" } else { "edit distance" }
    );
    Ok(Engine {
        tables,
        oracle,
        confidence_floor: ai.confidence_floor,
    })
}

fn load_lookup(path: Option<&Path>) -> Result<LookupTables, CliError> {
    let Some(path) = path else {
        return Ok(LookupTables::builtin());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::config(format!("cannot read {}: {}", path.display(), e)))?;
    LookupTables::from_toml(&text).map_err(|e| {
        CliError::config(format!("{}: {}", path.display(), e))
            .with_hint("see data/gangwon.toml for the expected layout")
    })
}

/// Semantic oracle when configured, edit distance otherwise. A missing key is
/// fatal only when `--ai` asked for the oracle explicitly.
fn build_oracle(threshold: u8, ai: &ResolvedAiConfig, forced: bool) -> Result<OracleChain, CliError> {
    match ai.status {
        AiStatus::Disabled => Ok(OracleChain::deterministic(threshold)),
        AiStatus::MissingKey if forced => Err(CliError::config("no Gemini API key found")
            .with_hint("set SHEETMERGE_GEMINI_KEY or GEMINI_API_KEY")),
        AiStatus::MissingKey => {
            log::warn!("AI is enabled in settings but no API key was found; using edit distance");
            Ok(OracleChain::deterministic(threshold))
        }
        AiStatus::Ready => {
            let Some(key) = ai.api_key.as_deref() else {
                return Ok(OracleChain::deterministic(threshold));
            };
            let options = GeminiOptions {
                model: ai.model.clone(),
                fallback_models: ai.fallback_models.clone(),
                endpoint: ai
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                throttle: ai.throttle,
                timeout: ai.timeout,
            };
            match GeminiOracle::new(key, &options) {
                Ok(oracle) => {
                    log::info!(
                        "semantic oracle: {} (key from {})",
                        oracle.client().active_model(),
                        ai.key_source.as_str()
                    );
                    Ok(OracleChain::with_semantic(threshold, Box::new(oracle)))
                }
                Err(e) if forced => Err(CliError::config(format!("cannot start Gemini client: {}", e))),
                Err(e) => {
                    log::warn!("cannot start Gemini client ({}); using edit distance", e);
                    Ok(OracleChain::deterministic(threshold))
                }
            }
        }
    }
}

fn load_inputs(files: &[PathBuf]) -> Result<Vec<RawTable>, CliError> {
    let inputs = sheetmerge_io::load_all(files);
    if inputs.is_empty() {
        return Err(CliError::no_input(format!(
            "no usable table in {} input file(s)",
            files.len()
        ))
        .with_hint(format!("supported inputs: {}", SUPPORTED_INPUTS)));
    }
    log::info!("loaded {} table(s) from {} file(s)", inputs.len(), files.len());
    Ok(inputs)
}

// ============================================================================
// unify
// ============================================================================

struct UnifyArgs {
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    keys: Vec<String>,
    format: Option<FormatArg>,
    layout: Option<LayoutArg>,
    report: Option<PathBuf>,
    json: bool,
}

fn cmd_unify(settings: &Settings, args: UnifyArgs, engine_args: &EngineArgs) -> Result<(), CliError> {
    let output = args.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    if args.report.as_deref() == Some(output.as_path()) {
        return Err(CliError::args("--report and --output name the same file"));
    }
    let engine = build_engine(settings, engine_args)?;
    let inputs = load_inputs(&args.files)?;

    let options = UnifyOptions {
        format: args.format.map(OutputFormat::from).unwrap_or(settings.format),
        layout: args.layout.map(InputLayout::from).unwrap_or(settings.layout),
        row_layout: settings.row_layout.clone(),
        key_columns: args
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        confidence_floor: engine.confidence_floor,
    };
    let result = unify(&engine.tables, &options, &engine.oracle, &inputs);

    sheetmerge_io::export(&result.table, &output).map_err(|e| CliError::output(e.to_string()))?;
    log::info!("wrote {} row(s) to {}", result.table.len(), output.display());

    if let Some(path) = &args.report {
        write_report(&result.report, path)?;
    }
    if args.json {
        println!("{}", to_json(&result.report)?);
    } else {
        println!("{}", result.report.render());
    }
    Ok(())
}

fn write_report(report: &RunReport, path: &Path) -> Result<(), CliError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let body = if is_json {
        to_json(report)?
    } else {
        report.render()
    };
    fs::write(path, body + "\n")
        .map_err(|e| CliError::output(format!("cannot write {}: {}", path.display(), e)))
}

// ============================================================================
// columns
// ============================================================================

fn cmd_columns(
    settings: &Settings,
    files: &[PathBuf],
    json: bool,
    engine_args: &EngineArgs,
) -> Result<(), CliError> {
    let engine = build_engine(settings, engine_args)?;
    let inputs = load_inputs(files)?;
    let groups = SchemaReconciler::new(engine.tables.column_rules(), &engine.oracle).reconcile(&inputs);

    if json {
        println!("{}", to_json(groups.groups())?);
        return Ok(());
    }
    for group in groups.groups() {
        let others: Vec<&str> = group
            .members
            .iter()
            .filter(|m| **m != group.canonical)
            .map(String::as_str)
            .collect();
        if others.is_empty() {
            println!("{}", group.canonical);
        } else {
            println!("{} <- {}", group.canonical, others.join(", "));
        }
    }
    if engine.oracle.fallback_count() > 0 {
        log::warn!(
            "semantic oracle fell back to edit distance {} time(s)",
            engine.oracle.fallback_count()
        );
    }
    Ok(())
}

// ============================================================================
// school
// ============================================================================

#[derive(Serialize)]
struct SchoolAnswer<'a> {
    input: &'a str,
    strategy: &'static str,
    authority: &'a str,
    school: &'a str,
}

fn cmd_school(settings: &Settings, text: &str, json: bool, engine_args: &EngineArgs) -> Result<(), CliError> {
    let engine = build_engine(settings, engine_args)?;
    let extractor =
        FieldExtractor::new(&engine.tables).with_oracle(&engine.oracle, engine.confidence_floor);
    let (strategy, resolved) = extractor.resolve_unit(text);

    if json {
        let answer = SchoolAnswer {
            input: text,
            strategy,
            authority: &resolved.authority,
            school: &resolved.school,
        };
        println!("{}", to_json(&answer)?);
    } else {
        let authority = if resolved.authority.is_empty() {
            "-"
        } else {
            resolved.authority.as_str()
        };
        println!("{}\t{}\t({})", authority, resolved.school, strategy);
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::general(format!("JSON encoding failed: {}", e)))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn no_input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_NO_INPUT, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self { code: EXIT_OUTPUT, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn keys_split_on_commas() {
        let cli = Cli::try_parse_from(["sheetmerge", "unify", "a.csv", "-k", "이름,학교", "-k", "과목"])
            .unwrap();
        let Commands::Unify { keys, .. } = cli.command else {
            panic!("expected unify");
        };
        assert_eq!(keys, vec!["이름", "학교", "과목"]);
    }

    #[test]
    fn threshold_is_bounded() {
        assert!(Cli::try_parse_from(["sheetmerge", "columns", "a.csv", "-t", "101"]).is_err());
        assert!(Cli::try_parse_from(["sheetmerge", "columns", "a.csv", "-t", "60"]).is_ok());
    }

    #[test]
    fn missing_key_is_fatal_only_when_forced() {
        let ai = resolve_ai(&Default::default(), false);
        assert!(build_oracle(85, &ai, false).is_ok());

        let mut missing = ai.clone();
        missing.status = AiStatus::MissingKey;
        assert!(build_oracle(85, &missing, false).is_ok());
        let err = build_oracle(85, &missing, true).err().unwrap();
        assert_eq!(err.code, EXIT_CONFIG);
        assert!(err.hint.is_some());
    }
}
