use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wikicheck_core::analysis::{ElementCategory, PageAnalysis};
use wikicheck_core::check::{AlgorithmCatalog, AlgorithmReport, CheckContext};
use wikicheck_core::config::{AlgorithmConfigPatch, WikiConfig, load_config, patch_algorithm_config};
use wikicheck_core::diagnostics::Diagnostics;
use wikicheck_core::isbn_range::load_range_table;

const CONFIG_ENV: &str = "WIKICHECK_CONFIG";
const RANGES_ENV: &str = "WIKICHECK_ISBN_RANGES";
const DEFAULT_CONFIG: &str = "wikicheck.toml";

#[derive(Debug, Parser)]
#[command(
    name = "wikicheck",
    version,
    about = "Detect check errors in wikitext pages and propose replacements"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Wiki configuration (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "ISBN range table (TOML)")]
    ranges: Option<PathBuf>,
    #[arg(long, global = true, help = "Log extraction and algorithm timings")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    ranges: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            ranges: cli.ranges.clone(),
            diagnostics: cli.diagnostics,
        }
    }

    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
    }

    fn ranges_path(&self) -> Option<PathBuf> {
        self.ranges
            .clone()
            .or_else(|| env::var_os(RANGES_ENV).map(PathBuf::from))
    }

    fn diagnostics(&self) -> Diagnostics {
        let from_env = Diagnostics::from_env();
        if self.diagnostics {
            Diagnostics::timed(from_env.threshold)
        } else {
            from_env
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run check algorithms over a page")]
    Check(CheckArgs),
    #[command(about = "Dump the elements found in a page")]
    Elements(ElementsArgs),
    #[command(about = "List the available check algorithms")]
    Algorithms,
    #[command(about = "Edit the [algorithms] section of the configuration")]
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(value_name = "FILE", help = "Wikitext file, or - for stdin")]
    file: PathBuf,
    #[arg(long, help = "Page title (namespace derived from its prefix)")]
    title: Option<String>,
    #[arg(long, help = "Namespace id, overriding the one derived from --title")]
    namespace: Option<i32>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, help = "Only report findings whose fix can be applied without review")]
    only_automatic: bool,
    #[arg(long, help = "Only report which algorithms find something")]
    detect: bool,
    #[arg(short = 'a', long = "algorithm", value_name = "NUMBER", help = "Run only these algorithms")]
    algorithms: Vec<u32>,
    #[arg(long, help = "Run algorithms on parallel threads")]
    parallel: bool,
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ElementsArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(short = 'c', long, value_name = "CATEGORY", help = "Only this category (e.g. isbn, template)")]
    category: Option<ElementCategory>,
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    Enable { numbers: Vec<u32> },
    Disable { numbers: Vec<u32> },
    Set { number: u32, name: String, value: String },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);
    init_logging(runtime.diagnostics);

    match cli.command {
        Some(Commands::Check(args)) => run_check(&runtime, args),
        Some(Commands::Elements(args)) => run_elements(&runtime, args),
        Some(Commands::Algorithms) => run_algorithms(&runtime),
        Some(Commands::Config(ConfigArgs { command })) => run_config(&runtime, command),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_logging(diagnostics: bool) {
    let default = if diagnostics { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .init();
}

fn load_runtime_config(runtime: &RuntimeOptions) -> Result<WikiConfig> {
    let path = runtime.config_path();
    debug!(path = %normalize_path(&path), "loading configuration");
    load_config(&path)
}

fn check_context(runtime: &RuntimeOptions) -> Result<CheckContext> {
    let context = CheckContext::default();
    let Some(path) = runtime.ranges_path() else {
        return Ok(context);
    };
    let table = load_range_table(&path)?;
    debug!(path = %normalize_path(&path), groups = table.groups.len(), "loaded ISBN ranges");
    Ok(context.with_isbn_ranges(Arc::new(table)))
}

fn read_page(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return io::read_to_string(io::stdin()).context("failed to read page from stdin");
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", normalize_path(path)))
}

fn open_page<'c>(runtime: &RuntimeOptions, config: &'c WikiConfig, page: &PageArgs) -> Result<PageAnalysis<'c>> {
    let contents = read_page(&page.file)?;
    let mut analysis = PageAnalysis::new(contents, config).with_diagnostics(runtime.diagnostics());
    analysis = match (&page.title, page.namespace) {
        (Some(title), Some(namespace)) => analysis.with_page(title.clone(), namespace),
        (Some(title), None) => analysis.with_title(title.clone()),
        (None, Some(namespace)) => analysis.with_page(normalize_path(&page.file), namespace),
        (None, None) => analysis,
    };
    Ok(analysis)
}

fn run_check(runtime: &RuntimeOptions, args: CheckArgs) -> Result<()> {
    let config = load_runtime_config(runtime)?;
    let mut catalog =
        AlgorithmCatalog::with_builtins(&config, check_context(runtime)?).with_diagnostics(runtime.diagnostics());
    if !args.algorithms.is_empty() {
        let registered = catalog
            .algorithms()
            .map(|(algorithm, _)| algorithm.error_number())
            .collect::<Vec<_>>();
        for number in &args.algorithms {
            if !registered.contains(number) {
                bail!("unknown algorithm {number}");
            }
        }
        for number in registered {
            catalog.set_enabled(number, args.algorithms.contains(&number));
        }
    }
    let analysis = open_page(runtime, &config, &args.page)?;

    if args.detect {
        let found = catalog.detect(&analysis);
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&found)?),
            OutputFormat::Text if found.is_empty() => println!("no errors detected"),
            OutputFormat::Text => {
                for number in found {
                    println!("{number}");
                }
            }
        }
        return Ok(());
    }

    let reports = if args.parallel {
        catalog.analyze_parallel(&analysis, args.only_automatic)
    } else {
        catalog.analyze(&analysis, args.only_automatic)
    };
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => print_reports(analysis.contents(), &reports),
    }
    Ok(())
}

fn print_reports(contents: &str, reports: &[AlgorithmReport]) {
    let mut total = 0usize;
    for report in reports.iter().filter(|report| report.found) {
        println!(
            "[{}] {}: {} finding(s)",
            report.error_number,
            report.short_description,
            report.errors.len()
        );
        for error in &report.errors {
            total += 1;
            println!(
                "  line {} [{}..{}]: {}",
                line_number(contents, error.span.begin),
                error.span.begin,
                error.span.end,
                error.span.slice(contents)
            );
            for action in &error.actions {
                match &action.replacement {
                    Some(replacement) => println!(
                        "    -> {replacement:?} ({}{})",
                        action.description,
                        if action.automatic { ", automatic" } else { "" }
                    ),
                    None => println!("    {}", action.description),
                }
            }
        }
    }
    println!("findings: {total}");
}

fn line_number(contents: &str, offset: usize) -> usize {
    contents
        .get(..offset)
        .map_or(0, |head| head.bytes().filter(|byte| *byte == b'\n').count())
        + 1
}

fn run_elements(runtime: &RuntimeOptions, args: ElementsArgs) -> Result<()> {
    let config = load_runtime_config(runtime)?;
    let analysis = open_page(runtime, &config, &args.page)?;
    let categories = match args.category {
        Some(category) => vec![category],
        None => ElementCategory::ALL.to_vec(),
    };
    let elements = categories
        .into_iter()
        .flat_map(|category| analysis.elements(category))
        .collect::<Vec<_>>();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&elements)?),
        OutputFormat::Text => {
            for element in &elements {
                let span = element.span();
                println!(
                    "{}\t{}..{}\t{:?}",
                    element.category(),
                    span.begin,
                    span.end,
                    span.slice(analysis.contents())
                );
            }
            println!("elements: {}", elements.len());
        }
    }
    Ok(())
}

fn run_algorithms(runtime: &RuntimeOptions) -> Result<()> {
    let config = load_runtime_config(runtime)?;
    let catalog = AlgorithmCatalog::with_builtins(&config, CheckContext::default());
    for (algorithm, enabled) in catalog.algorithms() {
        println!(
            "{:>4} {} ({})",
            algorithm.error_number(),
            algorithm.short_description(),
            if enabled { "enabled" } else { "disabled" }
        );
        for (name, description) in algorithm.parameters() {
            let value = config
                .algorithm_parameter(algorithm.error_number(), name)
                .unwrap_or("<unset>");
            println!("       {name} = {value}  # {description}");
        }
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\nconfig: {}", normalize_path(&runtime.config_path()));
        match runtime.ranges_path() {
            Some(path) => println!("ranges: {}", normalize_path(&path)),
            None => println!("ranges: <none>"),
        }
    }
    Ok(())
}

fn run_config(runtime: &RuntimeOptions, command: ConfigSubcommand) -> Result<()> {
    let path = runtime.config_path();
    let patch = match command {
        ConfigSubcommand::Enable { numbers } => AlgorithmConfigPatch {
            enable: numbers,
            ..AlgorithmConfigPatch::default()
        },
        ConfigSubcommand::Disable { numbers } => AlgorithmConfigPatch {
            disable: numbers,
            ..AlgorithmConfigPatch::default()
        },
        ConfigSubcommand::Set { number, name, value } => AlgorithmConfigPatch {
            set_parameters: vec![(number, name, value)],
            ..AlgorithmConfigPatch::default()
        },
    };
    if patch_algorithm_config(&path, &patch)? {
        println!("Updated {}", normalize_path(&path));
    } else {
        println!("No change to {}", normalize_path(&path));
    }
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
