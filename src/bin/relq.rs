//! relq: compile queries from the command line
//!
//! Never connects to a database: it prints the SQL and arguments a query
//! compiles to.
//!
//! # Usage
//!
//! ```bash
//! # Compile a JSON-encoded query
//! relq compile query.json --schema schema.toml
//!
//! # Read the query from stdin, MySQL flavour, JSON output
//! cat query.json | relq compile - --dialect mysql --format json
//!
//! # Expand nested writes for User 42
//! relq nested User 42 writes.json
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use relq::prelude::*;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relq")]
#[command(version)]
#[command(about = "Compile structured queries to SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    relq compile query.json --schema schema.toml
    relq compile - --dialect sqlite --format json < query.json
    relq nested User 42 writes.json
    relq schema")]
struct Cli {
    /// Target dialect (postgres, mysql, sqlite)
    #[arg(short, long, env = "RELQ_DIALECT", global = true)]
    dialect: Option<Dialect>,

    /// Schema file (TOML)
    #[arg(short, long, env = "RELQ_SCHEMA", global = true)]
    schema: Option<PathBuf>,

    /// Config file; defaults to ./relq.toml, then the user config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query (`-` reads stdin)
    Compile {
        query: String,
    },
    /// Expand nested writes for one parent row
    Nested {
        /// Parent model
        model: String,
        /// Parent key as JSON (`42`, `"abc"`)
        key: String,
        /// JSON list of nested writes (`-` reads stdin)
        writes: String,
    },
    /// List models and relations in the schema
    Schema,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "relq=debug" } else { "relq=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = RelqConfig::load(cli.config.as_deref()).context("loading config")?;
    let dialect = cli.dialect.unwrap_or(config.dialect);
    let schema = load_schema(cli, &config)?;
    let registry = Registry::new(schema);
    let compiler = Compiler::new(&registry, dialect).with_options(config.compile_options());

    match &cli.command {
        Commands::Compile { query } => {
            let input = read_input(query)?;
            let query: Query = serde_json::from_str(&input).context("parsing query JSON")?;
            let compiled = compiler.compile(&query)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&compiled)?),
                OutputFormat::Text => {
                    print_statement(&compiled.sql, &compiled.args, dialect);
                    let pending = compiled.nested_writes().len();
                    if pending > 0 {
                        println!();
                        println!(
                            "{}",
                            format!("{} nested write(s) pending; expand with `relq nested` once the key is known", pending)
                                .dimmed()
                        );
                    }
                }
            }
        }
        Commands::Nested { model, key, writes } => {
            let key: Value = serde_json::from_str(key).context("parsing parent key JSON")?;
            let input = read_input(writes)?;
            let writes: Vec<NestedWrite> = serde_json::from_str(&input).context("parsing writes JSON")?;
            let statements = compiler.compile_nested_writes(model, &key, &writes)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statements)?),
                OutputFormat::Text => {
                    for (i, stmt) in statements.iter().enumerate() {
                        println!("{}", format!("-- statement {}", i + 1).dimmed());
                        print_statement(&stmt.sql, &stmt.args, dialect);
                    }
                }
            }
        }
        Commands::Schema => {
            let snapshot = registry.snapshot();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*snapshot)?),
                OutputFormat::Text => print_schema(&snapshot),
            }
        }
    }
    Ok(())
}

fn load_schema(cli: &Cli, config: &RelqConfig) -> Result<Schema> {
    let path = cli.schema.as_ref().or(config.schema_path.as_ref());
    match path {
        Some(path) => Schema::load_from_file(path).with_context(|| format!("loading schema {}", path.display())),
        None if matches!(cli.command, Commands::Schema) => bail!("No schema. Use --schema or set RELQ_SCHEMA"),
        None => {
            tracing::warn!("no schema configured; nested writes fall back to naming conventions");
            Ok(Schema::new())
        }
    }
}

fn read_input(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("reading {}", arg))
    }
}

fn print_statement(sql: &str, args: &[Value], dialect: Dialect) {
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", sql.white());

    if !args.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, arg) in args.iter().enumerate() {
            match dialect {
                Dialect::Postgres => println!("  ${} = {}", i + 1, arg.to_string().yellow()),
                _ => println!("  ?{} = {}", i + 1, arg.to_string().yellow()),
            }
        }
    }
}

fn print_schema(schema: &Schema) {
    if schema.models().is_empty() {
        println!("{}", "(no models)".dimmed());
        return;
    }
    for model in schema.models() {
        println!("{} {}", model.name.cyan().bold(), format!("-> {}", model.table).dimmed());
        for field in &model.fields {
            if field.column_name() == field.name {
                println!("    {}", field.name.white());
            } else {
                println!("    {} {}", field.name.white(), format!("({})", field.column_name()).dimmed());
            }
        }
        for rel in &model.relations {
            println!(
                "    {} {} {:?} {}",
                "↳".green(),
                rel.name.yellow(),
                rel.kind,
                rel.to_model.cyan()
            );
        }
    }
}
