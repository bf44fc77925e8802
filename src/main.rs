use std::path::PathBuf;

use clap::{Parser, Subcommand};
use impala_helper::{
    HdfsClient, Helper, HelperConfig, ImpalaShellConnector, MaskSalts, Params, QueryResult, ScpClient, SizeUnit,
    VariableSelection,
};
use tracing_subscriber::EnvFilter;

/// Impala helper CLI
#[derive(Parser, Debug)]
#[command(name = "impala-helper")]
#[command(about = "Run SQL against Impala, extract large results and build derived tables", long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default database, overrides the configuration
    #[arg(short, long)]
    database: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a .sql file, or every .sql file under a folder
    Run {
        path: PathBuf,
        /// Template parameter, `name=value`
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Run a query and print the result
    Query {
        sql: String,
        /// Extract through a staging table and the filesystem
        #[arg(long)]
        bulk: bool,
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Show the columns of a table
    Describe {
        table: String,
        /// Also list the table's properties
        #[arg(long)]
        formatted: bool,
    },
    /// Load a delimited file with a header line into a table
    Load {
        path: PathBuf,
        table: String,
        #[arg(short = 'D', long, default_value_t = ',')]
        delimiter: char,
    },
    /// Rebuild a table as Parquet
    Recreate { table: String },
    /// Count the rows of a table
    Count { table: String },
    /// Total size of a table's files
    Size {
        table: String,
        #[arg(short, long, value_enum, default_value = "mb")]
        unit: SizeUnit,
    },
    /// Random sample into <table>_muestra (or <table>_muestra_est with strata)
    Sample {
        table: String,
        #[arg(short, long, default_value_t = 0.01)]
        fraction: f64,
        #[arg(short, long = "stratum")]
        strata: Vec<String>,
    },
    /// One-hot encode columns into <table>_ohe
    OneHot {
        table: String,
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,
        /// Leave the encoded columns out of the new table
        #[arg(long)]
        drop: bool,
    },
    /// Variable stability analysis by period
    Stability {
        table: String,
        #[arg(short, long = "group", required = true)]
        group: Vec<String>,
        #[arg(short, long = "include", conflicts_with = "exclude")]
        include: Vec<String>,
        #[arg(short, long = "exclude")]
        exclude: Vec<String>,
    },
    /// Mask columns into <table>_mask
    Mask {
        table: String,
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,
        #[arg(long)]
        int_salt: Option<i64>,
        #[arg(long)]
        text_salt: Option<String>,
        /// Mask through truth tables, keeping value lengths
        #[arg(long)]
        keep_length: bool,
        /// Reuse truth tables built for this table
        #[arg(long, requires = "keep_length")]
        reuse_from: Option<String>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("impala_helper=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("impala_helper=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn to_params(pairs: Vec<(String, String)>) -> Option<Params> {
    (!pairs.is_empty()).then(|| pairs.into_iter().collect())
}

fn print(result: &QueryResult) {
    println!("{}", result.render());
    println!("({} rows)", result.len());
}

/// Loads the configuration and applies the command-line overrides.
fn load_config(args: &Args) -> impala_helper::Result<HelperConfig> {
    let mut config = HelperConfig::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database = Some(database.clone());
    }
    config.verbose |= args.verbose;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(config.verbose);

    let uses_files = matches!(args.command, Command::Query { bulk: true, .. } | Command::Load { .. });
    let remote = config.remote.clone();
    let mut helper = Helper::new(config, Box::new(ImpalaShellConnector::local()))?;
    if uses_files {
        helper = match remote {
            Some(remote) => {
                let files = HdfsClient::remote(&remote);
                files.login(&remote)?;
                helper
                    .with_files(Box::new(files))
                    .with_hop(Box::new(ScpClient::connect(&remote)?))
            }
            None => helper.with_files(Box::new(HdfsClient::local())),
        };
    }

    let outcome = run(&mut helper, args.command);
    helper.close();
    outcome
}

fn run(helper: &mut Helper, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Run { path, params } => {
            let params = to_params(params);
            if path.is_dir() {
                helper.execute_folder(&path, params.as_ref())?;
            } else {
                helper.execute_file(&path, params.as_ref())?;
            }
        }
        Command::Query { sql, bulk, params } => {
            let params = to_params(params);
            let result = if bulk {
                helper.query_bulk(&sql, params.as_ref())?
            } else {
                helper.query(&sql, params.as_ref())?
            };
            print(&result);
        }
        Command::Describe { table, formatted: false } => {
            for column in helper.describe(&table)? {
                println!(
                    "{}\t{:?}\t{}",
                    column.name,
                    column.column_type,
                    column.comment.unwrap_or_default()
                );
            }
        }
        Command::Describe { table, formatted: true } => {
            let description = helper.describe_formatted(&table)?;
            for column in description.columns {
                println!("{}\t{:?}", column.name, column.column_type);
            }
            println!();
            for (key, value) in description.properties {
                println!("{key}: {value}");
            }
        }
        Command::Load { path, table, delimiter } => {
            println!("{}", helper.load_file(&path, &table, delimiter)?);
        }
        Command::Recreate { table } => helper.recreate(&table)?,
        Command::Count { table } => println!("{}", helper.count(&table)?),
        Command::Size { table, unit } => println!("{:.2} {unit:?}", helper.table_size(&table, unit)?),
        Command::Sample { table, fraction, strata } => {
            let target = if strata.is_empty() {
                helper.sample(&table, fraction)?
            } else {
                let strata: Vec<&str> = strata.iter().map(String::as_str).collect();
                helper.stratified_sample(&table, &strata, fraction)?
            };
            println!("{target}");
        }
        Command::OneHot { table, columns, drop } => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            for derived in helper.one_hot(&table, &columns, drop)? {
                println!("{} -> {}", derived.name, derived.value);
            }
        }
        Command::Stability { table, group, include, exclude } => {
            let group: Vec<&str> = group.iter().map(String::as_str).collect();
            let selection = if include.is_empty() {
                VariableSelection::Exclude(exclude)
            } else {
                VariableSelection::Include(include)
            };
            let report = helper.stability(&table, &group, &selection)?;
            print(&report.by_period);
            print(&report.by_variable);
            print(&report.summary);
        }
        Command::Mask { table, columns, int_salt, text_salt, keep_length, reuse_from } => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            let salts = if keep_length {
                let salts = MaskSalts::resolve(int_salt, text_salt);
                for truth in helper.mask_keeping_length(&table, &columns, &salts, reuse_from.as_deref())? {
                    println!("truth table: {truth}");
                }
                salts
            } else {
                helper.mask(&table, &columns, int_salt, text_salt)?
            };
            println!("integer salt: {}\ntext salt: {}", salts.integer, salts.text);
        }
    }
    Ok(())
}
