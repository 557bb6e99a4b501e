use clap::{Parser as ClapParser, Subcommand};
use mql_lang::cli::{self, CliError};
use mql_lang::query::QueryOptions;
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "mql")]
#[command(about = "MQL - a metadata-catalog query language: parse, explain, and compile queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query and print its tree
    Parse {
        /// The MQL query (reads from stdin if not provided)
        query: Option<String>,
    },

    /// Parse and optimize a query, printing the optimized tree
    Explain {
        /// The MQL query (reads from stdin if not provided)
        query: Option<String>,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Compile a query to SQL
    Sql {
        /// The MQL query (reads from stdin if not provided)
        query: Option<String>,

        #[command(flatten)]
        options: OptionArgs,
    },
}

#[derive(clap::Args)]
struct OptionArgs {
    /// Default namespace for unqualified names
    #[arg(short, long)]
    namespace: Option<String>,

    /// Fetch metadata with the results
    #[arg(long)]
    with_meta: bool,

    /// Fetch provenance with the results
    #[arg(long)]
    with_provenance: bool,

    /// Include retired files
    #[arg(long)]
    include_retired: bool,

    /// Force deterministic ordering
    #[arg(long)]
    ordered: bool,

    /// Skip the first N results
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Return at most N results
    #[arg(short, long)]
    limit: Option<usize>,
}

impl From<OptionArgs> for QueryOptions {
    fn from(args: OptionArgs) -> Self {
        QueryOptions {
            default_namespace: args.namespace,
            with_meta: args.with_meta,
            with_provenance: args.with_provenance,
            include_retired: args.include_retired,
            ordered: args.ordered,
            skip: args.skip,
            limit: args.limit,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { query } => {
            query_text(query).and_then(|text| cli::execute_parse(&text))
        }
        Commands::Explain { query, options } => query_text(query)
            .and_then(|text| cli::execute_explain(&text, &QueryOptions::from(options))),
        Commands::Sql { query, options } => query_text(query)
            .and_then(|text| cli::execute_sql(&text, &QueryOptions::from(options))),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn query_text(arg: Option<String>) -> Result<String, CliError> {
    match arg {
        Some(text) => Ok(text),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Ok(buffer)
        }
        None => Err(CliError::NoInput),
    }
}
