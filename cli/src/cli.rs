use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use sqlet::engine::Dialect;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "sqlet")]
/// sqlet entity toolkit
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load an entity and print its compiled SQL, parameters and fields
    Inspect {
        /// Application root holding the `.sql`/`.sql.json` entity files
        #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
        root: PathBuf,
        /// Entity name, root-relative without extension (e.g. orders/list)
        entity: String,
        /// Placeholder dialect used for compilation
        #[arg(long, value_enum, default_value_t = DialectArg::Generic)]
        dialect: DialectArg,
        /// Table metadata as JSON, for schema resolution without a database
        ///
        /// Shape: {"orders": {"id": {"type": "long", "nullable": false, "key": true}}}
        #[arg(long, value_hint = ValueHint::FilePath)]
        tables: Option<PathBuf>,
        /// Report field owners by source alias instead of table name
        #[arg(long)]
        aliases: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DialectArg {
    Generic,
    Postgres,
    Oracle,
}

impl From<DialectArg> for Dialect {
    fn from(dialect: DialectArg) -> Self {
        match dialect {
            DialectArg::Generic => Dialect::Generic,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Oracle => Dialect::Oracle,
        }
    }
}
