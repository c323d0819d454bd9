use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

use crate::config::CONFIG_ENV;
use crate::id::Zid;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "zs")]
#[command(bin_name = "zs")]
#[command(version)]
#[command(about = "Store, index and query zettel")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'c',
        long,
        env = CONFIG_ENV,
        help = "Path to the configuration file (default: ./zettelstore.toml)."
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'b',
        long = "box",
        value_name = "URI",
        help = "Box URI to use instead of the configured boxes. Repeatable."
    )]
    pub boxes: Vec<String>,

    #[arg(long, help = "Open every box read-only.")]
    pub read_only: bool,

    #[arg(long, global = true, help = "Print JSON instead of text.")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Print a zettel.")]
    Get(ZidArgs),
    #[command(about = "Print the metadata of a zettel, computed keys included.")]
    Meta(ZidArgs),
    #[command(about = "Select zettel with a query.")]
    Query(QueryArgs),
    #[command(about = "Create a zettel from stdin (header, blank line, content).")]
    Create,
    #[command(about = "Replace a zettel with text read from stdin.")]
    Update(ZidArgs),
    #[command(about = "Delete a zettel.")]
    Delete(ZidArgs),
    #[command(about = "Give a zettel a new identifier.")]
    Rename(RenameArgs),
    #[command(about = "Show box manager and index statistics.")]
    Stats,
    #[command(about = "Dump the index.")]
    Dump,
    #[command(about = "Re-read all boxes and rebuild the index.")]
    Refresh,
}

#[derive(Debug, Args)]
pub struct ZidArgs {
    #[arg(help = "Zettel identifier (14 digits).")]
    pub zid: Zid,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        help = "Query words, e.g. 'tags:#rust ORDER title LIMIT 10'."
    )]
    pub query: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    #[arg(help = "Current zettel identifier.")]
    pub cur: Zid,

    #[arg(help = "New zettel identifier.")]
    pub new: Zid,
}
