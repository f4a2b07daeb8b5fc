use std::path::{Path, PathBuf};

use crate::prelude::{eprintln, println, *};
use clap::Parser;
use colored::Colorize;

mod curate;
mod error;
mod ingest;
mod inspect;
mod prelude;
mod repl;
mod session;
mod translate;

use crate::curate::{Edit, KeyArg, MarginArgs, MergeArgs, MoveArgs};
use crate::inspect::{ElementsArgs, TextArgs};
use crate::session::Session;
use crate::translate::TranslateArgs;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Curate the layout of PDF documents and translate them chain by chain"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Directory holding document snapshots
    #[clap(long, env = "PDF2MD_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Maximum vertical gap between lines of one block, relative to the font size
    #[clap(long, global = true, default_value_t = pdf::LayoutParams::default().line_margin)]
    line_margin: f32,

    /// Horizontal gap, relative to the font size, that splits a line
    #[clap(long, global = true, default_value_t = pdf::LayoutParams::default().char_margin)]
    char_margin: f32,

    /// Whether to display additional information.
    #[clap(long, env = "PDF2MD_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    fn layout_params(&self) -> pdf::LayoutParams {
        pdf::LayoutParams {
            line_margin: self.line_margin,
            char_margin: self.char_margin,
            ..Default::default()
        }
    }

    /// Open the session of `source` with these settings.
    pub fn open(&self, source: &Path, rebuild: bool) -> Result<Session> {
        let cache_dir = crate::session::cache_dir(self.cache_dir.as_deref())?;
        let session = Session::open(source, &cache_dir, rebuild, &self.layout_params())?;
        if self.verbose {
            eprintln!(
                "{} {} ({:?}, {} pages)",
                "Opened".green(),
                source.display(),
                session.origin,
                session.document.page_count()
            );
        }
        Ok(session)
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Lay out a PDF or layout file and print a page summary
    Open {
        source: PathBuf,
        /// Ignore the saved snapshot and lay the source out again
        #[arg(long)]
        rebuild: bool,
    },

    /// List the elements of the document
    Elements {
        source: PathBuf,
        #[clap(flatten)]
        args: ElementsArgs,
    },

    /// Set the safe margin, as fractions of the page size
    Margin {
        source: PathBuf,
        #[clap(flatten)]
        args: MarginArgs,
    },

    /// Toggle the visibility of an element
    Visible {
        source: PathBuf,
        #[clap(flatten)]
        args: KeyArg,
    },

    /// Toggle the body flag of a text element
    Body {
        source: PathBuf,
        #[clap(flatten)]
        args: KeyArg,
    },

    /// Cycle the continuation mode of a text element (none, concat, join)
    Contd {
        source: PathBuf,
        #[clap(flatten)]
        args: KeyArg,
    },

    /// Merge elements of one page into a single element
    Merge {
        source: PathBuf,
        #[clap(flatten)]
        args: MergeArgs,
    },

    /// Split a merged element back into its parts
    Split {
        source: PathBuf,
        #[clap(flatten)]
        args: KeyArg,
    },

    /// Move an element next to another one on the same page
    Move {
        source: PathBuf,
        #[clap(flatten)]
        args: MoveArgs,
    },

    /// Export the text of the document
    Text {
        source: PathBuf,
        #[clap(flatten)]
        args: TextArgs,
    },

    /// Translate pending chains through a local Ollama server
    Translate {
        source: PathBuf,
        #[clap(flatten)]
        args: TranslateArgs,
    },

    /// Clear the translation of an element
    Clear {
        source: PathBuf,
        #[clap(flatten)]
        args: KeyArg,
    },

    /// Read editing commands from stdin, one per line
    Session { source: PathBuf },
}

/// Load the session, apply one edit, and save.
fn edit(source: &Path, global: &Global, make: impl FnOnce(&Session) -> Result<Edit>) -> Result<()> {
    let mut session = global.open(source, false)?;
    let edit = make(&session)?;
    let outcome = crate::curate::apply(&mut session.document, &edit);
    outcome.print();

    if outcome.changed() {
        let chains = session.chains();
        let path = session.save()?;
        if global.verbose {
            eprintln!("{} {} ({} chains)", "Snapshot:".green(), path.display(), chains.len());
        }
    }

    Ok(())
}

async fn run(command: SubCommands, global: Global) -> Result<()> {
    match command {
        SubCommands::Open { source, rebuild } => {
            let session = global.open(&source, rebuild)?;
            let chains = session.chains();
            crate::inspect::print_summary(&session.path, &session.document, &chains);
            session.save()?;
            Ok(())
        }
        SubCommands::Elements { source, args } => {
            let session = global.open(&source, false)?;
            let page_index = args.page.map(|p| session.page_index(p)).transpose()?;
            let rows = crate::inspect::element_rows(&session.document, &session.chains(), page_index);
            if args.json {
                let json = serde_json::to_string_pretty(&rows)?;
                println!("{}", json);
            } else {
                crate::inspect::print_elements(&rows);
            }
            Ok(())
        }
        SubCommands::Text { source, args } => {
            let session = global.open(&source, false)?;
            let page_index = args.page.map(|p| session.page_index(p)).transpose()?;
            let text = crate::inspect::export_text(&session.document, &session.chains(), page_index);
            crate::inspect::write_text(&text, args.output.as_deref())
        }
        SubCommands::Margin { source, args } => edit(&source, &global, |_| Edit::margin(&args)),
        SubCommands::Visible { source, args } => edit(&source, &global, |_| Ok(Edit::Visible(args.key))),
        SubCommands::Body { source, args } => edit(&source, &global, |_| Ok(Edit::Body(args.key))),
        SubCommands::Contd { source, args } => edit(&source, &global, |_| Ok(Edit::Contd(args.key))),
        SubCommands::Split { source, args } => edit(&source, &global, |_| Ok(Edit::Split(args.key))),
        SubCommands::Clear { source, args } => edit(&source, &global, |_| Ok(Edit::Clear(args.key))),
        SubCommands::Merge { source, args } => edit(&source, &global, |s| {
            Ok(Edit::merge(&args, s.page_index(args.page)?))
        }),
        SubCommands::Move { source, args } => edit(&source, &global, |s| {
            Ok(Edit::moving(&args, s.page_index(args.page)?))
        }),
        SubCommands::Translate { source, args } => crate::translate::run(&source, args, global).await,
        SubCommands::Session { source } => crate::repl::run(&source, global).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    run(app.command, app.global)
        .await
        .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
