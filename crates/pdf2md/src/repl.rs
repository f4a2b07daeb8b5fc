use std::path::Path;

use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::curate::{Edit, KeyArg, MarginArgs, MergeArgs, MoveArgs};
use crate::inspect::{ElementsArgs, TextArgs};
use crate::prelude::{eprintln, println, *};
use crate::session::Session;

/// One line of a `session` script.
#[derive(Debug, clap::Parser)]
#[command(name = "session", no_binary_name = true)]
struct Line {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Debug, clap::Subcommand)]
enum SessionCommand {
    /// Set the safe margin
    Margin(MarginArgs),
    /// Toggle the visibility of an element
    Visible(KeyArg),
    /// Toggle the body flag of a text element
    Body(KeyArg),
    /// Cycle the continuation mode of a text element
    Contd(KeyArg),
    /// Merge elements of one page
    Merge(MergeArgs),
    /// Split a merged element
    Split(KeyArg),
    /// Move an element next to another one
    Move(MoveArgs),
    /// Clear the translation of an element
    Clear(KeyArg),
    /// List elements
    Elements(ElementsArgs),
    /// Print or write the exported text
    Text(TextArgs),
    /// Print the page summary
    Summary,
    /// Write the snapshot now
    Save,
    /// Stop reading commands
    #[command(alias = "exit")]
    Quit,
}

/// Counts of a finished session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub changed: usize,
    pub unchanged: usize,
    pub errors: usize,
}

enum Step {
    Continue,
    Quit,
}

/// Split a script line into a command. Blank lines and `#` comments yield
/// `None`.
fn parse_line(line: &str) -> Result<Option<SessionCommand>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let words = shlex::split(trimmed).ok_or_eyre("Unbalanced quotes")?;
    let parsed = <Line as clap::Parser>::try_parse_from(words).map_err(|e| eyre!(e.to_string()))?;
    Ok(Some(parsed.command))
}

fn page_index(session: &Session, page: Option<usize>) -> Result<Option<usize>> {
    page.map(|p| session.page_index(p)).transpose()
}

fn execute(session: &mut Session, command: SessionCommand, tally: &mut Tally) -> Result<Step> {
    let edit = match command {
        SessionCommand::Margin(args) => Edit::margin(&args)?,
        SessionCommand::Visible(args) => Edit::Visible(args.key),
        SessionCommand::Body(args) => Edit::Body(args.key),
        SessionCommand::Contd(args) => Edit::Contd(args.key),
        SessionCommand::Split(args) => Edit::Split(args.key),
        SessionCommand::Clear(args) => Edit::Clear(args.key),
        SessionCommand::Merge(args) => Edit::merge(&args, session.page_index(args.page)?),
        SessionCommand::Move(args) => Edit::moving(&args, session.page_index(args.page)?),
        SessionCommand::Elements(args) => {
            let index = page_index(session, args.page)?;
            let rows = crate::inspect::element_rows(&session.document, &session.chains(), index);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                crate::inspect::print_elements(&rows);
            }
            return Ok(Step::Continue);
        }
        SessionCommand::Text(args) => {
            let index = page_index(session, args.page)?;
            let text = crate::inspect::export_text(&session.document, &session.chains(), index);
            crate::inspect::write_text(&text, args.output.as_deref())?;
            return Ok(Step::Continue);
        }
        SessionCommand::Summary => {
            crate::inspect::print_summary(&session.path, &session.document, &session.chains());
            return Ok(Step::Continue);
        }
        SessionCommand::Save => {
            let path = session.save()?;
            println!("{} {}", "Saved".green(), path.display());
            return Ok(Step::Continue);
        }
        SessionCommand::Quit => return Ok(Step::Quit),
    };

    let outcome = crate::curate::apply(&mut session.document, &edit);
    outcome.print();
    if outcome.changed() {
        tally.changed += 1;
    } else {
        tally.unchanged += 1;
    }

    Ok(Step::Continue)
}

/// Apply every command read from `reader` to the session, in order.
///
/// A line that fails to parse or apply is reported and skipped.
pub async fn run_lines<R>(session: &mut Session, mut reader: R, verbose: bool) -> Result<Tally>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut tally = Tally::default();
    let mut number = 0;

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        number += 1;

        if verbose {
            eprintln!("{} {}", f!("{:>4}>", number).dimmed(), line.trim_end());
        }

        let step = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => execute(session, command, &mut tally),
            Err(e) => Err(e),
        };

        match step {
            Ok(Step::Continue) => {}
            Ok(Step::Quit) => break,
            Err(e) => {
                tally.errors += 1;
                eprintln!("{} {}", f!("line {}:", number).red().bold(), e);
            }
        }
    }

    Ok(tally)
}

/// Read editing commands from stdin and save the document at the end.
pub async fn run(source: &Path, global: crate::Global) -> Result<()> {
    let mut session = global.open(source, false)?;
    let reader = BufReader::new(tokio::io::stdin());

    let tally = run_lines(&mut session, reader, global.verbose).await?;

    let chains = session.chains();
    let path = session.save()?;
    eprintln!(
        "{} {} changed, {} unchanged, {} failed; {} chains",
        "Session done:".green().bold(),
        tally.changed,
        tally.unchanged,
        tally.errors,
        chains.len()
    );
    if global.verbose {
        eprintln!("{} {}", "Snapshot:".green(), path.display());
    }

    Ok(())
}
