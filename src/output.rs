//! Output formatting for search results

use crate::index::types::{WordArticleLink, WordMatch};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print search matches, one `headword<TAB>offset` per line
pub fn print_matches(matches: &[WordMatch], color: bool) -> io::Result<()> {
    write_matches(&mut stdout(color), matches)
}

/// Print exact lookup results, one `headword<TAB>offset` per line
pub fn print_links(links: &[WordArticleLink], color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    for link in links {
        write_entry(&mut out, &link.prefix, &link.word, link.article_offset)?;
    }
    Ok(())
}

/// Print plain headwords
pub fn print_headwords(headwords: &[String]) -> io::Result<()> {
    let mut out = io::BufWriter::new(io::stdout().lock());
    for word in headwords {
        writeln!(out, "{}", word)?;
    }
    out.flush()
}

pub fn write_matches<W: WriteColor>(out: &mut W, matches: &[WordMatch]) -> io::Result<()> {
    for m in matches {
        // Middle matches show the skipped leading words dimmed
        let split = m.link.prefix.len().min(m.word.len());
        let (lead, rest) = m.word.split_at_checked(split).unwrap_or(("", &m.word));
        write_entry(out, lead, rest, m.link.article_offset)?;
    }
    Ok(())
}

fn write_entry<W: WriteColor>(out: &mut W, lead: &str, word: &str, offset: u32) -> io::Result<()> {
    if !lead.is_empty() {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(out, "{}", lead)?;
        out.reset()?;
    }

    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(out, "{}", word)?;
    out.reset()?;

    write!(out, "\t")?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(out, "{}", offset)?;
    out.reset()?;
    writeln!(out)
}
