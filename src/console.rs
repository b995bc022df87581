//! Styled console output
//!
//! Components never print directly. They receive a [`ConsoleSink`] and hand it
//! `(text, style)` pairs; the terminal implementation renders them with
//! crossterm, the capture implementation records them for tests.

use std::io::{self, Write};

use crossterm::style::Stylize;

/// Visual style of a piece of console text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Bold,
    /// Welcome and farewell lines
    Banner,
    /// Prompt labels (`> `, `echo: `)
    Prompt,
    /// Streamed model output
    Reply,
    /// Execution warnings and code listings
    Alert,
    AlertBold,
}

/// Destination for styled text
///
/// Text is written as-is; no newline is appended. Implementations must make
/// the text visible before returning.
pub trait ConsoleSink {
    fn write(&mut self, text: &str, style: Style) -> io::Result<()>;
}

impl<S: ConsoleSink + ?Sized> ConsoleSink for &mut S {
    fn write(&mut self, text: &str, style: Style) -> io::Result<()> {
        (**self).write(text, style)
    }
}

/// Sink that renders to a terminal (stdout by default)
pub struct TerminalSink<W: Write = io::Stdout> {
    out: W,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ConsoleSink for TerminalSink<W> {
    fn write(&mut self, text: &str, style: Style) -> io::Result<()> {
        match style {
            Style::Plain => write!(self.out, "{}", text)?,
            Style::Bold => write!(self.out, "{}", text.bold())?,
            Style::Banner => write!(self.out, "{}", text.bold().blue())?,
            Style::Prompt => write!(self.out, "{}", text.bold().green())?,
            Style::Reply => write!(self.out, "{}", text.blue())?,
            Style::Alert => write!(self.out, "{}", text.red())?,
            Style::AlertBold => write!(self.out, "{}", text.bold().red())?,
        }
        self.out.flush()
    }
}

/// Sink that records everything written to it
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    pub writes: Vec<(String, Style)>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured text concatenated, styles dropped
    pub fn text(&self) -> String {
        self.writes.iter().map(|(text, _)| text.as_str()).collect()
    }

    /// Captured text written with the given style
    pub fn text_with_style(&self, style: Style) -> String {
        self.writes
            .iter()
            .filter(|(_, s)| *s == style)
            .map(|(text, _)| text.as_str())
            .collect()
    }
}

impl ConsoleSink for CaptureSink {
    fn write(&mut self, text: &str, style: Style) -> io::Result<()> {
        self.writes.push((text.to_string(), style));
        Ok(())
    }
}
