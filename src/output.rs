use console::style;
use std::io::{self, Write};

use crate::conversation::WorkingState;
use crate::frame::Frame;
use crate::view::{PostedMessage, ViewMessage};

/// Renders view notifications on the terminal.
///
/// Response frames carry the whole answer so far; only the part not yet
/// printed is written, so the answer appears to stream in place.
pub struct OutputHandler {
    debug: bool,
    streaming_id: Option<String>,
    printed: String,
}

impl OutputHandler {
    pub fn new() -> Self {
        Self {
            debug: false,
            streaming_id: None,
            printed: String::new(),
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn render(&mut self, posted: &PostedMessage) -> io::Result<()> {
        if self.debug {
            eprintln!(
                "{} {}",
                style(posted.timestamp.format("%H:%M:%S%.3f")).dim(),
                style(&posted.message).dim()
            );
        }

        match &posted.message {
            ViewMessage::AddRequest(request) => {
                self.end_response()?;
                println!("{} {}", style("You:").cyan().bold(), request.text);
            }
            ViewMessage::AddResponse(frame) => self.print_frame(frame)?,
            ViewMessage::AddEvent(event) => {
                self.end_response()?;
                self.print_event(&event.text);
            }
            ViewMessage::SetWorkingState(WorkingState::Idle) => self.end_response()?,
            ViewMessage::SetWorkingState(WorkingState::Asking) => {
                println!("{}", style("Thinking...").yellow().dim());
            }
            ViewMessage::SetTickets(titles) => self.print_tickets(titles, None),
            ViewMessage::ClearResponses(_) => {
                println!("{}", style("Conversation cleared.").yellow().dim());
            }
            ViewMessage::SetConversationId(_) | ViewMessage::SetTask(_) => {}
        }
        Ok(())
    }

    fn print_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let Some(text) = frame.text() else {
            return Ok(());
        };

        let same_message = self.streaming_id.as_deref() == Some(frame.id.as_str());
        if !same_message || !text.starts_with(&self.printed) {
            if self.streaming_id.is_none() {
                print!("{} ", style("Tutor:").green().bold());
            } else {
                println!();
            }
            self.streaming_id = Some(frame.id.clone());
            self.printed.clear();
        }

        print!("{}", &text[self.printed.len()..]);
        io::stdout().flush()?;
        self.printed = text.to_string();
        Ok(())
    }

    fn end_response(&mut self) -> io::Result<()> {
        if self.streaming_id.take().is_some() {
            println!();
            io::stdout().flush()?;
        }
        self.printed.clear();
        Ok(())
    }

    fn print_event(&self, text: &str) {
        if text.starts_with("[ERROR]") {
            println!("{} {}", style("Error:").red().bold(), text);
        } else if text.starts_with("[EVENT]") {
            println!("{}", style(text).yellow());
        } else {
            println!("{} {}", style("Notice:").magenta().bold(), text);
        }
    }

    pub fn print_tickets(&self, titles: &[String], current: Option<&str>) {
        if titles.is_empty() {
            println!("{}", style("No tickets available for this project.").dim());
            return;
        }
        println!("{}", style("Tickets").cyan().bold());
        for title in titles {
            if Some(title.as_str()) == current {
                println!("  {} {}", style("▶").green().bold(), style(title).white().bold());
            } else {
                println!("    {}", title);
            }
        }
    }

    pub fn print_system(&self, content: &str) {
        println!("{}", style(content).yellow().dim());
    }

    pub fn print_error(&self, content: &str) {
        eprintln!("{} {}", style("Error:").red().bold(), content);
    }

    pub fn print_banner(&self) {
        println!("{}", style("╔═══════════════════════════════════════╗").cyan().bold());
        println!("{}", style("║      Projexity Tutor - guided help    ║").cyan().bold());
        println!("{}", style("╚═══════════════════════════════════════╝").cyan().bold());
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
