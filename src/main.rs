use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use tutor_cli::editor::parse_line_range;
use tutor_cli::{
    logger, Assignment, ChannelPresenter, Config, ContextKind, Controller, HttpTransport,
    OutputHandler, WorkingState, WorkspaceEditor,
};

#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Projexity tutor - guided help for your current project ticket", long_about = None)]
struct Cli {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file to use instead of ~/.tutor/config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat endpoint to connect to
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct EditorArgs {
    /// Files open in the editor
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,

    /// Active file (defaults to the first --file)
    #[arg(long)]
    active: Option<PathBuf>,

    /// Selected lines of the active file, e.g. 10-24
    #[arg(long, value_parser = parse_line_range)]
    lines: Option<std::ops::RangeInclusive<usize>>,
}

impl EditorArgs {
    fn editor(&self) -> WorkspaceEditor {
        let mut editor = WorkspaceEditor::new(self.files.clone());
        if let Some(active) = &self.active {
            editor = editor.with_active(active.clone());
        }
        if let Some(lines) = &self.lines {
            editor = editor.with_selection(lines.clone());
        }
        editor
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the tickets of the current project
    Tickets,
    /// Ask the tutor about a task
    Ask {
        task: String,
        /// selection, whole_file or all_open_files
        #[arg(short, long, default_value = "selection")]
        context: ContextKind,
        /// Ticket to work on (defaults to the first one)
        #[arg(short, long)]
        ticket: Option<String>,
        #[command(flatten)]
        editor: EditorArgs,
    },
    /// Check whether the open files meet a ticket's requirements
    Check {
        ticket: String,
        #[command(flatten)]
        editor: EditorArgs,
    },
    /// Interactive session
    Chat {
        #[arg(short, long, default_value = "selection")]
        context: ContextKind,
        #[command(flatten)]
        editor: EditorArgs,
    },
    /// Write the default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        std::env::set_var("TUTOR_DEBUG", "1");
    }

    if let Err(e) = logger::init_global_logger() {
        eprintln!("⚠️ Failed to initialize logger: {}", e);
    }

    let mut config = Config::load_or_default(cli.config.as_deref());
    if let Some(endpoint) = cli.endpoint {
        config.api.chat_endpoint = endpoint;
    }

    if let Command::InitConfig = cli.command {
        let path = cli.config.unwrap_or_else(Config::get_config_path);
        config.save_to_file(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let assignment = Assignment::load(&config.project).context("loading project catalog")?;
    let transport = Arc::new(HttpTransport::new()?);
    let (presenter, mut rx) = ChannelPresenter::new();
    let controller = Controller::new(&config, assignment, transport, Arc::new(presenter));

    let debug = cli.debug || logger::is_debug_enabled();
    let renderer = tokio::spawn(async move {
        let mut output = OutputHandler::new().with_debug(debug);
        while let Some(posted) = rx.recv().await {
            if let Err(e) = output.render(&posted) {
                eprintln!("render failed: {}", e);
            }
        }
    });

    match cli.command {
        Command::Tickets => {
            let output = OutputHandler::new();
            let current = controller.current_ticket().await;
            output.print_tickets(&controller.ticket_titles().await, Some(&current));
        }
        Command::Ask {
            task,
            context,
            ticket,
            editor,
        } => {
            if let Some(ticket) = ticket {
                select_ticket(&controller, &ticket).await;
            }
            controller
                .ask_with_context(&task, context, &editor.editor())
                .await
                .await?;
        }
        Command::Check { ticket, editor } => {
            controller.check_code(&ticket, &editor.editor()).await.await?;
        }
        Command::Chat { context, editor } => {
            OutputHandler::new().print_banner();
            controller.on_view_loaded().await;
            let chat = run_chat(&controller, context, editor.editor()).await;
            controller.shutdown().await;
            chat?;
        }
        Command::InitConfig => {}
    }

    drop(controller);
    renderer.await?;
    Ok(())
}

async fn select_ticket(controller: &Controller, title: &str) {
    if !controller.select_item(title).await {
        OutputHandler::new().print_error(&format!("Unknown ticket '{}', keeping current one", title));
    }
}

async fn run_chat(controller: &Controller, context: ContextKind, editor: WorkspaceEditor) -> Result<()> {
    let output = OutputHandler::new();
    output.print_system("Commands: /tickets, /ticket <title>, /check, /reset, /abort, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                if controller.working_state().await == WorkingState::Asking {
                    controller.abort().await;
                    continue;
                }
                break;
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => {}
            ("/quit", _) | ("/exit", _) => break,
            ("/abort", _) => controller.abort().await,
            ("/reset", _) => {
                if !controller.reset_conversation().await {
                    output.print_system("Still answering; /abort first or wait for it to finish.");
                }
            }
            ("/tickets", _) => {
                let current = controller.current_ticket().await;
                output.print_tickets(&controller.ticket_titles().await, Some(&current));
            }
            ("/ticket", title) => select_ticket(controller, title.trim()).await,
            ("/check", _) => {
                let ticket = controller.current_ticket().await;
                let _ = controller.check_code(&ticket, &editor).await;
            }
            _ => {
                let _ = controller.ask_with_context(line, context, &editor).await;
            }
        }
    }
    Ok(())
}
