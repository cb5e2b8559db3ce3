mod render;

use std::io::Write;
use std::time::{Duration, Instant};

use parley_bridge::{MessageChannel, loopback};
use parley_host::{HostSettings, ReferenceHost};
use parley_webview::chat::InputKey;
use parley_webview::{ChatView, WebviewSettings};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};

use render::{TerminalViewport, TranscriptPrinter, line_count};

const FRAME_INTERVAL: Duration = Duration::from_millis(50);
const VISIBLE_LINES: usize = 24;

#[derive(Debug, Snafu)]
enum AppError {
    #[snafu(display("failed to read terminal input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write terminal output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

/// One line of terminal input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(String),
    Stop,
    ToggleAutoScroll,
    ToggleProviders,
    GitChanges,
    Bottom,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "/stop" => Self::Stop,
            "/scroll" => Self::ToggleAutoScroll,
            "/providers" => Self::ToggleProviders,
            "/git" => Self::GitChanges,
            "/bottom" => Self::Bottom,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Send(line.to_string()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let host_settings = HostSettings::load();
    let host_settings = HostSettings {
        state_path: host_settings
            .state_path
            .clone()
            .or_else(|| Some(HostSettings::default_state_path())),
        ..host_settings
    };
    let webview_settings = WebviewSettings::load();

    let pair = loopback();
    let host = tokio::spawn(ReferenceHost::new(host_settings).run(pair.host));
    let channel = MessageChannel::new(pair.transport.clone());
    let mut inbound = pair.inbound;
    let mut view = ChatView::mount(&channel, webview_settings);

    let mut printer = TranscriptPrinter::default();
    let mut viewport = TerminalViewport::new(VISIBLE_LINES);
    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);

    print_help(&mut stdout)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context(ReadInputSnafu { stage: "read-stdin-line" })? else {
                    break;
                };
                match Command::parse(&line) {
                    Command::Quit => break,
                    Command::Help => print_help(&mut stdout)?,
                    command => run_command(&mut view, &mut viewport, command),
                }
            }
            envelope = inbound.recv() => {
                let Some(envelope) = envelope else {
                    tracing::warn!("host closed the channel");
                    break;
                };
                channel.dispatch(&envelope);
            }
            _ = frames.tick() => {
                let snapshot = view.snapshot();
                viewport.set_content_lines(line_count(&snapshot));
                view.tick(Instant::now(), &mut viewport);
            }
        }

        printer
            .render(&view.snapshot(), &mut stdout)
            .context(WriteOutputSnafu { stage: "render-transcript" })?;
    }

    drop(view);
    drop(channel);
    drop(pair.transport);
    if let Err(error) = host.await {
        tracing::warn!(error = %error, "host task ended abnormally");
    }
    Ok(())
}

fn run_command(view: &mut ChatView, viewport: &mut TerminalViewport, command: Command) {
    match command {
        Command::Send(text) => {
            view.set_input_text(text);
            if let Some(Err(rejection)) = view.press_key(InputKey::Enter) {
                tracing::info!(?rejection, "message not sent");
            }
        }
        Command::Stop => {
            view.stop();
        }
        Command::ToggleAutoScroll => {
            let enabled = view.toggle_auto_scroll();
            tracing::info!(enabled, "auto-scroll toggled");
        }
        Command::ToggleProviders => {
            let visible = view.toggle_providers();
            if let Some(providers) = view.providers() {
                for provider in providers.all().values() {
                    tracing::info!(id = %provider.id, kind = %provider.kind, model = %provider.model_name, "provider");
                }
            }
            tracing::info!(visible, "provider panel toggled");
        }
        Command::GitChanges => view.request_git_changes(),
        Command::Bottom => view.scroll_to_bottom(viewport),
        Command::Help | Command::Quit => {}
    }
}

fn print_help(out: &mut impl Write) -> Result<(), AppError> {
    writeln!(
        out,
        "type a message and press enter. commands: /stop /scroll /providers /git /bottom /help /quit"
    )
    .context(WriteOutputSnafu { stage: "print-help" })
}
