//! Line-oriented interactive loop over stdin/stdout.

use crate::application::agent::{AgentError, ConversationEngine};
use crate::infrastructure::model::ModelProvider;
use std::future::Future;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

const PROMPT: &str = "You: ";

/// Why the interactive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user typed `exit` or `quit`.
    UserExit,
    EndOfInput,
    Interrupted,
    /// A turn failed; the error has already been printed.
    TurnFailed,
}

enum LoopControl {
    Continue,
    Exit(ExitReason),
}

/// `exit`, `quit`, `/exit`, `/quit`, any case.
pub fn is_exit_command(input: &str) -> bool {
    let command = input.trim();
    let command = command.strip_prefix('/').unwrap_or(command);
    command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit")
}

/// Read user lines from `input` and run each as a turn until the user
/// exits, input ends, `interrupt` resolves, or a turn fails.
pub async fn run_loop<P, R, W, I>(
    engine: &mut ConversationEngine<P>,
    input: R,
    output: &mut W,
    interrupt: I,
) -> Result<ExitReason, AgentError>
where
    P: ModelProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();

    loop {
        prompt(output).await?;
        let line = tokio::select! {
            biased;
            _ = &mut interrupt => return interrupted(output).await,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            write_line(output, "").await?;
            info!("Input closed");
            return Ok(ExitReason::EndOfInput);
        };

        let control = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            control = handle_line(engine, line.trim(), output) => Some(control?),
        };
        let Some(control) = control else {
            engine.settle_abandoned_turn();
            return interrupted(output).await;
        };
        match control {
            LoopControl::Continue => continue,
            LoopControl::Exit(reason) => return Ok(reason),
        }
    }
}

async fn handle_line<P, W>(
    engine: &mut ConversationEngine<P>,
    input: &str,
    output: &mut W,
) -> Result<LoopControl, AgentError>
where
    P: ModelProvider,
    W: AsyncWrite + Unpin,
{
    if input.is_empty() {
        return Ok(LoopControl::Continue);
    }
    if is_exit_command(input) {
        write_line(output, "Goodbye.").await?;
        return Ok(LoopControl::Exit(ExitReason::UserExit));
    }
    if input.eq_ignore_ascii_case("/tools") {
        print_tools(engine, output).await?;
        return Ok(LoopControl::Continue);
    }

    match engine.submit(input).await {
        Ok(outcome) => {
            write_line(output, &format!("Assistant: {}", outcome.reply)).await?;
            Ok(LoopControl::Continue)
        }
        Err(err) => {
            error!(error = %err, "Turn failed");
            write_line(output, &format!("Error: {}", err.user_message())).await?;
            Ok(LoopControl::Exit(ExitReason::TurnFailed))
        }
    }
}

async fn print_tools<P, W>(engine: &ConversationEngine<P>, output: &mut W) -> io::Result<()>
where
    P: ModelProvider,
    W: AsyncWrite + Unpin,
{
    let catalog = engine.catalog().await;
    if catalog.is_empty() {
        return write_line(output, "No tools available.").await;
    }
    for entry in catalog.entries() {
        let spec = entry.spec();
        let line = if spec.description.is_empty() {
            format!("- {} ({})", spec.name, entry.server())
        } else {
            format!("- {} ({}): {}", spec.name, entry.server(), spec.description)
        };
        write_line(output, &line).await?;
    }
    Ok(())
}

pub(crate) async fn interrupted<W>(output: &mut W) -> Result<ExitReason, AgentError>
where
    W: AsyncWrite + Unpin,
{
    write_line(output, "\nInterrupted.").await?;
    info!("Interrupted by user");
    Ok(ExitReason::Interrupted)
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W) -> io::Result<()> {
    output.write_all(PROMPT.as_bytes()).await?;
    output.flush().await
}

pub(crate) async fn write_line<W>(output: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
