//! One filter pass: input through to output, then the AI section.

use crate::cli::Args;
use crate::config::{Config, Redact};
use crate::output::{self, SectionHeader};
use crate::prompts::{self, Mode};
use crate::{redact, user, window};
use anyhow::{Context, Result};
use futures::StreamExt;
use llm::{ApiError, CompletionRequest, Provider};
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

pub const EXIT_OK: u8 = 0;
pub const EXIT_NO_MODE: u8 = 1;
pub const EXIT_AI_FAIL: u8 = 2;
pub const EXIT_NO_INPUT: u8 = 3;

/// What a run reads from and writes to
pub struct Streams<'a, R, W, E> {
    pub input: &'a mut R,
    pub output: &'a mut W,
    /// Diagnostics, normally stderr
    pub errors: &'a mut E,
    pub input_is_tty: bool,
    pub output_is_tty: bool,
}

/// Pass the input through, then ask the provider built by `connect` and
/// append its answer. Returns the process exit code.
pub async fn run<R, W, E, F>(
    args: &Args,
    config: &Config,
    streams: Streams<'_, R, W, E>,
    connect: F,
) -> Result<u8>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    E: Write,
    F: FnOnce(&Config) -> Result<Box<dyn Provider>, ApiError>,
{
    let Streams {
        input,
        output: stdout,
        errors: stderr,
        input_is_tty,
        output_is_tty,
    } = streams;

    let mode = match args.selected_mode() {
        Some(mode) => mode,
        None if input_is_tty => {
            let config_hint = crate::config::config_path()
                .map(|path| format!("Config: {}", path.display()))
                .unwrap_or_default();
            write_flush(stdout, &Args::help_text(config_hint)).await?;
            return Ok(EXIT_NO_MODE);
        }
        None => Mode::Summary,
    };

    let window = window::tail_window(input, stdout, config.window_bytes)
        .await
        .context("Failed to pass stdin through")?;
    if window.received == 0 {
        writeln!(stderr, "[kull] No input on stdin")?;
        return Ok(EXIT_NO_INPUT);
    }

    let mut text = String::from_utf8_lossy(&window.bytes).into_owned();
    if config.redact == Redact::Basic {
        text = redact::basic(&text);
    }
    let system_prompt = prompts::build_prompt(mode, &user::current_username());

    if !args.quiet {
        write_flush(stdout, &output::divider(mode.title(), output_is_tty)).await?;
    }

    let provider = match connect(config) {
        Ok(provider) => provider,
        Err(e) => {
            if !args.quiet {
                write_flush(stdout, &format!("AI init failed: {e}\n")).await?;
            }
            writeln!(stderr, "[kull] provider init failed: {e}")?;
            return Ok(EXIT_AI_FAIL);
        }
    };

    let request = CompletionRequest::new(system_prompt, text, &config.model, config.max_tokens)
        .with_timeout(args.timeout.map(Duration::from_secs));
    debug!(
        "Sending {} bytes of input to {} ({}), mode {}",
        request.user_content.len(),
        provider.name(),
        request.model,
        mode
    );

    let start = Instant::now();
    let mut ai_text = String::new();
    let result = if args.stream {
        stream_section(provider.as_ref(), &request, args.quiet, stdout, &mut ai_text).await
    } else {
        complete_section(provider.as_ref(), &request, args.quiet, stdout, &mut ai_text).await
    };
    let elapsed = start.elapsed();

    if let Err(e) = result {
        if !args.quiet {
            // Keep whatever was streamed, but start the message on its own line
            let separator = if ai_text.is_empty() || ai_text.ends_with('\n') { "" } else { "\n" };
            write_flush(stdout, &format!("{separator}AI failed: {e}\n")).await?;
        }
        writeln!(stderr, "[kull] error: {e}")?;
        if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_timeout) {
            writeln!(stderr, "[kull] a larger --timeout may help")?;
        }
        return Ok(EXIT_AI_FAIL);
    }

    if ai_text.trim().is_empty() {
        if !args.quiet {
            writeln!(stderr, "AI output truncated or empty")?;
        }
    } else if !args.quiet && !ai_text.ends_with('\n') {
        write_flush(stdout, "\n").await?;
    }

    info!(
        "provider={} model={} mode={} tokens<={} elapsed_ms={}",
        config.provider,
        config.model,
        mode,
        config.max_tokens,
        elapsed.as_millis()
    );

    if let Some(path) = &args.out {
        let header = SectionHeader {
            provider: config.provider.name(),
            model: &config.model,
            mode: mode.key(),
            window: &window.bytes,
            max_tokens: config.max_tokens,
            elapsed_ms: elapsed.as_millis(),
            timestamp: chrono::Utc::now(),
        };
        if let Err(e) = output::write_section(path, &header, &ai_text) {
            warn!("{e:#}");
            if !args.quiet {
                writeln!(stderr, "[kull] {e:#}")?;
            }
        }
    }

    Ok(EXIT_OK)
}

async fn complete_section<W: AsyncWrite + Unpin>(
    provider: &dyn Provider,
    request: &CompletionRequest,
    quiet: bool,
    output: &mut W,
    ai_text: &mut String,
) -> Result<()> {
    *ai_text = provider.complete(request).await?;
    if !quiet {
        write_flush(output, ai_text).await?;
    }
    Ok(())
}

/// Print deltas as they arrive. On failure `ai_text` holds what was received so far.
async fn stream_section<W: AsyncWrite + Unpin>(
    provider: &dyn Provider,
    request: &CompletionRequest,
    quiet: bool,
    output: &mut W,
    ai_text: &mut String,
) -> Result<()> {
    let mut deltas = provider.stream(request).await?;
    while let Some(delta) = deltas.next().await {
        let delta = delta?;
        if !quiet {
            write_flush(output, &delta).await?;
        }
        ai_text.push_str(&delta);
    }
    Ok(())
}

async fn write_flush<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .context("Failed to write to stdout")?;
    output.flush().await.context("Failed to flush stdout")
}
