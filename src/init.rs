//! `kull init`: interactive setup that writes the config file.

use crate::config::{config_path, Config, KeyEnv, Redact};
use anyhow::{Context, Result};
use llm::ProviderKind;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

/// Release files checked when `/etc/os-release` has no usable ID
const RELEASE_FILES: [(&str, &str); 5] = [
    ("etc/lsb-release", "debian/ubuntu"),
    ("etc/debian_version", "debian/ubuntu"),
    ("etc/redhat-release", "redhat/centos/fedora"),
    ("etc/arch-release", "arch"),
    ("etc/alpine-release", "alpine"),
];

pub fn run_init() -> Result<()> {
    let path = config_path().context("Could not determine the config directory")?;
    let current = Config::load();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();

    writeln!(output, "KullexAi setup. Press enter to keep the value in brackets.")?;
    writeln!(output, "Detected distro: {}", detect_distro())?;

    let config = prompt_config(&mut input, &mut output, current)?;
    config.save(&path)?;

    writeln!(output, "Wrote {}", path.display())?;
    writeln!(output, "{}", credential_status(&config, |name| std::env::var(name).ok()))?;
    Ok(())
}

/// Ask for every setting, using `current` for defaults
pub fn prompt_config<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    current: Config,
) -> Result<Config> {
    let names: Vec<_> = ProviderKind::ALL.iter().map(|kind| kind.name()).collect();
    let provider: ProviderKind = ask_parsed(
        input,
        output,
        &format!("Provider ({})", names.join(", ")),
        current.provider,
    )?;

    let model = ask(input, output, "Model", &current.model)?;

    let endpoint_hint = if current.endpoint.is_empty() {
        provider.default_base_url()
    } else {
        current.endpoint.clone()
    };
    let endpoint = ask(input, output, "Endpoint (\"-\" for backend default)", &endpoint_hint)?;
    let endpoint = if endpoint == "-" || endpoint == provider.default_base_url() {
        String::new()
    } else {
        endpoint
    };

    let window_bytes = ask_parsed(input, output, "Window bytes", current.window_bytes)?;
    let max_tokens = ask_parsed(input, output, "Max output tokens", current.max_tokens)?;
    let redact: Redact = ask_parsed(input, output, "Redact (basic, off)", RedactAnswer(current.redact))?.0;

    let key_env = match provider.api_key_env() {
        Some(default_env) => {
            let current_env = current
                .key_env
                .as_ref()
                .filter(|key_env| key_env.provider == provider)
                .map(|key_env| key_env.var.as_str());
            let shown = current_env.unwrap_or(default_env);
            let answer = ask(input, output, "API key variable", shown)?;
            Some(answer)
                .filter(|name| name != default_env && name != "-")
                .map(|var| KeyEnv { var, provider })
        }
        None => None,
    };

    Ok(Config {
        provider,
        model,
        endpoint,
        window_bytes,
        max_tokens,
        redact,
        key_env,
    })
}

/// One line telling the user where the key comes from and whether it is present
pub fn credential_status(config: &Config, lookup: impl Fn(&str) -> Option<String>) -> String {
    match config.key_env_name() {
        Some(name) => {
            let set = lookup(name).is_some_and(|value| !value.trim().is_empty());
            let state = if set { "is set" } else { "is NOT set" };
            format!("{} reads its API key from {name}, which {state}", config.provider)
        }
        None => format!("{} needs no API key", config.provider),
    }
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: &str,
) -> Result<String> {
    write!(output, "{label} [{default}]: ")?;
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read answer")?;
    if read == 0 {
        // End of input keeps the remaining defaults
        writeln!(output)?;
    }
    let answer = line.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

fn ask_parsed<R, W, T>(input: &mut R, output: &mut W, label: &str, default: T) -> Result<T>
where
    R: BufRead,
    W: Write,
    T: FromStr + Display,
    T::Err: Display,
{
    let default_text = default.to_string();
    loop {
        let answer = ask(input, output, label, &default_text)?;
        if answer == default_text {
            return Ok(default);
        }
        match answer.parse() {
            Ok(value) => return Ok(value),
            Err(e) => writeln!(output, "Invalid value: {e}")?,
        }
    }
}

/// [`Redact`] with the `Display` needed for prompting
struct RedactAnswer(Redact);

impl Display for RedactAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for RedactAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(RedactAnswer)
    }
}

pub fn detect_distro() -> String {
    detect_distro_in(Path::new("/"))
}

/// Distribution name from `etc/os-release` under `root`, else from well-known release files
fn detect_distro_in(root: &Path) -> String {
    if let Ok(os_release) = std::fs::read_to_string(root.join("etc/os-release")) {
        for line in os_release.lines() {
            let value = line
                .strip_prefix("ID=")
                .or_else(|| line.strip_prefix("ID_LIKE="));
            if let Some(value) = value {
                return value.trim().trim_matches('"').to_lowercase();
            }
        }
    }

    RELEASE_FILES
        .iter()
        .find(|(file, _)| root.join(file).exists())
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
