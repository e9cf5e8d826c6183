use anyhow::{bail, Context, Result};
use clap::Args;
use mqtt5_fuzz_transport::constants::MAX_INPUT_LEN;
use mqtt5_fuzz_transport::{FuzzConfig, FuzzError, FuzzMode, RunDriver, RunReport};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Args)]
pub struct RunCommand {
    /// Answer CONNECT, SUBSCRIBE, PUBREL and PINGREQ with synthetic replies
    #[arg(long)]
    pub autopilot: bool,

    /// Broker profile: handshake, connected, subscribe, qos, mqtt5, dynamic
    #[arg(long, short, value_parser = parse_mode)]
    pub mode: Option<FuzzMode>,

    /// Maximum bytes returned per read (0 or negative disables the cap)
    #[arg(long, allow_negative_numbers = true)]
    pub frag: Option<i32>,

    /// Client steps per input
    #[arg(long)]
    pub steps: Option<usize>,

    /// JSON file with a base configuration; flags override it
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Inputs are truncated to this many bytes
    #[arg(long, default_value_t = MAX_INPUT_LEN)]
    pub max_input: usize,

    /// Print each run report as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Input files; none or `-` reads stdin once
    pub inputs: Vec<PathBuf>,
}

fn parse_mode(s: &str) -> Result<FuzzMode, String> {
    s.parse().map_err(|e: FuzzError| e.to_string())
}

pub fn execute(cmd: &RunCommand) -> Result<()> {
    let config = build_config(cmd)?;
    debug!(?config, "Effective run configuration");
    let driver = RunDriver::new(config);

    let inputs = if cmd.inputs.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        cmd.inputs.clone()
    };

    let mut stdin_used = false;
    for path in &inputs {
        let is_stdin = path.as_os_str() == "-";
        if is_stdin && stdin_used {
            warn!("stdin given more than once, skipping");
            continue;
        }
        stdin_used |= is_stdin;

        let data = read_input(path, cmd.max_input)?;
        let report = driver
            .run_reference(data)
            .with_context(|| format!("Run failed for {}", path.display()))?;
        print_report(path, &report, cmd.json)?;
    }
    Ok(())
}

pub fn build_config(cmd: &RunCommand) -> Result<FuzzConfig> {
    let mut config = match &cmd.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            FuzzConfig::from_json(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => FuzzConfig::default(),
    };

    if cmd.autopilot {
        config = config.with_autopilot(true);
    }
    if let Some(mode) = cmd.mode {
        config = config.with_mode(mode);
    }
    if let Some(frag) = cmd.frag {
        config = config.with_fragment_cap(frag.max(0));
    }
    if let Some(steps) = cmd.steps {
        config = config.with_step_count(steps);
    }
    if cmd.max_input == 0 {
        bail!("--max-input must be at least 1");
    }

    config.validate()?;
    Ok(config)
}

fn read_input(path: &Path, max_input: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    if path.as_os_str() == "-" {
        io::stdin()
            .lock()
            .read_to_end(&mut data)
            .context("Failed to read input from stdin")?;
    } else {
        data = std::fs::read(path)
            .with_context(|| format!("Failed to read input {}", path.display()))?;
    }

    if data.len() > max_input {
        debug!(len = data.len(), max_input, "Truncating input");
        data.truncate(max_input);
    }
    Ok(data)
}

fn print_report(path: &Path, report: &RunReport, json: bool) -> Result<()> {
    info!(
        input = %path.display(),
        mode = %report.effective_mode,
        steps = report.steps,
        errors = report.outcome.errors,
        "Input processed"
    );

    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!(
            "{}: {} bytes, mode {}, {} frames, {} packets sent, {} replies, {} session errors",
            path.display(),
            report.input_len,
            report.effective_mode,
            report.outcome.frames_handled,
            report.outcome.packets_sent,
            report.transport.replies,
            report.outcome.errors,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunCommand,
    }

    fn parse(args: &[&str]) -> RunCommand {
        let mut argv = vec!["mqtt5-fuzz"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().run
    }

    #[test]
    fn test_defaults() {
        let config = build_config(&parse(&[])).unwrap();
        assert_eq!(config, FuzzConfig::default());
    }

    #[test]
    fn test_negative_frag_clamped() {
        let config = build_config(&parse(&["--frag", "-3"])).unwrap();
        assert_eq!(config.fragment_cap, 0);
        assert!(config.fragment_limit().is_none());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(TestCli::try_parse_from(["mqtt5-fuzz", "--mode", "bogus"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"autopilot": true, "mode": "qos", "fragment_cap": 4}"#).unwrap();

        let cmd = parse(&["--config", path.to_str().unwrap(), "--mode", "MQTT5"]);
        let config = build_config(&cmd).unwrap();
        assert!(config.autopilot);
        assert_eq!(config.mode, FuzzMode::Mqtt5);
        assert_eq!(config.fragment_cap, 4);
    }

    #[test]
    fn test_zero_steps_rejected() {
        assert!(build_config(&parse(&["--steps", "0"])).is_err());
    }

    #[test]
    fn test_read_input_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        std::fs::write(&path, vec![0xAB; 100]).unwrap();

        assert_eq!(read_input(&path, 10).unwrap().len(), 10);
        assert_eq!(read_input(&path, 1000).unwrap().len(), 100);
    }

    #[test]
    fn test_execute_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connack.bin");
        std::fs::write(&path, [0x01, 0x10, 0x00]).unwrap();

        let mut cmd = parse(&["--autopilot", "--mode", "dynamic", "--steps", "16"]);
        cmd.inputs = vec![path];
        execute(&cmd).unwrap();
    }
}
