/*
 * This file is part of w83mon.
 *
 * Copyright (C) 2025 w83mon contributors
 *
 * w83mon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * w83mon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with w83mon. If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use serde_json::json;
use tracing::{debug, error};

use w83mon::config::{config_path, load_config};
use w83mon::logger;
use w83mon::monitor::Monitor;
use wm_core::{format_scaled, parse_scaled, Param};

const USAGE: &str = "\
Usage: w83mon [--config PATH] [--logging] <command>

Commands:
  read                       Print every chip's readings as JSON
  get CHIP PARAM             Print one parameter
  set CHIP PARAM VALUE...    Write one parameter (values in display units)
  params                     List parameters per chip
  help                       Show this message

Environment:
  W83MON_CONFIG              Config file (default /etc/w83mon/config.json)
  W83MON_LOG                 Log filter (default info)";

struct Args {
    config: Option<PathBuf>,
    logging: bool,
    command: Vec<String>,
}

fn parse_args(raw: &[String]) -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        logging: false,
        command: Vec::new(),
    };
    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--config" => {
                i += 1;
                let path = raw.get(i).ok_or_else(|| anyhow!("--config needs a path"))?;
                args.config = Some(PathBuf::from(path));
            }
            "--logging" => args.logging = true,
            _ => {
                args.command = raw[i..].to_vec();
                break;
            }
        }
        i += 1;
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    logger::init_tracing();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let command: Vec<&str> = args.command.iter().map(String::as_str).collect();
    if matches!(command.first(), None | Some(&"help") | Some(&"--help") | Some(&"-h")) {
        println!("{}", USAGE);
        return Ok(());
    }

    if args.logging {
        logger::init_logging();
        logger::log_event("startup", json!({ "args": raw }));
    }

    let path = args.config.unwrap_or_else(config_path);
    let cfg = load_config(&path).with_context(|| format!("loading {}", path.display()))?;

    // Hardware buses need raw port or i2c access
    let needs_root = cfg.chips.iter().any(|c| c.bus.is_hardware());
    // SAFETY: geteuid has no preconditions and cannot fail
    if needs_root && unsafe { libc::geteuid() } != 0 {
        eprintln!("Error: w83mon requires root privileges to access /dev/port and /dev/i2c-*.");
        eprintln!("Please run with: sudo w83mon {}", raw.join(" "));
        std::process::exit(1);
    }

    let monitor = Monitor::from_config(&cfg)?;
    for (name, reason) in monitor.failures() {
        error!("{}: {}", name, reason);
        if args.logging {
            logger::log_event("attach_failed", json!({ "chip": name, "error": reason }));
        }
    }
    debug!("{} chips attached", monitor.registry().len());

    let result = run_command(&monitor, &command, args.logging);
    if let Err(e) = &result {
        if args.logging {
            logger::log_event("command_failed", json!({ "error": e.to_string() }));
        }
    }
    result
}

fn run_command(monitor: &Monitor, command: &[&str], logging: bool) -> anyhow::Result<()> {
    match command {
        ["read"] => {
            let readings = monitor.read_all()?;
            println!("{}", serde_json::to_string_pretty(&readings)?);
        }
        ["get", chip, param] => {
            let parsed: Param = param.parse()?;
            let values = monitor.read(chip, param)?;
            let magnitude = parsed.info().magnitude;
            let shown: Vec<String> = values.iter().map(|v| format_scaled(*v, magnitude)).collect();
            println!("{}", shown.join(" "));
        }
        ["set", chip, param, values @ ..] if !values.is_empty() => {
            let parsed: Param = param.parse()?;
            let magnitude = parsed.info().magnitude;
            let scaled = values
                .iter()
                .map(|v| {
                    parse_scaled(v, magnitude)
                        .ok_or_else(|| anyhow!("invalid value '{}' for {} (up to {} decimals)", v, param, magnitude))
                })
                .collect::<anyhow::Result<Vec<i64>>>()?;
            monitor.write(chip, param, &scaled)?;
            if logging {
                logger::log_event("write", json!({ "chip": chip, "param": param, "values": scaled }));
            }
        }
        ["params"] => {
            println!("{}", serde_json::to_string_pretty(&monitor.list_params())?);
        }
        other => bail!("unknown command '{}'\n\n{}", other.join(" "), USAGE),
    }
    Ok(())
}
