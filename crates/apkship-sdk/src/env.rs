//! Environment probes.
//!
//! Reports whether the toolchain a gradle build depends on is present.
//! Probes only check status; nothing is installed or modified.

use std::process::Command;

use serde::{Deserialize, Serialize};

/// Result of one toolchain probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvCheck {
    pub tool: String,
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// Runs every probe. A failing probe is a report row, not an error.
pub fn check_env() -> Vec<EnvCheck> {
    vec![check_java(), check_java_home(), check_adb()]
}

fn probe(cmd: &str, args: &[&str]) -> (bool, String) {
    match Command::new(cmd).args(args).output() {
        Ok(output) => {
            // java -version writes to stderr; prefer whichever stream
            // has content.
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let text = if stdout.is_empty() { stderr } else { stdout };
            (output.status.success(), text)
        }
        Err(err) => (false, err.to_string()),
    }
}

fn check_java() -> EnvCheck {
    let (ok, detail) = probe("java", &["-version"]);
    EnvCheck {
        tool: "Java (JDK)".to_string(),
        ok,
        message: if ok {
            "JDK detected".to_string()
        } else {
            "JDK not found; install JDK 17+".to_string()
        },
        detail: first_line(detail),
    }
}

fn check_java_home() -> EnvCheck {
    match std::env::var("JAVA_HOME") {
        Ok(value) if !value.is_empty() => EnvCheck {
            tool: "JAVA_HOME".to_string(),
            ok: true,
            message: format!("JAVA_HOME: {value}"),
            detail: None,
        },
        _ => EnvCheck {
            tool: "JAVA_HOME".to_string(),
            ok: false,
            message: "JAVA_HOME not set".to_string(),
            detail: None,
        },
    }
}

fn check_adb() -> EnvCheck {
    let (ok, detail) = probe("adb", &["version"]);
    EnvCheck {
        tool: "adb".to_string(),
        ok,
        message: if ok {
            "Android platform tools detected".to_string()
        } else {
            "adb not found; install Android platform tools".to_string()
        },
        detail: first_line(detail),
    }
}

fn first_line(text: String) -> Option<String> {
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}
