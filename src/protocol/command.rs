//! Console commands understood by the device.
//!
//! Every command is a single line of ASCII text. Verbs are sent as-is; the
//! device's replies are not interpreted here.

use std::fmt;

/// Sentinel closing an upload or write body.
pub const END_SENTINEL: &str = "END";

/// Default path for directory listings.
pub const ROOT_PATH: &str = "/";

/// Default monitor type.
pub const DEFAULT_MONITOR: &str = "mem";

/// Verbs offered for tab completion, in the order the device lists them.
pub const COMMAND_VERBS: &[&str] = &[
    "/help", "/stats", "/info", "/write", "/config", "/ls", "/cat", "/rm", "/load", "/wget",
    "/ping", "/backup", "/monitor", "/reboot",
];

/// A device console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand<'a> {
    /// Start a line-by-line script write (`/write <name>`).
    Write { name: &'a str },
    /// Start an upload (`/upload <name> [base64]`).
    Upload { name: &'a str, base64: bool },
    /// Close an upload or write body.
    End,
    /// List a directory.
    List { path: &'a str },
    /// Print a file.
    Cat { path: &'a str },
    /// Remove a file.
    Remove { path: &'a str },
    /// Print runtime statistics.
    Stats,
    /// Print device information.
    Info,
    /// Print the command help.
    Help,
    /// Read a configuration key.
    ConfigGet { key: &'a str },
    /// Write a configuration key. The value is quoted on the wire.
    ConfigSet { key: &'a str, value: &'a str },
    /// Download a URL onto the device.
    Wget {
        url: &'a str,
        name: Option<&'a str>,
    },
    /// Ping a host from the device.
    Ping { host: &'a str },
    /// Run a backup action.
    Backup {
        action: &'a str,
        name: Option<&'a str>,
    },
    /// Start a monitor.
    Monitor { kind: &'a str },
    /// Load and run a script.
    Load { name: &'a str },
    /// Reboot the device.
    Reboot,
}

impl DeviceCommand<'_> {
    /// Renders the command line (without terminator).
    #[must_use]
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

/// Quotes a config value, escaping embedded double quotes.
///
/// Values may contain characters such as `#$%&` that the device's argument
/// splitter would otherwise mangle.
#[must_use]
pub fn quote_value(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

impl fmt::Display for DeviceCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write { name } => write!(f, "/write {name}"),
            Self::Upload { name, base64 } => {
                if *base64 {
                    write!(f, "/upload {name} base64")
                } else {
                    write!(f, "/upload {name}")
                }
            }
            Self::End => f.write_str(END_SENTINEL),
            Self::List { path } => write!(f, "/ls {path}"),
            Self::Cat { path } => write!(f, "/cat {path}"),
            Self::Remove { path } => write!(f, "/rm {path}"),
            Self::Stats => f.write_str("/stats"),
            Self::Info => f.write_str("/info"),
            Self::Help => f.write_str("/help"),
            Self::ConfigGet { key } => write!(f, "/config get {key}"),
            Self::ConfigSet { key, value } => {
                write!(f, "/config set {key} {}", quote_value(value))
            }
            Self::Wget { url, name } => match name {
                Some(name) if !name.is_empty() => write!(f, "/wget {url} {name}"),
                _ => write!(f, "/wget {url}"),
            },
            Self::Ping { host } => write!(f, "/ping {host}"),
            Self::Backup { action, name } => match name {
                Some(name) if !name.is_empty() => write!(f, "/backup {action} {name}"),
                _ => write!(f, "/backup {action}"),
            },
            Self::Monitor { kind } => write!(f, "/monitor {kind}"),
            Self::Load { name } => write!(f, "/load {name}"),
            Self::Reboot => f.write_str("/reboot"),
        }
    }
}

/// Returns the known verbs starting with `prefix` (case-insensitive).
#[must_use]
pub fn completions(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.to_ascii_lowercase();
    COMMAND_VERBS
        .iter()
        .copied()
        .filter(|verb| verb.starts_with(&prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_lines() {
        let text = DeviceCommand::Upload {
            name: "index.html",
            base64: false,
        };
        assert_eq!(text.to_line(), "/upload index.html");

        let binary = DeviceCommand::Upload {
            name: "logo.png",
            base64: true,
        };
        assert_eq!(binary.to_line(), "/upload logo.png base64");
        assert_eq!(DeviceCommand::End.to_line(), "END");
    }

    #[test]
    fn test_optional_arguments() {
        let wget = DeviceCommand::Wget {
            url: "http://example.com/a.js",
            name: None,
        };
        assert_eq!(wget.to_line(), "/wget http://example.com/a.js");

        let wget = DeviceCommand::Wget {
            url: "http://example.com/a.js",
            name: Some("b.js"),
        };
        assert_eq!(wget.to_line(), "/wget http://example.com/a.js b.js");

        let backup = DeviceCommand::Backup {
            action: "list",
            name: Some(""),
        };
        assert_eq!(backup.to_line(), "/backup list");

        let backup = DeviceCommand::Backup {
            action: "save",
            name: Some("nightly"),
        };
        assert_eq!(backup.to_line(), "/backup save nightly");
    }

    #[test]
    fn test_config_set_quotes_value() {
        let cmd = DeviceCommand::ConfigSet {
            key: "wifi.pass",
            value: r#"p#ss "word"&"#,
        };
        assert_eq!(cmd.to_line(), r#"/config set wifi.pass "p#ss \"word\"&""#);

        let cmd = DeviceCommand::ConfigGet { key: "wifi.ssid" };
        assert_eq!(cmd.to_line(), "/config get wifi.ssid");
    }

    #[test]
    fn test_simple_verbs() {
        assert_eq!(DeviceCommand::List { path: "/" }.to_line(), "/ls /");
        assert_eq!(DeviceCommand::Cat { path: "/a.js" }.to_line(), "/cat /a.js");
        assert_eq!(DeviceCommand::Remove { path: "a.js" }.to_line(), "/rm a.js");
        assert_eq!(DeviceCommand::Monitor { kind: "cpu" }.to_line(), "/monitor cpu");
        assert_eq!(DeviceCommand::Reboot.to_line(), "/reboot");
    }

    #[test]
    fn test_completions() {
        assert_eq!(completions("/re"), vec!["/reboot"]);
        assert_eq!(completions("/C"), vec!["/config", "/cat"]);
        assert_eq!(completions("").len(), COMMAND_VERBS.len());
        assert!(completions("/zz").is_empty());
    }
}
