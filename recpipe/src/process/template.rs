//! Command templates with `{placeholder}` substitution.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").unwrap())
}

/// A program plus its argument vector, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn from_argv(mut argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(Error::template("command line is empty"));
        }
        let program = argv.remove(0);
        Ok(Self {
            program,
            args: argv,
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Values for the placeholders of a [`CommandTemplate`].
#[derive(Debug, Clone, Default)]
pub struct TemplateVars(BTreeMap<&'static str, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn path(self, key: &'static str, value: &Path) -> Self {
        self.set(key, value.to_string_lossy())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// A command line with `{name}` placeholders.
///
/// The template is split into arguments first and placeholders are replaced
/// inside each argument afterwards, so a substituted value is never split
/// again and never re-scanned for placeholders. Unknown placeholders are left
/// as written.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    name: &'static str,
    template: String,
}

impl CommandTemplate {
    pub fn new(name: &'static str, template: impl Into<String>) -> Self {
        Self {
            name,
            template: template.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build the command line, prepending `priority_prefix` on Unix.
    pub fn render(&self, vars: &TemplateVars, priority_prefix: Option<&str>) -> Result<CommandLine> {
        let tokens = process_utils::split_command_line(&self.template)
            .map_err(|e| Error::template(format!("{}: {e}", self.name)))?;

        let argv = tokens
            .iter()
            .map(|token| substitute(token, vars))
            .collect::<Vec<_>>();

        let argv = process_utils::with_priority_prefix(priority_prefix, argv)?;
        CommandLine::from_argv(argv)
    }
}

fn substitute(token: &str, vars: &TemplateVars) -> String {
    placeholder_regex()
        .replace_all(token, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_with_spaces_stay_one_argument() {
        let template = CommandTemplate::new("t", "{ffmpeg} -y -i {input} out/{stem}.png");
        let vars = TemplateVars::new()
            .set("ffmpeg", "/opt/my tools/ffmpeg")
            .set("input", "/media/Evening News.ts")
            .set("stem", "Evening News");

        let cmd = template.render(&vars, None).unwrap();
        assert_eq!(cmd.program, "/opt/my tools/ffmpeg");
        assert_eq!(
            cmd.args,
            vec!["-y", "-i", "/media/Evening News.ts", "out/Evening News.png"]
        );
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let template = CommandTemplate::new("t", "tool {input}");
        let vars = TemplateVars::new()
            .set("input", "{output}")
            .set("output", "nope");
        let cmd = template.render(&vars, None).unwrap();
        assert_eq!(cmd.args, vec!["{output}"]);
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let template = CommandTemplate::new("t", "tool {nope} -vf 'scale=320:-2'");
        let cmd = template.render(&TemplateVars::new(), None).unwrap();
        assert_eq!(cmd.args, vec!["{nope}", "-vf", "scale=320:-2"]);
    }

    #[test]
    fn test_bad_template_is_an_error() {
        let template = CommandTemplate::new("broken", "tool 'unterminated");
        let err = template.render(&TemplateVars::new(), None).unwrap_err();
        assert!(matches!(err, Error::Template(msg) if msg.starts_with("broken")));
    }

    #[cfg(unix)]
    #[test]
    fn test_priority_prefix() {
        let template = CommandTemplate::new("t", "ffmpeg -y");
        let cmd = template
            .render(&TemplateVars::new(), Some("nice -n 10"))
            .unwrap();
        assert_eq!(cmd.program, "nice");
        assert_eq!(cmd.args, vec!["-n", "10", "ffmpeg", "-y"]);
    }

    #[test]
    fn test_display_quotes_spaces() {
        let cmd = CommandLine {
            program: "ffmpeg".to_string(),
            args: vec!["-i".to_string(), "a b.ts".to_string()],
        };
        assert_eq!(cmd.to_string(), r#"ffmpeg -i "a b.ts""#);
    }
}
