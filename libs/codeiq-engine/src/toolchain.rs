// Toolchain configuration for the language runners
//
// Built-in defaults cover every language; an optional languages.json
// overrides them per language.

use crate::process::CommandSpec;
use anyhow::{bail, Context, Result};
use codeiq_common::types::LanguageKind;
use codeiq_common::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A command line with `{placeholder}` arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn render(&self, vars: &Placeholders) -> CommandSpec {
        CommandSpec::new(
            vars.apply(&self.command),
            self.args.iter().map(|a| vars.apply(a)).collect(),
        )
    }
}

/// Values substituted into command templates
///
/// Known keys: `source`, `artifact`, `dir`, `class`, `harness`,
/// `time_limit_ms`. Unknown placeholders are left untouched.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: Vec<(&'static str, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.push((key, value.into()));
        self
    }

    pub fn set_path(self, key: &'static str, path: &Path) -> Self {
        self.set(key, path.to_string_lossy().into_owned())
    }

    fn apply(&self, template: &str) -> String {
        self.values
            .iter()
            .fold(template.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{}}}", key), value)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub name: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
    /// Treat any compiler stderr output, warnings included, as a failure
    #[serde(default)]
    pub strict_diagnostics: bool,
}

impl Toolchain {
    /// Built-in toolchain for a language
    pub fn builtin(language: Language) -> Self {
        match language {
            Language::Cpp => Toolchain {
                name: language,
                compile: Some(CommandTemplate::new("g++", &["{source}", "-o", "{artifact}"])),
                run: CommandTemplate::new("{artifact}", &[]),
                strict_diagnostics: true,
            },
            Language::Java => Toolchain {
                name: language,
                compile: Some(CommandTemplate::new("javac", &["-d", "{dir}", "{source}"])),
                run: CommandTemplate::new("java", &["-cp", "{dir}", "{class}"]),
                strict_diagnostics: false,
            },
            Language::Python => Toolchain {
                name: language,
                compile: None,
                run: CommandTemplate::new("python3", &["{source}"]),
                strict_diagnostics: false,
            },
            Language::JavaScript => Toolchain {
                name: language,
                compile: None,
                run: CommandTemplate::new("node", &["-e", "{harness}", "{time_limit_ms}"]),
                strict_diagnostics: false,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<Toolchain>,
}

/// Toolchain registry, always complete for every `Language`
#[derive(Debug, Clone)]
pub struct Toolchains {
    configs: HashMap<Language, Toolchain>,
}

impl Toolchains {
    pub fn builtin() -> Self {
        let configs = Language::all_variants()
            .iter()
            .map(|lang| (*lang, Toolchain::builtin(*lang)))
            .collect();
        Self { configs }
    }

    /// Load overrides from a languages.json on top of the built-ins
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path).context("Failed to read languages.json")?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;

        let mut toolchains = Self::builtin();
        for toolchain in languages_json.languages {
            let needs_compiler = matches!(
                toolchain.name.kind(),
                LanguageKind::NativeCompiled | LanguageKind::Managed
            );
            if needs_compiler && toolchain.compile.is_none() {
                bail!("Language '{}' requires a compile command", toolchain.name);
            }
            toolchains.configs.insert(toolchain.name, toolchain);
        }
        Ok(toolchains)
    }

    pub fn get(&self, language: Language) -> &Toolchain {
        // builtin() seeds every language and overrides only replace entries
        &self.configs[&language]
    }

    /// List all configured languages in declaration order
    pub fn list_languages(&self) -> Vec<Language> {
        Language::all_variants()
            .iter()
            .copied()
            .filter(|lang| self.configs.contains_key(lang))
            .collect()
    }
}

impl Default for Toolchains {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_language() {
        let toolchains = Toolchains::builtin();
        assert_eq!(toolchains.list_languages(), Language::all_variants().to_vec());
        assert!(toolchains.get(Language::Cpp).strict_diagnostics);
        assert!(toolchains.get(Language::Java).compile.is_some());
        assert!(toolchains.get(Language::Python).compile.is_none());
    }

    #[test]
    fn test_render_placeholders() {
        let template = CommandTemplate::new("g++", &["{source}", "-o", "{artifact}", "-O{level}"]);
        let vars = Placeholders::new()
            .set("source", "/s/a.cpp")
            .set("artifact", "/s/a.out");
        let cmd = template.render(&vars);
        assert_eq!(cmd.program, "g++");
        assert_eq!(cmd.args, vec!["/s/a.cpp", "-o", "/s/a.out", "-O{level}"]);
    }

    #[test]
    fn test_render_placeholder_in_program() {
        let template = CommandTemplate::new("{artifact}", &[]);
        let cmd = template.render(&Placeholders::new().set_path("artifact", Path::new("/s/x.out")));
        assert_eq!(cmd.program, "/s/x.out");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_json_overrides_one_language() {
        let toolchains = Toolchains::from_json(
            r#"{"languages": [
                {"name": "py", "run": {"command": "pypy3", "args": ["{source}"]}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(toolchains.get(Language::Python).run.command, "pypy3");
        assert_eq!(toolchains.get(Language::Cpp), &Toolchain::builtin(Language::Cpp));
    }

    #[test]
    fn test_json_compiled_language_requires_compiler() {
        let err = Toolchains::from_json(
            r#"{"languages": [{"name": "cpp", "run": {"command": "{artifact}"}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a compile command"));
    }

    #[test]
    fn test_json_unknown_language_rejected() {
        assert!(Toolchains::from_json(
            r#"{"languages": [{"name": "ruby", "run": {"command": "ruby"}}]}"#
        )
        .is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Toolchains::load(Path::new("/nonexistent/languages.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("languages.json");
        std::fs::write(
            &path,
            r#"{"languages": [{"name": "cpp",
                "compile": {"command": "clang++", "args": ["{source}", "-o", "{artifact}"]},
                "run": {"command": "{artifact}"},
                "strict_diagnostics": false}]}"#,
        )
        .unwrap();

        let toolchains = Toolchains::load(&path).unwrap();
        let cpp = toolchains.get(Language::Cpp);
        assert_eq!(cpp.compile.as_ref().unwrap().command, "clang++");
        assert!(!cpp.strict_diagnostics);
    }
}
