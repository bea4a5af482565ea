//! Resolved action inputs.
//!
//! Every input can come from a command-line flag (local runs) or from the
//! runner's `INPUT_*` environment (action runs); flags win.

use codesec_core::workflow;

#[derive(Debug, Clone)]
pub struct Inputs {
    /// Phase selector: non-empty means analysis of that target, empty
    /// means display.
    pub target: Option<String>,
    /// Comma-separated tool list.
    pub tools: String,
    /// Compiled classes / jar for the SAST scan.
    pub classes: Option<String>,
    /// Source directory for the SAST scan.
    pub sources: Option<String>,
    /// Whether transitive dependencies are evaluated by the SCA scan.
    pub eval_indirect: bool,
    /// Repo-write credential; commenting and PR automation need it.
    pub token: Option<String>,
    /// Extra markdown appended to the findings comment.
    pub footer: Option<String>,
    /// Path to the scanner's fix-suggestions document.
    pub fix_suggestions: Option<String>,
    /// Scanner binary to invoke.
    pub scanner_path: String,
    /// Root directory of the filesystem artifact store.
    pub artifact_root: String,
}

impl Inputs {
    pub fn resolve(cli: &crate::Cli) -> Inputs {
        Inputs {
            target: cli.target.clone().or_else(|| workflow::get_input("target")),
            tools: cli
                .tools
                .clone()
                .unwrap_or_else(|| workflow::get_input_or("tools", "sca")),
            classes: cli
                .jar
                .clone()
                .or_else(|| workflow::get_input("jar"))
                .or_else(|| workflow::get_input("classpath"))
                .or_else(|| workflow::get_input("classes")),
            sources: cli.sources.clone().or_else(|| workflow::get_input("sources")),
            eval_indirect: cli
                .eval_indirect_dependencies
                .clone()
                .or_else(|| workflow::get_input("eval-indirect-dependencies"))
                .as_deref()
                != Some("false"),
            token: cli.token.clone().or_else(|| workflow::get_input("token")),
            footer: cli.footer.clone().or_else(|| workflow::get_input("footer")),
            fix_suggestions: cli
                .fix_suggestions
                .clone()
                .or_else(|| workflow::get_input("fix-suggestions")),
            scanner_path: cli
                .scanner_path
                .clone()
                .unwrap_or_else(|| workflow::get_input_or("scanner-path", "lacework")),
            artifact_root: cli
                .artifact_root
                .clone()
                .unwrap_or_else(|| workflow::get_input_or("artifact-root", ".codesec-artifacts")),
        }
    }

    /// Tool names recorded in telemetry.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_flags_win_and_defaults_apply() {
        let cli = crate::Cli::parse_from(["codesec-action", "--target", "new", "--tools", "sca,sast"]);
        let inputs = Inputs::resolve(&cli);
        assert_eq!(inputs.target.as_deref(), Some("new"));
        assert_eq!(inputs.tools, "sca,sast");
        assert_eq!(inputs.scanner_path, "lacework");
        assert_eq!(inputs.artifact_root, ".codesec-artifacts");
        assert!(inputs.eval_indirect);
        assert_eq!(inputs.tool_names(), vec!["sca", "sast"]);
    }

    #[test]
    fn test_eval_indirect_flag_disables_transitive_evaluation() {
        let cli = crate::Cli::parse_from([
            "codesec-action",
            "--eval-indirect-dependencies",
            "false",
        ]);
        assert!(!Inputs::resolve(&cli).eval_indirect);

        // Any value other than the literal "false" keeps it enabled.
        let cli = crate::Cli::parse_from([
            "codesec-action",
            "--eval-indirect-dependencies",
            "true",
        ]);
        assert!(Inputs::resolve(&cli).eval_indirect);
    }

    #[test]
    fn test_classpath_env_alias_feeds_classes() {
        std::env::set_var("INPUT_CLASSPATH", "build/libs/app.jar");
        let cli = crate::Cli::parse_from(["codesec-action"]);
        let inputs = Inputs::resolve(&cli);
        assert_eq!(inputs.classes.as_deref(), Some("build/libs/app.jar"));
        std::env::remove_var("INPUT_CLASSPATH");
    }
}
