//! Terminal vs plain-text detection

use std::io::IsTerminal;

/// Variables set by the CI systems builds usually run under
const CI_VARS: [&str; 6] = ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE", "JENKINS_URL", "TF_BUILD"];

/// Whether output uses spinners and boxes or plain prefixed lines
#[derive(Debug, Clone)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Fancy output only on a terminal outside CI
    pub fn detect() -> Self {
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self::from_terminal(std::io::stdout().is_terminal(), ci)
    }

    pub fn non_interactive() -> Self {
        Self { fancy: false }
    }

    fn from_terminal(is_terminal: bool, ci: bool) -> Self {
        Self {
            fancy: is_terminal && !ci,
        }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_forces_plain_output() {
        assert!(UiContext::from_terminal(true, false).use_fancy_output());
        assert!(!UiContext::from_terminal(true, true).use_fancy_output());
        assert!(!UiContext::from_terminal(false, false).use_fancy_output());
        assert!(!UiContext::non_interactive().use_fancy_output());
    }
}
