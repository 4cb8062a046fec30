/// Heuristic risk analysis for found directories.
///
/// A `node_modules` inside a hidden folder in the home directory is most
/// likely shipped with a desktop application (editors, chat clients) rather
/// than a project the user owns. Deleting it breaks that application until
/// its dependencies are reinstalled. The same holds for macOS `.app` bundles
/// and the Windows `AppData` / `Program Files` trees.
///
/// Matching is done on a normalised form of the path: forward slashes,
/// lowercase, made absolute against the working directory.
use serde::Serialize;
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub is_sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl RiskAnalysis {
    const SAFE: Self = Self {
        is_sensitive: false,
        reason: None,
    };

    fn sensitive(reason: &'static str) -> Self {
        Self {
            is_sensitive: true,
            reason: Some(reason),
        }
    }
}

/// Hidden top-level folders in home that hold package-manager caches only.
const HOME_ALLOWED_HIDDEN: [&str; 2] = [".npm", ".pnpm"];

pub fn analyze_risk(path: &Path, home: Option<&Path>) -> RiskAnalysis {
    let original = normalize(&path.to_string_lossy());
    let is_unc = original.starts_with("//");
    let absolute = if is_unc || path.is_absolute() {
        original.clone()
    } else {
        env::current_dir()
            .map(|cwd| normalize(&cwd.join(path).to_string_lossy()))
            .unwrap_or_else(|_| original.clone())
    };

    if let Some(home) = home.map(|h| normalize(&h.to_string_lossy())) {
        let home = home.trim_end_matches('/');
        if !home.is_empty() {
            if let Some(analysis) = analyze_in_home(&absolute, home) {
                return analysis;
            }
        }
    }

    if in_macos_app_bundle(&absolute) {
        return RiskAnalysis::sensitive("Inside macOS .app package");
    }

    if is_unc && original.split('/').any(is_hidden_segment) {
        return RiskAnalysis::sensitive("Hidden path in network share");
    }

    if absolute.contains("/appdata/roaming") {
        return RiskAnalysis::sensitive("Inside Windows AppData Roaming folder");
    }
    if absolute.contains("/appdata/local") {
        let cache_like = absolute
            .split('/')
            .any(|segment| matches!(segment, ".cache" | ".npm" | ".pnpm"));
        if cache_like {
            return RiskAnalysis::SAFE;
        }
        return RiskAnalysis::sensitive("Inside Windows AppData Local folder");
    }
    if absolute.contains("program files/") || absolute.contains("program files (x86)/") {
        return RiskAnalysis::sensitive("Inside Program Files folder");
    }

    RiskAnalysis::SAFE
}

/// `Some` when the home rules alone decide the outcome.
fn analyze_in_home(path: &str, home: &str) -> Option<RiskAnalysis> {
    let rel = if path == home {
        ""
    } else {
        path.strip_prefix(home)?.strip_prefix('/')?
    };

    let under = |dir: &str| rel == dir || rel.starts_with(&format!("{dir}/"));
    if under(".config") {
        return Some(RiskAnalysis::sensitive(
            "Contains user configuration data (~/.config)",
        ));
    }
    if under(".local/share") {
        return Some(RiskAnalysis::sensitive("User data folder (~/.local/share)"));
    }
    if under(".cache") {
        return Some(RiskAnalysis::sensitive(
            "System-wide cache directory (~/.cache)",
        ));
    }

    let top_level = rel.split('/').next().unwrap_or_default();
    if HOME_ALLOWED_HIDDEN.contains(&top_level) {
        return Some(RiskAnalysis::SAFE);
    }
    if top_level.starts_with('.') && top_level != "." && top_level != ".." {
        return Some(RiskAnalysis::sensitive("Contains unsafe hidden folder"));
    }
    None
}

/// `/applications/<name>.app/` anywhere in the path.
fn in_macos_app_bundle(path: &str) -> bool {
    path.match_indices("/applications/").any(|(start, marker)| {
        let rest = &path[start + marker.len()..];
        match rest.split_once('/') {
            Some((bundle, _)) => bundle.len() > ".app".len() && bundle.ends_with(".app"),
            None => false,
        }
    })
}

fn is_hidden_segment(segment: &str) -> bool {
    segment.len() > 1 && segment.starts_with('.')
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "/home/user";

    fn risk(path: &str) -> RiskAnalysis {
        analyze_risk(Path::new(path), Some(Path::new(HOME)))
    }

    #[test]
    fn test_regular_project_is_safe() {
        assert_eq!(risk("/home/user/projects/app/node_modules"), RiskAnalysis::SAFE);
        assert_eq!(risk("/srv/www/node_modules"), RiskAnalysis::SAFE);
    }

    #[test]
    fn test_home_config_locations() {
        let r = risk("/home/user/.config/code/node_modules");
        assert!(r.is_sensitive);
        assert_eq!(r.reason, Some("Contains user configuration data (~/.config)"));

        assert_eq!(
            risk("/home/user/.local/share/app/node_modules").reason,
            Some("User data folder (~/.local/share)")
        );
        assert_eq!(
            risk("/home/user/.cache/node_modules").reason,
            Some("System-wide cache directory (~/.cache)")
        );
    }

    #[test]
    fn test_hidden_top_level_home_folders() {
        assert_eq!(
            risk("/home/user/.vscode/extensions/x/node_modules").reason,
            Some("Contains unsafe hidden folder")
        );
        assert!(!risk("/home/user/.npm/_npx/abc/node_modules").is_sensitive);
        assert!(!risk("/home/user/.pnpm/store/node_modules").is_sensitive);
        // Only the first segment under home counts.
        assert!(!risk("/home/user/projects/.hidden/node_modules").is_sensitive);
    }

    #[test]
    fn test_home_prefix_needs_segment_boundary() {
        // "/home/username" is not inside "/home/user".
        assert!(!risk("/home/username/.vscode/node_modules").is_sensitive);
    }

    #[test]
    fn test_macos_app_bundle() {
        let r = risk("/Applications/Slack.app/Contents/Resources/node_modules");
        assert_eq!(r.reason, Some("Inside macOS .app package"));
        assert!(!risk("/Applications/.app").is_sensitive);
        assert!(!risk("/applications/notes/node_modules").is_sensitive);
    }

    #[test]
    fn test_windows_locations() {
        let home = Some(Path::new(r"C:\Users\me"));
        let roaming =
            analyze_risk(Path::new(r"C:\Users\me\AppData\Roaming\npm\node_modules"), home);
        assert_eq!(roaming.reason, Some("Inside Windows AppData Roaming folder"));

        let local = analyze_risk(
            Path::new(r"C:\Users\me\AppData\Local\Programs\app\node_modules"),
            home,
        );
        assert_eq!(local.reason, Some("Inside Windows AppData Local folder"));

        let cache = analyze_risk(
            Path::new(r"C:\Users\me\AppData\Local\.cache\node_modules"),
            home,
        );
        assert!(!cache.is_sensitive);

        let program_files = analyze_risk(
            Path::new(r"C:\Program Files (x86)\Tool\node_modules"),
            home,
        );
        assert_eq!(program_files.reason, Some("Inside Program Files folder"));
    }

    #[test]
    fn test_unc_hidden_path() {
        let r = analyze_risk(Path::new(r"\\server\share\.tools\node_modules"), None);
        assert_eq!(r.reason, Some("Hidden path in network share"));
        let r = analyze_risk(Path::new(r"\\server\share\tools\node_modules"), None);
        assert!(!r.is_sensitive);
    }

    #[test]
    fn test_no_home_skips_home_rules() {
        let r = analyze_risk(Path::new("/home/user/.config/node_modules"), None);
        assert!(!r.is_sensitive);
    }
}
