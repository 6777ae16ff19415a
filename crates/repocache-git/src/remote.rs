//! Local layout for remote repositories.

use std::path::{Path, PathBuf};

use repocache_util::hash::url_key;

const SLUG_MAX: usize = 48;

/// Human-readable directory slug for a repository URL.
///
/// `https://github.com/dave/jsgo.git` becomes `github.com-dave-jsgo`.
pub fn slug(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let without_user = without_scheme
        .split_once('@')
        .map(|(_, rest)| rest)
        .unwrap_or(without_scheme);
    let trimmed = without_user
        .trim_end_matches('/')
        .trim_end_matches(".git");

    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_matches('-');
    let end = out
        .char_indices()
        .nth(SLUG_MAX)
        .map(|(i, _)| i)
        .unwrap_or(out.len());
    out[..end].trim_end_matches('-').to_string()
}

/// Directory under `root` holding everything cached for `url`:
///
/// - `repo/`: the clone that fetches update (never handed out)
/// - `trees/<head>/`: one checkout per fetched head, never modified once created
///
/// The slug keeps the layout browsable; the hash suffix keeps distinct URLs
/// with colliding slugs apart.
pub fn remote_dir(root: &Path, url: &str) -> PathBuf {
    let key = url_key(url);
    let slug = slug(url);
    if slug.is_empty() {
        root.join(&key[..12])
    } else {
        root.join(format!("{slug}-{}", &key[..12]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_scheme_and_suffix() {
        assert_eq!(slug("https://github.com/dave/jsgo.git"), "github.com-dave-jsgo");
        assert_eq!(slug("https://github.com/dave/jsgo/"), "github.com-dave-jsgo");
    }

    #[test]
    fn slug_handles_scp_style() {
        assert_eq!(slug("git@github.com:dave/jsgo.git"), "github.com-dave-jsgo");
    }

    #[test]
    fn slug_is_bounded() {
        let long = format!("https://example.com/{}", "a".repeat(200));
        assert!(slug(&long).len() <= SLUG_MAX);
    }

    #[test]
    fn remote_dirs_differ_per_url() {
        let root = Path::new("/cache");
        let a = remote_dir(root, "https://github.com/a/b");
        let b = remote_dir(root, "https://github.com/a/b.git");
        assert_ne!(a, b);
        assert!(a.starts_with(root));
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("github.com-a-b-"));
    }
}
