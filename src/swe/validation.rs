//! Validators for values interpolated into shell commands inside containers.

use anyhow::Result;

/// Validate a GitHub repository name (`owner/repo`).
///
/// Both parts must be non-empty, must not start with `.` or `-`, and may
/// only contain ASCII alphanumerics, `-`, `_` and `.`.
pub fn validate_repo_name(repo: &str) -> Result<()> {
    if repo.is_empty() {
        anyhow::bail!("repository name is empty");
    }
    if repo.len() > 256 {
        anyhow::bail!("repository name too long ({} chars, max 256)", repo.len());
    }
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("repository name must be in 'owner/repo' format, got '{}'", repo);
    }
    for part in &parts {
        if part.starts_with('.') || part.starts_with('-') {
            anyhow::bail!("repository name '{}': parts must not start with '.' or '-'", repo);
        }
        if let Some(ch) = part
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        {
            anyhow::bail!("invalid character '{}' in repository name '{}'", ch, repo);
        }
    }
    Ok(())
}

/// Validate a git ref (commit SHA or branch name).
///
/// Rejects refs starting with `-` (flag injection), `..` sequences, and any
/// character outside alphanumerics and `/ . - _ ~ ^`.
pub fn validate_git_ref(git_ref: &str) -> Result<()> {
    if git_ref.is_empty() {
        anyhow::bail!("git ref is empty");
    }
    if git_ref.len() > 256 {
        anyhow::bail!("git ref too long ({} chars, max 256)", git_ref.len());
    }
    if git_ref.starts_with('-') {
        anyhow::bail!("git ref '{}' must not start with '-'", git_ref);
    }
    if git_ref.contains("..") {
        anyhow::bail!("git ref '{}' must not contain '..'", git_ref);
    }
    if let Some(ch) = git_ref
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !"/.-_~^".contains(*c))
    {
        anyhow::bail!("invalid character '{}' in git ref '{}'", ch, git_ref);
    }
    Ok(())
}

/// Validate a relative file path written into `/repo` inside a container.
pub fn validate_file_path(path: &str) -> Result<()> {
    if path.is_empty() {
        anyhow::bail!("file path is empty");
    }
    if path.len() > 4096 {
        anyhow::bail!("file path too long ({} chars, max 4096)", path.len());
    }
    if path.starts_with('/') {
        anyhow::bail!("file path '{}' must be relative", path);
    }
    if path.contains("..") {
        anyhow::bail!("file path '{}' must not contain '..'", path);
    }
    if let Some(ch) = path.chars().find(|c| "'\"`$!&|;(){}<>\\\n\r\0".contains(*c)) {
        anyhow::bail!("invalid character {:?} in file path '{}'", ch, path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_valid() {
        assert!(validate_repo_name("owner/repo").is_ok());
        assert!(validate_repo_name("my-org/my_repo.rs").is_ok());
    }

    #[test]
    fn repo_name_invalid() {
        assert!(validate_repo_name("").is_err());
        assert!(validate_repo_name("noslash").is_err());
        assert!(validate_repo_name("/repo").is_err());
        assert!(validate_repo_name("owner/").is_err());
        assert!(validate_repo_name("a/b/c").is_err());
        assert!(validate_repo_name("owner/.hidden").is_err());
        assert!(validate_repo_name("owner/repo;rm -rf").is_err());
        assert!(validate_repo_name("owner/repo$(cmd)").is_err());
    }

    #[test]
    fn git_ref_valid() {
        assert!(validate_git_ref("abc123").is_ok());
        assert!(validate_git_ref("feature/branch-name").is_ok());
        assert!(validate_git_ref("HEAD~1").is_ok());
        assert!(validate_git_ref("HEAD^2").is_ok());
    }

    #[test]
    fn git_ref_invalid() {
        assert!(validate_git_ref("").is_err());
        assert!(validate_git_ref("-rf").is_err());
        assert!(validate_git_ref("a..b").is_err());
        assert!(validate_git_ref("ref;cmd").is_err());
        assert!(validate_git_ref("ref'quote").is_err());
    }

    #[test]
    fn file_path_valid() {
        assert!(validate_file_path("tests/test_foo.py").is_ok());
        assert!(validate_file_path("dir/sub dir/file.txt").is_ok());
    }

    #[test]
    fn file_path_invalid() {
        assert!(validate_file_path("").is_err());
        assert!(validate_file_path("/etc/passwd").is_err());
        assert!(validate_file_path("../etc/passwd").is_err());
        assert!(validate_file_path("file'name").is_err());
        assert!(validate_file_path("file$var").is_err());
        assert!(validate_file_path("file\0null").is_err());
    }
}
