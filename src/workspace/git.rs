use std::path::Path;

use git2::{
    build::RepoBuilder, Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature,
};

use crate::error::{AppError, Result};

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

/// Build `FetchOptions` that authenticate via credential callback.
/// The token is captured by the closure and never written to disk.
fn make_fetch_options(token: &str) -> FetchOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks);
    opts
}

/// Build `PushOptions` that authenticate via credential callback.
///
/// libgit2 reports a ref the server refused through a callback rather than an
/// error, so the callback turns refusals into errors.
fn make_push_options(token: &str) -> PushOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    callbacks.push_update_reference(|refname, status| match status {
        Some(message) => Err(git2::Error::from_str(&format!(
            "remote rejected {refname}: {message}"
        ))),
        None => Ok(()),
    });
    let mut opts = PushOptions::new();
    opts.remote_callbacks(callbacks);
    opts
}

/// Clone a repository into the target directory.
///
/// The remote URL stored in `.git/config` will be the **plain** URL
/// (no credentials). Authentication is handled via credential callback only.
pub async fn clone(url: &str, target: &Path, token: &str) -> Result<()> {
    if !url.starts_with("https://") {
        return Err(AppError::Git(format!(
            "Expected HTTPS clone URL, got: {url}"
        )));
    }

    let url = url.to_string();
    let target = target.to_path_buf();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let fetch_opts = make_fetch_options(&token);
        RepoBuilder::new()
            .fetch_options(fetch_opts)
            .clone(&url, &target)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Clone task panicked: {e}")))?
}

/// Create `branch_name` at HEAD, resetting it if it already exists, and
/// check it out.
pub async fn create_or_reset_branch(dir: &Path, branch_name: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let commit = repo.head()?.peel_to_commit()?;
        // libgit2 refuses to force-update the branch HEAD points at.
        repo.set_head_detached(commit.id())?;
        repo.branch(&branch_name, &commit, true)?;
        let obj = repo.revparse_single(&format!("refs/heads/{branch_name}"))?;
        repo.checkout_tree(&obj, None)?;
        repo.set_head(&format!("refs/heads/{branch_name}"))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Create-branch task panicked: {e}")))?
}

/// Stage a single file, given relative to the repository root.
pub async fn stage_file(dir: &Path, relative_path: &Path) -> Result<()> {
    let dir = dir.to_path_buf();
    let relative_path = relative_path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut index = repo.index()?;
        index.add_path(&relative_path)?;
        index.write()?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Stage task panicked: {e}")))?
}

/// Commit the index on top of HEAD and return the new commit id.
pub async fn commit(
    dir: &Path,
    message: &str,
    author_name: &str,
    author_email: &str,
) -> Result<String> {
    let dir = dir.to_path_buf();
    let message = message.to_string();
    let author_name = author_name.to_string();
    let author_email = author_email.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let sig = Signature::now(&author_name, &author_email)?;
        let mut index = repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let parent = repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_oid {
            return Err(AppError::Git("Nothing to commit: tree is unchanged".to_string()));
        }
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?;
        Ok(oid.to_string())
    })
    .await
    .map_err(|e| AppError::Git(format!("Commit task panicked: {e}")))?
}

/// Push `branch_name` to origin and record origin as its upstream.
///
/// With `force` the refspec is prefixed with `+` so an existing remote branch
/// is overwritten.
pub async fn push(dir: &Path, branch_name: &str, token: &str, force: bool) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.find_remote("origin")?;
        let prefix = if force { "+" } else { "" };
        let refspec = format!("{prefix}refs/heads/{branch_name}:refs/heads/{branch_name}");
        let mut push_opts = make_push_options(&token);
        remote.push(&[&refspec], Some(&mut push_opts))?;

        let mut config = repo.config()?;
        config.set_str(&format!("branch.{branch_name}.remote"), "origin")?;
        config.set_str(
            &format!("branch.{branch_name}.merge"),
            &format!("refs/heads/{branch_name}"),
        )?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Push task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// A repository with one commit containing `README.md`.
    fn seeded_repo(path: &Path) -> Repository {
        let repo = Repository::init(path).unwrap();
        fs::write(path.join("README.md"), "hello\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("README.md")).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_validate_branch_name_rejects_dash_prefix() {
        assert!(validate_branch_name("-evil").is_err());
        assert!(validate_branch_name("--upload-pack").is_err());
    }

    #[test]
    fn test_validate_branch_name_accepts_normal() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("actions-medic/fix-20261016T080000Z").is_ok());
    }

    #[tokio::test]
    async fn test_clone_rejects_non_https() {
        let result = clone(
            "git@github.com:owner/repo.git",
            Path::new("/tmp/test"),
            "token",
        )
        .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Expected HTTPS clone URL"));
    }

    #[tokio::test]
    async fn test_create_or_reset_branch_checks_out() {
        let tmp = tempfile::tempdir().unwrap();
        seeded_repo(tmp.path());

        create_or_reset_branch(tmp.path(), "fix").await.unwrap();
        // A second call resets instead of failing on the existing branch.
        create_or_reset_branch(tmp.path(), "fix").await.unwrap();

        let repo = Repository::open(tmp.path()).unwrap();
        assert_eq!(repo.head().unwrap().shorthand(), Some("fix"));
    }

    #[tokio::test]
    async fn test_commit_requires_a_change() {
        let tmp = tempfile::tempdir().unwrap();
        seeded_repo(tmp.path());

        let err = commit(tmp.path(), "noop", "Bot", "bot@example.com")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to commit"));
    }

    #[tokio::test]
    async fn test_stage_commit_push_to_local_remote() {
        let remote_dir = tempfile::tempdir().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();

        let work_dir = tempfile::tempdir().unwrap();
        let repo = seeded_repo(work_dir.path());
        repo.remote("origin", remote_dir.path().to_str().unwrap())
            .unwrap();

        create_or_reset_branch(work_dir.path(), "actions-medic/fix-1")
            .await
            .unwrap();
        let workflow = work_dir.path().join(".github/workflows/ci.yml");
        fs::create_dir_all(workflow.parent().unwrap()).unwrap();
        fs::write(&workflow, "key: corrected\n").unwrap();

        stage_file(work_dir.path(), Path::new(".github/workflows/ci.yml"))
            .await
            .unwrap();
        let oid = commit(work_dir.path(), "fix: patch", "Bot", "bot@example.com")
            .await
            .unwrap();
        push(work_dir.path(), "actions-medic/fix-1", "unused", false)
            .await
            .unwrap();

        let remote = Repository::open_bare(remote_dir.path()).unwrap();
        let pushed = remote
            .find_reference("refs/heads/actions-medic/fix-1")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        assert_eq!(pushed.id().to_string(), oid);
        assert_eq!(pushed.message(), Some("fix: patch"));

        let mut config = Repository::open(work_dir.path()).unwrap().config().unwrap();
        let snapshot = config.snapshot().unwrap();
        assert_eq!(
            snapshot.get_str("branch.actions-medic/fix-1.merge").unwrap(),
            "refs/heads/actions-medic/fix-1"
        );
    }
}
