use crate::cancel::CancellationToken;
use crate::git::address::{is_http_url, Address};
use git2::{Cred, CredentialType, RemoteCallbacks};
use std::path::PathBuf;

enum Candidate {
    Agent,
    KeyFile(PathBuf),
}

fn ssh_candidates() -> Vec<Candidate> {
    let mut candidates = vec![Candidate::Agent];
    if let Some(home) = dirs::home_dir() {
        for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
            let path = home.join(".ssh").join(key);
            if path.exists() {
                candidates.push(Candidate::KeyFile(path));
            }
        }
    }
    candidates
}

/// Remote callbacks carrying credentials and cancellation for a remote URL.
///
/// SSH remotes try the SSH agent first (user taken from the address), then the
/// usual key files under `~/.ssh/`. libgit2 calls back again after each rejected
/// credential, so every candidate is offered once. HTTP remotes go through the
/// configured git credential helper.
pub(crate) fn remote_callbacks<'a>(url: &str, cancel: &'a CancellationToken) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();

    let address_user = if is_http_url(url) {
        None
    } else {
        Address::parse(url).ok().and_then(|a| a.user)
    };
    let mut candidates = ssh_candidates().into_iter();
    let mut helper_tried = false;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        let user = username_from_url
            .or(address_user.as_deref())
            .unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            for candidate in candidates.by_ref() {
                let cred = match candidate {
                    Candidate::Agent => Cred::ssh_key_from_agent(user),
                    Candidate::KeyFile(path) => Cred::ssh_key(user, None, &path, None),
                };
                if let Ok(cred) = cred {
                    return Ok(cred);
                }
            }
            return Err(git2::Error::from_str("no usable SSH credentials"));
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) && !helper_tried {
            helper_tried = true;
            if let Ok(config) = git2::Config::open_default() {
                return Cred::credential_helper(&config, url, username_from_url);
            }
        }

        if allowed_types.contains(CredentialType::USERNAME) {
            return Cred::username(user);
        }

        // Fall back to default credentials
        Cred::default()
    });

    let transfer_cancel = cancel;
    callbacks.transfer_progress(move |_| !transfer_cancel.is_cancelled());
    callbacks.sideband_progress(move |_| !cancel.is_cancelled());

    callbacks
}
