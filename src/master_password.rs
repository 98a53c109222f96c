//! Reading the master password without echoing it.

use anyhow::bail;
use anyhow::Result;
use rpassword::prompt_password;
use zeroize::Zeroizing;

use crate::oprf::exchange::MIN_MASTER_PASSWORD_CHARS;

/// Environment variable consulted before prompting. Meant for scripting and
/// tests; environment variables are visible to other processes of the same
/// user.
pub const MASTER_PASSWORD_ENV_VAR: &str = "OOPASS_MASTER_PASSWORD";

/// Takes the master password from [`MASTER_PASSWORD_ENV_VAR`] when set,
/// otherwise prompts on the terminal.
pub fn read_master_password() -> Result<Zeroizing<String>> {
    let from_env = std::env::var(MASTER_PASSWORD_ENV_VAR).ok().map(Zeroizing::new);
    from_env_or_prompt(from_env, || prompt_password("Master password: "))
}

fn from_env_or_prompt(
    from_env: Option<Zeroizing<String>>,
    prompt: impl FnOnce() -> std::io::Result<String>,
) -> Result<Zeroizing<String>> {
    let password = match from_env {
        Some(password) => password,
        None => Zeroizing::new(prompt()?),
    };

    if password.chars().count() < MIN_MASTER_PASSWORD_CHARS {
        bail!("Master password must be at least {MIN_MASTER_PASSWORD_CHARS} characters");
    }
    Ok(password)
}
