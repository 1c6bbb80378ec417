use std::path::PathBuf;

use crate::util::shell;

pub const EXTENSION: &str = ".gpg";

/// Encryption with GnuPG.
///
/// With `recipients` the package is encrypted for their public keys, which
/// have to be present in the keyring of `homedir`. Otherwise it is encrypted
/// symmetrically with the passphrase read from `passphrase_file`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Gpg {
    #[serde(default)]
    pub recipients: Vec<String>,
    pub passphrase_file: Option<PathBuf>,
    /// GnuPG home directory, defaults to the one of the running user.
    pub homedir: Option<PathBuf>,
    /// Cipher used for symmetric encryption.
    pub cipher: Option<String>,
}

impl Gpg {
    /// `true` if either recipients or a passphrase are configured.
    pub fn has_key_source(&self) -> bool {
        !self.recipients.is_empty() || self.passphrase_file.is_some()
    }

    pub(super) fn command(&self) -> String {
        let mut args = vec!["gpg".to_string()];
        if let Some(homedir) = &self.homedir {
            args.push(format!("--homedir {}", shell::quote_path(homedir)));
        }
        args.push("--batch --no-tty --yes".into());

        if self.recipients.is_empty() {
            args.push("--pinentry-mode loopback".into());
            if let Some(file) = &self.passphrase_file {
                args.push(format!("--passphrase-file {}", shell::quote_path(file)));
            }
            if let Some(cipher) = &self.cipher {
                args.push(format!("--cipher-algo {}", shell::quote(cipher)));
            }
            args.push("--symmetric".into());
        } else {
            args.push("--trust-model always".into());
            for recipient in &self.recipients {
                args.push(format!("-r {}", shell::quote(recipient)));
            }
            args.push("--encrypt".into());
        }
        args.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_command() {
        let gpg = Gpg {
            recipients: Vec::new(),
            passphrase_file: Some("/root/.backup-passphrase".into()),
            homedir: None,
            cipher: Some("AES256".into()),
        };
        assert_eq!(
            gpg.command(),
            "gpg --batch --no-tty --yes --pinentry-mode loopback \
             --passphrase-file '/root/.backup-passphrase' --cipher-algo 'AES256' --symmetric"
        );
    }

    #[test]
    fn public_key_command() {
        let gpg = Gpg {
            recipients: vec!["ops@example.org".into(), "0xDEADBEEF".into()],
            passphrase_file: None,
            homedir: Some("/var/lib/backup/gnupg".into()),
            cipher: None,
        };
        assert_eq!(
            gpg.command(),
            "gpg --homedir '/var/lib/backup/gnupg' --batch --no-tty --yes --trust-model always \
             -r 'ops@example.org' -r '0xDEADBEEF' --encrypt"
        );
        assert!(gpg.has_key_source());
    }
}
