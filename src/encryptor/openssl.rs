use std::path::PathBuf;

use crate::util::shell;

pub const EXTENSION: &str = ".enc";

/// Symmetric encryption with `openssl enc`.
///
/// Decrypt with e.g. `openssl aes-256-cbc -d -pbkdf2 -in <file> -pass file:<path>`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OpenSsl {
    #[serde(default = "default_cipher")]
    pub cipher: String,
    /// Derive the key with PBKDF2.
    #[serde(default = "default_true")]
    pub pbkdf2: bool,
    /// Base64 encode the encrypted stream.
    #[serde(default)]
    pub base64: bool,
    #[serde(default = "default_true")]
    pub salt: bool,
    /// File holding the password, preferred over [password](Self::password).
    pub password_file: Option<PathBuf>,
    pub password: Option<String>,
}

fn default_cipher() -> String {
    "aes-256-cbc".to_string()
}

fn default_true() -> bool {
    true
}

impl OpenSsl {
    /// `true` if a password source is configured.
    pub fn has_password(&self) -> bool {
        self.password_file.is_some() || self.password.is_some()
    }

    pub(super) fn command(&self) -> String {
        let mut args = vec!["openssl".to_string(), self.cipher.clone()];
        if self.pbkdf2 {
            args.push("-pbkdf2".into());
        }
        if self.base64 {
            args.push("-base64".into());
        }
        if self.salt {
            args.push("-salt".into());
        }
        if let Some(file) = &self.password_file {
            args.push(format!("-pass file:{}", shell::quote_path(file)));
        } else if let Some(password) = &self.password {
            args.push(format!("-k {}", shell::quote(password)));
        }
        args.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> OpenSsl {
        OpenSsl {
            cipher: default_cipher(),
            pbkdf2: true,
            base64: false,
            salt: true,
            password_file: None,
            password: None,
        }
    }

    #[test]
    fn password_file_command() {
        let openssl = OpenSsl {
            password_file: Some("/etc/backup pass".into()),
            ..base()
        };
        assert_eq!(
            openssl.command(),
            "openssl aes-256-cbc -pbkdf2 -salt -pass file:'/etc/backup pass'"
        );
    }

    #[test]
    fn inline_password_command() {
        let openssl = OpenSsl {
            base64: true,
            salt: false,
            password: Some("it's secret".into()),
            ..base()
        };
        assert_eq!(
            openssl.command(),
            r"openssl aes-256-cbc -pbkdf2 -base64 -k 'it'\''s secret'"
        );
        assert!(openssl.has_password());
        assert!(!base().has_password());
    }
}
