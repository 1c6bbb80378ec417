//! Encryption stages of the packaging pipeline.
//!
//! - [OpenSsl]: symmetric encryption with `openssl enc`.
//! - [Gpg]: symmetric or public key encryption with `gpg`.

pub mod gpg;
pub mod openssl;

use std::path::Path;

pub use gpg::Gpg;
pub use openssl::OpenSsl;

use crate::package::Package;
use crate::packager::{StageContribution, StageProvider};

/// Extensions an encryptor may add to a package.
pub const EXTENSIONS: &[&str] = &[openssl::EXTENSION, gpg::EXTENSION];

/// Configured encryptor of a model.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Encryptor {
    OpenSsl(OpenSsl),
    Gpg(Gpg),
}

impl StageProvider for Encryptor {
    fn contribute(&self, package: &Package, tmp_path: &Path) -> StageContribution {
        let (command, extension) = match self {
            Self::OpenSsl(settings) => (settings.command(), openssl::EXTENSION),
            Self::Gpg(settings) => (settings.command(), gpg::EXTENSION),
        };
        log::debug!(
            target: "encryptor",
            "Encrypting {} in {} with {}",
            package.basename(),
            tmp_path.display(),
            self.name()
        );
        StageContribution {
            command,
            extension: Some(extension.to_string()),
        }
    }
}

impl Encryptor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenSsl(_) => "OpenSSL",
            Self::Gpg(_) => "GPG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_config() {
        let encryptor: Encryptor =
            toml::from_str("type = \"openssl\"\npassword_file = \"/etc/backup.pass\"").unwrap();
        let Encryptor::OpenSsl(openssl) = encryptor else {
            panic!("expected openssl encryptor");
        };
        assert_eq!(openssl.cipher, "aes-256-cbc");
        assert!(openssl.salt);

        let encryptor: Encryptor =
            toml::from_str("type = \"gpg\"\nrecipients = [\"backup@example.org\"]").unwrap();
        assert_eq!(encryptor.name(), "GPG");
    }
}
