use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

pub const TOKEN_VAR: &str = "KDP_TOKEN";

/// A KNMI Data Platform API key. Debug output is redacted so the key never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Returns `None` for keys that are empty once trimmed.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Token(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("KDP_TOKEN is not set in {0}")]
    Missing(String),
    #[error("failed to read env file {path}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

pub trait TokenProvider {
    fn get_token(&self) -> Result<Token, TokenError>;
    fn report_location(&self) -> String;
}

/// Reads the token from the process environment.
pub struct EnvVarProvider;

impl TokenProvider for EnvVarProvider {
    fn get_token(&self) -> Result<Token, TokenError> {
        std::env::var(TOKEN_VAR)
            .ok()
            .and_then(Token::new)
            .ok_or_else(|| TokenError::Missing(self.report_location()))
    }

    fn report_location(&self) -> String {
        "the environment".to_string()
    }
}

/// Reads the token from a dotenv file without touching the process environment. With no explicit
/// path, `.env` is looked up from the working directory upwards.
pub struct DotEnvProvider {
    pub path: Option<PathBuf>,
}

impl DotEnvProvider {
    fn entries(&self) -> Result<Option<Vec<(String, String)>>, TokenError> {
        let iter = match &self.path {
            Some(path) => dotenvy::from_path_iter(path).map_err(|source| TokenError::EnvFile {
                path: path.clone(),
                source,
            })?,
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => iter,
                Err(e) if e.not_found() => return Ok(None),
                Err(source) => {
                    return Err(TokenError::EnvFile {
                        path: PathBuf::from(".env"),
                        source,
                    })
                }
            },
        };

        let mut entries = Vec::new();
        for item in iter {
            let entry = item.map_err(|source| TokenError::EnvFile {
                path: self.display_path(),
                source,
            })?;
            entries.push(entry);
        }
        Ok(Some(entries))
    }

    fn display_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from(".env"))
    }
}

impl TokenProvider for DotEnvProvider {
    fn get_token(&self) -> Result<Token, TokenError> {
        let entries = self.entries()?.unwrap_or_default();
        entries
            .into_iter()
            .rev()
            .find(|(key, _)| key == TOKEN_VAR)
            .and_then(|(_, value)| Token::new(value))
            .ok_or_else(|| TokenError::Missing(self.report_location()))
    }

    fn report_location(&self) -> String {
        self.display_path().display().to_string()
    }
}

/// Looks the token up in the environment first, then in the dotenv file.
pub fn load_token(env_file: Option<&Path>) -> Result<Token, TokenError> {
    let providers: Vec<Box<dyn TokenProvider>> = vec![
        Box::new(EnvVarProvider),
        Box::new(DotEnvProvider {
            path: env_file.map(Path::to_path_buf),
        }),
    ];

    let mut searched = Vec::new();
    for provider in providers {
        match provider.get_token() {
            Ok(token) => {
                debug!("Using KDP token from {}", provider.report_location());
                return Ok(token);
            }
            Err(TokenError::Missing(location)) => searched.push(location),
            Err(e) => return Err(e),
        }
    }

    Err(TokenError::Missing(searched.join(" or ")))
}
