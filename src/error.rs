use anyhow::Error;

/// An error that made it all the way up to `main`, with an optional hint on how to fix it.
pub struct CommandError {
    pub inner: Error,
    pub hint: Option<&'static str>,
}

impl CommandError {
    pub fn with_hint(inner: Error, hint: &'static str) -> Self {
        Self {
            inner,
            hint: Some(hint),
        }
    }
}

impl From<Error> for CommandError {
    fn from(inner: Error) -> Self {
        Self { inner, hint: None }
    }
}
