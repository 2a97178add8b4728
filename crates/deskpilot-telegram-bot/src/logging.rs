//! Log setup with secret redaction.

use regex::Regex;
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_FILTER: &str =
    "deskpilot_core=info,deskpilot_transport_telegram=info,deskpilot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn";

/// Masks Telegram bot tokens (`<bot id>:<35-char secret>`) in log lines.
///
/// The token shape is matched wherever it appears, so API URLs such as
/// `/bot<token>/getUpdates` keep their path around the mask.
pub struct TokenRedactor {
    token: Regex,
}

impl TokenRedactor {
    /// Compile the token pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token: Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
        })
    }

    /// Mask every token in `input`.
    #[must_use]
    pub fn redact<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.token.replace_all(input, "[TELEGRAM_TOKEN]")
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Arc<TokenRedactor>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(self.redactor.redact(&s).as_bytes())?;
        // Report the original length; the redacted text may differ.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    redactor: Arc<TokenRedactor>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            redactor: Arc::clone(&self.redactor),
        }
    }
}

/// Install the global subscriber writing redacted logs to stderr.
///
/// `RUST_LOG` wins; otherwise `DEBUG_MODE=true` (or `1`) logs everything at
/// debug level.
pub fn init_logging(redactor: Arc<TokenRedactor>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        redactor,
    };

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let fallback = if debug_mode { "debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsawQ";

    #[test]
    fn test_redacts_token_in_api_url() {
        let redactor = TokenRedactor::new().expect("pattern");
        let line = format!("error sending request for url (https://api.telegram.org/bot{TOKEN}/getUpdates)");
        let redacted = redactor.redact(&line);
        assert!(!redacted.contains("AAHdqTcv"), "{redacted}");
        assert!(redacted.contains("/bot[TELEGRAM_TOKEN]/getUpdates"), "{redacted}");
    }

    #[test]
    fn test_redacts_bare_token() {
        let redactor = TokenRedactor::new().expect("pattern");
        let input = format!("token={TOKEN} loaded");
        let redacted = redactor.redact(&input);
        assert_eq!(redacted, "token=[TELEGRAM_TOKEN] loaded");
    }

    #[test]
    fn test_leaves_plain_lines_alone() {
        let redactor = TokenRedactor::new().expect("pattern");
        let line = "Dispatched command=git user=Some(Identity(42))";
        assert_eq!(redactor.redact(line), line);
    }

    #[test]
    fn test_writer_reports_original_length() {
        let redactor = Arc::new(TokenRedactor::new().expect("pattern"));
        let mut writer = RedactingWriter {
            inner: Vec::new(),
            redactor,
        };
        let line = format!("bot{TOKEN}\n");
        let written = writer.write(line.as_bytes()).expect("write");
        assert_eq!(written, line.len());
        let out = String::from_utf8(writer.inner).expect("utf8");
        assert!(!out.contains("AAHdqTcv"), "{out}");
    }
}
