//! Status-code translation.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::backend::{Platform, StatusText};
use crate::types::{Error, Result, StatusCode};

/// Resolves status codes to descriptive text.
///
/// The translator object is created by the runtime on first use. If that
/// fails, the next call tries again.
pub struct ErrorCategory {
    platform: Arc<dyn Platform>,
    translator: Mutex<Option<Arc<dyn StatusText>>>,
}

impl ErrorCategory {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            translator: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        "wbem error"
    }

    fn translator(&self) -> Result<Arc<dyn StatusText>> {
        let mut slot = self.translator.lock();
        if let Some(translator) = slot.as_ref() {
            return Ok(Arc::clone(translator));
        }
        let translator: Arc<dyn StatusText> = self
            .platform
            .create_status_text()
            .map_err(|code| Error::initialization("create status-text translator", code))?
            .into();
        *slot = Some(Arc::clone(&translator));
        Ok(translator)
    }

    /// Message for `code`. Unknown codes yield an empty string; only failure
    /// to construct the translator is an error.
    pub fn resolve(&self, code: StatusCode) -> Result<String> {
        let translator = self.translator()?;
        match translator.text(code) {
            Ok(text) => Ok(text.trim_end().to_string()),
            Err(lookup) => {
                tracing::trace!(%code, %lookup, "no text for status code");
                Ok(String::new())
            }
        }
    }

    /// Message for `code`, falling back to the raw code when there is none.
    pub fn describe(&self, code: StatusCode) -> String {
        match self.resolve(code) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => code.to_string(),
            Err(err) => {
                let err = Error::translation(format!("translate {code}"), err.code().unwrap_or(code));
                tracing::warn!(error = %err, "status translation unavailable");
                code.to_string()
            }
        }
    }

    /// Attach the resolved message to a code-carrying error. Translation
    /// problems never replace the original error.
    pub fn enrich(&self, err: Error) -> Error {
        let Some(code) = err.code() else {
            return err;
        };
        match self.resolve(code) {
            Ok(text) => err.with_message(text),
            Err(translation) => {
                tracing::warn!(error = %translation, %code, "could not resolve status message");
                err
            }
        }
    }
}

impl fmt::Debug for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCategory")
            .field("name", &self.name())
            .field("translator_ready", &self.translator.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryPlatform;
    use crate::backend::MockStatusText;
    use crate::types::ErrorKind;

    #[test]
    fn test_known_code_resolves() {
        let category = ErrorCategory::new(Arc::new(MemoryPlatform::new()));
        let text = category.resolve(StatusCode::NOT_FOUND).unwrap();
        assert!(!text.is_empty());
    }

    #[test]
    fn test_unknown_code_yields_empty_text() {
        let category = ErrorCategory::new(Arc::new(MemoryPlatform::new()));
        assert_eq!(category.resolve(StatusCode(0x1234)).unwrap(), "");
        assert_eq!(category.describe(StatusCode(0x1234)), "0x00001234");
    }

    #[test]
    fn test_category_name_shows_in_debug() {
        let category = ErrorCategory::new(Arc::new(MemoryPlatform::new()));
        assert_eq!(category.name(), "wbem error");
        let shown = format!("{category:?}");
        assert!(shown.contains("wbem error"));
        assert!(shown.contains("translator_ready: false"));
    }

    #[test]
    fn test_translator_is_built_once() {
        let platform = MemoryPlatform::new();
        let category = ErrorCategory::new(Arc::new(platform.clone()));
        category.resolve(StatusCode::NOT_FOUND).unwrap();
        category.resolve(StatusCode::FAILED).unwrap();
        assert_eq!(platform.count("create_status_text"), 1);
    }

    #[test]
    fn test_construction_failure_is_initialization_error() {
        let platform = MemoryPlatform::new();
        platform.fail_status_text(Some(StatusCode::CLASS_NOT_REGISTERED));
        let category = ErrorCategory::new(Arc::new(platform.clone()));

        let err = category.resolve(StatusCode::NOT_FOUND).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(err.code(), Some(StatusCode::CLASS_NOT_REGISTERED));

        // describe degrades to the raw code
        assert_eq!(category.describe(StatusCode::NOT_FOUND), "0x80041002");

        // and a later call retries construction
        platform.fail_status_text(None);
        assert!(!category.resolve(StatusCode::NOT_FOUND).unwrap().is_empty());
    }

    #[test]
    fn test_enrich_keeps_original_error() {
        let platform = MemoryPlatform::new();
        platform.fail_status_text(Some(StatusCode::E_FAIL));
        let category = ErrorCategory::new(Arc::new(platform));

        let err = category.enrich(Error::query("GetObject", StatusCode::NOT_FOUND));
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.failure().unwrap().message, None);
    }

    #[test]
    fn test_trailing_whitespace_is_trimmed() {
        let mut translator = MockStatusText::new();
        translator
            .expect_text()
            .returning(|_| Ok("Access denied \r\n".to_string()));
        let translator: Arc<dyn StatusText> = Arc::new(translator);

        let category = ErrorCategory::new(Arc::new(MemoryPlatform::new()));
        *category.translator.lock() = Some(translator);

        assert_eq!(category.resolve(StatusCode::ACCESS_DENIED).unwrap(), "Access denied");
        let err = category.enrich(Error::security("set authorization", StatusCode::ACCESS_DENIED));
        assert_eq!(err.failure().unwrap().message.as_deref(), Some("Access denied"));
    }
}
