use isolang::Language;
use palmcrawl_core::traits::LanguageDetector;

/// Language detection with whatlang.
///
/// Only reliable detections are reported; whatlang's ISO 639-3 codes are
/// mapped to ISO 639-1 through isolang.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        if !info.is_reliable() {
            return None;
        }
        let code = info.lang().code();
        Language::from_639_3(code)
            .and_then(|lang| lang.to_639_1())
            .map(str::to_string)
    }
}
