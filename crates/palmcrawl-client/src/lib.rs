pub mod fetcher;
pub mod language;
pub mod parser;

pub use fetcher::ReqwestFetcher;
pub use language::WhatlangDetector;
pub use parser::HtmlPageParser;
