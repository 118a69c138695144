pub mod id_analyzer;
pub mod jwt;

pub use id_analyzer::IdAnalyzerService;
pub use jwt::JwtService;
