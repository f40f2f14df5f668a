pub mod ai;
pub mod app;

pub use ai::AiConfig;
pub use app::AppConfig;
