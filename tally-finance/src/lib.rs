//! tally-finance: category cache, LLM-backed classifier, spending analysis and charts

pub mod analysis;
pub mod cache;
pub mod charts;
pub mod classifier;
pub mod prompt;
pub mod response;

pub use analysis::{
    AnalysisOptions, Analysis, MonthOverMonth, Overview, Swing, analyze, largest_swings,
    month_over_month,
};
pub use cache::{CategoryCache, JsonFileCache, MemoryCache};
pub use charts::{ChartOptions, ChartPaths, render_all};
pub use classifier::{CategoryService, Classifier, ClassifyReport, RowPolicy, ServicePolicy};
pub use prompt::{Query, system_prompt, user_prompt};
pub use response::parse_reply;
