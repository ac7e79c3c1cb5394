//! API request handlers, organized by resource

pub mod backgrounds;
pub mod health;
pub mod novel_parse;
pub mod tasks;

pub use backgrounds::extract_backgrounds;
pub use health::health;
pub use novel_parse::{
    cancel_novel_parse_task, create_novel_parse_task, get_novel_parse_task, start_novel_parse_task,
};
pub use tasks::{cancel_task, get_task, list_tasks};
