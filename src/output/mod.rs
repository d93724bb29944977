pub mod pretty;

pub use pretty::{format_value, render_matches, Layout, RenderOptions};
