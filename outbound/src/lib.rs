pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    expand_output_path, generate_crawl_report, handle_crawl, init_tracing, load_urls_from_file,
    load_urls_from_source, parse_url_line, seeds_from_matches,
};
