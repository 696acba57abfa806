//! Built-in crawl handlers

pub mod page;

pub use page::PageCrawler;
