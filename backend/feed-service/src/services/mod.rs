pub mod timeline;

pub use timeline::TimelineReader;
