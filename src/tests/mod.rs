//! Integration-style tests over the indexing, search, and cleanup
//! pipelines, using temp directories and injected extractor fakes.

mod support;
