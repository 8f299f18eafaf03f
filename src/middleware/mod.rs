pub mod profiler;

pub use profiler::{profiler_middleware, LINK_HEADER, TOKEN_HEADER};
