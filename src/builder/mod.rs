// ABOUTME: Builder stage module: spec validation, template-driven builds and builder filters
// ABOUTME: Re-exports the builder, its spec, error types and the request/response filters

pub mod decode;
pub mod error;
pub mod extra;
pub mod filters;
pub mod spec;
pub mod stage;

pub use decode::decode;
pub use error::{BuilderError, Result};
pub use extra::extra_functions;
pub use filters::{
    BuiltRequest, BuiltResponse, RequestBuilder, RequestBuilderSpec, ResponseBuilder,
    ResponseBuilderSpec, RESULT_BUILD_ERR,
};
pub use spec::BuilderSpec;
pub use stage::{default_engine, Builder, Published};
