pub mod line_builder;
pub mod routing;

pub use line_builder::LineBuilder;
pub use routing::{RoutingValidator, Topology};
