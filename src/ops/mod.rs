pub mod canvas_ops;
pub mod draw;
pub mod filters;
pub mod macros;
pub mod transform;
