pub mod arrow;
pub mod filters;
pub mod paint;
pub mod scripting;
pub mod shapes;
pub mod text;
pub mod transform;
