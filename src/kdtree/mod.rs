pub mod bounding_box;
pub mod node;
pub mod point;
pub mod tree;
