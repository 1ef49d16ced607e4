pub mod collection;
pub mod editor;
pub mod model;
pub mod path;
pub mod styles;
pub mod validate;
