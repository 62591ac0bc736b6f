pub mod serializer;
pub use serializer::{ParameterBinder, Params, Placeholder, Serializer};
