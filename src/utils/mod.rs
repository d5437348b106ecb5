pub mod base62;
pub mod batch_csv;
pub mod id_generator;
