pub mod data_ingestion;
pub mod data_transformation;

pub use data_ingestion::DataIngestion;
pub use data_transformation::DataTransformation;
