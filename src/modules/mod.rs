pub mod activation;
pub mod config;
pub mod demo;
pub mod error;
pub mod model;
pub mod params;
pub mod portrayal;
pub mod space;
pub mod time;
pub mod value;
pub mod visualization;
