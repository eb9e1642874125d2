// Domain core: models, error taxonomy and pure geospatial math

pub mod errors;
pub mod geo;
pub mod models;
