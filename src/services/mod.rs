pub mod conditions;
pub mod forecast;
pub mod geo;
pub mod geocoder;
pub mod gpx;
pub mod matcher;
pub mod polyline;
pub mod route_source;
pub mod sampling;
pub mod yr;
