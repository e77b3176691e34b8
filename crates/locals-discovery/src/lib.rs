/// Event discovery
///
/// Pure filtering logic shared by the database layer: great-circle distance,
/// tag include/exclude sets, and parsing of the loosely-typed list parameters
/// into a typed `EventFilter`. Nothing here performs I/O.
///
/// Narrowing by time window, availability and age is pushed into SQL by
/// `locals-db`; tag and radius checks run afterwards over the candidates via
/// `EventFilter::apply_post_filters`.

pub mod filter;
pub mod geo;
pub mod tags;

pub use filter::{Discoverable, EventFilter, GeoRadius, TimeWindow};
pub use geo::GeoPoint;
pub use tags::TagFilter;
