//! Source adapters implementing the `Source` trait from `contrib_core`.

#[cfg(feature = "bugzilla")]
pub mod bugzilla;
#[cfg(feature = "community_portal")]
pub mod community_portal;
#[cfg(feature = "discourse")]
pub mod discourse;
#[cfg(feature = "github")]
pub mod github;
#[cfg(feature = "osm")]
pub mod osm;
#[cfg(feature = "wiki")]
pub mod wiki;
