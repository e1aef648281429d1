//! Binds transit stops onto the lanes of a routable network and certifies
//! multimodal itineraries against a timetable, turning abstract walk/ride
//! plans into explicit, continuity-checked chains.

pub mod binder;
pub mod feed;
pub mod network;
pub mod shared;
pub mod timetable;
pub mod validator;
